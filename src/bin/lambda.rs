use std::sync::Arc;

use formula_platform::config::Config;
use formula_platform::invoker::ModelInvoker;
use formula_platform::logging::init_logging;
use formula_platform::pipeline::Pipeline;
use formula_platform::routes::{router, AppState};
use lambda_http::{run, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Arc::new(Config::from_env());
    init_logging(&config.log_level, config.log_json, true);
    config.log_summary();

    let pipeline = Pipeline::new(config, ModelInvoker::build()?);
    let app = router(AppState {
        pipeline: Arc::new(pipeline),
    });

    run(app).await
}
