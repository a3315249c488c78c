use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use formula_platform::config::Config;
use formula_platform::invoker::ModelInvoker;
use formula_platform::logging::init_logging;
use formula_platform::pipeline::Pipeline;
use formula_platform::routes::{router, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Arc::new(Config::from_env());
    init_logging(&config.log_level, config.log_json, false);
    config.log_summary();

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let pipeline = Pipeline::new(config, ModelInvoker::build()?);
    let app = router(AppState {
        pipeline: Arc::new(pipeline),
    });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
