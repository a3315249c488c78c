use formula_platform::config::Config;
use formula_platform::create_lambda_client;
use formula_platform::logging::init_logging;
use formula_platform::proxy::{handle_proxy_event, LambdaFunctionInvoker};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::from_env();
    init_logging(&config.log_level, config.log_json, true);

    let client = create_lambda_client(&config.image_function_region).await;
    let invoker = LambdaFunctionInvoker::new(client, config.image_function_name);
    let invoker = &invoker;

    run(service_fn(move |event: LambdaEvent<Value>| async move {
        Ok::<Value, Error>(handle_proxy_event(invoker, event.payload).await)
    }))
    .await
}
