use std::sync::Arc;

use formula_platform::bedrock_image::BedrockImageService;
use formula_platform::config::Config;
use formula_platform::image_lambda::{router, ImageLambdaState};
use formula_platform::logging::init_logging;
use formula_platform::storage::S3ImageStore;
use formula_platform::{create_bedrock_client, create_s3_client};
use lambda_http::{run, Error};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::from_env();
    init_logging(&config.log_level, config.log_json, true);

    let bedrock_client = create_bedrock_client(&config.bedrock_region).await;
    let s3_client = create_s3_client(&config.s3_region).await;

    let state = ImageLambdaState {
        generator: Arc::new(BedrockImageService::new(bedrock_client)),
        store: Arc::new(S3ImageStore::new(s3_client, &config.s3_bucket, &config.s3_region)),
        region: config.bedrock_region,
        bucket: config.s3_bucket,
    };

    run(router(state)).await
}
