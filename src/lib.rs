pub mod bedrock_image;
pub mod config;
pub mod demo_image;
pub mod error;
pub mod formula;
pub mod image_lambda;
pub mod invoker;
pub mod language;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod prompt;
pub mod proxy;
pub mod routes;
pub mod storage;
pub mod validation;

use aws_config::{BehaviorVersion, Region, SdkConfig};

pub async fn load_aws_config(region: &str) -> SdkConfig {
    aws_config::load_defaults(BehaviorVersion::v2024_03_28())
        .await
        .into_builder()
        .region(Region::new(region.to_string()))
        .build()
}

pub async fn create_bedrock_client(region: &str) -> aws_sdk_bedrockruntime::Client {
    aws_sdk_bedrockruntime::Client::new(&load_aws_config(region).await)
}

pub async fn create_s3_client(region: &str) -> aws_sdk_s3::Client {
    aws_sdk_s3::Client::new(&load_aws_config(region).await)
}

pub async fn create_lambda_client(region: &str) -> aws_sdk_lambda::Client {
    aws_sdk_lambda::Client::new(&load_aws_config(region).await)
}
