use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::primitives::ByteStream;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use image::ImageFormat;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::validation::ImageParams;

const KEY_PREFIX: &str = "generated-images";
const CACHE_CONTROL: &str = "public, max-age=31536000";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid image data: {0}")]
    InvalidImage(String),
    #[error("S3 bucket {0} does not exist")]
    NoSuchBucket(String),
    #[error("Access denied to S3 bucket. Check IAM permissions.")]
    AccessDenied,
    #[error("S3 upload failed: {0}")]
    Upload(String),
    #[error("S3 connection failed: {0}")]
    Connection(String),
}

/// Where an uploaded image ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    pub key: String,
    pub public_url: String,
    pub bucket: String,
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn upload(&self, image_base64: &str, params: &ImageParams) -> Result<StoredImage, StorageError>;

    /// Cheap reachability probe used by the health endpoint.
    async fn check(&self) -> Result<(), StorageError>;
}

#[derive(Debug)]
pub struct DecodedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl DecodedImage {
    pub fn content_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("png")
    }
}

/// Decodes model output, which may carry a `data:image/...;base64,` prefix.
/// Bytes that are not a recognizable image are treated as PNG, the format
/// every supported model emits.
pub fn decode_image(image_base64: &str) -> Result<DecodedImage, StorageError> {
    let data = match image_base64.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:image/") => data,
        _ => image_base64,
    };
    let bytes = general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|err| StorageError::InvalidImage(err.to_string()))?;
    if bytes.is_empty() {
        return Err(StorageError::InvalidImage("empty image".to_string()));
    }
    let format = image::guess_format(&bytes).unwrap_or(ImageFormat::Png);
    Ok(DecodedImage { bytes, format })
}

/// `generated-images/2024-05-01T10-20-30-123Z-1a2b3c4d.png`
pub fn object_key(now: DateTime<Utc>, id: Uuid, extension: &str) -> String {
    let timestamp = now.format("%Y-%m-%dT%H-%M-%S-%3fZ");
    let id = id.simple().to_string();
    format!("{KEY_PREFIX}/{timestamp}-{}.{extension}", &id[..8])
}

pub fn public_url(bucket: &str, region: &str, key: &str) -> String {
    format!("https://{bucket}.s3.{region}.amazonaws.com/{key}")
}

fn classify_error(bucket: &str, code: Option<&str>, context: String) -> StorageError {
    match code {
        Some("NoSuchBucket") | Some("NotFound") => StorageError::NoSuchBucket(bucket.to_string()),
        Some("AccessDenied") | Some("Forbidden") => StorageError::AccessDenied,
        _ => StorageError::Upload(context),
    }
}

pub struct S3ImageStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    region: String,
}

impl S3ImageStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>, region: impl Into<String>) -> Self {
        S3ImageStore {
            client,
            bucket: bucket.into(),
            region: region.into(),
        }
    }
}

#[async_trait]
impl ImageStore for S3ImageStore {
    async fn upload(&self, image_base64: &str, params: &ImageParams) -> Result<StoredImage, StorageError> {
        let image = decode_image(image_base64)?;
        let now = Utc::now();
        let key = object_key(now, Uuid::new_v4(), image.extension());
        info!(bucket = %self.bucket, key = %key, bytes = image.bytes.len(), "uploading image to S3");

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(image.content_type())
            .cache_control(CACHE_CONTROL)
            .metadata("generated-by", "formula-platform")
            .metadata("model", params.model.id())
            .metadata("timestamp", now.to_rfc3339_opts(SecondsFormat::Millis, true))
            .metadata("width", params.width.to_string())
            .metadata("height", params.height.to_string())
            .body(ByteStream::from(image.bytes))
            .send()
            .await
            .map_err(|err| {
                let context = DisplayErrorContext(&err).to_string();
                error!("S3 upload failed: {}", context);
                classify_error(&self.bucket, err.code(), context)
            })?;

        Ok(StoredImage {
            public_url: public_url(&self.bucket, &self.region, &key),
            key,
            bucket: self.bucket.clone(),
        })
    }

    async fn check(&self) -> Result<(), StorageError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|err| {
                let context = DisplayErrorContext(&err).to_string();
                match classify_error(&self.bucket, err.code(), context.clone()) {
                    StorageError::Upload(_) => StorageError::Connection(context),
                    other => other,
                }
            })?;
        Ok(())
    }
}
