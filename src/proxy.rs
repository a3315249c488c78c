use async_trait::async_trait;
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Lambda function error: {0}")]
    Function(String),
    #[error("Lambda invoke failed: {0}")]
    Invoke(String),
    #[error("Lambda returned an invalid payload: {0}")]
    InvalidPayload(String),
}

impl ProxyError {
    pub fn error_type(&self) -> &'static str {
        match self {
            ProxyError::Function(_) => "FunctionError",
            ProxyError::Invoke(_) => "InvokeError",
            ProxyError::InvalidPayload(_) => "InvalidPayload",
        }
    }
}

/// Synchronous invocation of another function with a JSON payload.
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    async fn invoke(&self, payload: &Value) -> Result<Value, ProxyError>;
}

pub struct LambdaFunctionInvoker {
    client: aws_sdk_lambda::Client,
    function_name: String,
}

impl LambdaFunctionInvoker {
    pub fn new(client: aws_sdk_lambda::Client, function_name: impl Into<String>) -> Self {
        LambdaFunctionInvoker {
            client,
            function_name: function_name.into(),
        }
    }
}

#[async_trait]
impl FunctionInvoker for LambdaFunctionInvoker {
    async fn invoke(&self, payload: &Value) -> Result<Value, ProxyError> {
        let payload = serde_json::to_vec(payload).map_err(|err| ProxyError::Invoke(err.to_string()))?;
        info!(function = %self.function_name, "forwarding request");

        let output = self
            .client
            .invoke()
            .function_name(&self.function_name)
            .invocation_type(InvocationType::RequestResponse)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(|err| ProxyError::Invoke(DisplayErrorContext(&err).to_string()))?;

        if let Some(function_error) = output.function_error() {
            return Err(ProxyError::Function(function_error.to_string()));
        }

        let body = output.payload().map(|blob| blob.as_ref()).unwrap_or_default();
        serde_json::from_slice(body).map_err(|err| ProxyError::InvalidPayload(err.to_string()))
    }
}

fn http_method(event: &Value) -> &str {
    event
        .get("httpMethod")
        .or_else(|| event.pointer("/requestContext/http/method"))
        .and_then(Value::as_str)
        .unwrap_or_default()
}

fn proxy_response(status: u16, body: Value) -> Value {
    json!({
        "statusCode": status,
        "headers": {
            "Access-Control-Allow-Origin": "*",
            "Access-Control-Allow-Headers": "Content-Type",
            "Access-Control-Allow-Methods": "POST, OPTIONS",
            "Content-Type": "application/json",
        },
        "body": body.to_string(),
    })
}

/// Answers an API Gateway proxy event by forwarding `POST`s to the image
/// function and returning its response untouched.
pub async fn handle_proxy_event(invoker: &dyn FunctionInvoker, event: Value) -> Value {
    match http_method(&event) {
        "OPTIONS" => proxy_response(200, json!({ "message": "CORS preflight successful" })),
        "POST" => match invoker.invoke(&event).await {
            Ok(response) => {
                info!("received response from image function");
                response
            }
            Err(err) => {
                error!(error_type = err.error_type(), "image proxy error: {}", err);
                proxy_response(
                    500,
                    json!({
                        "success": false,
                        "error": err.to_string(),
                        "errorType": err.error_type(),
                        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                    }),
                )
            }
        },
        _ => proxy_response(405, json!({ "error": "Method not allowed" })),
    }
}
