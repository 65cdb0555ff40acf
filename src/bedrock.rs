use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Url;
use tracing::debug;

use crate::client::{ConverseClient, ConverseStream};
use crate::config::BedrockConfig;
use crate::error::ConverseError;
use crate::types::{ConverseRequest, ConverseResponse};

const EVENT_STREAM_CONTENT_TYPE: &str = "application/vnd.amazon.eventstream";

/// Bedrock runtime client speaking the Converse REST API.
///
/// Authenticates with a Bedrock API key when one is set. Requests that need
/// SigV4 can go through a `reqwest::Client` with signing middleware via
/// [`BedrockRuntimeClient::with_client`].
#[derive(Debug, Clone)]
pub struct BedrockRuntimeClient {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl BedrockRuntimeClient {
    /// Client for the public endpoint of `region`, without credentials.
    pub fn new(region: impl Into<String>) -> Self {
        let config = BedrockConfig::new(region);
        Self {
            client: reqwest::Client::new(),
            base_url: config.endpoint(),
            bearer_token: None,
        }
    }

    pub fn from_config(config: &BedrockConfig) -> Result<Self, ConverseError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ConverseError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.endpoint(),
            bearer_token: config.bearer_token.clone(),
        })
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/model/{model_id}/{operation}`, with the model id escaped as a
    /// single path segment (ARNs contain `/`).
    fn operation_url(&self, model_id: &str, operation: &str) -> Result<Url, ConverseError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ConverseError::Config(format!("invalid base url '{}': {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| ConverseError::Config(format!("base url '{}' cannot take a path", self.base_url)))?
            .pop_if_empty()
            .push("model")
            .push(model_id)
            .push(operation);
        Ok(url)
    }

    async fn send(
        &self,
        request: &ConverseRequest,
        operation: &'static str,
    ) -> Result<reqwest::Response, ConverseError> {
        let url = self.operation_url(&request.model_id, operation)?;
        let body = request
            .body()
            .map_err(|e| ConverseError::Parse(format!("failed to encode request: {e}")))?;

        debug!(
            model = %request.model_id,
            operation,
            messages = request.messages.len(),
            "bedrock converse request"
        );

        let mut req = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .json(&body);
        if operation == "converse-stream" {
            req = req.header(ACCEPT, EVENT_STREAM_CONTENT_TYPE);
        }
        if let Some(ref token) = self.bearer_token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ConverseError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let error_type = resp
                .headers()
                .get("x-amzn-errortype")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let text = resp
                .text()
                .await
                .map_err(|e| ConverseError::Request(e.to_string()))?;
            return Err(ConverseError::from_http(
                status.as_u16(),
                error_type.as_deref(),
                &text,
            ));
        }

        Ok(resp)
    }
}

#[async_trait]
impl ConverseClient for BedrockRuntimeClient {
    async fn converse(&self, request: &ConverseRequest) -> Result<ConverseResponse, ConverseError> {
        let resp = self.send(request, "converse").await?;
        let text = resp
            .text()
            .await
            .map_err(|e| ConverseError::Request(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| ConverseError::Parse(e.to_string()))
    }

    async fn converse_stream(
        &self,
        request: &ConverseRequest,
    ) -> Result<ConverseStream, ConverseError> {
        let resp = self.send(request, "converse-stream").await?;
        Ok(ConverseStream::from_body(resp.bytes_stream()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_id_is_one_escaped_segment() {
        let client = BedrockRuntimeClient::new("us-west-2");
        let url = client
            .operation_url(
                "arn:aws:bedrock:us-west-2:123456789012:inference-profile/us.anthropic.claude-3-haiku",
                "converse",
            )
            .unwrap();
        assert_eq!(url.host_str(), Some("bedrock-runtime.us-west-2.amazonaws.com"));
        assert_eq!(
            url.path(),
            "/model/arn:aws:bedrock:us-west-2:123456789012:inference-profile%2Fus.anthropic.claude-3-haiku/converse"
        );
    }

    #[test]
    fn base_url_path_prefix_is_kept() {
        let client = BedrockRuntimeClient::new("us-east-1").with_base_url("http://localhost:9000/bedrock/");
        let url = client.operation_url("m", "converse-stream").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/bedrock/model/m/converse-stream");
    }

    #[test]
    fn from_config_uses_endpoint_and_token() {
        let config = BedrockConfig::new("eu-central-1").with_bearer_token("key");
        let client = BedrockRuntimeClient::from_config(&config).unwrap();
        assert_eq!(client.base_url(), "https://bedrock-runtime.eu-central-1.amazonaws.com");
        assert_eq!(client.bearer_token.as_deref(), Some("key"));
    }

    #[test]
    fn unparseable_base_url_is_a_config_error() {
        let client = BedrockRuntimeClient::new("us-east-1").with_base_url("not a url");
        assert!(matches!(
            client.operation_url("m", "converse"),
            Err(ConverseError::Config(_))
        ));
    }
}
