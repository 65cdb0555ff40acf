use std::time::Duration;

/// Where and how [`crate::BedrockRuntimeClient`] reaches the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BedrockConfig {
    pub region: String,
    /// Replaces the regional endpoint, e.g. for a VPC endpoint or a local mock.
    pub endpoint_url: Option<String>,
    /// Bedrock API key, sent as `Authorization: Bearer ...`.
    pub bearer_token: Option<String>,
    /// Whole-request timeout. For streaming calls this bounds the entire stream.
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".into(),
            endpoint_url: None,
            bearer_token: None,
            timeout: None,
            connect_timeout: None,
        }
    }
}

impl BedrockConfig {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Self::default()
        }
    }

    /// Read `AWS_REGION` (or `AWS_DEFAULT_REGION`), `AWS_BEARER_TOKEN_BEDROCK`
    /// and `AWS_ENDPOINT_URL_BEDROCK_RUNTIME` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`BedrockConfig::from_env`] over an arbitrary lookup. Empty
    /// values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();
        if let Some(region) = get("AWS_REGION").or_else(|| get("AWS_DEFAULT_REGION")) {
            config.region = region;
        }
        config.bearer_token = get("AWS_BEARER_TOKEN_BEDROCK");
        config.endpoint_url = get("AWS_ENDPOINT_URL_BEDROCK_RUNTIME");
        config
    }

    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn endpoint(&self) -> String {
        match &self.endpoint_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://bedrock-runtime.{}.amazonaws.com", self.region),
        }
    }
}
