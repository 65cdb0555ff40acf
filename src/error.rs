/// A failed call to the Converse API.
///
/// Every variant is a transport or service failure; the variants only record
/// where along the call it surfaced.
#[derive(Debug, thiserror::Error)]
pub enum ConverseError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("{}", service_display(.status, .code, .message))]
    Service {
        status: Option<u16>,
        code: String,
        message: String,
    },
    #[error("failed to parse response: {0}")]
    Parse(String),
    #[error("event stream error: {0}")]
    Stream(String),
    #[error("invalid client configuration: {0}")]
    Config(String),
}

fn service_display(status: &Option<u16>, code: &str, message: &str) -> String {
    match status {
        Some(status) => format!("service returned {status} ({code}): {message}"),
        None => format!("service raised {code}: {message}"),
    }
}

impl ConverseError {
    /// Build a service error from a non-2xx HTTP response.
    ///
    /// Bedrock error bodies look like `{"message": "...", "__type": "..."}`; the
    /// type may also arrive in the `x-amzn-ErrorType` header.
    pub fn from_http(status: u16, error_type_header: Option<&str>, body: &str) -> Self {
        let parsed = serde_json::from_str::<serde_json::Value>(body).ok();

        let message = parsed
            .as_ref()
            .and_then(|json| {
                json.get("message")
                    .or_else(|| json.get("Message"))
                    .and_then(|v| v.as_str())
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| body.trim().to_string());

        let code = parsed
            .as_ref()
            .and_then(|json| json.get("__type").and_then(|v| v.as_str()))
            .or(error_type_header)
            .map(strip_error_type)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "UnknownError".to_string());

        ConverseError::Service {
            status: Some(status),
            code,
            message,
        }
    }

    /// The human-readable part of the error. For service errors this is the
    /// message the service sent back.
    pub fn message(&self) -> &str {
        match self {
            ConverseError::Service { message, .. } => message,
            ConverseError::Request(m)
            | ConverseError::Parse(m)
            | ConverseError::Stream(m)
            | ConverseError::Config(m) => m,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            ConverseError::Service { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ConverseError::Service { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_throttling(&self) -> bool {
        match self {
            ConverseError::Service {
                status,
                code,
                message,
            } => {
                *status == Some(429)
                    || code.to_lowercase().contains("throttl")
                    || message.to_lowercase().contains("throttl")
            }
            _ => false,
        }
    }
}

// "ValidationException:http://internal.amazon.com/coral/..." -> "ValidationException"
fn strip_error_type(raw: &str) -> String {
    let name = raw.split(':').next().unwrap_or(raw);
    let name = name.rsplit('#').next().unwrap_or(name);
    name.trim().to_string()
}
