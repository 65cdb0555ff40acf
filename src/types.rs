use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// `{"role": ..., "content": [{"text": ...}]}`, the common single-block message.
pub fn text_message(role: Role, text: impl Into<String>) -> Value {
    json!({
        "role": role.as_str(),
        "content": [{ "text": text.into() }],
    })
}

/// `{"text": ...}` system prompt block.
pub fn system_text(text: impl Into<String>) -> Value {
    json!({ "text": text.into() })
}

/// Generation parameters. Unset fields are left off the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

impl InferenceConfig {
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_stop_sequence(mut self, stop: impl Into<String>) -> Self {
        self.stop_sequences.push(stop.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.max_tokens.is_none()
            && self.temperature.is_none()
            && self.top_p.is_none()
            && self.stop_sequences.is_empty()
    }
}

/// Optional arguments to [`crate::converse`].
#[derive(Debug, Clone)]
pub struct ConverseOptions {
    pub system: Vec<Value>,
    pub inference_config: Option<InferenceConfig>,
    pub additional_model_fields: Option<Map<String, Value>>,
    /// Use `converse-stream` instead of `converse`. On by default.
    pub streaming: bool,
}

impl Default for ConverseOptions {
    fn default() -> Self {
        Self {
            system: Vec::new(),
            inference_config: None,
            additional_model_fields: None,
            streaming: true,
        }
    }
}

impl ConverseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system(mut self, system: Vec<Value>) -> Self {
        self.system = system;
        self
    }

    pub fn with_inference_config(mut self, config: InferenceConfig) -> Self {
        self.inference_config = Some(config);
        self
    }

    pub fn with_additional_model_fields(mut self, fields: Map<String, Value>) -> Self {
        self.additional_model_fields = Some(fields);
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }
}

/// The payload handed to a [`crate::ConverseClient`].
///
/// Optional keys only serialize when they carry something; there are no null
/// placeholders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseRequest {
    pub model_id: String,
    pub messages: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub system: Vec<Value>,
    #[serde(skip_serializing_if = "config_is_unset")]
    pub inference_config: Option<InferenceConfig>,
    #[serde(skip_serializing_if = "fields_are_unset")]
    pub additional_model_request_fields: Option<Map<String, Value>>,
}

fn config_is_unset(config: &Option<InferenceConfig>) -> bool {
    config.as_ref().map_or(true, InferenceConfig::is_empty)
}

fn fields_are_unset(fields: &Option<Map<String, Value>>) -> bool {
    fields.as_ref().map_or(true, Map::is_empty)
}

impl ConverseRequest {
    pub fn new(model_id: impl Into<String>, messages: Vec<Value>) -> Self {
        Self {
            model_id: model_id.into(),
            messages,
            system: Vec::new(),
            inference_config: None,
            additional_model_request_fields: None,
        }
    }

    /// Fold the optional arguments in, dropping the empty ones.
    pub fn with_options(mut self, options: ConverseOptions) -> Self {
        self.system = options.system;
        self.inference_config = options.inference_config.filter(|c| !c.is_empty());
        self.additional_model_request_fields =
            options.additional_model_fields.filter(|f| !f.is_empty());
        self
    }

    /// JSON body for the HTTP API, where the model id lives in the URL.
    pub fn body(&self) -> Result<Value, serde_json::Error> {
        let mut body = serde_json::to_value(self)?;
        if let Some(map) = body.as_object_mut() {
            map.remove("modelId");
        }
        Ok(body)
    }
}

/// Token counters reported with every completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_write_input_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    #[serde(default)]
    pub latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseOutput {
    pub message: OutputMessage,
}

/// Complete reply to a non-streaming call.
///
/// Content blocks stay raw JSON, and keys not modeled here land in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConverseResponse {
    pub output: ResponseOutput,
    #[serde(default)]
    pub stop_reason: String,
    #[serde(default)]
    pub usage: TokenUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_model_response_fields: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConverseResponse {
    /// `output.message.content[0].text`, if the first block is text.
    pub fn first_text(&self) -> Option<&str> {
        self.output.message.content.first()?.get("text")?.as_str()
    }

    /// All text blocks joined with newlines.
    pub fn text(&self) -> String {
        self.output
            .message
            .content
            .iter()
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
