//! OpenAI-compatible tool selector
//!
//! Sends the query and a model summary to a chat-completions endpoint with the
//! mesh tool catalogue attached as function tools, and turns the returned
//! `tool_calls` into [`ToolCall`]s.

use std::sync::Arc;

use async_trait::async_trait;
use nlmesh_agent::{
    templates::{tool_selection_prompt, ANALYSIS_SYSTEM_PROMPT},
    tool_definitions, ModelMetadata, ToolCall, ToolSelectionError, ToolSelector,
};
use nlmesh_config::LlmConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{ProviderError, Result};

/// Default endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default chat model
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Tool selector backed by an OpenAI-compatible chat-completions API
pub struct OpenAiToolSelector {
    api_key: String,
    client: Arc<Client>,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiToolSelector {
    /// Create a selector against the public OpenAI endpoint
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_string())
    }

    /// Create a selector with a custom base URL
    pub fn with_base_url(api_key: String, base_url: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(ProviderError::ConfigError(
                "OpenAI API key is required".to_string(),
            ));
        }

        Ok(Self {
            api_key,
            client: Arc::new(Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: 1000,
        })
    }

    /// Create a selector from the `llm` configuration section
    ///
    /// # Errors
    ///
    /// [`ProviderError::ConfigError`] when the configured key variable is unset.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config.api_key().ok_or_else(|| {
            ProviderError::ConfigError(format!(
                "environment variable {} is not set",
                config.api_key_env
            ))
        })?;

        let mut selector = Self::with_base_url(api_key, config.base_url.clone())?;
        selector.model = config.model.clone();
        selector.temperature = config.temperature;
        selector.max_tokens = config.max_tokens;
        Ok(selector)
    }

    /// Use a different chat model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// The chat model in use
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The endpoint root in use
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_auth_header(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    fn build_request(&self, query: &str, model: &ModelMetadata) -> OpenAiChatRequest {
        OpenAiChatRequest {
            model: self.model.clone(),
            messages: vec![
                OpenAiMessage {
                    role: "system".to_string(),
                    content: ANALYSIS_SYSTEM_PROMPT.to_string(),
                },
                OpenAiMessage {
                    role: "user".to_string(),
                    content: tool_selection_prompt(query, model),
                },
            ],
            tools: tool_definitions()
                .into_iter()
                .map(|definition| OpenAiTool {
                    kind: "function".to_string(),
                    function: OpenAiFunction {
                        name: definition.name,
                        description: definition.description,
                        parameters: definition.parameters,
                    },
                })
                .collect(),
            tool_choice: "auto".to_string(),
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
        }
    }

    /// Ask the remote model which tools to run
    pub async fn request_tools(&self, query: &str, model: &ModelMetadata) -> Result<Vec<ToolCall>> {
        let request = self.build_request(query, model);

        debug!(model = %self.model, tools = request.tools.len(), "Requesting tool selection");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", self.get_auth_header())
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Tool selection request failed: {}", e);
                ProviderError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("OpenAI API error ({}): {}", status, error_text);

            return match status.as_u16() {
                401 => Err(ProviderError::AuthError),
                429 => Err(ProviderError::RateLimited(60)),
                _ => Err(ProviderError::ProviderError(format!(
                    "OpenAI API error: {}",
                    status
                ))),
            };
        }

        let body: OpenAiChatResponse = response.json().await?;
        Self::convert_response(body)
    }

    fn convert_response(response: OpenAiChatResponse) -> Result<Vec<ToolCall>> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ProviderError("No choices in response".to_string()))?;

        let calls = choice
            .message
            .and_then(|message| message.tool_calls)
            .unwrap_or_default();

        calls
            .into_iter()
            .map(|call| {
                let args = parse_arguments(&call.function.arguments)?;
                Ok(ToolCall {
                    tool_name: call.function.name,
                    args,
                })
            })
            .collect()
    }
}

/// Tool arguments arrive as a JSON-encoded string; blank means no arguments.
fn parse_arguments(raw: &str) -> Result<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw).map_err(|e| ProviderError::ParseError(e.to_string()))
}

#[async_trait]
impl ToolSelector for OpenAiToolSelector {
    async fn select_tools(
        &self,
        query: &str,
        model: &ModelMetadata,
    ) -> std::result::Result<Vec<ToolCall>, ToolSelectionError> {
        Ok(self.request_tools(query, model).await?)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[derive(Debug, Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    tools: Vec<OpenAiTool>,
    tool_choice: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    kind: String,
    function: OpenAiFunction,
}

#[derive(Debug, Serialize)]
struct OpenAiFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: Option<OpenAiResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    #[serde(default)]
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCall {
    function: OpenAiFunctionCall,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_rejected() {
        match OpenAiToolSelector::new(String::new()) {
            Err(e) => assert!(e.to_string().contains("API key is required")),
            Ok(_) => panic!("Expected error for empty API key"),
        }
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let selector =
            OpenAiToolSelector::with_base_url("sk-test".to_string(), "http://localhost/v1/".to_string())
                .unwrap();
        assert_eq!(selector.base_url(), "http://localhost/v1");
        assert_eq!(selector.model(), DEFAULT_MODEL);
    }

    #[test]
    fn converts_tool_calls() {
        let body: OpenAiChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":null,"tool_calls":[
                {"id":"call_1","type":"function","function":{"name":"measure_volume","arguments":"{}"}},
                {"id":"call_2","type":"function","function":{"name":"detect_holes","arguments":""}}
            ]}}]}"#,
        )
        .unwrap();
        let calls = OpenAiToolSelector::convert_response(body).unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].tool_name, "measure_volume");
        assert_eq!(calls[1].args, serde_json::json!({}));
    }

    #[test]
    fn plain_answer_means_no_tools() {
        let body: OpenAiChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"The model looks fine."}}]}"#,
        )
        .unwrap();
        assert!(OpenAiToolSelector::convert_response(body).unwrap().is_empty());
    }

    #[test]
    fn malformed_arguments_are_parse_errors() {
        assert!(matches!(
            parse_arguments("{not json"),
            Err(ProviderError::ParseError(_))
        ));
        let body: OpenAiChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(
            OpenAiToolSelector::convert_response(body),
            Err(ProviderError::ProviderError(_))
        ));
    }

    #[test]
    fn request_carries_the_catalogue() {
        use chrono::Utc;
        use nlmesh_agent::ModelFormat;
        use nlmesh_mesh::BoundingBox;

        let selector = OpenAiToolSelector::new("sk-test".to_string()).unwrap();
        let metadata = ModelMetadata {
            file_name: "bracket.step".to_string(),
            format: ModelFormat::Step,
            file_size: 4096,
            vertex_count: 120,
            face_count: 236,
            bounding_box: BoundingBox::default(),
            registered_at: Utc::now(),
        };
        let request = serde_json::to_value(selector.build_request("how big is it?", &metadata)).unwrap();
        assert_eq!(request["tools"].as_array().unwrap().len(), 6);
        assert_eq!(request["tools"][0]["type"], "function");
        assert_eq!(request["tools"][0]["function"]["name"], "measure_volume");
        assert_eq!(request["tool_choice"], "auto");
        assert!(request["messages"][1]["content"]
            .as_str()
            .unwrap()
            .contains("bracket.step"));
    }
}
