//! Google Gemini client
//!
//! Speaks the REST `generateContent` API with function calling. Every call
//! carries the whole transcript and every tool declaration.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::core::config::GeminiConfig;
use crate::core::{model_call_id, Result, Role, ToolCall, ToolOutcome, ToolSpec, Turn, TytuxError};
use crate::llm::traits::{Decision, ModelClient};

/// Schema keys the Gemini function-declaration dialect rejects
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &["$schema", "additionalProperties"];

/// Gemini API client
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    system_instruction: Option<String>,
}

/// generateContent request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDeclarations>,
    generation_config: GenerationConfig,
}

/// A role-tagged list of parts
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

/// One part of a content block; exactly one field is set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolDeclarations {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

/// generateContent response body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GeminiClient {
    /// Create a new Gemini client from configuration
    pub fn from_config(config: &GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TytuxError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            system_instruction: None,
        })
    }

    /// Set the system instruction sent with every request
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Model this client talks to
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    /// Convert the transcript and tool specs to a request body
    fn build_request(&self, transcript: &[Turn], tools: &[ToolSpec]) -> GenerateRequest {
        let contents = transcript.iter().map(to_content).collect();

        let tools = if tools.is_empty() {
            Vec::new()
        } else {
            vec![ToolDeclarations {
                function_declarations: tools.iter().map(to_declaration).collect(),
            }]
        };

        GenerateRequest {
            system_instruction: self.system_instruction.as_ref().map(|text| Content {
                role: None,
                parts: vec![Part {
                    text: Some(text.clone()),
                    ..Default::default()
                }],
            }),
            contents,
            tools,
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        }
    }
}

/// Map one transcript turn to Gemini content
fn to_content(turn: &Turn) -> Content {
    match turn.role {
        Role::User => Content {
            role: Some("user".to_string()),
            parts: vec![text_part(&turn.content)],
        },
        Role::Assistant => {
            let mut parts = Vec::new();
            if !turn.content.is_empty() || turn.tool_calls.is_empty() {
                parts.push(text_part(&turn.content));
            }
            parts.extend(turn.tool_calls.iter().map(|call| Part {
                function_call: Some(FunctionCall {
                    id: call.model_id().map(String::from),
                    name: call.name.clone(),
                    args: call.arguments.clone(),
                }),
                ..Default::default()
            }));
            Content {
                role: Some("model".to_string()),
                parts,
            }
        }
        Role::Tool => Content {
            role: Some("user".to_string()),
            parts: turn
                .tool_results
                .iter()
                .map(|result| {
                    let response = match &result.outcome {
                        ToolOutcome::Ok(payload) => json!({ "result": payload }),
                        ToolOutcome::Error(message) => json!({ "error": message }),
                    };
                    Part {
                        function_response: Some(FunctionResponse {
                            id: model_call_id(&result.call_id).map(String::from),
                            name: result.name.clone(),
                            response,
                        }),
                        ..Default::default()
                    }
                })
                .collect(),
        },
    }
}

fn text_part(text: &str) -> Part {
    Part {
        text: Some(text.to_string()),
        ..Default::default()
    }
}

/// Map a tool spec to a function declaration
fn to_declaration(spec: &ToolSpec) -> FunctionDeclaration {
    // Gemini rejects OBJECT schemas with no properties
    let has_properties = spec
        .parameters
        .get("properties")
        .and_then(|p| p.as_object())
        .map(|p| !p.is_empty())
        .unwrap_or(false);

    FunctionDeclaration {
        name: spec.name.clone(),
        description: spec.description.clone(),
        parameters: has_properties.then(|| sanitize_schema(&spec.parameters)),
    }
}

/// Strip schema keys Gemini does not accept, recursively
pub fn sanitize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !UNSUPPORTED_SCHEMA_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), sanitize_schema(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_schema).collect()),
        other => other.clone(),
    }
}

/// Turn a response body into a decision
fn to_decision(response: GenerateResponse) -> Result<Decision> {
    let candidate = match response.candidates.into_iter().next() {
        Some(candidate) => candidate,
        None => {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(TytuxError::model(format!("empty response ({})", reason)));
        }
    };

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    if parts.is_empty() {
        return Err(TytuxError::model(format!(
            "response has no content (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    let mut text = String::new();
    let mut calls = Vec::new();
    for part in parts {
        if let Some(fc) = part.function_call {
            let arguments = if fc.args.is_null() { json!({}) } else { fc.args };
            calls.push(ToolCall::new(fc.id.unwrap_or_default(), fc.name, arguments));
        } else if let Some(t) = part.text {
            text.push_str(&t);
        }
    }

    if calls.is_empty() {
        Ok(Decision::FinalAnswer(text))
    } else {
        Ok(Decision::ToolCallBatch { text, calls })
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn decide(&self, transcript: &[Turn], tools: &[ToolSpec]) -> Result<Decision> {
        let request = self.build_request(transcript, tools);
        debug!(
            model = %self.model,
            turns = transcript.len(),
            tools = tools.len(),
            "calling Gemini"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| TytuxError::model(format!("request to Gemini failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(TytuxError::model(format!(
                "Gemini API error ({}): {}",
                status, error_text
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| TytuxError::model(format!("unreadable Gemini response: {}", e)))?;

        let decision = to_decision(body)?;
        debug!(final_answer = decision.is_final(), "Gemini decided");
        Ok(decision)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
