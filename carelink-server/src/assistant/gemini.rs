//! Gemini `generateContent` REST client
//!
//! Only the subset of the API the assistant needs: system instruction,
//! multi-turn contents, function declarations and function call parts.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::{ChatModel, FunctionCall, FunctionDeclaration, ModelError, ModelReply, Part, Role, Turn};

/// Error bodies are truncated before they reach logs or callers.
const MAX_ERROR_BODY: usize = 500;

/// Gemini client
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: WireContent,
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireTool<'a> {
    function_declarations: &'a [FunctionDeclaration],
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct WireContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<WireFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<WireFunctionResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: WireContent,
    finish_reason: Option<String>,
}

impl From<&Part> for WirePart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text(text) => Self {
                text: Some(text.clone()),
                ..Self::default()
            },
            Part::FunctionCall(call) => Self {
                function_call: Some(WireFunctionCall {
                    name: call.name.clone(),
                    args: call.args.clone(),
                }),
                ..Self::default()
            },
            Part::FunctionResponse { name, response } => Self {
                function_response: Some(WireFunctionResponse {
                    name: name.clone(),
                    response: response.clone(),
                }),
                ..Self::default()
            },
        }
    }
}

impl From<&Turn> for WireContent {
    fn from(turn: &Turn) -> Self {
        let role = match turn.role {
            Role::User => "user",
            Role::Model => "model",
        };
        Self {
            role: Some(role.to_string()),
            parts: turn.parts.iter().map(WirePart::from).collect(),
        }
    }
}

fn build_request<'a>(system: &str, history: &[Turn], functions: &'a [FunctionDeclaration]) -> GenerateRequest<'a> {
    GenerateRequest {
        system_instruction: WireContent {
            role: None,
            parts: vec![WirePart {
                text: Some(system.to_string()),
                ..WirePart::default()
            }],
        },
        contents: history.iter().map(WireContent::from).collect(),
        tools: if functions.is_empty() {
            Vec::new()
        } else {
            vec![WireTool {
                function_declarations: functions,
            }]
        },
    }
}

/// Function calls win over text when a candidate carries both.
fn interpret(response: GenerateResponse) -> Result<ModelReply, ModelError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::Malformed("no candidates".into()))?;

    let mut calls = Vec::new();
    let mut text = String::new();
    for part in candidate.content.parts {
        if let Some(call) = part.function_call {
            calls.push(FunctionCall {
                name: call.name,
                args: call.args,
            });
        } else if let Some(t) = part.text {
            text.push_str(&t);
        }
    }

    if !calls.is_empty() {
        return Ok(ModelReply::FunctionCalls(calls));
    }
    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
        return Err(ModelError::Malformed(format!("empty reply (finish reason: {reason})")));
    }
    Ok(ModelReply::Text(text))
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn generate(
        &self,
        system: &str,
        history: &[Turn],
        functions: &[FunctionDeclaration],
    ) -> Result<ModelReply, ModelError> {
        let request = build_request(system, history, functions);
        tracing::debug!(model = %self.model, turns = history.len(), "calling gemini");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
                body.push_str("...");
            }
            return Err(ModelError::Status { status, body });
        }

        let parsed: GenerateResponse = response.json().await?;
        interpret(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_uses_gemini_wire_names() {
        let decls = vec![FunctionDeclaration {
            name: "recommend_resources",
            description: "Find resources",
            parameters: json!({"type": "object", "properties": {}}),
        }];
        let history = vec![
            Turn::user_text("Any support groups?"),
            Turn {
                role: Role::Model,
                parts: vec![Part::FunctionCall(FunctionCall {
                    name: "recommend_resources".into(),
                    args: json!({"category": "support groups"}),
                })],
            },
            Turn {
                role: Role::User,
                parts: vec![Part::FunctionResponse {
                    name: "recommend_resources".into(),
                    response: json!({"resources": []}),
                }],
            },
        ];

        let wire = serde_json::to_value(build_request("be kind", &history, &decls)).unwrap();
        assert_eq!(wire["systemInstruction"]["parts"][0]["text"], "be kind");
        assert!(wire["systemInstruction"].get("role").is_none());
        assert_eq!(wire["contents"][0]["role"], "user");
        assert_eq!(wire["contents"][1]["parts"][0]["functionCall"]["name"], "recommend_resources");
        assert_eq!(
            wire["contents"][2]["parts"][0]["functionResponse"]["response"],
            json!({"resources": []})
        );
        assert_eq!(wire["tools"][0]["functionDeclarations"][0]["name"], "recommend_resources");
    }

    #[test]
    fn no_tools_key_without_functions() {
        let wire = serde_json::to_value(build_request("s", &[Turn::user_text("hi")], &[])).unwrap();
        assert!(wire.get("tools").is_none());
    }

    #[test]
    fn text_parts_are_joined() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Hello "}, {"text": "there"}]}}]
        }))
        .unwrap();
        assert_eq!(interpret(response).unwrap(), ModelReply::Text("Hello there".into()));
    }

    #[test]
    fn function_calls_are_extracted() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"role": "model", "parts": [
                {"functionCall": {"name": "generate_report", "args": {"patient_id": 1}}}
            ]}}]
        }))
        .unwrap();
        match interpret(response).unwrap() {
            ModelReply::FunctionCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].name, "generate_report");
                assert_eq!(calls[0].args["patient_id"], 1);
            }
            other => panic!("expected function calls, got {other:?}"),
        }
    }

    #[test]
    fn blocked_reply_is_an_error() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }))
        .unwrap();
        let err = interpret(response).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));

        let empty: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(interpret(empty), Err(ModelError::Malformed(_))));
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let client = GeminiClient::new("k", "gemini-2.5-flash", "https://example.test/v1beta/");
        assert_eq!(
            client.endpoint(),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}
