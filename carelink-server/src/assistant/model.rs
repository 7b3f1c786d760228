//! Provider-neutral chat model interface

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

/// One piece of a turn
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    FunctionCall(FunctionCall),
    FunctionResponse { name: String, response: Value },
}

/// A conversation turn
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part::Text(text.into())],
        }
    }
}

/// Function the model asked us to run
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Value,
}

/// Function offered to the model, with a JSON-schema-style parameter object
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDeclaration {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

/// What the model answered with
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Text(String),
    FunctionCalls(Vec<FunctionCall>),
}

/// Model call error type
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model response malformed: {0}")]
    Malformed(String),
}

/// A generative model that can answer with text or function calls
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(
        &self,
        system: &str,
        history: &[Turn],
        functions: &[FunctionDeclaration],
    ) -> Result<ModelReply, ModelError>;
}
