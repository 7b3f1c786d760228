//! Caregiver chat assistant
//!
//! Each request appends the caregiver's message to the session history and
//! asks the model for a reply. When the model calls a function it is run
//! through a [`FunctionRunner`], the result is appended, and the model is
//! asked again, up to [`MAX_FUNCTION_ROUNDS`] times.

pub mod functions;
pub mod gemini;
pub mod model;
pub mod session;

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

pub use functions::{CallContext, DbFunctions, FunctionError, FunctionRunner};
pub use gemini::GeminiClient;
pub use model::{ChatModel, FunctionCall, FunctionDeclaration, ModelError, ModelReply, Part, Role, Turn};
pub use session::SessionStore;

/// Rounds of function calling allowed per message.
pub const MAX_FUNCTION_ROUNDS: usize = 3;

/// Session used when the client does not name one.
pub const DEFAULT_SESSION: &str = "default";

/// Reply used when the model keeps calling functions past the limit.
const ROUNDS_EXHAUSTED_REPLY: &str =
    "I wasn't able to finish that request. Please try rephrasing it or breaking it into smaller steps.";

const SYSTEM_PROMPT: &str = "You are Carelink, an assistant for family caregivers of people living \
with dementia. Answer warmly and concisely. You can schedule appointments, summarise a patient's \
care record and suggest community resources by calling the functions provided. Never invent \
patient data: call generate_report when you need it. Confirm what you did after calling a \
function that changes data.";

/// Function executed while answering, reported back to the client
#[derive(Debug, Clone, Serialize)]
pub struct Action {
    pub name: String,
    pub result: Value,
}

/// Final answer to one chat message
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub reply: String,
    pub actions: Vec<Action>,
}

/// Chat error type
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Chat assistant: model, function runner and session histories
pub struct Assistant {
    model: Arc<dyn ChatModel>,
    functions: Arc<dyn FunctionRunner>,
    declarations: Vec<FunctionDeclaration>,
    sessions: SessionStore,
}

impl Assistant {
    pub fn new(model: Arc<dyn ChatModel>, functions: Arc<dyn FunctionRunner>) -> Self {
        Self {
            model,
            functions,
            declarations: functions::declarations(),
            sessions: SessionStore::new(),
        }
    }

    /// Forget a session's history. Returns whether it existed.
    pub fn clear(&self, session_id: &str) -> bool {
        self.sessions.clear(session_id)
    }

    /// Answer one caregiver message.
    ///
    /// On a model failure the session is dropped so the next message starts
    /// fresh. Function failures are reported to the model, not the caller.
    pub async fn chat(
        &self,
        session_id: &str,
        message: &str,
        ctx: CallContext,
    ) -> Result<ChatOutcome, AssistantError> {
        let mut history = self.sessions.history(session_id);
        history.push(Turn::user_text(message));
        let system = system_prompt(ctx);
        let mut actions = Vec::new();

        for round in 0..=MAX_FUNCTION_ROUNDS {
            // The final round offers no functions so the model has to answer.
            let offered: &[FunctionDeclaration] = if round < MAX_FUNCTION_ROUNDS {
                &self.declarations
            } else {
                &[]
            };

            let reply = match self.model.generate(&system, &history, offered).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(session = session_id, error = %e, "chat model failed, dropping session");
                    self.sessions.clear(session_id);
                    return Err(e.into());
                }
            };

            match reply {
                ModelReply::Text(text) => {
                    history.push(Turn::model_text(text.clone()));
                    self.sessions.store(session_id, history);
                    return Ok(ChatOutcome { reply: text, actions });
                }
                ModelReply::FunctionCalls(calls) => {
                    if round == MAX_FUNCTION_ROUNDS {
                        break;
                    }
                    let responses = self.run_calls(&calls, ctx, &mut actions).await;
                    history.push(Turn {
                        role: Role::Model,
                        parts: calls.into_iter().map(Part::FunctionCall).collect(),
                    });
                    history.push(Turn {
                        role: Role::User,
                        parts: responses,
                    });
                }
            }
        }

        tracing::warn!(session = session_id, "function rounds exhausted");
        history.push(Turn::model_text(ROUNDS_EXHAUSTED_REPLY));
        self.sessions.store(session_id, history);
        Ok(ChatOutcome {
            reply: ROUNDS_EXHAUSTED_REPLY.to_string(),
            actions,
        })
    }

    async fn run_calls(&self, calls: &[FunctionCall], ctx: CallContext, actions: &mut Vec<Action>) -> Vec<Part> {
        let mut responses = Vec::with_capacity(calls.len());
        for call in calls {
            let result = match self.functions.call(&call.name, &call.args, ctx).await {
                Ok(value) => {
                    tracing::info!(function = %call.name, "assistant function succeeded");
                    value
                }
                Err(FunctionError::Db(e)) => {
                    tracing::error!(function = %call.name, error = %e, "assistant function hit the database");
                    json!({ "error": "internal error" })
                }
                Err(e) => {
                    tracing::info!(function = %call.name, error = %e, "assistant function rejected");
                    json!({ "error": e.to_string() })
                }
            };
            actions.push(Action {
                name: call.name.clone(),
                result: result.clone(),
            });
            responses.push(Part::FunctionResponse {
                name: call.name.clone(),
                response: result,
            });
        }
        responses
    }
}

fn system_prompt(ctx: CallContext) -> String {
    let now = carelink_core::timestamp::now();
    let mut prompt = format!(
        "{SYSTEM_PROMPT}\n\nCurrent UTC time: {}.",
        carelink_core::timestamp::format(&now)
    );
    if let Some(pid) = ctx.patient_id {
        prompt.push_str(&format!(
            " The caregiver is currently viewing patient {pid}; use this patient_id unless told otherwise."
        ));
    }
    prompt
}
