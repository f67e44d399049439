use iv_domain::interview::{InterviewContext, Transcript};
use iv_domain::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Chat wire types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A chat completion request against an OpenAI-compatible endpoint.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature. `None` lets the endpoint choose.
    pub temperature: Option<f32>,
    /// Model override. `None` uses the client default.
    pub model: Option<String>,
    /// When `true`, ask the model to respond with valid JSON only.
    pub json_mode: bool,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    /// The model that actually produced the response.
    pub model: String,
    pub finish_reason: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Generator trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The generation collaborator consumed by the conversation state
/// machine. Implementations own prompt content and scoring rubrics;
/// the orchestration layer only requires these two operations.
#[async_trait::async_trait]
pub trait Generator: Send + Sync {
    /// Produce the next interviewer utterance.
    ///
    /// `prior_input` is the candidate's latest answer (empty for the
    /// priming request that opens the interview). When `wrap_up` is
    /// set, the utterance must close the conversation rather than ask
    /// another question.
    async fn next_utterance(
        &self,
        context: &InterviewContext,
        transcript: &Transcript,
        prior_input: &str,
        wrap_up: bool,
    ) -> Result<String>;

    /// Produce the final structured performance report from the full
    /// transcript and context.
    async fn summarize(
        &self,
        context: &InterviewContext,
        transcript: &Transcript,
    ) -> Result<String>;
}
