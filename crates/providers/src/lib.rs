//! The generation collaborator: interviewer-utterance and summary
//! generation behind the [`Generator`] trait, backed by any
//! OpenAI-compatible chat completions endpoint.

pub mod llm;
pub mod openai_compat;
pub mod prompts;
pub mod scripted;
pub mod traits;

pub use llm::LlmGenerator;
pub use openai_compat::OpenAiCompatClient;
pub use scripted::ScriptedGenerator;
pub use traits::Generator;
