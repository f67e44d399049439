//! [`Generator`] implementation over an OpenAI-compatible endpoint.

use iv_domain::interview::{InterviewContext, Transcript};
use iv_domain::Result;

use crate::openai_compat::OpenAiCompatClient;
use crate::prompts;
use crate::traits::{ChatMessage, ChatRequest, Generator};

pub struct LlmGenerator {
    client: OpenAiCompatClient,
}

impl LlmGenerator {
    pub fn new(client: OpenAiCompatClient) -> Self {
        Self { client }
    }

    /// Replay the transcript as alternating assistant/user messages so
    /// the model sees the whole conversation each turn.
    fn history_messages(transcript: &Transcript) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(transcript.len() * 2);
        for turn in transcript.turns() {
            messages.push(ChatMessage::assistant(&turn.interviewer));
            if turn.is_answered() {
                messages.push(ChatMessage::user(&turn.candidate));
            }
        }
        messages
    }

    /// Assemble the message list for an utterance request.
    ///
    /// The transcript already carries the candidate's latest answer
    /// (the machine fills the open turn before requesting), so the
    /// replayed history is its single carrier. The priming request
    /// appends its fixed opening input instead, and a wrap-up request
    /// suffixes the instruction onto the last answer rather than
    /// repeating the answer as a second message.
    fn utterance_messages(
        context: &InterviewContext,
        transcript: &Transcript,
        prior_input: &str,
        wrap_up: bool,
    ) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(prompts::interviewer_system_prompt(
            context,
        ))];
        messages.extend(Self::history_messages(transcript));

        if prior_input.is_empty() {
            messages.push(ChatMessage::user(prompts::PRIMING_INPUT));
        } else if wrap_up {
            if let Some(last) = messages.last_mut() {
                last.content.push_str(prompts::WRAP_UP_INSTRUCTION);
            }
        }
        messages
    }
}

#[async_trait::async_trait]
impl Generator for LlmGenerator {
    async fn next_utterance(
        &self,
        context: &InterviewContext,
        transcript: &Transcript,
        prior_input: &str,
        wrap_up: bool,
    ) -> Result<String> {
        let messages = Self::utterance_messages(context, transcript, prior_input, wrap_up);

        let resp = self
            .client
            .chat(ChatRequest {
                messages,
                ..Default::default()
            })
            .await?;

        tracing::debug!(
            kind = %context.kind(),
            model = %resp.model,
            wrap_up,
            "interviewer utterance generated"
        );
        Ok(resp.content)
    }

    async fn summarize(
        &self,
        context: &InterviewContext,
        transcript: &Transcript,
    ) -> Result<String> {
        let messages = vec![ChatMessage::system(prompts::summary_system_prompt(
            context, transcript,
        ))];

        let resp = self
            .client
            .chat(ChatRequest {
                messages,
                json_mode: true,
                ..Default::default()
            })
            .await?;

        tracing::debug!(
            kind = %context.kind(),
            turns = transcript.len(),
            "summary generated"
        );
        Ok(resp.content)
    }
}
