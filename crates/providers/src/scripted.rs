//! Deterministic [`Generator`] for tests: replays canned utterances and
//! can be told to fail the next N generation calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use iv_domain::interview::{InterviewContext, Transcript};
use iv_domain::{Error, Result};

use crate::traits::Generator;

pub struct ScriptedGenerator {
    utterances: Mutex<VecDeque<String>>,
    summary: String,
    /// Number of upcoming calls (utterance or summary) that fail.
    fail_next: AtomicUsize,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(utterances: impl IntoIterator<Item = impl Into<String>>, summary: &str) -> Self {
        Self {
            utterances: Mutex::new(utterances.into_iter().map(Into::into).collect()),
            summary: summary.to_owned(),
            fail_next: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Make the next `n` generation calls fail.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Total generation calls observed (including failed ones).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn maybe_fail(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Provider {
                provider: "scripted".into(),
                message: "scripted failure".into(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Generator for ScriptedGenerator {
    async fn next_utterance(
        &self,
        _context: &InterviewContext,
        _transcript: &Transcript,
        _prior_input: &str,
        wrap_up: bool,
    ) -> Result<String> {
        self.maybe_fail()?;
        let next = self
            .utterances
            .lock()
            .pop_front()
            .unwrap_or_else(|| "That covers everything I wanted to ask.".into());
        if wrap_up {
            Ok(format!("{next} Thank you for your time today."))
        } else {
            Ok(next)
        }
    }

    async fn summarize(
        &self,
        _context: &InterviewContext,
        _transcript: &Transcript,
    ) -> Result<String> {
        self.maybe_fail()?;
        Ok(self.summary.clone())
    }
}
