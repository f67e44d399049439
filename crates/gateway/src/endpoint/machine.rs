//! The timed conversation state machine.
//!
//! Runs over plain channels (the listener bridges them to the socket)
//! so every phase transition and timer race is testable without a
//! network. Phases advance monotonically:
//!
//! `Init → Active → Warning → WrappingUp → Summary → Closed`
//!
//! Three event sources race in the main loop, in documented precedence
//! order: the end trigger always wins, then the warning trigger, then
//! the next peer message. Turns are strictly serialized: one
//! outstanding peer wait at a time, and no new generation request
//! starts once the end trigger has fired.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use iv_domain::interview::{CloseReason, InterviewContext, Phase, Transcript};
use iv_providers::Generator;
use iv_sessions::ContextStore;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Events & frames
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Inbound events from the connected peer.
#[derive(Debug)]
pub enum PeerEvent {
    Message(String),
    Disconnected,
}

/// Outbound frames to the connected peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Close(CloseReason),
}

/// What terminated the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndCause {
    /// The warning-phase wrap-up turn ran to completion.
    Completed,
    /// Peer sent the exit sentinel.
    ExitSentinel,
    /// The end trigger fired.
    TimeExpired,
    /// Peer dropped the connection mid-interview.
    PeerDisconnected,
    /// No context record, or the store failed.
    ContextLoadFailed,
}

/// Terminal report of one session run.
#[derive(Debug)]
pub struct SessionOutcome {
    pub phase: Phase,
    pub cause: EndCause,
    pub transcript: Transcript,
}

/// Resolved timing for one session.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    pub duration: Duration,
    pub warning_lead: Duration,
}

impl Timing {
    pub fn from_minutes(duration_minutes: u64, warning_lead_minutes: u64) -> Self {
        Self {
            duration: Duration::from_secs(duration_minutes * 60),
            warning_lead: Duration::from_secs(warning_lead_minutes * 60),
        }
    }

    /// Apply a per-record duration override, keeping the configured lead.
    fn with_override(self, override_minutes: Option<u64>) -> Self {
        match override_minutes {
            Some(mins) => Self {
                duration: Duration::from_secs(mins * 60),
                warning_lead: self.warning_lead,
            },
            None => self,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Wire text
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Literal sentinel frame sent before the final summary so the peer can
/// distinguish supplementary final content from interview chat.
pub const END_SENTINEL: &str = "END";

/// Reserved peer-sent keyword that forces immediate summary and close.
pub const EXIT_SENTINEL: &str = "exit";

const APOLOGY_UTTERANCE: &str =
    "I'm sorry, I lost my train of thought for a moment. Could you expand on your last answer \
     while I gather the next question?";

const SUMMARY_FALLBACK: &str = "Failed to generate summary due to an error.";

fn interviewer_frame(text: &str) -> String {
    format!("\nInterviewer: {text}\n")
}

fn warning_frame(lead: Duration) -> String {
    format!(
        "\nNote: {} minutes remaining in the interview.\n",
        lead.as_secs() / 60
    )
}

fn summary_frame(summary: &str) -> String {
    format!("\nInterview Summary: {summary}\n")
}

const TIME_UP_FRAME: &str = "\nInterview time is up! Thank you for participating.\n";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session runner
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct SessionMachine {
    session_id: String,
    store: Arc<dyn ContextStore>,
    generator: Arc<dyn Generator>,
    timing: Timing,
}

impl SessionMachine {
    pub fn new(
        session_id: impl Into<String>,
        store: Arc<dyn ContextStore>,
        generator: Arc<dyn Generator>,
        timing: Timing,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            store,
            generator,
            timing,
        }
    }

    /// Drive one session from context load to a terminal phase.
    ///
    /// The returned outcome always has `phase == Closed`; the caller is
    /// responsible for teardown regardless of the cause.
    pub async fn run(
        self,
        peer_rx: &mut mpsc::Receiver<PeerEvent>,
        out: &mpsc::Sender<OutboundFrame>,
    ) -> SessionOutcome {
        let sid = self.session_id.clone();
        let mut transcript = Transcript::new();

        // ── Context load: at most once per session, record removed
        //    immediately so no second endpoint can consume it. ──
        // Phase is Init until the context is in hand; load failure
        // skips straight to Closed with no summary.
        let context = match self.load_context().await {
            Some(ctx) => ctx,
            None => {
                let _ = out.send(OutboundFrame::Close(CloseReason::InternalError)).await;
                tracing::warn!(session_id = %sid, "context load failed, closing session");
                return SessionOutcome {
                    phase: Phase::Closed,
                    cause: EndCause::ContextLoadFailed,
                    transcript,
                };
            }
        };

        let timing = self
            .timing
            .with_override(context.duration_override_minutes());
        let started = Instant::now();
        let end_at = started + timing.duration;
        let warn_at = end_at - timing.warning_lead.min(timing.duration);

        let mut phase = Phase::Active;
        tracing::info!(
            session_id = %sid,
            kind = %context.kind(),
            duration_secs = timing.duration.as_secs(),
            "interview started"
        );

        // Priming turn: empty input, first question out, open turn in.
        let first = self
            .utterance_with_recovery(&context, &transcript, "", false)
            .await;
        if out
            .send(OutboundFrame::Text(interviewer_frame(&first)))
            .await
            .is_err()
        {
            return SessionOutcome {
                phase: Phase::Closed,
                cause: EndCause::PeerDisconnected,
                transcript,
            };
        }
        transcript.append(first);

        let warning = tokio::time::sleep_until(warn_at);
        let ending = tokio::time::sleep_until(end_at);
        tokio::pin!(warning, ending);

        loop {
            tokio::select! {
                // Timeout wins ties: the end trigger is checked before
                // any pending peer message or the warning timer.
                biased;

                _ = &mut ending => {
                    tracing::info!(session_id = %sid, "time budget elapsed, ending interview");
                    let _ = out.send(OutboundFrame::Text(TIME_UP_FRAME.into())).await;
                    self.deliver_summary(&context, &transcript, out).await;
                    return self.finish(phase, EndCause::TimeExpired, transcript, out).await;
                }

                _ = &mut warning, if phase == Phase::Active => {
                    let _ = out
                        .send(OutboundFrame::Text(warning_frame(timing.warning_lead)))
                        .await;
                    phase = Phase::Warning;
                    tracing::debug!(session_id = %sid, "warning trigger fired");
                }

                event = peer_rx.recv() => {
                    let message = match event {
                        Some(PeerEvent::Message(m)) => m,
                        Some(PeerEvent::Disconnected) | None => {
                            tracing::info!(session_id = %sid, "peer disconnected mid-interview");
                            return SessionOutcome {
                                phase: Phase::Closed,
                                cause: EndCause::PeerDisconnected,
                                transcript,
                            };
                        }
                    };

                    if message.trim().eq_ignore_ascii_case(EXIT_SENTINEL) {
                        tracing::info!(session_id = %sid, "exit sentinel received");
                        self.deliver_summary(&context, &transcript, out).await;
                        return self.finish(phase, EndCause::ExitSentinel, transcript, out).await;
                    }

                    if !transcript.answer_last(&message) {
                        tracing::warn!(
                            session_id = %sid,
                            "peer message with no open turn, ignoring"
                        );
                        continue;
                    }

                    match phase {
                        Phase::Active => {
                            let next = self
                                .utterance_with_recovery(&context, &transcript, &message, false)
                                .await;
                            if out
                                .send(OutboundFrame::Text(interviewer_frame(&next)))
                                .await
                                .is_err()
                            {
                                return SessionOutcome {
                                    phase: Phase::Closed,
                                    cause: EndCause::PeerDisconnected,
                                    transcript,
                                };
                            }
                            transcript.append(next);
                        }
                        Phase::Warning => {
                            // Last exchange: wrap up, then summarize without
                            // waiting for another peer message.
                            phase = Phase::WrappingUp;
                            let closing = self
                                .utterance_with_recovery(&context, &transcript, &message, true)
                                .await;
                            let _ = out
                                .send(OutboundFrame::Text(interviewer_frame(&closing)))
                                .await;
                            transcript.append(closing);
                            self.deliver_summary(&context, &transcript, out).await;
                            return self.finish(phase, EndCause::Completed, transcript, out).await;
                        }
                        _ => unreachable!("main loop only runs in Active or Warning"),
                    }
                }
            }
        }
    }

    /// Load the context and delete the backing record immediately, even
    /// though the session continues (and even if it later fails).
    async fn load_context(&self) -> Option<InterviewContext> {
        let loaded = self.store.load(&self.session_id).await;
        let _ = self.store.delete(&self.session_id).await;
        match loaded {
            Ok(Some(ctx)) => Some(ctx),
            Ok(None) => {
                tracing::warn!(session_id = %self.session_id, "no context record found");
                None
            }
            Err(e) => {
                tracing::error!(session_id = %self.session_id, error = %e, "context store failed");
                None
            }
        }
    }

    /// One generation request with the explicit recovery policy: retry
    /// once, then fall back to a fixed apology utterance so the
    /// conversation never silently stalls.
    async fn utterance_with_recovery(
        &self,
        context: &InterviewContext,
        transcript: &Transcript,
        prior_input: &str,
        wrap_up: bool,
    ) -> String {
        for attempt in 0..2 {
            match self
                .generator
                .next_utterance(context, transcript, prior_input, wrap_up)
                .await
            {
                Ok(utterance) => return utterance,
                Err(e) => {
                    tracing::warn!(
                        session_id = %self.session_id,
                        attempt,
                        error = %e,
                        "generation request failed"
                    );
                }
            }
        }
        APOLOGY_UTTERANCE.to_owned()
    }

    /// Deliver `END` + the summary frame, falling back to a fixed
    /// notice when summarization itself fails.
    async fn deliver_summary(
        &self,
        context: &InterviewContext,
        transcript: &Transcript,
        out: &mpsc::Sender<OutboundFrame>,
    ) {
        let summary = match self.generator.summarize(context, transcript).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(
                    session_id = %self.session_id,
                    error = %e,
                    "summary generation failed"
                );
                SUMMARY_FALLBACK.to_owned()
            }
        };
        let _ = out.send(OutboundFrame::Text(END_SENTINEL.into())).await;
        let _ = out.send(OutboundFrame::Text(summary_frame(&summary))).await;
    }

    /// `Summary → Closed`: deliver the normal close after the summary
    /// frames have gone out.
    async fn finish(
        &self,
        reached: Phase,
        cause: EndCause,
        transcript: Transcript,
        out: &mpsc::Sender<OutboundFrame>,
    ) -> SessionOutcome {
        let _ = out.send(OutboundFrame::Close(CloseReason::Normal)).await;
        tracing::info!(
            session_id = %self.session_id,
            ?cause,
            from = ?reached,
            turns = transcript.len(),
            "interview closed"
        );
        SessionOutcome {
            phase: Phase::Closed,
            cause,
            transcript,
        }
    }
}
