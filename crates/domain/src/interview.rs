//! Core interview vocabulary: session kinds, conversation phases, turns,
//! transcripts, and the kind-specific context payloads loaded from the
//! context store.

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session kind
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The three interview categories. Each kind selects its own context
/// schema, prompt shape, and base port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// Behavioral/HR interview driven by candidate background data.
    Role,
    /// Interview about a described (e.g. ML) project.
    Project,
    /// Technical interview grounded in an uploaded repository.
    Repository,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::Project => "project",
            Self::Repository => "repository",
        }
    }
}

impl std::fmt::Display for SessionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation phase
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Position in the conversation state machine.
///
/// Transitions are monotonic: a session never re-enters an earlier
/// phase, and `Closed` is terminal. Every decision point in the machine
/// matches on this enum rather than on ad-hoc flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Init,
    Active,
    Warning,
    WrappingUp,
    Summary,
    Closed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        *self == Self::Closed
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turns & transcript
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One interviewer-utterance / candidate-utterance pair.
///
/// The candidate field starts empty and is the only field written after
/// creation, filled in exactly once when the peer answers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub interviewer: String,
    pub candidate: String,
}

impl Turn {
    pub fn unanswered(interviewer: impl Into<String>) -> Self {
        Self {
            interviewer: interviewer.into(),
            candidate: String::new(),
        }
    }

    pub fn is_answered(&self) -> bool {
        !self.candidate.is_empty()
    }
}

/// Append-only ordered record of turns. Input to summary generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new turn with an empty candidate field.
    pub fn append(&mut self, interviewer_utterance: impl Into<String>) {
        self.turns.push(Turn::unanswered(interviewer_utterance));
    }

    /// Fill in the candidate answer on the most recent turn.
    ///
    /// Returns `false` when there is no open turn to answer (empty
    /// transcript or last turn already answered); the caller decides
    /// whether that is a protocol violation.
    pub fn answer_last(&mut self, candidate_utterance: impl Into<String>) -> bool {
        match self.turns.last_mut() {
            Some(turn) if !turn.is_answered() => {
                turn.candidate = candidate_utterance.into();
                true
            }
            _ => false,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Render the transcript as the plain-text block the summarizer
    /// consumes: `Interviewer: …` / `Candidate: …` pairs separated by
    /// blank lines.
    pub fn render(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("Interviewer: {}\nCandidate: {}", t.interviewer, t.candidate))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Kind-specific context payloads
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Background data for a role (behavioral) interview.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleContext {
    pub name: String,
    pub role: String,
    pub experience: String,
    pub company_applying: String,
    pub job_description: String,
}

/// Background data for a project interview.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectContext {
    pub description: String,
    /// Optional per-record override of the configured interview length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interview_duration_minutes: Option<u64>,
}

/// Background data for a repository-grounded technical interview.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepositoryContext {
    pub readme: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_data: Option<String>,
    pub description: String,
    /// Optional per-record override of the configured interview length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interview_duration_minutes: Option<u64>,
}

/// Immutable session-specific input data, loaded exactly once from the
/// context store when the first valid peer connects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InterviewContext {
    Role(RoleContext),
    Project(ProjectContext),
    Repository(RepositoryContext),
}

impl InterviewContext {
    pub fn kind(&self) -> SessionKind {
        match self {
            Self::Role(_) => SessionKind::Role,
            Self::Project(_) => SessionKind::Project,
            Self::Repository(_) => SessionKind::Repository,
        }
    }

    /// Per-record interview duration override, in minutes.
    pub fn duration_override_minutes(&self) -> Option<u64> {
        match self {
            Self::Role(_) => None,
            Self::Project(c) => c.interview_duration_minutes,
            Self::Repository(c) => c.interview_duration_minutes,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Close reasons
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Why a session's connection was closed. Each variant maps to a
/// distinct WebSocket close code so peers can inspect the reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The phase machine ran to completion (summary delivered, or the
    /// peer issued the exit sentinel).
    Normal,
    /// The connecting peer declared a session id that does not match
    /// the endpoint's owner.
    PolicyViolation,
    /// The session context could not be loaded, or another internal
    /// failure made the session unable to proceed.
    InternalError,
}

impl CloseReason {
    /// WebSocket close code for this reason.
    pub fn code(&self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::PolicyViolation => 1008,
            Self::InternalError => 1011,
        }
    }

    /// Human-readable close frame text.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Normal => "interview complete",
            Self::PolicyViolation => "invalid session ID",
            Self::InternalError => "failed to load session context",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_appends_and_answers_once() {
        let mut t = Transcript::new();
        t.append("Tell me about yourself.");
        assert_eq!(t.len(), 1);
        assert!(!t.turns()[0].is_answered());

        assert!(t.answer_last("I build distributed systems."));
        assert!(t.turns()[0].is_answered());

        // The candidate field is filled exactly once.
        assert!(!t.answer_last("second answer"));
        assert_eq!(t.turns()[0].candidate, "I build distributed systems.");
    }

    #[test]
    fn answer_on_empty_transcript_is_rejected() {
        let mut t = Transcript::new();
        assert!(!t.answer_last("hello"));
        assert!(t.is_empty());
    }

    #[test]
    fn render_interleaves_roles() {
        let mut t = Transcript::new();
        t.append("Q1");
        t.answer_last("A1");
        t.append("Q2");
        let rendered = t.render();
        assert_eq!(rendered, "Interviewer: Q1\nCandidate: A1\n\nInterviewer: Q2\nCandidate: ");
    }

    #[test]
    fn phases_are_ordered() {
        assert!(Phase::Init < Phase::Active);
        assert!(Phase::Active < Phase::Warning);
        assert!(Phase::Warning < Phase::WrappingUp);
        assert!(Phase::WrappingUp < Phase::Summary);
        assert!(Phase::Summary < Phase::Closed);
        assert!(Phase::Closed.is_terminal());
        assert!(!Phase::Warning.is_terminal());
    }

    #[test]
    fn close_reasons_map_to_distinct_codes() {
        assert_eq!(CloseReason::Normal.code(), 1000);
        assert_eq!(CloseReason::PolicyViolation.code(), 1008);
        assert_eq!(CloseReason::InternalError.code(), 1011);
    }

    #[test]
    fn context_kind_and_override() {
        let ctx = InterviewContext::Repository(RepositoryContext {
            readme: "# demo".into(),
            dependencies: vec!["tokio".into()],
            site_data: None,
            description: "a demo".into(),
            interview_duration_minutes: Some(30),
        });
        assert_eq!(ctx.kind(), SessionKind::Repository);
        assert_eq!(ctx.duration_override_minutes(), Some(30));

        let role = InterviewContext::Role(RoleContext {
            name: "A".into(),
            role: "SWE".into(),
            experience: "5y".into(),
            company_applying: "Acme".into(),
            job_description: "backend".into(),
        });
        assert_eq!(role.duration_override_minutes(), None);
    }

    #[test]
    fn context_serde_round_trip_is_kind_tagged() {
        let ctx = InterviewContext::Project(ProjectContext {
            description: "churn model".into(),
            interview_duration_minutes: None,
        });
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["kind"], "project");
        let back: InterviewContext = serde_json::from_value(json).unwrap();
        assert_eq!(back, ctx);
    }
}
