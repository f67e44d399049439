//! TOML configuration with per-field defaults.
//!
//! Every field has a serde default so an empty file (or no file at all)
//! yields a runnable dev configuration. `Config::validate` reports
//! issues without aborting so the caller decides what is fatal.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::interview::SessionKind;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub interview: InterviewConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

impl Config {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Check the config for inconsistencies. Errors make the config
    /// unusable; warnings are surfaced but tolerated.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.interview.warning_lead_minutes >= self.interview.duration_minutes {
            issues.push(ConfigIssue::error(format!(
                "interview.warning_lead_minutes ({}) must be less than duration_minutes ({})",
                self.interview.warning_lead_minutes, self.interview.duration_minutes
            )));
        }

        let bp = &self.gateway.base_ports;
        let mut ports = [
            (SessionKind::Role, bp.role),
            (SessionKind::Project, bp.project),
            (SessionKind::Repository, bp.repository),
        ];
        ports.sort_by_key(|(_, p)| *p);
        for pair in ports.windows(2) {
            if pair[0].1 == pair[1].1 {
                issues.push(ConfigIssue::error(format!(
                    "gateway.base_ports: {} and {} share port {}",
                    pair[0].0, pair[1].0, pair[0].1
                )));
            } else if pair[1].1 - pair[0].1 < 50 {
                issues.push(ConfigIssue::warning(format!(
                    "gateway.base_ports: {} ({}) and {} ({}) are close enough to contend \
                     under many concurrent sessions",
                    pair[0].0, pair[0].1, pair[1].0, pair[1].1
                )));
            }
        }

        if self.llm.api_key_env.is_empty() && self.llm.api_key.is_none() {
            issues.push(ConfigIssue::warning(
                "llm: no api_key or api_key_env configured; generation requests will be \
                 unauthenticated"
                    .to_string(),
            ));
        }

        issues
    }
}

/// A validation finding with its severity.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Warning,
    Error,
}

impl ConfigIssue {
    fn error(message: String) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            message,
        }
    }

    fn warning(message: String) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            message,
        }
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Control-plane HTTP server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_bind")]
    pub bind: String,
    #[serde(default = "d_api_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: d_bind(),
            port: d_api_port(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Interview endpoints
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Host advertised in the returned WebSocket URLs.
    #[serde(default = "d_bind")]
    pub advertised_host: String,
    /// Interface the per-session listeners bind to.
    #[serde(default = "d_bind")]
    pub bind: String,
    #[serde(default)]
    pub base_ports: BasePorts,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            advertised_host: d_bind(),
            bind: d_bind(),
            base_ports: BasePorts::default(),
        }
    }
}

/// Each session category scans upward from its own base port, so
/// concurrently active sessions of different categories never contend
/// for the same integer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasePorts {
    #[serde(default = "d_port_role")]
    pub role: u16,
    #[serde(default = "d_port_project")]
    pub project: u16,
    #[serde(default = "d_port_repository")]
    pub repository: u16,
}

impl Default for BasePorts {
    fn default() -> Self {
        Self {
            role: d_port_role(),
            project: d_port_project(),
            repository: d_port_repository(),
        }
    }
}

impl BasePorts {
    pub fn for_kind(&self, kind: SessionKind) -> u16 {
        match kind {
            SessionKind::Role => self.role,
            SessionKind::Project => self.project,
            SessionKind::Repository => self.repository,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewConfig {
    /// Default interview length. Project and repository records may
    /// override this per session.
    #[serde(default = "d_duration")]
    pub duration_minutes: u64,
    /// How long before the end the remaining-time notice is sent.
    #[serde(default = "d_warning_lead")]
    pub warning_lead_minutes: u64,
    /// Where finished transcripts are archived as JSONL. `None`
    /// disables archiving.
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            duration_minutes: d_duration(),
            warning_lead_minutes: d_warning_lead(),
            archive_dir: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Generation backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions endpoint.
    #[serde(default = "d_llm_url")]
    pub base_url: String,
    #[serde(default = "d_llm_model")]
    pub model: String,
    /// Environment variable holding the API key.
    #[serde(default = "d_llm_key_env")]
    pub api_key_env: String,
    /// Inline API key; takes precedence over `api_key_env`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    #[serde(default = "d_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: d_llm_url(),
            model: d_llm_model(),
            api_key_env: d_llm_key_env(),
            api_key: None,
            temperature: d_temperature(),
            timeout_secs: d_llm_timeout(),
        }
    }
}

impl LlmConfig {
    /// Resolve the API key: inline config first, then the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            return Some(key.clone());
        }
        std::env::var(&self.api_key_env).ok()
    }
}

// ── Default value helpers ─────────────────────────────────────────────

fn d_bind() -> String {
    "127.0.0.1".into()
}
fn d_api_port() -> u16 {
    3000
}
fn d_port_role() -> u16 {
    6000
}
fn d_port_project() -> u16 {
    6100
}
fn d_port_repository() -> u16 {
    6200
}
fn d_duration() -> u64 {
    15
}
fn d_warning_lead() -> u64 {
    5
}
fn d_llm_url() -> String {
    "https://api.perplexity.ai".into()
}
fn d_llm_model() -> String {
    "sonar".into()
}
fn d_llm_key_env() -> String {
    "PERPLEXITY_API_KEY".into()
}
fn d_temperature() -> f32 {
    0.7
}
fn d_llm_timeout() -> u64 {
    120
}
