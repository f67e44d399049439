//! Append-only JSONL transcript archive.
//!
//! Each finished (or in-progress) session gets a `<sessionId>.jsonl`
//! file under the archive directory; every turn is one JSON line.
//! File I/O goes through `spawn_blocking` to avoid stalling the
//! runtime, and an in-memory write-through cache keeps reads off disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use iv_domain::interview::{SessionKind, Turn};
use iv_domain::{Error, Result};

/// One archived line: a completed (or still-open) turn with timing and
/// kind metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivedTurn {
    pub timestamp: String,
    pub kind: SessionKind,
    pub interviewer: String,
    pub candidate: String,
}

impl ArchivedTurn {
    pub fn from_turn(kind: SessionKind, turn: &Turn) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            kind,
            interviewer: turn.interviewer.clone(),
            candidate: turn.candidate.clone(),
        }
    }
}

/// Writes per-session JSONL archives with a write-through cache.
pub struct TranscriptArchive {
    base_dir: PathBuf,
    cache: RwLock<HashMap<String, Vec<ArchivedTurn>>>,
}

impl TranscriptArchive {
    pub fn new(base_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(base_dir).map_err(Error::Io)?;
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            cache: RwLock::new(HashMap::new()),
        })
    }

    /// Append turns to a session's archive file.
    pub async fn append(&self, session_id: &str, turns: &[ArchivedTurn]) -> Result<()> {
        if turns.is_empty() {
            return Ok(());
        }

        let buf = serialize_lines(turns)?;
        let path = self.path_for(session_id);

        // Disk first; the cache is only updated when I/O succeeds.
        tokio::task::spawn_blocking(move || {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(Error::Io)?;
            file.write_all(buf.as_bytes()).map_err(Error::Io)?;
            Ok::<(), Error>(())
        })
        .await
        .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        self.cache
            .write()
            .entry(session_id.to_owned())
            .or_default()
            .extend(turns.iter().cloned());

        tracing::debug!(session_id, lines = turns.len(), "transcript archived");
        Ok(())
    }

    /// Read back a session's archived turns, from cache when possible.
    pub async fn read(&self, session_id: &str) -> Result<Vec<ArchivedTurn>> {
        {
            let cache = self.cache.read();
            if let Some(lines) = cache.get(session_id) {
                return Ok(lines.clone());
            }
        }

        let path = self.path_for(session_id);
        let sid = session_id.to_owned();
        let lines = tokio::task::spawn_blocking(move || read_jsonl_file(&path, &sid))
            .await
            .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))??;

        self.cache
            .write()
            .insert(session_id.to_owned(), lines.clone());
        Ok(lines)
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.base_dir.join(format!("{session_id}.jsonl"))
    }
}

fn serialize_lines(turns: &[ArchivedTurn]) -> Result<String> {
    let mut buf = String::new();
    for turn in turns {
        buf.push_str(&serde_json::to_string(turn)?);
        buf.push('\n');
    }
    Ok(buf)
}

fn read_jsonl_file(path: &Path, session_id: &str) -> Result<Vec<ArchivedTurn>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let raw = std::fs::read_to_string(path).map_err(Error::Io)?;
    let mut lines = Vec::new();
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ArchivedTurn>(line) {
            Ok(turn) => lines.push(turn),
            Err(e) => {
                tracing::warn!(session_id, error = %e, "skipping malformed archive line");
            }
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(q: &str, a: &str) -> ArchivedTurn {
        ArchivedTurn {
            timestamp: Utc::now().to_rfc3339(),
            kind: SessionKind::Repository,
            interviewer: q.into(),
            candidate: a.into(),
        }
    }

    #[tokio::test]
    async fn append_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let archive = TranscriptArchive::new(dir.path()).unwrap();

        archive
            .append("s1", &[turn("Q1", "A1"), turn("Q2", "")])
            .await
            .unwrap();

        let lines = archive.read("s1").await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].interviewer, "Q1");
        assert_eq!(lines[1].candidate, "");
    }

    #[tokio::test]
    async fn read_survives_cold_cache() {
        let dir = tempfile::tempdir().unwrap();
        {
            let archive = TranscriptArchive::new(dir.path()).unwrap();
            archive.append("s2", &[turn("Q", "A")]).await.unwrap();
        }
        // Fresh instance, nothing cached, must come back from disk.
        let archive = TranscriptArchive::new(dir.path()).unwrap();
        let lines = archive.read("s2").await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].candidate, "A");
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let archive = TranscriptArchive::new(dir.path()).unwrap();
        archive.append("s3", &[turn("Q", "A")]).await.unwrap();

        // Corrupt the file by hand.
        let path = dir.path().join("s3.jsonl");
        let mut raw = std::fs::read_to_string(&path).unwrap();
        raw.push_str("{not json}\n");
        std::fs::write(&path, raw).unwrap();

        let archive = TranscriptArchive::new(dir.path()).unwrap();
        let lines = archive.read("s3").await.unwrap();
        assert_eq!(lines.len(), 1);
    }

    #[tokio::test]
    async fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let archive = TranscriptArchive::new(dir.path()).unwrap();
        assert!(archive.read("nope").await.unwrap().is_empty());
    }
}
