use daft_core::HistoryConfig;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::sanitize::strip_ansi;

/// Returned instead of an empty string when there is nothing to send.
/// Callers treat it as context that is present but empty.
pub const NO_HISTORY_SENTINEL: &str = "DAFT: No history found to analyze.";

/// `user@host:cwd$ ` or `user@host:cwd# `. `.` stays on one line.
static PROMPT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9_-]+@[a-zA-Z0-9_-]+:.*[$#] ").expect("valid prompt regex")
});

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("Logger not active ({env} not set). Start it with daft_start_log.")]
    NotConfigured { env: String },
    #[error("Could not read or parse log file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A prompt marker and everything printed after it up to the next marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryBlock {
    pub prompt: String,
    pub body: String,
}

impl HistoryBlock {
    pub fn text(&self) -> String {
        format!("{}{}", self.prompt, self.body)
    }
}

/// Split a sanitized transcript into chronological blocks. Text before the
/// first prompt is discarded.
pub fn segment_blocks(text: &str) -> Vec<HistoryBlock> {
    let markers: Vec<_> = PROMPT_MARKER.find_iter(text).collect();
    markers
        .iter()
        .enumerate()
        .map(|(idx, marker)| {
            let body_end = markers
                .get(idx + 1)
                .map_or(text.len(), |next| next.start());
            HistoryBlock {
                prompt: marker.as_str().to_string(),
                body: text[marker.end()..body_end].to_string(),
            }
        })
        .collect()
}

/// The last `n` completed blocks. The trailing block is the invocation that
/// is running right now and is never included.
pub fn select_recent_blocks(blocks: &[HistoryBlock], n: usize) -> &[HistoryBlock] {
    let completed = &blocks[..blocks.len().saturating_sub(1)];
    let start = completed.len().saturating_sub(n);
    &completed[start..]
}

pub fn join_blocks(blocks: &[HistoryBlock]) -> String {
    blocks
        .iter()
        .map(HistoryBlock::text)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Joined text of the last `n` completed blocks, or the sentinel when there
/// are none.
pub fn select_recent(blocks: &[HistoryBlock], n: usize) -> String {
    let selected = select_recent_blocks(blocks, n);
    if selected.is_empty() {
        return NO_HISTORY_SENTINEL.to_string();
    }
    join_blocks(selected)
}

/// Reads the transcript named by the configured environment variable.
#[derive(Debug, Clone)]
pub struct HistoryReader {
    env: String,
    path: Option<PathBuf>,
}

impl HistoryReader {
    pub fn from_config(cfg: &HistoryConfig) -> Self {
        let path = std::env::var_os(&cfg.file_env)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        Self {
            env: cfg.file_env.clone(),
            path,
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            env: daft_core::DEFAULT_HISTORY_FILE_ENV.to_string(),
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Sanitized, segmented transcript.
    pub fn blocks(&self) -> Result<Vec<HistoryBlock>, HistoryError> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| HistoryError::NotConfigured {
                env: self.env.clone(),
            })?;
        let raw = fs::read(path).map_err(|source| HistoryError::Io {
            path: path.clone(),
            source,
        })?;
        // Transcripts capture raw terminal bytes; invalid UTF-8 must not
        // make the whole history unusable.
        let text = String::from_utf8_lossy(&raw);
        Ok(segment_blocks(&strip_ansi(&text)))
    }

    /// The memory context for `n` prior blocks.
    pub fn recent_blocks(&self, n: usize) -> Result<String, HistoryError> {
        Ok(select_recent(&self.blocks()?, n))
    }
}
