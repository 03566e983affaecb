use anyhow::Result;
use chrono::Utc;
use daft_core::{EventEnvelope, EventKind, ObserveConfig, resolve_home_path};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

pub struct Observer {
    log_path: PathBuf,
    next_seq: AtomicU64,
    verbose: bool,
}

impl Observer {
    pub fn new(cfg: &ObserveConfig) -> Result<Self> {
        Self::with_log_path(resolve_home_path(&cfg.log_file))
    }

    pub fn with_log_path(log_path: impl Into<PathBuf>) -> Result<Self> {
        let log_path = log_path.into();
        if let Some(dir) = log_path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)?;
        }
        Ok(Self {
            log_path,
            next_seq: AtomicU64::new(1),
            verbose: false,
        })
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn record_event(&self, event: &EventEnvelope) -> Result<()> {
        self.append_log_line(&format!(
            "{} EVENT {}",
            Utc::now().to_rfc3339(),
            serde_json::to_string(event)?
        ))
    }

    /// Wrap `kind` in an envelope with the next sequence number and append it.
    pub fn record(&self, session_id: Uuid, kind: EventKind) -> Result<EventEnvelope> {
        let envelope = EventEnvelope {
            seq_no: self.next_seq.fetch_add(1, Ordering::Relaxed),
            at: Utc::now(),
            session_id,
            kind,
        };
        self.record_event(&envelope)?;
        Ok(envelope)
    }

    /// Enable or disable verbose logging to stderr.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Log a message to stderr with `[daft]` prefix when verbose mode is on.
    pub fn verbose_log(&self, msg: &str) {
        if self.verbose {
            eprintln!("[daft] {msg}");
        }
    }

    /// Log a warning to stderr and the log file.
    pub fn warn_log(&self, msg: &str) {
        eprintln!("[daft WARN] {msg}");
        let _ = self.append_log_line(&format!("{} WARN {msg}", Utc::now().to_rfc3339()));
    }

    fn append_log_line(&self, line: &str) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }
}
