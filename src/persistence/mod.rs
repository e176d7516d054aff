//! Evidence log for a pipeline run
//!
//! Every job header, command line, output chunk and diagnostic is recorded
//! in a bounded buffer. A successful run discards it without touching disk;
//! a failed run writes it under `.sync_temp/` so the tail of the run can be
//! inspected. With an explicit persistence directory the log is streamed
//! to `<dir>/run.log` as the run progresses.

pub mod log_buffer;

pub use log_buffer::BoundedLog;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Buffer size for the evidence log
pub const DEFAULT_CAPACITY: usize = 300 * 1024;

/// Parent directory for failure workspaces
pub const WORKSPACE_BASE: &str = ".sync_temp";

/// File name of the log inside a workspace or persistence directory
pub const LOG_FILE_NAME: &str = "run.log";

/// Live copy of the log in a persistence directory
#[derive(Debug)]
struct PersistTarget {
    dir: PathBuf,
    file: Option<File>,
}

#[derive(Debug)]
pub struct EvidenceLog {
    buffer: BoundedLog,
    persist: Option<PersistTarget>,
    workspace_base: PathBuf,
    pipeline_name: String,
    run_id: Uuid,
    started_at: DateTime<Local>,
}

impl EvidenceLog {
    pub fn new(pipeline_name: impl Into<String>, run_id: Uuid) -> Self {
        Self {
            buffer: BoundedLog::new(DEFAULT_CAPACITY),
            persist: None,
            workspace_base: PathBuf::from(WORKSPACE_BASE),
            pipeline_name: pipeline_name.into(),
            run_id,
            started_at: Local::now(),
        }
    }

    /// Use a different parent directory for failure workspaces
    pub fn with_workspace_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.workspace_base = base.into();
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.buffer = BoundedLog::new(capacity);
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Stream the log to `<dir>/run.log` from now on
    pub fn persist_to(&mut self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        let path = dir.join(LOG_FILE_NAME);
        let mut file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;

        writeln!(file, "{}", self.header())?;
        file.write_all(self.buffer.as_bytes())?;

        debug!(path = %path.display(), "streaming run log");
        self.persist = Some(PersistTarget {
            dir: dir.to_path_buf(),
            file: Some(file),
        });
        Ok(())
    }

    /// Record one line
    pub fn line(&mut self, text: &str) {
        self.buffer.write_line(text);

        if let Some(target) = self.persist.as_mut() {
            if let Some(file) = target.file.as_mut() {
                if let Err(e) = writeln!(file, "{}", text) {
                    warn!(
                        dir = %target.dir.display(),
                        error = %e,
                        "failed to write run log, continuing without it"
                    );
                    target.file = None;
                }
            }
        }
    }

    /// Record captured command output, line by line
    pub fn output(&mut self, text: &str) {
        for line in text.lines() {
            self.line(line);
        }
    }

    pub fn buffered(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    fn header(&self) -> String {
        format!(
            "=== ERROR EVIDENCE === pipeline={} run={} started={}",
            self.pipeline_name,
            self.run_id,
            self.started_at.to_rfc3339()
        )
    }

    /// Close the log and report where it lives on disk.
    ///
    /// Returns `None` when nothing was kept: a successful run without a
    /// persistence directory, or a failure whose evidence could not be
    /// written.
    pub fn finish(self, success: bool) -> Option<PathBuf> {
        if let Some(mut target) = self.persist {
            if let Some(file) = target.file.as_mut() {
                if let Err(e) = file.flush() {
                    warn!(error = %e, "failed to flush run log");
                }
            }
            return Some(target.dir);
        }

        if success {
            return None;
        }

        match self.write_workspace() {
            Ok(dir) => Some(dir),
            Err(e) => {
                warn!(error = %format!("{:#}", e), "failed to preserve error evidence");
                None
            }
        }
    }

    fn write_workspace(&self) -> Result<PathBuf> {
        let short_id: String = self.run_id.simple().to_string().chars().take(8).collect();
        let dir = self.workspace_base.join(format!(
            "pipejob-{}-{}",
            self.started_at.format("%Y%m%d-%H%M%S"),
            short_id
        ));
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let path = dir.join(LOG_FILE_NAME);
        let mut file =
            File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
        writeln!(file, "{}", self.header())?;
        file.write_all(self.buffer.as_bytes())?;
        file.flush()?;
        Ok(dir)
    }
}
