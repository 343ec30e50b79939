//! Text log and attachment storage.
//!
//! Logging is downstream of the action it records: every failure here is
//! reported through tracing and swallowed.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::RelayResult;

pub const SELF_LABEL: &str = "me";

#[derive(Debug, Clone)]
pub struct MessageArchive {
    message_log: PathBuf,
    audit_dir: PathBuf,
    attachment_dir: PathBuf,
}

impl MessageArchive {
    pub fn new(
        message_log: impl Into<PathBuf>,
        audit_dir: impl Into<PathBuf>,
        attachment_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            message_log: message_log.into(),
            audit_dir: audit_dir.into(),
            attachment_dir: attachment_dir.into(),
        }
    }

    pub fn message_log(&self) -> &Path {
        &self.message_log
    }

    pub fn audit_dir(&self) -> &Path {
        &self.audit_dir
    }

    pub fn attachment_dir(&self) -> &Path {
        &self.attachment_dir
    }

    pub fn format_line(at: DateTime<Local>, from: &str, to: &str, text: &str) -> String {
        format!(
            "{} | from({}), to({}): {}\n",
            at.format("%Y-%m-%d %H:%M:%S"),
            from,
            to,
            text
        )
    }

    /// Hour bucket file for `at`, e.g. `2026101614.txt`.
    pub fn audit_path(&self, at: DateTime<Local>) -> PathBuf {
        self.audit_dir
            .join(format!("{}.txt", at.format("%Y%m%d%H")))
    }

    /// Append `from(..), to(..): text` to the rolling log and the hour bucket.
    pub async fn record(&self, from: &str, to: &str, text: &str) {
        let now = Local::now();
        let line = Self::format_line(now, from, to, text);
        if let Err(e) = append_line(&self.message_log, &line).await {
            warn!("Failed to append to {}: {}", self.message_log.display(), e);
        }
        let audit = self.audit_path(now);
        if let Err(e) = append_line(&audit, &line).await {
            warn!("Failed to append to {}: {}", audit.display(), e);
        }
    }

    /// Save an inbound attachment, suffixing a timestamp when the name is taken.
    pub async fn save_attachment(&self, file_name: &str, bytes: &[u8]) -> Option<PathBuf> {
        match self.try_save_attachment(file_name, bytes).await {
            Ok(path) => {
                debug!("Saved attachment to {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Failed to save attachment '{}': {}", file_name, e);
                None
            }
        }
    }

    async fn try_save_attachment(&self, file_name: &str, bytes: &[u8]) -> RelayResult<PathBuf> {
        fs::create_dir_all(&self.attachment_dir).await?;
        let safe_name = sanitize_file_name(file_name);
        let stamp = Local::now();
        let mut attempt = 0;
        loop {
            let candidate = match attempt {
                0 => safe_name.clone(),
                n => dedup_file_name(&safe_name, stamp, n - 1),
            };
            let path = self.attachment_dir.join(candidate);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(bytes).await?;
                    file.flush().await?;
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

async fn append_line(path: &Path, line: &str) -> RelayResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

fn sanitize_file_name(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");
    if base.is_empty() {
        "attachment".to_string()
    } else {
        base.to_string()
    }
}

/// `photo.jpg` -> `photo_20261016143005.jpg`, then `photo_20261016143005_1.jpg`, ...
fn dedup_file_name(file_name: &str, at: DateTime<Local>, counter: usize) -> String {
    let stamp = match counter {
        0 => at.format("%Y%m%d%H%M%S").to_string(),
        n => format!("{}_{}", at.format("%Y%m%d%H%M%S"), n),
    };
    let path = Path::new(file_name);
    match (
        path.file_stem().and_then(|s| s.to_str()),
        path.extension().and_then(|s| s.to_str()),
    ) {
        (Some(stem), Some(ext)) => format!("{}_{}.{}", stem, stamp, ext),
        _ => format!("{}_{}", file_name, stamp),
    }
}
