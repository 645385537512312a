//! Generated replies kept as flat `.txt` files. The directory listing is the
//! history; there is no separate index.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{AppError, Result};

const RESPONSE_EXTENSION: &str = ".txt";

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub filename: String,
    pub content: String,
    pub saved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

/// `response_<upload name>.txt`
pub fn response_filename(upload_name: &str) -> String {
    format!("response_{}{}", upload_name, RESPONSE_EXTENSION)
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    pub async fn save(&self, content: &str, filename: &str) -> Result<PathBuf> {
        validate_name(filename)?;
        let path = self.dir.join(filename);
        fs::write(&path, content.as_bytes()).await?;
        debug!(path = %path.display(), bytes = content.len(), "saved response");
        Ok(path)
    }

    /// Every stored `.txt` file, sorted by name.
    pub async fn list(&self) -> Result<Vec<HistoryEntry>> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&self.dir).await?;

        while let Some(entry) = dir.next_entry().await? {
            let filename = match entry.file_name().into_string() {
                Ok(name) if name.ends_with(RESPONSE_EXTENSION) => name,
                _ => continue,
            };
            if !entry.file_type().await?.is_file() {
                continue;
            }

            let content = match fs::read_to_string(entry.path()).await {
                Ok(content) => content,
                Err(e) if e.kind() == ErrorKind::InvalidData => {
                    warn!(%filename, "skipping response that is not valid UTF-8");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let saved_at = entry
                .metadata()
                .await
                .ok()
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from);

            entries.push(HistoryEntry {
                filename,
                content,
                saved_at,
            });
        }

        entries.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(entries)
    }

    /// Path of an existing stored file. Names that could escape the
    /// directory are rejected before touching the filesystem.
    pub async fn resolve(&self, filename: &str) -> Result<PathBuf> {
        validate_name(filename)?;
        let path = self.dir.join(filename);
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            Ok(_) => Err(AppError::NotFound(filename.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(AppError::NotFound(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn validate_name(filename: &str) -> Result<()> {
    let bad = filename.is_empty()
        || filename == "."
        || filename.contains("..")
        || filename.contains(['/', '\\', '\0']);
    if bad {
        return Err(AppError::BadRequest(format!("invalid file name {:?}", filename)));
    }
    Ok(())
}
