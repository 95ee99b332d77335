//! Letter files on disk, grouped by incoming number
//!
//! Layout: `<root>/<incoming_no>/<file name>`.

use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::{FileInfo, IncomingNo};

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files attached to a letter, sorted by name. A missing folder is an empty list.
    pub async fn list(&self, incoming_no: IncomingNo) -> Vec<FileInfo> {
        let dir = self.root.join(incoming_no.to_string());
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(dir = %dir.display(), "Failed to read letter folder: {}", e);
                }
                return Vec::new();
            }
        };

        let mut files = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), "Failed to list letter folder: {}", e);
                    break;
                }
            };
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if !is_file {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            files.push(FileInfo {
                url: format!("/files/{}/{}", incoming_no, name),
                ext: extension_of(&name),
                name,
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        files
    }

    /// Read one file after checking the name cannot escape the letter folder
    pub async fn read(&self, incoming_no: IncomingNo, filename: &str) -> Result<Vec<u8>> {
        validate_filename(filename)?;
        let path = self.root.join(incoming_no.to_string()).join(filename);

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            _ => return Err(AppError::NotFound("File not found".to_string())),
        }

        tokio::fs::read(&path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read {}: {}", path.display(), e)))
    }
}

pub fn validate_filename(filename: &str) -> Result<()> {
    if filename.is_empty()
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
    {
        return Err(AppError::BadRequest("Invalid filename".to_string()));
    }
    Ok(())
}

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
