//! Attachment files on disk.
//!
//! Files live under `{root}/{studentId}/{fileId}.{ext}`. An upload is first
//! written to `{root}/.staging/` and only moved into place while the database
//! transaction recording it is still open.

use std::path::{Component, Path, PathBuf};

use color_eyre::{eyre::WrapErr, Result};

use crate::names;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UploadRejection {
    #[error("File type not permitted")]
    Extension,
    #[error("File too large (max 15 MB)")]
    TooLarge,
}

/// Lowercased extension of a client file name.
pub fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(str::to_ascii_lowercase)
}

/// Extension first, then size; returns the normalised extension.
pub fn check_upload(file_name: &str, size: u64) -> Result<String, UploadRejection> {
    let ext = extension_of(file_name)
        .filter(|ext| names::ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or(UploadRejection::Extension)?;
    if size > names::MAX_UPLOAD_BYTES {
        return Err(UploadRejection::TooLarge);
    }
    Ok(ext)
}

/// MIME type sniffed from the content, falling back to the extension.
pub fn mime_type(bytes: &[u8], ext: &str) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }
    match ext {
        "gif" => "image/gif",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsm" => "application/vnd.ms-excel.sheet.macroEnabled.12",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
}

/// A file written to the staging area and not yet recorded anywhere.
#[derive(Debug)]
pub struct StagedFile {
    /// The stored file name, `{uuid}.{ext}`.
    pub id: String,
    /// Path relative to the storage root, as stored in the answer row.
    pub relative: String,
    staged: PathBuf,
    target: PathBuf,
}

impl AttachmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn stage(&self, student_id: i64, ext: &str, bytes: &[u8]) -> Result<StagedFile> {
        let file_name = format!("{}.{ext}", uuid::Uuid::new_v4().simple());

        let staging = self.root.join(names::STAGING_DIR);
        tokio::fs::create_dir_all(&staging)
            .await
            .wrap_err_with(|| format!("could not create {}", staging.display()))?;

        let staged = staging.join(&file_name);
        tokio::fs::write(&staged, bytes)
            .await
            .wrap_err_with(|| format!("could not write {}", staged.display()))?;

        Ok(StagedFile {
            relative: format!("{student_id}/{file_name}"),
            target: self.root.join(student_id.to_string()).join(&file_name),
            staged,
            id: file_name,
        })
    }

    /// Absolute path of a stored attachment. Paths that would leave the
    /// storage root resolve to `None`.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let relative = Path::new(relative);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        (safe && relative.components().next().is_some()).then(|| self.root.join(relative))
    }

    pub async fn remove(&self, relative: &str) {
        let Some(path) = self.resolve(relative) else {
            tracing::warn!("refusing to remove attachment outside storage root: {relative}");
            return;
        };
        remove_quietly(&path).await;
    }

    /// Removes a student's attachment folder.
    pub async fn remove_student(&self, student_id: i64) {
        let dir = self.root.join(student_id.to_string());
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => tracing::info!("removed attachment folder {}", dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("could not remove {}: {e}", dir.display()),
        }
    }
}

impl StagedFile {
    /// Moves the staged file to its final location.
    pub async fn place(&self) -> Result<()> {
        if let Some(parent) = self.target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .wrap_err_with(|| format!("could not create {}", parent.display()))?;
        }
        tokio::fs::rename(&self.staged, &self.target)
            .await
            .wrap_err_with(|| format!("could not move upload to {}", self.target.display()))
    }

    /// Deletes whichever copy exists.
    pub async fn discard(&self) {
        remove_quietly(&self.staged).await;
        remove_quietly(&self.target).await;
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("could not remove {}: {e}", path.display()),
    }
}
