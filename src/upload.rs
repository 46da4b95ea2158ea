//! Upload validation and request-scoped storage.
//!
//! The validator is the only place that writes the raw upload to disk. On
//! acceptance it resolves the [`DocumentKind`] once, sanitizes the filename
//! and stores the bytes under a uuid-prefixed name so concurrent requests
//! with identical filenames never collide. The returned [`StoredUpload`]
//! guard removes the file when dropped, whatever path the request takes.

use crate::config::MAX_UPLOAD_BYTES;
use crate::error::ParseError;
use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// File type resolved once at validation time and threaded through the
/// pipeline, so no later stage re-inspects the filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image(ImageFormat),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn mime(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }
}

impl DocumentKind {
    /// Resolve the kind from the substring after the last `.`,
    /// case-insensitive. `None` means the extension is not allowed.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentKind::Pdf),
            "jpg" | "jpeg" => Some(DocumentKind::Image(ImageFormat::Jpeg)),
            "png" => Some(DocumentKind::Image(ImageFormat::Png)),
            _ => None,
        }
    }
}

/// A stored upload owned by one request. The file is removed on drop.
#[derive(Debug)]
pub struct StoredUpload {
    path: PathBuf,
}

impl StoredUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoredUpload {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed upload {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to clean up upload {:?}: {}", self.path, e),
        }
    }
}

/// Validate an uploaded file and write it into `upload_dir`.
///
/// Rejections happen before any storage write. On success the upload
/// directory is created if absent and the bytes land under a fresh
/// collision-resistant name.
pub fn validate_and_store(
    upload_dir: &Path,
    filename: &str,
    data: &[u8],
) -> Result<(StoredUpload, DocumentKind), ParseError> {
    if filename.is_empty() {
        return Err(ParseError::Validation("No file selected".to_string()));
    }

    let kind = DocumentKind::from_filename(filename).ok_or_else(|| {
        ParseError::Validation("Only PDF, JPG, JPEG, and PNG files are allowed".to_string())
    })?;

    if data.len() > MAX_UPLOAD_BYTES {
        return Err(ParseError::Validation("File size exceeds 10MB limit".to_string()));
    }

    let safe_name = sanitize_filename(filename);
    let stored_name = format!("{}_{}", Uuid::new_v4().simple(), safe_name);
    let path = upload_dir.join(stored_name);

    fs::create_dir_all(upload_dir)
        .with_context(|| format!("Failed to create upload directory {upload_dir:?}"))?;
    fs::write(&path, data).with_context(|| format!("Failed to store upload at {path:?}"))?;

    debug!("Stored upload {:?} ({} bytes)", path, data.len());
    Ok((StoredUpload { path }, kind))
}

/// Strip path separators and control characters from a client filename.
/// Falls back to "document" if nothing survives.
fn sanitize_filename(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .filter(|c| !matches!(c, '/' | '\\') && !c.is_control())
        .collect();

    let safe = safe.trim_matches(|c: char| c == '.' || c == ' ').to_string();
    if safe.is_empty() {
        "document".to_string()
    } else {
        safe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("statement-parser-test-{}", Uuid::new_v4().simple()))
    }

    #[test]
    fn test_kind_resolution() {
        assert_eq!(DocumentKind::from_filename("statement.pdf"), Some(DocumentKind::Pdf));
        assert_eq!(
            DocumentKind::from_filename("scan.JPG"),
            Some(DocumentKind::Image(ImageFormat::Jpeg))
        );
        assert_eq!(
            DocumentKind::from_filename("scan.jpeg"),
            Some(DocumentKind::Image(ImageFormat::Jpeg))
        );
        assert_eq!(
            DocumentKind::from_filename("scan.png"),
            Some(DocumentKind::Image(ImageFormat::Png))
        );
        assert_eq!(DocumentKind::from_filename("notes.txt"), None);
        assert_eq!(DocumentKind::from_filename("run.exe"), None);
        assert_eq!(DocumentKind::from_filename("no_extension"), None);
    }

    #[test]
    fn test_disallowed_extension_rejected_without_write() {
        let dir = scratch_dir();
        let result = validate_and_store(&dir, "malware.exe", b"MZ");
        assert!(matches!(result, Err(ParseError::Validation(_))));
        // Rejection happens before the directory is even created.
        assert!(!dir.exists());
    }

    #[test]
    fn test_oversized_file_rejected_without_write() {
        let dir = scratch_dir();
        let data = vec![0u8; MAX_UPLOAD_BYTES + 1];
        let result = validate_and_store(&dir, "big.pdf", &data);
        match result {
            Err(ParseError::Validation(msg)) => assert_eq!(msg, "File size exceeds 10MB limit"),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(!dir.exists());
    }

    #[test]
    fn test_empty_filename_rejected() {
        let dir = scratch_dir();
        let result = validate_and_store(&dir, "", b"%PDF-1.4");
        match result {
            Err(ParseError::Validation(msg)) => assert_eq!(msg, "No file selected"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_sanitize_strips_traversal_and_controls() {
        assert_eq!(sanitize_filename("../../etc/passwd.pdf"), "etcpasswd.pdf");
        assert_eq!(sanitize_filename("a\\b\\c.png"), "abc.png");
        assert_eq!(sanitize_filename("bad\x00name\n.jpg"), "badname.jpg");
        assert_eq!(sanitize_filename("..."), "document");
    }

    #[test]
    fn test_stored_upload_removed_on_drop() {
        let dir = scratch_dir();
        let path = {
            let (upload, kind) = validate_and_store(&dir, "statement.pdf", b"%PDF-1.4").unwrap();
            assert_eq!(kind, DocumentKind::Pdf);
            assert!(upload.path().exists());
            upload.path().to_path_buf()
        };
        assert!(!path.exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_identical_filenames_do_not_collide() {
        let dir = scratch_dir();
        let (a, _) = validate_and_store(&dir, "statement.pdf", b"%PDF-1.4 a").unwrap();
        let (b, _) = validate_and_store(&dir, "statement.pdf", b"%PDF-1.4 b").unwrap();
        assert_ne!(a.path(), b.path());
        drop(a);
        drop(b);
        fs::remove_dir_all(&dir).unwrap();
    }
}
