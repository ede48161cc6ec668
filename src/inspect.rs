//! Per-file technical facts for `mets:file` entries.
//!
//! File assembly needs three facts about each physical file: its size, a
//! fixity checksum, and a MIME type. They are gathered behind the
//! [`FileInspector`] trait so assembly can run against canned values in
//! tests and against the real filesystem otherwise.
//!
//! The default [`Sha256Inspector`] streams the file through SHA-256 and
//! sniffs the MIME type from the file header (`infer`), falling back to the
//! extension (`mime_guess`).

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;

/// Checksum algorithm name as written to `CHECKSUMTYPE`.
pub const SHA256: &str = "SHA-256";

/// Facts recorded on a `mets:file` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFacts {
    pub size: u64,
    /// Lowercase hex digest, absent when checksums are disabled.
    pub checksum: Option<String>,
    pub mimetype: String,
}

/// Source of [`FileFacts`]. Must be shareable across inspection threads.
pub trait FileInspector: Sync {
    fn inspect(&self, path: &Path) -> io::Result<FileFacts>;
}

/// Filesystem inspector: real sizes, SHA-256 digests, sniffed MIME types.
#[derive(Debug, Clone)]
pub struct Sha256Inspector {
    pub checksums: bool,
}

impl Default for Sha256Inspector {
    fn default() -> Self {
        Self { checksums: true }
    }
}

impl FileInspector for Sha256Inspector {
    fn inspect(&self, path: &Path) -> io::Result<FileFacts> {
        let size = std::fs::metadata(path)?.len();
        let checksum = if self.checksums {
            Some(hash_file(path)?)
        } else {
            None
        };
        Ok(FileFacts {
            size,
            checksum,
            mimetype: detect_mimetype(path)?,
        })
    }
}

/// SHA-256 of a file's contents as lowercase hex, read in a streaming fashion.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// MIME type from the file's leading bytes, falling back to its extension.
///
/// Content wins: a TIFF saved as `.dat` is still `image/tiff`. Files neither
/// check recognizes are `application/octet-stream`.
pub fn detect_mimetype(path: &Path) -> io::Result<String> {
    match infer::get_from_path(path)? {
        Some(kind) => Ok(kind.mime_type().to_string()),
        None => Ok(guess_mimetype(path)),
    }
}

/// MIME type from the file extension alone.
pub fn guess_mimetype(path: &Path) -> String {
    mime_guess::from_path(path).first_or_octet_stream().to_string()
}
