//! Reading-order file listing for page directories.
//!
//! Page-image sets arrive named one of two ways: bare sequence numbers
//! (`1.tif` .. `250.tif`) or descriptive/zero-padded names
//! (`page 001.tif`, `cover.tif`). The first needs numeric ordering so `2`
//! precedes `10`; the second already sorts correctly as plain strings.
//!
//! Ordering is done in three auditable steps:
//!
//! 1. **Classify** each file name with [`classify_name`]: a stem made only
//!    of ASCII digits becomes [`NameClass::Numeric`], anything else
//!    [`NameClass::Other`].
//! 2. **Sort** each partition on its own: `Other` lexicographically,
//!    `Numeric` by integer value (ties broken by full name).
//! 3. **Concatenate**: all `Other` names first, then all `Numeric` names.
//!
//! ```text
//! {1.txt, 99.txt, apples.txt, 4.txt, aarvarks.txt}
//!   → [aarvarks.txt, apples.txt, 1.txt, 4.txt, 99.txt]
//! ```
//!
//! The "stem" is the file name minus one extension (`7.tar.gz` → `7.tar`,
//! which is not numeric). Leading zeros are allowed in a numeric stem
//! (`007.txt` sorts as 7) but digits embedded in other text
//! (`page 01.txt`) are not.

use std::cmp::Ordering;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrderError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Classification of a single file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameClass {
    /// Stem is digits only. Holds the digits with leading zeros stripped,
    /// so arbitrarily long sequence numbers compare without overflow.
    Numeric(String),
    /// Everything else.
    Other,
}

/// Classify a file name by its stem (name minus one extension).
///
/// - `"7.txt"` → `Numeric("7")`
/// - `"007.txt"` → `Numeric("7")`
/// - `"0.txt"` → `Numeric("0")`
/// - `"99"` → `Numeric("99")`
/// - `"page 01.txt"` → `Other`
/// - `"0x.txt"` → `Other`
/// - `".txt"` → `Other` (hidden file, no stem)
pub fn classify_name(file_name: &str) -> NameClass {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return NameClass::Other;
    }
    let trimmed = stem.trim_start_matches('0');
    NameClass::Numeric(if trimmed.is_empty() { "0" } else { trimmed }.to_string())
}

/// Compare two normalized digit strings by integer value.
fn compare_digits(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Order bare file names into reading order.
///
/// Pure function: no filesystem access. Names classified as
/// [`NameClass::Other`] come first in lexicographic order, followed by
/// numeric names in ascending integer order. Two numeric names with the same
/// value (`7.png`, `7.txt`, `07.txt`) fall back to lexicographic order of the
/// whole name so the result never depends on listing order.
pub fn order_names(names: Vec<OsString>) -> Vec<OsString> {
    let mut numeric: Vec<(String, OsString)> = Vec::new();
    let mut other: Vec<OsString> = Vec::new();

    for name in names {
        match classify_name(&name.to_string_lossy()) {
            NameClass::Numeric(digits) => numeric.push((digits, name)),
            NameClass::Other => other.push(name),
        }
    }

    other.sort();
    numeric.sort_by(|(da, na), (db, nb)| compare_digits(da, db).then_with(|| na.cmp(nb)));

    other
        .into_iter()
        .chain(numeric.into_iter().map(|(_, name)| name))
        .collect()
}

/// List the regular files directly inside `dir` in reading order.
///
/// Subdirectories are skipped. Symlinks count when they resolve to a regular
/// file. Returned paths are `dir` joined with each file name.
pub fn ordered_file_list(dir: &Path) -> Result<Vec<PathBuf>, OrderError> {
    if !dir.is_dir() {
        return Err(OrderError::DirectoryNotFound(dir.to_path_buf()));
    }

    // Entry errors propagate; no file is silently left out of the order.
    let entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    let names: Vec<OsString> = entries
        .into_iter()
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name())
        .collect();

    let ordered = order_names(names);
    tracing::debug!(dir = %dir.display(), files = ordered.len(), "ordered directory listing");

    Ok(ordered.into_iter().map(|name| dir.join(name)).collect())
}
