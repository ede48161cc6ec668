//! CLI output formatting.
//!
//! Output describes what went into the document rather than echoing the
//! XML. Every section gets a header line with its id and a count, followed
//! by indented context lines:
//!
//! ```text
//! amdSec rep1-amd-tech (techMD)
//! amdSec rep1-amd-digiprov (digiprovMD)
//! fileGrp rep1 (3 files)
//!     001 fid1-1 → pm/1.tif
//!     002 fid2-1 → pm/2.tif
//!     003 fid3-1 → pm/10.tif
//! structMap ie1-structmap (3 divisions)
//! ```
//!
//! Each `format_*` function returns `Vec<String>` and does no I/O; the
//! `print_*` wrappers write the lines to stdout.

use crate::document::Document;
use std::path::{Path, PathBuf};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

pub fn format_document_summary(doc: &Document) -> Vec<String> {
    let mut lines = Vec::new();

    for amd in doc.amd_secs() {
        lines.push(format!("amdSec {} ({})", amd.id, amd.kind.element_name()));
    }

    for grp in doc.file_grps() {
        lines.push(format!("fileGrp {} ({})", grp.id, plural(grp.files.len(), "file")));
        for (i, file) in grp.files.iter().enumerate() {
            lines.push(format!(
                "{}{} {} → {}",
                indent(1),
                format_index(i + 1),
                file.id,
                file.href
            ));
        }
    }

    if let Some(map) = doc.struct_map() {
        lines.push(format!(
            "structMap {} ({})",
            map.id,
            plural(map.root.children.len(), "division")
        ));
    }
    lines
}

pub fn print_document_summary(doc: &Document) {
    for line in format_document_summary(doc) {
        println!("{}", line);
    }
}

/// Ordered listing with positions, paths shown relative to `dir`.
pub fn format_ordered_list(dir: &Path, files: &[PathBuf]) -> Vec<String> {
    let mut lines = vec![format!("{} ({})", dir.display(), plural(files.len(), "file"))];
    for (i, file) in files.iter().enumerate() {
        let shown = file.strip_prefix(dir).unwrap_or(file);
        lines.push(format!("{}{} {}", indent(1), format_index(i + 1), shown.display()));
    }
    lines
}

pub fn print_ordered_list(dir: &Path, files: &[PathBuf]) {
    for line in format_ordered_list(dir, files) {
        println!("{}", line);
    }
}
