//! Shared test utilities for the mets-factory test suite.
//!
//! Provides fixture setup, a deterministic [`FileInspector`], tag constants
//! for element lookups, and structural assertions over an assembled
//! [`Document`].
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let batch = tmp.path().join("test_batch_1");
//! // ... assemble into `doc` ...
//! assert_structure_matches_group(&doc, "rep1");
//! assert_eq!(dnx_value(&doc, "rep1-amd-tech", "usageType"), "VIEW");
//! ```

use std::io;
use std::path::Path;
use tempfile::TempDir;

use crate::document::{Document, FileGrp};
use crate::inspect::{FileFacts, FileInspector};

pub const FILE_GRP: &str = "{http://www.loc.gov/METS/}fileGrp";
pub const FILE: &str = "{http://www.loc.gov/METS/}file";
pub const FLOCAT: &str = "{http://www.loc.gov/METS/}FLocat";
pub const FPTR: &str = "{http://www.loc.gov/METS/}fptr";

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Temp directory holding one small file per name (content = the name).
pub fn dir_with_files<S: AsRef<str>>(names: &[S]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for name in names {
        let name = name.as_ref();
        std::fs::write(tmp.path().join(name), name).unwrap();
    }
    tmp
}

// =========================================================================
// Inspection stub
// =========================================================================

pub const STUB_CHECKSUM: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Inspector returning fixed facts without reading the file.
pub struct StubInspector;

impl FileInspector for StubInspector {
    fn inspect(&self, _path: &Path) -> io::Result<FileFacts> {
        Ok(FileFacts {
            size: 7,
            checksum: Some(STUB_CHECKSUM.to_string()),
            mimetype: "application/x-stub".to_string(),
        })
    }
}

// =========================================================================
// Document lookups (panic with a clear message on miss)
// =========================================================================

/// Find a file group by id. Panics if not found.
pub fn find_group<'a>(doc: &'a Document, id: &str) -> &'a FileGrp {
    doc.file_grps()
        .iter()
        .find(|g| g.id == id)
        .unwrap_or_else(|| {
            let ids: Vec<&str> = doc.file_grps().iter().map(|g| g.id.as_str()).collect();
            panic!("fileGrp '{id}' not found. Available: {ids:?}")
        })
}

/// File ids of a group in order.
pub fn file_ids(grp: &FileGrp) -> Vec<&str> {
    grp.files.iter().map(|f| f.id.as_str()).collect()
}

/// `FLocat` hrefs of a group in order.
pub fn hrefs(grp: &FileGrp) -> Vec<&str> {
    grp.files.iter().map(|f| f.href.as_str()).collect()
}

/// Text of a DNX `key` inside the first metadata section of an amdSec.
pub fn dnx_value(doc: &Document, amd_id: &str, key: &str) -> String {
    let amd = doc
        .amd_secs()
        .iter()
        .find(|a| a.id == amd_id)
        .unwrap_or_else(|| panic!("amdSec '{amd_id}' not found"));
    let wrap = amd.sections[0].wrap.to_element();
    wrap.descendants("{http://www.exlibrisgroup.com/dnx}key")
        .into_iter()
        .find(|k| k.attr("id") == Some(key))
        .and_then(|k| k.text())
        .unwrap_or_else(|| panic!("key '{key}' not found in '{amd_id}'"))
        .to_string()
}

// =========================================================================
// Structural assertions
// =========================================================================

/// Assert the structMap's child divisions mirror a file group exactly:
/// same length, same order, `ORDER` running 1..N without gaps.
pub fn assert_structure_matches_group(doc: &Document, grp_id: &str) {
    let grp = find_group(doc, grp_id);
    let map = doc.struct_map().expect("document has no structMap");
    let divs = &map.root.children;

    assert_eq!(
        divs.len(),
        grp.files.len(),
        "div count does not match fileGrp '{grp_id}'"
    );
    for (i, (div, file)) in divs.iter().zip(&grp.files).enumerate() {
        assert_eq!(div.order, Some(i as u32 + 1), "ORDER gap at div {}", div.id);
        assert_eq!(
            div.file_id.as_deref(),
            Some(file.id.as_str()),
            "div {} points at the wrong file",
            div.id
        );
    }
}
