//! # METS Factory
//!
//! Assembles METS (Metadata Encoding & Transmission Standard) documents that
//! describe one intellectual entity (a book, a box) for archival ingest.
//! The filesystem is the data source: each processing tier of the entity is a
//! directory of files, and file names decide reading order.
//!
//! # Assembly
//!
//! ```text
//! build_mets()                      empty mets:mets root
//!   └─ build_amdsec_filegrp_structmap(doc, entity)
//!        per tier:  amdSec (techMD) + amdSec (digiprovMD) + fileGrp
//!        once:      structMap over the primary tier's files
//! Document::to_xml(indent)          amdSec*, fileSec, structMap
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`ordering`] | Reading-order listing of a directory (numeric stems vs everything else) |
//! | [`mdwrap`] | Validated `mdWrap` builder: typed `MDTYPE`, XML or binary payload |
//! | [`document`] | The METS document arena, `amdSec` builder, id registry, rendering |
//! | [`assemble`] | Per-entity `amdSec`/`fileGrp`/`structMap` assembly |
//! | [`inspect`] | File size, SHA-256 checksum and MIME type for `mets:file` |
//! | [`xml`] | Namespace-aware element tree over `quick-xml` |
//! | [`config`] | `mets.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Two Ordering Regimes
//!
//! Page sets are named either with bare sequence numbers (`1.tif`, `2.tif`,
//! `10.tif`) or with descriptive, usually zero-padded names
//! (`page 001.tif`). Bare numbers sort by value; everything else sorts as
//! plain strings and comes first. Directories are expected to use one
//! convention, and a mixed directory still has a fully deterministic order.
//!
//! ## Ids, Not Object References
//!
//! The [`document::Document`] owns every section. File entries point at
//! administrative sections and divisions point at files through string ids,
//! checked against the document's registry when a section is added. Failed
//! additions leave the document as it was.

pub mod assemble;
pub mod config;
pub mod document;
pub mod inspect;
pub mod mdwrap;
pub mod ordering;
pub mod output;
pub mod xml;

pub use assemble::{Assembler, EntityInput, Role, build_amdsec_filegrp_structmap};
pub use document::{Document, MdKind, MetsError, build_amdsec, build_mets};
pub use mdwrap::{MdType, MdWrap, Payload, WrapAttributes, WrapError, build_mdwrap};
pub use ordering::{OrderError, ordered_file_list};

#[cfg(test)]
pub(crate) mod test_helpers;
