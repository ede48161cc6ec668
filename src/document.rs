//! The METS document model.
//!
//! A [`Document`] is the single owner of every section that ends up in the
//! output: administrative sections (`amdSec`), file groups (`fileGrp`, under
//! one `fileSec`) and the structural map (`structMap`). Sections refer to
//! each other only by string id:
//!
//! ```text
//! amdSec  ID=rep1-amd-tech  ◄──┐ ADMID
//! fileGrp ID=rep1              │
//!   file  ID=fid1-1  ──────────┘
//!     ▲
//!     │ FILEID
//! structMap / div / fptr
//! ```
//!
//! The document keeps a registry of every id it has handed out. Adding a
//! section whose id (or any nested id) is already taken fails with
//! [`MetsError::DuplicateId`], and adding a section that points at an id the
//! document does not contain fails with [`MetsError::DanglingReference`].
//! Failed calls leave the document unchanged.
//!
//! Rendering ([`Document::to_element`]) emits the sections in METS order:
//! `amdSec*`, `fileSec`, `structMap`.

use crate::inspect::{FileFacts, SHA256};
use crate::mdwrap::{MdWrap, WrapError};
use crate::ordering::OrderError;
use crate::xml::{Element, METS_NS, QName, XLINK_NS, XSI_NS, XmlError};
use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

const METS_SCHEMA_LOCATION: &str =
    "http://www.loc.gov/METS/ http://www.loc.gov/standards/mets/mets.xsd";

#[derive(Error, Debug)]
pub enum MetsError {
    #[error("Duplicate id in document: {0}")]
    DuplicateId(String),
    #[error("Reference to unknown id: {0}")]
    DanglingReference(String),
    #[error("Administrative section {0} has no metadata wrappers")]
    EmptySection(String),
    #[error("Document already has a structural map")]
    StructMapExists,
    #[error("No directory available to anchor the structural map")]
    MissingPrimaryDirectory,
    #[error("Ordering error: {0}")]
    Order(#[from] OrderError),
    #[error("Metadata wrapper error: {0}")]
    Wrap(#[from] WrapError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML error: {0}")]
    Xml(#[from] XmlError),
}

/// Kind of metadata carried by an administrative section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MdKind {
    Technical,
    Source,
    Rights,
    DigitalProvenance,
}

impl MdKind {
    /// Element name of the metadata section inside `amdSec`.
    pub fn element_name(self) -> &'static str {
        match self {
            MdKind::Technical => "techMD",
            MdKind::Source => "sourceMD",
            MdKind::Rights => "rightsMD",
            MdKind::DigitalProvenance => "digiprovMD",
        }
    }

    /// Short tag used when composing section ids.
    pub fn id_tag(self) -> &'static str {
        match self {
            MdKind::Technical => "tech",
            MdKind::Source => "source",
            MdKind::Rights => "rights",
            MdKind::DigitalProvenance => "digiprov",
        }
    }
}

/// One metadata section (`techMD`, `digiprovMD`, ...) inside an `amdSec`.
#[derive(Debug, Clone, PartialEq)]
pub struct MdSection {
    pub id: String,
    pub wrap: MdWrap,
}

/// An administrative metadata section.
#[derive(Debug, Clone, PartialEq)]
pub struct AmdSec {
    pub id: String,
    pub kind: MdKind,
    pub sections: Vec<MdSection>,
}

/// One physical file within a file group.
#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub id: String,
    /// Ids of the administrative sections describing this file.
    pub admids: Vec<String>,
    /// Absolute path of the file on disk.
    pub path: PathBuf,
    /// Location written to `FLocat/@xlink:href`.
    pub href: String,
    pub facts: FileFacts,
}

/// An ordered group of files sharing one role.
#[derive(Debug, Clone, PartialEq)]
pub struct FileGrp {
    pub id: String,
    pub usage: String,
    pub admids: Vec<String>,
    pub files: Vec<FileEntry>,
}

/// A structural division.
#[derive(Debug, Clone, PartialEq)]
pub struct Div {
    pub id: String,
    pub label: String,
    pub div_type: Option<String>,
    pub order: Option<u32>,
    /// Id of the `file` this division points at, if any.
    pub file_id: Option<String>,
    pub children: Vec<Div>,
}

impl Div {
    fn collect_ids<'a>(&'a self, ids: &mut Vec<&'a str>) {
        ids.push(&self.id);
        for child in &self.children {
            child.collect_ids(ids);
        }
    }

    fn collect_file_refs<'a>(&'a self, refs: &mut Vec<&'a str>) {
        if let Some(file_id) = &self.file_id {
            refs.push(file_id);
        }
        for child in &self.children {
            child.collect_file_refs(refs);
        }
    }

    fn to_element(&self) -> Element {
        let mut el = Element::mets("div").with_attr("ID", self.id.as_str());
        if let Some(t) = &self.div_type {
            el = el.with_attr("TYPE", t.as_str());
        }
        el = el.with_attr("LABEL", self.label.as_str());
        if let Some(order) = self.order {
            el = el.with_attr("ORDER", order.to_string());
        }
        if let Some(file_id) = &self.file_id {
            el = el.with_child(Element::mets("fptr").with_attr("FILEID", file_id.as_str()));
        }
        self.children
            .iter()
            .map(Div::to_element)
            .fold(el, Element::with_child)
    }
}

/// The structural map: one root division and its ordered children.
#[derive(Debug, Clone, PartialEq)]
pub struct StructMap {
    pub id: String,
    pub map_type: String,
    pub root: Div,
}

/// A METS document under assembly.
#[derive(Debug, Clone, Default)]
pub struct Document {
    amd_secs: Vec<AmdSec>,
    file_grps: Vec<FileGrp>,
    struct_map: Option<StructMap>,
    ids: HashSet<String>,
}

/// Create an empty METS document with no sections.
pub fn build_mets() -> Document {
    Document::default()
}

/// Attach a new administrative section holding one metadata section per wrapper.
///
/// Metadata section ids are `{section_id}-md{n}`, numbered from 1.
pub fn build_amdsec(
    doc: &mut Document,
    section_id: &str,
    kind: MdKind,
    wraps: Vec<MdWrap>,
) -> Result<(), MetsError> {
    if wraps.is_empty() {
        return Err(MetsError::EmptySection(section_id.to_string()));
    }
    let sections: Vec<MdSection> = wraps
        .into_iter()
        .enumerate()
        .map(|(i, wrap)| MdSection {
            id: format!("{section_id}-md{}", i + 1),
            wrap,
        })
        .collect();

    let mut new_ids = vec![section_id];
    new_ids.extend(sections.iter().map(|s| s.id.as_str()));
    doc.check_new_ids(&new_ids)?;
    doc.register(&new_ids);

    tracing::debug!(id = section_id, kind = kind.element_name(), "added amdSec");
    doc.amd_secs.push(AmdSec {
        id: section_id.to_string(),
        kind,
        sections,
    });
    Ok(())
}

impl Document {
    pub fn amd_secs(&self) -> &[AmdSec] {
        &self.amd_secs
    }

    pub fn file_grps(&self) -> &[FileGrp] {
        &self.file_grps
    }

    pub fn struct_map(&self) -> Option<&StructMap> {
        self.struct_map.as_ref()
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn amd_sec(&self, id: &str) -> Option<&AmdSec> {
        self.amd_secs.iter().find(|a| a.id == id)
    }

    /// Look up a file entry by id across all groups.
    pub fn file(&self, id: &str) -> Option<&FileEntry> {
        self.file_grps
            .iter()
            .flat_map(|g| g.files.iter())
            .find(|f| f.id == id)
    }

    fn check_new_ids(&self, ids: &[&str]) -> Result<(), MetsError> {
        let mut seen = HashSet::new();
        for id in ids {
            if self.ids.contains(*id) || !seen.insert(*id) {
                return Err(MetsError::DuplicateId(id.to_string()));
            }
        }
        Ok(())
    }

    fn register(&mut self, ids: &[&str]) {
        self.ids.extend(ids.iter().map(|id| id.to_string()));
    }

    fn check_amd_refs<'a>(&self, refs: impl IntoIterator<Item = &'a String>) -> Result<(), MetsError> {
        for admid in refs {
            if self.amd_sec(admid).is_none() {
                return Err(MetsError::DanglingReference(admid.clone()));
            }
        }
        Ok(())
    }

    /// Append a file group. Group and file ids must be new; every `ADMID`
    /// must name an existing administrative section.
    pub fn add_file_grp(&mut self, grp: FileGrp) -> Result<(), MetsError> {
        let mut new_ids = vec![grp.id.as_str()];
        new_ids.extend(grp.files.iter().map(|f| f.id.as_str()));
        self.check_new_ids(&new_ids)?;
        self.check_amd_refs(&grp.admids)?;
        self.check_amd_refs(grp.files.iter().flat_map(|f| f.admids.iter()))?;

        let owned: Vec<String> = new_ids.iter().map(|s| s.to_string()).collect();
        self.ids.extend(owned);

        tracing::debug!(id = %grp.id, files = grp.files.len(), "added fileGrp");
        self.file_grps.push(grp);
        Ok(())
    }

    /// Set the document's structural map. Every `fptr` must point at a file
    /// already present in a file group.
    pub fn set_struct_map(&mut self, map: StructMap) -> Result<(), MetsError> {
        if self.struct_map.is_some() {
            return Err(MetsError::StructMapExists);
        }
        let mut new_ids = vec![map.id.as_str()];
        map.root.collect_ids(&mut new_ids);
        self.check_new_ids(&new_ids)?;

        let mut refs = Vec::new();
        map.root.collect_file_refs(&mut refs);
        if let Some(missing) = refs.iter().find(|r| self.file(r).is_none()) {
            return Err(MetsError::DanglingReference(missing.to_string()));
        }

        let owned: Vec<String> = new_ids.iter().map(|s| s.to_string()).collect();
        self.ids.extend(owned);

        tracing::debug!(id = %map.id, divs = map.root.children.len(), "added structMap");
        self.struct_map = Some(map);
        Ok(())
    }

    /// Render the document as a `mets:mets` element tree.
    pub fn to_element(&self) -> Element {
        let mut root = Element::mets("mets")
            .declare_ns(METS_NS)
            .declare_ns(XLINK_NS)
            .with_attr_ns(QName::new(XSI_NS, "schemaLocation"), METS_SCHEMA_LOCATION);

        for amd in &self.amd_secs {
            root.push(amd_sec_element(amd));
        }
        if !self.file_grps.is_empty() {
            let file_sec = self
                .file_grps
                .iter()
                .map(file_grp_element)
                .fold(Element::mets("fileSec"), Element::with_child);
            root.push(file_sec);
        }
        if let Some(map) = &self.struct_map {
            root.push(
                Element::mets("structMap")
                    .with_attr("ID", map.id.as_str())
                    .with_attr("TYPE", map.map_type.as_str())
                    .with_child(map.root.to_element()),
            );
        }
        root
    }

    /// Serialize with an XML declaration and the given indent width.
    pub fn to_xml(&self, indent: usize) -> Result<String, MetsError> {
        Ok(self.to_element().to_pretty_string(indent)?)
    }
}

fn amd_sec_element(amd: &AmdSec) -> Element {
    amd.sections
        .iter()
        .map(|s| {
            Element::mets(amd.kind.element_name())
                .with_attr("ID", s.id.as_str())
                .with_child(s.wrap.to_element())
        })
        .fold(
            Element::mets("amdSec").with_attr("ID", amd.id.as_str()),
            Element::with_child,
        )
}

fn file_grp_element(grp: &FileGrp) -> Element {
    let mut el = Element::mets("fileGrp")
        .with_attr("ID", grp.id.as_str())
        .with_attr("USE", grp.usage.as_str());
    if !grp.admids.is_empty() {
        el = el.with_attr("ADMID", grp.admids.join(" "));
    }
    grp.files.iter().map(file_element).fold(el, Element::with_child)
}

fn file_element(file: &FileEntry) -> Element {
    let mut el = Element::mets("file")
        .with_attr("ID", file.id.as_str())
        .with_attr("MIMETYPE", file.facts.mimetype.as_str())
        .with_attr("SIZE", file.facts.size.to_string());
    if let Some(checksum) = &file.facts.checksum {
        el = el
            .with_attr("CHECKSUM", checksum.as_str())
            .with_attr("CHECKSUMTYPE", SHA256);
    }
    if !file.admids.is_empty() {
        el = el.with_attr("ADMID", file.admids.join(" "));
    }
    el.with_child(
        Element::mets("FLocat")
            .with_attr("LOCTYPE", "URL")
            .with_attr_ns(QName::new(XLINK_NS, "href"), file.href.as_str()),
    )
}
