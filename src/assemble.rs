//! Administrative sections, file groups and the structural map for one
//! intellectual entity.
//!
//! An intellectual entity (a book, a box) arrives as up to three directories,
//! one per processing tier. Each populated tier becomes a representation:
//!
//! | Tier | Representation | `preservationType` |
//! |------|----------------|--------------------|
//! | preservation master | `rep1` | `PRESERVATION_MASTER` |
//! | modified master | `rep2` | `MODIFIED_MASTER` |
//! | access derivative | `rep3` | `DERIVATIVE_COPY` |
//!
//! For every representation the assembler adds:
//!
//! - `{rep}-amd-tech`: an `amdSec` with a `techMD` describing the
//!   representation (DNX `generalRepCharacteristics`).
//! - `{rep}-amd-digiprov`: an `amdSec` with a `digiprovMD` recording how the
//!   files came to be (DNX `event`).
//! - a `fileGrp` with one `file` per directory entry, in
//!   [`ordered_file_list`] order, ids `fid{n}-{repnum}`, each pointing back
//!   at both administrative sections through `ADMID`.
//!
//! Then one `structMap` whose root division is the entity itself, with one
//! child division per file of the *primary* representation (preservation
//! master when given, otherwise the first tier supplied). Child divisions
//! carry `ORDER` 1..N in file order and an `fptr` to their file.
//!
//! All directory listings and file inspection happen before the document is
//! touched, and the sections are then added to a copy that replaces the
//! document only when every section was accepted. A failed assembly (missing
//! directory, unreadable file, id collision) leaves the document unchanged.
//! File inspection runs on the rayon pool; results are collected back in
//! listing order.

use crate::config::FactoryConfig;
use crate::document::{
    Div, Document, FileEntry, FileGrp, MdKind, MetsError, StructMap, build_amdsec,
};
use crate::inspect::{FileFacts, FileInspector, Sha256Inspector};
use crate::mdwrap::{MdWrap, WrapAttributes, build_mdwrap};
use crate::ordering::ordered_file_list;
use crate::xml::{DNX_NS, Element, QName};
use rayon::prelude::*;
use std::path::{Component, Path, PathBuf};

/// Processing tier of a directory of files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    PreservationMaster,
    ModifiedMaster,
    AccessDerivative,
}

impl Role {
    /// Representation number: 1, 2, 3 in tier order.
    pub fn rep_number(self) -> u32 {
        match self {
            Role::PreservationMaster => 1,
            Role::ModifiedMaster => 2,
            Role::AccessDerivative => 3,
        }
    }

    pub fn rep_id(self) -> String {
        format!("rep{}", self.rep_number())
    }

    pub fn preservation_type(self) -> &'static str {
        match self {
            Role::PreservationMaster => "PRESERVATION_MASTER",
            Role::ModifiedMaster => "MODIFIED_MASTER",
            Role::AccessDerivative => "DERIVATIVE_COPY",
        }
    }

    /// Id of the administrative section of the given kind for this role.
    pub fn amd_id(self, kind: MdKind) -> String {
        format!("{}-amd-{}", self.rep_id(), kind.id_tag())
    }
}

/// Directories and flags describing one intellectual entity.
#[derive(Debug, Clone, Copy)]
pub struct EntityInput<'a> {
    pub ie_id: &'a str,
    pub pres_master_dir: Option<&'a Path>,
    pub modified_master_dir: Option<&'a Path>,
    pub access_derivative_dir: Option<&'a Path>,
    /// Born-digital original rather than a scan of a physical object.
    pub digital_original: bool,
    /// Batch root; file locations are written relative to it.
    pub input_dir: &'a Path,
}

impl EntityInput<'_> {
    /// Supplied directories in tier order.
    fn role_dirs(&self) -> Vec<(Role, &Path)> {
        [
            (Role::PreservationMaster, self.pres_master_dir),
            (Role::ModifiedMaster, self.modified_master_dir),
            (Role::AccessDerivative, self.access_derivative_dir),
        ]
        .into_iter()
        .filter_map(|(role, dir)| dir.map(|d| (role, d)))
        .collect()
    }
}

/// Builds entity sections into a [`Document`] using a config and a file inspector.
pub struct Assembler<I: FileInspector = Sha256Inspector> {
    config: FactoryConfig,
    inspector: I,
}

impl Assembler<Sha256Inspector> {
    /// Assembler backed by the filesystem, honouring `checksums.enabled`.
    pub fn new(config: FactoryConfig) -> Self {
        let inspector = Sha256Inspector {
            checksums: config.checksums.enabled,
        };
        Self { config, inspector }
    }
}

impl<I: FileInspector> Assembler<I> {
    pub fn with_inspector<J: FileInspector>(self, inspector: J) -> Assembler<J> {
        Assembler {
            config: self.config,
            inspector,
        }
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Add the administrative sections, file groups and structural map for
    /// `entity` to `doc`.
    pub fn assemble(&self, doc: &mut Document, entity: &EntityInput<'_>) -> Result<(), MetsError> {
        let role_dirs = entity.role_dirs();
        if role_dirs.is_empty() {
            return Err(MetsError::MissingPrimaryDirectory);
        }

        let input_root = std::path::absolute(entity.input_dir)?;
        let mut scanned: Vec<(Role, Vec<(PathBuf, FileFacts)>)> = Vec::new();
        for (role, dir) in &role_dirs {
            let paths = ordered_file_list(dir)?;
            let facts = paths
                .par_iter()
                .map(|p| self.inspector.inspect(p))
                .collect::<Result<Vec<_>, _>>()?;
            let absolute = paths
                .iter()
                .map(std::path::absolute)
                .collect::<Result<Vec<_>, _>>()?;
            scanned.push((*role, absolute.into_iter().zip(facts).collect()));
        }

        let mut staged = doc.clone();
        let divs = self.add_sections(&mut staged, entity, &input_root, scanned)?;
        *doc = staged;

        tracing::info!(
            ie = entity.ie_id,
            representations = role_dirs.len(),
            divisions = divs,
            "assembled intellectual entity"
        );
        Ok(())
    }

    /// Add every section for the scanned tiers; returns the division count.
    fn add_sections(
        &self,
        doc: &mut Document,
        entity: &EntityInput<'_>,
        input_root: &Path,
        scanned: Vec<(Role, Vec<(PathBuf, FileFacts)>)>,
    ) -> Result<usize, MetsError> {
        let mut primary_files: Option<Vec<FileEntry>> = None;
        for (role, files) in scanned {
            let tech_id = role.amd_id(MdKind::Technical);
            let digiprov_id = role.amd_id(MdKind::DigitalProvenance);

            build_amdsec(
                doc,
                &tech_id,
                MdKind::Technical,
                vec![self.technical_wrap(role, entity.digital_original)?],
            )?;
            build_amdsec(
                doc,
                &digiprov_id,
                MdKind::DigitalProvenance,
                vec![provenance_wrap(role, entity.digital_original)?],
            )?;

            let admids = vec![tech_id, digiprov_id];
            let entries: Vec<FileEntry> = files
                .into_iter()
                .enumerate()
                .map(|(i, (path, facts))| FileEntry {
                    id: format!("fid{}-{}", i + 1, role.rep_number()),
                    admids: admids.clone(),
                    href: location_href(&path, input_root),
                    path,
                    facts,
                })
                .collect();

            if primary_files.is_none() {
                primary_files = Some(entries.clone());
            }
            doc.add_file_grp(FileGrp {
                id: role.rep_id(),
                usage: self.config.file_groups.usage_type.clone(),
                admids,
                files: entries,
            })?;
        }

        let primary = primary_files.ok_or(MetsError::MissingPrimaryDirectory)?;
        doc.set_struct_map(self.struct_map(entity.ie_id, &primary))?;
        Ok(primary.len())
    }

    fn technical_wrap(&self, role: Role, digital_original: bool) -> Result<MdWrap, MetsError> {
        let dnx = dnx_section(
            "generalRepCharacteristics",
            &[
                ("preservationType", role.preservation_type()),
                ("usageType", self.config.file_groups.usage_type.as_str()),
                ("RevisionNumber", "1"),
                ("DigitalOriginal", if digital_original { "true" } else { "false" }),
            ],
        );
        Ok(build_mdwrap(WrapAttributes::other("dnx"), None, Some(vec![dnx]))?)
    }

    fn struct_map(&self, ie_id: &str, files: &[FileEntry]) -> StructMap {
        let children = files
            .iter()
            .enumerate()
            .map(|(i, file)| Div {
                id: format!("{ie_id}-div{}", i + 1),
                label: file
                    .path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| file.id.clone()),
                div_type: Some(self.config.struct_map.div_type.clone()),
                order: Some(i as u32 + 1),
                file_id: Some(file.id.clone()),
                children: vec![],
            })
            .collect();

        StructMap {
            id: format!("{ie_id}-structmap"),
            map_type: self.config.struct_map.map_type.clone(),
            root: Div {
                id: ie_id.to_string(),
                label: ie_id.to_string(),
                div_type: None,
                order: None,
                file_id: None,
                children,
            },
        }
    }
}

/// Assemble with stock config and filesystem inspection.
pub fn build_amdsec_filegrp_structmap(
    doc: &mut Document,
    entity: &EntityInput<'_>,
) -> Result<(), MetsError> {
    Assembler::new(FactoryConfig::default()).assemble(doc, entity)
}

fn provenance_wrap(role: Role, digital_original: bool) -> Result<MdWrap, MetsError> {
    let (event_type, description) = match (role, digital_original) {
        (Role::PreservationMaster, true) => ("CREATION", "Born-digital original"),
        (Role::PreservationMaster, false) => ("DIGITIZATION", "Digitized from physical original"),
        (Role::ModifiedMaster, _) => ("MODIFICATION", "Modified copy of the preservation master"),
        (Role::AccessDerivative, _) => ("DERIVATION", "Access derivative for distribution"),
    };
    let dnx = dnx_section(
        "event",
        &[
            ("eventType", event_type),
            ("eventDescription", description),
            ("eventOutcome1", "SUCCESS"),
        ],
    );
    Ok(build_mdwrap(WrapAttributes::other("dnx"), None, Some(vec![dnx]))?)
}

/// `<dnx><section id=..><record><key id=..>value</key>..</record></section></dnx>`
fn dnx_section(section_id: &str, keys: &[(&str, &str)]) -> Element {
    let record = keys.iter().fold(
        Element::new(QName::new(DNX_NS, "record")),
        |record, (id, value)| {
            record.with_child(
                Element::new(QName::new(DNX_NS, "key"))
                    .with_attr("id", *id)
                    .with_text(*value),
            )
        },
    );
    Element::new(QName::new(DNX_NS, "dnx")).with_child(
        Element::new(QName::new(DNX_NS, "section"))
            .with_attr("id", section_id)
            .with_child(record),
    )
}

/// `xlink:href` for a file: relative to the batch root with `/` separators
/// when the file lies under it, otherwise the absolute path.
fn location_href(path: &Path, input_root: &Path) -> String {
    match path.strip_prefix(input_root) {
        Ok(rel) => rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().to_string()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().to_string(),
    }
}
