//! End-to-end assembly through the public API.
//!
//! Builds a document from a synthetic batch, serializes it, re-parses the
//! XML, and checks the cross-references hold in the serialized form.

use mets_factory::xml::{Element, QName, XLINK_NS};
use mets_factory::{
    Assembler, EntityInput, MetsError, build_amdsec_filegrp_structmap, build_mets,
    ordered_file_list,
};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const AMD_SEC: &str = "./{http://www.loc.gov/METS/}amdSec";
const FILE: &str = "{http://www.loc.gov/METS/}file";
const DIV: &str = "{http://www.loc.gov/METS/}div";
const FPTR: &str = "{http://www.loc.gov/METS/}fptr";

fn make_batch(tiers: &[(&str, &[&str])]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for (tier, names) in tiers {
        let dir = tmp.path().join(tier);
        fs::create_dir_all(&dir).unwrap();
        for name in *names {
            fs::write(dir.join(name), format!("{tier}/{name}")).unwrap();
        }
    }
    tmp
}

fn input<'a>(root: &'a Path, pm: &'a Path, mm: &'a Path, ad: Option<&'a Path>) -> EntityInput<'a> {
    EntityInput {
        ie_id: "ie1",
        pres_master_dir: Some(pm),
        modified_master_dir: Some(mm),
        access_derivative_dir: ad,
        digital_original: false,
        input_dir: root,
    }
}

#[test]
fn serialized_document_keeps_every_reference() {
    let pm_files: &[&str] = &["10.tif", "2.tif", "1.tif", "cover.tif"];
    let mm_files: &[&str] = &["10.jpg", "2.jpg", "1.jpg", "cover.jpg"];
    let ad_files: &[&str] = &["1.pdf"];
    let batch = make_batch(&[("pm", pm_files), ("mm", mm_files), ("ad", ad_files)]);
    let root = batch.path();
    let (pm, mm, ad) = (root.join("pm"), root.join("mm"), root.join("ad"));
    let mut doc = build_mets();

    build_amdsec_filegrp_structmap(&mut doc, &input(root, &pm, &mm, Some(ad.as_path()))).unwrap();
    let parsed = Element::parse(&doc.to_xml(2).unwrap()).unwrap();

    // amdSec*, fileSec, structMap
    let order: Vec<_> = parsed
        .children()
        .iter()
        .map(|c| c.name.local.as_str())
        .collect();
    assert_eq!(
        order,
        vec!["amdSec", "amdSec", "amdSec", "amdSec", "amdSec", "amdSec", "fileSec", "structMap"]
    );

    let amd_ids: HashSet<&str> = parsed
        .find_all(AMD_SEC)
        .iter()
        .map(|a| a.attr("ID").unwrap())
        .collect();
    let files = parsed.descendants(FILE);
    assert_eq!(files.len(), 9);
    for file in &files {
        for admid in file.attr("ADMID").unwrap().split(' ') {
            assert!(amd_ids.contains(admid), "dangling ADMID {admid}");
        }
    }

    let file_ids: HashSet<&str> = files.iter().map(|f| f.attr("ID").unwrap()).collect();
    let fptrs = parsed.descendants(FPTR);
    assert_eq!(fptrs.len(), 4);
    for fptr in &fptrs {
        assert!(file_ids.contains(fptr.attr("FILEID").unwrap()));
    }

    // Divisions follow reading order of pm: other names first, then numbers.
    let structure = parsed.find("{http://www.loc.gov/METS/}structMap").unwrap();
    let top = structure.find(DIV).unwrap();
    assert_eq!(top.attr("LABEL"), Some("ie1"));
    let labels: Vec<_> = top
        .find_all(DIV)
        .iter()
        .map(|d| d.attr("LABEL").unwrap())
        .collect();
    assert_eq!(labels, vec!["cover", "1", "2", "10"]);
    let orders: Vec<_> = top
        .find_all(DIV)
        .iter()
        .map(|d| d.attr("ORDER").unwrap())
        .collect();
    assert_eq!(orders, vec!["1", "2", "3", "4"]);
}

#[test]
fn file_group_order_equals_ordered_listing() {
    let pm_files: &[&str] = &["3.tif", "20.tif", "100.tif", "b.tif", "a.tif"];
    let mm_files: &[&str] = &["x.jpg"];
    let batch = make_batch(&[("pm", pm_files), ("mm", mm_files)]);
    let root = batch.path();
    let (pm, mm) = (root.join("pm"), root.join("mm"));
    let mut doc = build_mets();

    build_amdsec_filegrp_structmap(&mut doc, &input(root, &pm, &mm, None)).unwrap();

    let listed: Vec<_> = ordered_file_list(&pm)
        .unwrap()
        .into_iter()
        .map(|p| std::path::absolute(p).unwrap())
        .collect();
    let grouped: Vec<_> = doc.file_grps()[0]
        .files
        .iter()
        .map(|f| f.path.clone())
        .collect();
    assert_eq!(grouped, listed);

    let el = doc.to_element();
    let hrefs: Vec<_> = el
        .descendants("{http://www.loc.gov/METS/}FLocat")
        .iter()
        .take(5)
        .map(|f| f.attr_ns(&QName::new(XLINK_NS, "href")).unwrap().to_string())
        .collect();
    assert_eq!(
        hrefs,
        vec!["pm/a.tif", "pm/b.tif", "pm/3.tif", "pm/20.tif", "pm/100.tif"]
    );
}

#[test]
fn checksums_match_file_contents() {
    let pm_files: &[&str] = &["1.tif"];
    let mm_files: &[&str] = &["1.jpg"];
    let batch = make_batch(&[("pm", pm_files), ("mm", mm_files)]);
    let root = batch.path();
    let (pm, mm) = (root.join("pm"), root.join("mm"));
    let mut doc = build_mets();

    Assembler::new(Default::default())
        .assemble(&mut doc, &input(root, &pm, &mm, None))
        .unwrap();

    let file = &doc.file_grps()[0].files[0];
    assert_eq!(file.facts.size, "pm/1.tif".len() as u64);
    assert_eq!(
        file.facts.checksum.as_deref(),
        Some(mets_factory::inspect::hash_file(&pm.join("1.tif")).unwrap().as_str())
    );
}

#[test]
fn no_tiers_is_rejected() {
    let batch = TempDir::new().unwrap();
    let mut doc = build_mets();
    let entity = EntityInput {
        ie_id: "ie1",
        pres_master_dir: None,
        modified_master_dir: None,
        access_derivative_dir: None,
        digital_original: true,
        input_dir: batch.path(),
    };

    let err = build_amdsec_filegrp_structmap(&mut doc, &entity).unwrap_err();

    assert!(matches!(err, MetsError::MissingPrimaryDirectory));
    assert!(doc.to_element().children().is_empty());
}
