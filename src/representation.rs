//! Preservation-representation METS construction
//!
//! Builds one AIP representation METS document from the submitted
//! representation's METS template plus the payload files already copied
//! into the destination representation directory.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::TransformError;
use crate::ids::{new_structural_id, IdMap};
use crate::mets::{new_file_element, required_child_mut, stamp_header, TransformOptions};
use crate::namespaces::Namespaces;
use crate::rewrite::rewrite_identifiers;
use crate::xml::{Document, Element};

/// Build the METS document of one preservation representation.
///
/// The destination `rep_root` (e.g. `representations/rep01.1`) must already
/// contain its `data` payload folder. Returns the path of the written
/// document.
pub fn build_representation_mets(
    template: &Path,
    rep_root: &Path,
    options: &TransformOptions,
) -> Result<PathBuf, TransformError> {
    let mut doc = Document::from_file(template)?;
    let ns = Namespaces::from_root(&doc.root);
    let stamp = crate::fixity::now_timestamp();

    let objid = rep_root
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TransformError::structural("representation directory has no name"))?
        .to_string();

    // Header
    stamp_header(&mut doc.root, &ns, &objid, &stamp, options)?;
    let header = required_child_mut(&mut doc.root, "metsHdr")?;
    header.retain_elements(|e| e.local_name() != "metsDocumentID");

    // File section: discard submitted groups, enumerate the live payload
    let group_id = new_structural_id();
    let data_group = build_data_group(&ns, &group_id, &rep_root.join("data"), &stamp)?;
    let file_sec = required_child_mut(&mut doc.root, "fileSec")?;
    file_sec.retain_elements(|e| e.local_name() != "fileGrp");
    file_sec.push(data_group);

    // Structural map: one root division containing the DATA division
    let struct_map = required_child_mut(&mut doc.root, "structMap")?;
    struct_map.retain_elements(|e| e.local_name() != "div");

    let mut data_div = Element::new(ns.mets("div"));
    data_div.set_attr("ID", new_structural_id());
    data_div.set_attr("LABEL", "DATA");
    let mut fptr = Element::new(ns.mets("fptr"));
    fptr.set_attr("FILEID", group_id);
    data_div.push(fptr);

    let mut root_div = Element::new(ns.mets("div"));
    root_div.set_attr("ID", new_structural_id());
    root_div.set_attr("TYPE", "ORIGINAL");
    root_div.set_attr("LABEL", objid.clone());
    root_div.push(data_div);
    struct_map.push(root_div);

    // Close the identifier graph with a run-local mapping
    let mut map = IdMap::new();
    rewrite_identifiers(&mut doc.root, &ns, &mut map)?;

    let output = rep_root.join("METS.xml");
    doc.write_to_file(&output)?;
    info!(representation = %objid, "wrote representation METS");
    Ok(output)
}

/// Single "Data" file group enumerating every file currently present in
/// the payload folder, in name order
fn build_data_group(
    ns: &Namespaces,
    group_id: &str,
    data_dir: &Path,
    stamp: &str,
) -> Result<Element, TransformError> {
    let mut group = Element::new(ns.mets("fileGrp"));
    group.set_attr("ID", group_id);
    group.set_attr("USE", "Data");

    let mut entries: Vec<PathBuf> = std::fs::read_dir(data_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    entries.sort();

    for path in entries {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let href = format!("data/{}", name);
        group.push(new_file_element(ns, &path, &href, stamp)?);
    }
    Ok(group)
}
