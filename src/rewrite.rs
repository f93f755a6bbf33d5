//! Reference-graph rewriting for METS documents
//!
//! Every defining identifier in a document is replaced with a fresh one
//! and every reference to it is remapped, closing the ID graph again. The
//! work happens in two explicit phases: an assignment pass over the
//! metadata and file sections produces the complete old->new map, then a
//! pure substitution pass rewrites the structural maps against it. The
//! caller may seed the map with cross-document identifiers it knows about
//! (e.g. the old package identifier).

use crate::error::TransformError;
use crate::ids::{new_leaf_id, new_structural_id, IdMap};
use crate::namespaces::Namespaces;
use crate::xml::Element;

/// Rewrite all identifiers of a parsed METS document in place.
///
/// Metadata sections and file groups get fresh structural identifiers and
/// file entries fresh leaf identifiers, all recorded in `map`. Structural
/// maps and their divisions are refreshed without recording (nothing
/// references them, and the root transformer deliberately reuses the
/// submission file-group token on its division). References resolve
/// through the completed map; a reference that was never locally defined
/// is left alone when it syntactically names a file and otherwise receives
/// a fresh, unrecorded identifier.
pub fn rewrite_identifiers(
    root: &mut Element,
    ns: &Namespaces,
    map: &mut IdMap,
) -> Result<(), TransformError> {
    // Phase 1: assignment
    for section in root.find_all_mut("dmdSec") {
        assign_structural(section, map)?;
    }
    for section in root.find_all_mut("amdSec") {
        assign_structural(section, map)?;
    }
    if let Some(file_sec) = root.find_mut("fileSec") {
        file_sec.set_attr("ID", new_structural_id());
        for group in file_sec.find_all_mut("fileGrp") {
            assign_file_group(group, map)?;
        }
    }

    // Phase 2: substitution
    let title_attr = ns.xlink("title").ok();
    for struct_map in root.find_all_mut("structMap") {
        struct_map.set_attr("ID", new_structural_id());
        for div in struct_map.find_all_mut("div") {
            substitute_div(div, map, title_attr.as_deref());
        }
    }

    Ok(())
}

/// Whether a reference value syntactically names a file rather than an
/// identifier (contains a path separator or an extension dot)
pub fn looks_like_file_reference(value: &str) -> bool {
    value.contains('/') || value.contains('.')
}

fn assign_structural(section: &mut Element, map: &mut IdMap) -> Result<(), TransformError> {
    let fresh = new_structural_id();
    if let Some(old) = section.attr("ID").map(str::to_string) {
        map.record(old, fresh.clone())?;
    }
    section.set_attr("ID", fresh);
    Ok(())
}

/// File groups may nest one level; each level gets its own fresh
/// structural ID before its member files get leaf IDs
fn assign_file_group(group: &mut Element, map: &mut IdMap) -> Result<(), TransformError> {
    assign_structural(group, map)?;
    for child in group.elements_mut() {
        match child.local_name() {
            "file" => {
                let fresh = new_leaf_id();
                if let Some(old) = child.attr("ID").map(str::to_string) {
                    map.record(old, fresh.clone())?;
                }
                child.set_attr("ID", fresh);
            }
            "fileGrp" => assign_file_group(child, map)?,
            _ => {}
        }
    }
    Ok(())
}

fn substitute_div(div: &mut Element, map: &IdMap, title_attr: Option<&str>) {
    div.set_attr("ID", new_structural_id());

    if let Some(old) = div.attr("DMDID").map(str::to_string) {
        let new = map
            .lookup(&old)
            .map(str::to_string)
            .unwrap_or_else(new_structural_id);
        div.set_attr("DMDID", new);
    }

    for child in div.elements_mut() {
        match child.local_name() {
            "div" => substitute_div(child, map, title_attr),
            "fptr" => {
                if let Some(old) = child.attr("FILEID").map(str::to_string) {
                    if let Some(new) = map.lookup(&old) {
                        child.set_attr("FILEID", new.to_string());
                    } else if !looks_like_file_reference(&old) {
                        child.set_attr("FILEID", new_structural_id());
                    }
                }
            }
            "mptr" => {
                if let Some(attr) = title_attr {
                    if let Some(old) = child.attr(attr).map(str::to_string) {
                        let new = map
                            .lookup(&old)
                            .map(str::to_string)
                            .unwrap_or_else(new_structural_id);
                        child.set_attr(attr, new);
                    }
                }
            }
            _ => {}
        }
    }
}
