//! AIP root METS construction
//!
//! Rewrites the SIP root METS template into the aggregate AIP document:
//! header, refreshed descriptive-metadata fixity, a submission reference,
//! per-representation references, and the mirrored structural map. The
//! representation documents must already exist on disk; the file-section
//! and structural-map passes share one ordered plan of preservation names
//! so their numbering can never drift apart.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::TransformError;
use crate::fixity;
use crate::ids::{new_structural_id, IdMap, PackageName};
use crate::mets::{new_file_element, required_child_mut, stamp_header, TransformOptions};
use crate::namespaces::Namespaces;
use crate::rewrite::rewrite_identifiers;
use crate::xml::{Document, Element, Node};

/// Ordered list of preservation representation names ("rep01.1", ...),
/// consumed by both the file-section and the structural-map pass
#[derive(Debug, Default)]
struct RepresentationPlan {
    names: Vec<String>,
}

impl RepresentationPlan {
    fn name_for(&mut self, index: usize) -> &str {
        while self.names.len() <= index {
            self.names.push(format!("rep{:02}.1", self.names.len() + 1));
        }
        &self.names[index]
    }
}

/// Build the AIP root METS document at `aip_root/METS.xml`.
///
/// `seed` must map the old package identifier to the new one so that
/// references to it are carried across documents. Returns the path of the
/// written document.
pub fn build_root_mets(
    template: &Path,
    aip_root: &Path,
    seed: IdMap,
    options: &TransformOptions,
) -> Result<PathBuf, TransformError> {
    let mut doc = Document::from_file(template)?;
    let ns = Namespaces::from_root(&doc.root);
    let stamp = fixity::now_timestamp();

    let dir_name = aip_root
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TransformError::structural("destination directory has no name"))?;
    let objid = PackageName::parse(dir_name)?.token;

    stamp_header(&mut doc.root, &ns, &objid, &stamp, options)?;

    refresh_descriptive_metadata_ref(&mut doc.root, &ns, aip_root)?;

    let mut plan = RepresentationPlan::default();
    let submission_group_id =
        rewrite_file_section(&mut doc.root, &ns, aip_root, &stamp, &mut plan)?;

    rewrite_struct_map(&mut doc.root, &ns, &objid, &submission_group_id, &mut plan)?;

    let mut map = seed;
    rewrite_identifiers(&mut doc.root, &ns, &mut map)?;

    let output = aip_root.join("METS.xml");
    doc.write_to_file(&output)?;
    info!(package = %objid, "wrote root METS");
    Ok(output)
}

/// Recompute size and checksum of the descriptive-metadata target from the
/// live file. Fatal when the referenced file does not exist.
fn refresh_descriptive_metadata_ref(
    root: &mut Element,
    ns: &Namespaces,
    aip_root: &Path,
) -> Result<(), TransformError> {
    let href_attr = ns.xlink("href")?;
    let dmd = match root.find_mut("dmdSec") {
        Some(dmd) => dmd,
        None => return Ok(()),
    };
    let md_ref = required_child_mut(dmd, "mdRef")?;
    let href = md_ref
        .attr(&href_attr)
        .ok_or_else(|| TransformError::structural("mdRef carries no xlink:href"))?
        .to_string();

    let target = aip_root.join(&href);
    if !target.is_file() {
        return Err(TransformError::structural(format!(
            "descriptive metadata target '{}' not found",
            href
        )));
    }
    let facts = fixity::gather(&target)?;
    md_ref.set_attr("SIZE", facts.size.to_string());
    md_ref.set_attr("CHECKSUM", facts.checksum);
    Ok(())
}

/// Add the submission file group and convert every representations group
/// into a single reference to its preservation METS document. Returns the
/// submission group's identifier token for the structural-map pass.
fn rewrite_file_section(
    root: &mut Element,
    ns: &Namespaces,
    aip_root: &Path,
    stamp: &str,
    plan: &mut RepresentationPlan,
) -> Result<String, TransformError> {
    let submission_href = find_submission_mets(aip_root)?;
    let submission_id = new_structural_id();

    let mut submission_group = Element::new(ns.mets("fileGrp"));
    submission_group.set_attr("ID", submission_id.clone());
    submission_group.set_attr("USE", "Submission");
    submission_group.push(new_file_element(
        ns,
        &aip_root.join(&submission_href),
        &submission_href,
        stamp,
    )?);

    let file_sec = required_child_mut(root, "fileSec")?;
    file_sec.push(submission_group);

    let mut index = 0;
    for group in file_sec.find_all_mut("fileGrp") {
        let usage = match group.attr("USE") {
            Some(usage) => usage.to_string(),
            None => continue,
        };
        if !usage.to_lowercase().starts_with("representations") {
            continue;
        }
        if usage.split('/').count() != 2 {
            return Err(TransformError::structural(
                "unsupported representations structure",
            ));
        }

        let name = plan.name_for(index).to_string();
        index += 1;
        let rep_path = format!("representations/{}", name);
        group.set_attr("USE", capitalize_first(&rep_path));
        group.retain_elements(|e| e.local_name() != "file");

        let mets_href = format!("{}/METS.xml", rep_path);
        let mets_path = aip_root.join(&mets_href);
        if mets_path.is_file() {
            group.push(new_file_element(ns, &mets_path, &mets_href, stamp)?);
        } else {
            warn!(
                representation = %name,
                "representation METS not found on disk, omitting file reference"
            );
        }
    }
    Ok(submission_id)
}

/// Mirror the file-section conversion onto the structural map, using the
/// same ordered plan, and rebuild the submission division
fn rewrite_struct_map(
    root: &mut Element,
    ns: &Namespaces,
    objid: &str,
    submission_group_id: &str,
    plan: &mut RepresentationPlan,
) -> Result<(), TransformError> {
    let type_attr = ns.xlink("type")?;
    let href_attr = ns.xlink("href")?;
    let title_attr = ns.xlink("title")?;
    let div_name = ns.mets("div");
    let mptr_name = ns.mets("mptr");

    let struct_map = required_child_mut(root, "structMap")?;
    let root_div = required_child_mut(struct_map, "div")?;
    root_div.set_attr("LABEL", objid);

    let mut index = 0;
    for div in root_div.find_all_mut("div") {
        let label = match div.attr("LABEL") {
            Some(label) => label.to_string(),
            None => continue,
        };
        if !label.to_lowercase().starts_with("representations") {
            continue;
        }
        if label.split('/').count() != 2 {
            return Err(TransformError::structural(
                "unsupported representations structure",
            ));
        }

        let name = plan.name_for(index).to_string();
        index += 1;
        div.set_attr("LABEL", "Representations");

        let pos = div
            .children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if e.local_name() == "mptr"))
            .ok_or_else(|| {
                TransformError::structural("representation division carries no mptr")
            })?;
        let mut sub_div = Element::new(div_name.clone());
        sub_div.set_attr("ID", new_structural_id());
        sub_div.set_attr("LABEL", capitalize_first(&name));
        if let Node::Element(mut mptr) = div.children.remove(pos) {
            mptr.set_attr(
                href_attr.clone(),
                format!("representations/{}/METS.xml", name),
            );
            sub_div.push(mptr);
        }
        div.push(sub_div);
    }

    // The submitted submission division is superseded by a freshly built one
    root_div.retain_elements(|e| {
        !(e.local_name() == "div"
            && e.attr("LABEL")
                .map(|l| l.eq_ignore_ascii_case("submission"))
                .unwrap_or(false))
    });

    let mut submission_div = Element::new(div_name);
    submission_div.set_attr("ID", new_structural_id());
    submission_div.set_attr("LABEL", "Submission");
    let mut mptr = Element::new(mptr_name);
    mptr.set_attr(type_attr, "simple");
    mptr.set_attr(href_attr, "submission/METS.xml");
    // Carries the submission file-group token; the final rewrite maps both
    // to the group's fresh identifier, preserving the link
    mptr.set_attr(title_attr, submission_group_id);
    mptr.set_attr("LOCTYPE", "URL");
    submission_div.push(mptr);
    root_div.push(submission_div);

    Ok(())
}

/// Relative href of the copied submission METS document
fn find_submission_mets(aip_root: &Path) -> Result<String, TransformError> {
    let submission_dir = aip_root.join("submission");
    let entries = fs::read_dir(&submission_dir).map_err(|_| {
        TransformError::structural("copied submission directory not found in destination")
    })?;

    let mut candidates: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| {
            name.starts_with("submission-")
                && submission_dir.join(name).join("METS.xml").is_file()
        })
        .collect();
    candidates.sort();

    candidates
        .first()
        .map(|name| format!("submission/{}/METS.xml", name))
        .ok_or_else(|| TransformError::structural("copied submission METS not found"))
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
