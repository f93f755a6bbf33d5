//! Package orchestration
//!
//! Validates the source SIP, derives the new AIP name, lays out the
//! destination directory (submission copy, mirrored folders, preservation
//! representations) and sequences the two METS transformations. All steps
//! are synchronous and run in a fixed order; the first failure aborts the
//! run with the destination left as-is for inspection.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;
use walkdir::WalkDir;

use crate::error::TransformError;
use crate::fixity;
use crate::ids::{new_structural_id, IdMap, PackageName};
use crate::mets::TransformOptions;
use crate::representation::build_representation_mets;
use crate::root::build_root_mets;
use crate::xml::{Document, Element};

/// SIP folders mirrored to the AIP root in addition to the submission copy
const MIRRORED_FOLDERS: &[&str] = &["metadata", "schemas", "documentation"];

/// Check that the source exists and that the output path, when present,
/// is a directory
pub fn validate_directories(sip_dir: &Path, output_dir: &Path) -> Result<(), TransformError> {
    if !sip_dir.is_dir() {
        return Err(TransformError::Validation(format!(
            "'{}' is not an existing directory",
            sip_dir.display()
        )));
    }
    if output_dir.exists() && !output_dir.is_dir() {
        return Err(TransformError::Validation(format!(
            "'{}' exists but is not a directory",
            output_dir.display()
        )));
    }
    Ok(())
}

/// Convert one SIP directory into an AIP under `output_dir`.
///
/// Returns the name of the created AIP directory,
/// `<prefix>uuid-<fresh v4>`, derived from the SIP directory name.
pub fn transform_package(
    sip_dir: &Path,
    output_dir: &Path,
    options: &TransformOptions,
) -> Result<String, TransformError> {
    validate_directories(sip_dir, output_dir)?;

    let sip_name = sip_dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| TransformError::Validation("source directory has no name".to_string()))?;
    let old = PackageName::parse(sip_name)?;
    let new_token = new_structural_id();
    let aip_name = format!("{}{}", old.prefix, new_token);

    let aip_root = output_dir.join(&aip_name);
    recreate_directory(&aip_root)?;
    info!(source = %old.full(), destination = %aip_name, "transforming package");

    copy_sip_contents(sip_dir, &aip_root)?;
    build_preservation_representations(sip_dir, &aip_root, options)?;
    refresh_descriptive_metadata(&aip_root, &old.token, &new_token)?;

    let seed = IdMap::seeded(old.token.clone(), new_token.clone());
    build_root_mets(&sip_dir.join("METS.xml"), &aip_root, seed, options)?;

    info!(package = %aip_name, "transformation complete");
    Ok(aip_name)
}

/// Copy the submitted package into the destination: the whole SIP content
/// under `submission/submission-<date>/`, and the mirrored folders a second
/// time at the AIP root
fn copy_sip_contents(sip_dir: &Path, aip_root: &Path) -> Result<(), TransformError> {
    if !sip_dir.join("representations").is_dir() {
        return Err(TransformError::structural(
            "SIP carries no representations directory",
        ));
    }
    let sip_mets = sip_dir.join("METS.xml");
    if !sip_mets.is_file() {
        return Err(TransformError::structural("SIP METS.xml not found"));
    }

    let submission = aip_root
        .join("submission")
        .join(format!("submission-{}", fixity::today()));
    fs::create_dir_all(&submission)?;
    fs::copy(&sip_mets, submission.join("METS.xml"))?;

    for folder in ["representations", "metadata", "schemas", "documentation"] {
        let source = sip_dir.join(folder);
        if source.is_dir() {
            copy_tree(&source, &submission.join(folder))?;
        }
    }
    for folder in MIRRORED_FOLDERS {
        let source = sip_dir.join(folder);
        if source.is_dir() {
            copy_tree(&source, &aip_root.join(folder))?;
        }
    }
    Ok(())
}

/// Create one preservation representation per submitted representation,
/// in name order: copy its payload into `repNN.1/data` and build the
/// representation METS from the submitted document
fn build_preservation_representations(
    sip_dir: &Path,
    aip_root: &Path,
    options: &TransformOptions,
) -> Result<(), TransformError> {
    let source_root = sip_dir.join("representations");
    let mut sources: Vec<PathBuf> = fs::read_dir(&source_root)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    sources.sort();

    for (index, source) in sources.iter().enumerate() {
        let template = source.join("METS.xml");
        if !template.is_file() {
            return Err(TransformError::structural(format!(
                "representation '{}' carries no METS.xml",
                source.display()
            )));
        }

        let name = format!("rep{:02}.1", index + 1);
        let rep_root = aip_root.join("representations").join(&name);
        fs::create_dir_all(rep_root.join("data"))?;

        let source_data = source.join("data");
        if source_data.is_dir() {
            copy_tree(&source_data, &rep_root.join("data"))?;
        }
        build_representation_mets(&template, &rep_root, options)?;
    }
    Ok(())
}

/// Swap the old package token for the new one in the descriptive metadata,
/// so its identifier matches the AIP before the root METS fixes its checksum
fn refresh_descriptive_metadata(
    aip_root: &Path,
    old_token: &str,
    new_token: &str,
) -> Result<(), TransformError> {
    let dc_path = aip_root.join("metadata/descriptive/dc.xml");
    if !dc_path.is_file() {
        return Ok(());
    }
    let mut doc = Document::from_file(&dc_path)?;
    if replace_token_text(&mut doc.root, old_token, new_token) {
        doc.write_to_file(&dc_path)?;
    }
    Ok(())
}

fn replace_token_text(element: &mut Element, old: &str, new: &str) -> bool {
    let mut changed = false;
    if element.text() == Some(old) {
        element.set_text(new.to_string());
        changed = true;
    }
    for child in element.elements_mut() {
        changed |= replace_token_text(child, old, new);
    }
    changed
}

fn recreate_directory(path: &Path) -> Result<(), TransformError> {
    if path.exists() {
        fs::remove_dir_all(path)?;
    }
    fs::create_dir_all(path)?;
    Ok(())
}

fn copy_tree(source: &Path, dest: &Path) -> Result<(), TransformError> {
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|e| TransformError::Io(e.into()))?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| TransformError::structural("walked path escapes the copy root"))?;
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const OLD_TOKEN: &str = "uuid-3e5dbf49-78fe-4ef1-a55d-b5a8cbd30fbc";

    const SIP_ROOT_METS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<mets xmlns="http://www.loc.gov/METS/"
      xmlns:xlink="http://www.w3.org/1999/xlink"
      xmlns:csip="https://DILCIS.eu/XML/METS/CSIPExtensionMETS"
      OBJID="uuid-3e5dbf49-78fe-4ef1-a55d-b5a8cbd30fbc" LABEL="Test Package" TYPE="OTHER">
    <metsHdr CREATEDATE="2019-06-01T10:00:00" csip:OAISPACKAGETYPE="SIP">
        <agent ROLE="CREATOR" TYPE="OTHER" OTHERTYPE="SOFTWARE"><name>SIP Builder</name><note csip:NOTETYPE="SOFTWARE VERSION">v0.0.1</note></agent>
    </metsHdr>
    <dmdSec ID="uuid-dmd1">
        <mdRef LOCTYPE="URL" xlink:type="simple" xlink:href="metadata/descriptive/dc.xml"
               MDTYPE="DC" MIMETYPE="text/xml" SIZE="0" CHECKSUM="stale" CHECKSUMTYPE="SHA-256"/>
    </dmdSec>
    <fileSec ID="uuid-fs1">
        <fileGrp ID="uuid-fg-rep1" USE="Representations/rep1">
            <file ID="ID-rep1-f"><FLocat xlink:type="simple" xlink:href="representations/rep1/data/file1.txt" LOCTYPE="URL"/></file>
        </fileGrp>
    </fileSec>
    <structMap ID="uuid-sm1" TYPE="PHYSICAL" LABEL="CSIP">
        <div ID="uuid-div-root" LABEL="uuid-3e5dbf49-78fe-4ef1-a55d-b5a8cbd30fbc">
            <div ID="uuid-div-meta" LABEL="Metadata" DMDID="uuid-dmd1"/>
            <div ID="uuid-div-sub" LABEL="Submission">
                <mptr xlink:type="simple" xlink:href="METS.xml" LOCTYPE="URL"/>
            </div>
            <div ID="uuid-div-rep1" LABEL="Representations/rep1">
                <mptr xlink:type="simple" xlink:href="representations/rep1/METS.xml" xlink:title="uuid-fg-rep1" LOCTYPE="URL"/>
            </div>
        </div>
    </structMap>
</mets>"#;

    const SIP_REP_METS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<mets xmlns="http://www.loc.gov/METS/"
      xmlns:xlink="http://www.w3.org/1999/xlink"
      xmlns:csip="https://DILCIS.eu/XML/METS/CSIPExtensionMETS"
      OBJID="rep1" TYPE="OTHER">
    <metsHdr CREATEDATE="2019-06-01T10:00:00" csip:OAISPACKAGETYPE="SIP">
        <agent ROLE="CREATOR" TYPE="OTHER" OTHERTYPE="SOFTWARE"><name>SIP Builder</name></agent>
    </metsHdr>
    <fileSec ID="uuid-fs-rep">
        <fileGrp ID="uuid-fg-old" USE="Data">
            <file ID="ID-old-1"><FLocat xlink:href="data/file1.txt" LOCTYPE="URL"/></file>
        </fileGrp>
    </fileSec>
    <structMap ID="uuid-sm-rep" TYPE="PHYSICAL" LABEL="CSIP">
        <div ID="uuid-div-old" LABEL="rep1"/>
    </structMap>
</mets>"#;

    /// Complete minimal SIP on disk: root METS, one representation with
    /// payload, descriptive metadata and a schema file
    fn sip_fixture() -> (TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let sip_dir = dir.path().join(format!("Package_{}", OLD_TOKEN));

        fs::create_dir_all(sip_dir.join("metadata/descriptive")).unwrap();
        fs::write(
            sip_dir.join("metadata/descriptive/dc.xml"),
            format!(
                "<dc><title>Test Package</title><identifier>{}</identifier></dc>",
                OLD_TOKEN
            ),
        )
        .unwrap();
        fs::create_dir_all(sip_dir.join("schemas")).unwrap();
        fs::write(sip_dir.join("schemas/mets.xsd"), "<schema/>").unwrap();

        let rep = sip_dir.join("representations/rep1");
        fs::create_dir_all(rep.join("data")).unwrap();
        fs::write(rep.join("data/file1.txt"), "payload one").unwrap();
        fs::write(rep.join("data/file2.txt"), "payload two").unwrap();
        fs::write(rep.join("METS.xml"), SIP_REP_METS).unwrap();

        fs::write(sip_dir.join("METS.xml"), SIP_ROOT_METS).unwrap();

        let out_dir = dir.path().join("out");
        (dir, sip_dir, out_dir)
    }

    #[test]
    fn test_transform_package_end_to_end() {
        let (_dir, sip_dir, out_dir) = sip_fixture();
        let aip_name =
            transform_package(&sip_dir, &out_dir, &TransformOptions::default()).unwrap();

        // Fresh name, same prefix, valid token
        assert!(aip_name.starts_with("Package_uuid-"));
        assert_ne!(aip_name, format!("Package_{}", OLD_TOKEN));
        let new = PackageName::parse(&aip_name).unwrap();

        let aip_root = out_dir.join(&aip_name);
        let submission = aip_root
            .join("submission")
            .join(format!("submission-{}", fixity::today()));
        assert!(submission.join("METS.xml").is_file());
        assert!(submission
            .join("representations/rep1/data/file1.txt")
            .is_file());
        assert!(aip_root.join("schemas/mets.xsd").is_file());

        // Payload copied and a preservation METS built next to it
        assert!(aip_root
            .join("representations/rep01.1/data/file1.txt")
            .is_file());
        let rep_doc =
            Document::from_file(&aip_root.join("representations/rep01.1/METS.xml")).unwrap();
        assert_eq!(rep_doc.root.attr("OBJID"), Some("rep01.1"));
        let rep_files = rep_doc
            .root
            .find("fileSec")
            .unwrap()
            .find("fileGrp")
            .unwrap()
            .find_all("file")
            .count();
        assert_eq!(rep_files, 2);

        // Descriptive metadata now carries the new token
        let dc = fs::read_to_string(aip_root.join("metadata/descriptive/dc.xml")).unwrap();
        assert!(dc.contains(&new.token));
        assert!(!dc.contains(OLD_TOKEN));

        // Root METS references the copied submission and the new representation
        let root_doc = Document::from_file(&aip_root.join("METS.xml")).unwrap();
        assert_eq!(root_doc.root.attr("OBJID"), Some(new.token.as_str()));
        let file_sec = root_doc.root.find("fileSec").unwrap();
        assert!(file_sec
            .find_all("fileGrp")
            .any(|g| g.attr("USE") == Some("Submission")));
        let rep_group = file_sec
            .find_all("fileGrp")
            .find(|g| g.attr("USE") == Some("Representations/rep01.1"))
            .unwrap();
        assert_eq!(rep_group.find_all("file").count(), 1);
    }

    #[test]
    fn test_descriptive_metadata_token_swap_is_text_only() {
        let (_dir, sip_dir, out_dir) = sip_fixture();
        // Token appearing inside longer text must stay untouched
        fs::write(
            sip_dir.join("metadata/descriptive/dc.xml"),
            format!(
                "<dc><identifier>{}</identifier><description>see {} archive</description></dc>",
                OLD_TOKEN, OLD_TOKEN
            ),
        )
        .unwrap();

        let aip_name =
            transform_package(&sip_dir, &out_dir, &TransformOptions::default()).unwrap();
        let dc = fs::read_to_string(
            out_dir
                .join(&aip_name)
                .join("metadata/descriptive/dc.xml"),
        )
        .unwrap();
        let new = PackageName::parse(&aip_name).unwrap();
        assert!(dc.contains(&format!("<identifier>{}</identifier>", new.token)));
        assert!(dc.contains(&format!("see {} archive", OLD_TOKEN)));
    }

    #[test]
    fn test_missing_sip_directory_is_a_usage_problem() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_directories(&dir.path().join("nope"), dir.path()).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_output_path_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("occupied");
        fs::write(&file, "not a directory").unwrap();
        let err = validate_directories(dir.path(), &file).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_sip_name_without_uuid_token_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let sip_dir = dir.path().join("JustAName");
        fs::create_dir_all(&sip_dir).unwrap();
        let err = transform_package(&sip_dir, dir.path(), &TransformOptions::default())
            .unwrap_err();
        assert!(matches!(err, TransformError::InvalidPackageName(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_sip_without_representations_is_fatal() {
        let (_dir, sip_dir, out_dir) = sip_fixture();
        fs::remove_dir_all(sip_dir.join("representations")).unwrap();
        let err =
            transform_package(&sip_dir, &out_dir, &TransformOptions::default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("representations"));
    }

    #[test]
    fn test_copy_tree_preserves_nesting() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src");
        fs::create_dir_all(source.join("a/b")).unwrap();
        fs::write(source.join("a/b/deep.txt"), "deep").unwrap();
        fs::write(source.join("top.txt"), "top").unwrap();

        let dest = dir.path().join("dst");
        copy_tree(&source, &dest).unwrap();
        assert_eq!(fs::read_to_string(dest.join("a/b/deep.txt")).unwrap(), "deep");
        assert_eq!(fs::read_to_string(dest.join("top.txt")).unwrap(), "top");
    }
}
