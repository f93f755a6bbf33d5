//! Shared METS element builders
//!
//! Header stamping and file-entry construction are identical between the
//! root and representation transformers, so they live here.

use std::path::Path;

use crate::error::TransformError;
use crate::fixity;
use crate::ids;
use crate::namespaces::Namespaces;
use crate::xml::Element;

pub const CHECKSUM_TYPE: &str = "SHA-256";
pub const RECORD_STATUS_REVISED: &str = "Revised";
pub const PACKAGE_TYPE_AIP: &str = "AIP";

/// Tool identity written into the METS header agent
///
/// Injected into the transformers instead of being compiled into them, so
/// embedders can brand the output.
#[derive(Debug, Clone)]
pub struct TransformOptions {
    pub software_name: String,
    pub software_version: String,
}

impl Default for TransformOptions {
    fn default() -> Self {
        TransformOptions {
            software_name: "E-ARK AIP Creator".to_string(),
            software_version: format!("v{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// First direct child with the given local name, or a structural error
pub fn required_child_mut<'a>(
    parent: &'a mut Element,
    local: &str,
) -> Result<&'a mut Element, TransformError> {
    parent
        .find_mut(local)
        .ok_or_else(|| TransformError::structural(format!("missing required element '{}'", local)))
}

pub fn required_child<'a>(
    parent: &'a Element,
    local: &str,
) -> Result<&'a Element, TransformError> {
    parent
        .find(local)
        .ok_or_else(|| TransformError::structural(format!("missing required element '{}'", local)))
}

/// Stamp the package identifier and header fields of an AIP document:
/// creation/modification timestamps, "Revised" status, the AIP package
/// type (fatal when the extension namespace is missing), and a single
/// software creator agent replacing any software or individual creators.
pub fn stamp_header(
    root: &mut Element,
    ns: &Namespaces,
    objid: &str,
    stamp: &str,
    options: &TransformOptions,
) -> Result<(), TransformError> {
    root.set_attr("OBJID", objid);

    let package_type_attr = ns.extension("OAISPACKAGETYPE")?;
    let agent = software_agent(ns, options)?;

    let header = required_child_mut(root, "metsHdr")?;
    header.set_attr("CREATEDATE", stamp);
    header.set_attr("LASTMODDATE", stamp);
    header.set_attr("RECORDSTATUS", RECORD_STATUS_REVISED);
    header.set_attr(package_type_attr, PACKAGE_TYPE_AIP);

    header.retain_elements(|e| !(e.local_name() == "agent" && is_replaced_creator(e)));
    header.push(agent);
    Ok(())
}

/// Creator agents superseded by this tool: the previous software creator
/// and any individual person creator
fn is_replaced_creator(agent: &Element) -> bool {
    if agent.attr("ROLE") != Some("CREATOR") {
        return false;
    }
    match agent.attr("TYPE") {
        Some("INDIVIDUAL") => true,
        Some("OTHER") => agent.attr("OTHERTYPE") == Some("SOFTWARE"),
        _ => false,
    }
}

fn software_agent(ns: &Namespaces, options: &TransformOptions) -> Result<Element, TransformError> {
    let mut agent = Element::new(ns.mets("agent"));
    agent.set_attr("ROLE", "CREATOR");
    agent.set_attr("TYPE", "OTHER");
    agent.set_attr("OTHERTYPE", "SOFTWARE");

    let mut name = Element::new(ns.mets("name"));
    name.set_text(options.software_name.clone());
    agent.push(name);

    let mut note = Element::new(ns.mets("note"));
    note.set_attr(ns.extension("NOTETYPE")?, "SOFTWARE VERSION");
    note.set_text(options.software_version.clone());
    agent.push(note);

    Ok(agent)
}

/// Build a file entry for one on-disk file: fresh leaf ID, MIME guess,
/// size, timestamp and SHA-256 digest, plus an FLocat pointing at `href`
pub fn new_file_element(
    ns: &Namespaces,
    file_path: &Path,
    href: &str,
    stamp: &str,
) -> Result<Element, TransformError> {
    let facts = fixity::gather(file_path)?;

    let mut file = Element::new(ns.mets("file"));
    file.set_attr("ID", ids::new_leaf_id());
    file.set_attr("MIMETYPE", facts.mime_type);
    file.set_attr("SIZE", facts.size.to_string());
    file.set_attr("CREATED", stamp);
    file.set_attr("CHECKSUM", facts.checksum);
    file.set_attr("CHECKSUMTYPE", CHECKSUM_TYPE);

    let mut flocat = Element::new(ns.mets("FLocat"));
    flocat.set_attr(ns.xlink("type")?, "simple");
    flocat.set_attr(ns.xlink("href")?, href);
    flocat.set_attr("LOCTYPE", "URL");
    file.push(flocat);

    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::Document;

    fn header_fixture(with_extension: bool) -> (Element, Namespaces) {
        let csip = if with_extension {
            r#" xmlns:csip="https://DILCIS.eu/XML/METS/CSIPExtensionMETS""#
        } else {
            ""
        };
        let xml = format!(
            r#"<mets xmlns="http://www.loc.gov/METS/" xmlns:xlink="http://www.w3.org/1999/xlink"{} OBJID="uuid-old">
                <metsHdr CREATEDATE="2019-01-01T00:00:00" RECORDSTATUS="NEW">
                    <agent ROLE="CREATOR" TYPE="OTHER" OTHERTYPE="SOFTWARE"><name>Old Tool</name></agent>
                    <agent ROLE="CREATOR" TYPE="INDIVIDUAL"><name>Jane Doe</name></agent>
                    <agent ROLE="ARCHIVIST" TYPE="ORGANIZATION"><name>Archive</name></agent>
                </metsHdr>
            </mets>"#,
            csip
        );
        let root = Document::parse(&xml).unwrap().root;
        let ns = Namespaces::from_root(&root);
        (root, ns)
    }

    #[test]
    fn test_stamp_header_rewrites_fields_and_agents() {
        let (mut root, ns) = header_fixture(true);
        let options = TransformOptions {
            software_name: "Test Tool".into(),
            software_version: "v9.9".into(),
        };
        stamp_header(&mut root, &ns, "uuid-new", "2024-05-01T00:00:00.000001+00:00", &options)
            .unwrap();

        assert_eq!(root.attr("OBJID"), Some("uuid-new"));
        let header = root.find("metsHdr").unwrap();
        assert_eq!(header.attr("RECORDSTATUS"), Some("Revised"));
        assert_eq!(header.attr("csip:OAISPACKAGETYPE"), Some("AIP"));
        assert_eq!(header.attr("CREATEDATE"), header.attr("LASTMODDATE"));

        let agents: Vec<&Element> = header.find_all("agent").collect();
        // Archivist kept, software and individual creators replaced by one
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].attr("ROLE"), Some("ARCHIVIST"));
        let tool = agents[1];
        assert_eq!(tool.attr("OTHERTYPE"), Some("SOFTWARE"));
        assert_eq!(tool.find("name").unwrap().text(), Some("Test Tool"));
        let note = tool.find("note").unwrap();
        assert_eq!(note.attr("csip:NOTETYPE"), Some("SOFTWARE VERSION"));
        assert_eq!(note.text(), Some("v9.9"));
    }

    #[test]
    fn test_stamp_header_without_extension_namespace_is_fatal() {
        let (mut root, ns) = header_fixture(false);
        let err = stamp_header(
            &mut root,
            &ns,
            "uuid-new",
            "2024-05-01T00:00:00.000001+00:00",
            &TransformOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
        // Aborted before any mutation of the header
        let header = root.find("metsHdr").unwrap();
        assert_eq!(header.attr("RECORDSTATUS"), Some("NEW"));
    }

    #[test]
    fn test_new_file_element() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.txt");
        std::fs::write(&path, "some payload").unwrap();

        let (root, ns) = header_fixture(true);
        drop(root);
        let file = new_file_element(&ns, &path, "data/payload.txt", "2024-05-01T00:00:00.000001+00:00")
            .unwrap();

        assert!(file.attr("ID").unwrap().starts_with("ID-"));
        assert_eq!(file.attr("SIZE"), Some("12"));
        assert_eq!(file.attr("CHECKSUMTYPE"), Some("SHA-256"));
        assert_eq!(file.attr("MIMETYPE"), Some("text/plain"));

        let flocat = file.find("FLocat").unwrap();
        assert_eq!(flocat.attr("xlink:href"), Some("data/payload.txt"));
        assert_eq!(flocat.attr("LOCTYPE"), Some("URL"));
    }
}
