//! Namespace resolution for METS templates
//!
//! Collects the prefix bindings declared anywhere in a template so that
//! new elements and attributes are written with the same prefixes the
//! template uses. The CSIP extension namespace carries the package-type
//! and note-type attributes and is required by the transformers.

use crate::error::TransformError;
use crate::xml::Element;

/// The METS document namespace
pub const METS_NS: &str = "http://www.loc.gov/METS/";

/// Namespace for typed links (href/title/type attributes)
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// CSIP extension namespace (OAISPACKAGETYPE, NOTETYPE)
pub const CSIP_NS: &str = "https://DILCIS.eu/XML/METS/CSIPExtensionMETS";

/// Prefix -> URI bindings extracted from a document's root element
#[derive(Debug, Clone, Default)]
pub struct Namespaces {
    /// (prefix, uri) pairs in declaration order; "" is the default namespace
    bindings: Vec<(String, String)>,
}

impl Namespaces {
    /// Extract xmlns declarations from a document tree. Declarations may
    /// appear on any element; the outermost one wins per prefix.
    pub fn from_root(root: &Element) -> Self {
        let mut bindings = Vec::new();
        collect_declarations(root, &mut bindings);
        Namespaces { bindings }
    }

    /// Prefix bound to the given namespace URI, if declared
    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(_, u)| u == uri)
            .map(|(p, _)| p.as_str())
    }

    /// URI bound to the given prefix, if declared
    pub fn uri_for(&self, prefix: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, u)| u.as_str())
    }

    /// All bindings in declaration order
    pub fn bindings(&self) -> &[(String, String)] {
        &self.bindings
    }

    /// Qualified name for a local name in the given namespace
    pub fn qualify(&self, uri: &str, local: &str) -> Option<String> {
        let prefix = self.prefix_for(uri)?;
        if prefix.is_empty() {
            Some(local.to_string())
        } else {
            Some(format!("{}:{}", prefix, local))
        }
    }

    /// Element name in the METS namespace, using the template's prefix.
    /// Falls back to the bare local name when no METS binding is declared,
    /// which keeps new elements consistent with unprefixed templates.
    pub fn mets(&self, local: &str) -> String {
        self.qualify(METS_NS, local)
            .unwrap_or_else(|| local.to_string())
    }

    /// Attribute name in the xlink namespace; the template must declare it
    pub fn xlink(&self, local: &str) -> Result<String, TransformError> {
        self.qualify(XLINK_NS, local).ok_or_else(|| {
            TransformError::structural(format!(
                "xlink namespace ({}) is not declared in the template",
                XLINK_NS
            ))
        })
    }

    /// Attribute name in the CSIP extension namespace; fatal when the
    /// template does not declare it (signals a non-conformant template)
    pub fn extension(&self, local: &str) -> Result<String, TransformError> {
        self.qualify(CSIP_NS, local).ok_or_else(|| {
            TransformError::structural(format!(
                "extension namespace ({}) is not declared in the template",
                CSIP_NS
            ))
        })
    }
}

fn collect_declarations(element: &Element, bindings: &mut Vec<(String, String)>) {
    for (key, value) in &element.attrs {
        let prefix = if key == "xmlns" {
            Some("")
        } else {
            key.strip_prefix("xmlns:")
        };
        if let Some(prefix) = prefix {
            if !bindings.iter().any(|(p, _)| p == prefix) {
                bindings.push((prefix.to_string(), value.clone()));
            }
        }
    }
    for child in element.elements() {
        collect_declarations(child, bindings);
    }
}
