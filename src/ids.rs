//! Identifier generation and old->new mapping
//!
//! Two identifier kinds tie METS sections together: structural identifiers
//! ("uuid-" + UUIDv4) for sections, groups and divisions, and leaf
//! identifiers ("ID-" + UUIDv4) for individual file entries. One `IdMap`
//! accumulates the old->new assignments of a single transformation run.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::TransformError;

/// Prefix accepted in package directory names, e.g. "uuid-1111..."
const UUID_TOKEN_PREFIX: &str = "uuid-";

/// Fresh structural identifier for sections, file groups and divisions
pub fn new_structural_id() -> String {
    format!("uuid-{}", Uuid::new_v4())
}

/// Fresh leaf identifier for individual file entries
pub fn new_leaf_id() -> String {
    format!("ID-{}", Uuid::new_v4())
}

/// Append-only old->new identifier mapping scoped to one transformation run
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    entries: HashMap<String, String>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map seeded with a single known cross-document assignment
    pub fn seeded(old: impl Into<String>, new: impl Into<String>) -> Self {
        let mut entries = HashMap::new();
        entries.insert(old.into(), new.into());
        IdMap { entries }
    }

    /// Record an assignment. Each source identifier is assigned exactly
    /// once; a second assignment is a programming error.
    pub fn record(
        &mut self,
        old: impl Into<String>,
        new: impl Into<String>,
    ) -> Result<(), TransformError> {
        let old = old.into();
        if self.entries.contains_key(&old) {
            return Err(TransformError::DuplicateAssignment(old));
        }
        self.entries.insert(old, new.into());
        Ok(())
    }

    pub fn lookup(&self, old: &str) -> Option<&str> {
        self.entries.get(old).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A package directory name split into its free-form prefix and UUID token
///
/// "Package_uuid-0f99..." -> prefix "Package_", token "uuid-0f99...".
/// The token keeps the "uuid-" marker when the name carries one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageName {
    pub prefix: String,
    pub token: String,
}

impl PackageName {
    /// Parse a directory name that must embed a canonical UUIDv4 token
    pub fn parse(name: &str) -> Result<Self, TransformError> {
        let (prefix, token) = match name.find(UUID_TOKEN_PREFIX) {
            Some(pos) => (&name[..pos], &name[pos..]),
            None => ("", name),
        };
        let bare = token.strip_prefix(UUID_TOKEN_PREFIX).unwrap_or(token);

        let parsed = Uuid::parse_str(bare)
            .map_err(|_| TransformError::InvalidPackageName(name.to_string()))?;
        if parsed.get_version_num() != 4 || parsed.to_string() != bare {
            return Err(TransformError::InvalidPackageName(name.to_string()));
        }

        Ok(PackageName {
            prefix: prefix.to_string(),
            token: token.to_string(),
        })
    }

    /// Full name: prefix followed by the token
    pub fn full(&self) -> String {
        format!("{}{}", self.prefix, self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_formats() {
        let structural = new_structural_id();
        assert!(structural.starts_with("uuid-"));
        let parsed = Uuid::parse_str(structural.strip_prefix("uuid-").unwrap()).unwrap();
        assert_eq!(parsed.get_version_num(), 4);

        let leaf = new_leaf_id();
        assert!(leaf.starts_with("ID-"));
        assert!(Uuid::parse_str(leaf.strip_prefix("ID-").unwrap()).is_ok());

        assert_ne!(new_structural_id(), new_structural_id());
    }

    #[test]
    fn test_record_and_lookup() {
        let mut map = IdMap::new();
        map.record("uuid-old", "uuid-new").unwrap();
        assert_eq!(map.lookup("uuid-old"), Some("uuid-new"));
        assert_eq!(map.lookup("uuid-other"), None);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_record_twice_fails() {
        let mut map = IdMap::new();
        map.record("uuid-old", "uuid-a").unwrap();
        let err = map.record("uuid-old", "uuid-b").unwrap_err();
        assert!(matches!(err, TransformError::DuplicateAssignment(_)));
        // First assignment untouched
        assert_eq!(map.lookup("uuid-old"), Some("uuid-a"));
    }

    #[test]
    fn test_seeded_map() {
        let map = IdMap::seeded("uuid-sip", "uuid-aip");
        assert_eq!(map.lookup("uuid-sip"), Some("uuid-aip"));
    }

    #[test]
    fn test_package_name_with_prefix() {
        let raw = "Package_uuid-a6544379-6bc6-4fd6-b00a-56af54b16fbd";
        let name = PackageName::parse(raw).unwrap();
        assert_eq!(name.prefix, "Package_");
        assert_eq!(name.token, "uuid-a6544379-6bc6-4fd6-b00a-56af54b16fbd");
        assert_eq!(name.full(), raw);
    }

    #[test]
    fn test_package_name_bare_uuid() {
        let name = PackageName::parse("a6544379-6bc6-4fd6-b00a-56af54b16fbd").unwrap();
        assert_eq!(name.prefix, "");
        assert_eq!(name.token, "a6544379-6bc6-4fd6-b00a-56af54b16fbd");
    }

    #[test]
    fn test_package_name_rejects_invalid() {
        assert!(PackageName::parse("no-uuid-here").is_err());
        // Valid format but not version 4
        assert!(PackageName::parse("uuid-a6544379-6bc6-1fd6-b00a-56af54b16fbd").is_err());
        // Uppercase is not the canonical form
        assert!(PackageName::parse("uuid-A6544379-6BC6-4FD6-B00A-56AF54B16FBD").is_err());
    }
}
