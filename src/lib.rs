//! E-ARK SIP to AIP Conversion Library
//!
//! This library converts an E-ARK Submission Information Package (SIP)
//! into an Archival Information Package (AIP) by restructuring its linked
//! METS documents and consistently remapping the identifiers that tie
//! their sections together.
//!
//! # Overview
//!
//! A conversion run takes one SIP directory and produces a fresh AIP
//! directory next to it by:
//!
//! 1. Deriving a new package name from the SIP name with a fresh UUIDv4
//! 2. Copying the submitted package under `submission/submission-<date>/`
//!    and mirroring its metadata, schemas and documentation to the AIP root
//! 3. Building one preservation representation (`rep01.1`, `rep02.1`, ...)
//!    per submitted representation, each with its own rewritten METS
//! 4. Building the aggregate root METS that references the submission and
//!    the preservation representations
//! 5. Reassigning every METS identifier while keeping all cross-references
//!    resolvable, inside each document and across them
//!
//! # Usage
//!
//! ```ignore
//! use eark_aip::{transform_package, TransformOptions};
//!
//! let aip_name = transform_package(
//!     "in/Package_uuid-0f99...".as_ref(),
//!     "out".as_ref(),
//!     &TransformOptions::default(),
//! )?;
//!
//! println!("{}", aip_name);
//! ```

pub mod error;
pub mod fixity;
pub mod ids;
pub mod mets;
pub mod namespaces;
pub mod package;
pub mod representation;
pub mod rewrite;
pub mod root;
pub mod xml;

// Re-export main types for convenience
pub use crate::error::TransformError;
pub use crate::ids::{new_leaf_id, new_structural_id, IdMap, PackageName};
pub use crate::mets::TransformOptions;
pub use crate::package::{transform_package, validate_directories};
pub use crate::representation::build_representation_mets;
pub use crate::rewrite::rewrite_identifiers;
pub use crate::root::build_root_mets;
pub use crate::xml::{Document, Element, Node};
