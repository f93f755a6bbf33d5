//! Error types for SIP to AIP transformation

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("invalid usage: {0}")]
    Usage(String),

    #[error("{0}")]
    Validation(String),

    #[error("'{0}' does not contain a valid UUIDv4 token")]
    InvalidPackageName(String),

    #[error("invalid package structure: {0}")]
    Structural(String),

    #[error("identifier '{0}' was already assigned a replacement")]
    DuplicateAssignment(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl TransformError {
    /// Process exit code for this error: 1 for usage/validation problems,
    /// 2 for structural failures and anything that aborts mid-transformation.
    pub fn exit_code(&self) -> i32 {
        match self {
            TransformError::Usage(_) | TransformError::Validation(_) => 1,
            _ => 2,
        }
    }

    /// Shorthand for a structural error with a formatted message
    pub fn structural(msg: impl Into<String>) -> Self {
        TransformError::Structural(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(TransformError::Usage("x".into()).exit_code(), 1);
        assert_eq!(TransformError::Validation("x".into()).exit_code(), 1);
        assert_eq!(TransformError::InvalidPackageName("x".into()).exit_code(), 2);
        assert_eq!(TransformError::structural("x").exit_code(), 2);
        assert_eq!(
            TransformError::DuplicateAssignment("uuid-1".into()).exit_code(),
            2
        );
    }
}
