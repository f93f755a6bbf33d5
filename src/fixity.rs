//! File fixity and metadata primitives
//!
//! Checksums, sizes, MIME guesses and timestamps for the file entries the
//! transformers write. Fixity is always computed from the file's current
//! on-disk bytes, never copied forward from the template.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::Local;
use sha2::{Digest, Sha256};

use crate::error::TransformError;

/// Freshly computed facts about one payload file
#[derive(Debug, Clone)]
pub struct FileFacts {
    pub size: u64,
    /// Lowercase SHA-256 hex digest
    pub checksum: String,
    pub mime_type: String,
}

/// Lowercase SHA-256 hex digest of a file, streamed in 8 KiB blocks
pub fn sha256_hex(path: &Path) -> Result<String, TransformError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// MIME type guessed from the file extension
pub fn mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

/// Size, digest and MIME guess of a file in one pass
pub fn gather(path: &Path) -> Result<FileFacts, TransformError> {
    let size = std::fs::metadata(path)?.len();
    Ok(FileFacts {
        size,
        checksum: sha256_hex(path)?,
        mime_type: mime_type(path),
    })
}

/// Current local time as ISO-8601 with microsecond precision and offset,
/// e.g. "2024-05-01T12:30:45.123456+02:00"
pub fn now_timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f%:z").to_string()
}

/// Current local date, e.g. "2024-05-01" (used for submission folder names)
pub fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sha256_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        let mut f = File::create(&path).unwrap();
        f.write_all(b"hello").unwrap();

        let digest = sha256_hex(&path).unwrap();
        assert_eq!(
            digest,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_gather_reflects_current_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.xml");
        std::fs::write(&path, "<a/>").unwrap();
        let before = gather(&path).unwrap();

        std::fs::write(&path, "<a>changed</a>").unwrap();
        let after = gather(&path).unwrap();

        assert_ne!(before.checksum, after.checksum);
        assert_eq!(after.size, 14);
        assert_eq!(after.mime_type, "text/xml");
    }

    #[test]
    fn test_mime_fallback() {
        assert_eq!(
            mime_type(Path::new("payload.unknownext")),
            "application/octet-stream"
        );
        assert_eq!(mime_type(Path::new("notes.txt")), "text/plain");
    }

    #[test]
    fn test_timestamp_parses_back() {
        let stamp = now_timestamp();
        let parsed = chrono::DateTime::parse_from_str(&stamp, "%Y-%m-%dT%H:%M:%S%.6f%:z");
        assert!(parsed.is_ok(), "unparseable timestamp: {}", stamp);
    }
}
