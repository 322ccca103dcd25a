//! Artifact checksum helpers.

use crate::errors::BuildError;
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Digests of a build artifact, as recorded in stored metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChecksums {
    /// md5 hex digest.
    pub md5: String,
    /// sha256 hex digest.
    pub sha256: String,
    /// File size in bytes.
    pub size: u64,
}

/// Computes checksums over a byte slice.
#[must_use]
pub fn checksums_of(data: &[u8]) -> FileChecksums {
    let md5 = hex::encode(Md5::digest(data));
    let sha256 = hex::encode(Sha256::digest(data));
    FileChecksums {
        md5,
        sha256,
        size: data.len() as u64,
    }
}

/// Computes checksums of a file, streaming its contents.
///
/// # Errors
///
/// Returns an error when the file cannot be read.
pub fn checksums_of_file(path: &Path) -> Result<FileChecksums, BuildError> {
    let mut file = std::fs::File::open(path)?;
    let mut md5 = Md5::new();
    let mut sha256 = Sha256::new();
    let mut size = 0u64;
    let mut buf = [0u8; 8192];

    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        md5.update(&buf[..read]);
        sha256.update(&buf[..read]);
        size += read as u64;
    }

    Ok(FileChecksums {
        md5: hex::encode(md5.finalize()),
        sha256: hex::encode(sha256.finalize()),
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksums_of_known_input() {
        let sums = checksums_of(b"kiln");
        assert_eq!(sums.size, 4);
        assert_eq!(sums.md5.len(), 32);
        assert_eq!(sums.sha256.len(), 64);
    }

    #[test]
    fn test_file_and_slice_agree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.tar");
        std::fs::write(&path, b"archive contents").unwrap();

        let from_file = checksums_of_file(&path).unwrap();
        let from_slice = checksums_of(b"archive contents");
        assert_eq!(from_file, from_slice);
    }

    #[test]
    fn test_empty_input() {
        let sums = checksums_of(b"");
        assert_eq!(sums.size, 0);
        // md5/sha256 of empty input are well known
        assert_eq!(sums.md5, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            sums.sha256,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
