use std::{fs::File, io::Read, path::Path};

use sha2::{Digest, Sha256};

use crate::error::{HashError, HashResult};

/// Returns the lowercase hex SHA-256 digest of `data`.
///
/// # Example
///
/// ```
/// use depot_utils::hash::sha256_hex;
///
/// assert_eq!(
///     sha256_hex(b"abc"),
///     "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
/// );
/// ```
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Calculates the SHA-256 checksum of a file, streaming its contents.
///
/// # Errors
///
/// * [`HashError::ReadFailed`] if the file cannot be opened or read.
pub fn calculate_checksum<P: AsRef<Path>>(file_path: P) -> HashResult<String> {
    let file_path = file_path.as_ref();
    let read_failed = |err| {
        HashError::ReadFailed {
            path: file_path.to_path_buf(),
            source: err,
        }
    };

    let mut file = File::open(file_path).map_err(read_failed)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(read_failed)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Compares a computed digest with the one the index records.
///
/// Both sides are lowercase hex; any other spelling of `expected` does not match.
pub fn checksum_matches(actual: &str, expected: &str) -> bool {
    actual == expected
}

/// Verifies a file's checksum against an expected hex digest.
///
/// # Errors
///
/// * [`HashError::ReadFailed`] if the file cannot be read.
pub fn verify_checksum<P: AsRef<Path>>(file_path: P, expected: &str) -> HashResult<bool> {
    let actual = calculate_checksum(file_path)?;
    Ok(checksum_matches(&actual, expected))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(sha256_hex(b"hello world"), HELLO_SHA256);
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_calculate_checksum_matches_in_memory_digest() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        assert_eq!(calculate_checksum(file.path()).unwrap(), HELLO_SHA256);
    }

    #[test]
    fn test_verify_checksum() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        assert!(verify_checksum(file.path(), HELLO_SHA256).unwrap());
        assert!(!verify_checksum(file.path(), "deadbeef").unwrap());
    }

    #[test]
    fn test_checksum_matches_is_exact() {
        assert!(checksum_matches(HELLO_SHA256, HELLO_SHA256));
        assert!(!checksum_matches(HELLO_SHA256, &HELLO_SHA256.to_uppercase()));
        assert!(!checksum_matches(HELLO_SHA256, &format!(" {HELLO_SHA256}\n")));
    }

    #[test]
    fn test_calculate_checksum_missing_file() {
        let result = calculate_checksum("/nonexistent/depot/archive.crate");
        assert!(matches!(result, Err(HashError::ReadFailed { .. })));
    }
}
