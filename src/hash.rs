// src/hash.rs

//! SHA-256 hashing for file integrity and the idempotency gate
//!
//! Two consumers share this module:
//! - The backup manager hashes individual files so a later restore can detect
//!   a corrupted backup copy before touching the live tree.
//! - The idempotency checker hashes a whole source tree into a single digest
//!   that is stable across filesystem iteration order.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use walkdir::WalkDir;

/// Compute the SHA-256 of a byte slice, as lowercase hex
pub fn sha256_bytes(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Compute the SHA-256 of all data from a reader, as lowercase hex
///
/// Streams in 8 KiB chunks to avoid loading the content into memory.
pub fn sha256_reader<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Compute the SHA-256 of a file's content, as lowercase hex
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    sha256_reader(&mut file)
}

/// Hash mismatch details from [`verify_file`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyError {
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sha256 mismatch: expected {}, got {}",
            self.expected, self.actual
        )
    }
}

impl std::error::Error for VerifyError {}

/// Verify a file matches an expected SHA-256 hash
///
/// Comparison is case-insensitive on the expected value. The outer result is
/// an I/O failure reading the file; the inner result is the verdict.
pub fn verify_file(path: &Path, expected: &str) -> io::Result<std::result::Result<(), VerifyError>> {
    let actual = sha256_file(path)?;
    if actual == expected.to_lowercase() {
        Ok(Ok(()))
    } else {
        Ok(Err(VerifyError {
            expected: expected.to_string(),
            actual,
        }))
    }
}

/// Compute a single digest over an entire directory tree
///
/// Walks all non-hidden files under `root`, sorts their relative paths
/// lexicographically, and feeds each `(relative_path, content)` pair into one
/// SHA-256 digest in that order. The result is deterministic regardless of
/// filesystem iteration order and changes on any content edit, added file,
/// removed file, or rename.
///
/// Hidden entries (any path component starting with `.`) are skipped, so
/// VCS metadata and tool state directories never perturb the digest.
pub fn hash_directory(root: &Path) -> io::Result<String> {
    let mut paths: Vec<String> = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden_name(e.file_name()))
    {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(root).map_err(io::Error::other)?;
        paths.push(normalize_relative(relative));
    }

    paths.sort();

    let mut hasher = Sha256::new();
    for relative in &paths {
        let content = std::fs::read(root.join(relative))?;
        // Paths cannot contain NUL, so the separator keeps pairs unambiguous.
        hasher.update(relative.as_bytes());
        hasher.update([0u8]);
        hasher.update(&content);
        hasher.update([0u8]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

fn is_hidden_name(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Render a relative path with forward slashes so digests match across
/// platforms.
fn normalize_relative(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
