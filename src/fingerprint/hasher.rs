//! SHA-512 file digests with streaming reads.
//!
//! # Overview
//! Files are read in [`READ_CHUNK_SIZE`] blocks so memory use is bounded
//! regardless of file size. Per-file digests are combined by sorting their
//! hex strings and digesting the concatenation, which makes the result
//! independent of collection order.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use sha2::{Digest, Sha512};

use super::FingerprintError;

/// Bytes read per call while digesting a file.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Length of a SHA-512 digest in hex characters.
pub const DIGEST_HEX_LEN: usize = 128;

/// Digest the full contents of `path` as lowercase hex.
///
/// A file that vanished after being listed (or a dangling symlink)
/// contributes the digest of zero bytes instead of failing.
///
/// # Errors
///
/// Returns [`FingerprintError::Io`] if the file exists but cannot be read.
pub fn digest_file(path: &Path) -> Result<String, FingerprintError> {
    let mut hasher = Sha512::new();

    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::debug!("File disappeared before hashing: {}", path.display());
            return Ok(format!("{:x}", hasher.finalize()));
        }
        Err(source) => {
            return Err(FingerprintError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut buffer = vec![0u8; READ_CHUNK_SIZE];
    loop {
        let n = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(FingerprintError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Combine per-file digests into one order-independent digest.
///
/// The input is sorted in place before hashing.
#[must_use]
pub fn reduce_digests(digests: &mut [String]) -> String {
    digests.sort_unstable();

    let mut hasher = Sha512::new();
    for digest in digests.iter() {
        hasher.update(digest.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
