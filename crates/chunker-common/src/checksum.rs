//! Content signatures for source files
//!
//! A signature is the lowercase hex SHA-256 digest of a file's bytes. The
//! upload side names chunk sets after it, so the chunker can check that the
//! file it was handed is the one the signature was computed from.

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

const READ_BUFFER_SIZE: usize = 8192;

/// Compute the signature of a file on disk
pub fn file_signature(path: impl AsRef<Path>) -> Result<String> {
    let mut file = std::fs::File::open(path)?;
    signature_of(&mut file)
}

/// Compute the signature of any readable source using a fixed-size buffer
pub fn signature_of<R: Read>(reader: &mut R) -> Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; READ_BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
