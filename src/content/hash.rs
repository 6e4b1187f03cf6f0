use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ClipcastError, ClipcastResult};

pub const SHA256: &str = "SHA-256";

/// A content digest in lowercase hex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashInfo {
    pub algorithm: String,
    pub value: String,
}

impl HashInfo {
    pub fn sha256_hex(value: impl Into<String>) -> Self {
        Self {
            algorithm: SHA256.to_string(),
            value: value.into(),
        }
    }

    /// SHA-256 of data already in memory
    pub fn from_bytes(data: &[u8]) -> Self {
        Self::sha256_hex(hex::encode(Sha256::digest(data)))
    }

    /// Compare against a digest reported by someone else, byte for byte.
    ///
    /// Any difference, including a reported value that is not valid hex, is an
    /// `IntegrityMismatch`.
    pub fn verify_reported(&self, reported: &str) -> ClipcastResult<()> {
        let mismatch = || ClipcastError::IntegrityMismatch {
            expected: self.value.clone(),
            actual: reported.to_string(),
        };
        let ours = hex::decode(&self.value).map_err(|_| mismatch())?;
        let theirs = hex::decode(reported.trim()).map_err(|_| mismatch())?;
        if ours == theirs {
            Ok(())
        } else {
            Err(mismatch())
        }
    }
}
