//! SHA-256 fingerprint of the combined asset set.
//!
//! The digest lets two installations check that they see the same asset
//! content (e.g. client and server). Every layer the index keeps is hashed,
//! source by source in registration order and, within a source, in
//! lowercase-name order. Files matching a digest-ignore pattern are skipped.
//!
//! Each layer contributes a record to the outer hash:
//!
//! ```text
//! ┌───────────────┬──────────┬─────────────────┬─────────────────┐
//! │ name len (u64)│ name     │ content len(u64)│ SHA-256(content)│
//! └───────────────┴──────────┴─────────────────┴─────────────────┘
//! ```
//!
//! so renaming a file, or moving bytes between files, changes the digest.

use std::fmt;
use std::io::Read;
use std::time::Instant;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::{FileIndex, SourceId};
use crate::error::{AssetError, AssetResult};

/// Buffer size for streaming files into the hasher (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// SHA-256 over every non-ignored indexed layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetDigest(pub [u8; 32]);

impl AssetDigest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hexadecimal form.
    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AssetDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

pub(super) fn compute(index: &FileIndex) -> AssetResult<AssetDigest> {
    let start = Instant::now();

    // Layers per source, each in lowercase-name order
    let mut layers_by_source: Vec<Vec<&str>> = vec![Vec::new(); index.sources.len()];
    for descriptor in index.files.values() {
        for (name, layer) in descriptor.layers() {
            layers_by_source[layer.0].push(name);
        }
    }

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];
    let mut hashed = 0usize;
    let mut skipped = 0usize;

    for (position, names) in layers_by_source.into_iter().enumerate() {
        let source = index.source(SourceId(position));

        for name in names {
            if index.digest_ignore.matches(name) {
                skipped += 1;
                continue;
            }

            let io_error = |e| AssetError::Io {
                path: name.to_string(),
                source_name: source.name().to_string(),
                source: e,
            };

            let mut content = Sha256::new();
            let mut length = 0u64;
            let mut reader = source.open(name).map_err(io_error)?;
            loop {
                let bytes_read = reader.read(&mut buffer).map_err(io_error)?;
                if bytes_read == 0 {
                    break;
                }
                content.update(&buffer[..bytes_read]);
                length += bytes_read as u64;
            }

            hash_record(&mut hasher, name, length, &content.finalize());
            hashed += 1;
        }

        debug!(source = source.name(), "Digested asset source");
    }

    let digest = AssetDigest(hasher.finalize().into());
    info!(
        digest = %digest,
        files = hashed,
        skipped,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Computed asset digest"
    );
    Ok(digest)
}

/// Feed one layer into the outer hasher as fixed-width fields, so distinct
/// name/content splits never produce the same byte stream.
fn hash_record(hasher: &mut Sha256, name: &str, length: u64, content_digest: &[u8]) {
    hasher.update((name.len() as u64).to_le_bytes());
    hasher.update(name.as_bytes());
    hasher.update(length.to_le_bytes());
    hasher.update(content_digest);
}
