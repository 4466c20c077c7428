//! The manifest that enumerates published chunks.
//!
//! The manifest is a JSON document pinned alongside the chunks themselves.
//! It lists every chunk range with the IPFS hashes of the chunk file and its
//! bloom, which lets a walker refuse files that are not part of the
//! published index and lets a fetcher pull missing ranges from any gateway.
use std::{fs, path::Path};

use cid::Cid;
use serde::{Deserialize, Serialize};

use crate::{
    chunk::files::range_from_filename,
    errors::{Result, UnchainedError},
    types::BlockRange,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub chain: String,
    /// Location of the index specification the chunks conform to.
    pub schemas: String,
    pub chunks: Vec<ManifestChunk>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestChunk {
    /// Zero-padded range stem, e.g. `000000000-000099999`.
    pub range: String,
    pub bin_hash: String,
    pub bloom_hash: String,
}

impl ManifestChunk {
    pub fn block_range(&self) -> Result<BlockRange> {
        range_from_filename(Path::new(&self.range))
    }
}

impl Manifest {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let manifest: Manifest = serde_json::from_str(&contents)?;
        Ok(manifest)
    }

    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// The manifest entry covering the given block, if any.
    pub fn chunk_for(&self, block_number: u32) -> Option<&ManifestChunk> {
        self.chunks.iter().find(|chunk| {
            chunk
                .block_range()
                .map(|range| range.contains(block_number))
                .unwrap_or(false)
        })
    }

    /// The manifest entry for exactly the given range, if any.
    pub fn entry_for_range(&self, range: &BlockRange) -> Option<&ManifestChunk> {
        self.chunks
            .iter()
            .find(|chunk| chunk.block_range().map(|r| r == *range).unwrap_or(false))
    }

    /// Checks that every entry parses: a well-formed range and valid CIDs.
    pub fn validate(&self) -> Result<()> {
        for chunk in &self.chunks {
            chunk.block_range()?;
            for hash in [&chunk.bin_hash, &chunk.bloom_hash] {
                Cid::try_from(hash.as_str()).map_err(|e| {
                    UnchainedError::InvalidIdentifier(format!(
                        "chunk {} carries bad content hash {}: {}",
                        chunk.range, hash, e
                    ))
                })?;
            }
        }
        Ok(())
    }
}
