//! Index directory layout and per-chain parameters.
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use web3::types::H256;

use crate::{
    constants::{MAINNET_HASH_EXCEPTION_BOUNDARY, SPEC_VERSION_HASH},
    errors::{Result, UnchainedError},
};

/// Chain-specific index parameters.
///
/// The hash-exception boundary is data, not code: mainnet chunks at or below
/// block 13,000,000 predate the header-hash scheme, and other chains define
/// their own boundary (or none).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSpec {
    pub chain: String,
    pub spec_hash: H256,
    pub hash_exception_boundary: Option<u32>,
}

impl ChainSpec {
    pub fn mainnet() -> Self {
        ChainSpec {
            chain: "mainnet".to_string(),
            spec_hash: SPEC_VERSION_HASH,
            hash_exception_boundary: Some(MAINNET_HASH_EXCEPTION_BOUNDARY),
        }
    }

    /// A chain with no hash exception window.
    pub fn new(chain: &str, spec_hash: H256) -> Self {
        ChainSpec {
            chain: chain.to_string(),
            spec_hash,
            hash_exception_boundary: None,
        }
    }
}

/// Helper for setting up the index directory layout.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DirNature {
    /// Platform data directory, via the directories crate.
    #[default]
    Default,
    /// A caller-supplied base directory.
    Custom(PathBuf),
}

impl DirNature {
    /// Combines the directory kind and the chain name into concrete paths.
    pub fn into_dirs(self, chain: &str) -> Result<IndexDirs> {
        let base = match self {
            DirNature::Default => {
                let project = ProjectDirs::from("", "", "unchained-index").ok_or_else(|| {
                    UnchainedError::Usage(
                        "could not access env var (e.g., $HOME) to set up project".to_string(),
                    )
                })?;
                project.data_dir().to_path_buf()
            }
            DirNature::Custom(base) => base,
        };
        Ok(IndexDirs::under(&base, chain))
    }
}

/// Locations of the chunk, bloom and monitor files for one chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexDirs {
    pub base: PathBuf,
    pub chunks_dir: PathBuf,
    pub blooms_dir: PathBuf,
    pub monitors_dir: PathBuf,
}

impl IndexDirs {
    pub fn under(base: &Path, chain: &str) -> Self {
        let chain_dir = base.join(chain);
        IndexDirs {
            base: chain_dir.clone(),
            chunks_dir: chain_dir.join("finalized"),
            blooms_dir: chain_dir.join("blooms"),
            monitors_dir: chain_dir.join("monitors"),
        }
    }

    pub fn ensure_exist(&self) -> Result<()> {
        std::fs::create_dir_all(&self.chunks_dir)?;
        std::fs::create_dir_all(&self.blooms_dir)?;
        std::fs::create_dir_all(&self.monitors_dir)?;
        Ok(())
    }

    pub fn manifest_file(&self) -> PathBuf {
        self.base.join("manifest.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_paths_correctly_formed() {
        let dirs = DirNature::Custom(PathBuf::from("/tmp/idx"))
            .into_dirs("mainnet")
            .unwrap();
        assert_eq!(dirs.chunks_dir, PathBuf::from("/tmp/idx/mainnet/finalized"));
        assert_eq!(dirs.blooms_dir, PathBuf::from("/tmp/idx/mainnet/blooms"));
        assert_eq!(
            dirs.monitors_dir,
            PathBuf::from("/tmp/idx/mainnet/monitors")
        );
        assert_eq!(
            dirs.manifest_file(),
            PathBuf::from("/tmp/idx/mainnet/manifest.json")
        );
    }

    #[test]
    fn mainnet_spec_carries_exception_boundary() {
        let spec = ChainSpec::mainnet();
        assert_eq!(spec.hash_exception_boundary, Some(13_000_000));
        let other = ChainSpec::new("sepolia", SPEC_VERSION_HASH);
        assert_eq!(other.hash_exception_boundary, None);
    }
}
