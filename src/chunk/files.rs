//! Chunk directory listing and filename conventions.
//!
//! Chunk files are named `<first>-<last>.bin` with zero-padded nine digit
//! block numbers, e.g. `000000000-000099999.bin`. Bloom files share the stem
//! with a `.bloom` extension.
use std::{
    fs,
    path::{Path, PathBuf},
};

use log::debug;
use regex::Regex;

use crate::{
    errors::{Result, UnchainedError},
    types::BlockRange,
};

/// Details for files in an index chunk directory.
pub struct ChunksDir {
    pub dir: PathBuf,
    /// Sorted ascending by the first block of each chunk.
    pub paths: Vec<ChunkFile>,
}

impl ChunksDir {
    /// Obtains information about all the available chunk files.
    ///
    /// Entries whose names do not carry a block range are skipped.
    pub fn new(dir_path: &Path) -> Result<Self> {
        let files = fs::read_dir(dir_path)?;
        let mut paths: Vec<ChunkFile> = vec![];
        for file in files {
            let path = file?.path();
            match range_from_filename(&path) {
                Ok(range) => paths.push(ChunkFile { path, range }),
                Err(_) => {
                    debug!("skipping non-chunk entry {:?}", path);
                }
            }
        }
        paths.sort_by_key(|chunk| chunk.range.first);
        Ok(ChunksDir {
            dir: dir_path.to_path_buf(),
            paths,
        })
    }

    /// The chunk files whose ranges intersect the desired range.
    pub fn for_range(&self, desired: &BlockRange) -> Vec<&ChunkFile> {
        self.paths
            .iter()
            .filter(|chunk| chunk.range.intersection_exists(desired))
            .collect()
    }

    /// The chunk file covering the given block, found by binary search on
    /// the sorted range starts.
    pub fn for_block(&self, block_number: u32) -> Option<&ChunkFile> {
        let position = self
            .paths
            .partition_point(|chunk| chunk.range.first <= block_number);
        if position == 0 {
            return None;
        }
        let candidate = &self.paths[position - 1];
        candidate.range.contains(block_number).then_some(candidate)
    }

    /// The last block covered by any chunk in the directory.
    pub fn latest_block(&self) -> Result<u32> {
        let latest = self
            .paths
            .last()
            .ok_or_else(|| UnchainedError::NotFound(format!("chunk files in {:?}", self.dir)))?
            .range
            .last;
        Ok(latest)
    }
}

#[derive(Clone, Debug)]
pub struct ChunkFile {
    pub path: PathBuf,
    pub range: BlockRange,
}

/// Gets the first and last block an index file covers from its name.
pub fn range_from_filename(path: &Path) -> Result<BlockRange> {
    // Two 9 digit values: .../123456789-123456789.bin
    let path_string = path.to_str().ok_or_else(|| {
        UnchainedError::InvalidIdentifier(format!("cannot read path {:?} as string", path))
    })?;
    let bounds = Regex::new(
        r"(?x)
    (?P<first>\d{9})  # the earliest block.
    -
    (?P<last>\d{9}) # the latest block.
    ",
    )?
    .captures(path_string)
    .ok_or_else(|| {
        UnchainedError::InvalidIdentifier(format!(
            "file {} title lacks 9-digit block range",
            path_string
        ))
    })?;
    let first = bounds["first"]
        .parse::<u32>()
        .map_err(|e| UnchainedError::InvalidIdentifier(e.to_string()))?;
    let last = bounds["last"]
        .parse::<u32>()
        .map_err(|e| UnchainedError::InvalidIdentifier(e.to_string()))?;
    BlockRange::new(first, last)
}

/// The filename stem for a block range, e.g. `000000000-000099999`.
pub fn range_file_stem(range: &BlockRange) -> String {
    format!("{:0>9}-{:0>9}", range.first, range.last)
}

pub fn chunk_file_name(range: &BlockRange) -> String {
    format!("{}.bin", range_file_stem(range))
}

pub fn bloom_file_name(range: &BlockRange) -> String {
    format!("{}.bloom", range_file_stem(range))
}

/// Maps a chunk path to the bloom path with the same stem, or back.
pub fn sibling_path(path: &Path, dir: &Path, extension: &str) -> Result<PathBuf> {
    let range = range_from_filename(path)?;
    Ok(dir.join(format!("{}.{}", range_file_stem(&range), extension)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_range_parses() {
        let range = range_from_filename(Path::new("/some/dir/011283653-011286904.bin")).unwrap();
        assert_eq!(range.first, 11_283_653);
        assert_eq!(range.last, 11_286_904);
    }

    #[test]
    fn filename_without_range_is_rejected() {
        assert!(range_from_filename(Path::new("/some/dir/manifest.json")).is_err());
    }

    #[test]
    fn names_are_zero_padded() {
        let range = BlockRange::new(0, 99_999).unwrap();
        assert_eq!(chunk_file_name(&range), "000000000-000099999.bin");
        assert_eq!(bloom_file_name(&range), "000000000-000099999.bloom");
    }

    #[test]
    fn directory_listing_sorts_and_searches() {
        let tmp = tempfile::tempdir().unwrap();
        for name in [
            "000000200-000000299.bin",
            "000000000-000000099.bin",
            "000000100-000000199.bin",
            "manifest.json",
        ] {
            std::fs::write(tmp.path().join(name), b"").unwrap();
        }
        let chunks = ChunksDir::new(tmp.path()).unwrap();
        let firsts: Vec<u32> = chunks.paths.iter().map(|c| c.range.first).collect();
        assert_eq!(firsts, vec![0, 100, 200]);
        assert_eq!(chunks.latest_block().unwrap(), 299);

        assert_eq!(chunks.for_block(150).unwrap().range.first, 100);
        assert!(chunks.for_block(300).is_none());

        let desired = BlockRange::new(150, 250).unwrap();
        let relevant = chunks.for_range(&desired);
        assert_eq!(relevant.len(), 2);
    }

    #[test]
    fn sibling_path_swaps_dir_and_extension() {
        let bloom = sibling_path(
            Path::new("/idx/finalized/000000000-000099999.bin"),
            Path::new("/idx/blooms"),
            "bloom",
        )
        .unwrap();
        assert_eq!(
            bloom,
            PathBuf::from("/idx/blooms/000000000-000099999.bloom")
        );
    }
}
