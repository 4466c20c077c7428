//! Enumerates the index files relevant to a query, in ascending block
//! order, blooms first.
use std::{collections::BTreeMap, path::Path};

use log::{debug, warn};
use web3::types::Address;

use crate::{
    bloom::ChunkBloom,
    chunk::files::{bloom_file_name, range_file_stem, ChunkFile, ChunksDir},
    config::IndexDirs,
    errors::{Result, UnchainedError},
    manifest::Manifest,
    types::BlockRange,
};

/// Which companion file of each chunk the visitor wants to see.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    Bloom,
    Index,
}

/// Walks the chunk files whose ranges intersect a query.
///
/// For each candidate chunk the walker opens the bloom first and skips the
/// chunk when none of the query addresses may be present. The visitor is
/// called with the path of the requested resource and a flag that is true
/// only on the first call, so it can emit header output once.
///
/// The visitor returns whether to keep going; the walk terminates on
/// `Ok(false)` or any error.
pub struct Walker<'a> {
    pub dirs: &'a IndexDirs,
    /// When present, chunks not listed in the manifest are refused.
    pub manifest: Option<&'a Manifest>,
    /// Refusals become hard errors instead of skips.
    pub strict: bool,
}

impl<'a> Walker<'a> {
    pub fn new(dirs: &'a IndexDirs) -> Self {
        Walker {
            dirs,
            manifest: None,
            strict: false,
        }
    }

    /// Visits every relevant chunk. An empty `block_numbers` slice means
    /// every chunk in the directory; an empty `query_addrs` slice disables
    /// the bloom prefilter.
    pub fn walk<F>(
        &self,
        resource: Resource,
        block_numbers: &[u32],
        query_addrs: &[Address],
        mut visit: F,
    ) -> Result<()>
    where
        F: FnMut(&Path, bool) -> Result<bool>,
    {
        let chunks = ChunksDir::new(&self.dirs.chunks_dir)?;
        let candidates = self.candidates(&chunks, block_numbers);

        let mut first = true;
        for chunk in candidates.values() {
            if !self.listed_in_manifest(&chunk.range)? {
                continue;
            }
            if !query_addrs.is_empty() && !self.bloom_admits(chunk, query_addrs)? {
                continue;
            }
            let keep_going = match resource {
                Resource::Index => visit(&chunk.path, first)?,
                Resource::Bloom => {
                    let bloom_path = self.dirs.blooms_dir.join(bloom_file_name(&chunk.range));
                    visit(&bloom_path, first)?
                }
            };
            first = false;
            if !keep_going {
                break;
            }
        }
        Ok(())
    }

    /// The chunks containing the queried blocks, keyed (and therefore
    /// ordered and deduplicated) by their first block.
    fn candidates<'c>(
        &self,
        chunks: &'c ChunksDir,
        block_numbers: &[u32],
    ) -> BTreeMap<u32, &'c ChunkFile> {
        let mut candidates: BTreeMap<u32, &ChunkFile> = BTreeMap::new();
        if block_numbers.is_empty() {
            for chunk in &chunks.paths {
                candidates.insert(chunk.range.first, chunk);
            }
        } else {
            for bn in block_numbers {
                match chunks.for_block(*bn) {
                    Some(chunk) => {
                        candidates.insert(chunk.range.first, chunk);
                    }
                    None => debug!("no chunk covers block {}", bn),
                }
            }
        }
        candidates
    }

    fn listed_in_manifest(&self, range: &BlockRange) -> Result<bool> {
        let Some(manifest) = self.manifest else {
            return Ok(true);
        };
        if manifest.entry_for_range(range).is_some() {
            return Ok(true);
        }
        if self.strict {
            return Err(UnchainedError::CorruptChunk {
                path: self.dirs.chunks_dir.join(range_file_stem(range)),
                reason: "chunk is not listed in the manifest".to_string(),
            });
        }
        warn!(
            "refusing chunk {} absent from the manifest",
            range_file_stem(range)
        );
        Ok(false)
    }

    /// True when any query address may be present in the chunk. A missing
    /// or unreadable bloom cannot rule anything out, so the chunk is
    /// admitted (unreadable is a hard error when strict).
    fn bloom_admits(&self, chunk: &ChunkFile, query_addrs: &[Address]) -> Result<bool> {
        let bloom_path = self.dirs.blooms_dir.join(bloom_file_name(&chunk.range));
        if !bloom_path.exists() {
            debug!("no bloom for {:?}, opening chunk anyway", chunk.path);
            return Ok(true);
        }
        let bloom = match ChunkBloom::open(&bloom_path) {
            Ok(bloom) => bloom,
            Err(e) if self.strict => return Err(e),
            Err(e) => {
                warn!("unreadable bloom {:?} ({}), opening chunk anyway", bloom_path, e);
                return Ok(true);
            }
        };
        let admitted = query_addrs
            .iter()
            .any(|address| bloom.maybe_contains(address));
        if !admitted {
            debug!(
                "bloom {} rules out all {} query addresses",
                range_file_stem(&chunk.range),
                query_addrs.len()
            );
        }
        Ok(admitted)
    }
}
