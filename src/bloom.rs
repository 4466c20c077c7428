//! Per-chunk bloom filters over addresses.
//!
//! Each chunk file has a companion `.bloom` file holding one or more bit
//! arrays. An address sets five bits per array (the five big-endian u32
//! segments of the address, each modulo the array width). Membership tests
//! have zero false negatives: `false` means the chunk cannot contain the
//! address.
//!
//! The parameters are fixed by the index specification and must be
//! reproduced bit-exactly to interoperate with published bloom files.
use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use web3::types::{Address, H256};

use crate::{
    constants::{
        BLOOM_MAGIC, BLOOM_WIDTH_IN_BITS, BLOOM_WIDTH_IN_BYTES, HASHES_PER_ADDRESS,
        MAX_ADDRS_IN_BLOOM,
    },
    errors::{Result, UnchainedError},
};

/// One bit array plus the number of addresses inserted into it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BloomFilter {
    pub n_inserted: u32,
    pub bits: Vec<u8>,
}

impl BloomFilter {
    fn new() -> Self {
        BloomFilter {
            n_inserted: 0,
            bits: vec![0u8; BLOOM_WIDTH_IN_BYTES],
        }
    }

    fn set_bit(&mut self, bit: u32) {
        self.bits[(bit / 8) as usize] |= 1 << (bit % 8);
    }

    fn is_bit_set(&self, bit: u32) -> bool {
        self.bits[(bit / 8) as usize] & (1 << (bit % 8)) != 0
    }

    fn holds(&self, positions: &[u32; HASHES_PER_ADDRESS]) -> bool {
        positions.iter().all(|bit| self.is_bit_set(*bit))
    }
}

/// The bloom filters that accompany one chunk file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkBloom {
    pub hash: H256,
    pub filters: Vec<BloomFilter>,
}

impl ChunkBloom {
    pub fn new(hash: H256) -> Self {
        ChunkBloom {
            hash,
            filters: vec![BloomFilter::new()],
        }
    }

    /// Reads a bloom file into memory.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut rdr = BufReader::new(file);
        let magic = rdr.read_u32::<LittleEndian>()?;
        if magic != BLOOM_MAGIC {
            return Err(UnchainedError::InvalidMagic {
                path: path.to_path_buf(),
                expected: BLOOM_MAGIC,
                got: magic,
            });
        }
        let mut hash = [0u8; 32];
        rdr.read_exact(&mut hash)?;
        let count = rdr.read_u32::<LittleEndian>()?;
        let mut filters = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let n_inserted = rdr.read_u32::<LittleEndian>()?;
            let mut bits = vec![0u8; BLOOM_WIDTH_IN_BYTES];
            rdr.read_exact(&mut bits)?;
            filters.push(BloomFilter { n_inserted, bits });
        }
        if filters.is_empty() {
            return Err(UnchainedError::CorruptChunk {
                path: path.to_path_buf(),
                reason: "bloom file holds no filters".to_string(),
            });
        }
        Ok(ChunkBloom { hash: H256(hash), filters })
    }

    /// Writes the filters out as the exact inverse of [`ChunkBloom::open`].
    pub fn write(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut wtr = BufWriter::new(file);
        wtr.write_u32::<LittleEndian>(BLOOM_MAGIC)?;
        wtr.write_all(self.hash.as_bytes())?;
        wtr.write_u32::<LittleEndian>(self.filters.len() as u32)?;
        for filter in &self.filters {
            wtr.write_u32::<LittleEndian>(filter.n_inserted)?;
            wtr.write_all(&filter.bits)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Inserts an address, spilling to a fresh filter once the current one
    /// holds [`MAX_ADDRS_IN_BLOOM`] addresses.
    pub fn insert_address(&mut self, address: &Address) {
        let positions = bit_positions(address);
        let needs_fresh = match self.filters.last() {
            Some(filter) => filter.n_inserted >= MAX_ADDRS_IN_BLOOM,
            None => true,
        };
        if needs_fresh {
            self.filters.push(BloomFilter::new());
        }
        if let Some(filter) = self.filters.last_mut() {
            for bit in positions {
                filter.set_bit(bit);
            }
            filter.n_inserted += 1;
        }
    }

    /// False means the chunk definitely does not contain the address.
    pub fn maybe_contains(&self, address: &Address) -> bool {
        let positions = bit_positions(address);
        self.filters.iter().any(|filter| filter.holds(&positions))
    }
}

/// The five bit positions an address maps to.
fn bit_positions(address: &Address) -> [u32; HASHES_PER_ADDRESS] {
    let bytes = address.as_bytes();
    let mut positions = [0u32; HASHES_PER_ADDRESS];
    for (i, position) in positions.iter_mut().enumerate() {
        *position = BigEndian::read_u32(&bytes[i * 4..i * 4 + 4]) % BLOOM_WIDTH_IN_BITS;
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        bytes[3] = n.wrapping_mul(7);
        Address::from_slice(&bytes)
    }

    #[test]
    fn no_false_negatives() {
        let mut bloom = ChunkBloom::new(H256::zero());
        for n in 0..200 {
            bloom.insert_address(&addr(n));
        }
        for n in 0..200 {
            assert!(bloom.maybe_contains(&addr(n)));
        }
    }

    #[test]
    fn distinct_address_usually_misses() {
        let mut bloom = ChunkBloom::new(H256::zero());
        bloom.insert_address(&addr(1));
        // With one address inserted, a disjoint bit pattern cannot match.
        assert!(!bloom.maybe_contains(&Address::repeat_byte(0x99)));
    }

    #[test]
    fn file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("000000000-000000999.bloom");
        let mut bloom = ChunkBloom::new(H256::repeat_byte(3));
        for n in 0..50 {
            bloom.insert_address(&addr(n));
        }
        bloom.write(&path).unwrap();
        let read = ChunkBloom::open(&path).unwrap();
        assert_eq!(read, bloom);
    }

    #[test]
    fn positions_are_in_range() {
        for bit in bit_positions(&Address::repeat_byte(0xff)) {
            assert!(bit < BLOOM_WIDTH_IN_BITS);
        }
    }
}
