//! Contains the structure of an index chunk file as defined in the
//! Unchained Index specification.
//!
//! All integers are little-endian. The layout is fixed width:
//!
//! ```text
//! Offset  Size  Field
//! 0       4     Magic
//! 4       32    Hash  (spec version hash, or zero for early mainnet chunks)
//! 36      4     AddressCount (N)
//! 40      4     AppearanceCount (M)
//! 44      28*N  AddressTable   { Address[20] Offset[4] Count[4] }
//! 44+28N  8*M   AppearanceTable{ BlockNumber[4] TransactionIndex[4] }
//! ```
use std::{
    io::{Read, Write},
    path::Path,
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use web3::types::{Address, H256};

use crate::{
    config::ChainSpec,
    constants::{ADDR, ADDR_RECORD_WIDTH, APP_RECORD_WIDTH, HEADER_WIDTH, MAGIC},
    errors::{Result, UnchainedError},
    types::{Appearance, BlockRange, Reason},
};

/// Values extracted from the first 44 bytes of a chunk file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeaderRecord {
    pub magic: u32,
    pub hash: H256,
    pub address_count: u32,
    pub appearance_count: u32,
}

impl HeaderRecord {
    /// Obtains values from the file header and validates the magic number.
    ///
    /// Hash verification is deferred to [`HeaderRecord::verify_hash`]; the
    /// caller knows the chain-specific exceptions, this function is called
    /// too often to.
    pub fn from_reader(mut rdr: impl Read, path: &Path) -> Result<HeaderRecord> {
        let magic = rdr.read_u32::<LittleEndian>()?;
        if magic != MAGIC {
            return Err(UnchainedError::InvalidMagic {
                path: path.to_path_buf(),
                expected: MAGIC,
                got: magic,
            });
        }
        let mut hash = [0u8; 32];
        rdr.read_exact(&mut hash)?;
        let address_count = rdr.read_u32::<LittleEndian>()?;
        let appearance_count = rdr.read_u32::<LittleEndian>()?;
        Ok(HeaderRecord {
            magic,
            hash: H256(hash),
            address_count,
            appearance_count,
        })
    }

    pub fn write(&self, mut wtr: impl Write) -> Result<()> {
        wtr.write_u32::<LittleEndian>(self.magic)?;
        wtr.write_all(self.hash.as_bytes())?;
        wtr.write_u32::<LittleEndian>(self.address_count)?;
        wtr.write_u32::<LittleEndian>(self.appearance_count)?;
        Ok(())
    }

    /// Enforces the header-hash rules for the given chain.
    ///
    /// Chunks at or below the chain's hash-exception boundary must carry the
    /// zero hash; all others must carry the published spec version hash.
    pub fn verify_hash(&self, spec: &ChainSpec, range: &BlockRange, path: &Path) -> Result<()> {
        let in_exception = spec
            .hash_exception_boundary
            .map(|boundary| range.first <= boundary)
            .unwrap_or(false);
        let expected = if in_exception {
            H256::zero()
        } else {
            spec.spec_hash
        };
        if self.hash != expected {
            return Err(UnchainedError::HashMismatch {
                path: path.to_path_buf(),
                expected: format!("{:#x}", expected),
                got: format!("{:#x}", self.hash),
            });
        }
        Ok(())
    }
}

/// Content of an entry in the address table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AddressRecord {
    pub address: Address,
    /// Zero-based index of the first appearance record for this address.
    pub offset: u32,
    /// Number of consecutive appearance records for this address.
    pub count: u32,
}

impl AddressRecord {
    /// Reads an address record from the current reader position.
    pub fn from_reader(mut rdr: impl Read) -> std::io::Result<Self> {
        let mut addr_buf = [0u8; ADDR];
        rdr.read_exact(&mut addr_buf)?;
        let offset = rdr.read_u32::<LittleEndian>()?;
        let count = rdr.read_u32::<LittleEndian>()?;
        Ok(AddressRecord {
            address: Address::from_slice(&addr_buf),
            offset,
            count,
        })
    }

    pub fn write(&self, mut wtr: impl Write) -> Result<()> {
        wtr.write_all(self.address.as_bytes())?;
        wtr.write_u32::<LittleEndian>(self.offset)?;
        wtr.write_u32::<LittleEndian>(self.count)?;
        Ok(())
    }
}

/// Content of an entry in the appearance table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AppearanceRecord {
    pub block_number: u32,
    pub transaction_index: u32,
}

impl AppearanceRecord {
    /// Reads an appearance record from the current reader position.
    pub fn from_reader(mut rdr: impl Read) -> std::io::Result<Self> {
        let block_number = rdr.read_u32::<LittleEndian>()?;
        let transaction_index = rdr.read_u32::<LittleEndian>()?;
        Ok(AppearanceRecord {
            block_number,
            transaction_index,
        })
    }

    pub fn write(&self, mut wtr: impl Write) -> Result<()> {
        wtr.write_u32::<LittleEndian>(self.block_number)?;
        wtr.write_u32::<LittleEndian>(self.transaction_index)?;
        Ok(())
    }

    /// Materializes an [`Appearance`]. Chunk records store no reason, so the
    /// result carries [`Reason::Indexed`].
    pub fn materialize(&self, address: Address) -> Appearance {
        Appearance {
            address,
            block_number: self.block_number,
            transaction_index: self.transaction_index,
            reason: Reason::Indexed,
            timestamp: None,
        }
    }
}

/// Byte indices of the two tables in a chunk file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Body {
    /// Byte index of the start of the address table.
    pub addresses_start: usize,
    /// Byte index of the start of the appearance table.
    pub appearances_start: usize,
    /// Byte index one past the end of the appearance table.
    pub end: usize,
}

/// Determines the byte indices for a chunk with the given header.
pub fn body_structure(header: &HeaderRecord) -> Body {
    let appearances_start = HEADER_WIDTH + header.address_count as usize * ADDR_RECORD_WIDTH;
    let end = appearances_start + header.appearance_count as usize * APP_RECORD_WIDTH;
    Body {
        addresses_start: HEADER_WIDTH,
        appearances_start,
        end,
    }
}
