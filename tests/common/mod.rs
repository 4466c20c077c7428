//! Shared helpers: a synthetic index builder and a stubbed RPC connection.
use std::{
    collections::{HashMap, HashSet},
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use async_trait::async_trait;
use tempfile::TempDir;
use unchained_index::{
    bloom::ChunkBloom,
    chunk::{
        files::{bloom_file_name, chunk_file_name},
        structure::{AddressRecord, AppearanceRecord, HeaderRecord},
    },
    config::IndexDirs,
    connection::Connection,
    constants::MAGIC,
    errors::{Result, UnchainedError},
    types::{BlockHeader, BlockRange, Log, Receipt, Trace},
};
use web3::types::{Address, H256, U256};

pub fn scratch_dirs() -> (TempDir, IndexDirs) {
    let _ = env_logger::builder().is_test(true).try_init();
    let tmp = tempfile::tempdir().unwrap();
    let dirs = IndexDirs::under(tmp.path(), "testnet");
    dirs.ensure_exist().unwrap();
    (tmp, dirs)
}

/// Writes a chunk file and its bloom. `entries` must be sorted by address;
/// each appearance list must be ascending and within `range`.
pub fn write_chunk(
    dirs: &IndexDirs,
    range: BlockRange,
    entries: &[(Address, Vec<(u32, u32)>)],
    hash: H256,
) -> PathBuf {
    let mut address_records = Vec::with_capacity(entries.len());
    let mut appearances = vec![];
    let mut offset = 0u32;
    for (address, list) in entries {
        address_records.push(AddressRecord {
            address: *address,
            offset,
            count: list.len() as u32,
        });
        for (block_number, transaction_index) in list {
            appearances.push(AppearanceRecord {
                block_number: *block_number,
                transaction_index: *transaction_index,
            });
        }
        offset += list.len() as u32;
    }
    let header = HeaderRecord {
        magic: MAGIC,
        hash,
        address_count: address_records.len() as u32,
        appearance_count: appearances.len() as u32,
    };

    let path = dirs.chunks_dir.join(chunk_file_name(&range));
    {
        let mut wtr = BufWriter::new(File::create(&path).unwrap());
        header.write(&mut wtr).unwrap();
        for record in &address_records {
            record.write(&mut wtr).unwrap();
        }
        for app in &appearances {
            app.write(&mut wtr).unwrap();
        }
        wtr.flush().unwrap();
    }

    let mut bloom = ChunkBloom::new(hash);
    for (address, _) in entries {
        bloom.insert_address(address);
    }
    bloom
        .write(&dirs.blooms_dir.join(bloom_file_name(&range)))
        .unwrap();

    path
}

/// An RPC stand-in with canned balances and headers.
#[derive(Default)]
pub struct StubConnection {
    pub balances: HashMap<u32, U256>,
    pub missing_blocks: HashSet<u32>,
}

#[async_trait]
impl Connection for StubConnection {
    async fn latest_block_number(&self) -> Result<u64> {
        Ok(u32::MAX as u64)
    }

    async fn get_balance_at(&self, _address: Address, block_number: u32) -> Result<U256> {
        self.balances
            .get(&block_number)
            .copied()
            .ok_or_else(|| UnchainedError::Rpc(format!("no balance stub for block {}", block_number)))
    }

    async fn get_block_header(&self, block_number: u32) -> Result<BlockHeader> {
        if self.missing_blocks.contains(&block_number) {
            return Err(UnchainedError::NotFound(format!("block {}", block_number)));
        }
        Ok(BlockHeader {
            block_number,
            hash: H256::repeat_byte(block_number as u8),
            parent_hash: H256::repeat_byte(block_number.wrapping_sub(1) as u8),
            miner: Address::repeat_byte(0x11),
            timestamp: 1_600_000_000 + block_number as i64,
        })
    }

    async fn get_receipt(&self, block_number: u32, transaction_index: u32) -> Result<Receipt> {
        Ok(Receipt {
            block_number,
            transaction_index,
            transaction_hash: H256::repeat_byte(0x22),
            status: 1,
            gas_used: 21_000,
            contract_address: None,
            logs: vec![],
        })
    }

    async fn get_logs(&self, block_number: u32, transaction_index: u32) -> Result<Vec<Log>> {
        Ok(vec![Log {
            block_number,
            transaction_index,
            log_index: 0,
            address: Address::repeat_byte(0x33),
            topics: vec![],
            data: vec![],
        }])
    }

    async fn get_traces(&self, _block_number: u32, _transaction_index: u32) -> Result<Vec<Trace>> {
        Err(UnchainedError::Rpc("traces are not stubbed".to_string()))
    }

    async fn call(
        &self,
        _to: Address,
        _data: Vec<u8>,
        _block_number: Option<u32>,
    ) -> Result<Vec<u8>> {
        Err(UnchainedError::Rpc("calls are not stubbed".to_string()))
    }
}
