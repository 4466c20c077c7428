//! Random access into one chunk file.
//!
//! A [`ChunkData`] keeps a buffered read-only handle. Appearance slice reads
//! restore the file position to just after the address record they belong
//! to, so a sequential scan of the address table can descend into any
//! address's appearances and keep going.
use std::{
    cmp::Ordering,
    fs::File,
    io::{BufReader, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use log::debug;
use web3::types::Address;

use crate::{
    chunk::{
        files::range_from_filename,
        structure::{body_structure, AddressRecord, AppearanceRecord, Body, HeaderRecord},
    },
    config::ChainSpec,
    constants::{ADDR_RECORD_WIDTH, APP_RECORD_WIDTH},
    errors::{Result, UnchainedError},
    types::{Appearance, BlockRange},
};

/// An open chunk file and its parsed metadata.
pub struct ChunkData {
    pub path: PathBuf,
    pub reader: BufReader<File>,
    pub header: HeaderRecord,
    pub body: Body,
    /// The block range promised by the filename.
    pub range: BlockRange,
}

impl ChunkData {
    /// Opens a chunk, reads its header and works out the table offsets.
    pub fn open(path: &Path) -> Result<Self> {
        let range = range_from_filename(path)?;
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let header = HeaderRecord::from_reader(&mut reader, path)?;
        let body = body_structure(&header);
        Ok(ChunkData {
            path: path.to_path_buf(),
            reader,
            header,
            body,
            range,
        })
    }

    /// Enforces the chain's header-hash rules on this chunk.
    pub fn verify(&self, spec: &ChainSpec) -> Result<()> {
        self.header.verify_hash(spec, &self.range, &self.path)
    }

    /// Binary search over the sorted address table.
    pub fn find_address(&mut self, address: &Address) -> Result<Option<AddressRecord>> {
        let mut low = 0u64;
        let mut high = self.header.address_count as u64;
        while low < high {
            let mid = (low + high) / 2;
            let record = self.address_record_at(mid)?;
            match record.address.cmp(address) {
                Ordering::Equal => return Ok(Some(record)),
                Ordering::Less => low = mid + 1,
                Ordering::Greater => high = mid,
            }
        }
        Ok(None)
    }

    /// All appearances recorded for the address in this chunk, or empty if
    /// the address is not present.
    pub fn appearances_for(&mut self, address: &Address) -> Result<Vec<Appearance>> {
        let Some(record) = self.find_address(address)? else {
            return Ok(vec![]);
        };
        let records = self.read_appearances(&record)?;
        Ok(records
            .iter()
            .map(|app| app.materialize(record.address))
            .collect())
    }

    /// Reads the appearance slice for an address record, then restores the
    /// file position to immediately after the address record so sequential
    /// address scans remain valid.
    pub fn read_appearances(&mut self, record: &AddressRecord) -> Result<Vec<AppearanceRecord>> {
        let return_to = self.reader.stream_position()?;
        let start =
            self.body.appearances_start as u64 + record.offset as u64 * APP_RECORD_WIDTH as u64;
        self.reader.seek(SeekFrom::Start(start))?;
        let mut apps = Vec::with_capacity(record.count as usize);
        let mut previous: Option<AppearanceRecord> = None;
        for _ in 0..record.count {
            let app = AppearanceRecord::from_reader(&mut self.reader)?;
            self.check_in_bounds(&app)?;
            if let Some(prev) = previous {
                if (app.block_number, app.transaction_index)
                    <= (prev.block_number, prev.transaction_index)
                {
                    return Err(self.corrupt(format!(
                        "appearances for {:?} not strictly ascending at block {} tx {}",
                        record.address, app.block_number, app.transaction_index
                    )));
                }
            }
            previous = Some(app);
            apps.push(app);
        }
        self.reader.seek(SeekFrom::Start(return_to))?;
        Ok(apps)
    }

    /// Sequential visit of every address record, descending into the
    /// appearance slice when `pred` holds. `visit` returns whether to keep
    /// going.
    pub fn scan_addresses<P, V>(&mut self, mut pred: P, mut visit: V) -> Result<()>
    where
        P: FnMut(&AddressRecord) -> bool,
        V: FnMut(&AddressRecord, Vec<AppearanceRecord>) -> Result<bool>,
    {
        self.reader
            .seek(SeekFrom::Start(self.body.addresses_start as u64))?;
        let mut previous: Option<Address> = None;
        for _ in 0..self.header.address_count {
            let record = AddressRecord::from_reader(&mut self.reader)?;
            if let Some(prev) = previous {
                if record.address <= prev {
                    return Err(self.corrupt(format!(
                        "address table not strictly ascending at {:?}",
                        record.address
                    )));
                }
            }
            previous = Some(record.address);
            if pred(&record) {
                let apps = self.read_appearances(&record)?;
                if !visit(&record, apps)? {
                    break;
                }
            }
        }
        debug!(
            "scanned {:?}: nAddr {:0>7}, nApp {:0>7}",
            self.path.file_name().unwrap_or_default(),
            self.header.address_count,
            self.header.appearance_count
        );
        Ok(())
    }

    fn address_record_at(&mut self, index: u64) -> Result<AddressRecord> {
        let at = self.body.addresses_start as u64 + index * ADDR_RECORD_WIDTH as u64;
        self.reader.seek(SeekFrom::Start(at))?;
        Ok(AddressRecord::from_reader(&mut self.reader)?)
    }

    /// Checks that the given appearance is within the chunk file bounds.
    fn check_in_bounds(&self, app: &AppearanceRecord) -> Result<()> {
        if !self.range.contains(app.block_number) {
            return Err(self.corrupt(format!(
                "appearance at block {} outside expected range {}-{}",
                app.block_number, self.range.first, self.range.last
            )));
        }
        Ok(())
    }

    fn corrupt(&self, reason: String) -> UnchainedError {
        UnchainedError::CorruptChunk {
            path: self.path.clone(),
            reason,
        }
    }
}
