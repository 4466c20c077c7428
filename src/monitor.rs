//! Per-address monitor files.
//!
//! A monitor is an append-only list of every appearance for one address,
//! merged out of chunk slices. It acts as a read-through cache: rebuilding
//! one takes only shared read-only handles on the chunk files, and the file
//! is replaced atomically (temp file + rename) so readers never observe a
//! half-written monitor.
use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::PathBuf,
};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use web3::types::Address;

use crate::{
    chunk::read::ChunkData,
    config::IndexDirs,
    constants::{ADDR, MAGIC},
    errors::{Result, UnchainedError},
    filter::AppearanceFilter,
    iterate::AppearanceMap,
    types::{Appearance, Reason},
    walk::{Resource, Walker},
};

pub struct Monitor {
    pub address: Address,
    pub path: PathBuf,
    appearances: Vec<Appearance>,
}

impl Monitor {
    /// An empty monitor for the address, not yet on disk.
    pub fn new(dirs: &IndexDirs, address: Address) -> Self {
        Monitor {
            address,
            path: monitor_path(dirs, &address),
            appearances: vec![],
        }
    }

    /// Reads the monitor file for the address.
    pub fn load(dirs: &IndexDirs, address: Address) -> Result<Self> {
        let path = monitor_path(dirs, &address);
        let file = File::open(&path)?;
        let mut rdr = BufReader::new(file);
        let magic = rdr.read_u32::<LittleEndian>()?;
        if magic != MAGIC {
            return Err(UnchainedError::InvalidMagic {
                path,
                expected: MAGIC,
                got: magic,
            });
        }
        let mut addr_buf = [0u8; ADDR];
        rdr.read_exact(&mut addr_buf)?;
        let recorded = Address::from_slice(&addr_buf);
        if recorded != address {
            return Err(UnchainedError::CorruptChunk {
                path,
                reason: format!("monitor records address {:?}, expected {:?}", recorded, address),
            });
        }
        let count = rdr.read_u32::<LittleEndian>()?;
        let mut appearances = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let block_number = rdr.read_u32::<LittleEndian>()?;
            let transaction_index = rdr.read_u32::<LittleEndian>()?;
            let code = rdr.read_u32::<LittleEndian>()?;
            let reason = Reason::from_u32(code).ok_or_else(|| UnchainedError::CorruptChunk {
                path: path.clone(),
                reason: format!("unknown reason code {}", code),
            })?;
            appearances.push(Appearance {
                address,
                block_number,
                transaction_index,
                reason,
                timestamp: None,
            });
        }
        Ok(Monitor {
            address,
            path,
            appearances,
        })
    }

    pub fn count(&self) -> usize {
        self.appearances.len()
    }

    pub fn appearances(&self) -> &[Appearance] {
        &self.appearances
    }

    /// Appends appearances, keeping the list ordered and duplicate-free.
    pub fn append(&mut self, new_apps: Vec<Appearance>) {
        self.appearances.extend(new_apps);
        self.appearances.sort_by_key(|app| app.identity_key());
        self.appearances.dedup_by_key(|app| app.identity_key());
        self.appearances.sort_by_key(|app| app.sort_key());
    }

    /// Writes the monitor to disk atomically: the contents go to a temp
    /// file next to the target, which is then renamed over it.
    pub fn write(&self) -> Result<()> {
        let tmp = self.path.with_extension("mon.tmp");
        {
            let file = File::create(&tmp)?;
            let mut wtr = BufWriter::new(file);
            wtr.write_u32::<LittleEndian>(MAGIC)?;
            wtr.write_all(self.address.as_bytes())?;
            wtr.write_u32::<LittleEndian>(self.appearances.len() as u32)?;
            for app in &self.appearances {
                wtr.write_u32::<LittleEndian>(app.block_number)?;
                wtr.write_u32::<LittleEndian>(app.transaction_index)?;
                wtr.write_u32::<LittleEndian>(app.reason.as_u32())?;
            }
            wtr.flush()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Rebuilds the monitor by merging the address's slices out of every
    /// chunk the blooms admit, then rewrites the file.
    pub fn refresh_from_chunks(&mut self, dirs: &IndexDirs) -> Result<usize> {
        let walker = Walker::new(dirs);
        let mut merged: Vec<Appearance> = vec![];
        let address = self.address;
        walker.walk(Resource::Index, &[], &[address], |path, _| {
            let mut chunk = ChunkData::open(path)?;
            merged.extend(chunk.appearances_for(&address)?);
            Ok(true)
        })?;
        let found = merged.len();
        self.append(merged);
        self.write()?;
        debug!(
            "monitor for {:?} refreshed with {} chunk appearances",
            self.address, found
        );
        Ok(found)
    }

    /// Converts the (filtered) appearance list into an ordered appearance
    /// map ready for concurrent iteration.
    ///
    /// With `no_zero` set, a filter that leaves nothing is an error rather
    /// than an empty map.
    pub fn as_map<V: Default>(
        &self,
        filter: &AppearanceFilter,
        no_zero: bool,
    ) -> Result<AppearanceMap<V>> {
        let surviving = filter.apply(self.appearances.clone());
        if surviving.is_empty() && no_zero {
            return Err(UnchainedError::NotFound(format!(
                "appearances for {:?}",
                self.address
            )));
        }
        Ok(AppearanceMap::new(surviving))
    }
}

fn monitor_path(dirs: &IndexDirs, address: &Address) -> PathBuf {
    dirs.monitors_dir
        .join(format!("0x{}.mon", hex::encode(address.as_bytes())))
}
