//! Core data model: appearances, block ranges, and the entity records
//! fetched per appearance.
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use web3::types::{Address, H256, U256};

use crate::errors::{Result, UnchainedError};

/// Why an address appears in a transaction.
///
/// Chunk files do not record a reason; appearances materialized from a chunk
/// carry [`Reason::Indexed`]. Monitor files record the true reason and round
/// trip it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reason {
    Miner,
    Uncle,
    Withdrawal,
    From,
    To,
    Input,
    Output,
    Emitter,
    Topic,
    Creator,
    SelfDestruct,
    /// Synthesized from a block identifier rather than observed on chain.
    Block,
    /// Materialized from a chunk file, which stores no reason.
    #[default]
    Indexed,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Miner => "miner",
            Reason::Uncle => "uncle",
            Reason::Withdrawal => "withdrawal",
            Reason::From => "from",
            Reason::To => "to",
            Reason::Input => "input",
            Reason::Output => "output",
            Reason::Emitter => "emitter",
            Reason::Topic => "topic",
            Reason::Creator => "creator",
            Reason::SelfDestruct => "self-destruct",
            Reason::Block => "block",
            Reason::Indexed => "indexed",
        }
    }

    /// Stable on-disk code, used by monitor files.
    pub fn as_u32(&self) -> u32 {
        match self {
            Reason::Miner => 0,
            Reason::Uncle => 1,
            Reason::Withdrawal => 2,
            Reason::From => 3,
            Reason::To => 4,
            Reason::Input => 5,
            Reason::Output => 6,
            Reason::Emitter => 7,
            Reason::Topic => 8,
            Reason::Creator => 9,
            Reason::SelfDestruct => 10,
            Reason::Block => 11,
            Reason::Indexed => 12,
        }
    }

    pub fn from_u32(code: u32) -> Option<Reason> {
        let reason = match code {
            0 => Reason::Miner,
            1 => Reason::Uncle,
            2 => Reason::Withdrawal,
            3 => Reason::From,
            4 => Reason::To,
            5 => Reason::Input,
            6 => Reason::Output,
            7 => Reason::Emitter,
            8 => Reason::Topic,
            9 => Reason::Creator,
            10 => Reason::SelfDestruct,
            11 => Reason::Block,
            12 => Reason::Indexed,
            _ => return None,
        };
        Some(reason)
    }
}

/// One participation of an address in the chain history.
///
/// The documented order of a result set is by block number, then transaction
/// index, then reason; [`Appearance::sort_key`] is that tuple.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Appearance {
    pub address: Address,
    pub block_number: u32,
    pub transaction_index: u32,
    pub reason: Reason,
    /// Attached downstream; not part of any on-disk chunk record.
    pub timestamp: Option<i64>,
}

impl Appearance {
    pub fn sort_key(&self) -> (u32, u32, Reason) {
        (self.block_number, self.transaction_index, self.reason)
    }

    /// Uniqueness key: the global index holds exactly one appearance per
    /// (address, block, transaction, reason) tuple.
    pub fn identity_key(&self) -> (u32, u32, Reason, Address) {
        (
            self.block_number,
            self.transaction_index,
            self.reason,
            self.address,
        )
    }
}

/// An inclusive range of block numbers, `[first, last]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub first: u32,
    pub last: u32,
}

impl BlockRange {
    pub fn new(first: u32, last: u32) -> Result<Self> {
        if first > last {
            return Err(UnchainedError::InvalidIdentifier(format!(
                "first block {} must not come after last block {}",
                first, last
            )));
        }
        Ok(BlockRange { first, last })
    }

    /// True if there are any common blocks for two ranges.
    pub fn intersection_exists(&self, other: &BlockRange) -> bool {
        self.first <= other.last && other.first <= self.last
    }

    /// True if every block in this range is within the other range.
    pub fn is_subset_of(&self, other: &BlockRange) -> bool {
        self.first >= other.first && self.last <= other.last
    }

    /// True if the range contains the given block number.
    pub fn contains(&self, block_number: u32) -> bool {
        self.first <= block_number && block_number <= self.last
    }
}

impl PartialOrd for BlockRange {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BlockRange {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.first, self.last).cmp(&(other.first, other.last))
    }
}

/// A balance row produced by `export --balances`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub holder: Address,
    pub address: Address,
    pub block_number: u32,
    pub transaction_index: u32,
    pub balance: U256,
    pub timestamp: Option<i64>,
}

/// The subset of a block header the query engine fetches per appearance.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub block_number: u32,
    pub hash: H256,
    pub parent_hash: H256,
    pub miner: Address,
    pub timestamp: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub block_number: u32,
    pub transaction_index: u32,
    pub log_index: u32,
    /// The emitting contract.
    pub address: Address,
    pub topics: Vec<H256>,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub block_number: u32,
    pub transaction_index: u32,
    pub transaction_hash: H256,
    pub status: u32,
    pub gas_used: u64,
    pub contract_address: Option<Address>,
    pub logs: Vec<Log>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    pub block_number: u32,
    pub transaction_index: u32,
    pub trace_address: Vec<u32>,
    pub kind: String,
    pub from: Address,
    pub to: Address,
    pub value: U256,
}

/// A free-form single-field model, used for one-line command results.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub msg: String,
}

/// Hex-encode byte payloads so models and JSON round-trips stay readable.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        hex::decode(text.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_round_trip() {
        for code in 0..13 {
            let reason = Reason::from_u32(code).unwrap();
            assert_eq!(reason.as_u32(), code);
        }
        assert_eq!(Reason::from_u32(13), None);
    }

    #[test]
    fn appearances_order_by_block_then_index_then_reason() {
        let mut apps = vec![
            Appearance {
                block_number: 7,
                transaction_index: 1,
                reason: Reason::To,
                ..Default::default()
            },
            Appearance {
                block_number: 7,
                transaction_index: 0,
                reason: Reason::To,
                ..Default::default()
            },
            Appearance {
                block_number: 7,
                transaction_index: 0,
                reason: Reason::From,
                ..Default::default()
            },
            Appearance {
                block_number: 2,
                transaction_index: 9,
                reason: Reason::Miner,
                ..Default::default()
            },
        ];
        apps.sort_by_key(|a| a.sort_key());
        let keys: Vec<_> = apps
            .iter()
            .map(|a| (a.block_number, a.transaction_index, a.reason))
            .collect();
        assert_eq!(
            keys,
            vec![
                (2, 9, Reason::Miner),
                (7, 0, Reason::From),
                (7, 0, Reason::To),
                (7, 1, Reason::To),
            ]
        );
    }

    #[test]
    fn block_range_bounds() {
        let range = BlockRange::new(100, 199).unwrap();
        assert!(range.contains(100));
        assert!(range.contains(199));
        assert!(!range.contains(200));
        assert!(range.intersection_exists(&BlockRange::new(199, 300).unwrap()));
        assert!(!range.intersection_exists(&BlockRange::new(200, 300).unwrap()));
        assert!(BlockRange::new(200, 100).is_err());
    }
}
