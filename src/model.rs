//! Projection of entity types into streamable models.
//!
//! A [`Model`] is an ordered bag of named JSON values. Every entity the
//! engine can stream projects itself through [`Modeler::model`]; the
//! streaming output renders the projection without knowing the entity.
use serde_json::{json, Map, Value};
use web3::types::Address;

use crate::{
    chunk::structure::AddressRecord,
    types::{Appearance, BlockHeader, Log, Message, Receipt, Token, Trace},
};

/// Extra key/value context a command can thread through to its models.
pub type Extras = Map<String, Value>;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Model {
    pub data: Map<String, Value>,
    /// Key order for delimited and templated output.
    pub order: Vec<String>,
}

impl Model {
    fn from_pairs(pairs: Vec<(&str, Value)>) -> Self {
        let mut data = Map::new();
        let mut order = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            order.push(key.to_string());
            data.insert(key.to_string(), value);
        }
        Model { data, order }
    }
}

pub trait Modeler: Send {
    /// Projects the entity for the given chain and output format.
    /// `verbose` admits optional fields; `extras` carries command context.
    fn model(&self, chain: &str, format: &str, verbose: bool, extras: &Extras) -> Model;

    /// The raw, pre-modeled record, when one exists.
    fn raw(&self) -> Option<Value> {
        None
    }
}

/// EIP-55 checksummed display form of an address.
pub fn checksummed(address: &Address) -> String {
    eip55::checksum(&format!("0x{}", hex::encode(address.as_bytes())))
}

impl Modeler for Appearance {
    fn model(&self, _chain: &str, _format: &str, verbose: bool, _extras: &Extras) -> Model {
        let mut pairs = vec![
            ("address", json!(checksummed(&self.address))),
            ("blockNumber", json!(self.block_number)),
            ("transactionIndex", json!(self.transaction_index)),
            ("reason", json!(self.reason.as_str())),
        ];
        if verbose {
            pairs.push(("timestamp", json!(self.timestamp)));
        }
        Model::from_pairs(pairs)
    }

    fn raw(&self) -> Option<Value> {
        serde_json::to_value(self).ok()
    }
}

impl Modeler for AddressRecord {
    fn model(&self, _chain: &str, _format: &str, _verbose: bool, _extras: &Extras) -> Model {
        Model::from_pairs(vec![
            ("address", json!(checksummed(&self.address))),
            ("offset", json!(self.offset)),
            ("count", json!(self.count)),
        ])
    }
}

impl Modeler for Token {
    fn model(&self, _chain: &str, _format: &str, verbose: bool, _extras: &Extras) -> Model {
        let mut pairs = vec![
            ("holder", json!(checksummed(&self.holder))),
            ("address", json!(checksummed(&self.address))),
            ("blockNumber", json!(self.block_number)),
            ("transactionIndex", json!(self.transaction_index)),
            ("balance", json!(self.balance.to_string())),
        ];
        if verbose {
            pairs.push(("timestamp", json!(self.timestamp)));
        }
        Model::from_pairs(pairs)
    }

    fn raw(&self) -> Option<Value> {
        serde_json::to_value(self).ok()
    }
}

impl Modeler for BlockHeader {
    fn model(&self, _chain: &str, _format: &str, verbose: bool, _extras: &Extras) -> Model {
        let mut pairs = vec![
            ("blockNumber", json!(self.block_number)),
            ("hash", json!(format!("{:#x}", self.hash))),
        ];
        if verbose {
            pairs.push(("parentHash", json!(format!("{:#x}", self.parent_hash))));
            pairs.push(("miner", json!(checksummed(&self.miner))));
        }
        pairs.push(("timestamp", json!(self.timestamp)));
        Model::from_pairs(pairs)
    }

    fn raw(&self) -> Option<Value> {
        serde_json::to_value(self).ok()
    }
}

impl Modeler for Receipt {
    fn model(&self, _chain: &str, _format: &str, verbose: bool, _extras: &Extras) -> Model {
        let mut pairs = vec![
            ("blockNumber", json!(self.block_number)),
            ("transactionIndex", json!(self.transaction_index)),
            ("transactionHash", json!(format!("{:#x}", self.transaction_hash))),
            ("status", json!(self.status)),
            ("gasUsed", json!(self.gas_used)),
        ];
        if verbose {
            pairs.push((
                "contractAddress",
                match &self.contract_address {
                    Some(address) => json!(checksummed(address)),
                    None => Value::Null,
                },
            ));
            pairs.push(("logCount", json!(self.logs.len())));
        }
        Model::from_pairs(pairs)
    }

    fn raw(&self) -> Option<Value> {
        serde_json::to_value(self).ok()
    }
}

impl Modeler for Log {
    fn model(&self, _chain: &str, _format: &str, verbose: bool, _extras: &Extras) -> Model {
        let topics: Vec<String> = self.topics.iter().map(|t| format!("{:#x}", t)).collect();
        let mut pairs = vec![
            ("blockNumber", json!(self.block_number)),
            ("transactionIndex", json!(self.transaction_index)),
            ("logIndex", json!(self.log_index)),
            ("address", json!(checksummed(&self.address))),
            ("topics", json!(topics)),
        ];
        if verbose {
            pairs.push(("data", json!(format!("0x{}", hex::encode(&self.data)))));
        }
        Model::from_pairs(pairs)
    }

    fn raw(&self) -> Option<Value> {
        serde_json::to_value(self).ok()
    }
}

impl Modeler for Trace {
    fn model(&self, _chain: &str, _format: &str, _verbose: bool, _extras: &Extras) -> Model {
        let trace_address: Vec<String> =
            self.trace_address.iter().map(|t| t.to_string()).collect();
        Model::from_pairs(vec![
            ("blockNumber", json!(self.block_number)),
            ("transactionIndex", json!(self.transaction_index)),
            ("traceAddress", json!(trace_address.join("-"))),
            ("kind", json!(self.kind)),
            ("from", json!(checksummed(&self.from))),
            ("to", json!(checksummed(&self.to))),
            ("value", json!(self.value.to_string())),
        ])
    }

    fn raw(&self) -> Option<Value> {
        serde_json::to_value(self).ok()
    }
}

impl Modeler for Message {
    fn model(&self, _chain: &str, _format: &str, _verbose: bool, _extras: &Extras) -> Model {
        Model::from_pairs(vec![("msg", json!(self.msg))])
    }
}

/// The two row shapes a `chunks --belongs` scan emits: an address record
/// followed by that address's appearances.
pub enum BelongsRow {
    Address(AddressRecord),
    Appearance(Appearance),
}

impl Modeler for BelongsRow {
    fn model(&self, chain: &str, format: &str, verbose: bool, extras: &Extras) -> Model {
        match self {
            BelongsRow::Address(record) => record.model(chain, format, verbose, extras),
            BelongsRow::Appearance(app) => app.model(chain, format, verbose, extras),
        }
    }
}
