//! The abstract RPC capability the query engine fetches through.
//!
//! Concrete clients (HTTP, IPC, test stubs) live outside the library;
//! handlers only depend on this trait. Implementations translate their
//! transport errors into [`UnchainedError::Rpc`] and report missing
//! blocks, receipts or uncles as [`UnchainedError::NotFound`].
use async_trait::async_trait;
use web3::types::{Address, U256};

use crate::{
    errors::Result,
    types::{BlockHeader, Log, Receipt, Trace},
};

#[async_trait]
pub trait Connection: Send + Sync {
    /// The tip of the chain as the node currently sees it.
    async fn latest_block_number(&self) -> Result<u64>;

    /// The holder's balance as of the given block.
    async fn get_balance_at(&self, address: Address, block_number: u32) -> Result<U256>;

    async fn get_block_header(&self, block_number: u32) -> Result<BlockHeader>;

    async fn get_receipt(&self, block_number: u32, transaction_index: u32) -> Result<Receipt>;

    async fn get_logs(&self, block_number: u32, transaction_index: u32) -> Result<Vec<Log>>;

    async fn get_traces(&self, block_number: u32, transaction_index: u32) -> Result<Vec<Trace>>;

    /// Executes a read-only contract call. `block_number` of `None` means
    /// the latest block.
    async fn call(
        &self,
        to: Address,
        data: Vec<u8>,
        block_number: Option<u32>,
    ) -> Result<Vec<u8>>;
}
