//! The `blocks` command family: fetch per-block data for a set of block
//! identifiers.
use std::io::Write;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    connection::Connection,
    errors::{Result, UnchainedError},
    identifiers::{appearance_map_from_ids, BlockId},
    iterate::{iterate_with_policy, AppearanceFetcher, AppearanceMap},
    output::{self, OutputOptions},
    types::{Appearance, BlockHeader},
};

pub struct BlocksOptions<'a, C: Connection> {
    pub conn: &'a C,
    pub block_ids: Vec<BlockId>,
    pub test_mode: bool,
    pub workers: usize,
    pub output: OutputOptions,
}

struct HeaderFetcher<'a, C> {
    conn: &'a C,
    error_tx: mpsc::UnboundedSender<UnchainedError>,
}

#[async_trait]
impl<'a, C: Connection> AppearanceFetcher<Option<BlockHeader>> for HeaderFetcher<'a, C> {
    async fn fetch_one(&self, app: &Appearance, value: &mut Option<BlockHeader>) -> Result<()> {
        match self.conn.get_block_header(app.block_number).await {
            Ok(header) => {
                *value = Some(header);
                Ok(())
            }
            // A block the node has never heard of has no uncles either;
            // report and keep going so the remaining blocks still stream.
            Err(e) if e.is_not_found() => {
                let _ = self.error_tx.send(UnchainedError::NotFound("uncles".to_string()));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl<'a, C: Connection> BlocksOptions<'a, C> {
    /// Fetches the header of every identified block concurrently and
    /// streams them in ascending block order.
    pub async fn handle_hashes<W: Write>(&self, ctx: CancellationToken, w: &mut W) -> Result<()> {
        let options = self.output.clone();
        let parent = ctx.clone();
        output::stream_many(
            ctx,
            w,
            |model_tx, error_tx| async move {
                let map: AppearanceMap<Option<BlockHeader>> =
                    match appearance_map_from_ids(&self.block_ids) {
                        Ok(map) => map,
                        Err(e) => {
                            let _ = error_tx.send(e);
                            parent.cancel();
                            return;
                        }
                    };

                let fetcher = HeaderFetcher {
                    conn: self.conn,
                    error_tx: error_tx.clone(),
                };
                iterate_with_policy(
                    &parent,
                    &error_tx,
                    &map,
                    self.workers,
                    &fetcher,
                    self.test_mode,
                )
                .await;

                for (_, header) in map.into_sorted_values(false) {
                    let Some(header) = header else { continue };
                    if model_tx.send(header).await.is_err() {
                        return;
                    }
                }
            },
            options,
        )
        .await
    }
}
