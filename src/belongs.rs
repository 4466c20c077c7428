//! The `chunks --belongs` scan: which of the given addresses does each
//! chunk hold, and with which appearances.
use std::io::Write;

use tokio_util::sync::CancellationToken;
use web3::types::Address;

use crate::{
    chunk::read::ChunkData,
    config::{ChainSpec, IndexDirs},
    constants::MAX_TEST_ITEMS,
    errors::Result,
    manifest::Manifest,
    model::BelongsRow,
    output::{self, OutputOptions},
    walk::{Resource, Walker},
};

pub struct BelongsOptions<'a> {
    pub dirs: &'a IndexDirs,
    /// When present, every visited chunk's header hash is verified.
    pub chain_spec: Option<&'a ChainSpec>,
    /// When present, chunks absent from the manifest are refused.
    pub manifest: Option<&'a Manifest>,
    pub addrs: Vec<Address>,
    pub test_mode: bool,
    pub output: OutputOptions,
}

impl<'a> BelongsOptions<'a> {
    /// Walks the chunks covering `block_numbers` (all chunks when empty)
    /// and streams, for each matching address, the address record followed
    /// by its appearances, in table order.
    pub async fn handle_index_belongs<W: Write>(
        &self,
        ctx: CancellationToken,
        w: &mut W,
        block_numbers: &[u32],
    ) -> Result<()> {
        let options = self.output.clone();
        let parent = ctx.clone();
        output::stream_many(
            ctx,
            w,
            |model_tx, error_tx| async move {
                let rows = match self.collect_rows(block_numbers) {
                    Ok(rows) => rows,
                    Err(e) => {
                        let _ = error_tx.send(e);
                        parent.cancel();
                        return;
                    }
                };
                for row in rows {
                    if model_tx.send(row).await.is_err() {
                        return;
                    }
                }
            },
            options,
        )
        .await
    }

    fn collect_rows(&self, block_numbers: &[u32]) -> Result<Vec<BelongsRow>> {
        let walker = Walker {
            dirs: self.dirs,
            manifest: self.manifest,
            strict: false,
        };
        let mut rows: Vec<BelongsRow> = vec![];
        walker.walk(Resource::Index, block_numbers, &self.addrs, |path, _first| {
            let mut chunk = ChunkData::open(path)?;
            if let Some(spec) = self.chain_spec {
                chunk.verify(spec)?;
            }
            let mut shown = 0usize;
            let addrs = &self.addrs;
            let test_mode = self.test_mode;
            chunk.scan_addresses(
                |record| addrs.contains(&record.address),
                |record, apps| {
                    if test_mode && shown >= MAX_TEST_ITEMS {
                        return Ok(true);
                    }
                    rows.push(BelongsRow::Address(*record));
                    for app in apps {
                        rows.push(BelongsRow::Appearance(app.materialize(record.address)));
                    }
                    shown += 1;
                    Ok(true)
                },
            )?;
            Ok(true)
        })?;
        Ok(rows)
    }
}
