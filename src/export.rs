//! The `export` and `list` command family: per-appearance history for a
//! monitored address.
use std::io::Write;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use web3::types::Address;

use crate::{
    connection::Connection,
    constants::FAKE_ETH_ADDRESS,
    errors::{Result, UnchainedError},
    filter::AppearanceFilter,
    iterate::{iterate_with_policy, AppearanceFetcher, AppearanceMap},
    monitor::Monitor,
    output::{self, OutputOptions},
    types::{Appearance, Log, Receipt, Token, Trace},
};

pub struct ExportOptions<'a, C: Connection> {
    pub conn: &'a C,
    pub filter: AppearanceFilter,
    /// Treat an empty (post-filter) appearance list as an error.
    pub no_zero: bool,
    pub test_mode: bool,
    pub workers: usize,
    pub output: OutputOptions,
}

struct BalanceFetcher<'a, C> {
    conn: &'a C,
    holder: Address,
}

#[async_trait]
impl<'a, C: Connection> AppearanceFetcher<Token> for BalanceFetcher<'a, C> {
    async fn fetch_one(&self, app: &Appearance, value: &mut Token) -> Result<()> {
        let balance = self.conn.get_balance_at(self.holder, app.block_number).await?;
        value.address = FAKE_ETH_ADDRESS;
        value.holder = self.holder;
        value.block_number = app.block_number;
        value.transaction_index = app.transaction_index;
        value.balance = balance;
        value.timestamp = app.timestamp;
        Ok(())
    }
}

struct ReceiptFetcher<'a, C> {
    conn: &'a C,
}

#[async_trait]
impl<'a, C: Connection> AppearanceFetcher<Receipt> for ReceiptFetcher<'a, C> {
    async fn fetch_one(&self, app: &Appearance, value: &mut Receipt) -> Result<()> {
        *value = self
            .conn
            .get_receipt(app.block_number, app.transaction_index)
            .await?;
        Ok(())
    }
}

struct LogsFetcher<'a, C> {
    conn: &'a C,
}

#[async_trait]
impl<'a, C: Connection> AppearanceFetcher<Vec<Log>> for LogsFetcher<'a, C> {
    async fn fetch_one(&self, app: &Appearance, value: &mut Vec<Log>) -> Result<()> {
        *value = self
            .conn
            .get_logs(app.block_number, app.transaction_index)
            .await?;
        Ok(())
    }
}

struct TracesFetcher<'a, C> {
    conn: &'a C,
}

#[async_trait]
impl<'a, C: Connection> AppearanceFetcher<Vec<Trace>> for TracesFetcher<'a, C> {
    async fn fetch_one(&self, app: &Appearance, value: &mut Vec<Trace>) -> Result<()> {
        *value = self
            .conn
            .get_traces(app.block_number, app.transaction_index)
            .await?;
        Ok(())
    }
}

impl<'a, C: Connection> ExportOptions<'a, C> {
    /// Traverses the monitor's history and reads the holder's balance at
    /// every appearance. Rows come back in the documented order, reverse
    /// chronological when the filter is reversed.
    pub async fn read_balances(
        &self,
        ctx: &CancellationToken,
        mon: &Monitor,
        error_tx: &mpsc::UnboundedSender<UnchainedError>,
    ) -> Result<Vec<Token>> {
        let map: AppearanceMap<Token> = match mon.as_map(&self.filter, self.no_zero) {
            Ok(map) => map,
            Err(e) if e.is_not_found() => {
                let _ = error_tx.send(e);
                return Ok(vec![]);
            }
            Err(e) => return Err(e),
        };
        let fetcher = BalanceFetcher {
            conn: self.conn,
            holder: mon.address,
        };
        iterate_with_policy(ctx, error_tx, &map, self.workers, &fetcher, self.test_mode).await;
        Ok(self.values_of(map))
    }

    pub async fn read_receipts(
        &self,
        ctx: &CancellationToken,
        mon: &Monitor,
        error_tx: &mpsc::UnboundedSender<UnchainedError>,
    ) -> Result<Vec<Receipt>> {
        let map: AppearanceMap<Receipt> = match mon.as_map(&self.filter, self.no_zero) {
            Ok(map) => map,
            Err(e) if e.is_not_found() => {
                let _ = error_tx.send(e);
                return Ok(vec![]);
            }
            Err(e) => return Err(e),
        };
        let fetcher = ReceiptFetcher { conn: self.conn };
        iterate_with_policy(ctx, error_tx, &map, self.workers, &fetcher, self.test_mode).await;
        Ok(self.values_of(map))
    }

    pub async fn read_logs(
        &self,
        ctx: &CancellationToken,
        mon: &Monitor,
        error_tx: &mpsc::UnboundedSender<UnchainedError>,
    ) -> Result<Vec<Log>> {
        let map: AppearanceMap<Vec<Log>> = match mon.as_map(&self.filter, self.no_zero) {
            Ok(map) => map,
            Err(e) if e.is_not_found() => {
                let _ = error_tx.send(e);
                return Ok(vec![]);
            }
            Err(e) => return Err(e),
        };
        let fetcher = LogsFetcher { conn: self.conn };
        iterate_with_policy(ctx, error_tx, &map, self.workers, &fetcher, self.test_mode).await;
        let mut logs = vec![];
        for per_appearance in self.values_of(map) {
            logs.extend(per_appearance);
        }
        Ok(logs)
    }

    pub async fn read_traces(
        &self,
        ctx: &CancellationToken,
        mon: &Monitor,
        error_tx: &mpsc::UnboundedSender<UnchainedError>,
    ) -> Result<Vec<Trace>> {
        let map: AppearanceMap<Vec<Trace>> = match mon.as_map(&self.filter, self.no_zero) {
            Ok(map) => map,
            Err(e) if e.is_not_found() => {
                let _ = error_tx.send(e);
                return Ok(vec![]);
            }
            Err(e) => return Err(e),
        };
        let fetcher = TracesFetcher { conn: self.conn };
        iterate_with_policy(ctx, error_tx, &map, self.workers, &fetcher, self.test_mode).await;
        let mut traces = vec![];
        for per_appearance in self.values_of(map) {
            traces.extend(per_appearance);
        }
        Ok(traces)
    }

    /// The filtered appearance list itself, without any per-appearance
    /// fetches.
    pub fn read_appearances(&self, mon: &Monitor) -> Result<Vec<Appearance>> {
        let map: AppearanceMap<()> = mon.as_map(&self.filter, self.no_zero)?;
        Ok(map
            .into_sorted_values(self.filter.reversed)
            .into_iter()
            .map(|(app, _)| app)
            .collect())
    }

    pub async fn handle_balances<W: Write>(
        &self,
        ctx: CancellationToken,
        w: &mut W,
        mon: &Monitor,
    ) -> Result<()> {
        let options = self.output.clone();
        let parent = ctx.clone();
        output::stream_many(
            ctx,
            w,
            |model_tx, error_tx| async move {
                match self.read_balances(&parent, mon, &error_tx).await {
                    Ok(items) => {
                        for item in items {
                            if model_tx.send(item).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = error_tx.send(e);
                        parent.cancel();
                    }
                }
            },
            options,
        )
        .await
    }

    pub async fn handle_receipts<W: Write>(
        &self,
        ctx: CancellationToken,
        w: &mut W,
        mon: &Monitor,
    ) -> Result<()> {
        let options = self.output.clone();
        let parent = ctx.clone();
        output::stream_many(
            ctx,
            w,
            |model_tx, error_tx| async move {
                match self.read_receipts(&parent, mon, &error_tx).await {
                    Ok(items) => {
                        for item in items {
                            if model_tx.send(item).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = error_tx.send(e);
                        parent.cancel();
                    }
                }
            },
            options,
        )
        .await
    }

    pub async fn handle_logs<W: Write>(
        &self,
        ctx: CancellationToken,
        w: &mut W,
        mon: &Monitor,
    ) -> Result<()> {
        let options = self.output.clone();
        let parent = ctx.clone();
        output::stream_many(
            ctx,
            w,
            |model_tx, error_tx| async move {
                match self.read_logs(&parent, mon, &error_tx).await {
                    Ok(items) => {
                        for item in items {
                            if model_tx.send(item).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = error_tx.send(e);
                        parent.cancel();
                    }
                }
            },
            options,
        )
        .await
    }

    /// Streams the bare appearance list.
    pub async fn handle_appearances<W: Write>(
        &self,
        ctx: CancellationToken,
        w: &mut W,
        mon: &Monitor,
    ) -> Result<()> {
        let options = self.output.clone();
        let parent = ctx.clone();
        output::stream_many(
            ctx,
            w,
            |model_tx, error_tx| async move {
                match self.read_appearances(mon) {
                    Ok(items) => {
                        for item in items {
                            if model_tx.send(item).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        let hard_failure = !e.is_not_found();
                        let _ = error_tx.send(e);
                        if hard_failure {
                            parent.cancel();
                        }
                    }
                }
            },
            options,
        )
        .await
    }

    fn values_of<V>(&self, map: AppearanceMap<V>) -> Vec<V> {
        map.into_sorted_values(self.filter.reversed)
            .into_iter()
            .map(|(_, value)| value)
            .collect()
    }
}
