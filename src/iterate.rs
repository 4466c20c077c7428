//! The ordered appearance map and the concurrent iterator over it.
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::{
    errors::{Result, UnchainedError},
    types::Appearance,
};

/// An ordered mapping from appearance to a mutable value slot.
///
/// Built once from a query, filled in concurrently, then consumed by
/// [`AppearanceMap::into_sorted_values`]. Slots are partitioned one per key,
/// so concurrent workers never alias.
#[derive(Debug)]
pub struct AppearanceMap<V> {
    entries: Vec<MapEntry<V>>,
}

#[derive(Debug)]
pub struct MapEntry<V> {
    pub appearance: Appearance,
    pub slot: Mutex<V>,
}

impl<V: Default> AppearanceMap<V> {
    /// Sorts the appearances into the documented order and allocates a
    /// default value slot for each. Exact duplicates collapse to one entry.
    pub fn new(mut apps: Vec<Appearance>) -> Self {
        apps.sort_by_key(|app| app.identity_key());
        apps.dedup_by_key(|app| app.identity_key());
        apps.sort_by_key(|app| app.sort_key());
        let entries = apps
            .into_iter()
            .map(|appearance| MapEntry {
                appearance,
                slot: Mutex::new(V::default()),
            })
            .collect();
        AppearanceMap { entries }
    }
}

impl<V> AppearanceMap<V> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn appearances(&self) -> Vec<Appearance> {
        self.entries.iter().map(|e| e.appearance).collect()
    }

    pub fn entries(&self) -> &[MapEntry<V>] {
        &self.entries
    }

    /// Consumes the map, returning the filled values in the documented
    /// order (reversed when requested).
    pub fn into_sorted_values(self, reversed: bool) -> Vec<(Appearance, V)> {
        let mut values: Vec<(Appearance, V)> = self
            .entries
            .into_iter()
            .map(|entry| (entry.appearance, entry.slot.into_inner()))
            .collect();
        if reversed {
            values.reverse();
        }
        values
    }
}

/// The per-appearance fetch capability supplied by each subcommand.
///
/// Implementations typically hold a connection reference and write RPC
/// results into the value slot.
#[async_trait]
pub trait AppearanceFetcher<V>: Sync
where
    V: Send,
{
    async fn fetch_one(&self, app: &Appearance, value: &mut V) -> Result<()>;
}

/// Fans the map's entries out across `workers` concurrent fetches.
///
/// Errors are sent on `error_tx` in arrival order; a failed fetch does not
/// stop the others. Once `ctx` is cancelled no new work is dispatched and
/// in-flight fetches drain. The error channel closes when this function
/// returns and drops the sender, which is how callers detect completion.
///
/// First-error policies are deliberately not enforced here: a caller that
/// wants exactly one error cancels `ctx` when it sees the first one.
pub async fn iterate_over_map<V, F>(
    ctx: &CancellationToken,
    error_tx: mpsc::UnboundedSender<UnchainedError>,
    map: &AppearanceMap<V>,
    workers: usize,
    fetcher: &F,
) where
    V: Send,
    F: AppearanceFetcher<V> + ?Sized,
{
    stream::iter(map.entries())
        .for_each_concurrent(workers.max(1), |entry| {
            let error_tx = &error_tx;
            async move {
                if ctx.is_cancelled() {
                    return;
                }
                let mut slot = entry.slot.lock().await;
                if let Err(e) = fetcher.fetch_one(&entry.appearance, &mut slot).await {
                    let _ = error_tx.send(e);
                }
            }
        })
        .await;
}

/// Runs the iterator and forwards its errors under the caller's policy.
///
/// In test mode only the first error is forwarded and the iteration's own
/// child context is cancelled, so exactly one error is reported
/// deterministically. The parent context is never cancelled here; a local
/// cancel must not kill the consumer's trailing flush.
pub async fn iterate_with_policy<V, F>(
    parent: &CancellationToken,
    error_tx: &mpsc::UnboundedSender<UnchainedError>,
    map: &AppearanceMap<V>,
    workers: usize,
    fetcher: &F,
    test_mode: bool,
) where
    V: Send,
    F: AppearanceFetcher<V>,
{
    let iter_ctx = parent.child_token();
    let (iter_tx, mut iter_rx) = mpsc::unbounded_channel();
    let iterate = iterate_over_map(&iter_ctx, iter_tx, map, workers, fetcher);
    let forward = async {
        let mut n_errors = 0usize;
        while let Some(err) = iter_rx.recv().await {
            if !test_mode || n_errors == 0 {
                let _ = error_tx.send(err);
            }
            if test_mode && n_errors == 0 {
                iter_ctx.cancel();
            }
            n_errors += 1;
        }
    };
    tokio::join!(iterate, forward);
}
