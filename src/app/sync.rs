use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tokio::time::{self, MissedTickBehavior};

use crate::records::Record;
use crate::services::{RecordStore, StoreEvent};
use crate::snapshot::Snapshot;

use super::errors::AppError;

/// Poll cadence for the two reconciliation polls.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub new_records_interval: Duration,
    pub enrichment_interval: Duration,
}

/// The reconciliation loop.
///
/// Three producers feed one snapshot: the realtime channel, the new-records
/// poll and the pending-enrichment poll. Each producer only ever performs an
/// idempotent insert or a non-erasing merge, so no producer needs to win —
/// correctness holds under any interleaving. The new-records poll is gated
/// on the foreground flag (no point polling a backgrounded vault); the
/// pending poll targets whatever the snapshot currently derives as pending,
/// which is how deleted records drop out of its worklist.
pub struct SyncEngine {
    owner: String,
    store: Arc<dyn RecordStore>,
    snapshot: Snapshot,
    foreground: watch::Receiver<bool>,
    shutdown: watch::Receiver<bool>,
    opts: SyncOptions,
    watermark: Option<DateTime<Utc>>,
}

impl SyncEngine {
    pub fn new(
        owner: &str,
        store: Arc<dyn RecordStore>,
        snapshot: Snapshot,
        foreground: watch::Receiver<bool>,
        shutdown: watch::Receiver<bool>,
        opts: SyncOptions,
    ) -> Self {
        Self {
            owner: owner.to_string(),
            store,
            snapshot,
            foreground,
            shutdown,
            opts,
            watermark: None,
        }
    }

    /// Bulk-load the snapshot, then run until shut down. Only the initial
    /// load can fail; once the loop is running, dependency errors are
    /// logged and retried on the next cycle, never raised.
    pub async fn run(mut self) -> Result<(), AppError> {
        let rows = self.store.select_all(&self.owner).await?;
        let added = self.snapshot.insert_all(rows);
        self.watermark = self.snapshot.latest_created_at();
        log::info!("loaded {added} records");

        let mut events = self.store.subscribe(&self.owner);
        let mut realtime_open = true;

        let mut new_tick = time::interval_at(
            time::Instant::now() + self.opts.new_records_interval,
            self.opts.new_records_interval,
        );
        new_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut pending_tick = time::interval_at(
            time::Instant::now() + self.opts.enrichment_interval,
            self.opts.enrichment_interval,
        );
        pending_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut shutdown = self.shutdown.clone();

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                event = events.recv(), if realtime_open => match event {
                    Ok(StoreEvent::Inserted(record)) => self.on_remote_insert(record),
                    Ok(StoreEvent::Updated(record)) => self.on_remote_update(record),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        log::warn!("realtime channel lagged, {missed} events dropped; polls will reconcile");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        log::warn!("realtime channel closed, continuing on polls only");
                        realtime_open = false;
                    }
                },
                _ = new_tick.tick() => {
                    if *self.foreground.borrow() {
                        self.poll_new_records().await;
                    }
                }
                _ = pending_tick.tick() => self.poll_pending().await,
            }
        }

        log::debug!("reconciliation loop stopped");
        Ok(())
    }

    fn on_remote_insert(&self, record: Record) {
        if record.owner != self.owner {
            return;
        }
        // a poll may already have delivered this row; insert is idempotent
        if self.snapshot.insert(record) {
            log::debug!("realtime insert applied");
        }
    }

    fn on_remote_update(&self, record: Record) {
        if record.owner != self.owner {
            return;
        }
        // merge only; an update for a record the user deleted must not
        // resurrect it
        self.snapshot.merge(&record.id, &record);
    }

    /// Fetch rows created after the watermark. Realtime inserts do not
    /// advance the watermark — only poll batches and the initial load do,
    /// so a push that outruns the poll cannot open a gap.
    async fn poll_new_records(&mut self) {
        let after = self.watermark.unwrap_or(DateTime::<Utc>::MIN_UTC);

        let rows = match self.store.select_created_after(&self.owner, after).await {
            Ok(rows) => rows,
            Err(err) => {
                log::warn!("new-records poll failed: {err}");
                return;
            }
        };
        if rows.is_empty() {
            return;
        }

        if let Some(latest) = rows.iter().map(|r| r.created_at).max() {
            self.watermark = Some(self.watermark.map_or(latest, |w| w.max(latest)));
        }

        let added = self.snapshot.insert_all(rows);
        if added > 0 {
            log::debug!("new-records poll added {added} records");
        }
    }

    /// Re-fetch every still-pending record and merge whatever the store now
    /// has. Records enriched server-side transition out of pending here.
    async fn poll_pending(&self) {
        for id in self.snapshot.pending_ids() {
            match self.store.fetch(&id).await {
                Ok(Some(row)) => {
                    self.snapshot.merge(&id, &row);
                }
                Ok(None) => {
                    log::debug!("pending record {id} no longer in store");
                }
                Err(err) => {
                    log::warn!("pending-enrichment poll failed: {err}");
                    return;
                }
            }
        }
    }
}
