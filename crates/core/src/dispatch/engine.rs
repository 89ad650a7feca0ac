//! One dispatch cycle: fetch due items, deliver, commit.
//!
//! Items are delivered sequentially in `fire_at` order. Only items whose
//! primary send succeeded are committed, first into the delivery ledger and
//! then through the kind's terminal mutation (done flag or delete). Items
//! the ledger already knows are completed without being sent again, which
//! repairs a crash between the ledger write and the terminal mutation.

use std::collections::HashSet;
use std::sync::Arc;

use herald_domain::{
    Completion, DedupeKey, DeliveryError, Destination, DueItem, DueItemId, ItemKind, Result,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::ports::{DeliveryLedger, DeliverySink, DueItemRepository};
use crate::clock::Clock;

/// Counters describing one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Rows returned by the repository.
    pub fetched: usize,
    /// Successful primary deliveries.
    pub delivered: usize,
    /// Deliveries that failed and stay pending.
    pub failed: usize,
    /// Items already in the ledger, completed without a send.
    pub skipped: usize,
    /// Items whose terminal mutation changed storage.
    pub committed: usize,
    /// Commit steps that failed (ledger write or terminal mutation).
    pub commit_errors: usize,
    /// Stop was requested before or during the cycle.
    pub interrupted: bool,
}

/// Delivers due items of one kind.
pub struct DispatchEngine {
    repository: Arc<dyn DueItemRepository>,
    ledger: Arc<dyn DeliveryLedger>,
    sink: Arc<dyn DeliverySink>,
    clock: Arc<dyn Clock>,
    batch_limit: Option<usize>,
    broadcast: Option<Destination>,
}

impl DispatchEngine {
    pub fn new(
        repository: Arc<dyn DueItemRepository>,
        ledger: Arc<dyn DeliveryLedger>,
        sink: Arc<dyn DeliverySink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { repository, ledger, sink, clock, batch_limit: None, broadcast: None }
    }

    /// Cap the number of deliveries per cycle. Failed attempts do not count.
    #[must_use]
    pub const fn with_batch_limit(mut self, limit: Option<usize>) -> Self {
        self.batch_limit = limit;
        self
    }

    /// Secondary destination that receives a copy of every alarm.
    #[must_use]
    pub const fn with_broadcast(mut self, destination: Option<Destination>) -> Self {
        self.broadcast = destination;
        self
    }

    pub fn kind(&self) -> ItemKind {
        self.repository.kind()
    }

    /// Run one cycle.
    ///
    /// With a batch limit the due set is read in windows of `limit` rows,
    /// widened by the items already attempted in this cycle, until `limit`
    /// items were delivered or the due set is exhausted. Items that keep
    /// failing therefore never hold back the ones queued behind them.
    ///
    /// Returns `Err` only when the due set cannot be read. Delivery and
    /// commit problems are logged and counted in the report.
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<CycleReport> {
        let kind = self.kind();
        let mut report = CycleReport::default();

        if cancel.is_cancelled() {
            report.interrupted = true;
            return Ok(report);
        }

        let now = self.clock.now();
        let mut seen: HashSet<DedupeKey> = HashSet::new();

        loop {
            let window = self.batch_limit.map(|limit| limit.saturating_add(seen.len()));
            let page = self.repository.list_due(now, window).await?;
            let page_len = page.len();

            let mut due: Vec<DueItem> =
                page.into_iter().filter(|item| !seen.contains(&item.dedupe_key())).collect();
            report.fetched += due.len();
            due.retain(|item| item.is_due(now));
            if due.is_empty() {
                break;
            }
            due.sort_by_key(DueItem::fire_at);

            self.dispatch_page(kind, due, &mut seen, cancel, &mut report).await?;

            let exhausted = window.map_or(true, |w| page_len < w);
            if report.interrupted || exhausted || self.budget_spent(&report) {
                break;
            }
        }

        if report.fetched == 0 {
            debug!(kind = %kind, "No due items");
        }

        if report.delivered > 0 || report.failed > 0 {
            info!(
                kind = %kind,
                delivered = report.delivered,
                failed = report.failed,
                skipped = report.skipped,
                committed = report.committed,
                "Dispatch cycle finished"
            );
        }

        Ok(report)
    }

    fn budget_spent(&self, report: &CycleReport) -> bool {
        self.batch_limit.is_some_and(|limit| report.delivered >= limit)
    }

    /// Deliver and commit one window of due items, earliest first.
    async fn dispatch_page(
        &self,
        kind: ItemKind,
        due: Vec<DueItem>,
        seen: &mut HashSet<DedupeKey>,
        cancel: &CancellationToken,
        report: &mut CycleReport,
    ) -> Result<()> {
        let keys: Vec<DedupeKey> = due.iter().map(DueItem::dedupe_key).collect();
        let already_delivered = self.ledger.delivered_among(&keys).await?;

        debug!(kind = %kind, count = due.len(), "Dispatching due items");

        let mut completed: Vec<DueItem> = Vec::new();
        let mut delivered_keys: Vec<DedupeKey> = Vec::new();

        for (item, key) in due.into_iter().zip(keys) {
            if already_delivered.contains(&key) {
                debug!(
                    kind = %kind,
                    item_id = %item.id(),
                    dedupe_key = %key,
                    "Item already in ledger; completing without resend"
                );
                report.skipped += 1;
                seen.insert(key);
                completed.push(item);
                continue;
            }

            if cancel.is_cancelled() {
                debug!(kind = %kind, "Stop requested; leaving remaining items pending");
                report.interrupted = true;
                break;
            }

            if self.budget_spent(report) {
                break;
            }

            seen.insert(key.clone());
            match self.deliver(&item).await {
                Ok(()) => {
                    debug!(kind = %kind, item_id = %item.id(), "Delivered");
                    report.delivered += 1;
                    delivered_keys.push(key);
                    completed.push(item);
                }
                Err(err) => {
                    warn!(
                        kind = %kind,
                        item_id = %item.id(),
                        destination = %item.destination(),
                        error = %err,
                        "Delivery failed; item stays pending"
                    );
                    report.failed += 1;
                }
            }
        }

        if !completed.is_empty() {
            self.commit(kind, &delivered_keys, &completed, report).await;
        }

        Ok(())
    }

    async fn deliver(&self, item: &DueItem) -> std::result::Result<(), DeliveryError> {
        let text = item.text();
        let format = item.format();
        self.sink.send_formatted(item.destination(), text, item.silent(), format).await?;

        if item.kind() == ItemKind::Alarm {
            if let Some(channel) = self.broadcast.filter(|c| *c != item.destination()) {
                if let Err(err) = self.sink.send_formatted(channel, text, false, format).await {
                    warn!(
                        item_id = %item.id(),
                        channel = %channel,
                        error = %err,
                        "Alarm broadcast failed"
                    );
                }
            }
        }

        Ok(())
    }

    async fn commit(
        &self,
        kind: ItemKind,
        delivered_keys: &[DedupeKey],
        completed: &[DueItem],
        report: &mut CycleReport,
    ) {
        if !delivered_keys.is_empty() {
            match self.ledger.record_delivered(kind, delivered_keys).await {
                Ok(inserted) if inserted < delivered_keys.len() => {
                    debug!(
                        kind = %kind,
                        inserted = inserted,
                        total = delivered_keys.len(),
                        "Ledger already held some keys"
                    );
                }
                Ok(_) => {}
                Err(err) => {
                    error!(kind = %kind, error = %err, "Failed to record deliveries in ledger");
                    report.commit_errors += 1;
                }
            }
        }

        match kind.completion() {
            Completion::MarkDone => {
                let ids: Vec<DueItemId> = completed.iter().map(DueItem::id).collect();
                match self.repository.mark_done(&ids).await {
                    Ok(changed) => report.committed += changed,
                    Err(err) => {
                        error!(kind = %kind, count = ids.len(), error = %err, "mark_done failed");
                        report.commit_errors += 1;
                    }
                }
            }
            Completion::Delete => {
                for item in completed {
                    match self.repository.delete(item.id()).await {
                        Ok(true) => report.committed += 1,
                        Ok(false) => {
                            debug!(kind = %kind, item_id = %item.id(), "Item already deleted");
                        }
                        Err(err) => {
                            error!(kind = %kind, item_id = %item.id(), error = %err, "delete failed");
                            report.commit_errors += 1;
                        }
                    }
                }
            }
        }
    }
}
