//! TimeoutReconciler - warns about and cancels stalled registrations
//!
//! Runs as one background task on a fixed tick. Each tick scans the
//! in-memory sessions first, then the durable rows no live session covers,
//! so a restart cannot leave early-status rows holding capacity forever.
//! Housekeeping (deadline reminders, purging, session expiry) runs every
//! `housekeeping-every-ticks` ticks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::collab::{CampaignContext, Collaborators};
use crate::config::ReconcilerConfig;
use crate::domain::ReviewerId;
use crate::session::SessionStore;

mod housekeeping;
mod scan;

pub use housekeeping::HousekeepingReport;
pub use scan::{Staleness, staleness};

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub warnings_sent: usize,
    pub sessions_cancelled: usize,
    pub records_timed_out: usize,
    pub housekeeping: Option<HousekeepingReport>,
}

/// Who a warning was sent to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum WarnKey {
    Session(String),
    Durable(ReviewerId, String),
}

pub struct TimeoutReconciler {
    sessions: Arc<SessionStore>,
    collab: Collaborators,
    clock: Arc<dyn Clock>,
    config: ReconcilerConfig,
    /// Baseline each warning was sent for; a newer baseline allows another warning
    warned: Mutex<HashMap<WarnKey, i64>>,
    ticks: AtomicU64,
}

impl TimeoutReconciler {
    pub fn new(sessions: Arc<SessionStore>, collab: Collaborators, clock: Arc<dyn Clock>, config: ReconcilerConfig) -> Self {
        Self {
            sessions,
            collab,
            clock,
            config,
            warned: Mutex::new(HashMap::new()),
            ticks: AtomicU64::new(0),
        }
    }

    fn cancel_after_ms(&self) -> i64 {
        (self.config.cancel_after_secs * 1000) as i64
    }

    fn warn_at_ms(&self) -> i64 {
        (self.config.cancel_after_secs.saturating_sub(self.config.warn_before_secs) * 1000) as i64
    }

    /// Run until a shutdown signal arrives
    pub async fn run(&self, mut shutdown_rx: mpsc::Receiver<()>) {
        info!(
            tick_secs = self.config.tick_secs,
            cancel_after_secs = self.config.cancel_after_secs,
            warn_before_secs = self.config.warn_before_secs,
            "Timeout reconciler started"
        );
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.tick_secs));

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.tick().await;
                    if report != TickReport::default() {
                        debug!(?report, "run: tick finished");
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("run: shutdown signal received");
                    break;
                }
            }
        }
        info!("Timeout reconciler stopped");
    }

    /// One warn/cancel pass, plus housekeeping when due
    pub async fn tick(&self) -> TickReport {
        self.run_tick(false).await
    }

    /// One warn/cancel pass followed by housekeeping regardless of cadence
    pub async fn sweep(&self) -> TickReport {
        self.run_tick(true).await
    }

    async fn run_tick(&self, force_housekeeping: bool) -> TickReport {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        let now = self.clock.now_ms();
        let mut report = TickReport::default();

        let mut seen = Vec::new();
        let covered = self.scan_sessions(now, &mut report, &mut seen).await;
        self.scan_durable(now, &covered, &mut report, &mut seen).await;
        self.prune_warned(&seen);

        if force_housekeeping || tick % self.config.housekeeping_every_ticks == 0 {
            report.housekeeping = Some(self.housekeeping(now).await);
        }
        report
    }

    fn already_warned(&self, key: &WarnKey, baseline: i64) -> bool {
        self.warned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .is_some_and(|b| *b == baseline)
    }

    fn mark_warned(&self, key: WarnKey, baseline: i64) {
        self.warned.lock().unwrap_or_else(PoisonError::into_inner).insert(key, baseline);
    }

    fn clear_warned(&self, key: &WarnKey) {
        self.warned.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
    }

    /// Forget warnings for anything that is no longer stale
    fn prune_warned(&self, seen: &[WarnKey]) {
        self.warned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|key, _| seen.contains(key));
    }

    async fn context(&self, campaign_id: &str, store_ids: Vec<String>) -> CampaignContext {
        let product_name = match self.collab.catalog.campaign_by_id(campaign_id).await {
            Ok(campaign) => campaign.map(|c| c.product_name),
            Err(e) => {
                warn!(%campaign_id, error = %e, "context: campaign lookup failed");
                None
            }
        };
        CampaignContext {
            campaign_id: campaign_id.to_string(),
            product_name,
            store_ids,
        }
    }

    async fn send_warning(&self, reviewer_id: ReviewerId, contexts: &[CampaignContext]) -> bool {
        match self.collab.notifier.send_warning(reviewer_id, contexts).await {
            Ok(()) => {
                info!(reviewer_id, campaigns = contexts.len(), "Sent timeout warning");
                true
            }
            Err(e) => {
                warn!(reviewer_id, campaigns = contexts.len(), error = %e, "Failed to send timeout warning");
                false
            }
        }
    }

    /// One cancellation notice for the reviewer, then free capacity per campaign
    ///
    /// `contexts` lists only campaigns where rows actually changed.
    async fn after_timeout(&self, reviewer_id: ReviewerId, contexts: &[CampaignContext]) {
        if contexts.is_empty() {
            return;
        }
        if let Err(e) = self.collab.notifier.send_cancellation(reviewer_id, contexts).await {
            warn!(reviewer_id, campaigns = contexts.len(), error = %e, "Failed to send cancellation");
        }
        for context in contexts {
            if let Err(e) = self.collab.resume_promotion_if_freed(&context.campaign_id).await {
                warn!(campaign_id = %context.campaign_id, error = %e, "Failed to resume promotion");
            }
        }
    }
}
