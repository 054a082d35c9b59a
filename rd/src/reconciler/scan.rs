//! Warn/cancel scans over live sessions and over durable rows

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info, warn};

use crate::domain::{ProgressRecord, ReviewerId, SessionState};
use crate::session::{SessionGuard, SessionLock};

use super::{TickReport, TimeoutReconciler, WarnKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Staleness {
    Fresh,
    Warn,
    Cancel,
}

/// Classify idle time against the warning and cancellation thresholds
pub fn staleness(elapsed_ms: i64, warn_at_ms: i64, cancel_after_ms: i64) -> Staleness {
    if elapsed_ms >= cancel_after_ms {
        Staleness::Cancel
    } else if elapsed_ms >= warn_at_ms {
        Staleness::Warn
    } else {
        Staleness::Fresh
    }
}

impl TimeoutReconciler {
    /// Sessions at steps 4-5; returns the (campaign, store id) keys live sessions track
    pub(super) async fn scan_sessions(
        &self,
        now: i64,
        report: &mut TickReport,
        seen: &mut Vec<WarnKey>,
    ) -> HashSet<(String, String)> {
        let mut covered = HashSet::new();

        for snapshot in self.sessions.all_active() {
            let key = snapshot.key();
            let Some(tracked) = snapshot.scratch.tracked() else {
                continue;
            };
            covered.extend(
                tracked
                    .store_ids
                    .iter()
                    .map(|id| (tracked.campaign_id.to_string(), id.clone())),
            );
            if !snapshot.step.is_guide_issued() {
                continue;
            }
            let Some(reviewer_id) = snapshot.reviewer_id else {
                continue;
            };

            // Durable floor: a restart must not reset the clock
            let durable_floor = match self.collab.progress.find_by_reviewer(reviewer_id).await {
                Ok(records) => records
                    .iter()
                    .filter(|r| tracked.record_ids.contains(&r.id))
                    .map(|r| r.created_at)
                    .max()
                    .unwrap_or(0),
                Err(e) => {
                    warn!(reviewer_id, error = %e, "scan_sessions: record lookup failed");
                    continue;
                }
            };
            let baseline = snapshot.last_activity.max(durable_floor);
            let warn_key = WarnKey::Session(key.clone());

            match staleness(now - baseline, self.warn_at_ms(), self.cancel_after_ms()) {
                Staleness::Fresh => {}
                Staleness::Warn => {
                    seen.push(warn_key.clone());
                    if !self.already_warned(&warn_key, baseline) {
                        let context = self.context(tracked.campaign_id, tracked.store_ids.to_vec()).await;
                        if self.send_warning(reviewer_id, &[context]).await {
                            self.mark_warned(warn_key, baseline);
                            report.warnings_sent += 1;
                        }
                    }
                }
                Staleness::Cancel => match self.cancel_session(&key, &snapshot, reviewer_id).await {
                    Some(changed) => {
                        self.clear_warned(&warn_key);
                        report.sessions_cancelled += 1;
                        report.records_timed_out += changed;
                    }
                    None => seen.push(warn_key),
                },
            }
        }
        covered
    }

    /// Time out a stale session's early rows and reset it
    ///
    /// Skips the session if it is mid-transition or has changed since the
    /// snapshot was taken. Returns the number of rows timed out.
    async fn cancel_session(&self, key: &str, snapshot: &SessionState, reviewer_id: ReviewerId) -> Option<usize> {
        let Some(mut guard) = self.sessions.try_get(key) else {
            debug!(%key, "cancel_session: session busy, retrying next tick");
            return None;
        };
        if guard.last_activity != snapshot.last_activity || guard.step != snapshot.step {
            debug!(%key, "cancel_session: session moved since snapshot");
            return None;
        }
        let tracked = guard.scratch.tracked()?;
        let campaign_id = tracked.campaign_id.to_string();
        let store_ids = tracked.store_ids.to_vec();

        let changed = match self
            .collab
            .progress
            .cancel_by_timeout(reviewer_id, &campaign_id, &store_ids)
            .await
        {
            Ok(changed) => changed,
            Err(e) => {
                warn!(%key, %campaign_id, error = %e, "cancel_session: timeout write failed");
                return None;
            }
        };
        guard.reset();
        drop(guard);

        info!(reviewer = %key, %campaign_id, changed, "Cancelled stalled session");
        if changed > 0 {
            let context = self.context(&campaign_id, store_ids).await;
            self.after_timeout(reviewer_id, &[context]).await;
        }
        Some(changed)
    }

    /// Early-status rows no live session is tracking
    ///
    /// Rows are grouped per reviewer so each reviewer gets at most one
    /// warning and one cancellation per tick, whatever the number of
    /// campaigns involved.
    pub(super) async fn scan_durable(
        &self,
        now: i64,
        covered: &HashSet<(String, String)>,
        report: &mut TickReport,
        seen: &mut Vec<WarnKey>,
    ) {
        let records = match self.collab.progress.find_stale_early_status(now - self.warn_at_ms()).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "scan_durable: stale record lookup failed");
                return;
            }
        };

        let mut groups: BTreeMap<ReviewerId, BTreeMap<String, Vec<ProgressRecord>>> = BTreeMap::new();
        for record in records {
            if covered.contains(&record.key()) {
                continue;
            }
            groups
                .entry(record.reviewer_id)
                .or_default()
                .entry(record.campaign_id.clone())
                .or_default()
                .push(record);
        }

        for (reviewer_id, campaigns) in groups {
            // Held until the rows are settled so a first message cannot slip in
            let _guard = match self.lock_idle_session(reviewer_id).await {
                Some(guard) => guard,
                None => {
                    seen.extend(campaigns.into_keys().map(|c| WarnKey::Durable(reviewer_id, c)));
                    continue;
                }
            };

            let mut to_warn = Vec::new();
            let mut warn_keys = Vec::new();
            let mut cancelled = Vec::new();

            for (campaign_id, group) in campaigns {
                let baseline = group.iter().map(|r| r.created_at).max().unwrap_or(0);
                let store_ids: Vec<String> = group.into_iter().map(|r| r.store_id).collect();
                let warn_key = WarnKey::Durable(reviewer_id, campaign_id.clone());

                match staleness(now - baseline, self.warn_at_ms(), self.cancel_after_ms()) {
                    Staleness::Fresh => {}
                    Staleness::Warn => {
                        seen.push(warn_key.clone());
                        if !self.already_warned(&warn_key, baseline) {
                            to_warn.push(self.context(&campaign_id, store_ids).await);
                            warn_keys.push((warn_key, baseline));
                        }
                    }
                    Staleness::Cancel => {
                        let changed = match self
                            .collab
                            .progress
                            .cancel_by_timeout(reviewer_id, &campaign_id, &store_ids)
                            .await
                        {
                            Ok(changed) => changed,
                            Err(e) => {
                                warn!(reviewer_id, %campaign_id, error = %e, "scan_durable: timeout write failed");
                                seen.push(warn_key);
                                continue;
                            }
                        };
                        self.clear_warned(&warn_key);
                        report.records_timed_out += changed;
                        info!(reviewer_id, %campaign_id, changed, "Timed out orphaned records");
                        if changed > 0 {
                            cancelled.push(self.context(&campaign_id, store_ids).await);
                        }
                    }
                }
            }

            if !to_warn.is_empty() && self.send_warning(reviewer_id, &to_warn).await {
                for (key, baseline) in warn_keys {
                    self.mark_warned(key, baseline);
                }
                report.warnings_sent += 1;
            }
            self.after_timeout(reviewer_id, &cancelled).await;
        }
    }

    /// Lock the reviewer's session if it is idle
    ///
    /// `Some(None)` means the reviewer has no session at all. `None` means a
    /// transition holds the session, or the reviewer could not be looked up,
    /// and the group waits for the next tick.
    async fn lock_idle_session(&self, reviewer_id: ReviewerId) -> Option<Option<SessionGuard>> {
        let identity = match self.collab.identity.identity_of(reviewer_id).await {
            Ok(Some(identity)) => identity,
            Ok(None) => return Some(None),
            Err(e) => {
                warn!(reviewer_id, error = %e, "lock_idle_session: reviewer lookup failed");
                return None;
            }
        };
        match self.sessions.try_lock(&identity.key()) {
            SessionLock::Absent => Some(None),
            SessionLock::Idle(guard) => Some(Some(guard)),
            SessionLock::Busy => {
                debug!(reviewer_id, "lock_idle_session: session busy, retrying next tick");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_staleness_thresholds() {
        assert_eq!(staleness(0, 1500, 1800), Staleness::Fresh);
        assert_eq!(staleness(1499, 1500, 1800), Staleness::Fresh);
        assert_eq!(staleness(1500, 1500, 1800), Staleness::Warn);
        assert_eq!(staleness(1800, 1500, 1800), Staleness::Cancel);
    }

    proptest! {
        #[test]
        fn staleness_is_monotonic(a in 0i64..10_000, b in 0i64..10_000, warn in 0i64..5_000, extra in 1i64..5_000) {
            let cancel = warn + extra;
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(staleness(lo, warn, cancel) <= staleness(hi, warn, cancel));
        }
    }
}
