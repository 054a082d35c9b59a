//! Slow-cadence upkeep: review reminders, purging and session expiry

use chrono::Days;
use tracing::{info, warn};

use super::TimeoutReconciler;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HousekeepingReport {
    pub reminders_sent: usize,
    pub records_purged: usize,
    pub sessions_expired: usize,
}

impl TimeoutReconciler {
    pub(super) async fn housekeeping(&self, now: i64) -> HousekeepingReport {
        let report = HousekeepingReport {
            reminders_sent: self.send_reminders().await,
            records_purged: self.purge(now).await,
            sessions_expired: self
                .sessions
                .expire_older_than((self.config.session_idle_expiry_secs * 1000) as i64, now),
        };
        if report != HousekeepingReport::default() {
            info!(?report, "Housekeeping finished");
        }
        report
    }

    /// Review-deadline reminders, at most once per record per day
    async fn send_reminders(&self) -> usize {
        let today = self.clock.today();
        let dates: Vec<_> = self
            .config
            .reminder_days
            .iter()
            .filter_map(|d| today.checked_add_days(Days::new(u64::from(*d))))
            .collect();
        if dates.is_empty() {
            return 0;
        }

        let records = match self.collab.progress.find_review_deadlines(&dates, today).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "send_reminders: deadline lookup failed");
                return 0;
            }
        };

        let mut sent = 0;
        for record in records {
            let Some(deadline) = record.review_deadline else {
                continue;
            };
            let context = self.context(&record.campaign_id, vec![record.store_id.clone()]).await;
            if let Err(e) = self.collab.notifier.send_reminder(record.reviewer_id, &context, deadline).await {
                warn!(record_id = record.id, error = %e, "send_reminders: dispatch failed");
                continue;
            }
            if let Err(e) = self.collab.progress.mark_reminded(record.id, today).await {
                warn!(record_id = record.id, error = %e, "send_reminders: mark failed");
            }
            sent += 1;
        }
        sent
    }

    async fn purge(&self, now: i64) -> usize {
        let cutoff = now - (self.config.purge_terminal_after_hours * 3_600_000) as i64;
        match self.collab.progress.purge_terminal_before(cutoff).await {
            Ok(purged) => purged,
            Err(e) => {
                warn!(error = %e, "purge: delete failed");
                0
            }
        }
    }
}
