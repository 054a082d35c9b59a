//! Two-phase cancellation of the current registration

use tracing::{info, warn};

use crate::domain::{ProgressStatus, ReviewerId, Scratch, SessionState};

use super::{SessionEngine, Transition, templates};

impl SessionEngine {
    pub(super) async fn cancel(&self, s: &mut SessionState, reviewer_id: ReviewerId) -> Transition {
        let submitted = match &s.scratch {
            Scratch::Purchase(data) => !data.submitted.is_empty(),
            Scratch::Awaiting(_) => true,
            _ => false,
        };
        if submitted && !s.cancel_pending {
            return Ok(self.ask_cancel_confirmation(s));
        }

        if let Some(tracked) = s.scratch.tracked() {
            let campaign_id = tracked.campaign_id.to_string();
            let changed = self
                .collab
                .progress
                .set_status(tracked.record_ids, ProgressStatus::Cancelled)
                .await?;
            info!(reviewer = %s.identity, %campaign_id, changed, "Registration cancelled by reviewer");
            if changed > 0 {
                let collab = self.collab.clone();
                tokio::spawn(async move {
                    if let Err(e) = collab.resume_promotion_if_freed(&campaign_id).await {
                        warn!(%campaign_id, error = %e, "Failed to resume promotion");
                    }
                });
            }
        }

        s.reset();
        Ok(self.menu_prompt(s, reviewer_id).await?.prepend(templates::CANCELLED))
    }
}
