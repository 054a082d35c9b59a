//! Steps 6-8: waiting on screenshots that arrive through the upload channel
//!
//! Nothing typed here advances the workflow. Every message re-reads the
//! durable rows and re-derives where the reviewer stands.

use crate::domain::{Intent, ProgressStatus, Response, ReviewerId, Scratch, SessionState, Step};

use super::{SessionEngine, Transition, home_button, menu, templates};

/// Where a set of durable rows leaves the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProofStage {
    PurchaseProof,
    ReviewProof,
    Done,
    Gone,
}

fn proof_stage(statuses: &[ProgressStatus]) -> ProofStage {
    let live: Vec<_> = statuses
        .iter()
        .filter(|s| !matches!(s, ProgressStatus::TimedOut | ProgressStatus::Cancelled))
        .collect();
    if live.is_empty() {
        ProofStage::Gone
    } else if live.iter().all(|s| s.rank() >= ProgressStatus::ReviewSubmitted.rank()) {
        ProofStage::Done
    } else if live.iter().all(|s| s.rank() >= ProgressStatus::AwaitingReviewProof.rank()) {
        ProofStage::ReviewProof
    } else {
        ProofStage::PurchaseProof
    }
}

impl SessionEngine {
    pub(super) async fn on_awaiting_proof(&self, s: &mut SessionState, reviewer_id: ReviewerId, intent: Intent) -> Transition {
        if intent.payload().and_then(menu::menu_choice).is_some() {
            s.reset();
            return self.on_menu(s, reviewer_id, intent).await;
        }
        self.refresh_awaiting(s, reviewer_id).await
    }

    pub(super) async fn refresh_awaiting(&self, s: &mut SessionState, reviewer_id: ReviewerId) -> Transition {
        let Scratch::Awaiting(data) = &s.scratch else {
            s.reset();
            return self.menu_prompt(s, reviewer_id).await;
        };
        let records: Vec<_> = self
            .collab
            .progress
            .find_by_reviewer(reviewer_id)
            .await?
            .into_iter()
            .filter(|r| data.record_ids.contains(&r.id))
            .collect();
        let statuses: Vec<_> = records.iter().map(|r| r.status).collect();

        match proof_stage(&statuses) {
            ProofStage::Gone => {
                s.reset();
                Ok(self.menu_prompt(s, reviewer_id).await?.prepend(templates::CANCELLED))
            }
            ProofStage::Done => {
                s.selected_campaign_id = None;
                s.enter(Step::Completed, Scratch::Empty);
                Ok(Response::text(templates::ALL_DONE).with_buttons(home_button()))
            }
            ProofStage::ReviewProof => {
                let deadline = records
                    .iter()
                    .filter(|r| r.status == ProgressStatus::AwaitingReviewProof)
                    .filter_map(|r| r.review_deadline)
                    .min()
                    .map(|d| d.format("%Y-%m-%d").to_string());
                s.step = Step::AwaitingReviewProof;
                Ok(
                    Response::text(templates::review_capture_remind(&self.upload_url(), deadline.as_deref()))
                        .with_buttons(home_button()),
                )
            }
            ProofStage::PurchaseProof => {
                s.step = Step::AwaitingPurchaseProof;
                Ok(Response::text(templates::purchase_capture_remind(&self.upload_url())).with_buttons(home_button()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProgressStatus::*;

    #[test]
    fn test_proof_stage() {
        assert_eq!(proof_stage(&[AwaitingPurchaseProof, AwaitingReviewProof]), ProofStage::PurchaseProof);
        assert_eq!(proof_stage(&[AwaitingReviewProof, ReviewSubmitted]), ProofStage::ReviewProof);
        assert_eq!(proof_stage(&[ReviewSubmitted, Settled, Cancelled]), ProofStage::Done);
        assert_eq!(proof_stage(&[TimedOut, Cancelled]), ProofStage::Gone);
        assert_eq!(proof_stage(&[]), ProofStage::Gone);
    }
}
