//! Rebuilding a purchase flow from durable rows after a restart
//!
//! Sessions live in memory only. When a reviewer with rows still in
//! `guideSent` comes back to an empty session, the flow resumes at step 4
//! with the pending and already-submitted identifiers restored.

use std::collections::BTreeSet;

use tracing::info;

use crate::domain::{FormSubmissionData, ProgressRecord, ProgressStatus, Response, ReviewerId, Scratch, SessionState, Step};
use crate::error::EngineError;

use super::{SessionEngine, templates};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPlan {
    pub campaign_id: String,
    /// (store id, record id) still waiting for a form
    pub pending: Vec<(String, i64)>,
    /// (store id, record id) already past the form
    pub submitted: Vec<(String, i64)>,
    /// Chosen option per store id, where one was recorded
    pub options: Vec<(String, Option<String>)>,
}

impl RecoveryPlan {
    pub fn into_form_data(self) -> FormSubmissionData {
        let (store_ids, record_ids): (Vec<String>, Vec<i64>) =
            self.pending.iter().chain(self.submitted.iter()).cloned().unzip();
        let mut data = FormSubmissionData::new(self.campaign_id, store_ids, record_ids);
        data.options = data
            .store_ids
            .iter()
            .map(|id| {
                self.options
                    .iter()
                    .find(|(store_id, _)| store_id == id)
                    .and_then(|(_, option)| option.clone())
            })
            .collect();
        data.option_cursor = data.store_ids.len();
        data.submitted = self.submitted.into_iter().map(|(id, _)| id).collect::<BTreeSet<_>>();
        data
    }
}

/// Pick the campaign with the newest `guideSent` row and collect its rows
pub fn plan_recovery(records: &[ProgressRecord], campaign: Option<&str>) -> Option<RecoveryPlan> {
    let anchor = records
        .iter()
        .filter(|r| r.status == ProgressStatus::GuideSent)
        .filter(|r| campaign.is_none_or(|c| r.campaign_id == c))
        .max_by_key(|r| (r.created_at, r.id))?;
    let campaign_id = anchor.campaign_id.clone();

    let mut in_campaign: Vec<&ProgressRecord> = records.iter().filter(|r| r.campaign_id == campaign_id).collect();
    in_campaign.sort_by_key(|r| r.id);

    let pick = |statuses: &[ProgressStatus]| -> Vec<(String, i64)> {
        in_campaign
            .iter()
            .filter(|r| statuses.contains(&r.status))
            .map(|r| (r.store_id.clone(), r.id))
            .collect()
    };
    let pending = pick(&[ProgressStatus::GuideSent]);
    let submitted = pick(&[ProgressStatus::AwaitingPurchaseProof, ProgressStatus::AwaitingReviewProof]);
    let options = in_campaign
        .iter()
        .filter(|r| r.status == ProgressStatus::GuideSent || r.status.is_past_form())
        .map(|r| (r.store_id.clone(), r.option.clone()))
        .collect();

    Some(RecoveryPlan {
        campaign_id,
        pending,
        submitted,
        options,
    })
}

impl SessionEngine {
    /// Resume an interrupted purchase flow; `None` when there is nothing to resume
    pub(super) async fn recover(
        &self,
        s: &mut SessionState,
        reviewer_id: ReviewerId,
        campaign: Option<&str>,
    ) -> Result<Option<Response>, EngineError> {
        let records = self.collab.progress.find_by_reviewer(reviewer_id).await?;
        let Some(plan) = plan_recovery(&records, campaign) else {
            return Ok(None);
        };
        let Some(campaign) = self.collab.catalog.campaign_by_id(&plan.campaign_id).await? else {
            return Ok(None);
        };

        let data = plan.into_form_data();
        info!(
            reviewer = %s.identity,
            campaign_id = %campaign.id,
            pending = data.pending().len(),
            submitted = data.submitted.len(),
            "Resuming purchase flow from durable records"
        );
        let response = self.guide_response(&data, &campaign).prepend(&templates::resumed(&campaign));
        s.selected_campaign_id = Some(campaign.id.clone());
        s.enter(Step::OptionOrGuide, Scratch::Purchase(data));
        Ok(Some(response))
    }
}
