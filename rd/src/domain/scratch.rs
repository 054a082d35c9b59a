//! Step-local working data
//!
//! One variant per step family. Moving into a new step replaces the whole
//! value, so data from an abandoned flow cannot leak into the next one.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scratch {
    #[default]
    Empty,
    CampaignSelection(CampaignSelectionData),
    AccountCount(AccountCountData),
    Identifiers(IdentifierCollectionData),
    Purchase(FormSubmissionData),
    Awaiting(AwaitingData),
    Inquiry(InquiryData),
    Edit(EditFlowData),
}

impl Scratch {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Campaign and durable rows this scratch is tracking, if any
    pub fn tracked(&self) -> Option<TrackedRecords<'_>> {
        match self {
            Self::Purchase(data) => Some(TrackedRecords {
                campaign_id: &data.campaign_id,
                store_ids: &data.store_ids,
                record_ids: &data.record_ids,
            }),
            Self::Awaiting(data) => Some(TrackedRecords {
                campaign_id: &data.campaign_id,
                store_ids: &data.store_ids,
                record_ids: &data.record_ids,
            }),
            _ => None,
        }
    }
}

/// Borrowed view of the durable rows a session owns
#[derive(Debug, Clone, Copy)]
pub struct TrackedRecords<'a> {
    pub campaign_id: &'a str,
    pub store_ids: &'a [String],
    pub record_ids: &'a [i64],
}

/// Step 1: campaigns offered, in card order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CampaignSelectionData {
    pub offered: Vec<String>,
}

/// Step 2
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCountData {
    pub campaign_id: String,
}

/// Step 3
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierCollectionData {
    pub campaign_id: String,
    pub account_count: usize,
    /// Set once a submitted batch contained duplicates
    pub resolution: Option<DuplicateResolution>,
}

/// Pending choice after a batch with duplicate identifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateResolution {
    /// Identifiers from the batch that passed the duplicate check
    pub accepted: Vec<String>,
    /// Identifiers that are already registered for the campaign
    pub duplicates: Vec<String>,
    pub mode: ResolutionMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMode {
    /// Asking "proceed with the clean subset" or "replace the duplicates"
    Ask,
    /// Waiting for exactly `duplicates.len()` replacement identifiers
    Replace,
}

/// Steps 4-5: committed identifiers with their option and form progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSubmissionData {
    pub campaign_id: String,
    pub account_count: usize,
    pub store_ids: Vec<String>,
    /// Durable row id per identifier (same order as `store_ids`)
    pub record_ids: Vec<i64>,
    /// Chosen option per identifier (same order as `store_ids`)
    pub options: Vec<Option<String>>,
    /// Index of the identifier whose option is being asked
    pub option_cursor: usize,
    /// Identifiers whose form has been accepted
    pub submitted: BTreeSet<String>,
}

impl FormSubmissionData {
    pub fn new(campaign_id: impl Into<String>, store_ids: Vec<String>, record_ids: Vec<i64>) -> Self {
        let count = store_ids.len();
        Self {
            campaign_id: campaign_id.into(),
            account_count: count,
            store_ids,
            record_ids,
            options: vec![None; count],
            option_cursor: 0,
            submitted: BTreeSet::new(),
        }
    }

    /// Identifiers still missing a form, in registration order
    pub fn pending(&self) -> Vec<String> {
        self.store_ids
            .iter()
            .filter(|id| !self.submitted.contains(*id))
            .cloned()
            .collect()
    }

    pub fn record_id_of(&self, store_id: &str) -> Option<i64> {
        self.store_ids
            .iter()
            .position(|id| id == store_id)
            .and_then(|idx| self.record_ids.get(idx).copied())
    }

    pub fn options_complete(&self) -> bool {
        self.option_cursor >= self.store_ids.len()
    }

    pub fn all_submitted(&self) -> bool {
        self.store_ids.iter().all(|id| self.submitted.contains(id))
    }
}

/// Steps 6-7
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwaitingData {
    pub campaign_id: String,
    pub store_ids: Vec<String>,
    pub record_ids: Vec<i64>,
}

/// Steps 9-10: recent conversation, oldest first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct InquiryData {
    pub transcript: Vec<String>,
}

/// Steps 11-13
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EditFlowData {
    /// Editable rows offered at step 11
    pub candidates: Vec<i64>,
    pub record_id: Option<i64>,
    pub field: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_preserves_registration_order() {
        let mut data = FormSubmissionData::new("c1", vec!["b".into(), "a".into(), "c".into()], vec![1, 2, 3]);
        data.submitted.insert("a".into());
        assert_eq!(data.pending(), vec!["b".to_string(), "c".to_string()]);
        assert_eq!(data.record_id_of("c"), Some(3));
        assert!(!data.all_submitted());
    }

    #[test]
    fn test_tracked_only_for_committed_flows() {
        assert!(Scratch::Empty.tracked().is_none());
        let scratch = Scratch::Purchase(FormSubmissionData::new("c1", vec!["a".into()], vec![7]));
        let tracked = scratch.tracked().unwrap();
        assert_eq!(tracked.campaign_id, "c1");
        assert_eq!(tracked.record_ids, &[7]);
    }
}
