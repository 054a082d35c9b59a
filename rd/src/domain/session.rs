//! Per-reviewer conversation state

use serde::{Deserialize, Serialize};

use super::identity::{ReviewerId, ReviewerIdentity};
use super::scratch::Scratch;
use super::step::Step;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub identity: ReviewerIdentity,

    /// Resolved lazily on the first transition
    pub reviewer_id: Option<ReviewerId>,

    pub step: Step,

    pub selected_campaign_id: Option<String>,

    pub scratch: Scratch,

    /// Unix milliseconds of the last inbound message
    pub last_activity: i64,

    /// Durable recovery has been attempted for this in-memory session
    pub recovery_checked: bool,

    /// A cancel was requested and is waiting for confirmation
    pub cancel_pending: bool,
}

impl SessionState {
    pub fn new(identity: ReviewerIdentity, now: i64) -> Self {
        Self {
            identity,
            reviewer_id: None,
            step: Step::Menu,
            selected_campaign_id: None,
            scratch: Scratch::Empty,
            last_activity: now,
            recovery_checked: false,
            cancel_pending: false,
        }
    }

    /// Back to the menu with no working data
    pub fn reset(&mut self) {
        self.step = Step::Menu;
        self.scratch = Scratch::Empty;
        self.selected_campaign_id = None;
        self.cancel_pending = false;
    }

    /// Move to `step` with a fresh scratch value
    pub fn enter(&mut self, step: Step, scratch: Scratch) {
        self.step = step;
        self.scratch = scratch;
        self.cancel_pending = false;
    }

    pub fn key(&self) -> String {
        self.identity.key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scratch::{FormSubmissionData, InquiryData};
    use proptest::prelude::*;

    fn arb_scratch() -> impl Strategy<Value = Scratch> {
        prop_oneof![
            Just(Scratch::Empty),
            proptest::collection::vec("[a-z0-9]{1,8}", 0..5).prop_map(|ids| {
                let record_ids = (0..ids.len() as i64).collect();
                Scratch::Purchase(FormSubmissionData::new("c1", ids, record_ids))
            }),
            proptest::collection::vec(".{0,12}", 0..4).prop_map(|transcript| Scratch::Inquiry(InquiryData { transcript })),
        ]
    }

    proptest! {
        #[test]
        fn prop_reset_always_clears(step_raw in 0u8..14, scratch in arb_scratch(), pending in any::<bool>()) {
            let mut state = SessionState::new(ReviewerIdentity::new("a", "b"), 0);
            state.step = Step::try_from(step_raw).unwrap();
            state.scratch = scratch;
            state.cancel_pending = pending;
            state.selected_campaign_id = Some("c1".into());

            state.reset();

            prop_assert_eq!(state.step, Step::Menu);
            prop_assert!(state.scratch.is_empty());
            prop_assert!(state.selected_campaign_id.is_none());
            prop_assert!(!state.cancel_pending);
        }
    }
}
