//! Workflow steps

use serde::{Deserialize, Serialize};

/// Position of a session in the conversation workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Step {
    /// Idle / main menu
    #[default]
    Menu = 0,
    /// Picking a campaign from the card list
    CampaignSelection = 1,
    /// Choosing how many store accounts to register
    AccountCount = 2,
    /// Collecting store identifiers (with duplicate resolution)
    IdentifierCollection = 3,
    /// Choosing options per identifier, then the purchase guide
    OptionOrGuide = 4,
    /// Forms still outstanding for some identifiers
    FormSubmission = 5,
    /// Waiting for purchase screenshots (uploaded elsewhere)
    AwaitingPurchaseProof = 6,
    /// Waiting for review screenshots (uploaded elsewhere)
    AwaitingReviewProof = 7,
    /// Everything submitted
    Completed = 8,
    /// Assistant-backed free-form inquiry
    Inquiry = 9,
    /// One message routed to a human operator
    InquirySubmission = 10,
    /// Pick which in-flight record to edit
    EditSelectRecord = 11,
    /// Pick which form field to edit
    EditSelectField = 12,
    /// Enter the new field value
    EditValue = 13,
}

impl Step {
    pub const ALL: [Step; 14] = [
        Self::Menu,
        Self::CampaignSelection,
        Self::AccountCount,
        Self::IdentifierCollection,
        Self::OptionOrGuide,
        Self::FormSubmission,
        Self::AwaitingPurchaseProof,
        Self::AwaitingReviewProof,
        Self::Completed,
        Self::Inquiry,
        Self::InquirySubmission,
        Self::EditSelectRecord,
        Self::EditSelectField,
        Self::EditValue,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Guide issued and forms outstanding: the window the timeout policy covers
    pub fn is_guide_issued(self) -> bool {
        matches!(self, Self::OptionOrGuide | Self::FormSubmission)
    }

    /// Passive states advanced by the upload channel
    pub fn is_awaiting_proof(self) -> bool {
        matches!(self, Self::AwaitingPurchaseProof | Self::AwaitingReviewProof)
    }

    pub fn is_edit_flow(self) -> bool {
        matches!(self, Self::EditSelectRecord | Self::EditSelectField | Self::EditValue)
    }
}

impl TryFrom<u8> for Step {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or_else(|| format!("Step out of range: {}", value))
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_all_is_ordered_by_discriminant() {
        for (idx, step) in Step::ALL.iter().enumerate() {
            assert_eq!(step.as_u8() as usize, idx);
        }
    }

    proptest! {
        #[test]
        fn prop_try_from_accepts_only_known_steps(raw in any::<u8>()) {
            match Step::try_from(raw) {
                Ok(step) => prop_assert_eq!(step.as_u8(), raw),
                Err(_) => prop_assert!(raw > 13),
            }
        }
    }
}
