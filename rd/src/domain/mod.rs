//! Domain types for the review conversation
//!
//! Identity, workflow steps, step-local scratch data, inbound intent and the
//! structured outbound response.

mod campaign;
mod identity;
mod intent;
mod response;
mod scratch;
mod session;
mod step;

pub use campaign::{Campaign, DailyCapacity};
pub use identity::{ReviewerId, ReviewerIdentity};
pub use intent::{BACK, BUTTON_PREFIX, CANCEL, CONTINUE, EDIT, HOME, Intent, RESUME, button_value};
pub use response::{Affordance, Button, CampaignCard, MultiSelect, Response};
pub use scratch::{
    AccountCountData, AwaitingData, CampaignSelectionData, DuplicateResolution, EditFlowData, FormSubmissionData,
    IdentifierCollectionData, InquiryData, ResolutionMode, Scratch, TrackedRecords,
};
pub use session::SessionState;
pub use step::Step;

// Re-export durable record types for convenience
pub use progressstore::{ProgressRecord, ProgressStatus};
