//! Progress record types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Durable workflow status of one store identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ProgressStatus {
    /// Identifier registered, guide not yet issued
    #[default]
    Applied,
    /// Purchase guide issued, form outstanding
    GuideSent,
    /// Form received, waiting for the purchase screenshot
    AwaitingPurchaseProof,
    /// Purchase verified, waiting for the review screenshot
    AwaitingReviewProof,
    /// Review screenshot received
    ReviewSubmitted,
    /// Review approved, payout queued
    AwaitingSettlement,
    /// Paid out
    Settled,
    /// Cancelled by the timeout reconciler
    TimedOut,
    /// Cancelled by the reviewer or an operator
    Cancelled,
}

impl ProgressStatus {
    pub const ALL: [ProgressStatus; 9] = [
        Self::Applied,
        Self::GuideSent,
        Self::AwaitingPurchaseProof,
        Self::AwaitingReviewProof,
        Self::ReviewSubmitted,
        Self::AwaitingSettlement,
        Self::Settled,
        Self::TimedOut,
        Self::Cancelled,
    ];

    /// Stable storage name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::GuideSent => "guideSent",
            Self::AwaitingPurchaseProof => "awaitingPurchaseProof",
            Self::AwaitingReviewProof => "awaitingReviewProof",
            Self::ReviewSubmitted => "reviewSubmitted",
            Self::AwaitingSettlement => "awaitingSettlement",
            Self::Settled => "settled",
            Self::TimedOut => "timedOut",
            Self::Cancelled => "cancelled",
        }
    }

    /// No further transitions once a record lands here
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled | Self::TimedOut | Self::Cancelled)
    }

    /// Statuses the timeout reconciler may cancel
    pub fn is_early(&self) -> bool {
        matches!(self, Self::Applied | Self::GuideSent)
    }

    /// Statuses that do not block a new registration of the same identifier
    pub fn ignorable_for_duplicates(&self) -> bool {
        matches!(self, Self::Applied | Self::GuideSent | Self::TimedOut | Self::Cancelled)
    }

    /// Statuses that count against campaign capacity
    pub fn is_reserved(&self) -> bool {
        !matches!(self, Self::TimedOut | Self::Cancelled)
    }

    /// The form for this identifier has been accepted
    pub fn is_past_form(&self) -> bool {
        matches!(
            self,
            Self::AwaitingPurchaseProof
                | Self::AwaitingReviewProof
                | Self::ReviewSubmitted
                | Self::AwaitingSettlement
                | Self::Settled
        )
    }

    /// Ordering along the happy path, used to tell regressions apart
    pub fn rank(&self) -> u8 {
        match self {
            Self::Applied => 0,
            Self::GuideSent => 1,
            Self::AwaitingPurchaseProof => 2,
            Self::AwaitingReviewProof => 3,
            Self::ReviewSubmitted => 4,
            Self::AwaitingSettlement => 5,
            Self::Settled => 6,
            Self::TimedOut | Self::Cancelled => 7,
        }
    }
}

impl std::fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProgressStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("Unknown progress status: {}", s))
    }
}

/// A reviewer row (identity resolution is keyed on name + phone)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reviewer {
    pub id: i64,
    pub name: String,
    pub phone: String,
    /// Reviewer has been added as a known messaging contact
    pub known_contact: bool,
    pub created_at: i64,
}

/// One durable progress row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Row id
    pub id: i64,

    /// Campaign this identifier was registered for
    pub campaign_id: String,

    /// Owning reviewer
    pub reviewer_id: i64,

    /// Marketplace account identifier used for the purchase
    pub store_id: String,

    /// Current status
    pub status: ProgressStatus,

    /// Purchasable option chosen for this identifier (multi-option campaigns)
    pub option: Option<String>,

    /// Submitted form fields (recipient, bank account, ...), `Null` until submitted
    pub form: Value,

    /// Review deadline, set once the purchase has been verified
    pub review_deadline: Option<NaiveDate>,

    /// Last day a deadline reminder went out
    pub last_reminder_date: Option<NaiveDate>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl ProgressRecord {
    /// Campaign + identifier key used to match records against sessions
    pub fn key(&self) -> (String, String) {
        (self.campaign_id.clone(), self.store_id.clone())
    }

    /// Read a single submitted form field
    pub fn form_field(&self, field: &str) -> Option<&str> {
        self.form.get(field).and_then(Value::as_str)
    }
}

/// Insert payload for a batch of identifiers registered together
#[derive(Debug, Clone)]
pub struct NewProgress {
    pub campaign_id: String,
    pub reviewer_id: i64,
    pub store_ids: Vec<String>,
    pub status: ProgressStatus,
    pub created_at: i64,
}

impl NewProgress {
    /// Build a batch in `Applied` status
    pub fn batch(campaign_id: impl Into<String>, reviewer_id: i64, store_ids: &[impl AsRef<str>], created_at: i64) -> Self {
        Self {
            campaign_id: campaign_id.into(),
            reviewer_id,
            store_ids: store_ids.iter().map(|s| s.as_ref().to_string()).collect(),
            status: ProgressStatus::Applied,
            created_at,
        }
    }

    /// Override the initial status
    pub fn with_status(mut self, status: ProgressStatus) -> Self {
        self.status = status;
        self
    }
}
