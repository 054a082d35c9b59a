//! Collaborator contracts consumed by the engine and the reconciler
//!
//! Everything outside the conversation core sits behind one of these traits
//! and is injected at construction time.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use crate::domain::{Campaign, DailyCapacity, ProgressRecord, ProgressStatus, ReviewerId, ReviewerIdentity};
use crate::error::CollabError;

mod catalog;
mod local;

pub use catalog::StoreBackedCatalog;
pub use local::{KeywordAssistant, LocalInquiryRouter, MemoryPromotions, Notification, OutboxNotifier, RoutedInquiry};

/// Result type for collaborator calls
pub type CollabResult<T> = Result<T, CollabError>;

/// Maps a (name, phone) pair to a durable reviewer id
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, identity: &ReviewerIdentity) -> CollabResult<ReviewerId>;

    /// Name and phone behind a reviewer id
    async fn identity_of(&self, reviewer_id: ReviewerId) -> CollabResult<Option<ReviewerIdentity>>;

    /// Mark the reviewer as a known messaging contact; true when newly marked
    async fn record_known_contact(&self, identity: &ReviewerIdentity) -> CollabResult<bool>;
}

#[async_trait]
pub trait CampaignCatalog: Send + Sync {
    /// Campaigns currently open for applications, in display order
    async fn active_campaigns(&self) -> CollabResult<Vec<Campaign>>;

    /// 1-based index into `active_campaigns`
    async fn active_campaign_by_index(&self, index: usize) -> CollabResult<Option<Campaign>> {
        if index == 0 {
            return Ok(None);
        }
        Ok(self.active_campaigns().await?.into_iter().nth(index - 1))
    }

    async fn campaign_by_id(&self, id: &str) -> CollabResult<Option<Campaign>>;

    async fn remaining_capacity(&self, id: &str) -> CollabResult<i64>;

    async fn remaining_daily_capacity(&self, id: &str) -> CollabResult<DailyCapacity>;
}

/// Durable progress rows
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn create_records(&self, campaign_id: &str, reviewer_id: ReviewerId, store_ids: &[String]) -> CollabResult<Vec<i64>>;

    /// Non-terminal rows only; returns how many changed
    async fn set_status(&self, record_ids: &[i64], status: ProgressStatus) -> CollabResult<usize>;

    async fn find_by_reviewer(&self, reviewer_id: ReviewerId) -> CollabResult<Vec<ProgressRecord>>;

    /// Early-status rows created at or before `older_than` (Unix ms)
    async fn find_stale_early_status(&self, older_than: i64) -> CollabResult<Vec<ProgressRecord>>;

    /// Early-status rows to `timedOut`; returns how many changed
    async fn cancel_by_timeout(&self, reviewer_id: ReviewerId, campaign_id: &str, store_ids: &[String]) -> CollabResult<usize>;

    async fn find_active_duplicates(&self, campaign_id: &str, store_ids: &[String]) -> CollabResult<Vec<String>>;

    async fn assign_option(&self, record_id: i64, option: &str) -> CollabResult<bool>;

    async fn submit_form(&self, record_id: i64, form: &Value) -> CollabResult<bool>;

    async fn update_form_field(&self, record_id: i64, field: &str, value: &str) -> CollabResult<bool>;

    async fn count_reserved(&self, campaign_id: &str, since: Option<i64>) -> CollabResult<i64>;

    async fn find_review_deadlines(&self, dates: &[NaiveDate], today: NaiveDate) -> CollabResult<Vec<ProgressRecord>>;

    async fn mark_reminded(&self, record_id: i64, date: NaiveDate) -> CollabResult<()>;

    async fn purge_terminal_before(&self, cutoff: i64) -> CollabResult<usize>;
}

/// What a notification is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignContext {
    pub campaign_id: String,
    pub product_name: Option<String>,
    pub store_ids: Vec<String>,
}

/// Outbound messages that do not answer an inbound one
///
/// Warnings and cancellations carry every campaign affected for the reviewer
/// so one message goes out per reviewer.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send_warning(&self, reviewer_id: ReviewerId, contexts: &[CampaignContext]) -> CollabResult<()>;

    async fn send_cancellation(&self, reviewer_id: ReviewerId, contexts: &[CampaignContext]) -> CollabResult<()>;

    async fn send_contact_request(&self, reviewer_id: ReviewerId, identity: &ReviewerIdentity) -> CollabResult<()>;

    async fn send_reminder(&self, reviewer_id: ReviewerId, context: &CampaignContext, deadline: NaiveDate) -> CollabResult<()>;
}

/// Escalation to a human operator
#[async_trait]
pub trait InquiryRouter: Send + Sync {
    /// Returns the inquiry id
    async fn submit(&self, reviewer_id: ReviewerId, text: &str, recent_context: &[String]) -> CollabResult<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantReply {
    pub text: String,
    /// Hand the conversation to a human
    pub escalate: bool,
}

/// Answers free-form questions at step 9
#[async_trait]
pub trait Assistant: Send + Sync {
    async fn respond(&self, text: &str, context: &[String]) -> CollabResult<AssistantReply>;
}

/// Promotional broadcasting switch per campaign
#[async_trait]
pub trait PromotionControl: Send + Sync {
    async fn suspend(&self, campaign_id: &str) -> CollabResult<()>;

    async fn resume(&self, campaign_id: &str) -> CollabResult<()>;

    async fn is_suspended(&self, campaign_id: &str) -> CollabResult<bool>;
}

/// Every collaborator, constructed once at startup and shared read-only
#[derive(Clone)]
pub struct Collaborators {
    pub identity: Arc<dyn IdentityResolver>,
    pub catalog: Arc<dyn CampaignCatalog>,
    pub progress: Arc<dyn ProgressStore>,
    pub notifier: Arc<dyn NotificationDispatcher>,
    pub inquiries: Arc<dyn InquiryRouter>,
    pub assistant: Arc<dyn Assistant>,
    pub promotions: Arc<dyn PromotionControl>,
}

impl Collaborators {
    /// Resume promotion for a campaign that was auto-suspended and has room again
    pub async fn resume_promotion_if_freed(&self, campaign_id: &str) -> CollabResult<bool> {
        if !self.promotions.is_suspended(campaign_id).await? {
            return Ok(false);
        }
        if self.catalog.remaining_capacity(campaign_id).await? <= 0 {
            return Ok(false);
        }
        self.promotions.resume(campaign_id).await?;
        tracing::info!(%campaign_id, "Resumed promotion after capacity was freed");
        Ok(true)
    }
}
