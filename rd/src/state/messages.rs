//! State manager messages
//!
//! Commands and responses for the actor pattern.

use chrono::NaiveDate;
use progressstore::{ProgressRecord, ProgressStatus, Reviewer};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Channel error")]
    ChannelError,
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    // Reviewer operations
    UpsertReviewer {
        name: String,
        phone: String,
        now: i64,
        reply: oneshot::Sender<StateResponse<i64>>,
    },
    GetReviewer {
        id: i64,
        reply: oneshot::Sender<StateResponse<Option<Reviewer>>>,
    },
    MarkKnownContact {
        id: i64,
        reply: oneshot::Sender<StateResponse<()>>,
    },

    // Progress row operations
    CreateRecords {
        campaign_id: String,
        reviewer_id: i64,
        store_ids: Vec<String>,
        now: i64,
        reply: oneshot::Sender<StateResponse<Vec<i64>>>,
    },
    SetStatus {
        ids: Vec<i64>,
        status: ProgressStatus,
        now: i64,
        reply: oneshot::Sender<StateResponse<usize>>,
    },
    ListByReviewer {
        reviewer_id: i64,
        reply: oneshot::Sender<StateResponse<Vec<ProgressRecord>>>,
    },
    ListStaleEarly {
        cutoff: i64,
        reply: oneshot::Sender<StateResponse<Vec<ProgressRecord>>>,
    },
    CancelByTimeout {
        reviewer_id: i64,
        campaign_id: String,
        store_ids: Vec<String>,
        now: i64,
        reply: oneshot::Sender<StateResponse<usize>>,
    },
    FindActiveDuplicates {
        campaign_id: String,
        store_ids: Vec<String>,
        reply: oneshot::Sender<StateResponse<Vec<String>>>,
    },
    AssignOption {
        id: i64,
        option: String,
        now: i64,
        reply: oneshot::Sender<StateResponse<bool>>,
    },
    SubmitForm {
        id: i64,
        form: Value,
        now: i64,
        reply: oneshot::Sender<StateResponse<bool>>,
    },
    UpdateFormField {
        id: i64,
        field: String,
        value: String,
        now: i64,
        reply: oneshot::Sender<StateResponse<bool>>,
    },
    CountReserved {
        campaign_id: String,
        since: Option<i64>,
        reply: oneshot::Sender<StateResponse<i64>>,
    },
    SetReviewDeadline {
        id: i64,
        deadline: NaiveDate,
        now: i64,
        reply: oneshot::Sender<StateResponse<bool>>,
    },
    ReviewDeadlines {
        dates: Vec<NaiveDate>,
        today: NaiveDate,
        reply: oneshot::Sender<StateResponse<Vec<ProgressRecord>>>,
    },
    MarkReminded {
        id: i64,
        date: NaiveDate,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    PurgeTerminalBefore {
        cutoff: i64,
        reply: oneshot::Sender<StateResponse<usize>>,
    },

    // Shutdown
    Shutdown,
}
