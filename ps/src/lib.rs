//! ProgressStore - durable progress records for review campaigns
//!
//! One row per (campaign, reviewer, store identifier). Rows outlive the
//! process: the conversation engine keeps its own state in memory and uses
//! these rows to rebuild a reviewer's position after a restart.
//!
//! # Layout
//!
//! ```text
//! {store_dir}/
//! └── progress.db      # SQLite: reviewers, progress
//! ```
//!
//! # Example
//!
//! ```ignore
//! use progressstore::{NewProgress, ProgressStatus, Store};
//!
//! let mut store = Store::open(".progress")?;
//! let reviewer = store.upsert_reviewer("홍길동", "010-1234-5678")?;
//! let ids = store.insert_progress(&NewProgress::batch("camp-1", reviewer, &["abc"], now_ms()))?;
//! store.set_status(&ids, ProgressStatus::GuideSent, now_ms())?;
//! ```

mod record;
mod store;

pub use record::{NewProgress, ProgressRecord, ProgressStatus, Reviewer};
pub use store::Store;

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
