//! ReviewDaemon - conversation engine for review campaigns
//!
//! Reviewers register store identifiers for a campaign, receive a purchase
//! guide, submit forms and then upload screenshots. This crate tracks where
//! each reviewer stands in that workflow.
//!
//! # Modules
//!
//! - [`session`] - volatile per-reviewer conversation state
//! - [`engine`] - the step machine that handles inbound messages
//! - [`reconciler`] - background warn/cancel of stalled registrations
//! - [`state`] - actor owning the durable progress store
//! - [`collab`] - collaborator traits and their local implementations
//! - [`config`] - configuration types and loading

pub mod cli;
pub mod clock;
pub mod collab;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod reconciler;
pub mod runtime;
pub mod session;
pub mod state;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use collab::{Collaborators, Notification, OutboxNotifier};
pub use config::{Config, EngineConfig, ReconcilerConfig};
pub use domain::{Intent, ProgressStatus, Response, ReviewerIdentity, SessionState, Step};
pub use engine::SessionEngine;
pub use error::{CollabError, EngineError};
pub use reconciler::{TickReport, TimeoutReconciler};
pub use runtime::Runtime;
pub use session::SessionStore;
pub use state::{StateCommand, StateError, StateManager, StateResponse};
