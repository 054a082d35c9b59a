//! In-memory session registry

mod store;

pub use store::{SessionGuard, SessionLock, SessionStore};
