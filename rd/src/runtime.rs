//! Process wiring: every collaborator is built once here and shared read-only

use std::path::Path;
use std::sync::Arc;

use progressstore::Store;
use tracing::info;

use crate::clock::Clock;
use crate::collab::{
    Collaborators, KeywordAssistant, LocalInquiryRouter, MemoryPromotions, OutboxNotifier, StoreBackedCatalog,
};
use crate::config::Config;
use crate::engine::SessionEngine;
use crate::reconciler::TimeoutReconciler;
use crate::session::SessionStore;
use crate::state::StateManager;

/// A fully wired engine + reconciler over one progress store
pub struct Runtime {
    pub state: StateManager,
    pub sessions: Arc<SessionStore>,
    pub engine: Arc<SessionEngine>,
    pub reconciler: Arc<TimeoutReconciler>,
    pub outbox: Arc<OutboxNotifier>,
    pub inquiries: Arc<LocalInquiryRouter>,
    pub promotions: Arc<MemoryPromotions>,
}

impl Runtime {
    /// Open the store under `config.storage.store_dir`
    pub fn build(config: &Config, clock: Arc<dyn Clock>) -> eyre::Result<Self> {
        let state = StateManager::spawn(Path::new(&config.storage.store_dir), clock.clone())?;
        Ok(Self::with_state(config, state, clock))
    }

    /// Use an in-memory store
    pub fn in_memory(config: &Config, clock: Arc<dyn Clock>) -> eyre::Result<Self> {
        let state = StateManager::spawn_with_store(Store::open_in_memory()?, clock.clone());
        Ok(Self::with_state(config, state, clock))
    }

    fn with_state(config: &Config, state: StateManager, clock: Arc<dyn Clock>) -> Self {
        let progress = Arc::new(state.clone());
        let outbox = Arc::new(OutboxNotifier::new());
        let inquiries = Arc::new(LocalInquiryRouter::new());
        let promotions = Arc::new(MemoryPromotions::new());
        let catalog = Arc::new(StoreBackedCatalog::new(
            config.campaigns.clone(),
            progress.clone(),
            clock.clone(),
        ));

        let collab = Collaborators {
            identity: progress.clone(),
            catalog,
            progress,
            notifier: outbox.clone(),
            inquiries: inquiries.clone(),
            assistant: Arc::new(KeywordAssistant::default()),
            promotions: promotions.clone(),
        };

        let sessions = Arc::new(SessionStore::new());
        let engine = Arc::new(SessionEngine::new(
            sessions.clone(),
            collab.clone(),
            clock.clone(),
            config.engine.clone(),
        ));
        let reconciler = Arc::new(TimeoutReconciler::new(
            sessions.clone(),
            collab,
            clock,
            config.reconciler.clone(),
        ));
        info!(campaigns = config.campaigns.len(), "Runtime wired");

        Self {
            state,
            sessions,
            engine,
            reconciler,
            outbox,
            inquiries,
            promotions,
        }
    }
}
