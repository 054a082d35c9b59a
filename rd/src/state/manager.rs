//! StateManager - actor that owns the progress store
//!
//! Processes commands via channels for thread-safe access to persistent state.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use progressstore::{NewProgress, ProgressRecord, ProgressStatus, Reviewer, Store};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::collab::{CollabResult, IdentityResolver, ProgressStore};
use crate::domain::{ReviewerId, ReviewerIdentity};

use super::messages::{StateCommand, StateError, StateResponse};

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
    clock: Arc<dyn Clock>,
}

impl StateManager {
    /// Spawn a new StateManager actor over the store in `store_dir`
    pub fn spawn(store_dir: impl AsRef<Path>, clock: Arc<dyn Clock>) -> eyre::Result<Self> {
        debug!(store_dir = %store_dir.as_ref().display(), "spawn: called");
        let store = Store::open(store_dir.as_ref())?;
        Ok(Self::spawn_with_store(store, clock))
    }

    /// Spawn over an already opened store
    pub fn spawn_with_store(store: Store, clock: Arc<dyn Clock>) -> Self {
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(actor_loop(store, rx));
        info!("StateManager spawned");
        Self { tx, clock }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<StateResponse<T>>) -> StateCommand) -> StateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    fn now(&self) -> i64 {
        self.clock.now_ms()
    }

    // === Reviewer operations ===

    pub async fn upsert_reviewer(&self, name: &str, phone: &str) -> StateResponse<i64> {
        debug!(%name, "upsert_reviewer: called");
        let now = self.now();
        self.request(|reply| StateCommand::UpsertReviewer {
            name: name.to_string(),
            phone: phone.to_string(),
            now,
            reply,
        })
        .await
    }

    pub async fn reviewer(&self, id: i64) -> StateResponse<Option<Reviewer>> {
        debug!(id, "reviewer: called");
        self.request(|reply| StateCommand::GetReviewer { id, reply }).await
    }

    /// Get a reviewer, returning error if not found
    pub async fn reviewer_required(&self, id: i64) -> StateResponse<Reviewer> {
        self.reviewer(id)
            .await?
            .ok_or_else(|| StateError::NotFound(format!("Reviewer {}", id)))
    }

    pub async fn mark_known_contact(&self, id: i64) -> StateResponse<()> {
        debug!(id, "mark_known_contact: called");
        self.request(|reply| StateCommand::MarkKnownContact { id, reply }).await
    }

    // === Progress operations ===

    pub async fn create_records(&self, campaign_id: &str, reviewer_id: i64, store_ids: &[String]) -> StateResponse<Vec<i64>> {
        debug!(%campaign_id, reviewer_id, ?store_ids, "create_records: called");
        let now = self.now();
        self.request(|reply| StateCommand::CreateRecords {
            campaign_id: campaign_id.to_string(),
            reviewer_id,
            store_ids: store_ids.to_vec(),
            now,
            reply,
        })
        .await
    }

    pub async fn set_status(&self, ids: &[i64], status: ProgressStatus) -> StateResponse<usize> {
        debug!(?ids, %status, "set_status: called");
        let now = self.now();
        self.request(|reply| StateCommand::SetStatus {
            ids: ids.to_vec(),
            status,
            now,
            reply,
        })
        .await
    }

    pub async fn list_by_reviewer(&self, reviewer_id: i64) -> StateResponse<Vec<ProgressRecord>> {
        debug!(reviewer_id, "list_by_reviewer: called");
        self.request(|reply| StateCommand::ListByReviewer { reviewer_id, reply })
            .await
    }

    pub async fn list_stale_early(&self, cutoff: i64) -> StateResponse<Vec<ProgressRecord>> {
        debug!(cutoff, "list_stale_early: called");
        self.request(|reply| StateCommand::ListStaleEarly { cutoff, reply }).await
    }

    pub async fn cancel_by_timeout(&self, reviewer_id: i64, campaign_id: &str, store_ids: &[String]) -> StateResponse<usize> {
        debug!(reviewer_id, %campaign_id, ?store_ids, "cancel_by_timeout: called");
        let now = self.now();
        self.request(|reply| StateCommand::CancelByTimeout {
            reviewer_id,
            campaign_id: campaign_id.to_string(),
            store_ids: store_ids.to_vec(),
            now,
            reply,
        })
        .await
    }

    pub async fn find_active_duplicates(&self, campaign_id: &str, store_ids: &[String]) -> StateResponse<Vec<String>> {
        debug!(%campaign_id, ?store_ids, "find_active_duplicates: called");
        self.request(|reply| StateCommand::FindActiveDuplicates {
            campaign_id: campaign_id.to_string(),
            store_ids: store_ids.to_vec(),
            reply,
        })
        .await
    }

    pub async fn assign_option(&self, id: i64, option: &str) -> StateResponse<bool> {
        debug!(id, %option, "assign_option: called");
        let now = self.now();
        self.request(|reply| StateCommand::AssignOption {
            id,
            option: option.to_string(),
            now,
            reply,
        })
        .await
    }

    pub async fn submit_form(&self, id: i64, form: &Value) -> StateResponse<bool> {
        debug!(id, "submit_form: called");
        let now = self.now();
        self.request(|reply| StateCommand::SubmitForm {
            id,
            form: form.clone(),
            now,
            reply,
        })
        .await
    }

    pub async fn update_form_field(&self, id: i64, field: &str, value: &str) -> StateResponse<bool> {
        debug!(id, %field, "update_form_field: called");
        let now = self.now();
        self.request(|reply| StateCommand::UpdateFormField {
            id,
            field: field.to_string(),
            value: value.to_string(),
            now,
            reply,
        })
        .await
    }

    pub async fn count_reserved(&self, campaign_id: &str, since: Option<i64>) -> StateResponse<i64> {
        debug!(%campaign_id, ?since, "count_reserved: called");
        self.request(|reply| StateCommand::CountReserved {
            campaign_id: campaign_id.to_string(),
            since,
            reply,
        })
        .await
    }

    /// Set by the proof-upload channel once a purchase is verified
    pub async fn set_review_deadline(&self, id: i64, deadline: NaiveDate) -> StateResponse<bool> {
        debug!(id, %deadline, "set_review_deadline: called");
        let now = self.now();
        self.request(|reply| StateCommand::SetReviewDeadline {
            id,
            deadline,
            now,
            reply,
        })
        .await
    }

    pub async fn review_deadlines(&self, dates: &[NaiveDate], today: NaiveDate) -> StateResponse<Vec<ProgressRecord>> {
        debug!(?dates, %today, "review_deadlines: called");
        self.request(|reply| StateCommand::ReviewDeadlines {
            dates: dates.to_vec(),
            today,
            reply,
        })
        .await
    }

    pub async fn mark_reminded(&self, id: i64, date: NaiveDate) -> StateResponse<()> {
        debug!(id, %date, "mark_reminded: called");
        self.request(|reply| StateCommand::MarkReminded { id, date, reply }).await
    }

    pub async fn purge_terminal_before(&self, cutoff: i64) -> StateResponse<usize> {
        debug!(cutoff, "purge_terminal_before: called");
        self.request(|reply| StateCommand::PurgeTerminalBefore { cutoff, reply })
            .await
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> StateResponse<()> {
        debug!("shutdown: called");
        self.tx
            .send(StateCommand::Shutdown)
            .await
            .map_err(|_| StateError::ChannelError)
    }
}

fn store_err(e: eyre::Report) -> StateError {
    StateError::StoreError(e.to_string())
}

/// The actor loop that processes commands
async fn actor_loop(mut store: Store, mut rx: mpsc::Receiver<StateCommand>) {
    debug!("StateManager actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StateCommand::UpsertReviewer { name, phone, now, reply } => {
                debug!(%name, "actor_loop: UpsertReviewer command");
                let _ = reply.send(store.upsert_reviewer(&name, &phone, now).map_err(store_err));
            }

            StateCommand::GetReviewer { id, reply } => {
                debug!(id, "actor_loop: GetReviewer command");
                let _ = reply.send(store.reviewer(id).map_err(store_err));
            }

            StateCommand::MarkKnownContact { id, reply } => {
                debug!(id, "actor_loop: MarkKnownContact command");
                let _ = reply.send(store.mark_known_contact(id).map_err(store_err));
            }

            StateCommand::CreateRecords {
                campaign_id,
                reviewer_id,
                store_ids,
                now,
                reply,
            } => {
                debug!(%campaign_id, reviewer_id, "actor_loop: CreateRecords command");
                let new = NewProgress::batch(campaign_id, reviewer_id, &store_ids[..], now);
                let _ = reply.send(store.insert_progress(&new).map_err(store_err));
            }

            StateCommand::SetStatus { ids, status, now, reply } => {
                debug!(?ids, %status, "actor_loop: SetStatus command");
                let _ = reply.send(store.set_status(&ids, status, now).map_err(store_err));
            }

            StateCommand::ListByReviewer { reviewer_id, reply } => {
                debug!(reviewer_id, "actor_loop: ListByReviewer command");
                let _ = reply.send(store.list_by_reviewer(reviewer_id).map_err(store_err));
            }

            StateCommand::ListStaleEarly { cutoff, reply } => {
                debug!(cutoff, "actor_loop: ListStaleEarly command");
                let _ = reply.send(store.list_stale_early(cutoff).map_err(store_err));
            }

            StateCommand::CancelByTimeout {
                reviewer_id,
                campaign_id,
                store_ids,
                now,
                reply,
            } => {
                debug!(reviewer_id, %campaign_id, "actor_loop: CancelByTimeout command");
                let result = store
                    .cancel_by_timeout(reviewer_id, &campaign_id, &store_ids, now)
                    .map_err(store_err);
                let _ = reply.send(result);
            }

            StateCommand::FindActiveDuplicates {
                campaign_id,
                store_ids,
                reply,
            } => {
                debug!(%campaign_id, "actor_loop: FindActiveDuplicates command");
                let result = store
                    .find_active_duplicates(&campaign_id, &store_ids)
                    .map_err(store_err);
                let _ = reply.send(result);
            }

            StateCommand::AssignOption { id, option, now, reply } => {
                debug!(id, "actor_loop: AssignOption command");
                let _ = reply.send(store.assign_option(id, &option, now).map_err(store_err));
            }

            StateCommand::SubmitForm { id, form, now, reply } => {
                debug!(id, "actor_loop: SubmitForm command");
                let _ = reply.send(store.submit_form(id, &form, now).map_err(store_err));
            }

            StateCommand::UpdateFormField {
                id,
                field,
                value,
                now,
                reply,
            } => {
                debug!(id, %field, "actor_loop: UpdateFormField command");
                let result = store.update_form_field(id, &field, &value, now).map_err(store_err);
                let _ = reply.send(result);
            }

            StateCommand::CountReserved {
                campaign_id,
                since,
                reply,
            } => {
                debug!(%campaign_id, ?since, "actor_loop: CountReserved command");
                let _ = reply.send(store.count_reserved(&campaign_id, since).map_err(store_err));
            }

            StateCommand::SetReviewDeadline {
                id,
                deadline,
                now,
                reply,
            } => {
                debug!(id, %deadline, "actor_loop: SetReviewDeadline command");
                let _ = reply.send(store.set_review_deadline(id, deadline, now).map_err(store_err));
            }

            StateCommand::ReviewDeadlines { dates, today, reply } => {
                debug!(?dates, "actor_loop: ReviewDeadlines command");
                let _ = reply.send(store.review_deadlines_on(&dates, today).map_err(store_err));
            }

            StateCommand::MarkReminded { id, date, reply } => {
                debug!(id, "actor_loop: MarkReminded command");
                let _ = reply.send(store.mark_reminded(id, date).map_err(store_err));
            }

            StateCommand::PurgeTerminalBefore { cutoff, reply } => {
                debug!(cutoff, "actor_loop: PurgeTerminalBefore command");
                let _ = reply.send(store.purge_terminal_before(cutoff).map_err(store_err));
            }

            StateCommand::Shutdown => {
                info!("StateManager shutting down");
                break;
            }
        }
    }

    debug!("StateManager actor stopped");
}

#[async_trait]
impl IdentityResolver for StateManager {
    async fn resolve(&self, identity: &ReviewerIdentity) -> CollabResult<ReviewerId> {
        Ok(self.upsert_reviewer(&identity.name, &identity.phone).await?)
    }

    async fn identity_of(&self, reviewer_id: ReviewerId) -> CollabResult<Option<ReviewerIdentity>> {
        Ok(self
            .reviewer(reviewer_id)
            .await?
            .map(|r| ReviewerIdentity::new(r.name, r.phone)))
    }

    async fn record_known_contact(&self, identity: &ReviewerIdentity) -> CollabResult<bool> {
        let id = self.upsert_reviewer(&identity.name, &identity.phone).await?;
        if self.reviewer_required(id).await?.known_contact {
            return Ok(false);
        }
        self.mark_known_contact(id).await?;
        Ok(true)
    }
}

#[async_trait]
impl ProgressStore for StateManager {
    async fn create_records(&self, campaign_id: &str, reviewer_id: ReviewerId, store_ids: &[String]) -> CollabResult<Vec<i64>> {
        Ok(StateManager::create_records(self, campaign_id, reviewer_id, store_ids).await?)
    }

    async fn set_status(&self, record_ids: &[i64], status: ProgressStatus) -> CollabResult<usize> {
        Ok(StateManager::set_status(self, record_ids, status).await?)
    }

    async fn find_by_reviewer(&self, reviewer_id: ReviewerId) -> CollabResult<Vec<ProgressRecord>> {
        Ok(self.list_by_reviewer(reviewer_id).await?)
    }

    async fn find_stale_early_status(&self, older_than: i64) -> CollabResult<Vec<ProgressRecord>> {
        Ok(self.list_stale_early(older_than).await?)
    }

    async fn cancel_by_timeout(&self, reviewer_id: ReviewerId, campaign_id: &str, store_ids: &[String]) -> CollabResult<usize> {
        Ok(StateManager::cancel_by_timeout(self, reviewer_id, campaign_id, store_ids).await?)
    }

    async fn find_active_duplicates(&self, campaign_id: &str, store_ids: &[String]) -> CollabResult<Vec<String>> {
        Ok(StateManager::find_active_duplicates(self, campaign_id, store_ids).await?)
    }

    async fn assign_option(&self, record_id: i64, option: &str) -> CollabResult<bool> {
        Ok(StateManager::assign_option(self, record_id, option).await?)
    }

    async fn submit_form(&self, record_id: i64, form: &Value) -> CollabResult<bool> {
        Ok(StateManager::submit_form(self, record_id, form).await?)
    }

    async fn update_form_field(&self, record_id: i64, field: &str, value: &str) -> CollabResult<bool> {
        Ok(StateManager::update_form_field(self, record_id, field, value).await?)
    }

    async fn count_reserved(&self, campaign_id: &str, since: Option<i64>) -> CollabResult<i64> {
        Ok(StateManager::count_reserved(self, campaign_id, since).await?)
    }

    async fn find_review_deadlines(&self, dates: &[NaiveDate], today: NaiveDate) -> CollabResult<Vec<ProgressRecord>> {
        Ok(self.review_deadlines(dates, today).await?)
    }

    async fn mark_reminded(&self, record_id: i64, date: NaiveDate) -> CollabResult<()> {
        Ok(StateManager::mark_reminded(self, record_id, date).await?)
    }

    async fn purge_terminal_before(&self, cutoff: i64) -> CollabResult<usize> {
        Ok(StateManager::purge_terminal_before(self, cutoff).await?)
    }
}
