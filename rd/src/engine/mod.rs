//! SessionEngine - the conversation step machine
//!
//! `handle` is the only entry point. It locks the reviewer's session, runs
//! the transition on a working copy and writes the copy back only when the
//! transition succeeds, so a failed or panicking transition leaves the stored
//! step and scratch untouched.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use tracing::{debug, error};

use crate::clock::Clock;
use crate::collab::Collaborators;
use crate::config::EngineConfig;
use crate::domain::{
    Button, CANCEL, CONTINUE, HOME, Intent, Response, ReviewerId, ReviewerIdentity, SessionState, Step,
};
use crate::error::EngineError;
use crate::session::SessionStore;

mod campaign;
mod cancel;
mod edit;
mod form;
pub mod form_parser;
mod guide;
mod identifiers;
mod inquiry;
mod menu;
mod passive;
mod recovery;
pub mod templates;

pub use form::{FormBatch, attribute_blocks};
pub use identifiers::{CapacityVerdict, CommitOutcome, IdentifierCheck, ReplacementError, validate_replacements};
pub use recovery::{RecoveryPlan, plan_recovery};

type Transition = Result<Response, EngineError>;

pub struct SessionEngine {
    sessions: Arc<SessionStore>,
    collab: Collaborators,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    /// Serializes capacity check + record creation per campaign
    commit_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionEngine {
    pub fn new(sessions: Arc<SessionStore>, collab: Collaborators, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self {
            sessions,
            collab,
            clock,
            config,
            commit_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Handle one inbound message; never fails
    pub async fn handle(&self, identity: &ReviewerIdentity, text: &str) -> Response {
        let now = self.clock.now_ms();
        let intent = Intent::decode(text);
        let mut guard = self.sessions.get(identity, now).await;
        debug!(reviewer = %identity, step = ?guard.step, ?intent, "handle: called");

        let mut working = guard.clone();
        let outcome = AssertUnwindSafe(self.transition(&mut working, intent))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(response)) => {
                debug!(reviewer = %identity, from = ?guard.step, to = ?working.step, "handle: transition applied");
                *guard = working;
                response
            }
            Ok(Err(e)) => {
                error!(reviewer = %identity, step = ?guard.step, error = %e, "Transition failed, session left unchanged");
                Response::text(templates::ERROR_OCCURRED)
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(reviewer = %identity, step = ?guard.step, %message, "Transition panicked, session left unchanged");
                Response::text(templates::ERROR_OCCURRED)
            }
        }
    }

    async fn transition(&self, s: &mut SessionState, intent: Intent) -> Transition {
        let reviewer_id = self.ensure_reviewer(s).await?;

        if !s.recovery_checked {
            s.recovery_checked = true;
            if s.step == Step::Menu && s.scratch.is_empty() {
                if let Some(prompt) = self.recover(s, reviewer_id, None).await? {
                    let passes_through = match &intent {
                        Intent::FreeText(text) => form_parser::has_form_content(text),
                        Intent::Home | Intent::Back | Intent::Cancel | Intent::EditRequest => true,
                        _ => false,
                    };
                    if !passes_through {
                        return Ok(prompt);
                    }
                }
            }
        }

        if s.cancel_pending && intent != Intent::Cancel {
            s.cancel_pending = false;
        }

        match intent {
            Intent::Home => {
                s.reset();
                self.menu_prompt(s, reviewer_id).await
            }
            Intent::Back => self.back(s, reviewer_id).await,
            Intent::Resume | Intent::Continue => self.render_prompt(s, reviewer_id).await,
            Intent::Cancel => self.cancel(s, reviewer_id).await,
            Intent::EditRequest => self.enter_edit(s, reviewer_id).await,
            other => self.dispatch(s, reviewer_id, other).await,
        }
    }

    async fn ensure_reviewer(&self, s: &mut SessionState) -> Result<ReviewerId, EngineError> {
        if let Some(id) = s.reviewer_id {
            return Ok(id);
        }
        let id = self.collab.identity.resolve(&s.identity).await?;
        debug!(reviewer = %s.identity, id, "ensure_reviewer: resolved");
        s.reviewer_id = Some(id);
        Ok(id)
    }

    async fn dispatch(&self, s: &mut SessionState, reviewer_id: ReviewerId, intent: Intent) -> Transition {
        match s.step {
            Step::Menu => self.on_menu(s, reviewer_id, intent).await,
            Step::CampaignSelection => self.on_campaign_selection(s, reviewer_id, intent).await,
            Step::AccountCount => self.on_account_count(s, reviewer_id, intent).await,
            Step::IdentifierCollection => self.on_identifiers(s, reviewer_id, intent).await,
            Step::OptionOrGuide => self.on_option_or_guide(s, intent).await,
            Step::FormSubmission => self.on_form_submission(s, intent).await,
            Step::AwaitingPurchaseProof | Step::AwaitingReviewProof => {
                self.on_awaiting_proof(s, reviewer_id, intent).await
            }
            Step::Completed => {
                s.reset();
                let choice = intent.payload().and_then(menu::menu_choice);
                match choice {
                    Some(_) => self.on_menu(s, reviewer_id, intent).await,
                    None => self.menu_prompt(s, reviewer_id).await,
                }
            }
            Step::Inquiry => self.on_inquiry(s, intent).await,
            Step::InquirySubmission => self.on_inquiry_submission(s, reviewer_id, intent).await,
            Step::EditSelectRecord => self.on_edit_record(s, intent).await,
            Step::EditSelectField => self.on_edit_field(s, intent).await,
            Step::EditValue => self.on_edit_value(s, reviewer_id, intent).await,
        }
    }

    /// Re-render whatever the current step is waiting for
    async fn render_prompt(&self, s: &mut SessionState, reviewer_id: ReviewerId) -> Transition {
        match s.step {
            Step::Menu => self.menu_prompt(s, reviewer_id).await,
            Step::CampaignSelection => self.show_campaigns(s, reviewer_id).await,
            Step::AccountCount | Step::IdentifierCollection => self.identifier_prompt(s).await,
            Step::OptionOrGuide | Step::FormSubmission => self.purchase_prompt(s).await,
            Step::AwaitingPurchaseProof | Step::AwaitingReviewProof => self.refresh_awaiting(s, reviewer_id).await,
            Step::Completed => Ok(Response::text(templates::ALL_DONE).with_buttons(home_button())),
            Step::Inquiry => Ok(inquiry::inquiry_prompt()),
            Step::InquirySubmission => Ok(Response::text(templates::INQUIRY_SUBMISSION_PROMPT)),
            Step::EditSelectRecord | Step::EditSelectField | Step::EditValue => self.edit_prompt(s).await,
        }
    }

    /// Step-specific regression
    async fn back(&self, s: &mut SessionState, reviewer_id: ReviewerId) -> Transition {
        debug!(step = ?s.step, "back: called");
        match s.step {
            Step::Menu | Step::CampaignSelection | Step::Completed | Step::Inquiry | Step::EditSelectRecord => {
                s.reset();
                self.menu_prompt(s, reviewer_id).await
            }
            Step::AccountCount => self.show_campaigns(s, reviewer_id).await,
            Step::IdentifierCollection => self.back_from_identifiers(s).await,
            Step::OptionOrGuide => self.back_from_options(s).await,
            Step::FormSubmission | Step::AwaitingPurchaseProof | Step::AwaitingReviewProof => {
                Ok(self.ask_cancel_confirmation(s))
            }
            Step::InquirySubmission => {
                s.step = Step::Inquiry;
                Ok(inquiry::inquiry_prompt())
            }
            Step::EditSelectField | Step::EditValue => self.back_in_edit(s, reviewer_id).await,
        }
    }

    fn ask_cancel_confirmation(&self, s: &mut SessionState) -> Response {
        s.cancel_pending = true;
        Response::text(templates::CANCEL_CONFIRM).with_buttons(vec![
            Button::command("취소 확정", CANCEL),
            Button::command("계속 진행", CONTINUE),
        ])
    }

    fn commit_lock(&self, campaign_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.commit_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(campaign_id.to_string())
            .or_default()
            .clone()
    }

    fn upload_url(&self) -> String {
        format!("{}/upload", self.config.web_url.trim_end_matches('/'))
    }
}

fn home_button() -> Vec<Button> {
    vec![Button::command("처음으로", HOME)]
}

#[cfg(test)]
mod tests;
