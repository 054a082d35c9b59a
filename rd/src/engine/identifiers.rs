//! Steps 2-3: account count, identifier collection, duplicate resolution and
//! the capacity-checked commit that creates the durable rows

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{
    AccountCountData, Button, Campaign, DailyCapacity, DuplicateResolution, FormSubmissionData, IdentifierCollectionData, Intent,
    MultiSelect, ProgressStatus, ResolutionMode, Response, ReviewerId, Scratch, SessionState, Step,
};
use crate::error::EngineError;

use super::{SessionEngine, Transition, form_parser, home_button, templates};

const COUNT_TAG: &str = "count_";
const DUP_PROCEED: &str = "dup_proceed";
const DUP_REPLACE: &str = "dup_replace";

/// Result of checking a freshly submitted identifier batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierCheck {
    WrongCount { expected: usize, got: usize },
    Clean(Vec<String>),
    Duplicates { accepted: Vec<String>, duplicates: Vec<String> },
}

/// Whether a campaign can take `n` more identifiers right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityVerdict {
    Available,
    Closed,
    Exhausted { remaining: i64 },
    DailyCapReached,
}

impl CapacityVerdict {
    pub fn evaluate(active: bool, remaining: i64, daily: DailyCapacity, requested: usize) -> Self {
        let requested = requested as i64;
        if !active {
            Self::Closed
        } else if remaining < requested {
            Self::Exhausted { remaining }
        } else if !daily.allows(requested) {
            Self::DailyCapReached
        } else {
            Self::Available
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommitOutcome {
    Committed {
        campaign: Campaign,
        record_ids: Vec<i64>,
        remaining_after: i64,
    },
    Rejected {
        campaign: Option<Campaign>,
        verdict: CapacityVerdict,
    },
    StoreFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplacementError {
    #[error("expected {expected} identifiers, got {got}")]
    WrongCount { expected: usize, got: usize },

    #[error("already part of this batch: {0}")]
    OverlapsAccepted(String),

    #[error("entered more than once: {0}")]
    Repeated(String),

    #[error("still a duplicate: {0}")]
    StillDuplicate(String),
}

impl ReplacementError {
    fn message(&self) -> String {
        match self {
            Self::WrongCount { expected, got } => templates::wrong_id_count(*expected, *got),
            Self::OverlapsAccepted(id) => format!("'{id}'는 이미 이번 신청에 포함된 아이디입니다. 다른 아이디를 입력해주세요."),
            Self::Repeated(id) => format!("'{id}'를 두 번 입력하셨어요. 서로 다른 아이디를 입력해주세요."),
            Self::StillDuplicate(id) => format!("'{id}'는 이미 참여 중인 아이디입니다. 다른 아이디를 입력해주세요."),
        }
    }
}

/// Check replacement identifiers against the pending resolution
///
/// Only the batch itself is checked here; the store duplicate check runs
/// separately once this passes.
pub fn validate_replacements(resolution: &DuplicateResolution, replacements: &[String]) -> Result<Vec<String>, ReplacementError> {
    if replacements.len() != resolution.duplicates.len() {
        return Err(ReplacementError::WrongCount {
            expected: resolution.duplicates.len(),
            got: replacements.len(),
        });
    }
    let mut seen = HashSet::new();
    for id in replacements {
        if resolution.accepted.contains(id) {
            return Err(ReplacementError::OverlapsAccepted(id.clone()));
        }
        if resolution.duplicates.contains(id) {
            return Err(ReplacementError::StillDuplicate(id.clone()));
        }
        if !seen.insert(id.as_str()) {
            return Err(ReplacementError::Repeated(id.clone()));
        }
    }
    Ok(replacements.to_vec())
}

fn count_choice(payload: &str) -> Option<usize> {
    match payload.strip_prefix(COUNT_TAG) {
        Some(n) => n.parse().ok(),
        None => form_parser::parse_number(payload),
    }
}

fn dedup_preserving_order(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

fn duplicate_prompt(resolution: &DuplicateResolution) -> Response {
    let mut buttons = Vec::new();
    if !resolution.accepted.is_empty() {
        buttons.push(Button::tagged(
            format!("{}개만 진행", resolution.accepted.len()),
            DUP_PROCEED,
        ));
    }
    buttons.push(Button::tagged("다른 아이디로 교체", DUP_REPLACE));
    Response::text(templates::duplicates_found(&resolution.duplicates, &resolution.accepted)).with_buttons(buttons)
}

impl SessionEngine {
    pub(super) fn account_count_prompt(&self, campaign: &Campaign) -> Response {
        let max = self.config.max_accounts;
        let buttons = (1..=max)
            .map(|n| Button::tagged(format!("{n}개"), &format!("{COUNT_TAG}{n}")))
            .collect();
        Response::text(templates::ask_account_count(campaign, max)).with_buttons(buttons)
    }

    /// Identifier request, offering identifiers used in earlier campaigns
    async fn store_ids_prompt(&self, reviewer_id: Option<ReviewerId>, count: usize) -> Result<Response, EngineError> {
        let response = Response::text(templates::ask_store_ids(count));
        let Some(reviewer_id) = reviewer_id else {
            return Ok(response);
        };
        let mut previous: Vec<String> = Vec::new();
        for record in self.collab.progress.find_by_reviewer(reviewer_id).await? {
            if !previous.contains(&record.store_id) {
                previous.push(record.store_id);
            }
        }
        if previous.is_empty() {
            return Ok(response);
        }
        Ok(response.with_multi_select(MultiSelect {
            options: previous,
            min: count,
            max: count,
        }))
    }

    pub(super) async fn on_account_count(&self, s: &mut SessionState, reviewer_id: ReviewerId, intent: Intent) -> Transition {
        let Scratch::AccountCount(data) = &s.scratch else {
            return self.show_campaigns(s, reviewer_id).await;
        };
        let campaign_id = data.campaign_id.clone();
        let max = self.config.max_accounts;
        let count = intent.payload().and_then(count_choice).filter(|n| (1..=max).contains(n));

        let Some(count) = count else {
            return Ok(self.identifier_prompt(s).await?.prepend(templates::UNKNOWN_INPUT));
        };

        debug!(reviewer = %s.identity, %campaign_id, count, "on_account_count: accepted");
        s.enter(
            Step::IdentifierCollection,
            Scratch::Identifiers(IdentifierCollectionData {
                campaign_id,
                account_count: count,
                resolution: None,
            }),
        );
        self.store_ids_prompt(Some(reviewer_id), count).await
    }

    /// Prompt for steps 2 and 3
    pub(super) async fn identifier_prompt(&self, s: &mut SessionState) -> Transition {
        match &s.scratch {
            Scratch::AccountCount(data) => match self.collab.catalog.campaign_by_id(&data.campaign_id).await? {
                Some(campaign) => Ok(self.account_count_prompt(&campaign)),
                None => {
                    s.reset();
                    Ok(Response::text(templates::campaign_closed()).with_buttons(home_button()))
                }
            },
            Scratch::Identifiers(data) => match &data.resolution {
                None => self.store_ids_prompt(s.reviewer_id, data.account_count).await,
                Some(resolution) if resolution.mode == ResolutionMode::Ask => Ok(duplicate_prompt(resolution)),
                Some(resolution) => Ok(Response::text(templates::ask_replacements(resolution.duplicates.len()))),
            },
            _ => {
                s.reset();
                Ok(Response::text(templates::UNKNOWN_INPUT).with_buttons(home_button()))
            }
        }
    }

    pub(super) async fn back_from_identifiers(&self, s: &mut SessionState) -> Transition {
        let Scratch::Identifiers(data) = &mut s.scratch else {
            s.reset();
            return Ok(Response::text(templates::UNKNOWN_INPUT).with_buttons(home_button()));
        };

        // Leaving replacement mode returns to the proceed/replace choice first
        if let Some(resolution) = data.resolution.as_mut() {
            if resolution.mode == ResolutionMode::Replace {
                resolution.mode = ResolutionMode::Ask;
                return Ok(duplicate_prompt(resolution));
            }
        }

        let campaign_id = data.campaign_id.clone();
        let Some(campaign) = self.collab.catalog.campaign_by_id(&campaign_id).await? else {
            s.reset();
            return Ok(Response::text(templates::campaign_closed()).with_buttons(home_button()));
        };
        s.enter(
            Step::AccountCount,
            Scratch::AccountCount(AccountCountData { campaign_id }),
        );
        Ok(self.account_count_prompt(&campaign))
    }

    pub(super) async fn on_identifiers(&self, s: &mut SessionState, reviewer_id: ReviewerId, intent: Intent) -> Transition {
        let Scratch::Identifiers(data) = s.scratch.clone() else {
            s.reset();
            return self.menu_prompt(s, reviewer_id).await;
        };
        let payload = intent.payload().unwrap_or_default();

        match data.resolution.clone() {
            None => {
                let ids = dedup_preserving_order(form_parser::parse_identifiers(payload));
                match self.check_identifiers(&data, ids).await? {
                    IdentifierCheck::WrongCount { expected, got } => {
                        Ok(Response::text(templates::wrong_id_count(expected, got)))
                    }
                    IdentifierCheck::Clean(ids) => self.commit(s, reviewer_id, &data.campaign_id, ids).await,
                    IdentifierCheck::Duplicates { accepted, duplicates } => {
                        info!(reviewer = %s.identity, campaign_id = %data.campaign_id, ?duplicates, "Duplicate identifiers submitted");
                        let resolution = DuplicateResolution {
                            accepted,
                            duplicates,
                            mode: ResolutionMode::Ask,
                        };
                        let prompt = duplicate_prompt(&resolution);
                        s.scratch = Scratch::Identifiers(IdentifierCollectionData {
                            resolution: Some(resolution),
                            ..data
                        });
                        Ok(prompt)
                    }
                }
            }
            Some(resolution) if resolution.mode == ResolutionMode::Ask => {
                let proceed = payload == DUP_PROCEED || payload == "1";
                let replace = payload == DUP_REPLACE || payload == "2";
                if proceed && !resolution.accepted.is_empty() {
                    self.commit(s, reviewer_id, &data.campaign_id, resolution.accepted).await
                } else if replace {
                    let prompt = Response::text(templates::ask_replacements(resolution.duplicates.len()));
                    s.scratch = Scratch::Identifiers(IdentifierCollectionData {
                        resolution: Some(DuplicateResolution {
                            mode: ResolutionMode::Replace,
                            ..resolution
                        }),
                        ..data
                    });
                    Ok(prompt)
                } else {
                    Ok(duplicate_prompt(&resolution).prepend(templates::UNKNOWN_INPUT))
                }
            }
            Some(resolution) => {
                let ids = form_parser::parse_identifiers(payload);
                let replacements = match validate_replacements(&resolution, &ids) {
                    Ok(replacements) => replacements,
                    Err(e) => return Ok(Response::text(e.message())),
                };
                let still = self
                    .collab
                    .progress
                    .find_active_duplicates(&data.campaign_id, &replacements)
                    .await?;
                if let Some(first) = still.into_iter().next() {
                    return Ok(Response::text(ReplacementError::StillDuplicate(first).message()));
                }
                let mut ids = resolution.accepted;
                ids.extend(replacements);
                self.commit(s, reviewer_id, &data.campaign_id, ids).await
            }
        }
    }

    async fn check_identifiers(&self, data: &IdentifierCollectionData, ids: Vec<String>) -> Result<IdentifierCheck, EngineError> {
        if ids.len() != data.account_count {
            return Ok(IdentifierCheck::WrongCount {
                expected: data.account_count,
                got: ids.len(),
            });
        }
        let duplicates = self.collab.progress.find_active_duplicates(&data.campaign_id, &ids).await?;
        if duplicates.is_empty() {
            return Ok(IdentifierCheck::Clean(ids));
        }
        let accepted = ids.into_iter().filter(|id| !duplicates.contains(id)).collect();
        Ok(IdentifierCheck::Duplicates { accepted, duplicates })
    }

    /// Capacity check and record creation, serialized per campaign
    async fn try_commit(&self, reviewer_id: ReviewerId, campaign_id: &str, store_ids: &[String]) -> Result<CommitOutcome, EngineError> {
        let lock = self.commit_lock(campaign_id);
        let _guard = lock.lock().await;

        let Some(campaign) = self.collab.catalog.campaign_by_id(campaign_id).await? else {
            return Ok(CommitOutcome::Rejected {
                campaign: None,
                verdict: CapacityVerdict::Closed,
            });
        };
        let remaining = self.collab.catalog.remaining_capacity(campaign_id).await?;
        let daily = self.collab.catalog.remaining_daily_capacity(campaign_id).await?;
        let verdict = CapacityVerdict::evaluate(campaign.active, remaining, daily, store_ids.len());
        if verdict != CapacityVerdict::Available {
            return Ok(CommitOutcome::Rejected {
                campaign: Some(campaign),
                verdict,
            });
        }

        match self.collab.progress.create_records(campaign_id, reviewer_id, store_ids).await {
            Ok(record_ids) => Ok(CommitOutcome::Committed {
                campaign,
                record_ids,
                remaining_after: remaining - store_ids.len() as i64,
            }),
            Err(e) => {
                warn!(%campaign_id, reviewer_id, error = %e, "Failed to create progress records");
                Ok(CommitOutcome::StoreFailed)
            }
        }
    }

    async fn commit(&self, s: &mut SessionState, reviewer_id: ReviewerId, campaign_id: &str, store_ids: Vec<String>) -> Transition {
        match self.try_commit(reviewer_id, campaign_id, &store_ids).await? {
            CommitOutcome::Committed {
                campaign,
                record_ids,
                remaining_after,
            } => {
                info!(
                    reviewer = %s.identity,
                    campaign_id = %campaign.id,
                    count = store_ids.len(),
                    remaining_after,
                    "Registered identifiers"
                );
                self.after_commit(s, reviewer_id, campaign, store_ids, record_ids, remaining_after).await
            }
            CommitOutcome::Rejected { campaign, verdict } => {
                info!(reviewer = %s.identity, %campaign_id, ?verdict, "Registration rejected");
                let message = match (campaign, verdict) {
                    (Some(campaign), CapacityVerdict::Exhausted { remaining }) => {
                        templates::capacity_exhausted(&campaign, remaining)
                    }
                    (Some(campaign), CapacityVerdict::DailyCapReached) => templates::daily_cap_reached(&campaign),
                    _ => templates::campaign_closed(),
                };
                s.reset();
                Ok(Response::text(message).with_buttons(home_button()))
            }
            CommitOutcome::StoreFailed => Ok(Response::text(templates::ERROR_OCCURRED)),
        }
    }

    async fn after_commit(
        &self,
        s: &mut SessionState,
        reviewer_id: ReviewerId,
        campaign: Campaign,
        store_ids: Vec<String>,
        record_ids: Vec<i64>,
        remaining_after: i64,
    ) -> Transition {
        let collab = self.collab.clone();
        let identity = s.identity.clone();
        tokio::spawn(async move {
            match collab.identity.record_known_contact(&identity).await {
                Ok(true) => {
                    if let Err(e) = collab.notifier.send_contact_request(reviewer_id, &identity).await {
                        warn!(reviewer = %identity, error = %e, "Failed to send contact request");
                    }
                }
                Ok(false) => {}
                Err(e) => warn!(reviewer = %identity, error = %e, "Failed to record known contact"),
            }
        });

        if remaining_after <= 0 {
            let promotions = self.collab.promotions.clone();
            let campaign_id = campaign.id.clone();
            tokio::spawn(async move {
                match promotions.suspend(&campaign_id).await {
                    Ok(()) => info!(%campaign_id, "Suspended promotion, campaign is full"),
                    Err(e) => warn!(%campaign_id, error = %e, "Failed to suspend promotion"),
                }
            });
        }

        let mut data = FormSubmissionData::new(campaign.id.clone(), store_ids, record_ids);
        if !campaign.has_multiple_options() {
            data.option_cursor = data.store_ids.len();
        }
        s.selected_campaign_id = Some(campaign.id.clone());
        s.enter(Step::OptionOrGuide, Scratch::Purchase(data));
        if campaign.has_multiple_options() {
            return Ok(self.option_prompt(s, &campaign));
        }
        self.issue_guide(s, &campaign).await
    }

    /// Mark the rows `guideSent` and render the purchase guide
    pub(super) async fn issue_guide(&self, s: &mut SessionState, campaign: &Campaign) -> Transition {
        let Scratch::Purchase(data) = &s.scratch else {
            return Err(EngineError::Internal("issue_guide outside the purchase flow".to_string()));
        };
        // Rows left in `applied` are still swept by the timeout reconciler
        if let Err(e) = self.collab.progress.set_status(&data.record_ids, ProgressStatus::GuideSent).await {
            warn!(campaign_id = %campaign.id, error = %e, "Failed to mark rows guideSent");
        }
        Ok(self.guide_response(data, campaign))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolution(accepted: &[&str], duplicates: &[&str]) -> DuplicateResolution {
        DuplicateResolution {
            accepted: accepted.iter().map(|s| s.to_string()).collect(),
            duplicates: duplicates.iter().map(|s| s.to_string()).collect(),
            mode: ResolutionMode::Replace,
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_validate_replacements_accepts_fresh_ids() {
        let res = resolution(&["a"], &["b", "c"]);
        assert_eq!(validate_replacements(&res, &ids(&["x", "y"])), Ok(ids(&["x", "y"])));
    }

    #[test]
    fn test_validate_replacements_rejects() {
        let res = resolution(&["a"], &["b", "c"]);
        assert_eq!(
            validate_replacements(&res, &ids(&["x"])),
            Err(ReplacementError::WrongCount { expected: 2, got: 1 })
        );
        assert_eq!(
            validate_replacements(&res, &ids(&["a", "y"])),
            Err(ReplacementError::OverlapsAccepted("a".into()))
        );
        assert_eq!(
            validate_replacements(&res, &ids(&["x", "x"])),
            Err(ReplacementError::Repeated("x".into()))
        );
        assert_eq!(
            validate_replacements(&res, &ids(&["b", "y"])),
            Err(ReplacementError::StillDuplicate("b".into()))
        );
    }

    #[test]
    fn test_capacity_verdict() {
        assert_eq!(
            CapacityVerdict::evaluate(true, 3, DailyCapacity::Unlimited, 2),
            CapacityVerdict::Available
        );
        assert_eq!(
            CapacityVerdict::evaluate(true, 1, DailyCapacity::Unlimited, 2),
            CapacityVerdict::Exhausted { remaining: 1 }
        );
        assert_eq!(
            CapacityVerdict::evaluate(true, 10, DailyCapacity::Remaining(1), 2),
            CapacityVerdict::DailyCapReached
        );
        assert_eq!(
            CapacityVerdict::evaluate(false, 10, DailyCapacity::Unlimited, 1),
            CapacityVerdict::Closed
        );
    }

    #[test]
    fn test_count_choice() {
        assert_eq!(count_choice("count_3"), Some(3));
        assert_eq!(count_choice("2개"), Some(2));
        assert_eq!(count_choice("many"), None);
    }

    #[test]
    fn test_dedup_preserving_order() {
        assert_eq!(dedup_preserving_order(ids(&["b", "a", "b"])), ids(&["b", "a"]));
    }
}
