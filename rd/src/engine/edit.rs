//! Steps 11-13: correcting a submitted form field

use tracing::info;

use crate::domain::{Button, EditFlowData, Intent, ProgressRecord, Response, ReviewerId, Scratch, SessionState, Step};
use crate::error::EngineError;

use super::form_parser::{self, EDITABLE_FIELDS};
use super::{SessionEngine, Transition, home_button, templates};

const RECORD_TAG: &str = "record_";
const FIELD_TAG: &str = "field_";

fn is_editable(record: &ProgressRecord) -> bool {
    !record.status.is_terminal() && record.form.as_object().is_some_and(|form| !form.is_empty())
}

fn field_choice(payload: &str) -> Option<&'static str> {
    let payload = payload.trim();
    if let Some(name) = payload.strip_prefix(FIELD_TAG) {
        return EDITABLE_FIELDS.iter().copied().find(|f| *f == name);
    }
    if let Some(n) = form_parser::parse_number(payload) {
        return n.checked_sub(1).and_then(|idx| EDITABLE_FIELDS.get(idx)).copied();
    }
    EDITABLE_FIELDS.iter().copied().find(|f| *f == payload)
}

fn edit_data(s: &SessionState) -> Result<EditFlowData, EngineError> {
    match &s.scratch {
        Scratch::Edit(data) => Ok(data.clone()),
        _ => Err(EngineError::Internal("edit step without edit scratch".to_string())),
    }
}

impl SessionEngine {
    async fn edit_candidates(&self, reviewer_id: ReviewerId) -> Result<Vec<ProgressRecord>, EngineError> {
        let records = self.collab.progress.find_by_reviewer(reviewer_id).await?;
        Ok(records.into_iter().filter(is_editable).collect())
    }

    pub(super) async fn enter_edit(&self, s: &mut SessionState, reviewer_id: ReviewerId) -> Transition {
        let candidates = self.edit_candidates(reviewer_id).await?;
        if candidates.is_empty() {
            s.reset();
            return Ok(Response::text(templates::NOTHING_TO_EDIT).with_buttons(home_button()));
        }

        let mut data = EditFlowData {
            candidates: candidates.iter().map(|r| r.id).collect(),
            ..Default::default()
        };
        let step = if let [only] = candidates.as_slice() {
            data.record_id = Some(only.id);
            Step::EditSelectField
        } else {
            Step::EditSelectRecord
        };
        s.enter(step, Scratch::Edit(data));
        self.edit_prompt(s).await
    }

    /// Prompt for steps 11-13
    pub(super) async fn edit_prompt(&self, s: &mut SessionState) -> Transition {
        let data = edit_data(s)?;
        let reviewer_id = s
            .reviewer_id
            .ok_or_else(|| EngineError::Internal("edit flow without a reviewer".to_string()))?;
        let records: Vec<_> = self
            .edit_candidates(reviewer_id)
            .await?
            .into_iter()
            .filter(|r| data.candidates.contains(&r.id))
            .collect();
        let selected = data.record_id.and_then(|id| records.iter().find(|r| r.id == id));

        match (s.step, selected) {
            (Step::EditSelectRecord, _) => {
                let mut buttons = Vec::with_capacity(records.len());
                for record in &records {
                    let name = match self.collab.catalog.campaign_by_id(&record.campaign_id).await? {
                        Some(campaign) => campaign.product_name,
                        None => record.campaign_id.clone(),
                    };
                    buttons.push(Button::tagged(
                        format!("{} / {}", name, record.store_id),
                        &format!("{RECORD_TAG}{}", record.id),
                    ));
                }
                Ok(Response::text(templates::ask_edit_record()).with_buttons(buttons))
            }
            (Step::EditSelectField, Some(record)) => {
                let buttons = EDITABLE_FIELDS
                    .iter()
                    .map(|f| Button::tagged(*f, &format!("{FIELD_TAG}{f}")))
                    .collect();
                Ok(Response::text(templates::ask_edit_field(&record.store_id)).with_buttons(buttons))
            }
            (Step::EditValue, Some(record)) => {
                let field = data.field.as_deref().unwrap_or_default();
                Ok(Response::text(templates::ask_edit_value(field, record.form_field(field))))
            }
            // The row was closed or removed since the flow started
            _ => {
                s.reset();
                Ok(Response::text(templates::NOTHING_TO_EDIT).with_buttons(home_button()))
            }
        }
    }

    pub(super) async fn on_edit_record(&self, s: &mut SessionState, intent: Intent) -> Transition {
        let mut data = edit_data(s)?;
        let payload = intent.payload().unwrap_or_default();
        let chosen = match payload.strip_prefix(RECORD_TAG) {
            Some(id) => id.parse::<i64>().ok().filter(|id| data.candidates.contains(id)),
            None => form_parser::parse_number(payload)
                .and_then(|n| n.checked_sub(1))
                .and_then(|idx| data.candidates.get(idx).copied()),
        };
        let Some(record_id) = chosen else {
            return Ok(self.edit_prompt(s).await?.prepend(templates::UNKNOWN_INPUT));
        };
        data.record_id = Some(record_id);
        s.step = Step::EditSelectField;
        s.scratch = Scratch::Edit(data);
        self.edit_prompt(s).await
    }

    pub(super) async fn on_edit_field(&self, s: &mut SessionState, intent: Intent) -> Transition {
        let mut data = edit_data(s)?;
        let Some(field) = intent.payload().and_then(field_choice) else {
            return Ok(self.edit_prompt(s).await?.prepend(templates::UNKNOWN_INPUT));
        };
        data.field = Some(field.to_string());
        s.step = Step::EditValue;
        s.scratch = Scratch::Edit(data);
        self.edit_prompt(s).await
    }

    pub(super) async fn on_edit_value(&self, s: &mut SessionState, reviewer_id: ReviewerId, intent: Intent) -> Transition {
        let data = edit_data(s)?;
        let (Some(record_id), Some(field)) = (data.record_id, data.field.as_deref()) else {
            return Err(EngineError::Internal("edit value without record or field".to_string()));
        };
        let Some(value) = intent.payload().and_then(|raw| form_parser::normalize_field(field, raw)) else {
            return Ok(Response::text(templates::invalid_edit_value(field)));
        };

        let updated = self.collab.progress.update_form_field(record_id, field, &value).await?;
        s.reset();
        if !updated {
            return Ok(self.menu_prompt(s, reviewer_id).await?.prepend(templates::NOTHING_TO_EDIT));
        }
        info!(reviewer = %s.identity, record_id, %field, "Form field updated");
        Ok(self.menu_prompt(s, reviewer_id).await?.prepend(templates::EDIT_DONE))
    }

    /// Back within the edit flow steps up one level
    pub(super) async fn back_in_edit(&self, s: &mut SessionState, reviewer_id: ReviewerId) -> Transition {
        let mut data = edit_data(s)?;
        match s.step {
            Step::EditValue => {
                data.field = None;
                s.step = Step::EditSelectField;
            }
            Step::EditSelectField if data.candidates.len() > 1 => {
                data.record_id = None;
                s.step = Step::EditSelectRecord;
            }
            _ => {
                s.reset();
                return self.menu_prompt(s, reviewer_id).await;
            }
        }
        s.scratch = Scratch::Edit(data);
        self.edit_prompt(s).await
    }
}
