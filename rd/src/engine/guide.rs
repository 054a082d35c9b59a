//! Step 4: per-identifier option selection and the purchase guide

use tracing::{debug, warn};

use crate::domain::{Button, Campaign, FormSubmissionData, Intent, Response, Scratch, SessionState, Step};
use crate::error::EngineError;

use super::{SessionEngine, Transition, form_parser, home_button, templates};

const OPTION_TAG: &str = "option_";

/// Resolve an option by button tag, 1-based number or exact name
fn option_choice(campaign: &Campaign, payload: &str) -> Option<String> {
    let index = match payload.strip_prefix(OPTION_TAG) {
        Some(n) => n.parse::<usize>().ok(),
        None => form_parser::parse_number(payload),
    };
    match index {
        Some(n) => n.checked_sub(1).and_then(|idx| campaign.options.get(idx)).cloned(),
        None => campaign.options.iter().find(|o| o.as_str() == payload.trim()).cloned(),
    }
}

impl SessionEngine {
    pub(super) fn option_prompt(&self, s: &SessionState, campaign: &Campaign) -> Response {
        let Scratch::Purchase(data) = &s.scratch else {
            return Response::text(templates::UNKNOWN_INPUT).with_buttons(home_button());
        };
        let cursor = data.option_cursor.min(data.store_ids.len().saturating_sub(1));
        let store_id = data.store_ids.get(cursor).map(String::as_str).unwrap_or_default();
        let buttons = campaign
            .options
            .iter()
            .enumerate()
            .map(|(idx, option)| Button::tagged(option.clone(), &format!("{OPTION_TAG}{}", idx + 1)))
            .collect();
        Response::text(templates::ask_option(campaign, store_id, cursor + 1, data.store_ids.len())).with_buttons(buttons)
    }

    /// The purchase guide with the form template for identifiers still pending
    pub(super) fn guide_response(&self, data: &FormSubmissionData, campaign: &Campaign) -> Response {
        let options: Vec<(String, Option<String>)> = data
            .store_ids
            .iter()
            .cloned()
            .zip(data.options.iter().cloned())
            .collect();
        Response::text(templates::purchase_guide(
            campaign,
            &options,
            &data.pending(),
            self.config.form_timeout_secs / 60,
        ))
    }

    /// Campaign of the current purchase flow; a vanished campaign ends the flow
    async fn purchase_campaign(&self, s: &mut SessionState) -> Result<Option<Campaign>, EngineError> {
        let Some(campaign_id) = s.scratch.tracked().map(|t| t.campaign_id.to_string()) else {
            return Ok(None);
        };
        let campaign = self.collab.catalog.campaign_by_id(&campaign_id).await?;
        if campaign.is_none() {
            warn!(%campaign_id, "Campaign disappeared mid-flow");
        }
        Ok(campaign)
    }

    pub(super) async fn on_option_or_guide(&self, s: &mut SessionState, intent: Intent) -> Transition {
        let Scratch::Purchase(mut data) = s.scratch.clone() else {
            s.reset();
            return Ok(Response::text(templates::UNKNOWN_INPUT).with_buttons(home_button()));
        };
        if data.options_complete() {
            return self.on_form_submission(s, intent).await;
        }

        let Some(campaign) = self.purchase_campaign(s).await? else {
            s.reset();
            return Ok(Response::text(templates::campaign_closed()).with_buttons(home_button()));
        };
        let Some(option) = intent.payload().and_then(|p| option_choice(&campaign, p)) else {
            return Ok(self.option_prompt(s, &campaign).prepend(templates::UNKNOWN_INPUT));
        };

        let cursor = data.option_cursor;
        if let Some(record_id) = data.record_ids.get(cursor).copied() {
            self.collab.progress.assign_option(record_id, &option).await?;
        }
        debug!(reviewer = %s.identity, cursor, %option, "on_option_or_guide: option assigned");
        data.options[cursor] = Some(option);
        data.option_cursor += 1;
        let complete = data.options_complete();
        s.scratch = Scratch::Purchase(data);

        if complete {
            self.issue_guide(s, &campaign).await
        } else {
            Ok(self.option_prompt(s, &campaign))
        }
    }

    /// Prompt for steps 4 and 5
    pub(super) async fn purchase_prompt(&self, s: &mut SessionState) -> Transition {
        let Some(campaign) = self.purchase_campaign(s).await? else {
            s.reset();
            return Ok(Response::text(templates::campaign_closed()).with_buttons(home_button()));
        };
        let Scratch::Purchase(data) = &s.scratch else {
            return Err(EngineError::Internal("purchase prompt outside the purchase flow".to_string()));
        };
        if !data.options_complete() {
            return Ok(self.option_prompt(s, &campaign));
        }
        if s.step == Step::FormSubmission {
            return Ok(Response::text(templates::form_outstanding(&data.pending(), &[])));
        }
        Ok(self.guide_response(data, &campaign))
    }

    /// Back at step 4 steps through the option choices before offering to cancel
    pub(super) async fn back_from_options(&self, s: &mut SessionState) -> Transition {
        let stepped = match &mut s.scratch {
            Scratch::Purchase(data) if data.option_cursor > 0 && !data.options_complete() => {
                data.option_cursor -= 1;
                let cursor = data.option_cursor;
                data.options[cursor] = None;
                true
            }
            _ => false,
        };
        if !stepped {
            return Ok(self.ask_cancel_confirmation(s));
        }
        match self.purchase_campaign(s).await? {
            Some(campaign) => Ok(self.option_prompt(s, &campaign)),
            None => {
                s.reset();
                Ok(Response::text(templates::campaign_closed()).with_buttons(home_button()))
            }
        }
    }
}
