//! Step 1: campaign cards and selection

use crate::domain::{
    AccountCountData, CampaignCard, CampaignSelectionData, Intent, ProgressStatus, Response, ReviewerId, Scratch,
    SessionState, Step, button_value,
};

use super::{SessionEngine, Transition, form_parser, home_button, templates};

const CAMPAIGN_TAG: &str = "campaign_";

/// Remaining capacity at or below this is shown as urgent
const URGENT_REMAINING: i64 = 5;

fn campaign_index(payload: &str) -> Option<usize> {
    match payload.strip_prefix(CAMPAIGN_TAG) {
        Some(n) => n.parse().ok(),
        None => form_parser::parse_number(payload),
    }
}

impl SessionEngine {
    /// List open campaigns as cards and move to step 1
    pub(super) async fn show_campaigns(&self, s: &mut SessionState, reviewer_id: ReviewerId) -> Transition {
        let mut campaigns = self.collab.catalog.active_campaigns().await?;
        let records = self.collab.progress.find_by_reviewer(reviewer_id).await?;

        // Campaigns the reviewer can still resume stay visible even when full
        for record in records.iter().filter(|r| r.status == ProgressStatus::GuideSent) {
            if campaigns.iter().any(|c| c.id == record.campaign_id) {
                continue;
            }
            if let Some(campaign) = self.collab.catalog.campaign_by_id(&record.campaign_id).await? {
                campaigns.push(campaign);
            }
        }

        if campaigns.is_empty() {
            s.reset();
            return Ok(Response::text(templates::NO_CAMPAIGNS).with_buttons(home_button()));
        }

        let mut cards = Vec::with_capacity(campaigns.len());
        for (idx, campaign) in campaigns.iter().enumerate() {
            let remaining = self.collab.catalog.remaining_capacity(&campaign.id).await?;
            let mine: Vec<_> = records
                .iter()
                .filter(|r| r.campaign_id == campaign.id)
                .filter(|r| !matches!(r.status, ProgressStatus::TimedOut | ProgressStatus::Cancelled))
                .collect();
            cards.push(CampaignCard {
                value: button_value(&format!("{CAMPAIGN_TAG}{}", idx + 1)),
                campaign_id: campaign.id.clone(),
                product_name: campaign.product_name.clone(),
                store_name: campaign.store_name.clone(),
                remaining,
                urgent: remaining <= URGENT_REMAINING,
                my_history: mine
                    .iter()
                    .map(|r| format!("{} ({})", r.store_id, templates::status_label(r.status)))
                    .collect(),
                resumable: mine.iter().any(|r| r.status == ProgressStatus::GuideSent),
            });
        }

        s.enter(
            Step::CampaignSelection,
            Scratch::CampaignSelection(CampaignSelectionData {
                offered: campaigns.into_iter().map(|c| c.id).collect(),
            }),
        );
        Ok(Response::text(templates::CAMPAIGN_LIST_HEADER).with_cards(cards))
    }

    pub(super) async fn on_campaign_selection(
        &self,
        s: &mut SessionState,
        reviewer_id: ReviewerId,
        intent: Intent,
    ) -> Transition {
        let Scratch::CampaignSelection(data) = &s.scratch else {
            return self.show_campaigns(s, reviewer_id).await;
        };
        let chosen = intent
            .payload()
            .and_then(campaign_index)
            .and_then(|n| n.checked_sub(1))
            .and_then(|idx| data.offered.get(idx))
            .cloned();
        let Some(campaign_id) = chosen else {
            return Ok(self.show_campaigns(s, reviewer_id).await?.prepend(templates::UNKNOWN_INPUT));
        };

        // Session-recovery card
        if let Some(prompt) = self.recover(s, reviewer_id, Some(&campaign_id)).await? {
            return Ok(prompt);
        }

        let campaign = match self.collab.catalog.campaign_by_id(&campaign_id).await? {
            Some(campaign) if campaign.active => campaign,
            _ => {
                return Ok(self
                    .show_campaigns(s, reviewer_id)
                    .await?
                    .prepend(&templates::campaign_closed()));
            }
        };
        if self.collab.catalog.remaining_capacity(&campaign.id).await? <= 0 {
            let closed = templates::capacity_exhausted(&campaign, 0);
            return Ok(self.show_campaigns(s, reviewer_id).await?.prepend(&closed));
        }

        s.selected_campaign_id = Some(campaign.id.clone());
        s.enter(
            Step::AccountCount,
            Scratch::AccountCount(AccountCountData {
                campaign_id: campaign.id.clone(),
            }),
        );
        Ok(self.account_count_prompt(&campaign))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_campaign_index() {
        assert_eq!(campaign_index("campaign_2"), Some(2));
        assert_eq!(campaign_index("3번"), Some(3));
        assert_eq!(campaign_index("campaign_x"), None);
    }
}
