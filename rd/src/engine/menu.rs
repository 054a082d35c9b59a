//! Step 0: main menu and the read-only summaries it offers

use std::collections::HashMap;

use tracing::warn;

use crate::domain::{Button, InquiryData, Intent, ProgressRecord, ProgressStatus, Response, ReviewerId, Scratch, SessionState, Step};

use super::{SessionEngine, Transition, form_parser, home_button, inquiry, templates};

const MENU_TAG: &str = "menu_";

/// Menu number from a `menu_N` button tag or typed text
pub(super) fn menu_choice(payload: &str) -> Option<u8> {
    if let Some(n) = payload.strip_prefix(MENU_TAG) {
        return n.parse().ok().filter(|n| (1..=5).contains(n));
    }
    form_parser::parse_menu_choice(payload)
}

fn menu_buttons() -> Vec<Button> {
    ["체험단 신청", "진행 상황", "사진 제출", "입금 현황", "기타 문의"]
        .iter()
        .enumerate()
        .map(|(idx, label)| Button::tagged(*label, &format!("{MENU_TAG}{}", idx + 1)))
        .collect()
}

impl SessionEngine {
    pub(super) async fn menu_prompt(&self, s: &SessionState, reviewer_id: ReviewerId) -> Transition {
        let returning = match self.collab.progress.find_by_reviewer(reviewer_id).await {
            Ok(records) => !records.is_empty(),
            Err(e) => {
                warn!(reviewer_id, error = %e, "menu_prompt: history lookup failed");
                false
            }
        };
        let name = returning.then_some(s.identity.name.as_str());
        Ok(Response::text(templates::welcome(name)).with_buttons(menu_buttons()))
    }

    pub(super) async fn on_menu(&self, s: &mut SessionState, reviewer_id: ReviewerId, intent: Intent) -> Transition {
        let Some(payload) = intent.payload().filter(|p| !p.is_empty()) else {
            return self.menu_prompt(s, reviewer_id).await;
        };
        match menu_choice(payload) {
            Some(1) => self.show_campaigns(s, reviewer_id).await,
            Some(2) => self.progress_summary(reviewer_id).await,
            Some(3) => Ok(Response::text(templates::upload_guide(&self.upload_url())).with_buttons(home_button())),
            Some(4) => self.settlement_summary(reviewer_id).await,
            Some(_) => {
                s.enter(Step::Inquiry, Scratch::Inquiry(InquiryData::default()));
                Ok(inquiry::inquiry_prompt())
            }
            None => {
                // Anything unrecognised goes to the assistant
                s.enter(Step::Inquiry, Scratch::Inquiry(InquiryData::default()));
                self.on_inquiry(s, intent).await
            }
        }
    }

    async fn campaign_names(&self, records: &[ProgressRecord]) -> HashMap<String, String> {
        let mut names = HashMap::new();
        for record in records {
            if names.contains_key(&record.campaign_id) {
                continue;
            }
            let name = match self.collab.catalog.campaign_by_id(&record.campaign_id).await {
                Ok(Some(campaign)) => campaign.product_name,
                _ => record.campaign_id.clone(),
            };
            names.insert(record.campaign_id.clone(), name);
        }
        names
    }

    async fn progress_summary(&self, reviewer_id: ReviewerId) -> Transition {
        let records = self.collab.progress.find_by_reviewer(reviewer_id).await?;
        let visible: Vec<&ProgressRecord> = records
            .iter()
            .filter(|r| !matches!(r.status, ProgressStatus::TimedOut | ProgressStatus::Cancelled))
            .collect();
        if visible.is_empty() {
            return Ok(Response::text("진행 중인 체험단이 없습니다. 메뉴 1번에서 신청해보세요!").with_buttons(home_button()));
        }

        let names = self.campaign_names(&records).await;
        let line = |r: &&ProgressRecord| {
            format!(
                "• {} / {}: {}",
                names.get(&r.campaign_id).map(String::as_str).unwrap_or(&r.campaign_id),
                r.store_id,
                templates::status_label(r.status)
            )
        };
        let (done, active): (Vec<&ProgressRecord>, Vec<&ProgressRecord>) =
            visible.into_iter().partition(|r| r.status == ProgressStatus::Settled);

        let mut text = String::from("📋 진행 상황\n");
        if !active.is_empty() {
            text.push_str("\n[진행 중]\n");
            text.push_str(&active.iter().map(line).collect::<Vec<_>>().join("\n"));
        }
        if !done.is_empty() {
            text.push_str("\n\n[완료]\n");
            text.push_str(&done.iter().map(line).collect::<Vec<_>>().join("\n"));
        }
        Ok(Response::text(text.trim_end()).with_buttons(home_button()))
    }

    async fn settlement_summary(&self, reviewer_id: ReviewerId) -> Transition {
        let records = self.collab.progress.find_by_reviewer(reviewer_id).await?;
        let count = |statuses: &[ProgressStatus]| records.iter().filter(|r| statuses.contains(&r.status)).count();

        let settled = count(&[ProgressStatus::Settled]);
        let awaiting = count(&[ProgressStatus::AwaitingSettlement]);
        let reviewing = count(&[ProgressStatus::AwaitingReviewProof, ProgressStatus::ReviewSubmitted]);
        if settled + awaiting + reviewing == 0 {
            return Ok(Response::text("아직 입금 대상 내역이 없습니다.").with_buttons(home_button()));
        }

        let mut settled_total = 0;
        for record in records.iter().filter(|r| r.status == ProgressStatus::Settled) {
            if let Ok(Some(campaign)) = self.collab.catalog.campaign_by_id(&record.campaign_id).await {
                settled_total += campaign.review_fee;
            }
        }
        let text = format!(
            "💰 입금 현황\n\n입금 완료: {}건 (총 {}원)\n입금 대기: {}건\n리뷰 확인 중: {}건",
            settled, settled_total, awaiting, reviewing
        );
        Ok(Response::text(text).with_buttons(home_button()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_choice_from_button_and_text() {
        assert_eq!(menu_choice("menu_3"), Some(3));
        assert_eq!(menu_choice("menu_9"), None);
        assert_eq!(menu_choice("2번"), Some(2));
        assert_eq!(menu_choice("아무말"), None);
    }

    #[test]
    fn test_menu_buttons_are_tagged() {
        let buttons = menu_buttons();
        assert_eq!(buttons.len(), 5);
        assert_eq!(Intent::decode(&buttons[0].value), Intent::ButtonValue("menu_1".into()));
    }
}
