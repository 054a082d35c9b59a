//! Step 5: purchase form attribution and submission

use std::collections::HashSet;

use tracing::{debug, info};

use crate::domain::{AwaitingData, Campaign, Intent, Response, Scratch, SessionState, Step};

use super::form_parser::{self, FormBlock};
use super::{SessionEngine, Transition, home_button, templates};

/// Forms matched to identifiers, plus a line per rejected block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormBatch {
    pub accepted: Vec<(String, FormBlock)>,
    pub problems: Vec<String>,
}

/// Match parsed blocks to the identifiers of the current registration
///
/// A block without an `아이디:` line is only attributed when it is the sole
/// block and exactly one identifier is still pending.
pub fn attribute_blocks(blocks: Vec<FormBlock>, pending: &[String], known: &[String]) -> FormBatch {
    let mut batch = FormBatch::default();
    let mut taken = HashSet::new();
    let single = blocks.len() == 1;

    for block in blocks {
        let store_id = match block.store_id.clone() {
            Some(id) => id,
            None if single && pending.len() == 1 => pending[0].clone(),
            None => {
                if block.has_content() {
                    batch.problems.push("양식마다 '아이디:' 줄을 함께 적어주세요.".to_string());
                }
                continue;
            }
        };

        if !known.contains(&store_id) {
            batch.problems.push(format!("'{store_id}'는 이번 신청에 등록된 아이디가 아닙니다."));
            continue;
        }
        if !pending.contains(&store_id) {
            batch.problems.push(format!("'{store_id}'의 양식은 이미 접수되었습니다."));
            continue;
        }
        if !taken.insert(store_id.clone()) {
            batch.problems.push(format!("'{store_id}'의 양식이 두 번 입력되었습니다."));
            continue;
        }
        let missing = block.missing();
        if !missing.is_empty() {
            batch.problems.push(format!("'{store_id}' 누락 항목: {}", missing.join(", ")));
            continue;
        }
        batch.accepted.push((store_id, block));
    }
    batch
}

impl SessionEngine {
    pub(super) async fn on_form_submission(&self, s: &mut SessionState, intent: Intent) -> Transition {
        let Scratch::Purchase(mut data) = s.scratch.clone() else {
            s.reset();
            return Ok(Response::text(templates::UNKNOWN_INPUT).with_buttons(home_button()));
        };
        let Some(text) = intent.payload().filter(|t| form_parser::has_form_content(t)) else {
            return self.purchase_prompt(s).await;
        };

        let pending = data.pending();
        let batch = attribute_blocks(form_parser::parse_blocks(text), &pending, &data.store_ids);
        debug!(
            reviewer = %s.identity,
            accepted = batch.accepted.len(),
            problems = batch.problems.len(),
            "on_form_submission: parsed"
        );

        let mut problems = batch.problems;
        let mut accepted = Vec::new();
        let mut recipient = None;
        for (store_id, block) in batch.accepted {
            let Some(record_id) = data.record_id_of(&store_id) else {
                continue;
            };
            if self.collab.progress.submit_form(record_id, &block.to_json()).await? {
                if recipient.is_none() {
                    recipient = block.fields.get(form_parser::RECIPIENT).cloned();
                }
                data.submitted.insert(store_id.clone());
                accepted.push(store_id);
            } else {
                problems.push(format!("'{store_id}' 신청은 이미 종료되어 양식을 받을 수 없습니다."));
            }
        }

        if accepted.is_empty() {
            return Ok(Response::text(templates::form_outstanding(&pending, &problems)));
        }

        if !data.all_submitted() {
            let pending = data.pending();
            s.step = Step::FormSubmission;
            s.scratch = Scratch::Purchase(data);
            return Ok(Response::text(templates::form_partial(&accepted, &problems, &pending)));
        }

        let campaign = self
            .collab
            .catalog
            .campaign_by_id(&data.campaign_id)
            .await?
            .unwrap_or_else(|| Campaign {
                id: data.campaign_id.clone(),
                product_name: data.campaign_id.clone(),
                ..Default::default()
            });
        info!(reviewer = %s.identity, campaign_id = %data.campaign_id, count = data.store_ids.len(), "All forms received");

        let message = templates::form_received(
            &campaign,
            &data.store_ids,
            recipient.as_deref().unwrap_or("-"),
            &self.upload_url(),
        );
        s.enter(
            Step::AwaitingPurchaseProof,
            Scratch::Awaiting(AwaitingData {
                campaign_id: data.campaign_id,
                store_ids: data.store_ids,
                record_ids: data.record_ids,
            }),
        );
        Ok(Response::text(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    const FORM_A: &str = "아이디: a\n수취인명: 홍길동\n연락처: 010-1234-5678\n은행: 국민\n계좌: 123-45-678\n예금주: 홍길동";

    #[test]
    fn test_single_unlabelled_block_goes_to_only_pending_id() {
        let text = "수취인명: 홍길동\n연락처: 01012345678\n은행: 국민\n계좌: 12345678\n예금주: 홍길동";
        let batch = attribute_blocks(form_parser::parse_blocks(text), &ids(&["b"]), &ids(&["a", "b"]));
        assert_eq!(batch.accepted.len(), 1);
        assert_eq!(batch.accepted[0].0, "b");
        assert!(batch.problems.is_empty());
    }

    #[test]
    fn test_unlabelled_block_with_several_pending_is_rejected() {
        let text = "수취인명: 홍길동\n연락처: 01012345678\n은행: 국민\n계좌: 12345678\n예금주: 홍길동";
        let batch = attribute_blocks(form_parser::parse_blocks(text), &ids(&["a", "b"]), &ids(&["a", "b"]));
        assert!(batch.accepted.is_empty());
        assert_eq!(batch.problems.len(), 1);
    }

    #[test]
    fn test_partial_batch_reports_incomplete_block() {
        let text = format!("{FORM_A}\n\n아이디: b\n수취인명: 김철수");
        let batch = attribute_blocks(form_parser::parse_blocks(&text), &ids(&["a", "b"]), &ids(&["a", "b"]));
        assert_eq!(batch.accepted.len(), 1);
        assert_eq!(batch.accepted[0].0, "a");
        assert_eq!(batch.problems.len(), 1);
        assert!(batch.problems[0].contains("'b'"));
    }

    #[test]
    fn test_unknown_and_already_submitted_ids() {
        let text = format!("{FORM_A}\n\n아이디: zzz\n수취인명: 김철수");
        let batch = attribute_blocks(form_parser::parse_blocks(&text), &ids(&["b"]), &ids(&["a", "b"]));
        assert!(batch.accepted.is_empty());
        assert_eq!(batch.problems.len(), 2);
    }
}
