//! In-process collaborators
//!
//! Used by the console harness and by tests. A deployment replaces them with
//! transport-backed implementations of the same traits.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{ReviewerId, ReviewerIdentity};
use crate::error::CollabError;

use super::{
    Assistant, AssistantReply, CampaignContext, CollabResult, InquiryRouter, NotificationDispatcher, PromotionControl,
};

fn poisoned<T>(_: T) -> CollabError {
    CollabError::Unavailable("lock poisoned".to_string())
}

/// A notification that went out
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Warning {
        reviewer_id: ReviewerId,
        contexts: Vec<CampaignContext>,
    },
    Cancellation {
        reviewer_id: ReviewerId,
        contexts: Vec<CampaignContext>,
    },
    ContactRequest {
        reviewer_id: ReviewerId,
        identity: ReviewerIdentity,
    },
    Reminder {
        reviewer_id: ReviewerId,
        context: CampaignContext,
        deadline: NaiveDate,
    },
}

/// Logs every notification and keeps it in an outbox until drained
#[derive(Debug, Default)]
pub struct OutboxNotifier {
    outbox: Mutex<Vec<Notification>>,
}

impl OutboxNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, notification: Notification) -> CollabResult<()> {
        info!(?notification, "Notification dispatched");
        self.outbox.lock().map_err(poisoned)?.push(notification);
        Ok(())
    }

    /// Take everything sent so far
    pub fn drain(&self) -> Vec<Notification> {
        match self.outbox.lock() {
            Ok(mut outbox) => outbox.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Copy of everything sent so far
    pub fn sent(&self) -> Vec<Notification> {
        self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl NotificationDispatcher for OutboxNotifier {
    async fn send_warning(&self, reviewer_id: ReviewerId, contexts: &[CampaignContext]) -> CollabResult<()> {
        self.push(Notification::Warning {
            reviewer_id,
            contexts: contexts.to_vec(),
        })
    }

    async fn send_cancellation(&self, reviewer_id: ReviewerId, contexts: &[CampaignContext]) -> CollabResult<()> {
        self.push(Notification::Cancellation {
            reviewer_id,
            contexts: contexts.to_vec(),
        })
    }

    async fn send_contact_request(&self, reviewer_id: ReviewerId, identity: &ReviewerIdentity) -> CollabResult<()> {
        self.push(Notification::ContactRequest {
            reviewer_id,
            identity: identity.clone(),
        })
    }

    async fn send_reminder(&self, reviewer_id: ReviewerId, context: &CampaignContext, deadline: NaiveDate) -> CollabResult<()> {
        self.push(Notification::Reminder {
            reviewer_id,
            context: context.clone(),
            deadline,
        })
    }
}

/// An inquiry handed to operators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedInquiry {
    pub id: String,
    pub reviewer_id: ReviewerId,
    pub text: String,
    pub context: Vec<String>,
}

/// Keeps inquiries in memory and logs them for the operator
#[derive(Debug, Default)]
pub struct LocalInquiryRouter {
    inquiries: Mutex<Vec<RoutedInquiry>>,
}

impl LocalInquiryRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inquiries(&self) -> Vec<RoutedInquiry> {
        self.inquiries.lock().map(|i| i.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl InquiryRouter for LocalInquiryRouter {
    async fn submit(&self, reviewer_id: ReviewerId, text: &str, recent_context: &[String]) -> CollabResult<String> {
        if text.trim().is_empty() {
            return Err(CollabError::Rejected("empty inquiry".to_string()));
        }
        let id = Uuid::now_v7().to_string();
        info!(%id, reviewer_id, "Inquiry routed to operator");
        self.inquiries.lock().map_err(poisoned)?.push(RoutedInquiry {
            id: id.clone(),
            reviewer_id,
            text: text.to_string(),
            context: recent_context.to_vec(),
        });
        Ok(id)
    }
}

/// Canned answers keyed by keywords; explicit requests for a person escalate
pub struct KeywordAssistant {
    answers: Vec<(Vec<&'static str>, &'static str)>,
}

const ESCALATION_WORDS: &[&str] = &["상담원", "상담사", "사람", "직원", "연결"];

impl Default for KeywordAssistant {
    fn default() -> Self {
        Self {
            answers: vec![
                (
                    vec!["입금", "정산", "리뷰비"],
                    "리뷰비는 리뷰 캡쳐 확인 후 순차적으로 입금됩니다. 메뉴 4번에서 입금 현황을 확인하실 수 있어요.",
                ),
                (
                    vec!["사진", "캡쳐", "업로드"],
                    "구매/리뷰 캡쳐는 메뉴 3번의 사진 제출 링크에서 올려주세요.",
                ),
                (
                    vec!["기한", "마감", "언제까지"],
                    "리뷰 기한은 구매 확인 후 안내드린 날짜까지입니다. 메뉴 2번에서 진행 상황과 함께 확인하실 수 있어요.",
                ),
                (
                    vec!["옵션", "색상", "사이즈"],
                    "옵션은 구매 가이드에 안내된 옵션으로 정확히 선택해주세요.",
                ),
            ],
        }
    }
}

#[async_trait]
impl Assistant for KeywordAssistant {
    async fn respond(&self, text: &str, context: &[String]) -> CollabResult<AssistantReply> {
        debug!(context_len = context.len(), "respond: called");
        if ESCALATION_WORDS.iter().any(|w| text.contains(w)) {
            return Ok(AssistantReply {
                text: "담당자에게 바로 연결해드릴게요.".to_string(),
                escalate: true,
            });
        }
        let answer = self
            .answers
            .iter()
            .find(|(keywords, _)| keywords.iter().any(|k| text.contains(k)))
            .map(|(_, answer)| *answer);
        Ok(match answer {
            Some(answer) => AssistantReply {
                text: answer.to_string(),
                escalate: false,
            },
            None => AssistantReply {
                text: "정확한 답변을 위해 담당자에게 문의를 남겨주시겠어요?".to_string(),
                escalate: false,
            },
        })
    }
}

/// Suspended-campaign set held in memory
#[derive(Debug, Default)]
pub struct MemoryPromotions {
    suspended: Mutex<HashSet<String>>,
}

impl MemoryPromotions {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PromotionControl for MemoryPromotions {
    async fn suspend(&self, campaign_id: &str) -> CollabResult<()> {
        info!(%campaign_id, "Promotion suspended");
        self.suspended.lock().map_err(poisoned)?.insert(campaign_id.to_string());
        Ok(())
    }

    async fn resume(&self, campaign_id: &str) -> CollabResult<()> {
        info!(%campaign_id, "Promotion resumed");
        self.suspended.lock().map_err(poisoned)?.remove(campaign_id);
        Ok(())
    }

    async fn is_suspended(&self, campaign_id: &str) -> CollabResult<bool> {
        Ok(self.suspended.lock().map_err(poisoned)?.contains(campaign_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_outbox_drains() {
        let notifier = OutboxNotifier::new();
        let context = CampaignContext {
            campaign_id: "c1".into(),
            product_name: None,
            store_ids: vec!["a".into()],
        };
        notifier.send_warning(1, std::slice::from_ref(&context)).await.unwrap();
        notifier.send_cancellation(1, &[context]).await.unwrap();

        assert_eq!(notifier.sent().len(), 2);
        assert_eq!(notifier.drain().len(), 2);
        assert!(notifier.drain().is_empty());
    }

    #[tokio::test]
    async fn test_inquiry_router_assigns_ids() {
        let router = LocalInquiryRouter::new();
        let id = router.submit(7, "배송이 안 와요", &["user: 안녕하세요".into()]).await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(router.inquiries()[0].reviewer_id, 7);
        assert!(router.submit(7, "  ", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_keyword_assistant_escalates() {
        let assistant = KeywordAssistant::default();
        assert!(assistant.respond("상담원 연결해주세요", &[]).await.unwrap().escalate);
        let reply = assistant.respond("입금 언제 되나요", &[]).await.unwrap();
        assert!(!reply.escalate);
        assert!(reply.text.contains("입금"));
    }

    #[tokio::test]
    async fn test_promotions_toggle() {
        let promotions = MemoryPromotions::new();
        promotions.suspend("c1").await.unwrap();
        assert!(promotions.is_suspended("c1").await.unwrap());
        promotions.resume("c1").await.unwrap();
        assert!(!promotions.is_suspended("c1").await.unwrap());
    }
}
