use std::sync::Arc;

use serde_json::Value;

use crate::clock::ManualClock;
use crate::config::Config;
use crate::domain::{Campaign, ProgressRecord, ProgressStatus, Response, ReviewerIdentity, Scratch, SessionState, Step};
use crate::runtime::Runtime;

use super::form_parser::BANK;
use super::templates;

const START: i64 = 1_760_000_000_000;

fn serum() -> Campaign {
    Campaign {
        id: "serum".into(),
        product_name: "수분 세럼".into(),
        store_name: "세럼샵".into(),
        options: vec!["50ml".into()],
        total_quantity: 10,
        payment_amount: 25_000,
        ..Default::default()
    }
}

fn tint() -> Campaign {
    Campaign {
        id: "tint".into(),
        product_name: "립 틴트".into(),
        store_name: "틴트샵".into(),
        options: vec!["레드".into(), "코랄".into()],
        total_quantity: 10,
        ..Default::default()
    }
}

fn form(store_id: &str) -> String {
    format!("아이디: {store_id}\n수취인명: 홍길동\n연락처: 010-1234-5678\n은행: 국민\n계좌: 123-456-789\n예금주: 홍길동")
}

fn reviewer(name: &str) -> ReviewerIdentity {
    ReviewerIdentity::new(name, "010-1111-2222")
}

struct Harness {
    rt: Runtime,
    _clock: Arc<ManualClock>,
}

impl Harness {
    fn new(campaigns: Vec<Campaign>) -> Self {
        let mut config = Config::default();
        config.campaigns = campaigns;
        config.sync();
        let clock = Arc::new(ManualClock::new(START));
        let rt = Runtime::in_memory(&config, clock.clone()).unwrap();
        Self { rt, _clock: clock }
    }

    async fn say(&self, who: &ReviewerIdentity, text: &str) -> Response {
        self.rt.engine.handle(who, text).await
    }

    fn session(&self, who: &ReviewerIdentity) -> SessionState {
        self.rt.sessions.try_get(&who.key()).unwrap().clone()
    }

    fn step(&self, who: &ReviewerIdentity) -> Step {
        self.session(who).step
    }

    async fn records(&self, who: &ReviewerIdentity) -> Vec<ProgressRecord> {
        let id = self.rt.state.upsert_reviewer(&who.name, &who.phone).await.unwrap();
        self.rt.state.list_by_reviewer(id).await.unwrap()
    }

    /// Menu -> first campaign -> account count -> identifiers
    async fn register(&self, who: &ReviewerIdentity, count: usize, ids: &str) -> Response {
        self.say(who, "1").await;
        self.say(who, "1").await;
        self.say(who, &count.to_string()).await;
        self.say(who, ids).await
    }
}

#[tokio::test]
async fn test_home_shows_menu() {
    let h = Harness::new(vec![serum()]);
    let a = reviewer("a");

    let response = h.say(&a, "메뉴").await;
    assert_eq!(response.buttons().len(), 5);
    assert_eq!(h.step(&a), Step::Menu);
}

#[tokio::test]
async fn test_single_option_flow_reaches_purchase_proof() {
    let h = Harness::new(vec![serum()]);
    let a = reviewer("a");

    let cards = h.say(&a, "1").await;
    assert_eq!(cards.cards().len(), 1);
    assert_eq!(cards.cards()[0].campaign_id, "serum");
    assert_eq!(h.step(&a), Step::CampaignSelection);

    let count = h.say(&a, &cards.cards()[0].value).await;
    assert_eq!(h.step(&a), Step::AccountCount);
    assert_eq!(count.buttons().len(), 5);

    h.say(&a, "__btn__:count_1").await;
    assert_eq!(h.step(&a), Step::IdentifierCollection);

    let guide = h.say(&a, "abc123").await;
    assert_eq!(h.step(&a), Step::OptionOrGuide);
    assert!(guide.message.contains("구매 가이드"));
    assert!(guide.message.contains("30분"));
    let records = h.records(&a).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, ProgressStatus::GuideSent);

    let received = h.say(&a, &form("abc123")).await;
    assert!(received.message.contains("양식이 접수"));
    assert_eq!(h.step(&a), Step::AwaitingPurchaseProof);
    let records = h.records(&a).await;
    assert_eq!(records[0].status, ProgressStatus::AwaitingPurchaseProof);
    assert_eq!(records[0].form_field("연락처"), Some("010-1234-5678"));
}

#[tokio::test]
async fn test_wrong_identifier_count_reprompts_in_place() {
    let h = Harness::new(vec![serum()]);
    let a = reviewer("a");

    let response = h.register(&a, 2, "only-one").await;
    assert_eq!(response.message, templates::wrong_id_count(2, 1));
    let session = h.session(&a);
    assert_eq!(session.step, Step::IdentifierCollection);
    assert!(matches!(&session.scratch, Scratch::Identifiers(data) if data.resolution.is_none()));
    assert!(h.records(&a).await.is_empty());
}

#[tokio::test]
async fn test_partial_forms_stay_in_form_submission() {
    let h = Harness::new(vec![serum()]);
    let a = reviewer("a");
    h.register(&a, 2, "s1, s2").await;

    let partial = h.say(&a, &form("s1")).await;
    assert!(partial.message.contains("s1"));
    assert_eq!(h.step(&a), Step::FormSubmission);

    let invalid = h.say(&a, "아이디: s2\n수취인명: 김철수").await;
    assert!(invalid.message.contains("누락"));
    assert_eq!(h.step(&a), Step::FormSubmission);

    h.say(&a, &form("s2")).await;
    assert_eq!(h.step(&a), Step::AwaitingPurchaseProof);
}

#[tokio::test]
async fn test_duplicate_replacement_flow() {
    let h = Harness::new(vec![serum()]);
    let b = reviewer("b");
    h.register(&b, 1, "dup1").await;
    h.say(&b, &form("dup1")).await;

    let a = reviewer("a");
    let response = h.register(&a, 2, "dup1, fresh1").await;
    assert!(response.message.contains("dup1"));
    let tags: Vec<_> = response.buttons().iter().map(|b| b.value.as_str()).collect();
    assert_eq!(tags, vec!["__btn__:dup_proceed", "__btn__:dup_replace"]);

    let ask = h.say(&a, "__btn__:dup_replace").await;
    assert_eq!(ask.message, templates::ask_replacements(1));

    let still = h.say(&a, "dup1").await;
    assert!(still.message.contains("이미 참여 중인"));
    let overlap = h.say(&a, "fresh1").await;
    assert!(overlap.message.contains("이미 이번 신청에"));
    assert_eq!(h.step(&a), Step::IdentifierCollection);

    h.say(&a, "fresh2").await;
    assert_eq!(h.step(&a), Step::OptionOrGuide);
    let mut ids: Vec<_> = h.records(&a).await.into_iter().map(|r| r.store_id).collect();
    ids.sort();
    assert_eq!(ids, vec!["fresh1".to_string(), "fresh2".to_string()]);
}

#[tokio::test]
async fn test_replacement_taken_elsewhere_is_rejected_the_same_way_twice() {
    let h = Harness::new(vec![serum()]);
    let b = reviewer("b");
    h.register(&b, 1, "dup1").await;
    h.say(&b, &form("dup1")).await;
    let c = reviewer("c");
    h.register(&c, 1, "dup2").await;
    h.say(&c, &form("dup2")).await;

    let a = reviewer("a");
    h.register(&a, 2, "dup1, fresh1").await;
    h.say(&a, "__btn__:dup_replace").await;

    let first = h.say(&a, "dup2").await;
    let after_first = h.session(&a);
    let second = h.say(&a, "dup2").await;

    assert!(first.message.contains("'dup2'"));
    assert!(first.message.contains("이미 참여 중인"));
    assert_eq!(first, second);
    assert_eq!(h.session(&a), after_first);
    assert_eq!(after_first.step, Step::IdentifierCollection);
    assert!(h.records(&a).await.is_empty());

    h.say(&a, "fresh2").await;
    assert_eq!(h.step(&a), Step::OptionOrGuide);
    let mut ids: Vec<_> = h.records(&a).await.into_iter().map(|r| r.store_id).collect();
    ids.sort();
    assert_eq!(ids, vec!["fresh1".to_string(), "fresh2".to_string()]);
}

#[tokio::test]
async fn test_duplicate_proceed_with_clean_subset() {
    let h = Harness::new(vec![serum()]);
    let b = reviewer("b");
    h.register(&b, 1, "dup1").await;
    h.say(&b, &form("dup1")).await;

    let a = reviewer("a");
    h.register(&a, 2, "dup1 fresh1").await;
    h.say(&a, "__btn__:dup_proceed").await;

    let records = h.records(&a).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].store_id, "fresh1");
    match &h.session(&a).scratch {
        Scratch::Purchase(data) => assert_eq!(data.store_ids, vec!["fresh1".to_string()]),
        other => panic!("unexpected scratch {other:?}"),
    }
}

#[tokio::test]
async fn test_capacity_consumed_between_display_and_commit() {
    let h = Harness::new(vec![Campaign {
        total_quantity: 1,
        ..serum()
    }]);
    let a = reviewer("a");
    let b = reviewer("b");

    h.say(&a, "1").await;
    h.say(&a, "1").await;
    h.say(&a, "1").await;
    assert_eq!(h.step(&a), Step::IdentifierCollection);

    h.register(&b, 1, "b1").await;
    assert_eq!(h.step(&b), Step::OptionOrGuide);

    let response = h.say(&a, "a1").await;
    assert!(response.message.contains("마감"));
    assert_eq!(h.step(&a), Step::Menu);
    assert!(h.records(&a).await.is_empty());
}

#[tokio::test]
async fn test_multi_option_selection_with_back() {
    let h = Harness::new(vec![tint()]);
    let a = reviewer("a");

    let first = h.register(&a, 2, "t1 t2").await;
    assert!(first.message.contains("[1/2]"));
    assert_eq!(first.buttons().len(), 2);

    let second = h.say(&a, "__btn__:option_2").await;
    assert!(second.message.contains("[2/2]"));

    let back = h.say(&a, "뒤로").await;
    assert!(back.message.contains("[1/2]"));

    h.say(&a, "레드").await;
    let guide = h.say(&a, "1").await;
    assert!(guide.message.contains("구매 가이드"));
    assert_eq!(h.step(&a), Step::OptionOrGuide);

    let records = h.records(&a).await;
    assert!(records.iter().all(|r| r.option.as_deref() == Some("레드")));
    assert!(records.iter().all(|r| r.status == ProgressStatus::GuideSent));
}

#[tokio::test]
async fn test_cancel_without_submitted_forms_is_immediate() {
    let h = Harness::new(vec![serum()]);
    let a = reviewer("a");
    h.register(&a, 1, "c1").await;

    let response = h.say(&a, "취소").await;
    assert!(response.message.starts_with(templates::CANCELLED));
    assert_eq!(h.step(&a), Step::Menu);
    assert_eq!(h.records(&a).await[0].status, ProgressStatus::Cancelled);
}

#[tokio::test]
async fn test_cancel_after_form_needs_confirmation() {
    let h = Harness::new(vec![serum()]);
    let a = reviewer("a");
    h.register(&a, 2, "c1 c2").await;
    h.say(&a, &form("c1")).await;
    assert_eq!(h.step(&a), Step::FormSubmission);

    let confirm = h.say(&a, "취소").await;
    assert_eq!(confirm.message, templates::CANCEL_CONFIRM);
    assert!(h.session(&a).cancel_pending);

    // Any other input withdraws the pending confirmation
    h.say(&a, "__continue__").await;
    assert!(!h.session(&a).cancel_pending);
    let again = h.say(&a, "취소").await;
    assert_eq!(again.message, templates::CANCEL_CONFIRM);

    h.say(&a, "__cancel__").await;
    assert_eq!(h.step(&a), Step::Menu);
    let records = h.records(&a).await;
    assert!(records.iter().all(|r| r.status == ProgressStatus::Cancelled));
}

#[tokio::test]
async fn test_back_after_forms_asks_to_cancel() {
    let h = Harness::new(vec![serum()]);
    let a = reviewer("a");
    h.register(&a, 1, "k1").await;
    h.say(&a, &form("k1")).await;

    let response = h.say(&a, "__back__").await;
    assert_eq!(response.message, templates::CANCEL_CONFIRM);
    assert_eq!(h.step(&a), Step::AwaitingPurchaseProof);
}

#[tokio::test]
async fn test_failed_transition_leaves_session_unchanged() {
    let h = Harness::new(vec![serum()]);
    let a = reviewer("a");
    h.say(&a, "1").await;
    h.say(&a, "1").await;
    assert_eq!(h.step(&a), Step::AccountCount);
    let before = h.session(&a);

    h.rt.state.shutdown().await.unwrap();
    let response = h.say(&a, "1").await;
    assert_eq!(response.message, templates::ERROR_OCCURRED);
    let after = h.session(&a);
    assert_eq!(after.step, before.step);
    assert_eq!(after.scratch, before.scratch);
}

#[tokio::test]
async fn test_lazy_recovery_resumes_guide_sent_records() {
    let h = Harness::new(vec![serum()]);
    let a = reviewer("a");
    h.register(&a, 2, "r1 r2").await;
    h.say(&a, &form("r1")).await;

    // Volatile state lost
    assert!(h.rt.sessions.remove(&a.key()));

    let response = h.say(&a, "안녕하세요").await;
    assert!(response.message.starts_with(&templates::resumed(&serum())));
    assert_eq!(h.step(&a), Step::OptionOrGuide);
    match &h.session(&a).scratch {
        Scratch::Purchase(data) => {
            assert_eq!(data.pending(), vec!["r2".to_string()]);
            assert!(data.submitted.contains("r1"));
        }
        other => panic!("unexpected scratch {other:?}"),
    }

    h.say(&a, &form("r2")).await;
    assert_eq!(h.step(&a), Step::AwaitingPurchaseProof);
}

#[tokio::test]
async fn test_edit_single_record_field() {
    let h = Harness::new(vec![serum()]);
    let a = reviewer("a");
    h.register(&a, 1, "e1").await;
    h.say(&a, &form("e1")).await;

    h.say(&a, "정보수정").await;
    assert_eq!(h.step(&a), Step::EditSelectField);
    let ask = h.say(&a, &format!("__btn__:field_{BANK}")).await;
    assert!(ask.message.contains("국민"));
    assert_eq!(h.step(&a), Step::EditValue);

    let done = h.say(&a, "신한").await;
    assert!(done.message.starts_with(templates::EDIT_DONE));
    assert_eq!(h.step(&a), Step::Menu);
    assert_eq!(h.records(&a).await[0].form_field(BANK), Some("신한"));
}

#[tokio::test]
async fn test_edit_rejects_invalid_phone() {
    let h = Harness::new(vec![serum()]);
    let a = reviewer("a");
    h.register(&a, 1, "e1").await;
    h.say(&a, &form("e1")).await;

    h.say(&a, "정보수정").await;
    h.say(&a, "2").await;
    let invalid = h.say(&a, "12345").await;
    assert_eq!(invalid.message, templates::invalid_edit_value("연락처"));
    assert_eq!(h.step(&a), Step::EditValue);
}

#[tokio::test]
async fn test_edit_with_nothing_to_edit() {
    let h = Harness::new(vec![serum()]);
    let a = reviewer("a");

    let response = h.say(&a, "정보수정").await;
    assert_eq!(response.message, templates::NOTHING_TO_EDIT);
    assert_eq!(h.step(&a), Step::Menu);
}

#[tokio::test]
async fn test_inquiry_escalation_routes_to_operator() {
    let h = Harness::new(vec![serum()]);
    let a = reviewer("a");

    h.say(&a, "5").await;
    assert_eq!(h.step(&a), Step::Inquiry);
    let answer = h.say(&a, "입금은 언제 되나요").await;
    assert!(answer.message.contains("입금"));
    assert_eq!(h.step(&a), Step::Inquiry);

    h.say(&a, "상담원 연결해주세요").await;
    assert_eq!(h.step(&a), Step::InquirySubmission);

    let received = h.say(&a, "택배가 아직 안 왔어요").await;
    assert!(received.message.contains("문의가 접수"));
    assert_eq!(h.step(&a), Step::Menu);

    let routed = h.rt.inquiries.inquiries();
    assert_eq!(routed.len(), 1);
    assert_eq!(routed[0].text, "택배가 아직 안 왔어요");
    assert!(routed[0].context.iter().any(|line| line.contains("입금은 언제")));
}

#[tokio::test]
async fn test_awaiting_proof_follows_durable_status() {
    let h = Harness::new(vec![serum()]);
    let a = reviewer("a");
    h.register(&a, 1, "p1").await;
    h.say(&a, &form("p1")).await;
    let ids: Vec<i64> = h.records(&a).await.iter().map(|r| r.id).collect();

    let remind = h.say(&a, "확인").await;
    assert!(remind.message.contains("구매 캡쳐"));

    h.rt.state.set_status(&ids, ProgressStatus::AwaitingReviewProof).await.unwrap();
    h.say(&a, "확인").await;
    assert_eq!(h.step(&a), Step::AwaitingReviewProof);

    h.rt.state.set_status(&ids, ProgressStatus::ReviewSubmitted).await.unwrap();
    let done = h.say(&a, "확인").await;
    assert_eq!(done.message, templates::ALL_DONE);
    assert_eq!(h.step(&a), Step::Completed);

    h.say(&a, "2").await;
    assert_eq!(h.step(&a), Step::Menu);
}

#[tokio::test]
async fn test_progress_summary_lists_records() {
    let h = Harness::new(vec![serum()]);
    let a = reviewer("a");
    h.register(&a, 1, "v1").await;
    h.say(&a, "메뉴").await;

    let summary = h.say(&a, "2").await;
    assert!(summary.message.contains("v1"));
    assert!(summary.message.contains(templates::status_label(ProgressStatus::GuideSent)));
}

#[tokio::test]
async fn test_stored_form_is_json_object() {
    let h = Harness::new(vec![serum()]);
    let a = reviewer("a");
    h.register(&a, 1, "j1").await;
    h.say(&a, &form("j1")).await;

    let record = &h.records(&a).await[0];
    assert!(matches!(&record.form, Value::Object(map) if map.len() == 5));
}
