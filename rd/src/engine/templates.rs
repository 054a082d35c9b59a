//! Reviewer-facing message text

use crate::domain::{Campaign, ProgressStatus};

pub const MENU_ITEMS: &str = "1️⃣ 체험단 신청\n2️⃣ 진행 상황 확인\n3️⃣ 사진 제출 (구매/리뷰 캡쳐)\n4️⃣ 입금 현황 확인\n5️⃣ 기타 문의";

pub const NO_CAMPAIGNS: &str = "현재 모집 중인 체험단이 없습니다. 곧 새로운 캠페인이 등록되면 안내드릴게요!";

pub const CAMPAIGN_LIST_HEADER: &str = "현재 모집 중인 체험단입니다. 원하시는 체험단을 선택해주세요.";

pub const ASK_STORE_IDS_HINT: &str = "(여러 개면 콤마로 구분. 예: abc123, def456)";

pub const UNKNOWN_INPUT: &str = "죄송합니다, 이해하지 못했어요. 다시 입력해주시거나 번호를 선택해주세요.";

pub const ERROR_OCCURRED: &str = "죄송합니다, 오류가 발생했습니다. 잠시 후 다시 시도해주세요.";

pub const ALL_DONE: &str = "모든 제출이 완료되었습니다! 🎉\n\n확인 후 리뷰비를 입금해드리겠습니다.\n메뉴 4번 입금 현황에서 확인하실 수 있습니다.";

pub const INQUIRY_PROMPT: &str = "궁금하신 점을 자유롭게 입력해주세요. 담당자 연결이 필요하면 '상담원 연결'을 눌러주세요.";

pub const INQUIRY_SUBMISSION_PROMPT: &str = "담당자에게 전달할 문의 내용을 한 번에 입력해주세요.";

pub const CANCEL_CONFIRM: &str = "이미 제출하신 양식이 있습니다. 정말 신청을 취소하시겠어요?\n취소하면 이번 신청의 모든 아이디가 취소됩니다.";

pub const CANCELLED: &str = "신청이 취소되었습니다.";

pub const NOTHING_TO_EDIT: &str = "수정할 수 있는 진행 중인 신청이 없습니다.";

pub const EDIT_DONE: &str = "정보가 수정되었습니다. ✅";

pub fn welcome(name: Option<&str>) -> String {
    match name {
        Some(name) => format!("안녕하세요, {}님! 다시 오셨군요 😊\n\n무엇을 도와드릴까요?\n\n{}", name, MENU_ITEMS),
        None => format!(
            "안녕하세요! 리뷰 체험단 진행을 도와드리겠습니다 😊\n\n아래에서 원하시는 항목을 선택해주세요:\n\n{}",
            MENU_ITEMS
        ),
    }
}

pub fn ask_account_count(campaign: &Campaign, max: usize) -> String {
    format!(
        "✨ {} ✨\n🏪 {}\n\n몇 개 계정으로 진행하시겠습니까?\n(1~{} 사이 숫자를 입력해주세요)",
        campaign.product_name, campaign.store_name, max
    )
}

pub fn ask_store_ids(count: usize) -> String {
    format!("스토어 아이디 {}개를 입력해주세요.\n{}", count, ASK_STORE_IDS_HINT)
}

pub fn wrong_id_count(expected: usize, got: usize) -> String {
    format!(
        "아이디 {}개를 입력해주셔야 합니다. (입력하신 아이디: {}개)\n{}",
        expected, got, ASK_STORE_IDS_HINT
    )
}

pub fn duplicates_found(duplicates: &[String], accepted: &[String]) -> String {
    let mut text = format!(
        "⚠️ 이미 이 캠페인에 신청된 아이디가 있습니다: {}\n",
        duplicates.join(", ")
    );
    if accepted.is_empty() {
        text.push_str("\n다른 아이디로 교체해주세요.");
    } else {
        text.push_str(&format!(
            "\n사용 가능한 아이디: {}\n{}개로 진행하시거나 중복 아이디를 교체해주세요.",
            accepted.join(", "),
            accepted.len()
        ));
    }
    text
}

pub fn ask_replacements(count: usize) -> String {
    format!("교체할 아이디 {}개를 입력해주세요.", count)
}

pub fn capacity_exhausted(campaign: &Campaign, remaining: i64) -> String {
    if remaining <= 0 {
        format!("😢 {} 체험단은 방금 모집이 마감되었습니다.", campaign.product_name)
    } else {
        format!(
            "😢 {} 체험단의 남은 수량이 {}개뿐이라 신청하신 수량을 등록할 수 없습니다.",
            campaign.product_name, remaining
        )
    }
}

pub fn daily_cap_reached(campaign: &Campaign) -> String {
    format!(
        "😢 {} 체험단은 오늘 모집 수량이 마감되었습니다. 내일 다시 신청해주세요.",
        campaign.product_name
    )
}

pub fn campaign_closed() -> String {
    "선택하신 체험단은 더 이상 모집하지 않습니다.".to_string()
}

pub fn ask_option(campaign: &Campaign, store_id: &str, position: usize, total: usize) -> String {
    format!(
        "[{}/{}] 아이디 {}로 구매하실 옵션을 선택해주세요.\n📦 {}",
        position,
        total,
        store_id,
        campaign.options.join(" / ")
    )
}

pub fn form_template(store_ids: &[String]) -> String {
    store_ids
        .iter()
        .map(|id| {
            format!(
                "아이디: {}\n수취인명:\n연락처:\n은행:\n계좌:\n예금주:\n주소:\n주문번호:",
                id
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn purchase_guide(
    campaign: &Campaign,
    options: &[(String, Option<String>)],
    pending: &[String],
    timeout_mins: u64,
) -> String {
    let option_lines = if options.iter().any(|(_, option)| option.is_some()) {
        options
            .iter()
            .map(|(id, option)| format!("  - {}: {}", id, option.as_deref().unwrap_or("-")))
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        campaign.option_label().to_string()
    };
    format!(
        "📋 구매 가이드를 안내드립니다.\n\n✨ {} ✨\n🏪 {}\n\n🔗 상품링크: {}\n🔍 키워드: {}\n📱 유입방식: {}\n📦 옵션: {}\n💰 결제금액: {}원\n📝 리뷰가이드: {}\n\n📌 구매 방법:\n1. 위 링크로 접속 또는 키워드 검색\n2. 상품 구매 (옵션 확인!)\n3. 구매 완료 후 아래 양식을 제출해주세요\n\n⏰ {}분 안에 양식을 제출하지 않으면 신청이 자동 취소됩니다.\n\n✏️ 구매 완료 후 아래 양식을 입력해주세요:\n\n{}",
        campaign.product_name,
        campaign.store_name,
        campaign.product_link,
        campaign.keyword,
        campaign.entry_method,
        option_lines,
        campaign.payment_amount,
        campaign.review_guide,
        timeout_mins,
        form_template(pending)
    )
}

pub fn resumed(campaign: &Campaign) -> String {
    format!("진행 중이던 {} 신청을 이어서 진행합니다.", campaign.product_name)
}

pub fn form_outstanding(pending: &[String], problems: &[String]) -> String {
    let mut text = String::new();
    if !problems.is_empty() {
        text.push_str(&problems.join("\n"));
        text.push_str("\n\n");
    }
    text.push_str("아래 양식을 다시 입력해주세요:\n\n");
    text.push_str(&form_template(pending));
    text
}

pub fn form_partial(accepted: &[String], problems: &[String], pending: &[String]) -> String {
    format!(
        "✅ 접수된 아이디: {}\n\n{}",
        accepted.join(", "),
        form_outstanding(pending, problems)
    )
}

pub fn form_received(campaign: &Campaign, store_ids: &[String], recipient: &str, upload_url: &str) -> String {
    format!(
        "양식이 접수되었습니다! ✅\n\n📦 {}\n🆔 {}\n👤 {}\n\n📸 이제 구매 캡쳐를 제출해주세요.\n🔗 사진 제출: {}",
        campaign.product_name,
        store_ids.join(", "),
        recipient,
        upload_url
    )
}

pub fn purchase_capture_remind(upload_url: &str) -> String {
    format!("구매 캡쳐를 아직 제출하지 않으셨어요!\n\n📸 사진 제출 링크: {}", upload_url)
}

pub fn review_capture_remind(upload_url: &str, deadline: Option<&str>) -> String {
    format!(
        "리뷰 캡쳐를 아직 제출하지 않으셨어요!\n\n📸 사진 제출 링크: {}\n\n⏰ 리뷰 기한: {}",
        upload_url,
        deadline.unwrap_or("안내 예정")
    )
}

pub fn upload_guide(upload_url: &str) -> String {
    format!("📸 구매/리뷰 캡쳐는 아래 링크에서 제출해주세요.\n🔗 {}", upload_url)
}

pub fn status_label(status: ProgressStatus) -> &'static str {
    match status {
        ProgressStatus::Applied => "신청",
        ProgressStatus::GuideSent => "가이드 발송",
        ProgressStatus::AwaitingPurchaseProof => "구매캡쳐 대기",
        ProgressStatus::AwaitingReviewProof => "리뷰캡쳐 대기",
        ProgressStatus::ReviewSubmitted => "리뷰 제출",
        ProgressStatus::AwaitingSettlement => "입금 대기",
        ProgressStatus::Settled => "입금 완료",
        ProgressStatus::TimedOut => "시간 초과 취소",
        ProgressStatus::Cancelled => "취소",
    }
}

pub fn inquiry_received(inquiry_id: &str) -> String {
    let short: String = inquiry_id.chars().rev().take(6).collect::<Vec<_>>().into_iter().rev().collect();
    format!("문의가 접수되었습니다 (접수번호 {}). 담당자가 확인 후 답변드리겠습니다.", short)
}

pub fn ask_edit_record() -> String {
    "수정할 신청을 선택해주세요.".to_string()
}

pub fn ask_edit_field(store_id: &str) -> String {
    format!("아이디 {}의 어떤 정보를 수정할까요?", store_id)
}

pub fn ask_edit_value(field: &str, current: Option<&str>) -> String {
    format!(
        "새 {} 값을 입력해주세요. (현재: {})",
        field,
        current.unwrap_or("없음")
    )
}

pub fn invalid_edit_value(field: &str) -> String {
    format!("{} 형식이 올바르지 않습니다. 다시 입력해주세요.", field)
}
