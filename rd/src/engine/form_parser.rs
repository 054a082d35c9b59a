//! Text parsing for menu choices, identifiers and purchase forms

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

pub const RECIPIENT: &str = "수취인명";
pub const PHONE: &str = "연락처";
pub const BANK: &str = "은행";
pub const ACCOUNT: &str = "계좌";
pub const DEPOSITOR: &str = "예금주";
pub const ADDRESS: &str = "주소";
pub const NICKNAME: &str = "닉네임";
pub const AMOUNT: &str = "결제금액";
pub const ORDER_NUMBER: &str = "주문번호";

pub const REQUIRED_FIELDS: [&str; 5] = [RECIPIENT, PHONE, BANK, ACCOUNT, DEPOSITOR];

/// Every field a reviewer may edit afterwards, in display order
pub const EDITABLE_FIELDS: [&str; 9] = [
    RECIPIENT,
    PHONE,
    BANK,
    ACCOUNT,
    DEPOSITOR,
    ADDRESS,
    NICKNAME,
    AMOUNT,
    ORDER_NUMBER,
];

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("Invalid regex")
}

static FIELD_PATTERNS: LazyLock<Vec<(&'static str, Vec<Regex>)>> = LazyLock::new(|| {
    vec![
        (
            RECIPIENT,
            vec![
                regex(r"(?m)수취인명?[ \t]*[:：][ \t]*(.+?)[ \t]*$"),
                regex(r"(?m)^[ \t]*이름[ \t]*[:：][ \t]*(.+?)[ \t]*$"),
            ],
        ),
        (
            PHONE,
            vec![
                regex(r"(?:연락처|전화번호?)[ \t]*[:：][ \t]*(\d[\d\- ]*\d)"),
                regex(r"(010[\- ]?\d{4}[\- ]?\d{4})"),
            ],
        ),
        (BANK, vec![regex(r"은행[ \t]*[:：][ \t]*([^\n/,]+)")]),
        (ACCOUNT, vec![regex(r"계좌[ \t]*(?:번호)?[ \t]*[:：][ \t]*(\d[\d\- ]*\d)")]),
        (DEPOSITOR, vec![regex(r"예금주[ \t]*[:：][ \t]*([^\n/,]+)")]),
        (ADDRESS, vec![regex(r"(?m)주소[ \t]*[:：][ \t]*(.+?)[ \t]*$")]),
        (NICKNAME, vec![regex(r"(?m)닉(?:네임)?[ \t]*[:：][ \t]*(.+?)[ \t]*$")]),
        (AMOUNT, vec![regex(r"(?:결제[ \t]*)?금액[ \t]*[:：][ \t]*([\d,]+)")]),
        (ORDER_NUMBER, vec![regex(r"주문[ \t]*번호[ \t]*[:：][ \t]*([A-Za-z0-9\-]+)")]),
    ]
});

static ID_LINE: LazyLock<Regex> = LazyLock::new(|| regex(r"^[ \t]*(?:아이디|[Ii][Dd])[ \t]*[:：][ \t]*(\S+)"));

static NUMBERED: LazyLock<Regex> = LazyLock::new(|| regex(r"^(\d+)\s*(?:번|개|계정)?$"));

static ID_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| regex(r"[,，、\s]+"));

const MENU_KEYWORDS: [(u8, &[&str]); 5] = [
    (1, &["신청", "체험단", "모집"]),
    (2, &["진행", "현황", "상황"]),
    (3, &["사진", "캡쳐", "제출", "업로드"]),
    (4, &["입금", "정산", "돈"]),
    (5, &["문의", "기타", "질문"]),
];

/// One form as typed by the reviewer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormBlock {
    /// From an `아이디:` line, if present
    pub store_id: Option<String>,
    pub fields: BTreeMap<String, String>,
}

impl FormBlock {
    pub fn missing(&self) -> Vec<&'static str> {
        REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|f| !self.fields.contains_key(*f))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// At least one required field was recognised
    pub fn has_content(&self) -> bool {
        REQUIRED_FIELDS.iter().any(|f| self.fields.contains_key(*f))
    }

    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        Value::Object(map)
    }
}

/// `010-XXXX-XXXX` or None when the digits do not form a mobile number
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 11 && digits.starts_with("010") {
        Some(format!("{}-{}-{}", &digits[..3], &digits[3..7], &digits[7..]))
    } else {
        None
    }
}

/// Validate and normalise a single field value; None when invalid
pub fn normalize_field(field: &str, raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    match field {
        PHONE => normalize_phone(value),
        ACCOUNT => {
            let valid = value.chars().all(|c| c.is_ascii_digit() || c == '-' || c == ' ')
                && value.chars().filter(char::is_ascii_digit).count() >= 6;
            valid.then(|| value.replace(' ', ""))
        }
        AMOUNT => {
            let digits: String = value.chars().filter(|c| *c != ',').collect();
            (!digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())).then_some(digits)
        }
        _ => Some(value.to_string()),
    }
}

/// Extract every recognised field from one block of text
pub fn parse_fields(text: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    for (name, patterns) in FIELD_PATTERNS.iter() {
        let found = patterns
            .iter()
            .find_map(|p| p.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str().trim().to_string()));
        if let Some(value) = found.and_then(|v| normalize_field(name, &v)) {
            fields.insert(name.to_string(), value);
        }
    }
    fields
}

/// Split a message into form blocks at `아이디:` lines
pub fn parse_blocks(text: &str) -> Vec<FormBlock> {
    let mut chunks: Vec<(Option<String>, String)> = vec![(None, String::new())];
    for line in text.lines() {
        if let Some(caps) = ID_LINE.captures(line) {
            let id = caps.get(1).map(|m| m.as_str().to_string());
            chunks.push((id, String::new()));
            continue;
        }
        if let Some((_, body)) = chunks.last_mut() {
            body.push_str(line);
            body.push('\n');
        }
    }
    chunks
        .into_iter()
        .map(|(store_id, body)| FormBlock {
            store_id,
            fields: parse_fields(&body),
        })
        .filter(|block| block.store_id.is_some() || !block.fields.is_empty())
        .collect()
}

pub fn has_form_content(text: &str) -> bool {
    parse_blocks(text).iter().any(FormBlock::has_content)
}

/// Menu number 1-5 from digits, "N번" or a keyword
pub fn parse_menu_choice(text: &str) -> Option<u8> {
    let text = text.trim();
    if let Some(n) = parse_number(text) {
        return (1..=5).contains(&n).then_some(n as u8);
    }
    MENU_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| text.contains(w)))
        .map(|(n, _)| *n)
}

/// "2", "2번", "2개"
pub fn parse_number(text: &str) -> Option<usize> {
    NUMBERED
        .captures(text.trim())
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Store identifiers separated by commas or whitespace
pub fn parse_identifiers(text: &str) -> Vec<String> {
    ID_SEPARATORS
        .split(text.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_FORM: &str = "수취인명: 홍길동\n연락처: 01012345678\n은행: 국민\n계좌: 123-456-789012\n예금주: 홍길동\n주소: 서울시 강남구\n주문번호: 2024-0001";

    #[test]
    fn test_parse_full_form() {
        let fields = parse_fields(FULL_FORM);
        assert_eq!(fields[RECIPIENT], "홍길동");
        assert_eq!(fields[PHONE], "010-1234-5678");
        assert_eq!(fields[BANK], "국민");
        assert_eq!(fields[ACCOUNT], "123-456-789012");
        assert_eq!(fields[ADDRESS], "서울시 강남구");
        assert_eq!(fields[ORDER_NUMBER], "2024-0001");
    }

    #[test]
    fn test_blank_template_lines_do_not_bleed() {
        let fields = parse_fields("수취인명:\n연락처:\n은행: 신한\n");
        assert!(!fields.contains_key(RECIPIENT));
        assert!(!fields.contains_key(PHONE));
        assert_eq!(fields[BANK], "신한");
    }

    #[test]
    fn test_parse_blocks_by_identifier() {
        let text = format!("아이디: a1\n{FULL_FORM}\n\n아이디: a2\n수취인명: 김철수\n");
        let blocks = parse_blocks(&text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].store_id.as_deref(), Some("a1"));
        assert!(blocks[0].is_complete());
        assert_eq!(blocks[1].store_id.as_deref(), Some("a2"));
        assert_eq!(blocks[1].missing(), vec![PHONE, BANK, ACCOUNT, DEPOSITOR]);
    }

    #[test]
    fn test_parse_blocks_without_identifier() {
        let blocks = parse_blocks(FULL_FORM);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].store_id.is_none());
        assert!(has_form_content(FULL_FORM));
        assert!(!has_form_content("안녕하세요"));
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("010 1234 5678").as_deref(), Some("010-1234-5678"));
        assert_eq!(normalize_phone("02-123-4567"), None);
    }

    #[test]
    fn test_normalize_field_values() {
        assert_eq!(normalize_field(AMOUNT, "12,900").as_deref(), Some("12900"));
        assert_eq!(normalize_field(ACCOUNT, "12ab"), None);
        assert_eq!(normalize_field(BANK, "  "), None);
    }

    #[test]
    fn test_menu_choice() {
        assert_eq!(parse_menu_choice("1"), Some(1));
        assert_eq!(parse_menu_choice("3번"), Some(3));
        assert_eq!(parse_menu_choice("입금 언제 돼요?"), Some(4));
        assert_eq!(parse_menu_choice("7"), None);
        assert_eq!(parse_menu_choice("안녕하세요"), None);
    }

    #[test]
    fn test_parse_identifiers() {
        assert_eq!(parse_identifiers("a1, a2\nb3"), vec!["a1", "a2", "b3"]);
        assert!(parse_identifiers("  ").is_empty());
        assert_eq!(parse_number("2개"), Some(2));
    }
}
