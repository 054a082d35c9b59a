//! Inbound intent, decoded once at the transport boundary

/// Button value prefix used by the chat client
pub const BUTTON_PREFIX: &str = "__btn__:";

pub const HOME: &str = "__home__";
pub const BACK: &str = "__back__";
pub const RESUME: &str = "__resume__";
pub const CANCEL: &str = "__cancel__";
pub const CONTINUE: &str = "__continue__";
pub const EDIT: &str = "__edit__";

const HOME_WORDS: &[&str] = &[HOME, "메뉴", "처음", "홈", "처음으로", "돌아가기"];
const BACK_WORDS: &[&str] = &[BACK, "이전", "뒤로"];
const CANCEL_WORDS: &[&str] = &[CANCEL, "취소"];
const EDIT_WORDS: &[&str] = &[EDIT, "정보수정", "정보 수정"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Home,
    Back,
    Resume,
    Cancel,
    Continue,
    EditRequest,
    /// A button press carrying its value tag
    ButtonValue(String),
    FreeText(String),
}

impl Intent {
    pub fn decode(raw: &str) -> Self {
        let text = raw.trim();
        if let Some(tag) = text.strip_prefix(BUTTON_PREFIX) {
            return Self::ButtonValue(tag.trim().to_string());
        }
        if HOME_WORDS.contains(&text) {
            Self::Home
        } else if BACK_WORDS.contains(&text) {
            Self::Back
        } else if CANCEL_WORDS.contains(&text) {
            Self::Cancel
        } else if EDIT_WORDS.contains(&text) {
            Self::EditRequest
        } else if text == RESUME {
            Self::Resume
        } else if text == CONTINUE {
            Self::Continue
        } else {
            Self::FreeText(text.to_string())
        }
    }

    /// Text payload of a button or free-text message
    pub fn payload(&self) -> Option<&str> {
        match self {
            Self::ButtonValue(tag) | Self::FreeText(tag) => Some(tag),
            _ => None,
        }
    }
}

/// Wire value for a button carrying `tag`
pub fn button_value(tag: &str) -> String {
    format!("{BUTTON_PREFIX}{tag}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_commands() {
        assert_eq!(Intent::decode("메뉴"), Intent::Home);
        assert_eq!(Intent::decode(" __back__ "), Intent::Back);
        assert_eq!(Intent::decode("취소"), Intent::Cancel);
        assert_eq!(Intent::decode("__resume__"), Intent::Resume);
        assert_eq!(Intent::decode("정보수정"), Intent::EditRequest);
        assert_eq!(Intent::decode("__continue__"), Intent::Continue);
    }

    #[test]
    fn test_decode_button_and_text() {
        assert_eq!(
            Intent::decode(&button_value("campaign_2")),
            Intent::ButtonValue("campaign_2".into())
        );
        assert_eq!(Intent::decode("  1  "), Intent::FreeText("1".into()));
        assert_eq!(Intent::decode("메뉴판 주세요").payload(), Some("메뉴판 주세요"));
    }
}
