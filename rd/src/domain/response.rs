//! Structured outbound response

use serde::{Deserialize, Serialize};

use super::intent::button_value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affordance: Option<Affordance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "items", rename_all = "camelCase")]
pub enum Affordance {
    Buttons(Vec<Button>),
    Cards(Vec<CampaignCard>),
    MultiSelect(MultiSelect),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    /// Sent back verbatim when pressed
    pub value: String,
}

impl Button {
    /// Button whose value decodes to `Intent::ButtonValue(tag)`
    pub fn tagged(label: impl Into<String>, tag: &str) -> Self {
        Self {
            label: label.into(),
            value: button_value(tag),
        }
    }

    /// Button that sends a raw command string
    pub fn command(label: impl Into<String>, command: &str) -> Self {
        Self {
            label: label.into(),
            value: command.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignCard {
    /// Button value, e.g. `__btn__:campaign_1`
    pub value: String,
    pub campaign_id: String,
    pub product_name: String,
    pub store_name: String,
    pub remaining: i64,
    pub urgent: bool,
    /// The reviewer's own identifiers in this campaign, with status
    pub my_history: Vec<String>,
    /// Reviewer has an unfinished registration that can be resumed
    pub resumable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSelect {
    pub options: Vec<String>,
    pub min: usize,
    pub max: usize,
}

impl Response {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            affordance: None,
        }
    }

    pub fn with_buttons(mut self, buttons: Vec<Button>) -> Self {
        self.affordance = Some(Affordance::Buttons(buttons));
        self
    }

    pub fn with_cards(mut self, cards: Vec<CampaignCard>) -> Self {
        self.affordance = Some(Affordance::Cards(cards));
        self
    }

    pub fn with_multi_select(mut self, select: MultiSelect) -> Self {
        self.affordance = Some(Affordance::MultiSelect(select));
        self
    }

    /// Prefix another message (keeps the affordance)
    pub fn prepend(mut self, text: &str) -> Self {
        self.message = format!("{}\n\n{}", text, self.message);
        self
    }

    pub fn buttons(&self) -> &[Button] {
        match &self.affordance {
            Some(Affordance::Buttons(buttons)) => buttons,
            _ => &[],
        }
    }

    pub fn cards(&self) -> &[CampaignCard] {
        match &self.affordance {
            Some(Affordance::Cards(cards)) => cards,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_affordance_with_type_tag() {
        let response = Response::text("hi").with_buttons(vec![Button::tagged("예", "yes")]);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["affordance"]["type"], "buttons");
        assert_eq!(json["affordance"]["items"][0]["value"], "__btn__:yes");
    }

    #[test]
    fn test_plain_text_has_no_affordance() {
        let json = serde_json::to_value(Response::text("hi")).unwrap();
        assert!(json.get("affordance").is_none());
    }
}
