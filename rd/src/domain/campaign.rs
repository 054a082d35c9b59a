//! Campaign definitions

use serde::{Deserialize, Serialize};

/// A review campaign as configured by operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Campaign {
    pub id: String,

    #[serde(rename = "product-name")]
    pub product_name: String,

    #[serde(rename = "store-name")]
    pub store_name: String,

    /// Purchasable options; more than one triggers per-identifier option choice
    pub options: Vec<String>,

    /// Total identifiers the campaign accepts
    #[serde(rename = "total-quantity")]
    pub total_quantity: i64,

    /// Identifiers accepted per local day (None = unlimited)
    #[serde(rename = "daily-cap")]
    pub daily_cap: Option<i64>,

    #[serde(rename = "review-fee")]
    pub review_fee: i64,

    #[serde(rename = "product-link")]
    pub product_link: String,

    pub keyword: String,

    #[serde(rename = "entry-method")]
    pub entry_method: String,

    #[serde(rename = "payment-amount")]
    pub payment_amount: i64,

    #[serde(rename = "review-guide")]
    pub review_guide: String,

    /// Days after purchase verification the review is due
    #[serde(rename = "review-deadline-days")]
    pub review_deadline_days: u32,

    /// Closed campaigns stay resolvable by id but are not listed
    pub active: bool,
}

impl Default for Campaign {
    fn default() -> Self {
        Self {
            id: String::new(),
            product_name: String::new(),
            store_name: String::new(),
            options: Vec::new(),
            total_quantity: 0,
            daily_cap: None,
            review_fee: 0,
            product_link: String::new(),
            keyword: String::new(),
            entry_method: String::new(),
            payment_amount: 0,
            review_guide: String::new(),
            review_deadline_days: 7,
            active: true,
        }
    }
}

impl Campaign {
    pub fn has_multiple_options(&self) -> bool {
        self.options.len() > 1
    }

    /// Single option label shown in the guide
    pub fn option_label(&self) -> &str {
        self.options.first().map(String::as_str).unwrap_or("-")
    }
}

/// Remaining daily capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyCapacity {
    Unlimited,
    Remaining(i64),
}

impl DailyCapacity {
    pub fn allows(self, count: i64) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Remaining(left) => left >= count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_partial_campaign() {
        let yaml = r#"
id: c1
product-name: 무선 청소기
total-quantity: 20
options: [화이트, 블랙]
"#;
        let campaign: Campaign = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(campaign.product_name, "무선 청소기");
        assert!(campaign.has_multiple_options());
        assert!(campaign.active);
        assert_eq!(campaign.daily_cap, None);
        assert_eq!(campaign.review_deadline_days, 7);
    }

    #[test]
    fn test_daily_capacity_allows() {
        assert!(DailyCapacity::Unlimited.allows(100));
        assert!(DailyCapacity::Remaining(2).allows(2));
        assert!(!DailyCapacity::Remaining(1).allows(2));
    }
}
