//! Reviewer identity

use serde::{Deserialize, Serialize};

/// Durable reviewer id handed out by the identity resolver
pub type ReviewerId = i64;

/// Display name + phone number, collapsed into one session key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReviewerIdentity {
    pub name: String,
    pub phone: String,
}

impl ReviewerIdentity {
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            phone: phone.into().trim().to_string(),
        }
    }

    /// Opaque session key
    pub fn key(&self) -> String {
        format!("{}_{}", self.name, self.phone)
    }
}

impl std::fmt::Display for ReviewerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_trimmed() {
        let identity = ReviewerIdentity::new(" 홍길동 ", "010-1234-5678\n");
        assert_eq!(identity.key(), "홍길동_010-1234-5678");
    }
}
