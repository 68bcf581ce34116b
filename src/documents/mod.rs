//! Legal document generation: typed form input, quota accounting and the
//! text templates themselves.

pub mod forms;
pub mod generator;
pub mod quota;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Privacy,
    Terms,
    Consent,
    Offer,
    Cookie,
    Return,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 6] = [
        DocumentKind::Privacy,
        DocumentKind::Terms,
        DocumentKind::Consent,
        DocumentKind::Offer,
        DocumentKind::Cookie,
        DocumentKind::Return,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Privacy => "privacy",
            DocumentKind::Terms => "terms",
            DocumentKind::Consent => "consent",
            DocumentKind::Offer => "offer",
            DocumentKind::Cookie => "cookie",
            DocumentKind::Return => "return",
        }
    }

    /// Human readable title used when the caller does not supply one.
    pub fn title(self) -> &'static str {
        match self {
            DocumentKind::Privacy => "Политика конфиденциальности",
            DocumentKind::Terms => "Пользовательское соглашение",
            DocumentKind::Consent => "Согласие на обработку персональных данных",
            DocumentKind::Offer => "Публичная оферта",
            DocumentKind::Cookie => "Политика использования cookie",
            DocumentKind::Return => "Политика возврата",
        }
    }

    pub fn requires_website(self) -> bool {
        matches!(
            self,
            DocumentKind::Privacy
                | DocumentKind::Terms
                | DocumentKind::Consent
                | DocumentKind::Cookie
        )
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        DocumentKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unsupported document type: {}", value.trim()))
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Draft,
    Completed,
    Archived,
}

impl DocumentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Draft => "draft",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Archived => "archived",
        }
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "draft" => Ok(DocumentStatus::Draft),
            "completed" => Ok(DocumentStatus::Completed),
            "archived" => Ok(DocumentStatus::Archived),
            other => Err(format!("unknown document status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_round_trip_through_from_str() {
        for kind in DocumentKind::ALL {
            assert_eq!(kind.as_str().parse::<DocumentKind>(), Ok(kind));
        }
        assert_eq!(" Privacy ".parse::<DocumentKind>(), Ok(DocumentKind::Privacy));
        assert!("nda".parse::<DocumentKind>().is_err());
    }

    #[test]
    fn offer_and_return_do_not_need_a_website() {
        assert!(!DocumentKind::Offer.requires_website());
        assert!(!DocumentKind::Return.requires_website());
        assert!(DocumentKind::Cookie.requires_website());
    }
}
