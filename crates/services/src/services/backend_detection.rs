//! Decides from the user's prompt whether the generated site needs a backend.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use ts_rs::TS;

/// Shape of the site the model is asked to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, TS)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProjectKind {
    Static,
    FullStack,
}

/// Words that imply data the site has to persist
static PERSISTENCE_KEYWORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)\b(
            orders | ordering | place\s+(an\s+)?orders? |
            order\s+(online|form|now|tracking|history) | online\s+order |
            (shopping\s+)?carts? |
            bookings? | book\s+(a|an|your)\s+\w+ |
            reservations? | reserve |
            appointments? |
            databases? | mysql | sql |
            checkout | check\s+out |
            inventory | stock\s+levels? |
            payments? |
            log\s?in | sign\s?(up|in) | user\s+accounts? |
            e-?commerce | online\s+(store|shop) |
            subscriptions? | newsletter\s+signups?
        )\b",
    )
    .expect("persistence keyword pattern is valid")
});

pub fn detect_project_kind(prompt: &str) -> ProjectKind {
    if PERSISTENCE_KEYWORDS.is_match(prompt) {
        ProjectKind::FullStack
    } else {
        ProjectKind::Static
    }
}

/// The keywords that triggered full-stack detection, for logging
pub fn matched_keywords(prompt: &str) -> Vec<String> {
    PERSISTENCE_KEYWORDS
        .find_iter(prompt)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_prompts_are_full_stack() {
        for prompt in [
            "flower shop with orders and cart",
            "An online store with a Shopping Cart",
            "hotel site where guests can make bookings",
            "dentist page to book an appointment",
            "restaurant with table reservations",
            "inventory tracker backed by a database",
            "bakery with checkout",
            "members area with login",
            "pizzeria where customers can place an order",
            "cafe page with an order form",
            "customer portal with user accounts",
        ] {
            assert_eq!(detect_project_kind(prompt), ProjectKind::FullStack, "{prompt}");
        }
    }

    #[test]
    fn test_descriptive_prompts_are_static() {
        for prompt in [
            "create a portfolio website for a photographer",
            "portfolio site",
            "landing page for a jazz band",
            "a personal blog about hiking",
            "coffee shop homepage with opening hours",
            "recorder lessons",
            "a portfolio website in order to showcase my photography",
            "portfolio site listing my projects in chronological order",
            "personal homepage, take into account dark mode",
        ] {
            assert_eq!(detect_project_kind(prompt), ProjectKind::Static, "{prompt}");
        }
    }

    #[test]
    fn test_matched_keywords() {
        assert_eq!(
            matched_keywords("Flower shop with ORDERS and cart"),
            vec!["orders".to_string(), "cart".to_string()]
        );
        assert!(matched_keywords("gallery sorted in chronological order").is_empty());
    }
}
