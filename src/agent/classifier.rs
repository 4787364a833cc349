//! Deterministic READ/WRITE triage of free-form messages.
//!
//! Runs before any extraction so a message can only reach the trade path
//! when it names both a trade action and an amount of money.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static ACTION_VERB: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(buy|buying|bought|bet|betting|sell|selling|sold|place|placing|wager|wagering|stake|staking)\b",
    )
    .ok()
});

static MONEY: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        (?:[$€£]\s?\d+(?:[.,]\d+)?)
        | (?:\b\d+(?:[.,]\d+)?\s?(?:usd|usdc|dollars?|bucks|cents?|eur|euros?)\b)
        | (?:\b\d+(?:[.,]\d+)?¢)
        ",
    )
    .ok()
});

// A pattern that failed to compile never matches, so classification falls
// back to READ.
fn matches(pattern: &Option<Regex>, text: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(text))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntentClass {
    Read,
    Write,
}

impl IntentClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Write => "WRITE",
        }
    }
}

impl std::fmt::Display for IntentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// WRITE iff the text has a trade verb and a money amount. Total.
    pub fn classify(&self, text: &str) -> IntentClass {
        if matches(&ACTION_VERB, text) && matches(&MONEY, text) {
            IntentClass::Write
        } else {
            IntentClass::Read
        }
    }
}
