//! Composite RFV scores and the marketing actions attached to them

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::classify::SegmentClass;
use crate::error::{Error, Result};

const SEND_COUPONS: &str = "send discount coupons";
const CHURN: &str = "churn — no action";

/// Three quartile classes in recency, frequency, value order, written as a
/// three-letter code such as `"ABD"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RfvScore {
    pub recency: SegmentClass,
    pub frequency: SegmentClass,
    pub value: SegmentClass,
}

impl RfvScore {
    pub fn new(recency: SegmentClass, frequency: SegmentClass, value: SegmentClass) -> Self {
        Self {
            recency,
            frequency,
            value,
        }
    }
}

impl fmt::Display for RfvScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.recency, self.frequency, self.value)
    }
}

impl FromStr for RfvScore {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let classes: Vec<SegmentClass> = s
            .chars()
            .map(SegmentClass::from_char)
            .collect::<Option<_>>()
            .ok_or_else(|| Error::InvalidScore(s.to_string()))?;

        match classes.as_slice() {
            &[recency, frequency, value] => Ok(Self::new(recency, frequency, value)),
            _ => Err(Error::InvalidScore(s.to_string())),
        }
    }
}

impl TryFrom<String> for RfvScore {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<RfvScore> for String {
    fn from(score: RfvScore) -> Self {
        score.to_string()
    }
}

/// Recommended action for each composite score that has one.
///
/// Scores without an entry have no recommendation; looking them up is not an
/// error. [`ActionTable::default`] holds the seed rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTable {
    rules: BTreeMap<RfvScore, String>,
}

impl ActionTable {
    /// A table with no rules
    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    /// Add or replace the action for `score`, returning the previous one.
    ///
    /// Action text must be non-empty and free of leading or trailing
    /// whitespace so that it survives export and re-import unchanged.
    pub fn insert(&mut self, score: RfvScore, action: impl Into<String>) -> Result<Option<String>> {
        let action = action.into();
        if action.is_empty() || action.trim() != action {
            return Err(Error::InvalidActionText(action));
        }
        Ok(self.rules.insert(score, action))
    }

    /// Add or replace a rule written as `SCORE=TEXT`, e.g. `ABA=invite to loyalty club`.
    pub fn insert_rule(&mut self, rule: &str) -> Result<Option<String>> {
        let (score, action) = rule
            .split_once('=')
            .map(|(score, action)| (score.trim(), action.trim()))
            .filter(|(_, action)| !action.is_empty())
            .ok_or_else(|| Error::InvalidAction(rule.to_string()))?;

        self.insert(score.parse()?, action)
    }

    pub fn lookup(&self, score: &RfvScore) -> Option<&str> {
        self.rules.get(score).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for ActionTable {
    fn default() -> Self {
        use SegmentClass::{A, C, D};

        let rules = [
            (RfvScore::new(A, A, A), SEND_COUPONS),
            (RfvScore::new(D, D, D), CHURN),
            (RfvScore::new(D, A, A), SEND_COUPONS),
            (RfvScore::new(C, A, A), SEND_COUPONS),
        ];

        Self {
            rules: rules
                .into_iter()
                .map(|(score, action)| (score, action.to_string()))
                .collect(),
        }
    }
}
