//! Matching criteria for bulk actions

use super::PlanTarget;
use crate::guard::Rank;
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Exactly one predicate family per bulk action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criteria {
    /// Everything in the collection
    All,
    /// No members (roles) or no text (messages)
    Empty,
    /// Label starts with the prefix, case-insensitively
    NamePrefix(String),
    /// Ordinal position strictly below the threshold
    BelowRank(Rank),
    /// Created more than `n` days before now
    OlderThanDays(u32),
}

impl Criteria {
    pub fn matches<T: PlanTarget>(&self, target: &T, now: DateTime<Utc>) -> bool {
        match self {
            Self::All => true,
            Self::Empty => target.is_empty(),
            Self::NamePrefix(prefix) => target
                .label()
                .to_lowercase()
                .starts_with(&prefix.to_lowercase()),
            Self::BelowRank(threshold) => target.rank().is_some_and(|rank| rank < *threshold),
            Self::OlderThanDays(days) => now
                .checked_sub_signed(Duration::days(i64::from(*days)))
                .is_some_and(|cutoff| target.created_at() < cutoff),
        }
    }
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("everything"),
            Self::Empty => f.write_str("empty"),
            Self::NamePrefix(prefix) => write!(f, "starting with \"{prefix}\""),
            Self::BelowRank(rank) => write!(f, "below position {}", rank.0),
            Self::OlderThanDays(days) => write!(f, "older than {days} days"),
        }
    }
}

/// What a bulk action should match, and how many of the matches to take
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSpec {
    pub criteria: Criteria,
    pub limit: Option<usize>,
}

impl ActionSpec {
    pub fn new(criteria: Criteria) -> Self {
        Self {
            criteria,
            limit: None,
        }
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl fmt::Display for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.limit {
            Some(limit) => write!(f, "{} (up to {limit})", self.criteria),
            None => write!(f, "{}", self.criteria),
        }
    }
}
