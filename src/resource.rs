//! Platform resources that bulk actions operate on

use crate::guard::Rank;
use crate::plan::{PlanTarget, SkipReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    /// Ordinal position in the role list; doubles as the role's rank
    pub position: u32,
    #[serde(default)]
    pub member_count: u32,
    /// Created and owned by an integration
    #[serde(default)]
    pub managed: bool,
    /// The default role every member holds
    #[serde(default)]
    pub everyone: bool,
    pub created_at: DateTime<Utc>,
}

impl PlanTarget for Role {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.name
    }

    fn rank(&self) -> Option<Rank> {
        Some(Rank(self.position))
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn is_empty(&self) -> bool {
        self.member_count == 0
    }

    fn protection(&self) -> Option<SkipReason> {
        if self.everyone {
            Some(SkipReason::DefaultResource)
        } else if self.managed {
            Some(SkipReason::Managed)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    pub author_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub pinned: bool,
    pub created_at: DateTime<Utc>,
}

impl PlanTarget for Message {
    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.content
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }

    fn protection(&self) -> Option<SkipReason> {
        self.pinned.then_some(SkipReason::Pinned)
    }
}

/// A text channel, as offered by the purge flow's channel picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
}
