//! Bulk-action planning
//!
//! Turns an [`ActionSpec`] plus the current resources into a preview of what
//! would happen. Planning is pure: the same inputs (including `now`) always
//! produce the same plan, so previews can be recomputed on every re-render
//! and again at confirmation time.

mod criteria;

pub use criteria::{ActionSpec, Criteria};

use crate::guard::{self, GuardDecision, GuardDenied, Principal, Rank};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::fmt;
use std::hash::BuildHasher;
use thiserror::Error;

/// Executable items above this count refuse to run
pub const DEFAULT_ACTION_CAP: usize = 250;

/// Something a bulk action can match and mutate
pub trait PlanTarget {
    fn id(&self) -> &str;

    /// Human-readable name; prefix criteria match against it
    fn label(&self) -> &str;

    /// Position in the hierarchy, if the resource has one
    fn rank(&self) -> Option<Rank> {
        None
    }

    fn created_at(&self) -> DateTime<Utc>;

    fn is_empty(&self) -> bool;

    /// Structural protection that no rank can override
    fn protection(&self) -> Option<SkipReason> {
        None
    }
}

/// Why a matched item will not be touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Owned by an integration
    Managed,
    /// The default "everyone" resource
    DefaultResource,
    Pinned,
    /// Beyond the platform's age limit for deletion
    TooOld,
    Guard(GuardDenied),
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Managed => "managed by an integration",
            Self::DefaultResource => "default role",
            Self::Pinned => "pinned",
            Self::TooOld => "too old",
            Self::Guard(denied) => denied.reason(),
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Skipped<T> {
    pub target: T,
    pub reason: SkipReason,
}

/// Who is asking, who would execute, and when
#[derive(Debug, Clone)]
pub struct PlanContext {
    pub actor: Principal,
    pub system: Principal,
    pub now: DateTime<Utc>,
    /// Items created before `now - max_age` are skipped as too old
    pub max_age: Option<Duration>,
    /// Items created after this instant are left out entirely. A confirmation
    /// carries its preview's time here so it cannot reach newer items.
    pub as_of: Option<DateTime<Utc>>,
}

/// Preview of a bulk action.
///
/// Every matched item lands in exactly one of `excluded`, `skipped` or
/// `executable`.
#[derive(Debug, Clone)]
pub struct ActionPlan<T> {
    pub matched: Vec<T>,
    pub excluded: Vec<T>,
    pub executable: Vec<T>,
    pub skipped: Vec<Skipped<T>>,
    pub cap: usize,
}

/// Counts only, for rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSummary {
    pub matched: usize,
    pub excluded: usize,
    pub executable: usize,
    pub skipped: usize,
    pub over_cap: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{executable} items exceed the safety cap of {cap}; narrow the criteria")]
pub struct OverCap {
    pub executable: usize,
    pub cap: usize,
}

impl<T> ActionPlan<T> {
    pub fn is_over_cap(&self) -> bool {
        self.executable.len() > self.cap
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            matched: self.matched.len(),
            excluded: self.excluded.len(),
            executable: self.executable.len(),
            skipped: self.skipped.len(),
            over_cap: self.is_over_cap(),
        }
    }

    /// The only way to obtain something the executor will run.
    pub fn approve(self) -> Result<ApprovedPlan<T>, OverCap> {
        if self.is_over_cap() {
            return Err(OverCap {
                executable: self.executable.len(),
                cap: self.cap,
            });
        }
        Ok(ApprovedPlan {
            items: self.executable,
            skipped: self.skipped,
        })
    }
}

/// A confirmed, within-cap plan
#[derive(Debug, Clone)]
pub struct ApprovedPlan<T> {
    items: Vec<T>,
    skipped: Vec<Skipped<T>>,
}

impl<T> ApprovedPlan<T> {
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn skipped(&self) -> &[Skipped<T>] {
        &self.skipped
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Planner {
    cap: usize,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new(DEFAULT_ACTION_CAP)
    }
}

impl Planner {
    pub fn new(cap: usize) -> Self {
        Self { cap }
    }

    pub fn plan<T: PlanTarget + Clone, S: BuildHasher>(
        &self,
        spec: &ActionSpec,
        resources: &[T],
        exclusions: &HashSet<String, S>,
        ctx: &PlanContext,
    ) -> ActionPlan<T> {
        let matched: Vec<T> = resources
            .iter()
            .filter(|r| ctx.as_of.is_none_or(|as_of| r.created_at() <= as_of))
            .filter(|r| spec.criteria.matches(*r, ctx.now))
            .take(spec.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();

        let mut plan = ActionPlan {
            matched: Vec::with_capacity(matched.len()),
            excluded: Vec::new(),
            executable: Vec::new(),
            skipped: Vec::new(),
            cap: self.cap,
        };

        for target in &matched {
            if exclusions.contains(target.id()) {
                plan.excluded.push(target.clone());
                continue;
            }
            match skip_reason(target, ctx) {
                Some(reason) => plan.skipped.push(Skipped {
                    target: target.clone(),
                    reason,
                }),
                None => plan.executable.push(target.clone()),
            }
        }
        plan.matched = matched;

        tracing::debug!(
            spec = %spec,
            matched = plan.matched.len(),
            excluded = plan.excluded.len(),
            executable = plan.executable.len(),
            skipped = plan.skipped.len(),
            over_cap = plan.is_over_cap(),
            "Planned bulk action"
        );
        plan
    }
}

fn skip_reason<T: PlanTarget>(target: &T, ctx: &PlanContext) -> Option<SkipReason> {
    if let Some(reason) = target.protection() {
        return Some(reason);
    }
    // A limit reaching before the representable range means nothing is too old.
    if let Some(cutoff) = ctx.max_age.and_then(|age| ctx.now.checked_sub_signed(age)) {
        if target.created_at() < cutoff {
            return Some(SkipReason::TooOld);
        }
    }
    let rank = target.rank()?;
    let as_principal = Principal::new(target.id(), rank);
    match guard::check(&ctx.actor, &ctx.system, &as_principal) {
        GuardDecision::Allowed => None,
        GuardDecision::Denied(denied) => Some(SkipReason::Guard(denied)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Message, Role};

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn ctx() -> PlanContext {
        PlanContext {
            actor: Principal::owner("owner", Rank(100)),
            system: Principal::new("bot", Rank(50)),
            now: now(),
            max_age: None,
            as_of: None,
        }
    }

    fn role(id: &str, name: &str, position: u32) -> Role {
        Role {
            id: id.to_string(),
            name: name.to_string(),
            position,
            member_count: 1,
            managed: false,
            everyone: false,
            created_at: now() - Duration::days(30),
        }
    }

    fn ten_roles() -> Vec<Role> {
        vec![
            role("1", "temp-a", 10),
            role("2", "mod", 40),
            role("3", "temp-b", 11),
            role("4", "admin", 60),
            role("5", "temp-c", 70),
            role("6", "helper", 20),
            role("7", "artist", 21),
            role("8", "gamer", 22),
            role("9", "reader", 23),
            role("10", "writer", 24),
        ]
    }

    #[test]
    fn prefix_plan_with_exclusion_and_protected_role() {
        let planner = Planner::default();
        let spec = ActionSpec::new(Criteria::NamePrefix("temp-".into()));
        let exclusions = HashSet::from(["1".to_string()]);

        let plan = planner.plan(&spec, &ten_roles(), &exclusions, &ctx());

        assert_eq!(plan.matched.len(), 3);
        assert_eq!(plan.excluded.len(), 1);
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].target.id, "5");
        assert_eq!(plan.skipped[0].reason, SkipReason::Guard(GuardDenied::System));
        assert_eq!(plan.executable.len(), 1);
        assert_eq!(plan.executable[0].id, "3");
    }

    #[test]
    fn managed_and_default_roles_are_structurally_protected() {
        let mut managed = role("m", "bot-role", 5);
        managed.managed = true;
        let mut everyone = role("e", "@everyone", 0);
        everyone.everyone = true;

        let plan = Planner::default().plan(
            &ActionSpec::new(Criteria::All),
            &[managed, everyone, role("r", "plain", 3)],
            &HashSet::new(),
            &ctx(),
        );

        let reasons: Vec<_> = plan.skipped.iter().map(|s| s.reason.as_str()).collect();
        assert_eq!(reasons, vec!["managed by an integration", "default role"]);
        assert_eq!(plan.executable.len(), 1);
    }

    #[test]
    fn actor_rank_is_enforced() {
        let ctx = PlanContext {
            actor: Principal::new("mod", Rank(15)),
            ..ctx()
        };
        let plan = Planner::default().plan(
            &ActionSpec::new(Criteria::NamePrefix("temp".into())),
            &ten_roles(),
            &HashSet::new(),
            &ctx,
        );
        assert_eq!(plan.executable.len(), 2);
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].reason, SkipReason::Guard(GuardDenied::System));

        let ctx = PlanContext {
            actor: Principal::new("mod", Rank(10)),
            ..ctx
        };
        let plan = Planner::default().plan(
            &ActionSpec::new(Criteria::BelowRank(Rank(12))),
            &ten_roles(),
            &HashSet::new(),
            &ctx,
        );
        assert_eq!(plan.matched.len(), 2);
        assert!(plan
            .skipped
            .iter()
            .all(|s| s.reason == SkipReason::Guard(GuardDenied::Actor)));
    }

    #[test]
    fn over_cap_plan_refuses_approval() {
        let roles: Vec<Role> = (0..5).map(|i| role(&i.to_string(), "temp", 10 + i)).collect();
        let plan = Planner::new(2).plan(
            &ActionSpec::new(Criteria::All),
            &roles,
            &HashSet::new(),
            &ctx(),
        );

        assert!(plan.is_over_cap());
        let summary = plan.summary();
        assert_eq!(summary.matched, 5);
        assert_eq!(summary.executable, 5);
        assert_eq!(plan.approve().unwrap_err(), OverCap { executable: 5, cap: 2 });
    }

    #[test]
    fn limit_applies_to_matches_in_collection_order() {
        let plan = Planner::default().plan(
            &ActionSpec::new(Criteria::All).with_limit(4),
            &ten_roles(),
            &HashSet::new(),
            &ctx(),
        );
        let ids: Vec<_> = plan.matched.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn old_messages_are_skipped_as_too_old() {
        let message = |id: &str, age_days: i64| Message {
            id: id.to_string(),
            channel_id: "c".to_string(),
            author_id: "u".to_string(),
            content: format!("hello {id}"),
            pinned: false,
            created_at: now() - Duration::days(age_days),
        };
        let ctx = PlanContext {
            max_age: Some(Duration::days(14)),
            ..ctx()
        };
        let plan = Planner::default().plan(
            &ActionSpec::new(Criteria::All),
            &[message("a", 1), message("b", 20), message("c", 3)],
            &HashSet::new(),
            &ctx,
        );
        assert_eq!(plan.executable.len(), 2);
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].reason.to_string(), "too old");
    }

    fn message_at(id: &str, created_at: DateTime<Utc>) -> Message {
        Message {
            id: id.to_string(),
            channel_id: "c".to_string(),
            author_id: "u".to_string(),
            content: format!("hello {id}"),
            pinned: false,
            created_at,
        }
    }

    #[test]
    fn older_than_days_is_strict_at_the_boundary() {
        let criteria = Criteria::OlderThanDays(7);
        let exactly = message_at("a", now() - Duration::days(7));
        let just_over = message_at("b", now() - Duration::days(7) - Duration::seconds(1));
        assert!(!criteria.matches(&exactly, now()));
        assert!(criteria.matches(&just_over, now()));
    }

    #[test]
    fn older_than_days_beyond_the_calendar_matches_nothing() {
        let ancient = message_at("a", DateTime::<Utc>::MIN_UTC);
        assert!(!Criteria::OlderThanDays(u32::MAX).matches(&ancient, now()));

        let plan = Planner::default().plan(
            &ActionSpec::new(Criteria::OlderThanDays(u32::MAX)),
            &[ancient, message_at("b", now())],
            &HashSet::new(),
            &ctx(),
        );
        assert!(plan.matched.is_empty());
    }

    #[test]
    fn max_age_beyond_the_calendar_skips_nothing() {
        let ctx = PlanContext {
            max_age: Some(Duration::days(i64::from(u32::MAX))),
            ..ctx()
        };
        let plan = Planner::default().plan(
            &ActionSpec::new(Criteria::All),
            &[message_at("a", DateTime::<Utc>::MIN_UTC), message_at("b", now())],
            &HashSet::new(),
            &ctx,
        );
        assert_eq!(plan.executable.len(), 2);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn items_newer_than_as_of_are_not_considered() {
        let ctx = PlanContext {
            as_of: Some(now() - Duration::minutes(5)),
            ..ctx()
        };
        let plan = Planner::default().plan(
            &ActionSpec::new(Criteria::All).with_limit(2),
            &[
                message_at("new", now()),
                message_at("at", now() - Duration::minutes(5)),
                message_at("old", now() - Duration::hours(1)),
                message_at("older", now() - Duration::hours(2)),
            ],
            &HashSet::new(),
            &ctx,
        );
        let ids: Vec<_> = plan.matched.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["at", "old"]);
    }

    #[test]
    fn planning_is_deterministic() {
        let spec = ActionSpec::new(Criteria::NamePrefix("temp".into()));
        let a = Planner::default().plan(&spec, &ten_roles(), &HashSet::new(), &ctx());
        let b = Planner::default().plan(&spec, &ten_roles(), &HashSet::new(), &ctx());
        assert_eq!(a.executable, b.executable);
        assert_eq!(a.skipped, b.skipped);
    }
}
