//! Rank and hierarchy guards
//!
//! Decides whether an actor, and separately the bot identity acting on its
//! behalf, may affect a target. Both answers are plain values; a denial is an
//! expected outcome, not an error.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position in the privilege hierarchy. Higher outranks lower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rank(pub u32);

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Anyone or anything that holds a rank: a member, the bot, a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub rank: Rank,
    /// Owner-equivalent identities sit above the hierarchy.
    #[serde(default)]
    pub owner: bool,
}

impl Principal {
    pub fn new(id: impl Into<String>, rank: Rank) -> Self {
        Self {
            id: id.into(),
            rank,
            owner: false,
        }
    }

    pub fn owner(id: impl Into<String>, rank: Rank) -> Self {
        Self {
            id: id.into(),
            rank,
            owner: true,
        }
    }
}

/// Which half of the guard refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDenied {
    /// The human actor does not outrank the target
    Actor,
    /// The bot's own rank is insufficient, whatever the actor's rank
    System,
}

impl GuardDenied {
    pub fn reason(self) -> &'static str {
        match self {
            Self::Actor => "above your highest role",
            Self::System => "at or above my highest role",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allowed,
    Denied(GuardDenied),
}

impl GuardDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// May `actor` act on `target`?
///
/// An owner-equivalent target can only be affected by itself. Otherwise an
/// owner-equivalent actor always may, and anyone else must strictly outrank
/// the target.
pub fn can_actor_affect(actor: &Principal, target: &Principal) -> bool {
    if target.owner {
        return actor.id == target.id;
    }
    if actor.owner {
        return true;
    }
    actor.rank > target.rank
}

/// May the bot identity act on `target`? Same ordering rules as for actors.
pub fn can_system_affect(system: &Principal, target: &Principal) -> bool {
    can_actor_affect(system, target)
}

/// Evaluate both halves. The system check comes first: when the bot cannot
/// act, the actor's rank is irrelevant.
pub fn check(actor: &Principal, system: &Principal, target: &Principal) -> GuardDecision {
    if !can_system_affect(system, target) {
        return GuardDecision::Denied(GuardDenied::System);
    }
    if !can_actor_affect(actor, target) {
        return GuardDecision::Denied(GuardDenied::Actor);
    }
    GuardDecision::Allowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn member(id: &str, rank: u32) -> Principal {
        Principal::new(id, Rank(rank))
    }

    #[test]
    fn strictly_higher_rank_wins() {
        assert!(can_actor_affect(&member("a", 5), &member("t", 4)));
        assert!(!can_actor_affect(&member("a", 4), &member("t", 4)));
        assert!(!can_actor_affect(&member("a", 3), &member("t", 4)));
    }

    #[test]
    fn owner_actor_always_acts() {
        let owner = Principal::owner("o", Rank(0));
        assert!(can_actor_affect(&owner, &member("t", 99)));
    }

    #[test]
    fn owner_target_only_affected_by_itself() {
        let owner = Principal::owner("o", Rank(1));
        assert!(!can_actor_affect(&member("a", 100), &owner));
        assert!(can_actor_affect(&owner, &owner));
        let other_owner = Principal::owner("o2", Rank(100));
        assert!(!can_actor_affect(&other_owner, &owner));
    }

    #[test]
    fn system_rank_is_checked_independently() {
        let actor = Principal::owner("o", Rank(0));
        let system = member("bot", 3);
        let target = member("t", 5);
        assert_eq!(
            check(&actor, &system, &target),
            GuardDecision::Denied(GuardDenied::System)
        );
    }

    #[test]
    fn actor_denied_when_system_allowed() {
        let actor = member("a", 2);
        let system = member("bot", 10);
        let target = member("t", 5);
        assert_eq!(
            check(&actor, &system, &target),
            GuardDecision::Denied(GuardDenied::Actor)
        );
        assert!(check(&member("a", 6), &system, &target).is_allowed());
    }

    proptest! {
        #[test]
        fn prop_guard_is_stable(a in 0u32..50, t in 0u32..50, a_owner: bool, t_owner: bool) {
            let actor = Principal { id: "a".into(), rank: Rank(a), owner: a_owner };
            let target = Principal { id: "t".into(), rank: Rank(t), owner: t_owner };
            let first = can_actor_affect(&actor, &target);
            for _ in 0..3 {
                prop_assert_eq!(can_actor_affect(&actor, &target), first);
            }
        }

        #[test]
        fn prop_no_mutual_affect_between_non_owners(a in 0u32..50, t in 0u32..50) {
            let x = member("x", a);
            let y = member("y", t);
            prop_assert!(!(can_actor_affect(&x, &y) && can_actor_affect(&y, &x)));
        }
    }
}
