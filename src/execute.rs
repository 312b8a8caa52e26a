//! Applying an approved bulk-action plan
//!
//! Items run one at a time in plan order. A failing item is recorded and the
//! run moves on; the report is the retry boundary, nothing is retried here.

use crate::adapter::{AuditEntry, AuditLog, AuditOutcome};
use crate::error::CollaboratorError;
use crate::guard::Principal;
use crate::plan::{ApprovedPlan, PlanTarget};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

/// Default number of failure reasons kept in a report
pub const DEFAULT_FAILURE_SAMPLE: usize = 5;

/// The mutation a bulk action performs on each item
#[async_trait]
pub trait Mutator<T>: Send + Sync {
    async fn apply(&self, target: &T) -> Result<(), CollaboratorError>;
}

/// Who is acting and what is being done, for the audit trail
#[derive(Debug, Clone)]
pub struct ExecutionContext<'a> {
    pub actor: &'a Principal,
    /// Short verb, e.g. `delete_role`
    pub action: &'a str,
    /// Why, as the operator described it
    pub reason: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub id: String,
    pub label: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    pub id: String,
    pub label: String,
    pub reason: &'static str,
}

/// Outcome of one run: counts plus a bounded sample of failures
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub succeeded: usize,
    pub failed: usize,
    /// First failures, at most the executor's sample size
    pub failures: Vec<ItemFailure>,
    pub skipped: Vec<SkippedItem>,
}

impl ExecutionResult {
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Executor {
    failure_sample: usize,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_SAMPLE)
    }
}

impl Executor {
    pub fn new(failure_sample: usize) -> Self {
        Self { failure_sample }
    }

    pub async fn execute<T, M>(
        &self,
        plan: &ApprovedPlan<T>,
        mutator: &M,
        audit: &dyn AuditLog,
        ctx: &ExecutionContext<'_>,
    ) -> ExecutionResult
    where
        T: PlanTarget + Sync,
        M: Mutator<T> + ?Sized,
    {
        let mut result = ExecutionResult {
            skipped: plan
                .skipped()
                .iter()
                .map(|s| SkippedItem {
                    id: s.target.id().to_string(),
                    label: s.target.label().to_string(),
                    reason: s.reason.as_str(),
                })
                .collect(),
            ..ExecutionResult::default()
        };

        for item in plan.items() {
            let outcome = mutator.apply(item).await;
            let error = match &outcome {
                Ok(()) => {
                    result.succeeded += 1;
                    None
                }
                Err(e) => {
                    tracing::warn!(
                        action = ctx.action,
                        resource = item.id(),
                        error = %e,
                        "Bulk action item failed"
                    );
                    result.failed += 1;
                    if result.failures.len() < self.failure_sample {
                        result.failures.push(ItemFailure {
                            id: item.id().to_string(),
                            label: item.label().to_string(),
                            error: e.to_string(),
                        });
                    }
                    Some(e.to_string())
                }
            };

            let entry = AuditEntry {
                id: uuid::Uuid::new_v4().to_string(),
                at: Utc::now(),
                actor_id: ctx.actor.id.clone(),
                action: ctx.action.to_string(),
                target_id: item.id().to_string(),
                target_label: item.label().to_string(),
                reason: ctx.reason.to_string(),
                outcome: if outcome.is_ok() {
                    AuditOutcome::Succeeded
                } else {
                    AuditOutcome::Failed
                },
                error,
            };
            if let Err(e) = audit.append(entry).await {
                tracing::warn!(resource = item.id(), error = %e, "Audit append failed");
            }
        }

        tracing::info!(
            action = ctx.action,
            actor = %ctx.actor.id,
            succeeded = result.succeeded,
            failed = result.failed,
            skipped = result.skipped.len(),
            "Bulk action finished"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::memory::MemoryAuditLog;
    use crate::guard::Rank;
    use crate::plan::{ActionSpec, Criteria, PlanContext, Planner};
    use crate::resource::Role;
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct FailOn {
        ids: HashSet<String>,
        attempted: Mutex<Vec<String>>,
    }

    impl FailOn {
        fn new(ids: &[&str]) -> Self {
            Self {
                ids: ids.iter().map(|s| (*s).to_string()).collect(),
                attempted: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Mutator<Role> for FailOn {
        async fn apply(&self, target: &Role) -> Result<(), CollaboratorError> {
            self.attempted.lock().unwrap().push(target.id.clone());
            if self.ids.contains(&target.id) {
                return Err(CollaboratorError::permission(format!("cannot touch {}", target.id)));
            }
            Ok(())
        }
    }

    fn roles(n: u32) -> Vec<Role> {
        (1..=n)
            .map(|i| Role {
                id: i.to_string(),
                name: format!("temp-{i}"),
                position: i,
                member_count: 0,
                managed: false,
                everyone: false,
                created_at: Utc::now(),
            })
            .collect()
    }

    fn approved(roles: &[Role]) -> ApprovedPlan<Role> {
        let ctx = PlanContext {
            actor: Principal::owner("owner", Rank(1000)),
            system: Principal::new("bot", Rank(500)),
            now: Utc::now(),
            max_age: None,
            as_of: None,
        };
        Planner::default()
            .plan(&ActionSpec::new(Criteria::All), roles, &HashSet::new(), &ctx)
            .approve()
            .unwrap()
    }

    fn ctx(actor: &Principal) -> ExecutionContext<'_> {
        ExecutionContext {
            actor,
            action: "delete_role",
            reason: "cleanup",
        }
    }

    #[tokio::test]
    async fn failing_item_does_not_stop_the_rest() {
        let plan = approved(&roles(3));
        let mutator = FailOn::new(&["2"]);
        let audit = MemoryAuditLog::default();
        let actor = Principal::owner("owner", Rank(1000));

        let result = Executor::default()
            .execute(&plan, &mutator, &audit, &ctx(&actor))
            .await;

        assert_eq!(*mutator.attempted.lock().unwrap(), vec!["1", "2", "3"]);
        assert_eq!(result.succeeded, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.attempted(), 3);
        assert_eq!(result.failures[0].id, "2");
        assert!(result.failures[0].error.contains("cannot touch 2"));
    }

    #[tokio::test]
    async fn every_attempt_is_audited() {
        let plan = approved(&roles(3));
        let audit = MemoryAuditLog::default();
        let actor = Principal::owner("owner", Rank(1000));

        Executor::default()
            .execute(&plan, &FailOn::new(&["3"]), &audit, &ctx(&actor))
            .await;

        let entries = audit.entries();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.actor_id == "owner" && e.reason == "cleanup"));
        assert_eq!(entries[2].outcome, AuditOutcome::Failed);
        assert_eq!(entries[0].outcome, AuditOutcome::Succeeded);
        assert!(entries[2].error.is_some());
    }

    #[tokio::test]
    async fn failure_sample_is_bounded() {
        let roles = roles(10);
        let plan = approved(&roles);
        let all: Vec<String> = roles.iter().map(|r| r.id.clone()).collect();
        let all: Vec<&str> = all.iter().map(String::as_str).collect();
        let actor = Principal::owner("owner", Rank(1000));

        let result = Executor::new(3)
            .execute(&plan, &FailOn::new(&all), &MemoryAuditLog::default(), &ctx(&actor))
            .await;

        assert_eq!(result.failed, 10);
        assert_eq!(result.failures.len(), 3);
        assert_eq!(result.succeeded, 0);
    }
}
