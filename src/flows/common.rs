//! Pieces shared by the concrete flows

use crate::error::CollaboratorError;
use crate::execute::ExecutionResult;
use crate::plan::{ActionPlan, PlanContext};
use crate::router::StepHandler;
use crate::token::{Base, StepState, TokenError};
use crate::wizard::{expired_view, too_much_state_view, Reply, Step, WizardView};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::fmt::Write;

/// A render that ran out of token budget becomes a "pick fewer" notice.
pub(super) fn build(view: Result<WizardView, TokenError>) -> WizardView {
    view.unwrap_or_else(|e| too_much_state_view(&e))
}

/// Decodable state that no longer makes sense (missing or unknown fields).
pub(super) fn stale(namespace: &str) -> Reply {
    Reply::update(expired_view(Some(&Base::button(namespace, "start"))))
}

/// State key holding the preview time a confirmation is bound to
pub(super) const SNAPSHOT: &str = "t";

/// Record `now` as the snapshot, in unix milliseconds rounded up so every
/// item the preview saw was created at or before it.
pub(super) fn with_snapshot(state: &StepState, now: DateTime<Utc>) -> StepState {
    let partial = i64::from(now.timestamp_subsec_nanos() % 1_000_000 != 0);
    state.clone().with(SNAPSHOT, now.timestamp_millis() + partial)
}

pub(super) fn snapshot_of(state: &StepState) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(state.get_i64(SNAPSHOT)?)
}

pub(super) async fn plan_context(
    step: &Step<'_>,
    max_age: Option<Duration>,
    as_of: Option<DateTime<Utc>>,
) -> Result<PlanContext, CollaboratorError> {
    let system = step
        .services
        .directory
        .system_member(&step.event.guild_id)
        .await?;
    Ok(PlanContext {
        actor: step.event.actor.clone(),
        system,
        now: step.now(),
        max_age,
        as_of,
    })
}

fn count_by_reason<'a>(reasons: impl Iterator<Item = &'a str>) -> BTreeMap<&'a str, usize> {
    let mut counts = BTreeMap::new();
    for reason in reasons {
        *counts.entry(reason).or_insert(0) += 1;
    }
    counts
}

/// Count lines for a preview, with a per-reason breakdown of skips.
pub(super) fn plan_summary<T>(plan: &ActionPlan<T>, verb: &str) -> String {
    let summary = plan.summary();
    let mut text = format!(
        "Matched: {}\n{verb}: {}\nSkipped: {}",
        summary.matched, summary.executable, summary.skipped
    );
    if summary.excluded > 0 {
        let _ = write!(text, "\nExcluded: {}", summary.excluded);
    }
    for (reason, count) in count_by_reason(plan.skipped.iter().map(|s| s.reason.as_str())) {
        let _ = write!(text, "\n- {reason}: {count}");
    }
    if summary.over_cap {
        let _ = write!(
            text,
            "\n\nThis is more than the safety limit of {}. Narrow the criteria to continue.",
            plan.cap
        );
    } else if summary.executable == 0 {
        text.push_str("\n\nNothing to do.");
    }
    text
}

pub(super) fn report(noun: &str, verb_past: &str, result: &ExecutionResult) -> String {
    let mut text = format!(
        "{verb_past} {} {noun}. Failed: {}. Skipped: {}.",
        result.succeeded,
        result.failed,
        result.skipped.len()
    );
    for (reason, count) in count_by_reason(result.skipped.iter().map(|s| s.reason)) {
        let _ = write!(text, "\n- skipped, {reason}: {count}");
    }
    for failure in &result.failures {
        let _ = write!(text, "\n- failed {}: {}", failure.label, failure.error);
    }
    if result.failed > result.failures.len() {
        let _ = write!(
            text,
            "\n- and {} more failures",
            result.failed - result.failures.len()
        );
    }
    text
}

/// Ends a flow without touching anything.
pub(super) struct Cancel;

#[async_trait]
impl StepHandler for Cancel {
    async fn handle(&self, _step: Step<'_>) -> Result<Reply, CollaboratorError> {
        Ok(Reply::update(WizardView::new("Cancelled. Nothing was changed.")))
    }
}
