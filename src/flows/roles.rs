//! Role cleanup wizard
//!
//! mode (-> prefix or position modal) -> paginated preview with exclusions ->
//! confirm. State keys: `m` mode, `p` prefix, `n` position, `x` roles the
//! operator chose to keep (comma-joined ids), `pg` preview page, `t` preview
//! time on the confirm token.

use super::common::{
    build, plan_context, plan_summary, report, snapshot_of, stale, with_snapshot, Cancel,
};
use crate::adapter::Directory;
use crate::error::CollaboratorError;
use crate::execute::{ExecutionContext, Executor, Mutator};
use crate::guard::Rank;
use crate::pagination::{current_page, page_tokens, paginate, PAGE_KEY};
use crate::plan::{ActionPlan, ActionSpec, Criteria, Planner};
use crate::resource::Role;
use crate::router::{RouteError, RouterBuilder, StepHandler};
use crate::token::{Base, ControlKind, StepState, TokenError};
use crate::wizard::{
    too_much_state_view, ControlStyle, ModalView, Reply, SelectOption, Step, WizardView,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt::Write;
use std::sync::Arc;

pub(super) const NS: &str = "roles";

const MODE: &str = "m";
const PREFIX: &str = "p";
const POSITION: &str = "n";
const EXCLUDED: &str = "x";

/// Configuration document for this flow
pub(super) const CONFIG_KEY: &str = "role_cleanup";
/// Role ids in the config document that are never deleted
const ALWAYS_EXCLUDE: &str = "always_exclude";

const PREFIX_MAX_LEN: usize = 20;

pub(super) fn register(builder: &mut RouterBuilder) -> Result<(), RouteError> {
    builder
        .register(NS, ControlKind::Button, "start", Start { fresh: true })?
        .register(NS, ControlKind::Button, "home", Start { fresh: false })?
        .register(NS, ControlKind::Select, "mode", ModePicked)?
        .register(NS, ControlKind::Modal, "prefix", PrefixEntered)?
        .register_lazy(NS, ControlKind::Modal, "position", position_entered)?
        .register(NS, ControlKind::Button, "preview", Preview)?
        .register(NS, ControlKind::Select, "exclude", ExcludePicked)?
        .register(NS, ControlKind::Button, "confirm", Confirm)?
        .register(NS, ControlKind::Button, "cancel", Cancel)?
        .entry(NS, "start");
    Ok(())
}

fn button(action: &str) -> Base {
    Base::button(NS, action)
}

fn criteria_of(state: &StepState) -> Option<Criteria> {
    match state.get_str(MODE)? {
        "empty" => Some(Criteria::Empty),
        "prefix" => {
            let prefix = state.get_str(PREFIX)?.trim();
            (!prefix.is_empty()).then(|| Criteria::NamePrefix(prefix.to_string()))
        }
        "below" => {
            let position = u32::try_from(state.get_i64(POSITION)?).ok()?;
            Some(Criteria::BelowRank(Rank(position)))
        }
        _ => None,
    }
}

fn start_view(notice: Option<&str>) -> Result<WizardView, TokenError> {
    let mut content = String::from("Role cleanup. Which roles should be deleted?");
    if let Some(notice) = notice {
        content = format!("{notice}\n\n{content}");
    }
    let options = vec![
        SelectOption::new("Roles with no members", "empty"),
        SelectOption::new("Roles starting with...", "prefix")
            .describe("You will be asked for the text"),
        SelectOption::new("Roles below a position...", "below")
            .describe("You will be asked for the position"),
    ];
    WizardView::new(content)
        .select("Choose which roles", &Base::select(NS, "mode"), &StepState::new(), options, 1)?
        .button("Cancel", &button("cancel"), &StepState::new())
}

fn preview_view(
    state: &StepState,
    criteria: &Criteria,
    plan: &ActionPlan<Role>,
    page_size: usize,
    seen_at: DateTime<Utc>,
) -> Result<WizardView, TokenError> {
    let page = paginate(&plan.executable, page_size, current_page(state));
    let mut content = format!(
        "Role cleanup preview: roles {criteria}\n\n{}",
        plan_summary(plan, "Will delete")
    );
    if !page.items.is_empty() {
        let _ = write!(content, "\n\nPage {}/{}", page.page, page.page_count);
        for role in page.items {
            let _ = write!(content, "\n- {} (position {})", role.name, role.position);
        }
    }

    let preview = button("preview");
    let mut view = WizardView::new(content).page_controls(page_tokens(&preview, state, &page)?);
    if !page.items.is_empty() {
        let options = page
            .items
            .iter()
            .map(|r| SelectOption::new(r.name.clone(), r.id.clone()))
            .collect();
        view = view.select(
            "Keep some of these roles",
            &Base::select(NS, "exclude"),
            state,
            options,
            page.items.len(),
        )?;
    }
    if state.contains_key(EXCLUDED) {
        let mut cleared = state.clone();
        cleared.remove(EXCLUDED);
        cleared.remove(PAGE_KEY);
        view = view.button("Clear exclusions", &preview, &cleared)?;
    }
    if !plan.is_over_cap() && !plan.executable.is_empty() {
        let mut confirm = with_snapshot(state, seen_at);
        confirm.remove(PAGE_KEY);
        view = view.styled_button("Confirm", ControlStyle::Danger, &button("confirm"), &confirm)?;
    }
    view.back(&button("home"), state, &[])?
        .button("Cancel", &button("cancel"), &StepState::new())
}

async fn always_excluded(step: &Step<'_>) -> Result<HashSet<String>, CollaboratorError> {
    let doc = step.services.config_store.get(CONFIG_KEY).await?;
    Ok(doc
        .as_ref()
        .and_then(|doc| doc.get(ALWAYS_EXCLUDE))
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(|id| id.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default())
}

async fn plan_roles(
    step: &Step<'_>,
    criteria: &Criteria,
    state: &StepState,
    as_of: Option<DateTime<Utc>>,
) -> Result<ActionPlan<Role>, CollaboratorError> {
    let roles = step.services.directory.roles(&step.event.guild_id).await?;
    let mut exclusions = always_excluded(step).await?;
    exclusions.extend(state.get_ids(EXCLUDED));
    let ctx = plan_context(step, None, as_of).await?;
    Ok(Planner::new(step.services.config.action_cap).plan(
        &ActionSpec::new(criteria.clone()),
        &roles,
        &exclusions,
        &ctx,
    ))
}

async fn render_preview(step: &Step<'_>, state: &StepState) -> Result<Reply, CollaboratorError> {
    let Some(criteria) = criteria_of(state) else {
        return Ok(stale(NS));
    };
    let plan = plan_roles(step, &criteria, state, None).await?;
    let seen_at = step.now();
    let page_size = step.services.config.page_size;
    Ok(Reply::update(build(preview_view(
        state, &criteria, &plan, page_size, seen_at,
    ))))
}

struct Start {
    fresh: bool,
}

#[async_trait]
impl StepHandler for Start {
    async fn handle(&self, _step: Step<'_>) -> Result<Reply, CollaboratorError> {
        let view = build(start_view(None));
        Ok(if self.fresh {
            Reply::message(view)
        } else {
            Reply::update(view)
        })
    }
}

struct ModePicked;

#[async_trait]
impl StepHandler for ModePicked {
    async fn handle(&self, step: Step<'_>) -> Result<Reply, CollaboratorError> {
        let (action, mode, title, key, label, max_len) = match step.event.value() {
            Some("empty") => {
                let state = StepState::new().with(MODE, "empty");
                return render_preview(&step, &state).await;
            }
            Some("prefix") => (
                "prefix",
                "prefix",
                "Role prefix",
                PREFIX,
                "Role names starting with",
                PREFIX_MAX_LEN,
            ),
            Some("below") => (
                "position",
                "below",
                "Role position",
                POSITION,
                "Delete roles below position",
                5,
            ),
            _ => {
                return Ok(Reply::update(build(start_view(Some(
                    "Pick one of the listed options.",
                )))))
            }
        };
        let state = StepState::new().with(MODE, mode);
        Ok(match ModalView::new(title, &Base::modal(NS, action), &state) {
            Ok(modal) => Reply::modal(modal.field(key, label, max_len)),
            Err(e) => Reply::update(too_much_state_view(&e)),
        })
    }
}

struct PrefixEntered;

#[async_trait]
impl StepHandler for PrefixEntered {
    async fn handle(&self, step: Step<'_>) -> Result<Reply, CollaboratorError> {
        let prefix = step.state.get_str(PREFIX).map(str::trim).unwrap_or_default();
        if prefix.is_empty() {
            return Ok(Reply::update(build(start_view(Some(
                "The prefix cannot be empty.",
            )))));
        }
        let state = StepState::new().with(MODE, "prefix").with(PREFIX, prefix);
        render_preview(&step, &state).await
    }
}

fn position_entered() -> Arc<dyn StepHandler> {
    Arc::new(PositionEntered)
}

struct PositionEntered;

#[async_trait]
impl StepHandler for PositionEntered {
    async fn handle(&self, step: Step<'_>) -> Result<Reply, CollaboratorError> {
        let position = step
            .state
            .get_str(POSITION)
            .and_then(|raw| raw.trim().parse::<u32>().ok());
        let Some(position) = position else {
            return Ok(Reply::update(build(start_view(Some(
                "The position must be a whole number.",
            )))));
        };
        let state = StepState::new()
            .with(MODE, "below")
            .with(POSITION, i64::from(position));
        render_preview(&step, &state).await
    }
}

struct Preview;

#[async_trait]
impl StepHandler for Preview {
    async fn handle(&self, step: Step<'_>) -> Result<Reply, CollaboratorError> {
        render_preview(&step, &step.state).await
    }
}

/// Adds the picked roles to the exclusion list and re-renders the preview.
struct ExcludePicked;

#[async_trait]
impl StepHandler for ExcludePicked {
    async fn handle(&self, step: Step<'_>) -> Result<Reply, CollaboratorError> {
        let Some(criteria) = criteria_of(&step.state) else {
            return Ok(stale(NS));
        };
        let mut excluded = step.state.get_ids(EXCLUDED);
        for id in &step.event.values {
            if !id.is_empty() && !id.contains(',') && !excluded.contains(id) {
                excluded.push(id.clone());
            }
        }
        excluded.sort();
        let mut state = step.state.clone();
        state.insert_ids(EXCLUDED, &excluded);

        let plan = plan_roles(&step, &criteria, &state, None).await?;
        let seen_at = step.now();
        let page_size = step.services.config.page_size;
        let view = match preview_view(&state, &criteria, &plan, page_size, seen_at) {
            Ok(view) => view,
            Err(e) => too_much_state_view(&e)
                .back(&button("preview"), &step.state, &[MODE, PREFIX, POSITION, EXCLUDED])
                .unwrap_or_else(|_| too_much_state_view(&e)),
        };
        Ok(Reply::update(view))
    }
}

struct DeleteRoles<'a> {
    directory: &'a dyn Directory,
    guild_id: &'a str,
}

#[async_trait]
impl Mutator<Role> for DeleteRoles<'_> {
    async fn apply(&self, target: &Role) -> Result<(), CollaboratorError> {
        self.directory.delete_role(self.guild_id, target).await
    }
}

/// Re-plans against current roles created no later than the preview, deletes,
/// and records the run in the flow's configuration document.
struct Confirm;

#[async_trait]
impl StepHandler for Confirm {
    async fn handle(&self, step: Step<'_>) -> Result<Reply, CollaboratorError> {
        let (Some(criteria), Some(seen_at)) =
            (criteria_of(&step.state), snapshot_of(&step.state))
        else {
            return Ok(stale(NS));
        };
        step.acknowledge().await?;

        let plan = plan_roles(&step, &criteria, &step.state, Some(seen_at)).await?;
        let approved = match plan.approve() {
            Ok(approved) => approved,
            Err(over) => {
                tracing::info!(error = %over, actor = %step.event.actor.id, "Role cleanup refused");
                return Ok(Reply::update(WizardView::new(format!(
                    "Nothing was deleted: {over}."
                ))));
            }
        };

        let reason = format!("role cleanup: roles {criteria}");
        let ctx = ExecutionContext {
            actor: &step.event.actor,
            action: "delete_role",
            reason: &reason,
        };
        let mutator = DeleteRoles {
            directory: step.services.directory.as_ref(),
            guild_id: &step.event.guild_id,
        };
        let result = Executor::new(step.services.config.failure_sample)
            .execute(&approved, &mutator, step.services.audit.as_ref(), &ctx)
            .await;

        let last_run = json!({
            "last_run": {
                "at": step.now().to_rfc3339(),
                "actor": step.event.actor.id,
                "criteria": criteria.to_string(),
                "deleted": result.succeeded,
                "failed": result.failed,
            }
        });
        if let Err(e) = step.services.config_store.save(CONFIG_KEY, last_run).await {
            tracing::warn!(error = %e, "Could not record role cleanup run");
        }

        Ok(Reply::update(WizardView::new(report("roles", "Deleted", &result))))
    }
}
