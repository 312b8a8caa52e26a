//! Message purge wizard
//!
//! filter (-> prefix modal) -> amount -> channel -> preview -> confirm.
//! State keys: `f` filter, `p` prefix, `a` amount, `c` channel, `t` preview
//! time on the confirm token.

use super::common::{
    build, plan_context, plan_summary, report, snapshot_of, stale, with_snapshot, Cancel,
};
use crate::adapter::Directory;
use crate::error::CollaboratorError;
use crate::execute::{ExecutionContext, Executor, Mutator};
use crate::plan::{ActionPlan, ActionSpec, Criteria, Planner};
use crate::resource::{Channel, Message};
use crate::router::{RouteError, RouterBuilder, StepHandler};
use crate::token::{Base, ControlKind, StepState, TokenError};
use crate::wizard::{
    too_much_state_view, ControlStyle, ModalView, Reply, SelectOption, Step, WizardView,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

pub(super) const NS: &str = "purge";

const FILTER: &str = "f";
const PREFIX: &str = "p";
const AMOUNT: &str = "a";
const CHANNEL: &str = "c";
/// Channel value meaning "where the wizard was opened"
const HERE: &str = "here";

const AMOUNTS: [i64; 4] = [10, 25, 50, 100];
const PREFIX_MAX_LEN: usize = 20;

pub(super) fn register(builder: &mut RouterBuilder) -> Result<(), RouteError> {
    builder
        .register(NS, ControlKind::Button, "start", Start { fresh: true })?
        .register(NS, ControlKind::Button, "home", Start { fresh: false })?
        .register(NS, ControlKind::Select, "filter", FilterPicked)?
        .register(NS, ControlKind::Modal, "prefix", PrefixEntered)?
        .register(NS, ControlKind::Button, "filter", ShowAmounts)?
        .register(NS, ControlKind::Button, "amount", ShowChannels)?
        .register(NS, ControlKind::Select, "channel", ChannelPicked)?
        .register(NS, ControlKind::Button, "preview", Preview)?
        .register(NS, ControlKind::Button, "confirm", Confirm)?
        .register(NS, ControlKind::Button, "cancel", Cancel)?
        .entry(NS, "start");
    Ok(())
}

fn button(action: &str) -> Base {
    Base::button(NS, action)
}

fn filter_of(state: &StepState) -> Option<Criteria> {
    match state.get_str(FILTER)? {
        "all" => Some(Criteria::All),
        "empty" => Some(Criteria::Empty),
        "prefix" => {
            let prefix = state.get_str(PREFIX)?.trim();
            (!prefix.is_empty()).then(|| Criteria::NamePrefix(prefix.to_string()))
        }
        _ => None,
    }
}

fn spec_of(state: &StepState) -> Option<ActionSpec> {
    let amount = usize::try_from(state.get_i64(AMOUNT)?)
        .ok()
        .filter(|a| *a > 0)?;
    Some(ActionSpec::new(filter_of(state)?).with_limit(amount))
}

fn channel_of(step: &Step<'_>, state: &StepState) -> Option<String> {
    match state.get_id(CHANNEL)? {
        id if id == HERE => Some(step.event.channel_id.clone()),
        id => Some(id),
    }
}

fn start_view(notice: Option<&str>) -> Result<WizardView, TokenError> {
    let mut content = String::from("Purge messages. Which messages should be removed?");
    if let Some(notice) = notice {
        content = format!("{notice}\n\n{content}");
    }
    let options = vec![
        SelectOption::new("All messages", "all"),
        SelectOption::new("Messages without text", "empty").describe("Attachments and embeds only"),
        SelectOption::new("Messages starting with...", "prefix")
            .describe("You will be asked for the text"),
    ];
    WizardView::new(content)
        .select("Choose a filter", &Base::select(NS, "filter"), &StepState::new(), options, 1)?
        .button("Cancel", &button("cancel"), &StepState::new())
}

fn amount_view(state: &StepState, filter: &Criteria) -> Result<WizardView, TokenError> {
    let state = state.project(&[FILTER, PREFIX]);
    let mut view = WizardView::new(format!(
        "Purging messages matching: {filter}.\nDelete at most how many matching messages?"
    ));
    for amount in AMOUNTS {
        view = view.button(
            amount.to_string(),
            &button("amount"),
            &state.clone().with(AMOUNT, amount),
        )?;
    }
    view.back(&button("home"), &state, &[])?
        .button("Cancel", &button("cancel"), &StepState::new())
}

fn channel_view(
    state: &StepState,
    spec: &ActionSpec,
    channels: &[Channel],
) -> Result<WizardView, TokenError> {
    let state = state.project(&[FILTER, PREFIX, AMOUNT]);
    let mut view = WizardView::new(format!("Purging {spec}.\nIn which channel?"))
        .styled_button(
            "This channel",
            ControlStyle::Primary,
            &button("preview"),
            &state.clone().with(CHANNEL, HERE),
        )?;
    if !channels.is_empty() {
        let options = channels
            .iter()
            .map(|c| SelectOption::new(format!("#{}", c.name), c.id.clone()))
            .collect();
        view = view.select("Another channel", &Base::select(NS, "channel"), &state, options, 1)?;
    }
    view.back(&button("filter"), &state, &[FILTER, PREFIX])?
        .button("Cancel", &button("cancel"), &StepState::new())
}

fn preview_view(
    state: &StepState,
    spec: &ActionSpec,
    channel: &str,
    plan: &ActionPlan<Message>,
    seen_at: DateTime<Utc>,
) -> Result<WizardView, TokenError> {
    let mut view = WizardView::new(format!(
        "Purge preview: {spec} in <#{channel}>\n\n{}",
        plan_summary(plan, "Will delete")
    ));
    if !plan.is_over_cap() && !plan.executable.is_empty() {
        let confirm = with_snapshot(state, seen_at);
        view = view.styled_button("Confirm", ControlStyle::Danger, &button("confirm"), &confirm)?;
    }
    view.back(&button("amount"), state, &[FILTER, PREFIX, AMOUNT])?
        .button("Cancel", &button("cancel"), &StepState::new())
}

async fn plan_messages(
    step: &Step<'_>,
    spec: &ActionSpec,
    channel: &str,
    as_of: Option<DateTime<Utc>>,
) -> Result<ActionPlan<Message>, CollaboratorError> {
    let config = &step.services.config;
    let fetch = config.fetch_limit.max(spec.limit.unwrap_or(0));
    let messages = step
        .services
        .directory
        .recent_messages(channel, fetch)
        .await?;
    let ctx = plan_context(step, Some(config.message_max_age()), as_of).await?;
    Ok(Planner::new(config.action_cap).plan(spec, &messages, &HashSet::new(), &ctx))
}

async fn render_preview(step: &Step<'_>, state: &StepState) -> Result<Reply, CollaboratorError> {
    let (Some(spec), Some(channel)) = (spec_of(state), channel_of(step, state)) else {
        return Ok(stale(NS));
    };
    let plan = plan_messages(step, &spec, &channel, None).await?;
    let seen_at = step.now();
    Ok(Reply::update(build(preview_view(
        state, &spec, &channel, &plan, seen_at,
    ))))
}

struct Start {
    /// Opened from a command rather than from a control on an earlier step
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

struct FilterPicked;

#[async_trait]
impl StepHandler for FilterPicked {
    async fn handle(&self, step: Step<'_>) -> Result<Reply, CollaboratorError> {
        let reply = match step.event.value() {
            Some("prefix") => {
                let state = StepState::new().with(FILTER, "prefix");
                match ModalView::new("Message prefix", &Base::modal(NS, "prefix"), &state) {
                    Ok(modal) => {
                        Reply::modal(modal.field(PREFIX, "Messages starting with", PREFIX_MAX_LEN))
                    }
                    Err(e) => Reply::update(too_much_state_view(&e)),
                }
            }
            Some(filter @ ("all" | "empty")) => {
                let state = StepState::new().with(FILTER, filter);
                let criteria = filter_of(&state).unwrap_or(Criteria::All);
                Reply::update(build(amount_view(&state, &criteria)))
            }
            _ => Reply::update(build(start_view(Some("Pick one of the listed filters.")))),
        };
        Ok(reply)
    }
}

struct PrefixEntered;

#[async_trait]
impl StepHandler for PrefixEntered {
    async fn handle(&self, step: Step<'_>) -> Result<Reply, CollaboratorError> {
        let mut state = step.state.clone();
        let prefix = state.get_str(PREFIX).map(str::trim).unwrap_or_default().to_string();
        if prefix.is_empty() {
            return Ok(Reply::update(build(start_view(Some(
                "The prefix cannot be empty.",
            )))));
        }
        state.insert(PREFIX, prefix.clone());
        state.insert(FILTER, "prefix");
        Ok(Reply::update(build(amount_view(
            &state,
            &Criteria::NamePrefix(prefix),
        ))))
    }
}

struct ShowAmounts;

#[async_trait]
impl StepHandler for ShowAmounts {
    async fn handle(&self, step: Step<'_>) -> Result<Reply, CollaboratorError> {
        let Some(filter) = filter_of(&step.state) else {
            return Ok(stale(NS));
        };
        Ok(Reply::update(build(amount_view(&step.state, &filter))))
    }
}

struct ShowChannels;

#[async_trait]
impl StepHandler for ShowChannels {
    async fn handle(&self, step: Step<'_>) -> Result<Reply, CollaboratorError> {
        let Some(spec) = spec_of(&step.state) else {
            return Ok(stale(NS));
        };
        let channels = step
            .services
            .directory
            .channels(&step.event.guild_id)
            .await?;
        Ok(Reply::update(build(channel_view(&step.state, &spec, &channels))))
    }
}

struct ChannelPicked;

#[async_trait]
impl StepHandler for ChannelPicked {
    async fn handle(&self, step: Step<'_>) -> Result<Reply, CollaboratorError> {
        let Some(channel) = step.event.value() else {
            return Ok(stale(NS));
        };
        let mut state = step.state.clone();
        state.insert_id(CHANNEL, channel);
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

struct DeleteMessages<'a>(&'a dyn Directory);

#[async_trait]
impl Mutator<Message> for DeleteMessages<'_> {
    async fn apply(&self, target: &Message) -> Result<(), CollaboratorError> {
        self.0.delete_message(target).await
    }
}

/// Re-plans against current data, limited to messages that existed at
/// preview time, then deletes. Acknowledges first since the run can outlast
/// the reply window.
struct Confirm;

#[async_trait]
impl StepHandler for Confirm {
    async fn handle(&self, step: Step<'_>) -> Result<Reply, CollaboratorError> {
        let (Some(spec), Some(channel), Some(seen_at)) = (
            spec_of(&step.state),
            channel_of(&step, &step.state),
            snapshot_of(&step.state),
        ) else {
            return Ok(stale(NS));
        };
        step.acknowledge().await?;

        let plan = plan_messages(&step, &spec, &channel, Some(seen_at)).await?;
        let approved = match plan.approve() {
            Ok(approved) => approved,
            Err(over) => {
                tracing::info!(error = %over, actor = %step.event.actor.id, "Purge refused");
                return Ok(Reply::update(WizardView::new(format!(
                    "Nothing was deleted: {over}."
                ))));
            }
        };

        let reason = format!("purge {spec} in {channel}");
        let ctx = ExecutionContext {
            actor: &step.event.actor,
            action: "delete_message",
            reason: &reason,
        };
        let result = Executor::new(step.services.config.failure_sample)
            .execute(
                &approved,
                &DeleteMessages(step.services.directory.as_ref()),
                step.services.audit.as_ref(),
                &ctx,
            )
            .await;
        Ok(Reply::update(WizardView::new(report(
            "messages", "Deleted", &result,
        ))))
    }
}
