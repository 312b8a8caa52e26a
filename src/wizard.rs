//! Wizard step model
//!
//! A step handler receives the clicking event and the state decoded from the
//! clicked control, and answers with a [`Reply`]. Nothing survives between
//! steps except what the rendered controls carry in their tokens.

mod view;

pub use view::{Control, ControlStyle, ModalField, ModalView, SelectOption, WizardView, MAX_SELECT_OPTIONS};

use crate::adapter::Services;
use crate::error::CollaboratorError;
use crate::router::InteractionEvent;
use crate::token::{Base, StepState, TokenError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

/// How a step's output reaches the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    /// New response
    Message { view: WizardView },
    /// Edit of the response the clicked control belongs to
    Update { view: WizardView },
    /// Open a modal sub-step
    Modal { modal: ModalView },
}

impl Reply {
    pub fn message(view: WizardView) -> Self {
        Self::Message { view }
    }

    pub fn update(view: WizardView) -> Self {
        Self::Update { view }
    }

    pub fn modal(modal: ModalView) -> Self {
        Self::Modal { modal }
    }

    pub fn view(&self) -> Option<&WizardView> {
        match self {
            Self::Message { view } | Self::Update { view } => Some(view),
            Self::Modal { .. } => None,
        }
    }
}

/// Everything a handler gets for one activation
pub struct Step<'a> {
    pub event: &'a InteractionEvent,
    pub base: &'a Base,
    pub state: StepState,
    pub services: &'a Services,
    acknowledged: &'a AtomicBool,
}

impl<'a> Step<'a> {
    pub(crate) fn new(
        event: &'a InteractionEvent,
        base: &'a Base,
        state: StepState,
        services: &'a Services,
        acknowledged: &'a AtomicBool,
    ) -> Self {
        Self {
            event,
            base,
            state,
            services,
            acknowledged,
        }
    }

    /// Send the immediate acknowledgement before calling a slow collaborator.
    /// The reply is then delivered as an edit of the acknowledged response.
    pub async fn acknowledge(&self) -> Result<(), CollaboratorError> {
        if self.acknowledged.load(Ordering::Acquire) {
            return Ok(());
        }
        self.services
            .responder
            .acknowledge(&self.event.interaction_id)
            .await?;
        self.acknowledged.store(true, Ordering::Release);
        Ok(())
    }

    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Shown when a token cannot be decoded. Offers a restart when the flow's
/// entry point is known.
pub fn expired_view(restart: Option<&Base>) -> WizardView {
    let view = WizardView::new("This menu has expired. Please start again.");
    match restart {
        Some(entry) => view
            .styled_button("Restart", ControlStyle::Primary, entry, &StepState::new())
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, route = %entry, "Restart control could not be encoded");
                WizardView::new("This menu has expired. Please start again.")
            }),
        None => view,
    }
}

/// Generic reply for collaborator failures
pub fn failure_view() -> WizardView {
    WizardView::new("Something went wrong talking to the platform. Please try again later.")
}

/// Shown when a step would need more state than a token can carry
pub fn too_much_state_view(err: &TokenError) -> WizardView {
    tracing::info!(error = %err, "Step state exceeds token budget");
    WizardView::new("That selection is too large to carry forward. Please pick fewer items.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::decode;

    #[test]
    fn expired_view_offers_restart_when_entry_known() {
        let entry = Base::button("purge", "start");
        let view = expired_view(Some(&entry));
        let restart = view.control("Restart").unwrap();
        assert_eq!(decode(&restart.token).unwrap().base, entry);

        assert!(expired_view(None).controls.is_empty());
    }
}
