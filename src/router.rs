//! Route table and event dispatch
//!
//! Routes are registered once at startup through [`RouterBuilder`]; the built
//! [`Router`] is immutable and shared by reference across event tasks.

mod event;

pub use event::InteractionEvent;

use crate::adapter::Services;
use crate::error::{CollaboratorError, ErrorKind};
use crate::token::{decode, split_address, Base, ControlKind};
use crate::wizard::{expired_view, failure_view, Reply, Step};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// A wizard step bound to one route
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn handle(&self, step: Step<'_>) -> Result<Reply, CollaboratorError>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("route segment {0:?} is empty or contains ':' or '|'")]
    InvalidSegment(String),
    #[error("route {0} registered twice")]
    Duplicate(String),
}

enum Slot {
    Ready(Arc<dyn StepHandler>),
    /// Cold branches build their handler on first use
    Lazy {
        init: fn() -> Arc<dyn StepHandler>,
        cell: OnceLock<Arc<dyn StepHandler>>,
    },
}

impl Slot {
    fn resolve(&self) -> &Arc<dyn StepHandler> {
        match self {
            Slot::Ready(handler) => handler,
            Slot::Lazy { init, cell } => cell.get_or_init(*init),
        }
    }
}

#[derive(Default)]
pub struct RouterBuilder {
    routes: HashMap<Base, Slot>,
    entries: HashMap<String, Base>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        namespace: &str,
        kind: ControlKind,
        action: &str,
        handler: impl StepHandler + 'static,
    ) -> Result<&mut Self, RouteError> {
        self.insert(namespace, kind, action, Slot::Ready(Arc::new(handler)))
    }

    pub fn register_lazy(
        &mut self,
        namespace: &str,
        kind: ControlKind,
        action: &str,
        init: fn() -> Arc<dyn StepHandler>,
    ) -> Result<&mut Self, RouteError> {
        self.insert(
            namespace,
            kind,
            action,
            Slot::Lazy {
                init,
                cell: OnceLock::new(),
            },
        )
    }

    /// Button route offered as "Restart" when a token of this namespace
    /// expires.
    pub fn entry(&mut self, namespace: &str, action: &str) -> &mut Self {
        self.entries
            .insert(namespace.to_string(), Base::button(namespace, action));
        self
    }

    pub fn build(self) -> Router {
        tracing::info!(routes = self.routes.len(), "Router built");
        Router {
            routes: self.routes,
            entries: self.entries,
        }
    }

    fn insert(
        &mut self,
        namespace: &str,
        kind: ControlKind,
        action: &str,
        slot: Slot,
    ) -> Result<&mut Self, RouteError> {
        for segment in [namespace, action] {
            if segment.is_empty() || segment.contains([':', '|']) {
                return Err(RouteError::InvalidSegment(segment.to_string()));
            }
        }
        let base = Base::new(namespace, kind, action);
        if self.routes.contains_key(&base) {
            return Err(RouteError::Duplicate(base.to_string()));
        }
        self.routes.insert(base, slot);
        Ok(self)
    }
}

/// What happened to one inbound event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handler ran and its reply was delivered
    Rendered,
    /// No route for the address; nothing was sent
    Unrouted,
    /// Token could not be decoded; the expired view was sent
    Expired,
    /// A collaborator failed; the generic failure view was sent if possible
    Failed(ErrorKind),
}

pub struct Router {
    routes: HashMap<Base, Slot>,
    entries: HashMap<String, Base>,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn contains(&self, base: &Base) -> bool {
        self.routes.contains_key(base)
    }

    pub fn entry_for(&self, namespace: &str) -> Option<&Base> {
        self.entries.get(namespace)
    }

    /// Route one event to its handler and deliver the reply.
    ///
    /// Never fails: decode and collaborator errors are turned into views here
    /// and reported through the returned outcome.
    pub async fn dispatch(&self, event: &InteractionEvent, services: &Services) -> DispatchOutcome {
        // The address is resolved before any state is decoded.
        let (address, _) = split_address(&event.control_id);
        let base = match Base::parse(address) {
            Ok(base) => base,
            Err(e) => {
                tracing::info!(error = %e, interaction = %event.interaction_id, "Unparseable control address");
                self.send_expired(event, services, None).await;
                return DispatchOutcome::Expired;
            }
        };

        let Some(slot) = self.routes.get(&base) else {
            tracing::warn!(route = %base, "No handler registered for control; ignoring");
            return DispatchOutcome::Unrouted;
        };

        let mut state = match decode(&event.control_id) {
            Ok(token) => token.state,
            Err(e) => {
                tracing::info!(route = %base, error = %e, "Expired or garbled token");
                self.send_expired(event, services, self.entry_for(&base.namespace))
                    .await;
                return DispatchOutcome::Expired;
            }
        };
        if base.kind == ControlKind::Modal {
            state.merge_fields(&event.fields);
        }

        tracing::debug!(route = %base, actor = %event.actor.id, "Dispatching step");
        let acknowledged = AtomicBool::new(false);
        let step = Step::new(event, &base, state, services, &acknowledged);
        let result = slot.resolve().handle(step).await;
        let acknowledged = acknowledged.load(Ordering::Acquire);

        let outcome = match result {
            Ok(reply) => deliver(event, services, &reply, acknowledged).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(()) => DispatchOutcome::Rendered,
            Err(e) if e.kind.is_terminal() => {
                tracing::warn!(route = %base, error = %e, "Response window lapsed; step abandoned");
                DispatchOutcome::Failed(e.kind)
            }
            Err(e) => {
                tracing::error!(route = %base, error = %e, kind = e.kind.as_str(), "Step failed");
                let reply = Reply::message(failure_view());
                if let Err(e) = deliver(event, services, &reply, acknowledged).await {
                    tracing::error!(error = %e, "Could not deliver failure notice");
                }
                DispatchOutcome::Failed(e.kind)
            }
        }
    }

    async fn send_expired(&self, event: &InteractionEvent, services: &Services, restart: Option<&Base>) {
        let reply = Reply::message(expired_view(restart));
        if let Err(e) = services.responder.respond(&event.interaction_id, &reply).await {
            tracing::error!(error = %e, "Could not deliver expired notice");
        }
    }
}

/// After an acknowledgement the only way to show output is editing the
/// acknowledged response.
async fn deliver(
    event: &InteractionEvent,
    services: &Services,
    reply: &Reply,
    acknowledged: bool,
) -> Result<(), CollaboratorError> {
    if !acknowledged {
        return services.responder.respond(&event.interaction_id, reply).await;
    }
    match reply.view() {
        Some(view) => {
            services
                .responder
                .edit_response(&event.interaction_id, view)
                .await
        }
        None => Err(CollaboratorError::unknown(
            "a modal cannot be opened after acknowledging",
        )),
    }
}
