//! Collaborator interfaces
//!
//! Everything the engine talks to lives behind these traits: the platform
//! adapter (replies and resource access), configuration persistence, and the
//! audit log. Production adapters live outside this crate; `memory` holds
//! in-process implementations used by the console binary and the tests.

pub mod memory;

use crate::config::EngineConfig;
use crate::error::CollaboratorError;
use crate::guard::Principal;
use crate::resource::{Channel, Message, Role};
use crate::wizard::{Reply, WizardView};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Outbound half of the platform adapter
#[async_trait]
pub trait Responder: Send + Sync {
    /// Lightweight immediate acknowledgement; the real reply follows through
    /// [`Responder::edit_response`].
    async fn acknowledge(&self, interaction_id: &str) -> Result<(), CollaboratorError>;

    /// First and only direct reply to an interaction
    async fn respond(&self, interaction_id: &str, reply: &Reply) -> Result<(), CollaboratorError>;

    /// Edit the response previously sent or acknowledged for an interaction
    async fn edit_response(
        &self,
        interaction_id: &str,
        view: &WizardView,
    ) -> Result<(), CollaboratorError>;
}

/// Read and mutate platform resources
#[async_trait]
pub trait Directory: Send + Sync {
    /// The bot's own member identity in a guild
    async fn system_member(&self, guild_id: &str) -> Result<Principal, CollaboratorError>;

    async fn roles(&self, guild_id: &str) -> Result<Vec<Role>, CollaboratorError>;

    async fn channels(&self, guild_id: &str) -> Result<Vec<Channel>, CollaboratorError>;

    /// Newest first
    async fn recent_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, CollaboratorError>;

    async fn delete_message(&self, message: &Message) -> Result<(), CollaboratorError>;

    async fn delete_role(&self, guild_id: &str, role: &Role) -> Result<(), CollaboratorError>;
}

/// Long-lived configuration documents.
///
/// Eventually consistent, no transactions. `save` shallow-merges `patch`
/// into the stored object; concurrent read-modify-save cycles are
/// last-write-wins.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CollaboratorError>;

    async fn save(&self, key: &str, patch: Value) -> Result<(), CollaboratorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Succeeded,
    Failed,
}

/// One attempted mutation
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: String,
    pub at: DateTime<Utc>,
    pub actor_id: String,
    pub action: String,
    pub target_id: String,
    pub target_label: String,
    pub reason: String,
    pub outcome: AuditOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Append-only audit trail
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<(), CollaboratorError>;
}

/// Collaborators and settings handed to every step
#[derive(Clone)]
pub struct Services {
    pub responder: Arc<dyn Responder>,
    pub directory: Arc<dyn Directory>,
    pub config_store: Arc<dyn ConfigStore>,
    pub audit: Arc<dyn AuditLog>,
    pub config: EngineConfig,
}

impl Services {
    pub fn new(
        responder: Arc<dyn Responder>,
        directory: Arc<dyn Directory>,
        config_store: Arc<dyn ConfigStore>,
        audit: Arc<dyn AuditLog>,
        config: EngineConfig,
    ) -> Self {
        Self {
            responder,
            directory,
            config_store,
            audit,
            config,
        }
    }
}
