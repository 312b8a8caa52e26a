//! In-process collaborators
//!
//! Backs the console binary and the tests: a guild held in memory, every
//! reply recorded per interaction, and switches for injecting failures.

use super::{AuditEntry, AuditLog, ConfigStore, Directory, Responder, Services};
use crate::config::EngineConfig;
use crate::error::CollaboratorError;
use crate::guard::{Principal, Rank};
use crate::resource::{Channel, Message, Role};
use crate::wizard::{Reply, WizardView};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Something the engine sent back for an interaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recorded {
    Acknowledged,
    Reply(Reply),
    Edit(WizardView),
}

impl Recorded {
    pub fn view(&self) -> Option<&WizardView> {
        match self {
            Recorded::Acknowledged => None,
            Recorded::Reply(reply) => reply.view(),
            Recorded::Edit(view) => Some(view),
        }
    }
}

/// A poisoned lock still holds usable state for a test double.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("could not read fixture: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse fixture: {0}")]
    Json(#[from] serde_json::Error),
}

/// Guild snapshot loaded by the console binary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuildFixture {
    pub guild_id: String,
    pub system: Option<Principal>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl GuildFixture {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Default)]
struct GuildState {
    system: HashMap<String, Principal>,
    roles: HashMap<String, Vec<Role>>,
    channels: HashMap<String, Vec<Channel>>,
    /// Oldest first, per channel
    messages: HashMap<String, Vec<Message>>,
    responses: HashMap<String, Vec<Recorded>>,
    failing_deletes: HashSet<String>,
    unavailable: bool,
}

/// Platform adapter double: responder and directory in one
#[derive(Clone, Default)]
pub struct MemoryPlatform {
    inner: Arc<Mutex<GuildState>>,
    config_store: Arc<MemoryConfigStore>,
    audit: Arc<MemoryAuditLog>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: GuildFixture) -> Self {
        let platform = Self::new();
        let guild = fixture.guild_id.clone();
        platform.set_system(
            &guild,
            fixture
                .system
                .unwrap_or_else(|| Principal::new("system", Rank(u32::MAX))),
        );
        platform.add_roles(&guild, fixture.roles);
        for channel in fixture.channels {
            platform.add_channel(&guild, channel);
        }
        for message in fixture.messages {
            platform.add_message(message);
        }
        platform
    }

    /// Wire this platform and its stores into a `Services` bundle.
    pub fn services(&self) -> Services {
        self.services_with(EngineConfig::default())
    }

    pub fn services_with(&self, config: EngineConfig) -> Services {
        Services::new(
            Arc::new(self.clone()),
            Arc::new(self.clone()),
            self.config_store.clone(),
            self.audit.clone(),
            config,
        )
    }

    pub fn config_store(&self) -> &MemoryConfigStore {
        &self.config_store
    }

    pub fn audit(&self) -> &MemoryAuditLog {
        &self.audit
    }

    pub fn set_system(&self, guild_id: &str, system: Principal) {
        let mut state = lock(&self.inner);
        state.system.insert(guild_id.to_string(), system);
    }

    pub fn add_roles(&self, guild_id: &str, roles: impl IntoIterator<Item = Role>) {
        let mut state = lock(&self.inner);
        state
            .roles
            .entry(guild_id.to_string())
            .or_default()
            .extend(roles);
    }

    pub fn add_channel(&self, guild_id: &str, channel: Channel) {
        let mut state = lock(&self.inner);
        state
            .channels
            .entry(guild_id.to_string())
            .or_default()
            .push(channel);
    }

    /// Append a message; later additions are newer.
    pub fn add_message(&self, message: Message) {
        let mut state = lock(&self.inner);
        state
            .messages
            .entry(message.channel_id.clone())
            .or_default()
            .push(message);
    }

    /// Deleting this id will fail with a permission error
    pub fn fail_delete(&self, id: &str) {
        let mut state = lock(&self.inner);
        state.failing_deletes.insert(id.to_string());
    }

    /// Every directory call fails with a network error while set
    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.inner).unavailable = unavailable;
    }

    pub fn message_count(&self, channel_id: &str) -> usize {
        let state = lock(&self.inner);
        state.messages.get(channel_id).map_or(0, Vec::len)
    }

    pub fn role_ids(&self, guild_id: &str) -> Vec<String> {
        let state = lock(&self.inner);
        state
            .roles
            .get(guild_id)
            .map(|roles| roles.iter().map(|r| r.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Drain what was sent for an interaction, in order.
    pub fn take_responses(&self, interaction_id: &str) -> Vec<Recorded> {
        let mut state = lock(&self.inner);
        state.responses.remove(interaction_id).unwrap_or_default()
    }

    fn record(&self, interaction_id: &str, recorded: Recorded) {
        let mut state = lock(&self.inner);
        state
            .responses
            .entry(interaction_id.to_string())
            .or_default()
            .push(recorded);
    }

    fn check_available(&self) -> Result<(), CollaboratorError> {
        if lock(&self.inner).unavailable {
            return Err(CollaboratorError::network("platform unavailable"));
        }
        Ok(())
    }

    fn check_delete(&self, id: &str) -> Result<(), CollaboratorError> {
        self.check_available()?;
        if lock(&self.inner).failing_deletes.contains(id) {
            return Err(CollaboratorError::permission(format!("missing access to {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Responder for MemoryPlatform {
    async fn acknowledge(&self, interaction_id: &str) -> Result<(), CollaboratorError> {
        self.record(interaction_id, Recorded::Acknowledged);
        Ok(())
    }

    async fn respond(&self, interaction_id: &str, reply: &Reply) -> Result<(), CollaboratorError> {
        self.record(interaction_id, Recorded::Reply(reply.clone()));
        Ok(())
    }

    async fn edit_response(
        &self,
        interaction_id: &str,
        view: &WizardView,
    ) -> Result<(), CollaboratorError> {
        self.record(interaction_id, Recorded::Edit(view.clone()));
        Ok(())
    }
}

#[async_trait]
impl Directory for MemoryPlatform {
    async fn system_member(&self, guild_id: &str) -> Result<Principal, CollaboratorError> {
        self.check_available()?;
        let state = lock(&self.inner);
        state
            .system
            .get(guild_id)
            .cloned()
            .ok_or_else(|| CollaboratorError::not_found(format!("guild {guild_id}")))
    }

    async fn roles(&self, guild_id: &str) -> Result<Vec<Role>, CollaboratorError> {
        self.check_available()?;
        let state = lock(&self.inner);
        let mut roles = state.roles.get(guild_id).cloned().unwrap_or_default();
        roles.sort_by(|a, b| b.position.cmp(&a.position).then_with(|| a.id.cmp(&b.id)));
        Ok(roles)
    }

    async fn channels(&self, guild_id: &str) -> Result<Vec<Channel>, CollaboratorError> {
        self.check_available()?;
        let state = lock(&self.inner);
        Ok(state.channels.get(guild_id).cloned().unwrap_or_default())
    }

    async fn recent_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, CollaboratorError> {
        self.check_available()?;
        let state = lock(&self.inner);
        Ok(state
            .messages
            .get(channel_id)
            .map(|messages| messages.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_message(&self, message: &Message) -> Result<(), CollaboratorError> {
        self.check_delete(&message.id)?;
        let mut state = lock(&self.inner);
        let messages = state.messages.entry(message.channel_id.clone()).or_default();
        let before = messages.len();
        messages.retain(|m| m.id != message.id);
        if messages.len() == before {
            return Err(CollaboratorError::not_found(format!("message {}", message.id)));
        }
        Ok(())
    }

    async fn delete_role(&self, guild_id: &str, role: &Role) -> Result<(), CollaboratorError> {
        self.check_delete(&role.id)?;
        let mut state = lock(&self.inner);
        let roles = state.roles.entry(guild_id.to_string()).or_default();
        let before = roles.len();
        roles.retain(|r| r.id != role.id);
        if roles.len() == before {
            return Err(CollaboratorError::not_found(format!("role {}", role.id)));
        }
        Ok(())
    }
}

/// Configuration documents held in a map; `save` shallow-merges objects.
#[derive(Default)]
pub struct MemoryConfigStore {
    docs: Mutex<HashMap<String, Value>>,
}

impl MemoryConfigStore {
    pub fn insert(&self, key: &str, doc: Value) {
        lock(&self.docs).insert(key.to_string(), doc);
    }

    pub fn snapshot(&self, key: &str) -> Option<Value> {
        lock(&self.docs).get(key).cloned()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, CollaboratorError> {
        Ok(self.snapshot(key))
    }

    async fn save(&self, key: &str, patch: Value) -> Result<(), CollaboratorError> {
        let mut docs = lock(&self.docs);
        let doc = docs
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        match (doc, patch) {
            (Value::Object(existing), Value::Object(patch)) => existing.extend(patch),
            (doc, patch) => *doc = patch,
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn entries(&self) -> Vec<AuditEntry> {
        lock(&self.entries).clone()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, entry: AuditEntry) -> Result<(), CollaboratorError> {
        tracing::debug!(
            actor = %entry.actor_id,
            resource = %entry.target_id,
            outcome = ?entry.outcome,
            "Audit entry"
        );
        lock(&self.entries).push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn poisoned_store_keeps_serving() {
        let store = Arc::new(MemoryConfigStore::default());
        let held = Arc::clone(&store);
        let joined = std::thread::spawn(move || {
            let _guard = held.docs.lock().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(joined.is_err());
        assert!(store.docs.is_poisoned());

        store.insert("k", json!({"a": 1}));
        assert_eq!(store.snapshot("k"), Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn save_merges_shallowly_last_write_wins() {
        let store = MemoryConfigStore::default();
        store.save("k", json!({"a": 1, "b": 1})).await.unwrap();
        store.save("k", json!({"b": 2})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"a": 1, "b": 2})));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn fixture_loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "guild_id": "g1",
                "system": {{"id": "bot", "rank": 40}},
                "roles": [{{"id": "r1", "name": "temp", "position": 3,
                           "created_at": "2026-01-01T00:00:00Z"}}],
                "channels": [{{"id": "c1", "name": "general"}}],
                "messages": [{{"id": "m1", "channel_id": "c1", "author_id": "u",
                              "content": "hi", "created_at": "2026-01-01T00:00:00Z"}}]
            }}"#
        )
        .unwrap();

        let platform = MemoryPlatform::from_fixture(GuildFixture::load(file.path()).unwrap());

        assert_eq!(platform.system_member("g1").await.unwrap().rank, Rank(40));
        assert_eq!(platform.role_ids("g1"), vec!["r1".to_string()]);
        assert_eq!(platform.message_count("c1"), 1);
    }

    #[tokio::test]
    async fn recent_messages_are_newest_first() {
        let platform = MemoryPlatform::new();
        for id in ["m1", "m2", "m3"] {
            platform.add_message(Message {
                id: id.into(),
                channel_id: "c".into(),
                author_id: "u".into(),
                content: id.into(),
                pinned: false,
                created_at: chrono::Utc::now(),
            });
        }
        let ids: Vec<_> = platform
            .recent_messages("c", 2)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["m3", "m2"]);
    }
}
