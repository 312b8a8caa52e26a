//! Inbound interaction events

use crate::guard::Principal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A control activation delivered by the platform adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionEvent {
    /// Platform handle used to reply to this activation
    pub interaction_id: String,
    /// The clicked control's token
    pub control_id: String,
    pub guild_id: String,
    pub channel_id: String,
    pub actor: Principal,
    /// Picked options, for select controls
    #[serde(default)]
    pub values: Vec<String>,
    /// Submitted text fields, for modals
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl InteractionEvent {
    pub fn new(
        interaction_id: impl Into<String>,
        control_id: impl Into<String>,
        guild_id: impl Into<String>,
        channel_id: impl Into<String>,
        actor: Principal,
    ) -> Self {
        Self {
            interaction_id: interaction_id.into(),
            control_id: control_id.into(),
            guild_id: guild_id.into(),
            channel_id: channel_id.into(),
            actor,
            values: Vec::new(),
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_values(mut self, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// First picked select value
    pub fn value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }
}
