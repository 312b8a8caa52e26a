//! Continuation tokens
//!
//! A token is the only memory a wizard has between steps: the route address of
//! the control that was clicked plus whatever state the next step needs, packed
//! into an opaque string the platform hands back verbatim.

mod codec;
mod state;

#[cfg(test)]
mod proptests;

pub use codec::{decode, encode, split_address, InvalidToken, TokenError, STRUCTURED_KEY, TOKEN_BUDGET};
pub use state::StepState;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of UI control a token is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    Button,
    Select,
    Modal,
}

impl ControlKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Button => "button",
            Self::Select => "select",
            Self::Modal => "modal",
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlKind {
    type Err = InvalidToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "button" => Ok(Self::Button),
            "select" => Ok(Self::Select),
            "modal" => Ok(Self::Modal),
            _ => Err(InvalidToken::new("unknown control kind")),
        }
    }
}

/// Route address: `namespace:kind:action`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Base {
    pub namespace: String,
    pub kind: ControlKind,
    pub action: String,
}

impl Base {
    pub fn new(namespace: impl Into<String>, kind: ControlKind, action: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kind,
            action: action.into(),
        }
    }

    pub fn button(namespace: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(namespace, ControlKind::Button, action)
    }

    pub fn select(namespace: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(namespace, ControlKind::Select, action)
    }

    pub fn modal(namespace: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(namespace, ControlKind::Modal, action)
    }

    /// Parse the address part of a token (everything before the first `|`).
    pub fn parse(raw: &str) -> Result<Self, InvalidToken> {
        let mut parts = raw.split(':');
        let (Some(namespace), Some(kind), Some(action), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(InvalidToken::new("address must have three segments"));
        };
        if namespace.is_empty() || action.is_empty() || namespace.contains('|') || action.contains('|')
        {
            return Err(InvalidToken::new("empty or malformed address segment"));
        }
        Ok(Self::new(namespace, kind.parse()?, action))
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.kind, self.action)
    }
}

/// A decoded token
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub base: Base,
    pub state: StepState,
}

impl Token {
    pub fn new(base: Base, state: StepState) -> Self {
        Self { base, state }
    }

    pub fn encode(&self) -> Result<String, TokenError> {
        encode(&self.base, &self.state)
    }
}
