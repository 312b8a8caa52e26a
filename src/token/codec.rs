//! Token wire format
//!
//! ```text
//! token = base ["|" state]
//! base  = namespace ":" kind ":" action
//! state = pair *("|" pair)
//! pair  = key ":" value
//! ```
//!
//! Scalars that survive the flat form verbatim are written as `|key:value`
//! pairs. Anything else (lists, objects, booleans, strings that contain a
//! delimiter or look like integers) goes under the reserved `state` key as
//! standard base64 of the JSON object, which never contains `:` or `|`.

use super::{Base, StepState, Token};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::sync::LazyLock;
use thiserror::Error;

/// Hard platform limit on a control identifier, in bytes
pub const TOKEN_BUDGET: usize = 100;

/// Reserved key carrying base64 JSON state
pub const STRUCTURED_KEY: &str = "state";

static INTEGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(0|-?[1-9][0-9]*)$").expect("integer pattern compiles")
});

/// Why a token could not be produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("address segment {segment:?} is empty or contains ':' or '|'")]
    InvalidSegment { segment: String },
    #[error("token would be {len} bytes, budget is {TOKEN_BUDGET}")]
    TooLong { len: usize },
    #[error("state could not be serialized: {0}")]
    Serialize(String),
}

/// A token that could not be decoded (garbled, truncated or stale)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid token: {reason}")]
pub struct InvalidToken {
    pub reason: &'static str,
}

impl InvalidToken {
    pub(crate) fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// Split a raw token into its address and optional state part.
pub fn split_address(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once('|') {
        Some((address, state)) => (address, Some(state)),
        None => (raw, None),
    }
}

/// Encode `state` onto `base`, refusing anything over the budget.
pub fn encode(base: &Base, state: &StepState) -> Result<String, TokenError> {
    check_segment(&base.namespace)?;
    check_segment(&base.action)?;

    let mut out = base.to_string();
    if !state.is_empty() {
        if let Some(pairs) = flat_pairs(state) {
            out.push_str(&pairs);
        } else {
            let json = serde_json::to_vec(state.as_map())
                .map_err(|e| TokenError::Serialize(e.to_string()))?;
            out.push('|');
            out.push_str(STRUCTURED_KEY);
            out.push(':');
            out.push_str(&BASE64.encode(json));
        }
    }

    if out.len() > TOKEN_BUDGET {
        return Err(TokenError::TooLong { len: out.len() });
    }
    Ok(out)
}

/// Decode a raw control identifier.
pub fn decode(raw: &str) -> Result<Token, InvalidToken> {
    if raw.len() > TOKEN_BUDGET {
        return Err(InvalidToken::new("longer than the token budget"));
    }
    let (address, state) = split_address(raw);
    let base = Base::parse(address)?;
    let state = match state {
        Some(state) => decode_state(state)?,
        None => StepState::new(),
    };
    Ok(Token { base, state })
}

fn check_segment(segment: &str) -> Result<(), TokenError> {
    if segment.is_empty() || segment.contains([':', '|']) {
        return Err(TokenError::InvalidSegment {
            segment: segment.to_string(),
        });
    }
    Ok(())
}

/// `|k:v` pairs, or `None` when some entry would not decode back unchanged.
fn flat_pairs(state: &StepState) -> Option<String> {
    let mut out = String::new();
    for (key, value) in state.iter() {
        if key.is_empty() || key == STRUCTURED_KEY || key.contains([':', '|']) {
            return None;
        }
        let text = match value {
            Value::Number(n) => n.as_i64()?.to_string(),
            Value::String(s) if !s.contains([':', '|']) && !INTEGER.is_match(s) => s.clone(),
            _ => return None,
        };
        out.push('|');
        out.push_str(key);
        out.push(':');
        out.push_str(&text);
    }
    Some(out)
}

fn decode_state(raw: &str) -> Result<StepState, InvalidToken> {
    let mut map = Map::new();
    let mut structured = None;

    for pair in raw.split('|') {
        let (key, value) = pair
            .split_once(':')
            .ok_or(InvalidToken::new("state pair without ':'"))?;
        if key.is_empty() {
            return Err(InvalidToken::new("empty state key"));
        }
        if key == STRUCTURED_KEY {
            structured = Some(value);
            continue;
        }
        if map.insert(key.to_string(), flat_value(value)).is_some() {
            return Err(InvalidToken::new("duplicate state key"));
        }
    }

    match structured {
        None => Ok(StepState::from_map(map)),
        Some(_) if !map.is_empty() => Err(InvalidToken::new("structured state must stand alone")),
        Some(b64) => {
            let bytes = BASE64
                .decode(b64)
                .map_err(|_| InvalidToken::new("structured state is not base64"))?;
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Object(object)) => Ok(StepState::from_map(object)),
                Ok(_) => Err(InvalidToken::new("structured state is not an object")),
                Err(_) => Err(InvalidToken::new("structured state is not JSON")),
            }
        }
    }
}

fn flat_value(raw: &str) -> Value {
    if INTEGER.is_match(raw) {
        if let Ok(n) = raw.parse::<i64>() {
            return Value::Number(Number::from(n));
        }
    }
    Value::String(raw.to_string())
}
