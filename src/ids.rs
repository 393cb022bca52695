// src/ids.rs
//! Identifier types and the boundary validator for numeric keys.
//!
//! Poll, item and vote keys are store-assigned `bigint`s. Path segments and
//! JSON payloads carry them as decimal strings (or, in payloads, JSON
//! numbers), so every entry point goes through [`parse_numeric`] or
//! [`numeric_from_json`] before a key reaches the store.
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("identifier must be a non-negative integer")]
pub struct InvalidId;

/// Accepts exactly `^\d+$`. No sign, whitespace or decimal point; digit runs
/// that overflow `i64` are rejected as well.
pub fn parse_numeric(raw: &str) -> Result<i64, InvalidId> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(InvalidId);
    }
    raw.parse::<i64>().map_err(|_| InvalidId)
}

/// Payload form: a digit string, or any integral JSON number (`2`, `2.0`,
/// `-4`). Numbers are not range-checked beyond `i64`; a key that names no
/// row is left for the store lookup to reject.
pub fn numeric_from_json(value: &Value) -> Result<i64, InvalidId> {
    match value {
        Value::String(raw) => parse_numeric(raw),
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().and_then(integral))
            .ok_or(InvalidId),
        _ => Err(InvalidId),
    }
}

fn integral(n: f64) -> Option<i64> {
    let in_range = (i64::MIN as f64..i64::MAX as f64).contains(&n);
    (in_range && n.fract() == 0.0).then(|| n as i64)
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            Serialize, Deserialize, sqlx::Type,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> i64 {
                self.0
            }

            pub fn parse(raw: &str) -> Result<Self, InvalidId> {
                parse_numeric(raw).map(Self)
            }

            pub fn from_json(value: &Value) -> Result<Self, InvalidId> {
                numeric_from_json(value).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Primary key of a row in `polls`.
    PollId
);
numeric_id!(
    /// Primary key of a row in `poll_items`.
    ItemId
);
numeric_id!(
    /// Primary key of a row in `votes`.
    VoteId
);

/// Identity issued by the hosted auth service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct UserId(Uuid);

impl UserId {
    pub const fn new(raw: Uuid) -> Self {
        Self(raw)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
