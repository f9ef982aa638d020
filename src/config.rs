//! Engine configuration.
//!
//! Deployment bounds applied to every inserted message. Violations fail with
//! `Precondition`; nothing is truncated.

use crate::board::constants::{
    DEFAULT_MAX_ATTACHMENTS_PER_MESSAGE, DEFAULT_MAX_BOARDS_PER_MESSAGE,
};
use crate::error::{BoardError, Result};
use std::env;

/// Environment variable overriding `max_boards_per_message`.
pub const ENV_MAX_BOARDS: &str = "BOARDWEAVE_MAX_BOARDS";
/// Environment variable overriding `max_attachments_per_message`.
pub const ENV_MAX_ATTACHMENTS: &str = "BOARDWEAVE_MAX_ATTACHMENTS";

/// Bounds for inserted messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of boards one message may be cross-posted to.
    pub max_boards_per_message: usize,
    /// Maximum number of attachments per message.
    pub max_attachments_per_message: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_boards_per_message: DEFAULT_MAX_BOARDS_PER_MESSAGE,
            max_attachments_per_message: DEFAULT_MAX_ATTACHMENTS_PER_MESSAGE,
        }
    }
}

impl EngineConfig {
    /// Tight bounds for public relays that accept anonymous input.
    pub fn strict() -> Self {
        Self {
            max_boards_per_message: 4,
            max_attachments_per_message: 16,
        }
    }

    /// Defaults, overridden by `BOARDWEAVE_MAX_BOARDS` and
    /// `BOARDWEAVE_MAX_ATTACHMENTS` when set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_MAX_BOARDS) {
            config.max_boards_per_message = parse_bound(ENV_MAX_BOARDS, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_ATTACHMENTS) {
            config.max_attachments_per_message = parse_bound(ENV_MAX_ATTACHMENTS, &value)?;
        }
        Ok(config)
    }
}

fn parse_bound(key: &str, value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err(BoardError::config(format!("{} must be at least 1", key))),
        Ok(n) => Ok(n),
        Err(e) => Err(BoardError::config(format!(
            "{}={:?} is not a number: {}",
            key, value, e
        ))),
    }
}
