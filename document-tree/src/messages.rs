//! Keys and parameters for user-facing messages.
//!
//! The tree never renders text itself. It hands a [`Message`] to whatever
//! [`Localizer`] the display layer provides.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A message key with named parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Stable lookup key, e.g. `error.invalid_name`.
    pub key: String,

    /// Named parameters in insertion order.
    pub params: Vec<(String, String)>,
}

impl Message {
    /// Create a message without parameters.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            params: Vec::new(),
        }
    }

    /// Attach a parameter.
    pub fn with(mut self, name: impl Into<String>, value: impl Display) -> Self {
        self.params.push((name.into(), value.to_string()));
        self
    }

    /// Look up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Renders messages for a user.
pub trait Localizer: Send + Sync {
    /// Produce user-facing text for `message`.
    fn localize(&self, message: &Message) -> String;
}

/// Fallback localizer that prints the key and its parameters.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyLocalizer;

impl Localizer for KeyLocalizer {
    fn localize(&self, message: &Message) -> String {
        if message.params.is_empty() {
            return message.key.clone();
        }
        let params = message
            .params
            .iter()
            .map(|(n, v)| format!("{n}={v}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{} ({params})", message.key)
    }
}
