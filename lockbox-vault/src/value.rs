//! Typed value schema.
//!
//! Everything the store persists is a [`StoredValue`]. The encryption layer
//! only ever sees the JSON bytes of one of these variants.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value stored under a logical key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StoredValue {
    /// Plain text such as a model name or a display label.
    Text(String),
    /// Credential material such as an API key.
    Secret(String),
    Number(f64),
    Flag(bool),
    /// Structured settings (model parameters, tool configuration, ...).
    Settings(BTreeMap<String, serde_json::Value>),
    /// Conversation history, oldest first.
    History(Vec<HistoryEntry>),
}

impl StoredValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn secret(s: impl Into<String>) -> Self {
        Self::Secret(s.into())
    }

    /// Returns the string for `Text` and `Secret` values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Secret(s) => Some(s),
            _ => None,
        }
    }
}

/// Author of a history entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One message in a conversation history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,
}

/// Contents of a configuration share blob: every value of one namespace.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SharePayload {
    pub entries: BTreeMap<String, StoredValue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tagged_representation() {
        let v = StoredValue::secret("sk-123");
        assert_eq!(
            serde_json::to_value(&v).unwrap(),
            json!({"kind": "secret", "data": "sk-123"})
        );
    }

    #[test]
    fn history_representation() {
        let v = StoredValue::History(vec![HistoryEntry {
            role: Role::User,
            content: "hi".into(),
            timestamp: 1,
        }]);
        assert_eq!(
            serde_json::to_value(&v).unwrap(),
            json!({"kind": "history", "data": [{"role": "user", "content": "hi", "timestamp": 1}]})
        );
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let result = serde_json::from_value::<StoredValue>(json!({"kind": "blob", "data": 1}));
        assert!(result.is_err());
    }

    #[test]
    fn as_str_only_for_strings() {
        assert_eq!(StoredValue::text("a").as_str(), Some("a"));
        assert_eq!(StoredValue::Flag(true).as_str(), None);
    }
}
