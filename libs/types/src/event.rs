//! Event records ingested by the platform.

use crate::error::ValidationError;
use crate::AttrMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of an ingested event.
///
/// The named variants cover the built-in taxonomy; everything else is
/// carried verbatim as [`EventType::Custom`] so producers can extend the
/// set without a schema change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    PageView,
    Click,
    Purchase,
    Signup,
    Login,
    Search,
    Custom(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::PageView => "page_view",
            EventType::Click => "click",
            EventType::Purchase => "purchase",
            EventType::Signup => "signup",
            EventType::Login => "login",
            EventType::Search => "search",
            EventType::Custom(name) => name,
        }
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "page_view" => EventType::PageView,
            "click" => EventType::Click,
            "purchase" => EventType::Purchase,
            "signup" => EventType::Signup,
            "login" => EventType::Login,
            "search" => EventType::Search,
            _ => EventType::Custom(value),
        }
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        value.as_str().to_string()
    }
}

impl From<&str> for EventType {
    fn from(value: &str) -> Self {
        EventType::from(value.to_string())
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable record of something that happened.
///
/// Events are created at the ingestion boundary, validated once, and never
/// mutated afterwards. `id` is globally unique within an event store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: EventType,

    /// RFC 3339 instant on the wire.
    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Free-form attribute map (string keys, tagged values).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AttrMap>,
}

impl Event {
    /// Minimal constructor used by tests and internal producers.
    pub fn new(
        id: impl Into<String>,
        event_type: impl Into<EventType>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            event_type: event_type.into(),
            timestamp,
            user_id: None,
            session_id: None,
            source: None,
            data: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_data(mut self, data: AttrMap) -> Self {
        self.data = Some(data);
        self
    }

    /// Admission rules: identifier and type must be non-empty, attribute
    /// keys must be non-empty. Timestamp presence is structural
    /// (deserialization already fails without one).
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField("id"));
        }
        if self.event_type.as_str().trim().is_empty() {
            return Err(ValidationError::MissingField("type"));
        }
        if let Some(data) = &self.data {
            if data.keys().any(|key| key.is_empty()) {
                return Err(ValidationError::EmptyAttributeKey);
            }
        }
        Ok(())
    }
}
