//! Channel names and the events fanned out to subscribers
//!
//! This module defines the key type identifying a broadcast group and the
//! change events that are delivered to every subscriber of that group.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of a broadcast group (typically a collection)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelName(String);

impl ChannelName {
    /// Create a channel name from an arbitrary string
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Create a channel name scoped to an owner (e.g. project + collection)
    ///
    /// The same collection name under two scopes yields two distinct channels.
    pub fn scoped(scope: impl AsRef<str>, name: impl AsRef<str>) -> Self {
        Self(format!("{}/{}", scope.as_ref(), name.as_ref()))
    }

    /// Like [`ChannelName::scoped`], but `None` when either part is empty or
    /// contains the `/` separator
    ///
    /// Without this check `("a", "b/c")` and `("a/b", "c")` name the same
    /// channel.
    pub fn try_scoped(scope: &str, name: &str) -> Option<Self> {
        let valid = |part: &str| !part.is_empty() && !part.contains('/');
        (valid(scope) && valid(name)).then(|| Self::scoped(scope, name))
    }

    /// Borrow the channel name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ChannelName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Action tag of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

/// A change event published to a channel
///
/// Serialized with an `action` tag:
/// `{"action":"update","document_id":"1","update":{"text":"bye"}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Event {
    /// A document was created; carries the full document
    Create { document: Value },
    /// A document was updated; carries the id and the applied delta
    Update { document_id: String, update: Value },
    /// A document was deleted
    Delete { document_id: String },
}

impl Event {
    /// Create event
    pub fn create(document: Value) -> Self {
        Event::Create { document }
    }

    /// Update event
    pub fn update(document_id: impl Into<String>, update: Value) -> Self {
        Event::Update {
            document_id: document_id.into(),
            update,
        }
    }

    /// Delete event
    pub fn delete(document_id: impl Into<String>) -> Self {
        Event::Delete {
            document_id: document_id.into(),
        }
    }

    /// Get the action tag
    pub fn action(&self) -> Action {
        match self {
            Event::Create { .. } => Action::Create,
            Event::Update { .. } => Action::Update,
            Event::Delete { .. } => Action::Delete,
        }
    }
}

/// An event as queued for one publish to a channel
///
/// The JSON payload is encoded once per publish. All subscribers share the
/// same `Bytes` allocation, cloning only bumps a reference count.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Channel the event was published to
    pub channel: ChannelName,
    /// The event itself
    pub event: Event,
    /// JSON encoding of `event`
    pub payload: Bytes,
}

impl Notification {
    /// Encode an event for delivery on `channel`
    pub fn encode(channel: ChannelName, event: Event) -> Result<Self, serde_json::Error> {
        let payload = Bytes::from(serde_json::to_vec(&event)?);
        Ok(Self {
            channel,
            event,
            payload,
        })
    }
}
