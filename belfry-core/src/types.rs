//! Shared data model for the belfry notification layer
//!
//! The messaging gateway speaks JSON over WebSocket. Every inbound and
//! outbound message (apart from the `getId` bootstrap, which is a bare text
//! frame) is a [`SocketFrame`]: an action tag plus an arbitrary payload.
//! The REST side of the platform uses camelCase field names, so the record
//! types here rename accordingly.
//!
//! # Actions
//!
//! The action tag routes a frame to its handlers. Reserved actions:
//!
//! - [`actions::SOCKET_ID`]: carries the server-assigned connection id
//! - [`actions::PRIVATE_MESSAGE`]: a new direct message arrived
//! - [`actions::NOTIFICATION`]: a generic notification arrived
//! - [`actions::MESSAGE`]: an existing message changed
//! - [`actions::RECONNECT`]: synthesized locally after a successful
//!   automatic reconnect, never sent by the gateway

use serde::{Deserialize, Serialize};

/// Well-known action tags.
pub mod actions {
    /// Inbound: the server-assigned socket identity, `data` is a string.
    pub const SOCKET_ID: &str = "socketId";
    /// Inbound: a new private message for someone in this church.
    pub const PRIVATE_MESSAGE: &str = "privateMessage";
    /// Inbound: a generic notification record was created.
    pub const NOTIFICATION: &str = "notification";
    /// Inbound: an existing message was updated.
    pub const MESSAGE: &str = "message";
    /// Local: synthesized to all handlers after an automatic reconnect.
    pub const RECONNECT: &str = "reconnect";
}

/// Outbound bootstrap message sent right after the socket opens.
///
/// This is a literal text frame, not JSON. The gateway answers with a
/// `socketId` action frame.
pub const GET_ID: &str = "getId";

/// Conversation id used when registering a connection for alert routing.
pub const ALERTS_CONVERSATION: &str = "alerts";

/// One action-tagged message on the wire
///
/// Both directions use this shape. `data` is deliberately untyped here;
/// each handler interprets the payload for its own action.
///
/// # Examples
///
/// ```rust
/// use belfry_core::SocketFrame;
/// use serde_json::json;
///
/// let frame = SocketFrame::new("privateMessage", json!({"conversationId": "c1"}));
/// assert_eq!(frame.action, "privateMessage");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketFrame {
    /// Semantic type of the message
    pub action: String,
    /// Action-specific payload
    #[serde(default)]
    pub data: serde_json::Value,
}

impl SocketFrame {
    /// Create a new frame with the given action and payload.
    pub fn new(action: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            action: action.into(),
            data,
        }
    }
}

/// Identity binding for a live connection
///
/// The (person, church) pair the gateway uses to route alert notifications
/// to this connection. The display name rides along for the registration
/// call so operators can tell connections apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonChurch {
    pub person_id: String,
    pub church_id: String,
    #[serde(default)]
    pub display_name: String,
}

impl PersonChurch {
    pub fn new(person_id: impl Into<String>, church_id: impl Into<String>) -> Self {
        Self {
            person_id: person_id.into(),
            church_id: church_id.into(),
            display_name: String::new(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// True when both ids are present. Bindings with a missing id are never
    /// applied or registered.
    pub fn is_complete(&self) -> bool {
        !self.person_id.is_empty() && !self.church_id.is_empty()
    }

    /// True when the routing-relevant part of the binding matches `other`.
    /// The display name does not participate.
    pub fn same_routing(&self, other: &PersonChurch) -> bool {
        self.person_id == other.person_id && self.church_id == other.church_id
    }
}

/// Body of the connection-registration call
///
/// POSTed to the messaging API after the socket id is known, binding the
/// connection to the alerts conversation for the current person and church.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRegistration {
    pub conversation_id: String,
    pub church_id: String,
    pub display_name: String,
    pub socket_id: String,
    pub person_id: String,
}

impl ConnectionRegistration {
    /// Build the alerts registration for an identity and socket id.
    pub fn alerts(identity: &PersonChurch, socket_id: impl Into<String>) -> Self {
        Self {
            conversation_id: ALERTS_CONVERSATION.to_string(),
            church_id: identity.church_id.clone(),
            display_name: identity.display_name.clone(),
            socket_id: socket_id.into(),
            person_id: identity.person_id.clone(),
        }
    }
}

/// Aggregated unread state published to subscribers
///
/// `pm_count` is the number of distinct conversations with unread private
/// messages, keyed by the other party's person id. It is never a raw
/// message count: three unread messages from the same person still count
/// as one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationCounts {
    pub notification_count: u64,
    pub pm_count: u64,
}

impl NotificationCounts {
    pub fn new(notification_count: u64, pm_count: u64) -> Self {
        Self {
            notification_count,
            pm_count,
        }
    }
}

/// One private-message record from the messaging API
///
/// Only the routing fields matter to this layer; anything else the API
/// returns is ignored during deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateMessage {
    pub from_person_id: String,
    pub to_person_id: String,
    #[serde(default)]
    pub notify_person_id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

impl PrivateMessage {
    /// The person id at the other end of this message, relative to
    /// `person_id`.
    pub fn other_party(&self, person_id: &str) -> &str {
        if self.from_person_id == person_id {
            &self.to_person_id
        } else {
            &self.from_person_id
        }
    }

    /// True when this record would notify `person_id`.
    pub fn notifies(&self, person_id: &str) -> bool {
        self.notify_person_id.as_deref() == Some(person_id)
    }
}

/// Payload of a `message` update event
///
/// Parsed leniently: update events for other people are common and are
/// filtered out before they trigger a recount.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    #[serde(default)]
    pub person_id: Option<String>,
    #[serde(default)]
    pub notify_person_id: Option<String>,
}

impl MessageEvent {
    /// True when the update concerns `person_id`, either as author or as
    /// the person to notify.
    pub fn concerns(&self, person_id: &str) -> bool {
        self.person_id.as_deref() == Some(person_id)
            || self.notify_person_id.as_deref() == Some(person_id)
    }
}

/// The signed-in person, as handed to the aggregator by the host app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
}

/// The church (organization) the person is currently acting in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
}

/// Initialization context for the notification aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub person: Person,
    pub organization: Organization,
}

impl UserContext {
    pub fn new(person_id: impl Into<String>, church_id: impl Into<String>) -> Self {
        Self {
            person: Person {
                id: person_id.into(),
                display_name: String::new(),
            },
            organization: Organization {
                id: church_id.into(),
            },
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.person.display_name = name.into();
        self
    }

    /// The identity binding this context maps to on the connection.
    pub fn identity(&self) -> PersonChurch {
        PersonChurch::new(self.person.id.clone(), self.organization.id.clone())
            .with_display_name(self.person.display_name.clone())
    }
}
