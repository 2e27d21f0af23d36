use std::time::Duration;

use chrono::{DateTime, Utc};
use globset::{Glob, GlobMatcher};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use crate::error::EventBusError;
use crate::model::{Invitation, PresenceLevel};

/// Domains a channel name may start with.
pub const DOMAINS: &[&str] = &[
    "channel",
    "message",
    "connection",
    "invitation",
    "presence",
    "settings",
    "roster",
];

/// Dotted event name, e.g. `channel.item_received`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Channel(String);

impl Channel {
    /// Create a new channel, validating its format.
    pub fn new(name: impl Into<String>) -> std::result::Result<Self, EventBusError> {
        let name = name.into();
        if Self::is_valid(&name) {
            Ok(Self(name))
        } else {
            Err(EventBusError::InvalidChannel(name))
        }
    }

    /// Check if a channel name is valid.
    pub fn is_valid(name: &str) -> bool {
        if name.is_empty() || name.starts_with('.') || name.ends_with('.') || name.contains("..") {
            return false;
        }

        // Lowercase a-z, 0-9, underscores and dots only
        if name
            .chars()
            .any(|c| !matches!(c, 'a'..='z' | '0'..='9' | '_' | '.'))
        {
            return false;
        }

        name.split('.')
            .next()
            .is_some_and(|domain| DOMAINS.contains(&domain))
    }

    pub fn domain(&self) -> &str {
        self.0.split('.').next().unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        channel.0
    }
}

/// The envelope every published event travels in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Event name (e.g. "channel.add")
    pub channel: Channel,

    /// When the event was created (UTC)
    pub timestamp: DateTime<Utc>,

    /// Unique identifier for this event
    pub id: Uuid,

    /// Component that emitted this event
    pub source: EventSource,

    /// Payload with the field set downstream consumers rely on
    pub payload: EventPayload,
}

impl Event {
    pub fn new(channel: Channel, source: EventSource, payload: EventPayload) -> Self {
        Self {
            channel,
            timestamp: Utc::now(),
            id: Uuid::new_v4(),
            source,
            payload,
        }
    }

    pub fn name(&self) -> &str {
        self.channel.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "camelCase")]
pub enum EventSource {
    /// Stanza handlers
    Xmpp,
    /// A domain service, by name
    Service(String),
}

/// Event payloads. Serialised untagged so the JSON is exactly the documented
/// field set for each event name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    /// `channel.add`, `channel.update`, `channel.remove`, `channel.delete`
    Channel { id: Option<String> },

    /// `channel.subscribe`, `channel.unsubscribe`. `subscribers` is the raw
    /// attribute value.
    ChannelSubscribers {
        id: Option<String>,
        subscribers: Option<String>,
    },

    /// `channel.user_subscribe`, `channel.user_unsubscribe`
    #[serde(rename_all = "camelCase")]
    ChannelUserSubscription {
        id: Option<String>,
        user_id: Option<String>,
        subscribers: Option<i64>,
    },

    /// `message.deleted`
    #[serde(rename_all = "camelCase")]
    MessageDeleted { message_id: String },

    /// `channel.item_received`
    ChannelItem(ChannelItem),

    /// `connection.error`: the raw incoming message
    ConnectionError(String),

    /// `invitation.management_update`
    InvitationUpdate {
        id: Option<String>,
        #[serde(rename = "type")]
        kind: Option<String>,
        action: Option<String>,
    },

    /// `invitation.received`, `invitation.accepted`, `invitation.canceled`
    Invitation(Invitation),

    /// `presence.changed`
    PresenceChanged(PresenceUpdate),

    /// `settings.changed`, `roster.changed`
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelItem {
    pub message_id: Option<String>,
    pub channel_id: Option<String>,
    pub from_jid: Option<String>,
    pub message: String,
    pub title: String,
    pub url: String,
    pub date: Option<DateTime<Utc>>,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenceUpdate {
    /// Bare JID
    pub jid: String,
    pub fulljid: String,
    pub presence: PresenceLevel,
    pub status: String,
}

pub trait EventBus: Send + Sync + 'static {
    fn publish(&self, event: Event) -> std::result::Result<(), EventBusError>;

    fn subscribe(&self, pattern: &str) -> std::result::Result<EventSubscription, EventBusError>;

    /// Publish under `name`, logging instead of failing. Used at boundaries
    /// that must never propagate errors.
    fn emit(&self, name: &str, source: EventSource, payload: EventPayload) {
        let result = Channel::new(name)
            .and_then(|channel| self.publish(Event::new(channel, source, payload)));
        if let Err(error) = result {
            warn!(event = name, %error, "failed to publish event");
        }
    }
}

#[derive(Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<Event>,
}

impl BroadcastEventBus {
    pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

    pub fn new(channel_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity.max(1));
        Self { sender }
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CHANNEL_CAPACITY)
    }
}

impl EventBus for BroadcastEventBus {
    fn publish(&self, event: Event) -> std::result::Result<(), EventBusError> {
        if !Channel::is_valid(event.channel.as_str()) {
            return Err(EventBusError::InvalidChannel(event.channel.to_string()));
        }

        // No receivers is not an error
        let _ = self.sender.send(event);
        Ok(())
    }

    fn subscribe(&self, pattern: &str) -> std::result::Result<EventSubscription, EventBusError> {
        let matcher = compile_pattern(pattern)?;
        Ok(EventSubscription::new(matcher, self.sender.subscribe()))
    }
}

/// Validate a subscription glob and compile it.
pub fn compile_pattern(pattern: &str) -> std::result::Result<GlobMatcher, EventBusError> {
    let first_segment = pattern.split('.').next().unwrap_or_default();

    if first_segment.is_empty() {
        return Err(EventBusError::InvalidPattern(pattern.to_string()));
    }

    if !has_glob_meta(first_segment) && !DOMAINS.contains(&first_segment) {
        return Err(EventBusError::InvalidPattern(pattern.to_string()));
    }

    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|_| EventBusError::InvalidPattern(pattern.to_string()))
}

pub struct EventSubscription {
    matcher: GlobMatcher,
    receiver: broadcast::Receiver<Event>,
}

impl EventSubscription {
    /// Filter `receiver` down to channels matching `matcher`. For event bus
    /// implementations backed by a broadcast channel.
    pub fn new(matcher: GlobMatcher, receiver: broadcast::Receiver<Event>) -> Self {
        Self { matcher, receiver }
    }

    pub async fn recv(&mut self) -> std::result::Result<Event, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.matcher.is_match(event.channel.as_str()) => return Ok(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    return Err(EventBusError::Lagged(count));
                }
            }
        }
    }
}

fn has_glob_meta(segment: &str) -> bool {
    segment.contains(['*', '?', '[', ']', '{', '}', '!'])
}

/// Outcome of a bounded wait for a round-trip confirmation.
#[derive(Debug)]
pub enum Confirmation {
    Confirmed(Box<Event>),
    /// Nothing matching arrived in time (or the bus closed); the caller
    /// proceeds anyway.
    TimedOut,
}

impl Confirmation {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Confirmation::Confirmed(_))
    }
}

/// Wait until an event accepted by `predicate` arrives on `subscription`, or
/// `limit` elapses. Subscribe before triggering the action being confirmed.
pub async fn wait_for<F>(
    subscription: &mut EventSubscription,
    limit: Duration,
    mut predicate: F,
) -> Confirmation
where
    F: FnMut(&Event) -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        match tokio::time::timeout_at(deadline, subscription.recv()).await {
            Ok(Ok(event)) if predicate(&event) => return Confirmation::Confirmed(Box::new(event)),
            Ok(Ok(_)) => {}
            Ok(Err(EventBusError::Lagged(count))) => {
                warn!(count, "confirmation wait lagged, some events dropped");
            }
            Ok(Err(_)) | Err(_) => return Confirmation::TimedOut,
        }
    }
}
