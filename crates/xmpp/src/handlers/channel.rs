//! Channel notifications: configuration changes carried by management
//! messages, feed items carried by headline messages, and error bounces.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use tracing::{debug, error, trace, warn};

use huddle_core::event::ChannelItem;
use huddle_core::{EventBus, EventPayload, EventSource};

use crate::management::{CONFIGURATION_NS, ManagementTag};
use crate::router::{MessageKind, StanzaHandler, StanzaKind};
use crate::stanza::Stanza;

const KINDS: &[StanzaKind] = &[
    StanzaKind::Message(MessageKind::Management),
    StanzaKind::Message(MessageKind::Headline),
    StanzaKind::Message(MessageKind::Error),
];

pub struct ChannelEventHandler {
    event_bus: Arc<dyn EventBus>,
}

impl ChannelEventHandler {
    pub fn new(event_bus: Arc<dyn EventBus>) -> Self {
        Self { event_bus }
    }

    fn emit(&self, name: &str, payload: EventPayload) {
        self.event_bus.emit(name, EventSource::Xmpp, payload);
    }

    pub fn dispatch_management(&self, stanza: &Stanza) {
        for node in stanza.children() {
            let Ok(tag) = node.name().parse::<ManagementTag>() else {
                warn!(node = node.name(), "unmanaged management message node");
                continue;
            };

            match tag {
                ManagementTag::Channel => {
                    self.dispatch_channel_management(node);
                }
                ManagementTag::Room
                | ManagementTag::UserSettings
                | ManagementTag::UserInvite
                | ManagementTag::Group
                | ManagementTag::Conversation
                | ManagementTag::Mute
                | ManagementTag::Unmute
                | ManagementTag::File
                | ManagementTag::Thumbnail => {
                    trace!(node = %tag, "management node not handled by channel events");
                }
            }
        }
    }

    /// Always reports the node as consumed.
    pub fn dispatch_channel_management(&self, stanza: &Stanza) -> bool {
        if stanza.attr("xmlns") != Some(CONFIGURATION_NS) {
            debug!(
                xmlns = stanza.attr("xmlns").unwrap_or_default(),
                "channel node outside configuration namespace ignored"
            );
            return true;
        }

        if let Some(channel) = locate(stanza, "channel") {
            self.channel_action(channel);
        }
        if let Some(subscription) = locate(stanza, "channel-subscription") {
            self.channel_subscription(subscription);
        }
        true
    }

    fn channel_action(&self, channel: &Stanza) {
        let id = channel.attr("channelid").map(str::to_string);
        let action = channel.attr("action").unwrap_or_default();
        debug!(channel = ?id, action, "channel management event received");

        let (name, payload) = match action {
            "add" | "update" | "remove" | "delete" => {
                (format!("channel.{action}"), EventPayload::Channel { id })
            }
            "subscribe" | "unsubscribe" => (
                format!("channel.{action}"),
                EventPayload::ChannelSubscribers {
                    id,
                    subscribers: channel.attr("subscribers").map(str::to_string),
                },
            ),
            _ => return,
        };
        self.emit(&name, payload);
    }

    fn channel_subscription(&self, subscription: &Stanza) {
        let action = subscription.attr("action").unwrap_or_default();
        let name = match action {
            "subscribe" => "channel.user_subscribe",
            "unsubscribe" => "channel.user_unsubscribe",
            _ => return,
        };

        let payload = EventPayload::ChannelUserSubscription {
            id: subscription.attr("channelid").map(str::to_string),
            user_id: subscription.attr("id").map(str::to_string),
            subscribers: subscription.attr("subscribers").and_then(parse_int),
        };
        debug!(action, "channel subscription event received");
        self.emit(name, payload);
    }

    pub fn dispatch_headline(&self, stanza: &Stanza) {
        let Some(event_node) = stanza.first_child() else {
            warn!("headline without event node ignored");
            return;
        };
        let Some(items) = event_node.first_child() else {
            warn!("headline event without items ignored");
            return;
        };
        let Some(item) = items.first_child() else {
            warn!("headline items without item ignored");
            return;
        };

        match item.name() {
            "retract" => match item.non_empty_attr("id") {
                Some(id) => {
                    debug!(message_id = id, "channel retract received");
                    self.emit(
                        "message.deleted",
                        EventPayload::MessageDeleted {
                            message_id: id.to_string(),
                        },
                    );
                }
                None => warn!("channel retract without id ignored"),
            },
            "item" => {
                let Some(entry) = item.first_child() else {
                    error!("channel item without entry cannot be parsed, ignored");
                    return;
                };
                let payload = channel_item(item, entry);
                self.emit("channel.item_received", EventPayload::ChannelItem(payload));
            }
            other => debug!(node = other, "unknown channel event received"),
        }
    }

    /// Pass the raw message on untouched.
    pub fn dispatch_error(&self, raw: &str, stanza: &Stanza) {
        error!(from = stanza.attr("from").unwrap_or_default(), "error message received");
        self.emit("connection.error", EventPayload::ConnectionError(raw.to_string()));
    }
}

impl StanzaHandler for ChannelEventHandler {
    fn name(&self) -> &str {
        "channel"
    }

    fn kinds(&self) -> &[StanzaKind] {
        KINDS
    }

    fn handle(&self, kind: StanzaKind, raw: &str, stanza: &Stanza) {
        match kind {
            StanzaKind::Message(MessageKind::Management) => self.dispatch_management(stanza),
            StanzaKind::Message(MessageKind::Headline) => self.dispatch_headline(stanza),
            StanzaKind::Message(MessageKind::Error) => self.dispatch_error(raw, stanza),
            _ => {}
        }
    }
}

/// A direct child named `name`, or the node itself when it carries that name.
fn locate<'a>(stanza: &'a Stanza, name: &str) -> Option<&'a Stanza> {
    stanza
        .child(name)
        .or_else(|| (stanza.name() == name).then_some(stanza))
}

fn channel_item(item: &Stanza, entry: &Stanza) -> ChannelItem {
    let images = entry
        .children_named("images")
        .filter_map(|image| {
            let id = image.child("id").map(Stanza::text).filter(|id| !id.is_empty());
            if id.is_none() {
                warn!("channel image without id ignored");
            }
            id.map(str::to_string)
        })
        .collect();

    ChannelItem {
        message_id: item.attr("id").map(str::to_string),
        channel_id: entry.attr("channelId").map(str::to_string),
        from_jid: entry.attr("from").map(str::to_string),
        message: entry.child_text("message").to_string(),
        title: entry.child_text("title").to_string(),
        url: entry.child_text("url").to_string(),
        date: entry.attr("timestamp").and_then(parse_date),
        images,
    }
}

/// Integer prefix parsing: optional leading whitespace and sign, then the
/// longest run of digits. `None` when there are no digits. Magnitudes past
/// `i64::MAX` saturate.
pub(crate) fn parse_int(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let digits = &rest[..end];
    if digits.is_empty() {
        return None;
    }
    let magnitude = digits.bytes().fold(0i64, |acc, digit| {
        acc.saturating_mul(10).saturating_add(i64::from(digit - b'0'))
    });
    Some(if negative { -magnitude } else { magnitude })
}

/// RFC 3339, ISO date-time or date without offset (read as UTC), or epoch
/// milliseconds.
pub(crate) fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(date.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|date| date.and_utc());
    }
    value
        .parse::<i64>()
        .ok()
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
}
