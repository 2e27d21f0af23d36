use std::sync::Arc;

use tracing::{debug, warn};
use xmpp_parsers::jid::Jid;

use huddle_core::event::PresenceUpdate;
use huddle_core::model::PresenceLevel;
use huddle_core::{EventBus, EventPayload, EventSource};

use crate::router::{MessageKind, StanzaHandler, StanzaKind};
use crate::stanza::Stanza;

const KINDS: &[StanzaKind] = &[
    StanzaKind::Presence,
    StanzaKind::Message(MessageKind::Management),
];

/// Presence broadcasts, roster subscription answers and user settings
/// notifications.
pub struct PresenceEventHandler {
    event_bus: Arc<dyn EventBus>,
}

impl PresenceEventHandler {
    pub fn new(event_bus: Arc<dyn EventBus>) -> Self {
        Self { event_bus }
    }

    fn emit(&self, name: &str, payload: EventPayload) {
        self.event_bus.emit(name, EventSource::Xmpp, payload);
    }

    pub fn dispatch_presence(&self, stanza: &Stanza) {
        let from = stanza.attr("from").unwrap_or_default();

        match stanza.attr("type") {
            None | Some("unavailable") => {
                let available = stanza.attr("type").is_none();
                let status = stanza.child_text("status").to_string();
                let show = stanza.child("show").map(Stanza::text);
                let presence = PresenceLevel::from_show_status(show, &status, available);
                let jid = match stanza.non_empty_attr("from").map(str::parse::<Jid>) {
                    Some(Ok(jid)) => jid,
                    Some(Err(error)) => {
                        warn!(from, %error, "presence from an invalid jid dropped");
                        return;
                    }
                    None => {
                        warn!("presence without sender dropped");
                        return;
                    }
                };
                debug!(%jid, %presence, "presence changed");

                self.emit(
                    "presence.changed",
                    EventPayload::PresenceChanged(PresenceUpdate {
                        jid: jid.to_bare().to_string(),
                        fulljid: jid.to_string(),
                        presence,
                        status,
                    }),
                );
            }
            Some("subscribed") | Some("unsubscribed") => {
                debug!(jid = from, "roster subscription changed");
                self.emit("roster.changed", EventPayload::Empty);
            }
            Some(other) => debug!(jid = from, kind = other, "presence type ignored"),
        }
    }

    pub fn dispatch_management(&self, stanza: &Stanza) {
        if stanza.child("usersettings").is_some() {
            debug!("user settings changed");
            self.emit("settings.changed", EventPayload::Empty);
        }
    }
}

impl StanzaHandler for PresenceEventHandler {
    fn name(&self) -> &str {
        "presence"
    }

    fn kinds(&self) -> &[StanzaKind] {
        KINDS
    }

    fn handle(&self, kind: StanzaKind, _raw: &str, stanza: &Stanza) {
        match kind {
            StanzaKind::Presence => self.dispatch_presence(stanza),
            StanzaKind::Message(MessageKind::Management) => self.dispatch_management(stanza),
            StanzaKind::Message(_) => {}
        }
    }
}
