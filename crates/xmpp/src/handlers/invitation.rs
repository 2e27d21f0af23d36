use std::sync::Arc;

use tracing::debug;

use huddle_core::{EventBus, EventPayload, EventSource};

use crate::router::{MessageKind, StanzaHandler, StanzaKind};
use crate::stanza::Stanza;

const KINDS: &[StanzaKind] = &[StanzaKind::Message(MessageKind::Management)];

/// Turns `<userinvite/>` management nodes into
/// `invitation.management_update` events for the invitations service.
pub struct InvitationEventHandler {
    event_bus: Arc<dyn EventBus>,
}

impl InvitationEventHandler {
    pub fn new(event_bus: Arc<dyn EventBus>) -> Self {
        Self { event_bus }
    }

    pub fn dispatch_management(&self, stanza: &Stanza) {
        for invite in stanza.children_named("userinvite") {
            let payload = EventPayload::InvitationUpdate {
                id: invite.attr("id").map(str::to_string),
                kind: invite.attr("type").map(str::to_string),
                action: invite.attr("action").map(str::to_string),
            };
            debug!(
                id = invite.attr("id").unwrap_or_default(),
                action = invite.attr("action").unwrap_or_default(),
                "invitation management update received"
            );
            self.event_bus
                .emit("invitation.management_update", EventSource::Xmpp, payload);
        }
    }
}

impl StanzaHandler for InvitationEventHandler {
    fn name(&self) -> &str {
        "invitation"
    }

    fn kinds(&self) -> &[StanzaKind] {
        KINDS
    }

    fn handle(&self, _kind: StanzaKind, _raw: &str, stanza: &Stanza) {
        self.dispatch_management(stanza);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_test_support::bus::RecordingEventBus;
    use huddle_test_support::fixtures;
    use serde_json::json;

    #[test]
    fn userinvite_becomes_management_update() {
        let bus = Arc::new(RecordingEventBus::new());
        let handler = InvitationEventHandler::new(bus.clone());
        let stanza = Stanza::parse(&fixtures::stanza("management-userinvite.xml")).unwrap();

        handler.dispatch_management(&stanza);

        assert_eq!(
            bus.json("invitation.management_update"),
            vec![json!({"id": "inv-1", "type": "received", "action": "create"})]
        );
    }

    #[test]
    fn other_management_nodes_are_ignored() {
        let bus = Arc::new(RecordingEventBus::new());
        let handler = InvitationEventHandler::new(bus.clone());
        let stanza = Stanza::parse(&fixtures::stanza("management-channel-add.xml")).unwrap();

        handler.handle(StanzaKind::Message(MessageKind::Management), "", &stanza);
        assert!(bus.is_empty());
    }
}
