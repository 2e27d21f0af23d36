/// Files under the workspace `tests/fixtures/` directory. A missing or
/// malformed fixture fails the calling test.
pub mod fixtures {
    use std::path::PathBuf;

    const DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../tests/fixtures");

    pub fn dir() -> PathBuf {
        PathBuf::from(DIR)
    }

    /// Raw XML of one inbound stanza.
    pub fn stanza(name: &str) -> String {
        load("stanzas", name)
    }

    /// JSON body as returned by the REST backend.
    pub fn rest(name: &str) -> serde_json::Value {
        let body = load("rest", name);
        serde_json::from_str(&body)
            .unwrap_or_else(|error| panic!("rest/{name} is not JSON: {error}"))
    }

    pub fn config(name: &str) -> String {
        load("config", name)
    }

    fn load(kind: &str, name: &str) -> String {
        let file = dir().join(kind).join(name);
        std::fs::read_to_string(&file)
            .unwrap_or_else(|error| panic!("cannot read fixture {}: {error}", file.display()))
    }
}

pub mod bus {
    use std::sync::{Mutex, MutexGuard, PoisonError};

    use huddle_core::{
        BroadcastEventBus, Event, EventBus, EventBusError, EventPayload, EventSubscription,
    };

    /// Event bus that keeps a copy of everything published, in order, while
    /// still delivering to live subscribers.
    #[derive(Default)]
    pub struct RecordingEventBus {
        inner: BroadcastEventBus,
        recorded: Mutex<Vec<Event>>,
    }

    impl RecordingEventBus {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<Event> {
            self.recorded().clone()
        }

        pub fn names(&self) -> Vec<String> {
            self.recorded()
                .iter()
                .map(|event| event.name().to_string())
                .collect()
        }

        pub fn payloads(&self, name: &str) -> Vec<EventPayload> {
            self.recorded()
                .iter()
                .filter(|event| event.name() == name)
                .map(|event| event.payload.clone())
                .collect()
        }

        /// Payloads published under `name`, as the JSON consumers receive.
        pub fn json(&self, name: &str) -> Vec<serde_json::Value> {
            self.payloads(name)
                .iter()
                .map(|payload| {
                    serde_json::to_value(payload).unwrap_or_else(|error| {
                        panic!("payload for {name} does not serialise: {error}")
                    })
                })
                .collect()
        }

        pub fn is_empty(&self) -> bool {
            self.recorded().is_empty()
        }

        pub fn clear(&self) {
            self.recorded().clear();
        }

        fn recorded(&self) -> MutexGuard<'_, Vec<Event>> {
            self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    impl EventBus for RecordingEventBus {
        fn publish(&self, event: Event) -> Result<(), EventBusError> {
            self.recorded().push(event.clone());
            self.inner.publish(event)
        }

        fn subscribe(&self, pattern: &str) -> Result<EventSubscription, EventBusError> {
            self.inner.subscribe(pattern)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::bus::RecordingEventBus;
    use super::fixtures;
    use huddle_core::{EventBus, EventPayload, EventSource};

    #[test]
    fn fixture_dir_holds_every_kind() {
        for kind in ["stanzas", "rest", "config"] {
            assert!(fixtures::dir().join(kind).is_dir(), "{kind} missing");
        }
    }

    #[test]
    fn loads_stanza_fixture() {
        let stanza = fixtures::stanza("management-channel-add.xml");
        assert!(stanza.contains("<message"));
    }

    #[test]
    fn loads_rest_fixture() {
        let json = fixtures::rest("invitation-pending.json");
        assert!(json.get("data").is_some());
    }

    #[test]
    fn minimal_config_fixture_loads() {
        let config =
            huddle_core::config::load_config_from_str(&fixtures::config("minimal-config.toml"))
                .unwrap();
        assert_eq!(config.account.jid, "bob@example.com");
    }

    #[tokio::test]
    async fn recording_bus_keeps_events_and_delivers_them() {
        let bus = RecordingEventBus::new();
        let mut sub = bus.subscribe("roster.*").unwrap();

        bus.emit("roster.changed", EventSource::Xmpp, EventPayload::Empty);
        bus.emit(
            "message.deleted",
            EventSource::Xmpp,
            EventPayload::MessageDeleted {
                message_id: "42".into(),
            },
        );

        assert_eq!(bus.names(), vec!["roster.changed", "message.deleted"]);
        assert_eq!(
            bus.json("message.deleted"),
            vec![serde_json::json!({"messageId": "42"})]
        );
        assert_eq!(sub.recv().await.unwrap().name(), "roster.changed");

        bus.clear();
        assert!(bus.is_empty());
    }
}
