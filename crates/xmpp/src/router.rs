use std::fmt;

use tracing::{debug, trace};

use crate::error::StanzaError;
use crate::stanza::Stanza;

/// Top-level message type, taken from the `type` attribute of `<message/>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Chat,
    GroupChat,
    Management,
    Headline,
    Error,
}

impl MessageKind {
    /// `None` for types nothing here consumes. A missing type and the XMPP
    /// default `normal` both count as chat.
    pub fn from_type_attr(value: Option<&str>) -> Option<Self> {
        match value {
            None | Some("") | Some("chat") | Some("normal") => Some(Self::Chat),
            Some("groupchat") => Some(Self::GroupChat),
            Some("management") => Some(Self::Management),
            Some("headline") => Some(Self::Headline),
            Some("error") => Some(Self::Error),
            Some(_) => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::GroupChat => "groupchat",
            Self::Management => "management",
            Self::Headline => "headline",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StanzaKind {
    Message(MessageKind),
    Presence,
}

impl StanzaKind {
    pub fn classify(stanza: &Stanza) -> Result<Self, StanzaError> {
        let unsupported = || StanzaError::Unsupported {
            name: stanza.name().to_string(),
            kind: stanza.attr("type").map(str::to_string),
        };

        match stanza.name() {
            "message" => MessageKind::from_type_attr(stanza.attr("type"))
                .map(Self::Message)
                .ok_or_else(unsupported),
            "presence" => Ok(Self::Presence),
            _ => Err(unsupported()),
        }
    }
}

impl fmt::Display for StanzaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(kind) => write!(f, "message.{}", kind.as_str()),
            Self::Presence => f.write_str("presence"),
        }
    }
}

/// A consumer of classified inbound stanzas.
///
/// Handlers report problems through logs only; `handle` has no error path so
/// one bad stanza can never stop the router.
pub trait StanzaHandler: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Kinds this handler wants to see.
    fn kinds(&self) -> &[StanzaKind];

    /// `raw` is the message as received, for handlers that pass it on as-is.
    fn handle(&self, kind: StanzaKind, raw: &str, stanza: &Stanza);

    /// Lower runs first.
    fn priority(&self) -> i32 {
        0
    }
}

/// Fans each inbound stanza out to every handler registered for its kind.
pub struct StanzaRouter {
    handlers: Vec<Box<dyn StanzaHandler>>,
}

impl StanzaRouter {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn register(&mut self, handler: Box<dyn StanzaHandler>) {
        debug!(handler = handler.name(), "stanza handler registered");
        self.handlers.push(handler);
        self.handlers.sort_by_key(|h| h.priority());
    }

    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Dispatch an already-parsed stanza. Returns how many handlers saw it.
    pub fn route(&self, raw: &str, stanza: &Stanza) -> Result<usize, StanzaError> {
        let kind = StanzaKind::classify(stanza)?;
        let mut delivered = 0;

        for handler in &self.handlers {
            if handler.kinds().contains(&kind) {
                trace!(handler = handler.name(), %kind, "dispatching stanza");
                handler.handle(kind, raw, stanza);
                delivered += 1;
            }
        }

        if delivered == 0 {
            debug!(%kind, "no handler registered for stanza kind");
        }
        Ok(delivered)
    }

    /// Parse `xml` and dispatch it.
    pub fn route_xml(&self, xml: &str) -> Result<usize, StanzaError> {
        let stanza = Stanza::parse(xml)?;
        self.route(xml, &stanza)
    }
}

impl Default for StanzaRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    struct Probe {
        name: &'static str,
        kinds: Vec<StanzaKind>,
        priority: i32,
        seen: Arc<Mutex<Vec<(&'static str, StanzaKind)>>>,
    }

    impl StanzaHandler for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn kinds(&self) -> &[StanzaKind] {
            &self.kinds
        }

        fn handle(&self, kind: StanzaKind, _raw: &str, _stanza: &Stanza) {
            self.seen.lock().unwrap().push((self.name, kind));
        }

        fn priority(&self) -> i32 {
            self.priority
        }
    }

    fn recording(
        name: &'static str,
        kinds: Vec<StanzaKind>,
        priority: i32,
        seen: &Arc<Mutex<Vec<(&'static str, StanzaKind)>>>,
    ) -> Box<dyn StanzaHandler> {
        Box::new(Probe {
            name,
            kinds,
            priority,
            seen: Arc::clone(seen),
        })
    }

    #[test]
    fn classifies_message_types() {
        let cases = [
            (None, Some(MessageKind::Chat)),
            (Some("normal"), Some(MessageKind::Chat)),
            (Some("chat"), Some(MessageKind::Chat)),
            (Some("groupchat"), Some(MessageKind::GroupChat)),
            (Some("management"), Some(MessageKind::Management)),
            (Some("headline"), Some(MessageKind::Headline)),
            (Some("error"), Some(MessageKind::Error)),
            (Some("webrtc"), None),
        ];
        for (attr, expected) in cases {
            assert_eq!(MessageKind::from_type_attr(attr), expected, "type={attr:?}");
        }
    }

    #[test]
    fn classify_rejects_unknown_stanzas() {
        let iq = Stanza::new("iq").with_attr("type", "get");
        assert_eq!(
            StanzaKind::classify(&iq),
            Err(StanzaError::Unsupported {
                name: "iq".into(),
                kind: Some("get".into())
            })
        );
        assert_eq!(
            StanzaKind::classify(&Stanza::new("presence")),
            Ok(StanzaKind::Presence)
        );
    }

    #[test]
    fn routes_by_kind_in_priority_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let management = StanzaKind::Message(MessageKind::Management);

        let mut router = StanzaRouter::new();
        router.register(recording("late", vec![management], 20, &seen));
        router.register(recording("presence", vec![StanzaKind::Presence], 0, &seen));
        router.register(recording("early", vec![management], 10, &seen));

        let delivered = router
            .route_xml("<message xmlns='jabber:client' type='management'/>")
            .unwrap();

        assert_eq!(delivered, 2);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("early", management), ("late", management)]
        );
        assert_eq!(router.handler_names(), vec!["presence", "early", "late"]);
    }

    #[test]
    fn unrouted_kind_is_not_an_error() {
        let router = StanzaRouter::default();
        assert_eq!(
            router.route_xml("<message xmlns='jabber:client' type='headline'/>"),
            Ok(0)
        );
    }

    #[test]
    fn route_xml_surfaces_parse_failures() {
        let router = StanzaRouter::new();
        assert!(matches!(
            router.route_xml("not xml"),
            Err(StanzaError::ParseFailed(_))
        ));
    }
}
