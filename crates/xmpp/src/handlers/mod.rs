pub mod channel;
pub mod invitation;
pub mod presence;

use std::sync::Arc;

use huddle_core::EventBus;

pub use channel::ChannelEventHandler;
pub use invitation::InvitationEventHandler;
pub use presence::PresenceEventHandler;

use crate::router::StanzaRouter;

/// Router with every built-in handler publishing to `event_bus`.
pub fn default_router(event_bus: Arc<dyn EventBus>) -> StanzaRouter {
    let mut router = StanzaRouter::new();
    router.register(Box::new(ChannelEventHandler::new(Arc::clone(&event_bus))));
    router.register(Box::new(InvitationEventHandler::new(Arc::clone(&event_bus))));
    router.register(Box::new(PresenceEventHandler::new(event_bus)));
    router
}
