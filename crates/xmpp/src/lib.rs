pub mod error;
pub mod handlers;
pub mod management;
pub mod router;
pub mod stanza;

pub use error::StanzaError;
pub use handlers::{
    ChannelEventHandler, InvitationEventHandler, PresenceEventHandler, default_router,
};
pub use management::{CONFIGURATION_NS, ManagementTag};
pub use router::{MessageKind, StanzaHandler, StanzaKind, StanzaRouter};
pub use stanza::Stanza;
