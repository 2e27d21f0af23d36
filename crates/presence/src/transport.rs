use async_trait::async_trait;
use xmpp_parsers::jid::Jid;

use huddle_rest::ServiceError;

/// The XMPP side of presence. Implemented by the connection owner.
#[async_trait]
pub trait PresenceTransport: Send + Sync {
    /// JID of the connected account, bare or full.
    fn own_jid(&self) -> Jid;

    /// Broadcast `<presence>` with an optional `<show/>` and a `<status/>`.
    async fn send_presence(&self, show: Option<&str>, status: &str) -> Result<(), ServiceError>;

    /// Join presence for a bubble (multi-user room).
    async fn send_initial_bubble_presence(&self, room_jid: &str) -> Result<(), ServiceError>;
}
