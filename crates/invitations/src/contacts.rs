use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use huddle_core::model::Invitation;
use huddle_rest::ServiceError;

/// Roster entry as far as invitations are concerned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Backend id
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jid: Option<String>,
    /// Roster status, e.g. `unknown`, `wait`, `online`.
    #[serde(default)]
    pub status: String,
    /// Pending subscription direction: `ask`, `subscribe` or `none`.
    #[serde(default)]
    pub ask: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invitation: Option<Invitation>,
}

impl Contact {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            jid: None,
            status: "unknown".to_string(),
            ask: "none".to_string(),
            invitation: None,
        }
    }

    /// Apply an invitation state to the roster fields.
    pub fn apply(&mut self, state: ContactInvitationState) {
        match state {
            ContactInvitationState::Ask(invitation) => {
                self.status = "unknown".to_string();
                self.ask = "ask".to_string();
                self.invitation = invitation;
            }
            ContactInvitationState::Wait(invitation) => {
                self.status = "wait".to_string();
                self.ask = "subscribe".to_string();
                self.invitation = invitation;
            }
            ContactInvitationState::None => {
                self.ask = "none".to_string();
                self.invitation = None;
            }
        }
    }
}

/// Where a contact stands with respect to an invitation.
#[derive(Debug, Clone, PartialEq)]
pub enum ContactInvitationState {
    /// The contact invited us and we have not answered.
    Ask(Option<Invitation>),
    /// We invited the contact and wait for the answer.
    Wait(Option<Invitation>),
    /// No invitation in flight.
    None,
}

impl ContactInvitationState {
    /// `ask` and `wait` name their states; any other status clears the
    /// invitation.
    pub fn from_status(status: &str, invitation: Option<Invitation>) -> Self {
        match status {
            "ask" => Self::Ask(invitation),
            "wait" => Self::Wait(invitation),
            _ => Self::None,
        }
    }
}

/// Contacts collaborator: the roster owner the invitations service keeps in
/// sync.
#[async_trait]
pub trait Contacts: Send + Sync {
    /// Look up a contact by backend id, from the server when `force_server`.
    async fn get_contact_by_db_id(
        &self,
        contact_id: &str,
        force_server: bool,
    ) -> Result<Contact, ServiceError>;

    async fn update_invitation_status(
        &self,
        contact_id: &str,
        state: ContactInvitationState,
    ) -> Result<(), ServiceError>;
}
