//! Received and sent invitations of the connected user, kept current from
//! backend notifications and mirrored onto the contacts' roster state.

pub mod contacts;
pub mod service;

pub use contacts::{Contact, ContactInvitationState, Contacts};
pub use service::{InvitationsDeps, InvitationsService};
