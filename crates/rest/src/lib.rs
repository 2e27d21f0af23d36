//! REST collaborator: typed access to the administration and end-user
//! endpoints of the backend, plus the error kinds domain services return.

pub mod api;
pub mod client;
pub mod error;
pub mod model;

pub use api::{AdminApi, InvitationsApi, SettingsApi};
pub use client::HttpRestClient;
pub use error::{RestError, ServiceError};
pub use model::{
    CompanyInvite, InvitationRequest, NewCompany, NewGuest, NewUser, User, UserSettings,
};
