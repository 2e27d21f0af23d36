use async_trait::async_trait;
use serde_json::{Map, Value};

use huddle_core::model::{Company, Invitation};

use crate::error::RestError;
use crate::model::{
    CompanyInvite, InvitationRequest, NewCompany, NewGuest, NewUser, User, UserSettings,
};

/// Administration endpoints.
#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn create_company(&self, company: &NewCompany) -> Result<Company, RestError>;

    /// Make `company_id` visible to members of `visible_by`.
    async fn set_visibility_for_company(
        &self,
        company_id: &str,
        visible_by: &str,
    ) -> Result<Company, RestError>;

    async fn create_user(&self, user: &NewUser) -> Result<User, RestError>;

    async fn create_guest_user(&self, guest: &NewGuest) -> Result<User, RestError>;

    async fn invite_user(
        &self,
        company_id: &str,
        invite: &CompanyInvite,
    ) -> Result<Value, RestError>;

    async fn change_password(&self, user_id: &str, password: &str) -> Result<User, RestError>;

    async fn update_information(
        &self,
        user_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<User, RestError>;

    async fn delete_user(&self, user_id: &str) -> Result<Value, RestError>;

    async fn get_all_companies(&self) -> Result<Vec<Company>, RestError>;

    async fn get_company(&self, company_id: &str) -> Result<Company, RestError>;

    async fn delete_company(&self, company_id: &str) -> Result<Value, RestError>;

    /// Log in as another user. The backend answer is returned as-is.
    async fn ask_token_on_behalf(
        &self,
        login_email: &str,
        password: &str,
    ) -> Result<Value, RestError>;
}

/// Invitations of the connected user.
#[async_trait]
pub trait InvitationsApi: Send + Sync {
    async fn get_invitation(&self, invitation_id: &str) -> Result<Invitation, RestError>;

    async fn get_received_invitations(&self) -> Result<Vec<Invitation>, RestError>;

    async fn get_sent_invitations(&self) -> Result<Vec<Invitation>, RestError>;

    async fn send_invitation(&self, request: &InvitationRequest) -> Result<Value, RestError>;

    async fn re_send_invitation(&self, invitation_id: &str) -> Result<Value, RestError>;

    async fn cancel_invitation(&self, invitation_id: &str) -> Result<Value, RestError>;

    async fn accept_invitation(&self, invitation_id: &str) -> Result<Value, RestError>;

    async fn decline_invitation(&self, invitation_id: &str) -> Result<Value, RestError>;
}

#[async_trait]
pub trait SettingsApi: Send + Sync {
    async fn get_user_settings(&self) -> Result<UserSettings, RestError>;

    async fn update_user_settings(&self, settings: &UserSettings)
    -> Result<UserSettings, RestError>;
}
