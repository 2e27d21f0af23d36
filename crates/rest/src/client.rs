use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use huddle_core::config::RestConfig;
use huddle_core::model::{Company, Invitation};

use crate::api::{AdminApi, InvitationsApi, SettingsApi};
use crate::error::RestError;
use crate::model::{
    CompanyInvite, InvitationRequest, NewCompany, NewGuest, NewUser, User, UserSettings,
};

const ADMIN: &[&str] = &["api", "admin", "v1.0"];
const ENDUSER: &[&str] = &["api", "enduser", "v1.0"];
const LOGIN: &[&str] = &["api", "authentication", "v1.0", "login"];

/// Bearer-authenticated JSON client for the backend.
///
/// Each call is a single attempt; failures are returned to the caller as-is.
#[derive(Debug)]
pub struct HttpRestClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
    user_id: Option<String>,
}

impl HttpRestClient {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        user_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RestError> {
        let base_url = Url::parse(base_url)
            .map_err(|error| RestError::InvalidUrl(format!("{base_url}: {error}")))?;
        if base_url.cannot_be_a_base() {
            return Err(RestError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            token,
            user_id,
        })
    }

    pub fn from_config(config: &RestConfig) -> Result<Self, RestError> {
        Self::new(
            &config.base_url,
            config.token.clone(),
            config.user_id.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self, prefix: &[&str], segments: &[&str]) -> Result<Url, RestError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RestError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(prefix)
            .extend(segments);
        Ok(url)
    }

    fn admin(&self, segments: &[&str]) -> Result<Url, RestError> {
        self.endpoint(ADMIN, segments)
    }

    /// `/api/enduser/v1.0/users/{userId}/...`
    fn enduser(&self, segments: &[&str]) -> Result<Url, RestError> {
        let user_id = self.user_id.as_deref().ok_or(RestError::MissingUserId)?;
        let mut path = vec!["users", user_id];
        path.extend_from_slice(segments);
        self.endpoint(ENDUSER, &path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Call an authenticated endpoint and unwrap the `data` envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<T, RestError> {
        let mut request = self.authorized(self.client.request(method, url));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let body = self.execute(request).await?;
        decode(unwrap_data(body))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Value, RestError> {
        let request = request.build()?;
        let (method, url) = (request.method().clone(), request.url().clone());
        debug!(%method, path = url.path(), "backend request");

        let response = self.client.execute(request).await?;
        read_response(method, url, response).await
    }
}

async fn read_response(
    method: Method,
    url: Url,
    response: reqwest::Response,
) -> Result<Value, RestError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let error_details_code = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| value.get("errorDetailsCode").and_then(Value::as_i64));
        warn!(
            %method,
            path = url.path(),
            status = status.as_u16(),
            error_details_code,
            "backend request failed"
        );
        return Err(RestError::Status {
            status: status.as_u16(),
            body,
            error_details_code,
        });
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body).map_err(|error| RestError::Decode(error.to_string()))
}

fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, RestError> {
    serde_json::from_value(value).map_err(|error| RestError::Decode(error.to_string()))
}

fn to_body<B: Serialize>(body: &B) -> Result<Value, RestError> {
    serde_json::to_value(body).map_err(|error| RestError::Decode(error.to_string()))
}

#[async_trait]
impl AdminApi for HttpRestClient {
    async fn create_company(&self, company: &NewCompany) -> Result<Company, RestError> {
        let url = self.admin(&["companies"])?;
        self.call(Method::POST, url, Some(to_body(company)?)).await
    }

    async fn set_visibility_for_company(
        &self,
        company_id: &str,
        visible_by: &str,
    ) -> Result<Company, RestError> {
        let url = self.admin(&["companies", company_id])?;
        self.call(Method::PUT, url, Some(json!({ "visibleBy": [visible_by] })))
            .await
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, RestError> {
        let url = self.admin(&["users"])?;
        self.call(Method::POST, url, Some(to_body(user)?)).await
    }

    async fn create_guest_user(&self, guest: &NewGuest) -> Result<User, RestError> {
        let url = self.admin(&["users", "guests"])?;
        self.call(Method::POST, url, Some(to_body(guest)?)).await
    }

    async fn invite_user(
        &self,
        company_id: &str,
        invite: &CompanyInvite,
    ) -> Result<Value, RestError> {
        let url = self.admin(&["companies", company_id, "invitations", "invite"])?;
        self.call(Method::POST, url, Some(to_body(invite)?)).await
    }

    async fn change_password(&self, user_id: &str, password: &str) -> Result<User, RestError> {
        let url = self.admin(&["users", user_id])?;
        self.call(Method::PUT, url, Some(json!({ "password": password })))
            .await
    }

    async fn update_information(
        &self,
        user_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<User, RestError> {
        let url = self.admin(&["users", user_id])?;
        self.call(Method::PUT, url, Some(Value::Object(fields.clone())))
            .await
    }

    async fn delete_user(&self, user_id: &str) -> Result<Value, RestError> {
        let url = self.admin(&["users", user_id])?;
        self.call(Method::DELETE, url, None).await
    }

    async fn get_all_companies(&self) -> Result<Vec<Company>, RestError> {
        let url = self.admin(&["companies"])?;
        self.call(Method::GET, url, None).await
    }

    async fn get_company(&self, company_id: &str) -> Result<Company, RestError> {
        let url = self.admin(&["companies", company_id])?;
        self.call(Method::GET, url, None).await
    }

    async fn delete_company(&self, company_id: &str) -> Result<Value, RestError> {
        let url = self.admin(&["companies", company_id])?;
        self.call(Method::DELETE, url, None).await
    }

    async fn ask_token_on_behalf(
        &self,
        login_email: &str,
        password: &str,
    ) -> Result<Value, RestError> {
        let url = self.endpoint(LOGIN, &[])?;
        let request = self
            .client
            .get(url)
            .basic_auth(login_email, Some(password));
        self.execute(request).await
    }
}

#[async_trait]
impl InvitationsApi for HttpRestClient {
    async fn get_invitation(&self, invitation_id: &str) -> Result<Invitation, RestError> {
        let url = self.enduser(&["invitations", invitation_id])?;
        self.call(Method::GET, url, None).await
    }

    async fn get_received_invitations(&self) -> Result<Vec<Invitation>, RestError> {
        let url = self.enduser(&["invitations", "received"])?;
        self.call(Method::GET, url, None).await
    }

    async fn get_sent_invitations(&self) -> Result<Vec<Invitation>, RestError> {
        let url = self.enduser(&["invitations", "sent"])?;
        self.call(Method::GET, url, None).await
    }

    async fn send_invitation(&self, request: &InvitationRequest) -> Result<Value, RestError> {
        let url = self.enduser(&["invitations"])?;
        self.call(Method::POST, url, Some(to_body(request)?)).await
    }

    async fn re_send_invitation(&self, invitation_id: &str) -> Result<Value, RestError> {
        let url = self.enduser(&["invitations", invitation_id, "re-send"])?;
        self.call(Method::POST, url, None).await
    }

    async fn cancel_invitation(&self, invitation_id: &str) -> Result<Value, RestError> {
        let url = self.enduser(&["invitations", invitation_id, "cancel"])?;
        self.call(Method::POST, url, None).await
    }

    async fn accept_invitation(&self, invitation_id: &str) -> Result<Value, RestError> {
        let url = self.enduser(&["invitations", invitation_id, "accept"])?;
        self.call(Method::POST, url, None).await
    }

    async fn decline_invitation(&self, invitation_id: &str) -> Result<Value, RestError> {
        let url = self.enduser(&["invitations", invitation_id, "decline"])?;
        self.call(Method::POST, url, None).await
    }
}

#[async_trait]
impl SettingsApi for HttpRestClient {
    async fn get_user_settings(&self) -> Result<UserSettings, RestError> {
        let url = self.enduser(&["settings"])?;
        self.call(Method::GET, url, None).await
    }

    async fn update_user_settings(
        &self,
        settings: &UserSettings,
    ) -> Result<UserSettings, RestError> {
        let url = self.enduser(&["settings"])?;
        self.call(Method::PUT, url, Some(to_body(settings)?)).await
    }
}
