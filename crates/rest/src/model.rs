//! Request bodies and response records specific to the REST surface.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCompany {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub login_email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    pub language: String,
    pub is_admin: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

impl NewUser {
    pub const DEFAULT_LANGUAGE: &'static str = "en-US";

    /// A non-admin user with the default language and no company.
    pub fn new(
        login_email: impl Into<String>,
        password: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            login_email: login_email.into(),
            password: password.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            company_id: None,
            language: Self::DEFAULT_LANGUAGE.to_string(),
            is_admin: false,
            roles: Vec::new(),
        }
    }
}

/// Guest account. All fields empty gives an anonymous guest.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGuest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Seconds before the account expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_live: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyInvite {
    pub email: String,
    pub lang: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_message: Option<String>,
}

/// End-user invitation request; exactly one way of addressing the invitee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum InvitationRequest {
    #[serde(rename_all = "camelCase")]
    ByEmail {
        email: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        custom_message: Option<String>,
    },
    Bulk { emails: Vec<String> },
    #[serde(rename_all = "camelCase")]
    JoinContact { invited_user_id: String },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_user_serialises_backend_field_names() {
        let user = NewUser {
            login_email: "bob@example.com".into(),
            password: "Secret-123".into(),
            first_name: "Bob".into(),
            last_name: "Builder".into(),
            company_id: Some("c-1".into()),
            language: "en-US".into(),
            is_admin: false,
            roles: vec![],
        };
        assert_eq!(
            serde_json::to_value(&user).unwrap(),
            json!({
                "loginEmail": "bob@example.com",
                "password": "Secret-123",
                "firstName": "Bob",
                "lastName": "Builder",
                "companyId": "c-1",
                "language": "en-US",
                "isAdmin": false
            })
        );
    }

    #[test]
    fn anonymous_guest_is_an_empty_object() {
        assert_eq!(serde_json::to_value(NewGuest::default()).unwrap(), json!({}));
    }

    #[test]
    fn invitation_requests_have_distinct_shapes() {
        let by_email = InvitationRequest::ByEmail {
            email: "carol@example.com".into(),
            lang: Some("fr-FR".into()),
            custom_message: None,
        };
        let bulk = InvitationRequest::Bulk {
            emails: vec!["a@example.com".into(), "b@example.com".into()],
        };
        let join = InvitationRequest::JoinContact {
            invited_user_id: "u-9".into(),
        };

        assert_eq!(
            serde_json::to_value(&by_email).unwrap(),
            json!({"email": "carol@example.com", "lang": "fr-FR"})
        );
        assert_eq!(
            serde_json::to_value(&bulk).unwrap(),
            json!({"emails": ["a@example.com", "b@example.com"]})
        );
        assert_eq!(
            serde_json::to_value(&join).unwrap(),
            json!({"invitedUserId": "u-9"})
        );
    }

    #[test]
    fn settings_keep_unknown_fields() {
        let settings: UserSettings =
            serde_json::from_value(json!({"presence": "dnd", "displayLanguage": "fr"})).unwrap();
        assert_eq!(settings.presence.as_deref(), Some("dnd"));
        assert_eq!(settings.extra.get("displayLanguage"), Some(&json!("fr")));
    }
}
