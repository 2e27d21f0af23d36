//! Company and user administration on behalf of an administrator account.
//!
//! Every operation validates its arguments locally, then issues a single
//! backend call. Companies seen through this service are kept in a cache
//! keyed by id.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use huddle_core::model::Company;
use huddle_rest::{AdminApi, CompanyInvite, NewCompany, NewGuest, NewUser, ServiceError, User};

/// Fields `update_information_for_user` refuses; they have dedicated calls.
const PROTECTED_FIELDS: [&str; 2] = ["loginEmail", "password"];

type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Default)]
pub struct AdminService {
    rest: RwLock<Option<Arc<dyn AdminApi>>>,
    companies: RwLock<HashMap<String, Company>>,
}

impl AdminService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn start(&self, rest: Arc<dyn AdminApi>) {
        *self.rest.write().await = Some(rest);
        info!("admin service started");
    }

    pub async fn stop(&self) {
        self.rest.write().await.take();
        self.companies.write().await.clear();
        info!("admin service stopped");
    }

    pub async fn is_started(&self) -> bool {
        self.rest.read().await.is_some()
    }

    async fn rest(&self) -> Result<Arc<dyn AdminApi>> {
        self.rest.read().await.clone().ok_or(ServiceError::NotStarted)
    }

    pub async fn create_company(
        &self,
        name: &str,
        country: Option<&str>,
        state: Option<&str>,
    ) -> Result<Company> {
        require("create_company", "name", name)?;
        let rest = self.rest().await?;

        let company = rest
            .create_company(&NewCompany {
                name: name.to_string(),
                country: country.map(str::to_string),
                state: state.map(str::to_string),
            })
            .await?;
        info!(company_id = %company.id, "company created");
        self.cache_company(company.clone()).await;
        Ok(company)
    }

    /// Make `company` visible to the members of `visible_by`.
    pub async fn set_visibility_for_company(
        &self,
        company: &Company,
        visible_by: &Company,
    ) -> Result<Company> {
        require("set_visibility_for_company", "company", &company.id)?;
        require("set_visibility_for_company", "visible_by", &visible_by.id)?;
        let rest = self.rest().await?;

        let updated = rest
            .set_visibility_for_company(&company.id, &visible_by.id)
            .await?;
        debug!(company_id = %company.id, visible_by = %visible_by.id, "company visibility set");
        Ok(updated)
    }

    pub async fn remove_user_from_company(&self, user: &User) -> Result<Value> {
        self.delete_user(&user.id).await
    }

    /// An empty `language` falls back to [`NewUser::DEFAULT_LANGUAGE`].
    pub async fn create_user_in_company(&self, mut user: NewUser) -> Result<User> {
        const OPERATION: &str = "create_user_in_company";
        require(OPERATION, "email", &user.login_email)?;
        require(OPERATION, "password", &user.password)?;
        require(OPERATION, "firstname", &user.first_name)?;
        require(OPERATION, "lastname", &user.last_name)?;
        if user.language.is_empty() {
            user.language = NewUser::DEFAULT_LANGUAGE.to_string();
        }
        let rest = self.rest().await?;

        let created = rest.create_user(&user).await?;
        info!(user_id = %created.id, company_id = ?user.company_id, "user created");
        Ok(created)
    }

    /// `ttl` is the account lifetime in seconds.
    pub async fn create_guest_user(
        &self,
        first_name: &str,
        last_name: &str,
        language: Option<&str>,
        ttl: Option<u64>,
    ) -> Result<User> {
        require("create_guest_user", "firstname", first_name)?;
        require("create_guest_user", "lastname", last_name)?;
        let rest = self.rest().await?;

        let guest = rest
            .create_guest_user(&NewGuest {
                first_name: Some(first_name.to_string()),
                last_name: Some(last_name.to_string()),
                language: Some(language_or_default(language)),
                time_to_live: ttl,
            })
            .await?;
        info!(user_id = %guest.id, "guest user created");
        Ok(guest)
    }

    pub async fn create_anonymous_guest_user(&self, ttl: Option<u64>) -> Result<User> {
        let rest = self.rest().await?;

        let guest = rest
            .create_guest_user(&NewGuest {
                time_to_live: ttl,
                ..NewGuest::default()
            })
            .await?;
        info!(user_id = %guest.id, "anonymous guest user created");
        Ok(guest)
    }

    pub async fn invite_user_in_company(
        &self,
        email: &str,
        company_id: &str,
        language: Option<&str>,
        message: Option<&str>,
    ) -> Result<Value> {
        require("invite_user_in_company", "email", email)?;
        require("invite_user_in_company", "company_id", company_id)?;
        let rest = self.rest().await?;

        let invite = CompanyInvite {
            email: email.to_string(),
            lang: language_or_default(language),
            custom_message: message.map(str::to_string),
        };
        let result = rest.invite_user(company_id, &invite).await?;
        info!(company_id, "user invited in company");
        Ok(result)
    }

    pub async fn change_password_for_user(&self, password: &str, user_id: &str) -> Result<User> {
        require("change_password_for_user", "password", password)?;
        require("change_password_for_user", "user_id", user_id)?;
        let rest = self.rest().await?;

        let user = rest.change_password(user_id, password).await?;
        info!(user_id, "password changed");
        Ok(user)
    }

    /// Update arbitrary profile fields. Login email and password cannot be
    /// changed this way.
    pub async fn update_information_for_user(
        &self,
        fields: &Map<String, Value>,
        user_id: &str,
    ) -> Result<User> {
        const OPERATION: &str = "update_information_for_user";
        if fields.is_empty() {
            error!(operation = OPERATION, "bad request: no field to update");
            return Err(ServiceError::bad_request(format!(
                "{OPERATION}: no field to update"
            )));
        }
        if let Some(field) = PROTECTED_FIELDS.iter().find(|field| fields.contains_key(**field)) {
            error!(operation = OPERATION, field, "bad request: protected field");
            return Err(ServiceError::bad_request(format!(
                "{OPERATION}: {field} cannot be updated"
            )));
        }
        require(OPERATION, "user_id", user_id)?;
        let rest = self.rest().await?;

        let user = rest.update_information(user_id, fields).await?;
        debug!(user_id, fields = fields.len(), "user information updated");
        Ok(user)
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<Value> {
        require("delete_user", "user_id", user_id)?;
        let rest = self.rest().await?;

        let result = rest.delete_user(user_id).await?;
        info!(user_id, "user deleted");
        Ok(result)
    }

    /// Fetch every visible company and replace the cache with them.
    pub async fn get_all_companies(&self) -> Result<Vec<Company>> {
        let rest = self.rest().await?;

        let companies = rest.get_all_companies().await?;
        let mut cache = self.companies.write().await;
        *cache = companies
            .iter()
            .map(|company| (company.id.clone(), company.clone()))
            .collect();
        debug!(count = cache.len(), "companies cached");
        Ok(companies)
    }

    pub async fn get_company_by_id(&self, company_id: &str) -> Result<Company> {
        require("get_company_by_id", "company_id", company_id)?;
        let rest = self.rest().await?;

        let company = rest.get_company(company_id).await?;
        self.cache_company(company.clone()).await;
        Ok(company)
    }

    pub async fn remove_company(&self, company: &Company) -> Result<Value> {
        require("remove_company", "company", &company.id)?;
        let rest = self.rest().await?;

        let result = rest.delete_company(&company.id).await?;
        self.companies.write().await.remove(&company.id);
        info!(company_id = %company.id, "company removed");
        Ok(result)
    }

    /// Log in as another user and return the backend's login answer.
    pub async fn ask_token_on_behalf(&self, login_email: &str, password: &str) -> Result<Value> {
        require("ask_token_on_behalf", "login_email", login_email)?;
        require("ask_token_on_behalf", "password", password)?;
        let rest = self.rest().await?;

        Ok(rest.ask_token_on_behalf(login_email, password).await?)
    }

    pub async fn cached_company(&self, company_id: &str) -> Option<Company> {
        self.companies.read().await.get(company_id).cloned()
    }

    pub async fn cached_companies(&self) -> Vec<Company> {
        self.companies.read().await.values().cloned().collect()
    }

    async fn cache_company(&self, company: Company) {
        self.companies
            .write()
            .await
            .insert(company.id.clone(), company);
    }
}

fn require(operation: &'static str, field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        error!(operation, field, "bad request: missing parameter");
        return Err(ServiceError::bad_request(format!(
            "{operation}: {field} is required"
        )));
    }
    Ok(())
}

fn language_or_default(language: Option<&str>) -> String {
    match language {
        Some(language) if !language.is_empty() => language.to_string(),
        _ => NewUser::DEFAULT_LANGUAGE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use huddle_rest::RestError;
    use serde_json::json;
    use tracing_test::traced_test;

    use super::*;

    /// Records calls and answers with canned records.
    #[derive(Default)]
    struct FakeAdminApi {
        calls: Mutex<Vec<String>>,
        companies: Vec<Company>,
        guests: Mutex<Vec<NewGuest>>,
        users: Mutex<Vec<NewUser>>,
        invites: Mutex<Vec<CompanyInvite>>,
        fail_with_status: Option<u16>,
    }

    impl FakeAdminApi {
        fn record(&self, call: String) -> std::result::Result<(), RestError> {
            self.calls.lock().unwrap().push(call);
            match self.fail_with_status {
                Some(status) => Err(RestError::Status {
                    status,
                    body: String::new(),
                    error_details_code: None,
                }),
                None => Ok(()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn company(id: &str, name: &str) -> Company {
        Company {
            id: id.into(),
            name: name.into(),
            country: None,
            state: None,
            extra: Map::new(),
        }
    }

    fn user(id: &str) -> User {
        User {
            id: id.into(),
            login_email: None,
            first_name: None,
            last_name: None,
            company_id: None,
            extra: Map::new(),
        }
    }

    #[async_trait]
    impl AdminApi for FakeAdminApi {
        async fn create_company(
            &self,
            company: &NewCompany,
        ) -> std::result::Result<Company, RestError> {
            self.record(format!("create_company {}", company.name))?;
            Ok(self::company("c-new", &company.name))
        }

        async fn set_visibility_for_company(
            &self,
            company_id: &str,
            visible_by: &str,
        ) -> std::result::Result<Company, RestError> {
            self.record(format!("set_visibility {company_id} {visible_by}"))?;
            Ok(company(company_id, "visible"))
        }

        async fn create_user(&self, user: &NewUser) -> std::result::Result<User, RestError> {
            self.record(format!("create_user {}", user.login_email))?;
            self.users.lock().unwrap().push(user.clone());
            Ok(self::user("u-new"))
        }

        async fn create_guest_user(&self, guest: &NewGuest) -> std::result::Result<User, RestError> {
            self.record("create_guest_user".into())?;
            self.guests.lock().unwrap().push(guest.clone());
            Ok(user("g-new"))
        }

        async fn invite_user(
            &self,
            company_id: &str,
            invite: &CompanyInvite,
        ) -> std::result::Result<Value, RestError> {
            self.record(format!("invite_user {company_id} {}", invite.email))?;
            self.invites.lock().unwrap().push(invite.clone());
            Ok(json!({"status": "sent"}))
        }

        async fn change_password(
            &self,
            user_id: &str,
            _password: &str,
        ) -> std::result::Result<User, RestError> {
            self.record(format!("change_password {user_id}"))?;
            Ok(user(user_id))
        }

        async fn update_information(
            &self,
            user_id: &str,
            fields: &Map<String, Value>,
        ) -> std::result::Result<User, RestError> {
            self.record(format!("update_information {user_id} {}", fields.len()))?;
            Ok(user(user_id))
        }

        async fn delete_user(&self, user_id: &str) -> std::result::Result<Value, RestError> {
            self.record(format!("delete_user {user_id}"))?;
            Ok(Value::Null)
        }

        async fn get_all_companies(&self) -> std::result::Result<Vec<Company>, RestError> {
            self.record("get_all_companies".into())?;
            Ok(self.companies.clone())
        }

        async fn get_company(&self, company_id: &str) -> std::result::Result<Company, RestError> {
            self.record(format!("get_company {company_id}"))?;
            Ok(company(company_id, "fetched"))
        }

        async fn delete_company(&self, company_id: &str) -> std::result::Result<Value, RestError> {
            self.record(format!("delete_company {company_id}"))?;
            Ok(Value::Null)
        }

        async fn ask_token_on_behalf(
            &self,
            login_email: &str,
            _password: &str,
        ) -> std::result::Result<Value, RestError> {
            self.record(format!("ask_token_on_behalf {login_email}"))?;
            Ok(json!({"token": "t-1"}))
        }
    }

    async fn started(api: FakeAdminApi) -> (AdminService, Arc<FakeAdminApi>) {
        let api = Arc::new(api);
        let service = AdminService::new();
        service.start(api.clone()).await;
        (service, api)
    }

    #[tokio::test]
    async fn operations_before_start_fail() {
        let service = AdminService::new();
        assert!(!service.is_started().await);
        assert_matches!(
            service.get_all_companies().await,
            Err(ServiceError::NotStarted)
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn missing_name_is_rejected_without_calling_backend() {
        let (service, api) = started(FakeAdminApi::default()).await;

        assert_matches!(
            service.create_company("", Some("FRA"), None).await,
            Err(ServiceError::BadRequest(_))
        );
        assert!(api.calls().is_empty());
        assert!(logs_contain("bad request: missing parameter"));
    }

    #[tokio::test]
    async fn created_company_is_cached() {
        let (service, api) = started(FakeAdminApi::default()).await;

        let company = service.create_company("Initech", None, None).await.unwrap();

        assert_eq!(api.calls(), vec!["create_company Initech"]);
        assert_eq!(service.cached_company(&company.id).await, Some(company));
    }

    #[tokio::test]
    async fn company_listing_replaces_cache_and_removal_evicts() {
        let api = FakeAdminApi {
            companies: vec![company("c-1", "Acme"), company("c-2", "Globex")],
            ..FakeAdminApi::default()
        };
        let (service, _api) = started(api).await;
        service.get_company_by_id("c-9").await.unwrap();

        let companies = service.get_all_companies().await.unwrap();
        assert_eq!(companies.len(), 2);
        assert!(service.cached_company("c-9").await.is_none());
        assert_eq!(service.cached_companies().await.len(), 2);

        service.remove_company(&companies[0]).await.unwrap();
        assert!(service.cached_company("c-1").await.is_none());
        assert!(service.cached_company("c-2").await.is_some());
    }

    #[tokio::test]
    async fn failed_removal_keeps_cache_entry() {
        let (service, _api) = started(FakeAdminApi::default()).await;
        let company = service.get_company_by_id("c-1").await.unwrap();

        service.stop().await;
        let failing = FakeAdminApi {
            fail_with_status: Some(500),
            ..FakeAdminApi::default()
        };
        service.start(Arc::new(failing)).await;
        service.cache_company(company.clone()).await;

        assert_matches!(
            service.remove_company(&company).await,
            Err(ServiceError::Rest(RestError::Status { status: 500, .. }))
        );
        assert!(service.cached_company("c-1").await.is_some());
    }

    #[tokio::test]
    async fn user_creation_defaults_language() {
        let (service, api) = started(FakeAdminApi::default()).await;
        let mut user = NewUser::new("bob@example.com", "Secret-123", "Bob", "Builder");
        user.language.clear();
        user.company_id = Some("c-1".into());

        service.create_user_in_company(user).await.unwrap();

        let sent = api.users.lock().unwrap();
        assert_eq!(sent[0].language, "en-US");
        assert_eq!(sent[0].company_id.as_deref(), Some("c-1"));
    }

    #[tokio::test]
    async fn user_creation_requires_all_identity_fields() {
        let (service, api) = started(FakeAdminApi::default()).await;

        let user = NewUser::new("bob@example.com", "", "Bob", "Builder");
        assert_matches!(
            service.create_user_in_company(user).await,
            Err(ServiceError::BadRequest(message)) if message.contains("password")
        );
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn guests_named_and_anonymous() {
        let (service, api) = started(FakeAdminApi::default()).await;

        service
            .create_guest_user("Ann", "Onymous", None, Some(600))
            .await
            .unwrap();
        service.create_anonymous_guest_user(Some(60)).await.unwrap();
        assert_matches!(
            service.create_guest_user("Ann", "", None, None).await,
            Err(ServiceError::BadRequest(_))
        );

        let guests = api.guests.lock().unwrap();
        assert_eq!(guests.len(), 2);
        assert_eq!(guests[0].language.as_deref(), Some("en-US"));
        assert_eq!(guests[0].time_to_live, Some(600));
        assert_eq!(
            guests[1],
            NewGuest {
                time_to_live: Some(60),
                ..NewGuest::default()
            }
        );
    }

    #[tokio::test]
    async fn invite_in_company_carries_language_and_message() {
        let (service, api) = started(FakeAdminApi::default()).await;

        service
            .invite_user_in_company("carol@example.com", "c-1", Some("fr-FR"), Some("Welcome"))
            .await
            .unwrap();
        assert_matches!(
            service
                .invite_user_in_company("carol@example.com", "", None, None)
                .await,
            Err(ServiceError::BadRequest(_))
        );

        let invites = api.invites.lock().unwrap();
        assert_eq!(invites.len(), 1);
        assert_eq!(invites[0].lang, "fr-FR");
        assert_eq!(invites[0].custom_message.as_deref(), Some("Welcome"));
    }

    #[tokio::test]
    async fn update_information_refuses_protected_and_empty_fields() {
        let (service, api) = started(FakeAdminApi::default()).await;

        let mut fields = Map::new();
        assert_matches!(
            service.update_information_for_user(&fields, "u-1").await,
            Err(ServiceError::BadRequest(_))
        );

        fields.insert("jobTitle".into(), json!("Engineer"));
        fields.insert("loginEmail".into(), json!("new@example.com"));
        assert_matches!(
            service.update_information_for_user(&fields, "u-1").await,
            Err(ServiceError::BadRequest(message)) if message.contains("loginEmail")
        );
        assert!(api.calls().is_empty());

        fields.remove("loginEmail");
        service
            .update_information_for_user(&fields, "u-1")
            .await
            .unwrap();
        assert_eq!(api.calls(), vec!["update_information u-1 1"]);
    }

    #[tokio::test]
    async fn user_removal_and_password_change_hit_user_endpoints() {
        let (service, api) = started(FakeAdminApi::default()).await;

        service.change_password_for_user("N3w-pass", "u-1").await.unwrap();
        service.remove_user_from_company(&user("u-2")).await.unwrap();
        assert_matches!(
            service.delete_user("").await,
            Err(ServiceError::BadRequest(_))
        );

        assert_eq!(api.calls(), vec!["change_password u-1", "delete_user u-2"]);
    }

    #[tokio::test]
    async fn visibility_and_token_on_behalf() {
        let (service, api) = started(FakeAdminApi::default()).await;

        service
            .set_visibility_for_company(&company("c-1", "Acme"), &company("c-2", "Globex"))
            .await
            .unwrap();
        let token = service
            .ask_token_on_behalf("carol@example.com", "Secret-123")
            .await
            .unwrap();

        assert_eq!(token["token"], "t-1");
        assert_eq!(
            api.calls(),
            vec![
                "set_visibility c-1 c-2",
                "ask_token_on_behalf carol@example.com"
            ]
        );
    }

    #[tokio::test]
    async fn stop_clears_cache() {
        let (service, _api) = started(FakeAdminApi::default()).await;
        service.get_company_by_id("c-1").await.unwrap();

        service.stop().await;

        assert!(service.cached_companies().await.is_empty());
        assert_matches!(
            service.get_company_by_id("c-1").await,
            Err(ServiceError::NotStarted)
        );
    }
}
