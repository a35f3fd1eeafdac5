//! Authentication collaborator: login, registration, logout, profile, refresh.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use reqwest::Method;

use super::client::{ApiClient, NO_BODY};
use super::types::{ApiError, LoginRequest, LoginResponse, RefreshResponse, RegisterRequest, User};

const LOGIN_PATH: &[&str] = &["auth", "login"];
const REGISTER_PATH: &[&str] = &["auth", "register"];
const LOGOUT_PATH: &[&str] = &["auth", "logout"];
const PROFILE_PATH: &[&str] = &["auth", "profile"];
const REFRESH_PATH: &[&str] = &["auth", "refresh"];

/// Backend contract consumed by the session store.
#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, credentials: &LoginRequest) -> Result<LoginResponse, ApiError>;

    async fn register(&self, request: &RegisterRequest) -> Result<User, ApiError>;

    /// Tell the backend the session is over. `access_token` is whatever was
    /// stored, if anything.
    async fn logout(&self, access_token: Option<&str>) -> Result<(), ApiError>;

    async fn profile(&self, access_token: &str) -> Result<User, ApiError>;

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError>;
}

/// [`AuthApi`] over the backend's REST endpoints.
#[derive(Clone, Debug)]
pub struct HttpAuthApi {
    client: ApiClient,
}

impl HttpAuthApi {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

#[async_trait::async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, credentials: &LoginRequest) -> Result<LoginResponse, ApiError> {
        self.client
            .send(Method::POST, LOGIN_PATH, &[], None, Some(credentials))
            .await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<User, ApiError> {
        self.client
            .send(Method::POST, REGISTER_PATH, &[], None, Some(request))
            .await
    }

    async fn logout(&self, access_token: Option<&str>) -> Result<(), ApiError> {
        self.client
            .send_empty(Method::POST, LOGOUT_PATH, access_token, NO_BODY)
            .await
    }

    async fn profile(&self, access_token: &str) -> Result<User, ApiError> {
        self.client
            .send(Method::GET, PROFILE_PATH, &[], Some(access_token), NO_BODY)
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError> {
        let body = RefreshBody { refresh_token };
        self.client
            .send(Method::POST, REFRESH_PATH, &[], None, Some(&body))
            .await
    }
}
