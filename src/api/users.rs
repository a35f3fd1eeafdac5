//! User-directory collaborator: paginated listing, CRUD, and search.

#[cfg(test)]
#[path = "users_test.rs"]
mod users_test;

use std::sync::Arc;

use reqwest::Method;

use super::TokenSource;
use super::client::{ApiClient, NO_BODY};
use super::types::{ApiError, NewUser, Paginated, PaginationParams, User, UserUpdate};

const USERS: &str = "users";
const USERS_PATH: &[&str] = &[USERS];

#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list(&self, params: &PaginationParams) -> Result<Paginated<User>, ApiError>;

    async fn get(&self, id: &str) -> Result<User, ApiError>;

    async fn create(&self, user: &NewUser) -> Result<User, ApiError>;

    async fn update(&self, id: &str, update: &UserUpdate) -> Result<User, ApiError>;

    async fn delete(&self, id: &str) -> Result<(), ApiError>;

    /// Free-text search over name and email. Results are not paginated.
    async fn search(&self, query: &str) -> Result<Vec<User>, ApiError>;
}

/// [`UserDirectory`] over REST, authenticating with the current access token.
#[derive(Clone)]
pub struct HttpUserDirectory {
    client: ApiClient,
    tokens: Arc<dyn TokenSource>,
}

impl HttpUserDirectory {
    #[must_use]
    pub fn new(client: ApiClient, tokens: Arc<dyn TokenSource>) -> Self {
        Self { client, tokens }
    }

    /// `/users/{id}` with `id` kept as a single encoded segment.
    fn user_path(id: &str) -> [&str; 2] {
        [USERS, id]
    }
}

#[async_trait::async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn list(&self, params: &PaginationParams) -> Result<Paginated<User>, ApiError> {
        let token = self.tokens.access_token();
        self.client
            .send(Method::GET, USERS_PATH, &params.query_pairs(), token.as_deref(), NO_BODY)
            .await
    }

    async fn get(&self, id: &str) -> Result<User, ApiError> {
        let token = self.tokens.access_token();
        self.client
            .send(Method::GET, &Self::user_path(id), &[], token.as_deref(), NO_BODY)
            .await
    }

    async fn create(&self, user: &NewUser) -> Result<User, ApiError> {
        let token = self.tokens.access_token();
        self.client
            .send(Method::POST, USERS_PATH, &[], token.as_deref(), Some(user))
            .await
    }

    async fn update(&self, id: &str, update: &UserUpdate) -> Result<User, ApiError> {
        let token = self.tokens.access_token();
        self.client
            .send(Method::PUT, &Self::user_path(id), &[], token.as_deref(), Some(update))
            .await
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let token = self.tokens.access_token();
        self.client
            .send_empty(Method::DELETE, &Self::user_path(id), token.as_deref(), NO_BODY)
            .await
    }

    async fn search(&self, query: &str) -> Result<Vec<User>, ApiError> {
        let token = self.tokens.access_token();
        self.client
            .send(Method::GET, USERS_PATH, &[("search", query.to_owned())], token.as_deref(), NO_BODY)
            .await
    }
}
