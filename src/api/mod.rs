//! Backend collaborators reached over JSON/HTTPS.
//!
//! DESIGN
//! ======
//! Each collaborator is a trait (`AuthApi`, `UserDirectory`) with one HTTP
//! implementation sharing an [`ApiClient`]. The session store and views only
//! see the traits, so tests swap in in-memory doubles.

pub mod auth;
pub mod client;
pub mod types;
pub mod users;

pub use auth::{AuthApi, HttpAuthApi};
pub use client::ApiClient;
pub use types::{
    ApiError, LoginRequest, LoginResponse, NewUser, Paginated, Pagination, PaginationParams, RefreshResponse,
    RegisterRequest, SortOrder, User, UserUpdate,
};
pub use users::{HttpUserDirectory, UserDirectory};

/// Supplies the bearer credential for authenticated requests.
pub trait TokenSource: Send + Sync {
    fn access_token(&self) -> Option<String>;
}
