//! View-model state observed by pages.
//!
//! Each model publishes a snapshot through a `watch` channel and exposes the
//! request wrappers behind its actions, so a page can render loading and
//! error state per action.

pub mod auth;
pub mod login;
pub mod users;

pub use auth::{AuthController, AuthState};
pub use login::{LoginError, LoginField, LoginForm, LoginFormErrors};
pub use users::{UsersState, UsersView};
