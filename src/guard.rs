//! Route access decisions for protected views.
//!
//! SYSTEM CONTEXT
//! ==============
//! Protected pages ask `check_access` before rendering. The decision is pure:
//! it only reads the current [`AuthState`], so it can run on every state change.

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;

use crate::state::AuthState;

pub mod routes {
    pub const HOME: &str = "/";
    pub const LOGIN: &str = "/login";
    pub const REGISTER: &str = "/register";
    pub const DASHBOARD: &str = "/dashboard";
    pub const PROFILE: &str = "/profile";
    pub const USERS: &str = "/users";

    #[must_use]
    pub fn user_detail(id: &str) -> String {
        format!("{USERS}/{id}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAccess {
    /// Auth state is still being restored; render a placeholder.
    Pending,
    Granted,
    /// Send the visitor to `to`, remembering where they were headed.
    Redirect { to: String, from: String },
}

/// Decide whether `requested_path` may render. Anonymous visitors are sent to
/// `redirect_to` (usually [`routes::LOGIN`]).
#[must_use]
pub fn check_access(auth: &AuthState, requested_path: &str, redirect_to: &str) -> RouteAccess {
    if auth.is_loading {
        RouteAccess::Pending
    } else if auth.is_authenticated {
        RouteAccess::Granted
    } else {
        RouteAccess::Redirect { to: redirect_to.to_owned(), from: requested_path.to_owned() }
    }
}
