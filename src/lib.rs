//! # eventhub
//!
//! Client core for the event-discovery dashboard. Owns the authenticated
//! session, the HTTP collaborators it talks to, and the request/state
//! plumbing that views (browser pages or the `eventhub` CLI) observe.
//!
//! ARCHITECTURE
//! ============
//! - `storage`: narrow key-value port where the session is persisted.
//! - `api`: JSON-over-HTTP collaborators (auth + user directory).
//! - `session`: the single authority for "who is logged in".
//! - `request`: idle/pending/success/error wrapper around one async operation.
//! - `state`: view models built from the pieces above.
//! - `guard`: route access decisions derived from auth state.
//! - `validate`: form field validators and their user-facing messages.
//! - `config`: environment-driven client settings.

pub mod api;
pub mod config;
pub mod error;
pub mod guard;
pub mod request;
pub mod session;
pub mod state;
pub mod storage;
pub mod validate;

#[cfg(test)]
mod test_helpers;

pub use error::ErrorCode;
pub use request::{AdHocRequest, Request, RequestError, RequestOptions, RequestState, RequestStatus};
pub use session::{Session, SessionError, SessionStore};
