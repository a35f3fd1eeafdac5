//! Session store: the single authority for "who is logged in".
//!
//! ARCHITECTURE
//! ============
//! The store owns the persisted triple (user, access token, refresh token).
//! Views never touch storage; they call `login`, `logout`, `refresh`,
//! `update_user`, and the read accessors here. The auth collaborator and the
//! storage port are injected so tests can run entirely in memory.
//!
//! INVARIANTS
//! ==========
//! - A persisted user exists iff a persisted access token exists.
//! - Login writes all three fields in one `apply` batch; logout and startup
//!   invalidation remove all three in one batch.
//! - Every read-modify-write of the triple runs under `state_lock`, so no
//!   reader observes a half-written session.
//!
//! TRADE-OFFS
//! ==========
//! A failed refresh leaves the stale access token in place. Deciding whether
//! that should end the session is left to the caller.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::api::{ApiError, AuthApi, LoginRequest, RegisterRequest, TokenSource, User};
use crate::error::ErrorCode;
use crate::storage::{ACCESS_TOKEN_KEY, KeyValueStore, REFRESH_TOKEN_KEY, StorageError, StorageOp, USER_KEY};

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The auth collaborator rejected the login.
    #[error("authentication failed: {0}")]
    Authentication(ApiError),

    /// An operation needed a credential that is not stored.
    #[error("no stored {0}")]
    MissingCredential(&'static str),

    /// The session was cleared or replaced while a refresh was in flight.
    #[error("session changed while refresh was in flight")]
    Superseded,

    /// Any other failed exchange with a collaborator.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The persisted user record could not be parsed.
    #[error("stored user record is corrupt: {0}")]
    CorruptState(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "E_AUTHENTICATION",
            Self::MissingCredential(_) => "E_MISSING_CREDENTIAL",
            Self::Superseded => "E_SESSION_SUPERSEDED",
            Self::Api(e) => e.error_code(),
            Self::CorruptState(_) => "E_CORRUPT_STATE",
            Self::Storage(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Api(e) => e.retryable(),
            Self::Superseded => true,
            _ => false,
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// The authenticated identity plus its credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

// =============================================================================
// STORE
// =============================================================================

pub struct SessionStore {
    auth: Arc<dyn AuthApi>,
    storage: Arc<dyn KeyValueStore>,
    state_lock: Mutex<()>,
}

impl SessionStore {
    #[must_use]
    pub fn new(auth: Arc<dyn AuthApi>, storage: Arc<dyn KeyValueStore>) -> Self {
        Self { auth, storage, state_lock: Mutex::new(()) }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.state_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Authenticate and persist the resulting session as one unit.
    ///
    /// # Errors
    ///
    /// `Authentication` carrying the collaborator's error unchanged when the
    /// login is rejected (nothing is persisted), or `Storage` if the write fails.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<Session, SessionError> {
        let response = self
            .auth
            .login(credentials)
            .await
            .map_err(SessionError::Authentication)?;

        let user_json = encode_user(&response.user)?;
        {
            let _guard = self.lock();
            self.storage.apply(&[
                StorageOp::Set(ACCESS_TOKEN_KEY, &response.access_token),
                StorageOp::Set(REFRESH_TOKEN_KEY, &response.refresh_token),
                StorageOp::Set(USER_KEY, &user_json),
            ])?;
        }
        tracing::info!(user_id = %response.user.id, "session established");

        Ok(Session { user: response.user, access_token: response.access_token, refresh_token: response.refresh_token })
    }

    /// Register a new account. Does not log in or persist anything.
    ///
    /// # Errors
    ///
    /// Propagates the collaborator's error.
    pub async fn register(&self, request: &RegisterRequest) -> Result<User, SessionError> {
        Ok(self.auth.register(request).await?)
    }

    /// Best-effort remote logout, then unconditionally clear local state.
    /// Never fails: remote and storage errors are logged and swallowed.
    pub async fn logout(&self) {
        let token = self.access_token();
        if let Err(e) = self.auth.logout(token.as_deref()).await {
            tracing::warn!(error = %e, "remote logout failed; clearing local session anyway");
        }
        self.clear();
    }

    /// Mint a new access token from the stored refresh token.
    ///
    /// # Errors
    ///
    /// `MissingCredential` if no refresh token is stored; the collaborator's
    /// error if refresh is rejected (the stale token is kept); `Superseded` if
    /// the session changed before the new token could be written.
    pub async fn refresh(&self) -> Result<String, SessionError> {
        let refresh_token = self
            .read(REFRESH_TOKEN_KEY)
            .ok_or(SessionError::MissingCredential("refresh token"))?;

        let response = match self.auth.refresh(&refresh_token).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed; keeping stale access token");
                return Err(e.into());
            }
        };

        let _guard = self.lock();
        if self.read(REFRESH_TOKEN_KEY).as_deref() != Some(refresh_token.as_str()) {
            tracing::debug!("discarding refreshed token for a session that no longer exists");
            return Err(SessionError::Superseded);
        }
        self.storage.set(ACCESS_TOKEN_KEY, &response.access_token)?;
        tracing::debug!("access token refreshed");
        Ok(response.access_token)
    }

    /// Overwrite the stored user record without touching tokens.
    ///
    /// # Errors
    ///
    /// `MissingCredential` when there is no session to attach the user to.
    pub fn update_user(&self, user: &User) -> Result<(), SessionError> {
        let user_json = encode_user(user)?;
        let _guard = self.lock();
        if self.read(ACCESS_TOKEN_KEY).is_none() {
            return Err(SessionError::MissingCredential("access token"));
        }
        self.storage.set(USER_KEY, &user_json)?;
        Ok(())
    }

    /// Fetch the profile of the stored session from the collaborator.
    ///
    /// # Errors
    ///
    /// `MissingCredential` without an access token, else the collaborator's error.
    pub async fn profile(&self) -> Result<User, SessionError> {
        let token = self
            .access_token()
            .ok_or(SessionError::MissingCredential("access token"))?;
        Ok(self.auth.profile(&token).await?)
    }

    /// Decide the initial authentication state at application start.
    ///
    /// Returns the restored user, or `None` (with all session fields cleared)
    /// when there is no token or the session turns out to be invalid.
    pub async fn restore(&self) -> Option<User> {
        if !self.is_authenticated() {
            if self.read(USER_KEY).is_some() || self.read(REFRESH_TOKEN_KEY).is_some() {
                tracing::debug!("clearing orphaned session fields without an access token");
                self.clear();
            }
            return None;
        }

        if let Some(user) = self.current_user() {
            return Some(user);
        }

        match self.profile().await {
            Ok(user) => match self.update_user(&user) {
                Ok(()) => Some(user),
                Err(e) => {
                    tracing::warn!(error = %e, "could not persist restored profile; clearing session");
                    self.clear();
                    None
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "stored session is invalid; clearing");
                self.clear();
                None
            }
        }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Stored user, or `None` when absent or unparsable.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        match self.read_user() {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring stored user record");
                None
            }
        }
    }

    /// True iff an access token is stored. Validity and expiry are not checked.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read(ACCESS_TOKEN_KEY).is_some()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.read(ACCESS_TOKEN_KEY)
    }

    /// The full persisted triple, if every part is present and readable.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        let _guard = self.lock();
        let access_token = self.read(ACCESS_TOKEN_KEY)?;
        let refresh_token = self.read(REFRESH_TOKEN_KEY)?;
        let user = self.read_user().ok()??;
        Some(Session { user, access_token, refresh_token })
    }

    fn read_user(&self) -> Result<Option<User>, SessionError> {
        let Some(raw) = self.storage.get(USER_KEY)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| SessionError::CorruptState(e.to_string()))
    }

    /// Read one key, treating storage failures as absence.
    fn read(&self, key: &str) -> Option<String> {
        match self.storage.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, key, "session storage read failed");
                None
            }
        }
    }

    fn clear(&self) {
        let _guard = self.lock();
        if let Err(e) = self.storage.apply(&[
            StorageOp::Remove(ACCESS_TOKEN_KEY),
            StorageOp::Remove(REFRESH_TOKEN_KEY),
            StorageOp::Remove(USER_KEY),
        ]) {
            tracing::error!(error = %e, "failed to clear persisted session");
        }
        tracing::info!("session cleared");
    }
}

impl TokenSource for SessionStore {
    fn access_token(&self) -> Option<String> {
        SessionStore::access_token(self)
    }
}

fn encode_user(user: &User) -> Result<String, SessionError> {
    serde_json::to_string(user).map_err(|e| SessionError::CorruptState(e.to_string()))
}
