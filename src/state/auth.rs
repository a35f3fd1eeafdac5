//! Auth state for the current user.
//!
//! SYSTEM CONTEXT
//! ==============
//! Used by route guards and user-aware views. The controller is the only
//! writer of [`AuthState`]; it mirrors what the [`SessionStore`] persisted.
//!
//! TRADE-OFFS
//! ==========
//! A login result is applied after its wrapper settles, so a late login that
//! lost the race in the wrapper still marks the user as authenticated. The
//! session store holds whichever login wrote last.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::api::{LoginRequest, RegisterRequest, User};
use crate::request::{Request, RequestError};
use crate::session::{Session, SessionError, SessionStore};

/// Authentication state tracking the current user and loading status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<User>,
    pub is_authenticated: bool,
    /// True until the persisted session has been checked at startup.
    pub is_loading: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self { user: None, is_authenticated: false, is_loading: true }
    }
}

pub struct AuthController {
    session: Arc<SessionStore>,
    state: watch::Sender<AuthState>,
    login: Request<LoginRequest, Session, SessionError>,
    register: Request<RegisterRequest, User, SessionError>,
    logout: Request<(), (), Infallible>,
}

impl AuthController {
    /// `operation_timeout` bounds login and register. Logout is never timed
    /// out so local state is always cleared.
    #[must_use]
    pub fn new(session: Arc<SessionStore>, operation_timeout: Option<Duration>) -> Self {
        let login = {
            let session = Arc::clone(&session);
            Request::with_timeout(
                move |credentials: LoginRequest| {
                    let session = Arc::clone(&session);
                    async move { session.login(&credentials).await }
                },
                operation_timeout,
            )
        };
        let register = {
            let session = Arc::clone(&session);
            Request::with_timeout(
                move |request: RegisterRequest| {
                    let session = Arc::clone(&session);
                    async move { session.register(&request).await }
                },
                operation_timeout,
            )
        };
        let logout = {
            let session = Arc::clone(&session);
            Request::new(move |()| {
                let session = Arc::clone(&session);
                async move {
                    session.logout().await;
                    Ok::<(), Infallible>(())
                }
            })
        };
        let (state, _) = watch::channel(AuthState::default());
        Self { session, state, login, register, logout }
    }

    /// Check the persisted session and leave the loading state.
    pub async fn initialize(&self) {
        let user = self.session.restore().await;
        tracing::debug!(authenticated = user.is_some(), "auth state initialized");
        self.state.send_replace(AuthState { is_authenticated: user.is_some(), user, is_loading: false });
    }

    /// # Errors
    ///
    /// The session store's error (or a timeout), also kept in
    /// [`Self::login_request`] for rendering.
    pub async fn login(&self, credentials: LoginRequest) -> Result<Session, RequestError<SessionError>> {
        let session = self.login.execute(credentials).await?;
        self.state.send_modify(|s| {
            s.user = Some(session.user.clone());
            s.is_authenticated = true;
        });
        Ok(session)
    }

    /// Create an account. Auth state is unchanged; the caller logs in next.
    ///
    /// # Errors
    ///
    /// The collaborator's error (or a timeout).
    pub async fn register(&self, request: RegisterRequest) -> Result<User, RequestError<SessionError>> {
        self.register.execute(request).await
    }

    pub async fn logout(&self) {
        if let Err(e) = self.logout.execute(()).await {
            tracing::warn!(error = %e, "logout request did not settle cleanly");
        }
        self.login.reset();
        self.state.send_modify(|s| {
            s.user = None;
            s.is_authenticated = false;
        });
    }

    /// Persist an edited profile and publish it.
    ///
    /// # Errors
    ///
    /// `MissingCredential` when nobody is logged in.
    pub fn update_user(&self, user: User) -> Result<(), SessionError> {
        self.session.update_user(&user)?;
        self.state.send_modify(|s| s.user = Some(user));
        Ok(())
    }

    /// # Errors
    ///
    /// See [`SessionStore::refresh`]. A failure does not log the user out.
    pub async fn refresh_token(&self) -> Result<String, SessionError> {
        self.session.refresh().await
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.session.access_token()
    }

    #[must_use]
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn login_request(&self) -> &Request<LoginRequest, Session, SessionError> {
        &self.login
    }

    #[must_use]
    pub fn register_request(&self) -> &Request<RegisterRequest, User, SessionError> {
        &self.register
    }

    #[must_use]
    pub fn logout_request(&self) -> &Request<(), (), Infallible> {
        &self.logout
    }
}
