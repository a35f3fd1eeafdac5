use super::*;

use crate::api::LoginResponse;
use crate::request::RequestStatus;
use crate::storage::{ACCESS_TOKEN_KEY, KeyValueStore, REFRESH_TOKEN_KEY};
use crate::test_helpers::{FakeAuth, memory_session, rejected, user};

fn controller(auth: Arc<FakeAuth>) -> (AuthController, crate::storage::MemoryStore) {
    let (session, storage) = memory_session(auth);
    (AuthController::new(session, None), storage)
}

fn credentials() -> LoginRequest {
    LoginRequest { email: "a@b.com".into(), password: "x".into() }
}

// =============================================================================
// initialize
// =============================================================================

#[test]
fn starts_loading_and_anonymous() {
    let (ctl, _storage) = controller(Arc::new(FakeAuth::accepting()));
    let state = ctl.state();
    assert!(state.is_loading);
    assert!(!state.is_authenticated);
    assert_eq!(state.user, None);
}

#[tokio::test]
async fn initialize_without_session_is_anonymous() {
    let (ctl, _storage) = controller(Arc::new(FakeAuth::accepting()));
    ctl.initialize().await;
    assert_eq!(ctl.state(), AuthState { user: None, is_authenticated: false, is_loading: false });
}

#[tokio::test]
async fn initialize_restores_persisted_user() {
    let auth = Arc::new(FakeAuth::accepting());
    let (session, _storage) = memory_session(auth);
    session.login(&credentials()).await.unwrap();
    let ctl = AuthController::new(session, None);

    ctl.initialize().await;

    let state = ctl.state();
    assert!(!state.is_loading);
    assert!(state.is_authenticated);
    assert_eq!(state.user, Some(user("1", "A")));
}

#[tokio::test]
async fn initialize_with_invalid_token_clears_it() {
    let auth = Arc::new(FakeAuth::accepting());
    auth.set_profile(Err(rejected(401, "expired")));
    let (ctl, storage) = controller(auth);
    storage.set(ACCESS_TOKEN_KEY, "stale").unwrap();

    ctl.initialize().await;

    assert!(!ctl.state().is_authenticated);
    assert!(storage.is_empty());
}

// =============================================================================
// login / logout
// =============================================================================

#[tokio::test]
async fn login_publishes_user_and_persists_tokens() {
    let (ctl, storage) = controller(Arc::new(FakeAuth::accepting()));
    let mut sub = ctl.subscribe();

    let session = ctl.login(credentials()).await.unwrap();

    assert_eq!(session.access_token, "tok1");
    assert_eq!(storage.get(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("ref1"));
    assert!(sub.has_changed().unwrap());
    let state = sub.borrow_and_update().clone();
    assert!(state.is_authenticated);
    assert_eq!(state.user, Some(user("1", "A")));
    assert_eq!(ctl.login_request().status(), RequestStatus::Success);
    assert_eq!(ctl.token().as_deref(), Some("tok1"));
}

#[tokio::test]
async fn failed_login_exposes_error_and_stays_anonymous() {
    let auth = Arc::new(FakeAuth::rejecting_login(rejected(401, "Invalid credentials")));
    let (ctl, storage) = controller(auth);
    ctl.initialize().await;

    let err = ctl.login(credentials()).await.unwrap_err();

    let expected = RequestError::Failed(SessionError::Authentication(rejected(401, "Invalid credentials")));
    assert_eq!(err, expected);
    assert_eq!(ctl.login_request().error(), Some(expected));
    assert!(!ctl.login_request().loading());
    assert!(!ctl.state().is_authenticated);
    assert!(storage.is_empty());
}

#[tokio::test]
async fn logout_clears_state_even_when_remote_fails() {
    let auth = Arc::new(FakeAuth::accepting());
    let (ctl, storage) = controller(auth.clone());
    ctl.login(credentials()).await.unwrap();
    auth.set_logout(Err(rejected(500, "boom")));

    ctl.logout().await;

    let state = ctl.state();
    assert!(!state.is_authenticated);
    assert_eq!(state.user, None);
    assert!(storage.is_empty());
    assert_eq!(ctl.login_request().status(), RequestStatus::Idle);
    assert_eq!(ctl.logout_request().status(), RequestStatus::Success);
}

#[tokio::test]
async fn login_timeout_is_reported() {
    struct SlowAuth;

    #[async_trait::async_trait]
    impl crate::api::AuthApi for SlowAuth {
        async fn login(&self, _credentials: &LoginRequest) -> Result<LoginResponse, crate::api::ApiError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(rejected(500, "unreachable"))
        }
        async fn register(&self, _request: &RegisterRequest) -> Result<User, crate::api::ApiError> {
            Err(rejected(500, "unused"))
        }
        async fn logout(&self, _token: Option<&str>) -> Result<(), crate::api::ApiError> {
            Ok(())
        }
        async fn profile(&self, _token: &str) -> Result<User, crate::api::ApiError> {
            Err(rejected(500, "unused"))
        }
        async fn refresh(&self, _token: &str) -> Result<crate::api::RefreshResponse, crate::api::ApiError> {
            Err(rejected(500, "unused"))
        }
    }

    let storage = crate::storage::MemoryStore::new();
    let session = Arc::new(SessionStore::new(Arc::new(SlowAuth), Arc::new(storage.clone())));
    let limit = Duration::from_millis(20);
    let ctl = AuthController::new(session, Some(limit));

    let err = ctl.login(credentials()).await.unwrap_err();

    assert_eq!(err, RequestError::TimedOut(limit));
    assert!(storage.is_empty());
}

// =============================================================================
// register / profile / refresh
// =============================================================================

#[tokio::test]
async fn register_leaves_auth_state_alone() {
    let (ctl, _storage) = controller(Arc::new(FakeAuth::accepting()));
    ctl.initialize().await;
    let request = RegisterRequest { name: "Grace".into(), email: "g@example.com".into(), password: "Secret123".into() };

    let created = ctl.register(request).await.unwrap();

    assert_eq!(created.email.as_deref(), Some("g@example.com"));
    assert!(!ctl.state().is_authenticated);
    assert_eq!(ctl.register_request().data(), Some(created));
}

#[tokio::test]
async fn update_user_publishes_edit() {
    let (ctl, _storage) = controller(Arc::new(FakeAuth::accepting()));
    ctl.login(credentials()).await.unwrap();

    ctl.update_user(user("1", "Ada")).unwrap();

    assert_eq!(ctl.state().user, Some(user("1", "Ada")));
}

#[tokio::test]
async fn update_user_requires_session() {
    let (ctl, _storage) = controller(Arc::new(FakeAuth::accepting()));
    let err = ctl.update_user(user("1", "Ada")).unwrap_err();
    assert_eq!(err, SessionError::MissingCredential("access token"));
    assert_eq!(ctl.state().user, None);
}

#[tokio::test]
async fn refresh_failure_keeps_user_logged_in() {
    let auth = Arc::new(FakeAuth::accepting());
    let (ctl, _storage) = controller(auth.clone());
    ctl.login(credentials()).await.unwrap();
    auth.set_refresh(Err(rejected(401, "refresh expired")));

    assert!(ctl.refresh_token().await.is_err());

    assert!(ctl.state().is_authenticated);
    assert_eq!(ctl.token().as_deref(), Some("tok1"));
}

#[tokio::test]
async fn refresh_rotates_token() {
    let (ctl, _storage) = controller(Arc::new(FakeAuth::accepting()));
    ctl.login(credentials()).await.unwrap();
    assert_eq!(ctl.refresh_token().await.unwrap(), "tok2");
    assert_eq!(ctl.token().as_deref(), Some("tok2"));
}
