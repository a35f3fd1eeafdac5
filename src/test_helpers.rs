//! In-memory collaborator doubles and an in-process HTTP server for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::api::{
    ApiError, AuthApi, LoginRequest, LoginResponse, NewUser, Paginated, Pagination, PaginationParams,
    RefreshResponse, RegisterRequest, User, UserDirectory, UserUpdate,
};
use crate::session::SessionStore;
use crate::storage::MemoryStore;

/// Serve `app` on an ephemeral localhost port; returns its base URL.
pub async fn spawn_api(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn user(id: &str, name: &str) -> User {
    User {
        id: id.to_owned(),
        name: name.to_owned(),
        email: None,
        avatar: None,
        role: None,
        created_at: None,
        updated_at: None,
    }
}

pub fn rejected(status: u16, message: &str) -> ApiError {
    ApiError::Response { status, message: message.to_owned(), code: None }
}

// =============================================================================
// AUTH
// =============================================================================

/// Scriptable auth collaborator. Each field is the canned outcome for that call.
pub struct FakeAuth {
    pub login: Mutex<Result<LoginResponse, ApiError>>,
    pub logout: Mutex<Result<(), ApiError>>,
    pub profile: Mutex<Result<User, ApiError>>,
    pub refresh: Mutex<Result<RefreshResponse, ApiError>>,
    pub login_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    pub profile_calls: AtomicUsize,
    pub last_logout_token: Mutex<Option<String>>,
    pub last_refresh_token: Mutex<Option<String>>,
    /// Runs inside `refresh` before it answers, to interleave other writes.
    pub during_refresh: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl FakeAuth {
    /// Collaborator that accepts `a@b.com` and returns user `1`/`A` with `tok1`/`ref1`.
    pub fn accepting() -> Self {
        Self {
            login: Mutex::new(Ok(LoginResponse {
                user: user("1", "A"),
                access_token: "tok1".to_owned(),
                refresh_token: "ref1".to_owned(),
            })),
            logout: Mutex::new(Ok(())),
            profile: Mutex::new(Ok(user("1", "A"))),
            refresh: Mutex::new(Ok(RefreshResponse { access_token: "tok2".to_owned() })),
            login_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            profile_calls: AtomicUsize::new(0),
            last_logout_token: Mutex::new(None),
            last_refresh_token: Mutex::new(None),
            during_refresh: Mutex::new(None),
        }
    }

    pub fn rejecting_login(err: ApiError) -> Self {
        let fake = Self::accepting();
        *fake.login.lock().unwrap() = Err(err);
        fake
    }

    pub fn set_logout(&self, outcome: Result<(), ApiError>) {
        *self.logout.lock().unwrap() = outcome;
    }

    pub fn set_profile(&self, outcome: Result<User, ApiError>) {
        *self.profile.lock().unwrap() = outcome;
    }

    pub fn set_refresh(&self, outcome: Result<RefreshResponse, ApiError>) {
        *self.refresh.lock().unwrap() = outcome;
    }
}

#[async_trait::async_trait]
impl AuthApi for FakeAuth {
    async fn login(&self, _credentials: &LoginRequest) -> Result<LoginResponse, ApiError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.login.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    async fn register(&self, request: &RegisterRequest) -> Result<User, ApiError> {
        let mut created = user("new", &request.name);
        created.email = Some(request.email.clone());
        Ok(created)
    }

    async fn logout(&self, access_token: Option<&str>) -> Result<(), ApiError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_logout_token.lock().unwrap() = access_token.map(str::to_owned);
        self.logout.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    async fn profile(&self, _access_token: &str) -> Result<User, ApiError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.profile.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ApiError> {
        *self.last_refresh_token.lock().unwrap() = Some(refresh_token.to_owned());
        let hook = self.during_refresh.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        self.refresh.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Session store over a fresh `MemoryStore`; returns the store's handle too.
pub fn memory_session(auth: Arc<FakeAuth>) -> (Arc<SessionStore>, MemoryStore) {
    let storage = MemoryStore::new();
    let store = SessionStore::new(auth, Arc::new(storage.clone()));
    (Arc::new(store), storage)
}

// =============================================================================
// DIRECTORY
// =============================================================================

/// Directory returning `total_users` generated users, paged by the request.
pub struct FakeDirectory {
    pub total_users: AtomicUsize,
    pub fail_list: Mutex<Option<ApiError>>,
    pub list_calls: Mutex<Vec<PaginationParams>>,
    pub search_calls: Mutex<Vec<String>>,
}

impl FakeDirectory {
    pub fn with_users(total_users: usize) -> Self {
        Self {
            total_users: AtomicUsize::new(total_users),
            fail_list: Mutex::new(None),
            list_calls: Mutex::new(Vec::new()),
            search_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_total_users(&self, total_users: usize) {
        self.total_users.store(total_users, Ordering::SeqCst);
    }

    pub fn fail_next_list(&self, err: ApiError) {
        *self.fail_list.lock().unwrap() = Some(err);
    }

    pub fn list_calls(&self) -> Vec<PaginationParams> {
        self.list_calls.lock().unwrap().clone()
    }

    pub fn search_calls(&self) -> Vec<String> {
        self.search_calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl UserDirectory for FakeDirectory {
    async fn list(&self, params: &PaginationParams) -> Result<Paginated<User>, ApiError> {
        self.list_calls.lock().unwrap().push(params.clone());
        if let Some(err) = self.fail_list.lock().unwrap().take() {
            return Err(err);
        }
        let total_users = self.total_users.load(Ordering::SeqCst);
        let limit = params.limit.max(1) as usize;
        let start = (params.page.max(1) as usize - 1) * limit;
        let data: Vec<User> = (start..total_users.min(start + limit))
            .map(|i| user(&i.to_string(), &format!("User {i}")))
            .collect();
        let total_pages = u32::try_from(total_users.div_ceil(limit)).unwrap();
        Ok(Paginated {
            data,
            pagination: Pagination { page: params.page, limit: params.limit, total: total_users as u64, total_pages },
        })
    }

    async fn get(&self, id: &str) -> Result<User, ApiError> {
        Ok(user(id, &format!("User {id}")))
    }

    async fn create(&self, new_user: &NewUser) -> Result<User, ApiError> {
        Ok(user("created", &new_user.name))
    }

    async fn update(&self, id: &str, update: &UserUpdate) -> Result<User, ApiError> {
        Ok(user(id, update.name.as_deref().unwrap_or("unchanged")))
    }

    async fn delete(&self, _id: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<Vec<User>, ApiError> {
        self.search_calls.lock().unwrap().push(query.to_owned());
        Ok(vec![user("s1", query), user("s2", query)])
    }
}
