//! Users page state: a paged, sortable listing with debounced search.
//!
//! DESIGN
//! ======
//! The view runs two request wrappers (page listing and search) and folds
//! their results into one [`UsersState`]. A non-empty search term switches the
//! listing to search results, which are unpaginated.
//!
//! INVARIANTS
//! ==========
//! - `current_page` stays within `[1, max(total_pages, 1)]`.
//! - Only the most recently started load writes `users`/`total_pages`; a
//!   newer page change or keystroke supersedes older loads and pending
//!   debounced searches.

#[cfg(test)]
#[path = "users_test.rs"]
mod users_test;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;

use crate::api::{ApiError, Paginated, PaginationParams, SortOrder, User, UserDirectory};
use crate::request::{Request, RequestError};

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);
const SORT_FIELD: &str = "createdAt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsersState {
    pub users: Vec<User>,
    pub current_page: u32,
    pub total_pages: u32,
    pub search_term: String,
}

impl Default for UsersState {
    fn default() -> Self {
        Self { users: Vec::new(), current_page: 1, total_pages: 1, search_term: String::new() }
    }
}

impl UsersState {
    fn active_search(&self) -> Option<String> {
        let term = self.search_term.trim();
        (!term.is_empty()).then(|| term.to_owned())
    }
}

pub struct UsersView {
    state: watch::Sender<UsersState>,
    list: Request<PaginationParams, Paginated<User>, ApiError>,
    search: Request<String, Vec<User>, ApiError>,
    page_size: u32,
    debounce: Duration,
    load_seq: AtomicU64,
}

impl UsersView {
    #[must_use]
    pub fn new(directory: Arc<dyn UserDirectory>, page_size: u32, operation_timeout: Option<Duration>) -> Self {
        let list = {
            let directory = Arc::clone(&directory);
            Request::with_timeout(
                move |params: PaginationParams| {
                    let directory = Arc::clone(&directory);
                    async move { directory.list(&params).await }
                },
                operation_timeout,
            )
        };
        let search = Request::with_timeout(
            move |term: String| {
                let directory = Arc::clone(&directory);
                async move { directory.search(&term).await }
            },
            operation_timeout,
        );
        let (state, _) = watch::channel(UsersState::default());
        Self { state, list, search, page_size: page_size.max(1), debounce: SEARCH_DEBOUNCE, load_seq: AtomicU64::new(0) }
    }

    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    // -------------------------------------------------------------------------
    // Actions
    // -------------------------------------------------------------------------

    /// Load whatever the state currently asks for: search results when a
    /// term is set, otherwise the current page.
    ///
    /// # Errors
    ///
    /// The directory error (or a timeout). Previous users stay visible.
    pub async fn load(&self) -> Result<(), RequestError<ApiError>> {
        let (page, term) = {
            let s = self.state.borrow();
            (s.current_page, s.active_search())
        };
        match term {
            Some(term) => self.run_search(term).await,
            None => self.load_page(page).await,
        }
    }

    /// Reload after an error.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub async fn retry(&self) -> Result<(), RequestError<ApiError>> {
        self.load().await
    }

    /// Jump to `page`, clamped to the known page range.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub async fn set_page(&self, page: u32) -> Result<(), RequestError<ApiError>> {
        let mut changed = false;
        self.state.send_if_modified(|s| {
            let target = page.clamp(1, s.total_pages.max(1));
            changed = target != s.current_page;
            s.current_page = target;
            changed
        });
        if changed { self.load().await } else { Ok(()) }
    }

    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub async fn next_page(&self) -> Result<(), RequestError<ApiError>> {
        let current = self.state.borrow().current_page;
        self.set_page(current.saturating_add(1)).await
    }

    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub async fn previous_page(&self) -> Result<(), RequestError<ApiError>> {
        let current = self.state.borrow().current_page;
        self.set_page(current.saturating_sub(1)).await
    }

    /// Update the search term and go back to page 1. A non-empty term is
    /// searched after the debounce delay unless another change arrives first;
    /// clearing the term reloads the listing immediately.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub async fn set_search_term(&self, term: impl Into<String>) -> Result<(), RequestError<ApiError>> {
        let term = term.into();
        self.state.send_modify(|s| {
            s.search_term.clone_from(&term);
            s.current_page = 1;
        });

        let seq = self.next_seq();
        if term.trim().is_empty() {
            return self.load_page(1).await;
        }
        tokio::time::sleep(self.debounce).await;
        if !self.is_current(seq) {
            tracing::debug!(term = %term, "search superseded during debounce");
            return Ok(());
        }
        self.run_search(term.trim().to_owned()).await
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn state(&self) -> UsersState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<UsersState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn loading(&self) -> bool {
        self.list.loading() || self.search.loading()
    }

    /// Error of the request backing the current mode (search or listing).
    #[must_use]
    pub fn error(&self) -> Option<RequestError<ApiError>> {
        let searching = self.state.borrow().active_search().is_some();
        if searching { self.search.error() } else { self.list.error() }
    }

    #[must_use]
    pub fn list_request(&self) -> &Request<PaginationParams, Paginated<User>, ApiError> {
        &self.list
    }

    #[must_use]
    pub fn search_request(&self) -> &Request<String, Vec<User>, ApiError> {
        &self.search
    }

    // -------------------------------------------------------------------------
    // Loads
    // -------------------------------------------------------------------------

    fn next_seq(&self) -> u64 {
        self.load_seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, seq: u64) -> bool {
        self.load_seq.load(Ordering::SeqCst) == seq
    }

    async fn load_page(&self, page: u32) -> Result<(), RequestError<ApiError>> {
        let seq = self.next_seq();
        let params = PaginationParams::new(page, self.page_size).sorted(SORT_FIELD, SortOrder::Desc);
        let result = self.list.execute(params).await?;
        if self.is_current(seq) {
            self.state.send_modify(|s| {
                s.total_pages = result.pagination.total_pages;
                s.current_page = s.current_page.clamp(1, s.total_pages.max(1));
                s.users = result.data;
            });
        }
        Ok(())
    }

    async fn run_search(&self, term: String) -> Result<(), RequestError<ApiError>> {
        let seq = self.next_seq();
        let users = self.search.execute(term).await?;
        if self.is_current(seq) {
            self.state.send_modify(|s| {
                s.users = users;
                s.total_pages = 1;
            });
        }
        Ok(())
    }
}
