//! Login form state: field values, per-field errors, and submission.

#[cfg(test)]
#[path = "login_test.rs"]
mod login_test;

use crate::api::LoginRequest;
use crate::error::ErrorCode;
use crate::guard::routes;
use crate::request::RequestError;
use crate::session::SessionError;
use crate::state::AuthController;
use crate::validate::{RuleKind, validate_email, validate_required, validation_message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginField {
    Email,
    Password,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginFormErrors {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginFormErrors {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoginError {
    #[error("login form has invalid fields")]
    InvalidForm(LoginFormErrors),

    #[error(transparent)]
    Rejected(#[from] RequestError<SessionError>),
}

impl ErrorCode for LoginError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidForm(_) => "E_INVALID_FORM",
            Self::Rejected(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::InvalidForm(_) => false,
            Self::Rejected(e) => e.retryable(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub errors: LoginFormErrors,
}

impl LoginForm {
    /// Edit a field. Any error shown for it is cleared.
    pub fn set(&mut self, field: LoginField, value: impl Into<String>) {
        match field {
            LoginField::Email => {
                self.email = value.into();
                self.errors.email = None;
            }
            LoginField::Password => {
                self.password = value.into();
                self.errors.password = None;
            }
        }
    }

    /// Recompute field errors. Returns true when the form can be submitted.
    pub fn validate(&mut self) -> bool {
        let mut errors = LoginFormErrors::default();
        if !validate_required(&self.email) {
            errors.email = Some(validation_message("Email", RuleKind::Required));
        } else if !validate_email(&self.email) {
            errors.email = Some(validation_message("Email", RuleKind::Email));
        }
        if !validate_required(&self.password) {
            errors.password = Some(validation_message("Password", RuleKind::Required));
        }
        self.errors = errors;
        self.errors.is_empty()
    }

    #[must_use]
    pub fn credentials(&self) -> LoginRequest {
        LoginRequest { email: self.email.clone(), password: self.password.clone() }
    }

    /// Validate, then log in. Returns where to navigate next: `from` when the
    /// visitor was redirected here, otherwise the dashboard.
    ///
    /// # Errors
    ///
    /// `InvalidForm` without contacting the backend, or `Rejected` with the
    /// login failure (also visible on the controller's login request).
    pub async fn submit(&mut self, auth: &AuthController, from: Option<&str>) -> Result<String, LoginError> {
        if !self.validate() {
            return Err(LoginError::InvalidForm(self.errors.clone()));
        }
        auth.login(self.credentials()).await?;
        Ok(from.unwrap_or(routes::DASHBOARD).to_owned())
    }
}
