//! Shared error-classification trait.
//!
//! Views render errors generically: a stable machine code, the display
//! message, and whether offering a retry makes sense.

/// Machine-readable classification implemented by every public error type.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

impl ErrorCode for std::convert::Infallible {
    fn error_code(&self) -> &'static str {
        match *self {}
    }
}
