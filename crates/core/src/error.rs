use std::fmt;

/// A value-carried failure. This travels as ordinary data on a [`crate::Future`]
/// instead of being thrown — continuations translate whatever panics or
/// `Result::Err`s they encounter into one of these before handing it onward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    code: i32,
    message: String,
}

impl Error {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Error { code, message: message.into() }
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

/// The code attached to an [`Error`] synthesized from a caught panic in a
/// `sync`/`syncError` continuation (see [`crate::executor`]).
pub const PANIC_ERROR_CODE: i32 = -1;

pub(crate) fn panic_to_error(payload: Box<dyn std::any::Any + Send>) -> Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "continuation panicked".to_string());
    Error::new(PANIC_ERROR_CODE, message)
}

/// Construction-time misuse the type system can't catch — never raised by
/// correctly-built chains, only by callers breaking one of the linking
/// invariants described on [`crate::job::Job`].
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("this executor already has a predecessor linked")]
    AlreadyLinked,
}
