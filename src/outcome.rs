//! Operation outcomes
//!
//! Separates "the server said no" from "the connection dropped and the
//! result is unknown", so callers can decide whether to retry.

/// Result of one typed operation
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The server acknowledged the command
    Success(T),

    /// The server answered with an error or an unexpected reply
    Failed(String),

    /// The socket failed mid-command; the command may or may not have been
    /// applied
    TransportFailure,
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Outcome::TransportFailure)
    }

    /// The value on success, `None` otherwise
    pub fn success(self) -> Option<T> {
        match self {
            Outcome::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Reply text of a server-side failure
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Outcome::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Failed(reason) => Outcome::Failed(reason),
            Outcome::TransportFailure => Outcome::TransportFailure,
        }
    }

    pub fn unwrap_or(self, default: T) -> T {
        self.success().unwrap_or(default)
    }
}

impl<T: Default> Outcome<T> {
    /// The value on success, `T::default()` otherwise (empty list, `()`)
    pub fn unwrap_or_default(self) -> T {
        self.success().unwrap_or_default()
    }
}
