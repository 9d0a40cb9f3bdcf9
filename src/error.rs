//! `AppError` — the ambient, setup-time error type.
//!
//! Distinct from [`crate::types::Error`], which is the *per-request* failure
//! a step or effect produces and which the engine stores in
//! [`crate::context::Context::last_error`]. `AppError` is returned from
//! fallible setup APIs — route registration, pattern compilation, engine
//! configuration loading — and is never constructed on the request hot path
//! (spec §7, "Ambient error handling").

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AppError {
    /// A route pattern used `*` somewhere other than the final segment, or
    /// declared a wildcard/param with an empty name (spec §4.1).
    #[error("invalid route pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// `add_route` was called with a `(method, pattern)` pair that is
    /// already registered. This implementation's registration policy is
    /// "error", not "latest wins" (spec §9 open question; see DESIGN.md).
    #[error("route {method} {pattern:?} is already registered")]
    DuplicateRoute { method: String, pattern: String },

    /// An `EngineConfig` environment variable was set but failed to parse,
    /// or was set to a value outside its valid range (spec §7.1).
    #[error("invalid configuration for {variable}: {reason}")]
    InvalidConfig { variable: String, reason: String },

    /// `add_flow` was called with a `slug` that is already registered.
    #[error("flow {slug:?} is already registered")]
    DuplicateFlow { slug: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pattern_display() {
        let err = AppError::InvalidPattern {
            pattern: "/files/*a/b".into(),
            reason: "wildcard must be the last segment".into(),
        };
        assert!(err.to_string().contains("wildcard must be the last segment"));
    }

    #[test]
    fn duplicate_route_display() {
        let err = AppError::DuplicateRoute {
            method: "GET".into(),
            pattern: "/todos".into(),
        };
        assert!(err.to_string().contains("GET"));
        assert!(err.to_string().contains("/todos"));
    }
}
