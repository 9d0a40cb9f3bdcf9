//! Error → Response rendering (spec §4.4).

use serde_json::json;

use crate::context::Context;
use crate::engine::Decision;
use crate::types::{ErrorKind, Response};

/// Supplied by the host; invoked whenever the engine has a `last_error` to
/// render. MUST return `Decision::Done(Response)` — the engine treats any
/// other outcome as a crash (spec §6).
pub trait ErrorRenderer: Send + Sync {
    fn render(&self, ctx: &Context<'_>) -> Decision;
}

/// Maps `kind` to status and emits `{"error": <message>}`. Never forwards
/// `ctx.key`/`ctx.what` verbatim into the body (spec §4.4) — those are
/// diagnostic fields for telemetry and logs, not for clients.
pub struct DefaultErrorRenderer;

impl ErrorRenderer for DefaultErrorRenderer {
    fn render(&self, ctx: &Context<'_>) -> Decision {
        let Some(err) = ctx.last_error() else {
            return Decision::Done(Response::empty(200));
        };
        let message = match err.kind {
            ErrorKind::InvalidInput => "the request could not be validated",
            ErrorKind::Unauthorized => "authentication is required",
            ErrorKind::Forbidden => "the credential is not sufficient",
            ErrorKind::NotFound => "the requested resource was not found",
            ErrorKind::MethodNotAllowed => "the method is not allowed for this route",
            ErrorKind::Conflict => "the request conflicts with the current state",
            ErrorKind::TooManyRequests => "too many requests",
            ErrorKind::UpstreamUnavailable => "an upstream dependency is unavailable",
            ErrorKind::Timeout => "the request timed out",
            ErrorKind::InternalServerError => "an internal error occurred",
        };
        Decision::Done(Response::json(
            err.kind.status(),
            &json!({ "error": message }),
        ))
    }
}
