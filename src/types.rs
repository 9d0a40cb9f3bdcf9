//! Core data types shared across the router, context, and engine.
//!
//! These are the plain-data building blocks the rest of the crate is built
//! from: the closed [`Method`] set, an ordered case-insensitive [`Headers`]
//! multi-map, the [`Response`] and [`Error`] types every pipeline eventually
//! produces, and the [`Effect`] tagged union that reifies side effects as
//! data so the engine never performs I/O itself.

use std::fmt;

/// The closed set of HTTP methods this orchestrator understands.
///
/// Anything outside this set is rejected by the upstream request parser
/// (out of scope, see spec §6) before it reaches the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Patch,
}

impl Method {
    /// All methods in a stable, canonical order.
    ///
    /// Used by [`crate::router::Router::allowed_methods`] to produce a
    /// deterministic `Allow` header ordering (spec §8, property 8).
    pub const ALL: [Method; 9] = [
        Method::Get,
        Method::Head,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Connect,
        Method::Options,
        Method::Trace,
        Method::Patch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Patch => "PATCH",
        }
    }

    pub fn from_str(s: &str) -> Option<Method> {
        Some(match s.to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "CONNECT" => Method::Connect,
            "OPTIONS" => Method::Options,
            "TRACE" => Method::Trace,
            "PATCH" => Method::Patch,
            _ => return None,
        })
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An ordered, case-insensitive-by-name multi-map of header pairs.
///
/// Repetition is preserved: `get` returns the first matching value, `get_all`
/// returns every value for the name in insertion order. Name comparison is
/// case-insensitive per spec §3; the stored name keeps its original case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The body of a [`Response`].
///
/// `Complete`'s byte length is the authoritative content length (spec §3
/// invariant); `Streaming` defers chunk production to a downstream-supplied
/// writer that the core never inspects.
pub enum Body {
    Complete(Vec<u8>),
    Streaming(Box<dyn StreamBody>),
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Complete(b) => f.debug_tuple("Complete").field(&b.len()).finish(),
            Body::Streaming(_) => f.write_str("Streaming(..)"),
        }
    }
}

/// A downstream-supplied producer of body chunks for a streaming [`Response`].
///
/// The core never calls this itself; it is threaded through to the
/// response-rendering downstream contract (spec §6) unexamined.
pub trait StreamBody: Send {
    fn next_chunk(&mut self) -> Option<Vec<u8>>;
}

/// An HTTP response produced by a step, a continuation, or the error renderer.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: Body,
}

impl Response {
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        let mut headers = Headers::new();
        headers.push("content-type", "application/json");
        Response {
            status,
            headers,
            body: Body::Complete(serde_json::to_vec(value).unwrap_or_default()),
        }
    }

    pub fn empty(status: u16) -> Self {
        Response {
            status,
            headers: Headers::new(),
            body: Body::Complete(Vec::new()),
        }
    }
}

/// The closed error taxonomy, mapped 1:1 to an HTTP status (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    Conflict,
    TooManyRequests,
    UpstreamUnavailable,
    Timeout,
    InternalServerError,
}

impl ErrorKind {
    pub fn status(self) -> u16 {
        match self {
            ErrorKind::InvalidInput => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::MethodNotAllowed => 405,
            ErrorKind::Conflict => 409,
            ErrorKind::TooManyRequests => 429,
            ErrorKind::UpstreamUnavailable => 502,
            ErrorKind::Timeout => 504,
            ErrorKind::InternalServerError => 500,
        }
    }
}

/// Context attached to an [`Error`]: which domain failed, and on what.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorCtx {
    pub what: String,
    pub key: String,
}

impl ErrorCtx {
    pub fn new(what: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            key: key.into(),
        }
    }
}

/// A per-request failure: a status-mapped `kind` plus diagnostic `ctx`.
///
/// `ctx.key`/`ctx.what` are diagnostic only — the error renderer (spec §4.4)
/// must not leak them verbatim into response bodies by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub ctx: ErrorCtx,
}

impl Error {
    pub fn new(kind: ErrorKind, what: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            kind,
            ctx: ErrorCtx::new(what, key),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {}/{}",
            self.kind.status(),
            self.kind_name(),
            self.ctx.what,
            self.ctx.key
        )
    }
}

impl Error {
    fn kind_name(&self) -> &'static str {
        match self.kind {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::MethodNotAllowed => "method_not_allowed",
            ErrorKind::Conflict => "conflict",
            ErrorKind::TooManyRequests => "too_many_requests",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::InternalServerError => "internal_server_error",
        }
    }
}

impl std::error::Error for Error {}

/// Retry intent carried on an [`Effect`]. The core declares it; it does not
/// execute retries itself (spec §1 Non-goals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    pub max: u8,
}

/// Fields common to every [`Effect`] variant.
#[derive(Debug, Clone)]
pub struct EffectMeta {
    /// Destination slot for the effect's result bytes.
    pub token: u32,
    pub timeout_ms: u32,
    pub retry: RetryPolicy,
    /// A failed required effect fails the enclosing `Need` (spec §4.3).
    pub required: bool,
}

impl EffectMeta {
    pub fn new(token: u32) -> Self {
        Self {
            token,
            timeout_ms: 0,
            retry: RetryPolicy::default(),
            required: true,
        }
    }

    pub fn timeout_ms(mut self, ms: u32) -> Self {
        self.timeout_ms = ms;
        self
    }

    pub fn retry(mut self, max: u8) -> Self {
        self.retry = RetryPolicy { max };
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// A declarative I/O request. Effects are data; the externally supplied
/// [`crate::engine::effect::EffectHandler`] dispatches on the variant (spec
/// §9 design note: avoid trait-object dispatch on this hot path).
#[derive(Debug, Clone)]
pub enum Effect {
    HttpGet {
        meta: EffectMeta,
        url: String,
    },
    HttpPost {
        meta: EffectMeta,
        url: String,
        idempotency_key: Option<String>,
    },
    DbGet {
        meta: EffectMeta,
        key: String,
    },
    DbPut {
        meta: EffectMeta,
        key: String,
        idempotency_key: Option<String>,
    },
    DbDel {
        meta: EffectMeta,
        key: String,
    },
    DbScan {
        meta: EffectMeta,
        prefix: String,
    },
    FileJsonRead {
        meta: EffectMeta,
        path: String,
    },
    FileJsonWrite {
        meta: EffectMeta,
        path: String,
        idempotency_key: Option<String>,
    },
}

impl Effect {
    pub fn meta(&self) -> &EffectMeta {
        match self {
            Effect::HttpGet { meta, .. }
            | Effect::HttpPost { meta, .. }
            | Effect::DbGet { meta, .. }
            | Effect::DbPut { meta, .. }
            | Effect::DbDel { meta, .. }
            | Effect::DbScan { meta, .. }
            | Effect::FileJsonRead { meta, .. }
            | Effect::FileJsonWrite { meta, .. } => meta,
        }
    }

    pub fn token(&self) -> u32 {
        self.meta().token
    }

    pub fn required(&self) -> bool {
        self.meta().required
    }

    /// The target string for telemetry (`effect_start.target`, spec §4.5) —
    /// the URL, DB key/prefix, or file path, whichever the variant carries.
    pub fn target(&self) -> &str {
        match self {
            Effect::HttpGet { url, .. } | Effect::HttpPost { url, .. } => url,
            Effect::DbGet { key, .. } | Effect::DbPut { key, .. } | Effect::DbDel { key, .. } => {
                key
            }
            Effect::DbScan { prefix, .. } => prefix,
            Effect::FileJsonRead { path, .. } | Effect::FileJsonWrite { path, .. } => path,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Effect::HttpGet { .. } => "http_get",
            Effect::HttpPost { .. } => "http_post",
            Effect::DbGet { .. } => "db_get",
            Effect::DbPut { .. } => "db_put",
            Effect::DbDel { .. } => "db_del",
            Effect::DbScan { .. } => "db_scan",
            Effect::FileJsonRead { .. } => "file_json_read",
            Effect::FileJsonWrite { .. } => "file_json_write",
        }
    }
}

/// Whether effects within a `Need` are declared to run in parallel or in
/// sequence. The MVP executes both modes sequentially (spec §4.3, §9 open
/// question) — `mode` is retained for telemetry and for a future scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Parallel,
    Sequential,
}

/// The policy deciding when a `Need` resumes its continuation (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    All,
    AllRequired,
    Any,
    /// Resume on first success; fails the pipeline once every required
    /// effect has failed without a success. This is the MVP's "resume
    /// unless a required effect has failed" reading, not the strict
    /// first-success-wins semantics the name implies (spec §9 open
    /// question; resolved in DESIGN.md).
    FirstSuccess,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_round_trips_through_str() {
        for m in Method::ALL {
            assert_eq!(Method::from_str(m.as_str()), Some(m));
        }
    }

    #[test]
    fn method_from_str_is_case_insensitive() {
        assert_eq!(Method::from_str("get"), Some(Method::Get));
        assert_eq!(Method::from_str("Get"), Some(Method::Get));
    }

    #[test]
    fn method_from_str_rejects_unknown() {
        assert_eq!(Method::from_str("FETCH"), None);
    }

    #[test]
    fn headers_get_is_case_insensitive_and_first_wins() {
        let mut h = Headers::new();
        h.push("X-Trace", "a");
        h.push("x-trace", "b");
        assert_eq!(h.get("X-TRACE"), Some("a"));
        assert_eq!(h.get_all("x-trace"), vec!["a", "b"]);
    }

    #[test]
    fn error_kind_status_mapping() {
        assert_eq!(ErrorKind::UpstreamUnavailable.status(), 502);
        assert_eq!(ErrorKind::InternalServerError.status(), 500);
        assert_eq!(ErrorKind::NotFound.status(), 404);
    }

    #[test]
    fn effect_meta_builder() {
        let meta = EffectMeta::new(3).timeout_ms(500).retry(2).optional();
        assert_eq!(meta.token, 3);
        assert_eq!(meta.timeout_ms, 500);
        assert_eq!(meta.retry.max, 2);
        assert!(!meta.required);
    }

    #[test]
    fn effect_accessors_dispatch_by_variant() {
        let e = Effect::DbGet {
            meta: EffectMeta::new(1),
            key: "users/1".into(),
        };
        assert_eq!(e.token(), 1);
        assert_eq!(e.target(), "users/1");
        assert_eq!(e.kind_name(), "db_get");
        assert!(e.required());
    }
}
