//! Per-request state: arena memory, typed slots, HTTP accessors, and the
//! last-error channel the error renderer reads from.
//!
//! # Module organization
//!
//! - [`arena`] — the request-scoped bump allocator
//! - [`slots`] — the `token -> bytes` map and its typed-view accessors
//!
//! Everything here is owned by exactly one worker for exactly the lifetime
//! of one request (spec §5): no field requires locking.

pub mod arena;
pub mod slots;

use std::cell::Cell;

use ahash::AHashMap;
use uuid::Uuid;

use crate::types::{Error, Headers, Method};
use arena::Arena;
use slots::SlotMap;

/// The upstream-parsed request the engine consumes (spec §6, "Request
/// parsing (upstream contract)"). URL decoding, body assembly, and header
/// validation have already happened by the time this reaches the core.
pub struct ParsedRequest {
    pub method: Method,
    pub path: String,
    pub headers: Headers,
    /// Already key/value split and URL-decoded by the upstream layer.
    pub query: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub client_ip: String,
}

/// Per-request state created at admission and torn down after rendering.
///
/// `params` is populated by the router from the matched [`crate::router::Pattern`]
/// and interned into `arena` on the way in; everything else is derived
/// directly from the [`ParsedRequest`]. The arena itself is owned one level
/// up, by whoever calls [`Context::new`] (see [`crate::engine::Engine::handle`]),
/// and merely borrowed here — a self-referential struct that owned both the
/// arena and references into it would need `unsafe` to express, which this
/// crate forbids (`rustc`'s `TyCtxt<'tcx>` follows the same borrowed-arena
/// shape).
pub struct Context<'arena> {
    arena: &'arena Arena,
    slots: SlotMap<'arena>,
    params: AHashMap<String, &'arena str>,
    query: Vec<(String, String)>,
    headers: Headers,
    method: Method,
    path: String,
    client_ip: String,
    body: Vec<u8>,
    request_id: Cell<Option<Uuid>>,
    last_error: Option<Error>,
    status_code: u16,
}

impl<'arena> Context<'arena> {
    pub fn new(arena: &'arena Arena, req: ParsedRequest) -> Self {
        Self {
            arena,
            slots: SlotMap::new(arena),
            params: AHashMap::default(),
            query: req.query,
            headers: req.headers,
            method: req.method,
            path: req.path,
            client_ip: req.client_ip,
            body: req.body,
            request_id: Cell::new(None),
            last_error: None,
            status_code: 200,
        }
    }

    #[cfg(test)]
    pub fn for_test(method: Method, path: impl Into<String>) -> Context<'static> {
        let arena: &'static Arena = Box::leak(Box::new(Arena::new()));
        Context::new(
            arena,
            ParsedRequest {
                method,
                path: path.into(),
                headers: Headers::new(),
                query: Vec::new(),
                body: Vec::new(),
                client_ip: "127.0.0.1".into(),
            },
        )
    }

    pub fn arena(&self) -> &'arena Arena {
        self.arena
    }

    pub fn slots(&self) -> &SlotMap<'arena> {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut SlotMap<'arena> {
        &mut self.slots
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn query_get(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Called by the router once a match is found; overwrites any previous
    /// bindings (a context is matched at most once). Values are interned
    /// into the request arena rather than kept as heap `String`s (spec §4.1,
    /// "Parameter bindings ... are arena-backed").
    pub fn set_params(&mut self, params: AHashMap<String, String>) {
        self.params = params
            .into_iter()
            .map(|(k, v)| (k, self.arena.alloc_str(&v)))
            .collect();
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).copied()
    }

    pub fn params(&self) -> &AHashMap<String, &'arena str> {
        &self.params
    }

    /// Returns this request's id, generating and caching a UUIDv4 on first
    /// access (spec §4.2).
    pub fn request_id(&self) -> Uuid {
        if let Some(id) = self.request_id.get() {
            return id;
        }
        let id = Uuid::new_v4();
        self.request_id.set(Some(id));
        id
    }

    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    pub fn set_last_error(&mut self, err: Error) {
        self.last_error = Some(err);
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn set_status_code(&mut self, status: u16) {
        self.status_code = status;
    }
}
