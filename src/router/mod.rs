//! Segment-based path router.
//!
//! # Module organization
//!
//! - [`pattern`] — `Pattern`/`Segment` compilation and single-pattern matching
//!
//! [`Router`] itself only adds route-table concerns on top: duplicate
//! detection, the priority tie-break between overlapping patterns, and
//! `Allow` header synthesis. It is generic over the handler type `H` so this
//! module has no dependency on [`crate::engine`] — the engine depends on the
//! router, not the other way around.

pub mod pattern;

use ahash::AHashMap;

use crate::error::AppError;
use crate::types::Method;
use pattern::Pattern;

struct RouteEntry<H> {
    method: Method,
    pattern: Pattern,
    raw_pattern: String,
    handler: H,
    order: usize,
}

/// The result of a successful [`Router::match_route`] call.
pub struct Matched<'a, H> {
    pub handler: &'a H,
    pub params: AHashMap<String, String>,
}

/// The route table: every registered `(method, pattern) -> handler` mapping.
///
/// Registration order is preserved and used as the final tie-break in the
/// matching priority function (spec §4.1, §8 property 4).
pub struct Router<H> {
    routes: Vec<RouteEntry<H>>,
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Router<H> {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Compiles `raw_pattern` and registers it for `method`.
    ///
    /// Errors on an invalid pattern ([`AppError::InvalidPattern`]) or on an
    /// exact `(method, pattern string)` collision with an already-registered
    /// route ([`AppError::DuplicateRoute`]) — this implementation's
    /// duplicate registration is rejected outright rather than letting the
    /// later call silently win (see DESIGN.md).
    pub fn add_route(
        &mut self,
        method: Method,
        raw_pattern: &str,
        handler: H,
    ) -> Result<(), AppError> {
        if self
            .routes
            .iter()
            .any(|r| r.method == method && r.raw_pattern == raw_pattern)
        {
            return Err(AppError::DuplicateRoute {
                method: method.to_string(),
                pattern: raw_pattern.to_string(),
            });
        }

        let pattern = Pattern::compile(raw_pattern)?;
        let order = self.routes.len();
        self.routes.push(RouteEntry {
            method,
            pattern,
            raw_pattern: raw_pattern.to_string(),
            handler,
            order,
        });
        Ok(())
    }

    /// Matches `method`/`path` against the table, selecting among every
    /// pattern that matches the path by `(highest literal_count, fewest
    /// params, earliest registration)` (spec §4.1, §8 property 4).
    pub fn match_route(&self, method: Method, path: &str) -> Option<Matched<'_, H>> {
        self.routes
            .iter()
            .filter(|r| r.method == method)
            .filter_map(|r| r.pattern.matches(path).map(|bindings| (r, bindings)))
            .max_by_key(|(r, _)| {
                (
                    r.pattern.literal_count(),
                    std::cmp::Reverse(r.pattern.param_count()),
                    std::cmp::Reverse(r.order),
                )
            })
            .map(|(r, bindings)| Matched {
                handler: &r.handler,
                params: bindings.into_iter().collect(),
            })
    }

    /// The set of methods with at least one pattern matching `path`, for
    /// `Allow` header synthesis on a 405 or an `OPTIONS` request (spec §4.1).
    ///
    /// `OPTIONS` is always included; `HEAD` is included whenever `GET` is
    /// registered for the path, even if no `HEAD` route was registered
    /// explicitly.
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let mut methods: Vec<Method> = self
            .routes
            .iter()
            .filter(|r| r.pattern.matches(path).is_some())
            .map(|r| r.method)
            .collect();

        if methods.contains(&Method::Get) && !methods.contains(&Method::Head) {
            methods.push(Method::Head);
        }
        if !methods.contains(&Method::Options) {
            methods.push(Method::Options);
        }

        methods.sort_by_key(|m| Method::ALL.iter().position(|x| x == m).unwrap());
        methods.dedup();
        methods
    }
}
