//! A step-and-effect request orchestrator.
//!
//! The engine drives a matched route's step sequence to a terminal
//! `Decision`, batching declared side effects (HTTP calls, database
//! operations, file I/O) through a host-supplied [`engine::effect::EffectHandler`]
//! rather than performing I/O itself. See [`engine`] for the driver,
//! [`router`] for path matching, and [`context`] for per-request state.
//!
//! # Module organization
//!
//! - [`types`] — shared data types: `Method`, `Headers`, `Response`,
//!   `Error`, `Effect`, `Join`
//! - [`router`] — path pattern compilation and matching
//! - [`context`] — per-request arena, slots, and HTTP accessors
//! - [`engine`] — step execution, effect scheduling, telemetry
//! - [`error_render`] — `Error` → `Response` rendering
//! - [`config`] — environment-sourced engine tunables
//! - [`logging`] — an optional `env_logger` bootstrap for hosts with no
//!   logging opinion of their own
//! - [`error`] — `AppError`, the ambient setup-time error type

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod error_render;
pub mod logging;
pub mod router;
pub mod types;

pub use context::{Context, ParsedRequest};
pub use engine::{Decision, Engine, FlowSpec, Need, RouteSpec, Step};
pub use error::AppError;
pub use router::Router;
pub use types::{Effect, Error, Headers, Join, Method, Mode, Response};
