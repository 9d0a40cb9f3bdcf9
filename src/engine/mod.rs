//! Step execution, effect scheduling, join policies, and crash containment
//! (spec §4.3).
//!
//! # Module organization
//!
//! - [`effect`] — the effect-handler consumer contract
//! - [`telemetry`] — the lifecycle event stream and its default subscriber
//!
//! [`Engine`] owns a [`Router`] of [`RouteSpec`], a global-before chain, and
//! the three host-supplied collaborators ([`EffectHandler`], an
//! [`crate::error_render::ErrorRenderer`], a [`Telemetry`] subscriber).
//! `handle` is the single entry point: it drives one request from admission
//! to a rendered [`Response`].

pub mod effect;
pub mod telemetry;

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use ahash::AHashMap;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::context::arena::Arena;
use crate::context::{Context, ParsedRequest};
use crate::error::AppError;
use crate::error_render::ErrorRenderer;
use crate::router::Router;
use crate::types::{Effect, Error, ErrorKind, Join, Method, Mode, Response};
use effect::{EffectHandler, EffectResult};
use telemetry::{Event, Layer, Sequencer, StepOutcome, Telemetry, now_ms};

/// The outcome of one step, continuation, or the synthesized default when a
/// step sequence runs out without reaching a terminal decision.
pub enum Decision {
    Continue,
    Need(Need),
    Done(Response),
    Fail(Error),
}

/// A suspension: the effects to run, how to join them, and the continuation
/// to resume once the join condition is satisfied.
pub struct Need {
    pub effects: Vec<Effect>,
    pub mode: Mode,
    pub join: Join,
    pub continuation: Box<dyn Continuation>,
}

impl Need {
    pub fn new(effects: Vec<Effect>, mode: Mode, join: Join, continuation: Box<dyn Continuation>) -> Self {
        Self {
            effects,
            mode,
            join,
            continuation,
        }
    }
}

/// A resumption callback invoked after a `Need`'s effects settle (spec §9
/// design note: boxed trait object over function pointer + opaque data,
/// since closures are ergonomic here and the core never needs to inspect a
/// continuation's captured state).
pub trait Continuation: Send {
    fn resume(&mut self, ctx: &mut Context<'_>) -> Decision;

    /// Used only for telemetry (`step_start`/`step_end` with
    /// `layer = Continuation`). Override for a more specific name.
    fn name(&self) -> &str {
        "continuation"
    }
}

/// A single unit of pipeline logic: takes the context, returns a `Decision`.
///
/// `reads`/`writes` are the slot-token sets the step is declared to touch;
/// `call` typically builds a [`crate::context::slots::View`] from them via
/// [`Step::view`] before touching any slot.
pub struct Step {
    pub name: String,
    pub call: Box<dyn Fn(&mut Context<'_>) -> Decision + Send + Sync>,
    pub reads: Vec<u32>,
    pub writes: Vec<u32>,
}

impl Step {
    pub fn new(
        name: impl Into<String>,
        reads: Vec<u32>,
        writes: Vec<u32>,
        call: impl Fn(&mut Context<'_>) -> Decision + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            call: Box::new(call),
            reads,
            writes,
        }
    }

    pub fn view(&self) -> crate::context::slots::View {
        crate::context::slots::View::new(self.reads.clone(), self.writes.clone())
    }
}

/// `{before, steps}` registered against a `(method, pattern)` route (spec
/// §3). The first element of `steps` runs only once every `before` step has
/// returned `Continue`.
pub struct RouteSpec {
    pub before: Vec<Step>,
    pub steps: Vec<Step>,
}

impl RouteSpec {
    pub fn new(before: Vec<Step>, steps: Vec<Step>) -> Self {
        Self { before, steps }
    }
}

/// Same shape as [`RouteSpec`] plus a `slug`, for named step groups a
/// continuation can look up and resume by name rather than embedding inline
/// (see [`Engine::add_flow`] / [`Engine::flow`]).
pub struct FlowSpec {
    pub slug: String,
    pub before: Vec<Step>,
    pub steps: Vec<Step>,
}

impl FlowSpec {
    pub fn new(slug: impl Into<String>, before: Vec<Step>, steps: Vec<Step>) -> Self {
        Self {
            slug: slug.into(),
            before,
            steps,
        }
    }
}

/// Drives one request from router match through step execution to a
/// rendered [`Response`]. Constructed once at host startup and shared (it is
/// `Send + Sync` as long as its collaborators are) across worker threads;
/// registration (`add_route`, `use_before`) must happen before any `handle`
/// call, per the router's own concurrency contract (spec §5).
pub struct Engine {
    router: Router<RouteSpec>,
    global_before: Vec<Step>,
    flows: AHashMap<String, FlowSpec>,
    effect_handler: Box<dyn EffectHandler>,
    error_renderer: Box<dyn ErrorRenderer>,
    telemetry: Box<dyn Telemetry>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        effect_handler: Box<dyn EffectHandler>,
        error_renderer: Box<dyn ErrorRenderer>,
        telemetry: Box<dyn Telemetry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            router: Router::new(),
            global_before: Vec::new(),
            flows: AHashMap::default(),
            effect_handler,
            error_renderer,
            telemetry,
            config,
        }
    }

    /// Appends to the global-before chain, run ahead of every route's own
    /// `before` steps (spec §6, `use(middleware)`).
    pub fn use_before(&mut self, steps: Vec<Step>) {
        self.global_before.extend(steps);
    }

    /// Registers a named [`FlowSpec`] a continuation can later resolve by
    /// slug via [`Engine::flow`]. Rejects a slug that is already registered,
    /// matching `add_route`'s duplicate-registration policy.
    pub fn add_flow(&mut self, flow: FlowSpec) -> Result<(), AppError> {
        if self.flows.contains_key(&flow.slug) {
            return Err(AppError::DuplicateFlow { slug: flow.slug });
        }
        self.flows.insert(flow.slug.clone(), flow);
        Ok(())
    }

    /// Looks up a previously registered flow by slug.
    pub fn flow(&self, slug: &str) -> Option<&FlowSpec> {
        self.flows.get(slug)
    }

    pub fn add_route(
        &mut self,
        method: Method,
        pattern: &str,
        spec: RouteSpec,
    ) -> Result<(), AppError> {
        self.router.add_route(method, pattern, spec)
    }

    /// Runs one request to completion: router match, step sequence, effect
    /// scheduling, error rendering. Never panics — step/continuation panics
    /// are contained and converted to a 500 (spec §4.3).
    pub fn handle(&self, req: ParsedRequest) -> Response {
        let method = req.method;
        let path = req.path.clone();
        let arena = Arena::new();
        let mut ctx = Context::new(&arena, req);
        let request_id = ctx.request_id();
        let request_started = Instant::now();

        self.telemetry.emit(Event::RequestStart {
            request_id,
            method,
            path: path.clone(),
            timestamp_ms: now_ms(),
        });

        let seq = Sequencer::new();
        let mut depth = 0u32;

        let terminal = match self.router.match_route(method, &path) {
            Some(matched) => {
                ctx.set_params(matched.params);
                let global_before: Vec<&Step> = self.global_before.iter().collect();
                let route_before: Vec<&Step> = matched.handler.before.iter().collect();
                let main_steps: Vec<&Step> = matched.handler.steps.iter().collect();

                self.run_sequence(&global_before, Layer::GlobalBefore, &mut ctx, &seq, &mut depth, request_id)
                    .or_else(|| {
                        self.run_sequence(&route_before, Layer::RouteBefore, &mut ctx, &seq, &mut depth, request_id)
                    })
                    .or_else(|| {
                        self.run_sequence(&main_steps, Layer::Main, &mut ctx, &seq, &mut depth, request_id)
                    })
                    .unwrap_or_else(|| Decision::Done(Response::empty(200)))
            }
            None => {
                let allowed = self.router.allowed_methods(&path);
                let other_method_registered = allowed.iter().any(|m| *m != Method::Options);
                if other_method_registered {
                    Decision::Fail(Error::new(ErrorKind::MethodNotAllowed, "router", path.clone()))
                } else {
                    Decision::Fail(Error::new(ErrorKind::NotFound, "router", path.clone()))
                }
            }
        };

        let response = self.finalize(terminal, &mut ctx, request_id);

        self.telemetry.emit(Event::RequestEnd {
            request_id,
            status: response.status,
            outcome: if response.status < 400 { "success" } else { "failure" },
            duration_ms: request_started.elapsed().as_millis() as u64,
            error_ctx: ctx.last_error().map(|e| e.ctx.clone()),
        });

        response
    }

    /// Runs `steps` in order. Returns `None` if every step returned
    /// `Continue` (the caller should proceed to the next layer); `Some`
    /// carries the first terminal `Decision` (`Done`/`Fail`, or a `Need`
    /// fully resolved to one of those).
    fn run_sequence(
        &self,
        steps: &[&Step],
        layer: Layer,
        ctx: &mut Context<'_>,
        seq: &Sequencer,
        depth: &mut u32,
        request_id: Uuid,
    ) -> Option<Decision> {
        for step in steps {
            let sequence = seq.next();
            let started = Instant::now();
            self.telemetry.emit(Event::StepStart {
                request_id,
                name: step.name.clone(),
                layer,
                sequence,
                timestamp_ms: now_ms(),
            });

            let raw = self.invoke_step(step, ctx, request_id);
            let immediate_outcome = StepOutcome::from(&raw);
            let resolved = self.resolve_decision(raw, ctx, seq, depth, request_id);

            self.telemetry.emit(Event::StepEnd {
                request_id,
                name: step.name.clone(),
                layer,
                sequence,
                outcome: immediate_outcome,
                duration_ms: started.elapsed().as_millis() as u64,
            });

            match resolved {
                Decision::Continue => continue,
                terminal => return Some(terminal),
            }
        }
        None
    }

    fn invoke_step(&self, step: &Step, ctx: &mut Context<'_>, request_id: Uuid) -> Decision {
        let call = &step.call;
        let reborrowed: &mut Context<'_> = &mut *ctx;
        match std::panic::catch_unwind(AssertUnwindSafe(move || (call)(reborrowed))) {
            Ok(decision) => decision,
            Err(payload) => {
                let error_name = panic_message(&payload);
                self.telemetry.emit(Event::ExecutorCrash {
                    request_id,
                    phase: "step",
                    error_name: error_name.clone(),
                });
                let err = Error::new(ErrorKind::InternalServerError, "step", error_name);
                ctx.set_last_error(err.clone());
                ctx.set_status_code(500);
                Decision::Fail(err)
            }
        }
    }

    /// Resolves a `Decision` to a non-`Need` terminal, recursively running
    /// `Need`s through effect scheduling and continuation resumption until
    /// one does (spec §4.3). Aborts with `InternalServerError` once the
    /// configured recursion bound is exceeded.
    fn resolve_decision(
        &self,
        mut decision: Decision,
        ctx: &mut Context<'_>,
        seq: &Sequencer,
        depth: &mut u32,
        request_id: Uuid,
    ) -> Decision {
        loop {
            match decision {
                Decision::Need(need) => {
                    *depth += 1;
                    if *depth > self.config.max_depth {
                        let err = Error::new(
                            ErrorKind::InternalServerError,
                            "engine",
                            "recursion_bound_exceeded",
                        );
                        ctx.set_last_error(err.clone());
                        ctx.set_status_code(500);
                        return Decision::Fail(err);
                    }
                    decision = self.run_need(need, ctx, seq, request_id);
                }
                other => return other,
            }
        }
    }

    /// Schedules a `Need`'s effects per its join policy, then invokes its
    /// continuation unless a required effect failed. Returns the
    /// continuation's raw `Decision` (itself possibly another `Need`) —
    /// the caller's `resolve_decision` loop continues from there.
    fn run_need(&self, need: Need, ctx: &mut Context<'_>, seq: &Sequencer, request_id: Uuid) -> Decision {
        let need_sequence = seq.next();
        self.telemetry.emit(Event::NeedScheduled {
            request_id,
            sequence: need_sequence,
            effect_count: need.effects.len(),
            mode: need.mode,
            join: need.join,
        });

        let required_total = need.effects.iter().filter(|e| e.required()).count();
        let mut required_seen = 0usize;
        let mut required_failed = 0usize;
        let mut first_required_error: Option<Error> = None;

        for effect in &need.effects {
            let effect_sequence = seq.next();
            let timeout_ms = effective_timeout_ms(effect, &self.config);

            self.telemetry.emit(Event::EffectStart {
                request_id,
                sequence: effect_sequence,
                need_sequence,
                kind: effect.kind_name(),
                token: effect.token(),
                required: effect.required(),
                mode: need.mode,
                join: need.join,
                timeout_ms,
                target: effect.target().to_string(),
                timestamp_ms: now_ms(),
            });

            let started = Instant::now();
            let result = self.effect_handler.handle(effect, timeout_ms);
            let duration_ms = started.elapsed().as_millis() as u64;
            let success = matches!(result, EffectResult::Success { .. });

            match result {
                EffectResult::Success { bytes, dealloc } => {
                    let len = bytes.len();
                    match dealloc {
                        Some(d) => ctx.slots_mut().write_external(effect.token(), bytes.into_boxed_slice(), d),
                        None => ctx.slots_mut().write(effect.token(), &bytes),
                    }
                    self.telemetry.emit(Event::EffectEnd {
                        request_id,
                        sequence: effect_sequence,
                        need_sequence,
                        kind: effect.kind_name(),
                        token: effect.token(),
                        required: effect.required(),
                        success: true,
                        duration_ms,
                        bytes_len: Some(len),
                        error_ctx: None,
                    });
                    if effect.required() {
                        required_seen += 1;
                    }
                }
                EffectResult::Failure(err) => {
                    self.telemetry.emit(Event::EffectEnd {
                        request_id,
                        sequence: effect_sequence,
                        need_sequence,
                        kind: effect.kind_name(),
                        token: effect.token(),
                        required: effect.required(),
                        success: false,
                        duration_ms,
                        bytes_len: None,
                        error_ctx: Some(err.ctx.clone()),
                    });
                    if effect.required() {
                        required_seen += 1;
                        required_failed += 1;
                        if first_required_error.is_none() {
                            first_required_error = Some(err.clone());
                        }
                        ctx.set_last_error(err);
                    }
                }
            }

            let resume_now = match need.join {
                Join::All => false,
                Join::AllRequired => required_total > 0 && required_seen >= required_total,
                Join::Any => true,
                Join::FirstSuccess => {
                    (success && effect.required())
                        || (required_total > 0 && required_failed >= required_total)
                }
            };
            if resume_now {
                break;
            }
        }

        if required_failed > 0 {
            return Decision::Fail(first_required_error.expect("recorded alongside required_failed"));
        }

        self.invoke_continuation(need.continuation, need.mode, need.join, need_sequence, ctx, seq, request_id)
    }

    fn invoke_continuation(
        &self,
        continuation: Box<dyn Continuation>,
        mode: Mode,
        join: Join,
        need_sequence: u64,
        ctx: &mut Context<'_>,
        seq: &Sequencer,
        request_id: Uuid,
    ) -> Decision {
        let resume_ptr = continuation_identity(continuation.as_ref());
        self.telemetry.emit(Event::ContinuationResume {
            request_id,
            need_sequence,
            resume_ptr,
            mode,
            join,
        });

        let sequence = seq.next();
        let started = Instant::now();
        let name = continuation.name().to_string();
        self.telemetry.emit(Event::StepStart {
            request_id,
            name: name.clone(),
            layer: Layer::Continuation,
            sequence,
            timestamp_ms: now_ms(),
        });

        let mut continuation = continuation;
        let reborrowed: &mut Context<'_> = &mut *ctx;
        let raw = match std::panic::catch_unwind(AssertUnwindSafe(move || continuation.resume(reborrowed))) {
            Ok(decision) => decision,
            Err(payload) => {
                let error_name = panic_message(&payload);
                self.telemetry.emit(Event::ExecutorCrash {
                    request_id,
                    phase: "continuation",
                    error_name: error_name.clone(),
                });
                let err = Error::new(ErrorKind::InternalServerError, "continuation", error_name);
                ctx.set_last_error(err.clone());
                ctx.set_status_code(500);
                Decision::Fail(err)
            }
        };

        self.telemetry.emit(Event::StepEnd {
            request_id,
            name,
            layer: Layer::Continuation,
            sequence,
            outcome: StepOutcome::from(&raw),
            duration_ms: started.elapsed().as_millis() as u64,
        });

        raw
    }

    fn finalize(&self, decision: Decision, ctx: &mut Context<'_>, request_id: Uuid) -> Response {
        match decision {
            Decision::Done(resp) => {
                ctx.set_status_code(resp.status);
                resp
            }
            Decision::Fail(err) => {
                ctx.set_status_code(err.kind.status());
                ctx.set_last_error(err);
                match self.error_renderer.render(ctx) {
                    Decision::Done(resp) => resp,
                    _ => {
                        self.telemetry.emit(Event::ExecutorCrash {
                            request_id,
                            phase: "error_renderer",
                            error_name: "renderer_did_not_return_done".to_string(),
                        });
                        Response::empty(500)
                    }
                }
            }
            Decision::Continue | Decision::Need(_) => {
                unreachable!("run_sequence/resolve_decision never hand a non-terminal Decision to finalize")
            }
        }
    }
}

fn effective_timeout_ms(effect: &Effect, config: &EngineConfig) -> u32 {
    let declared = effect.meta().timeout_ms;
    if declared == 0 {
        config.default_timeout_ms
    } else {
        declared
    }
}

fn continuation_identity(continuation: &dyn Continuation) -> u64 {
    let ptr = continuation as *const dyn Continuation as *const () as usize;
    ptr as u64
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ParsedRequest;
    use crate::error_render::DefaultErrorRenderer;
    use crate::types::{EffectMeta, Headers};
    use telemetry::LogTelemetry;

    struct EchoHandler;
    impl EffectHandler for EchoHandler {
        fn handle(&self, _effect: &Effect, _timeout_ms: u32) -> EffectResult {
            EffectResult::success(b"ok".to_vec())
        }
    }

    struct FailingHandler;
    impl EffectHandler for FailingHandler {
        fn handle(&self, _effect: &Effect, _timeout_ms: u32) -> EffectResult {
            EffectResult::failure(Error::new(ErrorKind::UpstreamUnavailable, "effect", "db"))
        }
    }

    fn test_request(method: Method, path: &str) -> ParsedRequest {
        ParsedRequest {
            method,
            path: path.to_string(),
            headers: Headers::new(),
            query: Vec::new(),
            body: Vec::new(),
            client_ip: "127.0.0.1".into(),
        }
    }

    fn engine_with(handler: Box<dyn EffectHandler>) -> Engine {
        Engine::new(
            handler,
            Box::new(DefaultErrorRenderer),
            Box::new(LogTelemetry),
            EngineConfig::default(),
        )
    }

    #[test]
    fn happy_path_runs_every_step_and_returns_done() {
        let mut engine = engine_with(Box::new(EchoHandler));
        let steps = vec![
            Step::new("list_todos", vec![], vec![], |_ctx| Decision::Continue),
            Step::new("render_list", vec![], vec![], |_ctx| {
                Decision::Done(Response::json(200, &serde_json::json!({"data": [], "total": 0})))
            }),
        ];
        engine
            .add_route(Method::Get, "/todos", RouteSpec::new(vec![], steps))
            .unwrap();

        let resp = engine.handle(test_request(Method::Get, "/todos"));
        assert_eq!(resp.status, 200);
    }

    #[test]
    fn param_extraction_binds_id_into_context() {
        let mut engine = engine_with(Box::new(EchoHandler));
        let steps = vec![Step::new("echo_id", vec![], vec![], |ctx| {
            assert_eq!(ctx.param("id"), Some("abc"));
            Decision::Done(Response::empty(200))
        })];
        engine
            .add_route(Method::Get, "/todos/:id", RouteSpec::new(vec![], steps))
            .unwrap();

        let resp = engine.handle(test_request(Method::Get, "/todos/abc"));
        assert_eq!(resp.status, 200);
    }

    struct NoopContinuation;
    impl Continuation for NoopContinuation {
        fn resume(&mut self, _ctx: &mut Context<'_>) -> Decision {
            Decision::Done(Response::empty(200))
        }
    }

    #[test]
    fn required_effect_failure_skips_continuation_and_fails_with_502() {
        let mut engine = engine_with(Box::new(FailingHandler));
        let steps = vec![Step::new("fetch", vec![], vec![], |_ctx| {
            Decision::Need(Need::new(
                vec![Effect::DbGet {
                    meta: EffectMeta::new(1),
                    key: "x".into(),
                }],
                Mode::Sequential,
                Join::All,
                Box::new(NoopContinuation),
            ))
        })];
        engine
            .add_route(Method::Get, "/needs-db", RouteSpec::new(vec![], steps))
            .unwrap();

        let resp = engine.handle(test_request(Method::Get, "/needs-db"));
        assert_eq!(resp.status, 502);
    }

    #[test]
    fn successful_effect_resumes_continuation_with_slot_populated() {
        let mut engine = engine_with(Box::new(EchoHandler));
        struct AssertSlotContinuation;
        impl Continuation for AssertSlotContinuation {
            fn resume(&mut self, ctx: &mut Context<'_>) -> Decision {
                assert_eq!(ctx.slots().read(1), Some(&b"ok"[..]));
                Decision::Done(Response::empty(200))
            }
        }
        let steps = vec![Step::new("fetch", vec![], vec![1], |_ctx| {
            Decision::Need(Need::new(
                vec![Effect::DbGet {
                    meta: EffectMeta::new(1),
                    key: "x".into(),
                }],
                Mode::Sequential,
                Join::All,
                Box::new(AssertSlotContinuation),
            ))
        })];
        engine
            .add_route(Method::Get, "/ok", RouteSpec::new(vec![], steps))
            .unwrap();

        let resp = engine.handle(test_request(Method::Get, "/ok"));
        assert_eq!(resp.status, 200);
    }

    #[test]
    fn no_route_match_yields_404() {
        let engine = engine_with(Box::new(EchoHandler));
        let resp = engine.handle(test_request(Method::Get, "/nope"));
        assert_eq!(resp.status, 404);
    }

    #[test]
    fn wrong_method_on_known_path_yields_405() {
        let mut engine = engine_with(Box::new(EchoHandler));
        let steps = vec![Step::new("list", vec![], vec![], |_ctx| {
            Decision::Done(Response::empty(200))
        })];
        engine
            .add_route(Method::Get, "/todos", RouteSpec::new(vec![], steps))
            .unwrap();

        let resp = engine.handle(test_request(Method::Post, "/todos"));
        assert_eq!(resp.status, 405);
    }

    #[test]
    fn step_panic_is_contained_and_returns_500() {
        let mut engine = engine_with(Box::new(EchoHandler));
        let steps = vec![Step::new("boom", vec![], vec![], |_ctx| {
            panic!("kaboom");
        })];
        engine
            .add_route(Method::Get, "/boom", RouteSpec::new(vec![], steps))
            .unwrap();

        let resp = engine.handle(test_request(Method::Get, "/boom"));
        assert_eq!(resp.status, 500);
    }

    #[test]
    fn recursion_bound_aborts_infinite_need_chain() {
        struct LoopingContinuation;
        impl Continuation for LoopingContinuation {
            fn resume(&mut self, _ctx: &mut Context<'_>) -> Decision {
                Decision::Need(Need::new(
                    vec![Effect::DbGet {
                        meta: EffectMeta::new(1).optional(),
                        key: "loop".into(),
                    }],
                    Mode::Sequential,
                    Join::All,
                    Box::new(LoopingContinuation),
                ))
            }
        }

        let mut config = EngineConfig::default();
        config.max_depth = 5;
        let mut engine = Engine::new(
            Box::new(EchoHandler),
            Box::new(DefaultErrorRenderer),
            Box::new(LogTelemetry),
            config,
        );
        let steps = vec![Step::new("start_loop", vec![], vec![], |_ctx| {
            Decision::Need(Need::new(
                vec![Effect::DbGet {
                    meta: EffectMeta::new(1).optional(),
                    key: "loop".into(),
                }],
                Mode::Sequential,
                Join::All,
                Box::new(LoopingContinuation),
            ))
        })];
        engine
            .add_route(Method::Get, "/loop", RouteSpec::new(vec![], steps))
            .unwrap();

        let resp = engine.handle(test_request(Method::Get, "/loop"));
        assert_eq!(resp.status, 500);
    }

    #[test]
    fn default_done_is_synthesized_when_every_step_continues() {
        let mut engine = engine_with(Box::new(EchoHandler));
        let steps = vec![Step::new("only_continue", vec![], vec![], |_ctx| {
            Decision::Continue
        })];
        engine
            .add_route(Method::Get, "/falls-through", RouteSpec::new(vec![], steps))
            .unwrap();

        let resp = engine.handle(test_request(Method::Get, "/falls-through"));
        assert_eq!(resp.status, 200);
    }

    #[test]
    fn flow_registers_and_resolves_by_slug() {
        let mut engine = engine_with(Box::new(EchoHandler));
        let steps = vec![Step::new("step_a", vec![], vec![], |_ctx| Decision::Continue)];
        engine.add_flow(FlowSpec::new("onboarding", vec![], steps)).unwrap();

        let flow = engine.flow("onboarding").unwrap();
        assert_eq!(flow.slug, "onboarding");
        assert_eq!(flow.steps.len(), 1);
        assert!(engine.flow("missing").is_none());
    }

    #[test]
    fn duplicate_flow_slug_is_rejected() {
        let mut engine = engine_with(Box::new(EchoHandler));
        engine.add_flow(FlowSpec::new("onboarding", vec![], vec![])).unwrap();

        let err = engine
            .add_flow(FlowSpec::new("onboarding", vec![], vec![]))
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateFlow { .. }));
    }
}
