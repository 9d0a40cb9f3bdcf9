use std::sync::Arc;
use std::sync::Mutex;

use orchestra_core::config::EngineConfig;
use orchestra_core::context::ParsedRequest;
use orchestra_core::engine::effect::{EffectHandler, EffectResult};
use orchestra_core::engine::telemetry::{Event, Telemetry};
use orchestra_core::error_render::DefaultErrorRenderer;
use orchestra_core::types::{Effect, EffectMeta, Headers};
use orchestra_core::{Context, Decision, Engine, Join, Method, Mode, Need, Response, RouteSpec, Step};

/// Forwards every event to a shared log the test can inspect after `Engine`
/// (which owns its `Telemetry` outright) has been dropped.
struct RecordingTelemetry(Arc<Mutex<Vec<Event>>>);

impl Telemetry for RecordingTelemetry {
    fn emit(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }
}

struct EchoEffectHandler;
impl EffectHandler for EchoEffectHandler {
    fn handle(&self, _effect: &Effect, _timeout_ms: u32) -> EffectResult {
        EffectResult::success(b"ok".to_vec())
    }
}

struct ResumeContinuation;
impl orchestra_core::engine::Continuation for ResumeContinuation {
    fn resume(&mut self, _ctx: &mut Context<'_>) -> Decision {
        Decision::Done(Response::empty(200))
    }
}

fn request() -> ParsedRequest {
    ParsedRequest {
        method: Method::Get,
        path: "/with-effect".to_string(),
        headers: Headers::new(),
        query: Vec::new(),
        body: Vec::new(),
        client_ip: "127.0.0.1".into(),
    }
}

#[test]
fn recorded_events_balance_step_and_effect_frames_in_sequence_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut eng = Engine::new(
        Box::new(EchoEffectHandler),
        Box::new(DefaultErrorRenderer),
        Box::new(RecordingTelemetry(log.clone())),
        EngineConfig::default(),
    );
    let steps = vec![
        Step::new("warm_up", vec![], vec![], |_ctx| Decision::Continue),
        Step::new("fetch", vec![], vec![1], |_ctx| {
            Decision::Need(Need::new(
                vec![Effect::DbGet {
                    meta: EffectMeta::new(1),
                    key: "k".into(),
                }],
                Mode::Sequential,
                Join::All,
                Box::new(ResumeContinuation),
            ))
        }),
    ];
    eng.add_route(Method::Get, "/with-effect", RouteSpec::new(vec![], steps))
        .unwrap();

    let resp = eng.handle(request());
    assert_eq!(resp.status, 200);
    drop(eng);

    let events = Arc::try_unwrap(log).unwrap().into_inner().unwrap();

    let mut step_starts = 0i32;
    let mut step_ends = 0i32;
    let mut effect_starts = 0i32;
    let mut effect_ends = 0i32;
    let mut saw_request_start = false;
    let mut saw_request_end = false;
    let mut saw_need_scheduled = false;
    let mut saw_continuation_resume = false;
    let mut last_sequence: Option<u64> = None;

    for event in &events {
        // Only opening frames draw a fresh sequence number; a StepEnd/EffectEnd
        // shares its opening frame's sequence, so it is excluded here rather
        // than compared with `>`.
        let opening_sequence = match event {
            Event::StepStart { sequence, .. }
            | Event::NeedScheduled { sequence, .. }
            | Event::EffectStart { sequence, .. } => Some(*sequence),
            _ => None,
        };
        if let Some(seq) = opening_sequence {
            if let Some(prev) = last_sequence {
                assert!(seq > prev, "sequence numbers must strictly increase");
            }
            last_sequence = Some(seq);
        }

        match event {
            Event::RequestStart { .. } => saw_request_start = true,
            Event::RequestEnd { .. } => saw_request_end = true,
            Event::StepStart { .. } => step_starts += 1,
            Event::StepEnd { .. } => step_ends += 1,
            Event::EffectStart { .. } => effect_starts += 1,
            Event::EffectEnd { .. } => effect_ends += 1,
            Event::NeedScheduled { .. } => saw_need_scheduled = true,
            Event::ContinuationResume { .. } => saw_continuation_resume = true,
            Event::ExecutorCrash { .. } => panic!("unexpected crash event in a happy-path request"),
        }
    }

    assert!(saw_request_start && saw_request_end);
    assert!(saw_need_scheduled);
    assert!(saw_continuation_resume);
    assert_eq!(step_starts, step_ends, "every step_start must have exactly one step_end");
    assert_eq!(
        effect_starts, effect_ends,
        "every effect_start must have exactly one effect_end"
    );
    assert!(step_starts >= 3, "warm_up, fetch, and the continuation frame each emit a pair");

    assert!(matches!(events.first(), Some(Event::RequestStart { .. })));
    assert!(matches!(events.last(), Some(Event::RequestEnd { .. })));
}

#[test]
fn executor_crash_event_is_emitted_for_a_panicking_step() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut eng = Engine::new(
        Box::new(EchoEffectHandler),
        Box::new(DefaultErrorRenderer),
        Box::new(RecordingTelemetry(log.clone())),
        EngineConfig::default(),
    );
    eng.add_route(
        Method::Get,
        "/boom",
        RouteSpec::new(
            vec![],
            vec![Step::new("boom", vec![], vec![], |_ctx| {
                panic!("deliberate test panic");
            })],
        ),
    )
    .unwrap();

    let resp = eng.handle(ParsedRequest {
        method: Method::Get,
        path: "/boom".to_string(),
        headers: Headers::new(),
        query: Vec::new(),
        body: Vec::new(),
        client_ip: "127.0.0.1".into(),
    });
    assert_eq!(resp.status, 500);
    drop(eng);

    let events = Arc::try_unwrap(log).unwrap().into_inner().unwrap();
    assert!(events.iter().any(|e| matches!(e, Event::ExecutorCrash { .. })));
}
