//! Engine telemetry: a typed lifecycle event stream (spec §4.5).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::types::{ErrorCtx, Join, Method, Mode};
use super::Decision;

/// Which stage of the pipeline a step/continuation frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    GlobalBefore,
    RouteBefore,
    Main,
    Continuation,
    System,
}

impl Layer {
    fn as_str(self) -> &'static str {
        match self {
            Layer::GlobalBefore => "global_before",
            Layer::RouteBefore => "route_before",
            Layer::Main => "main",
            Layer::Continuation => "continuation",
            Layer::System => "system",
        }
    }
}

/// The immediate outcome of one step or continuation call, before any `Need`
/// it returned has been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Done,
    Fail,
    Need,
}

impl StepOutcome {
    fn as_str(self) -> &'static str {
        match self {
            StepOutcome::Continue => "Continue",
            StepOutcome::Done => "Done",
            StepOutcome::Fail => "Fail",
            StepOutcome::Need => "Need",
        }
    }
}

impl From<&Decision> for StepOutcome {
    fn from(decision: &Decision) -> Self {
        match decision {
            Decision::Continue => StepOutcome::Continue,
            Decision::Done(_) => StepOutcome::Done,
            Decision::Fail(_) => StepOutcome::Fail,
            Decision::Need(_) => StepOutcome::Need,
        }
    }
}

/// One frame of the engine's lifecycle event stream. Every variant carries
/// `request_id` so a subscriber fed events from many concurrent requests can
/// demultiplex them (spec §4.5, §5).
#[derive(Debug, Clone)]
pub enum Event {
    RequestStart {
        request_id: Uuid,
        method: Method,
        path: String,
        timestamp_ms: u64,
    },
    RequestEnd {
        request_id: Uuid,
        status: u16,
        outcome: &'static str,
        duration_ms: u64,
        error_ctx: Option<ErrorCtx>,
    },
    StepStart {
        request_id: Uuid,
        name: String,
        layer: Layer,
        sequence: u64,
        timestamp_ms: u64,
    },
    StepEnd {
        request_id: Uuid,
        name: String,
        layer: Layer,
        sequence: u64,
        outcome: StepOutcome,
        duration_ms: u64,
    },
    NeedScheduled {
        request_id: Uuid,
        sequence: u64,
        effect_count: usize,
        mode: Mode,
        join: Join,
    },
    EffectStart {
        request_id: Uuid,
        sequence: u64,
        need_sequence: u64,
        kind: &'static str,
        token: u32,
        required: bool,
        mode: Mode,
        join: Join,
        timeout_ms: u32,
        target: String,
        timestamp_ms: u64,
    },
    EffectEnd {
        request_id: Uuid,
        sequence: u64,
        need_sequence: u64,
        kind: &'static str,
        token: u32,
        required: bool,
        success: bool,
        duration_ms: u64,
        bytes_len: Option<usize>,
        error_ctx: Option<ErrorCtx>,
    },
    ContinuationResume {
        request_id: Uuid,
        need_sequence: u64,
        resume_ptr: u64,
        mode: Mode,
        join: Join,
    },
    ExecutorCrash {
        request_id: Uuid,
        phase: &'static str,
        error_name: String,
    },
}

/// Receives every [`Event`] the engine emits. MUST be safe for concurrent
/// invocation: distinct workers publish events from distinct requests at the
/// same time (spec §5).
pub trait Telemetry: Send + Sync {
    fn emit(&self, event: Event);
}

/// A per-request monotonic sequence counter (spec §4.5, §8 property 7).
pub struct Sequencer {
    next: AtomicU64,
}

impl Sequencer {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Emits each event as one structured `log` line: `debug` for ordinary
/// frames, `warn` for `executor_crash` (spec §4.5, §7.2). A zero-configuration
/// default; hosts wanting OTLP/structured sinks supply their own subscriber.
pub struct LogTelemetry;

impl Telemetry for LogTelemetry {
    fn emit(&self, event: Event) {
        match &event {
            Event::ExecutorCrash {
                request_id,
                phase,
                error_name,
            } => {
                log::warn!(
                    "event=executor_crash request_id={request_id} phase={phase} error_name={error_name:?}"
                );
            }
            Event::RequestStart {
                request_id,
                method,
                path,
                timestamp_ms,
            } => {
                log::debug!(
                    "event=request_start request_id={request_id} method={method} path={path:?} timestamp_ms={timestamp_ms}"
                );
            }
            Event::RequestEnd {
                request_id,
                status,
                outcome,
                duration_ms,
                error_ctx,
            } => {
                log::debug!(
                    "event=request_end request_id={request_id} status={status} outcome={outcome} duration_ms={duration_ms} error_ctx={error_ctx:?}"
                );
            }
            Event::StepStart {
                request_id,
                name,
                layer,
                sequence,
                timestamp_ms,
            } => {
                log::debug!(
                    "event=step_start request_id={request_id} name={name:?} layer={} sequence={sequence} timestamp_ms={timestamp_ms}",
                    layer.as_str()
                );
            }
            Event::StepEnd {
                request_id,
                name,
                layer,
                sequence,
                outcome,
                duration_ms,
            } => {
                log::debug!(
                    "event=step_end request_id={request_id} name={name:?} layer={} sequence={sequence} outcome={} duration_ms={duration_ms}",
                    layer.as_str(),
                    outcome.as_str()
                );
            }
            Event::NeedScheduled {
                request_id,
                sequence,
                effect_count,
                mode,
                join,
            } => {
                log::debug!(
                    "event=need_scheduled request_id={request_id} sequence={sequence} effect_count={effect_count} mode={mode:?} join={join:?}"
                );
            }
            Event::EffectStart {
                request_id,
                sequence,
                need_sequence,
                kind,
                token,
                required,
                mode,
                join,
                timeout_ms,
                target,
                timestamp_ms,
            } => {
                log::debug!(
                    "event=effect_start request_id={request_id} sequence={sequence} need_sequence={need_sequence} kind={kind} token={token} required={required} mode={mode:?} join={join:?} timeout_ms={timeout_ms} target={target:?} timestamp_ms={timestamp_ms}"
                );
            }
            Event::EffectEnd {
                request_id,
                sequence,
                need_sequence,
                kind,
                token,
                required,
                success,
                duration_ms,
                bytes_len,
                error_ctx,
            } => {
                log::debug!(
                    "event=effect_end request_id={request_id} sequence={sequence} need_sequence={need_sequence} kind={kind} token={token} required={required} success={success} duration_ms={duration_ms} bytes_len={bytes_len:?} error_ctx={error_ctx:?}"
                );
            }
            Event::ContinuationResume {
                request_id,
                need_sequence,
                resume_ptr,
                mode,
                join,
            } => {
                log::debug!(
                    "event=continuation_resume request_id={request_id} need_sequence={need_sequence} resume_ptr={resume_ptr} mode={mode:?} join={join:?}"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequencer_is_monotonic() {
        let seq = Sequencer::new();
        let a = seq.next();
        let b = seq.next();
        let c = seq.next();
        assert_eq!([a, b, c], [0, 1, 2]);
    }

    #[test]
    fn now_ms_is_nonzero() {
        assert!(now_ms() > 0);
    }

    #[test]
    fn step_outcome_from_decision_maps_variants() {
        assert_eq!(StepOutcome::from(&Decision::Continue), StepOutcome::Continue);
        assert_eq!(
            StepOutcome::from(&Decision::Done(crate::types::Response::empty(200))),
            StepOutcome::Done
        );
    }
}
