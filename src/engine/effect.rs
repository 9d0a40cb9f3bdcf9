//! The effect-handler consumer contract (spec §6).

use crate::types::{Effect, Error};

/// Supplied by the host; dispatches a reified [`Effect`] to its concrete I/O
/// implementation (HTTP client, database driver, filesystem...). The core
/// never performs I/O itself — this is the one seam where it does.
///
/// MUST be reentrant across threads: distinct requests may call `handle`
/// concurrently, though this core never issues two concurrent calls for a
/// single `Need` (§4.3, MVP note: `Parallel` executes as `Sequential`).
pub trait EffectHandler: Send + Sync {
    fn handle(&self, effect: &Effect, timeout_ms: u32) -> EffectResult;
}

/// The outcome of one effect dispatch.
pub enum EffectResult {
    Success {
        bytes: Vec<u8>,
        /// Runs exactly once, at slot overwrite or context teardown, if the
        /// handler supplied one (spec §4.2).
        dealloc: Option<Box<dyn FnOnce() + Send>>,
    },
    Failure(Error),
}

impl EffectResult {
    pub fn success(bytes: Vec<u8>) -> Self {
        EffectResult::Success {
            bytes,
            dealloc: None,
        }
    }

    pub fn success_with_dealloc(bytes: Vec<u8>, dealloc: impl FnOnce() + Send + 'static) -> Self {
        EffectResult::Success {
            bytes,
            dealloc: Some(Box::new(dealloc)),
        }
    }

    pub fn failure(err: Error) -> Self {
        EffectResult::Failure(err)
    }
}
