//! The request-scoped bump allocator.
//!
//! Every temporary string or buffer produced while a request is in flight
//! (formatted bodies, parsed parameters, slot payloads copied from a
//! borrowed slice) lives in the arena. Freeing the arena — which happens
//! when the owning [`super::Context`] is dropped — releases all of it in
//! one step (spec §5 "Resource discipline").

use bumpalo::Bump;

/// A thin wrapper around [`bumpalo::Bump`] scoped to a single request.
///
/// Kept as its own type (rather than exposing `Bump` directly) so the rest
/// of the crate depends on a narrow interface and so tests can assert on
/// `bytes_allocated` without reaching into `bumpalo` internals.
pub struct Arena {
    bump: Bump,
}

impl Arena {
    pub fn new() -> Self {
        Self { bump: Bump::new() }
    }

    /// Copies `bytes` into the arena and returns a slice whose lifetime is
    /// tied to the arena, not to the caller's buffer.
    pub fn alloc_bytes<'a>(&'a self, bytes: &[u8]) -> &'a [u8] {
        self.bump.alloc_slice_copy(bytes)
    }

    pub fn alloc_str<'a>(&'a self, s: &str) -> &'a str {
        self.bump.alloc_str(s)
    }

    /// Total bytes currently allocated from the underlying chunks. Used by
    /// the arena round-trip property test (spec §8, property 5) to assert
    /// that reclaiming never leaves it non-zero after a later arena is
    /// created.
    pub fn bytes_allocated(&self) -> usize {
        self.bump.allocated_bytes()
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}
