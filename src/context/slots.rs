//! Typed-by-convention slot storage.
//!
//! A slot is an opaque byte payload keyed by a `u32` token; the mapping from
//! token to logical type is a concern of the caller's schema (spec §3), not
//! of this map. [`SlotMap`] only guarantees total-overwrite semantics and
//! single-owner deallocation.

use ahash::AHashMap;

use super::arena::Arena;

/// The stored form of a slot's payload.
///
/// `Owned` bytes are bump-allocated out of the request's [`Arena`] and
/// reclaimed in one step when it is torn down. `External` bytes came from a
/// heap-owned buffer with a paired deallocator contract (spec §4.2) — memory
/// the arena doesn't own, e.g. a buffer returned across an FFI boundary — so
/// it keeps its own `Box<[u8]>` and runs `dealloc` exactly once, whether
/// triggered by an overwrite or by the slot map itself being dropped.
enum SlotValue<'arena> {
    Owned(&'arena [u8]),
    External {
        bytes: Box<[u8]>,
        dealloc: Option<Box<dyn FnOnce() + Send>>,
    },
}

impl SlotValue<'_> {
    fn bytes(&self) -> &[u8] {
        match self {
            SlotValue::Owned(b) => b,
            SlotValue::External { bytes, .. } => bytes,
        }
    }
}

impl Drop for SlotValue<'_> {
    fn drop(&mut self) {
        if let SlotValue::External { dealloc, .. } = self {
            if let Some(d) = dealloc.take() {
                d();
            }
        }
    }
}

/// The per-request `token -> bytes` map, scoped to the same arena as its
/// owning [`super::Context`].
///
/// Writes are total overwrites: writing a token that already holds a value
/// drops the old `SlotValue` first, which runs its deallocator (if any)
/// before the new value is inserted — there is never a window where two
/// deallocators for the same token are live.
pub struct SlotMap<'arena> {
    arena: &'arena Arena,
    entries: AHashMap<u32, SlotValue<'arena>>,
}

impl<'arena> SlotMap<'arena> {
    pub fn new(arena: &'arena Arena) -> Self {
        Self {
            arena,
            entries: AHashMap::default(),
        }
    }

    /// Copies `bytes` into the request arena and stores the result under
    /// `token`, overwriting any prior value.
    pub fn write(&mut self, token: u32, bytes: &[u8]) {
        let copied = self.arena.alloc_bytes(bytes);
        self.entries.insert(token, SlotValue::Owned(copied));
    }

    /// Stores a heap-owned buffer under `token`, transferring ownership to
    /// the context; `dealloc` runs exactly once, at overwrite or at arena
    /// teardown (spec §4.2, §5). Bypasses the arena deliberately — this
    /// buffer's lifetime is governed by its own deallocator, not by the
    /// request's bump allocation.
    pub fn write_external(
        &mut self,
        token: u32,
        bytes: Box<[u8]>,
        dealloc: impl FnOnce() + Send + 'static,
    ) {
        self.entries.insert(
            token,
            SlotValue::External {
                bytes,
                dealloc: Some(Box::new(dealloc)),
            },
        );
    }

    pub fn read(&self, token: u32) -> Option<&[u8]> {
        self.entries.get(&token).map(SlotValue::bytes)
    }

    pub fn contains(&self, token: u32) -> bool {
        self.entries.contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A static `{reads, writes}` declaration over a step (spec §4.2).
///
/// The source framework enforces this at compile time via per-slot type
/// metaprogramming; a portable implementation validates at
/// `View::new` (construction time) and panics on out-of-declaration access
/// at use time rather than at compile time.
pub struct View {
    reads: Vec<u32>,
    writes: Vec<u32>,
}

impl View {
    pub fn new(reads: Vec<u32>, writes: Vec<u32>) -> Self {
        Self { reads, writes }
    }

    pub fn read<'a>(&self, slots: &'a SlotMap<'_>, token: u32) -> Option<&'a [u8]> {
        assert!(
            self.reads.contains(&token),
            "token {token} not declared in this view's reads set"
        );
        slots.read(token)
    }

    pub fn write(&self, slots: &mut SlotMap<'_>, token: u32, bytes: &[u8]) {
        assert!(
            self.writes.contains(&token),
            "token {token} not declared in this view's writes set"
        );
        slots.write(token, bytes);
    }
}
