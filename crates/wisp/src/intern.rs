//! Process-wide string interning.
//!
//! Distinct from [`crate::table::Table`]: the intern table is keyed by the
//! *bytes* of a string (it is how the compiler and VM decide whether a new
//! string literal or identifier already has a heap representation), whereas
//! `Table` is keyed by an already-interned [`HeapId`]. Once a string has been
//! interned, every further occurrence of the same bytes resolves to the same
//! `HeapId` — callers compare identity, never bytes.

use ahash::AHashMap;

use crate::{
    heap::{Heap, HeapId},
    object::{Obj, ObjString, fnv1a},
};

/// Maps a string's hash to the `HeapId`s of interned strings sharing that
/// hash (a hash collision is possible; each bucket is checked by full byte
/// comparison on insert, not just hash equality).
#[derive(Debug, Default)]
pub struct Interner {
    buckets: AHashMap<u32, Vec<HeapId>>,
}

impl Interner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing handle for `s` if one is interned, allocating and
    /// interning a new one otherwise. The table of interned keys is itself a
    /// GC root (see `Heap::mark_roots`), so interned strings are never swept
    /// while still referenced by this structure.
    pub fn intern(&mut self, heap: &mut Heap, s: &str) -> HeapId {
        let hash = fnv1a(s.as_bytes());
        if let Some(candidates) = self.buckets.get(&hash) {
            for &id in candidates {
                if let Obj::String(existing) = heap.get(id)
                    && existing.as_str() == s
                {
                    return id;
                }
            }
        }
        let id = heap.allocate(Obj::String(ObjString::new(s)));
        self.buckets.entry(hash).or_default().push(id);
        id
    }

    /// All currently-interned handles, used by the GC to root the intern
    /// table (keys only — interned strings are kept alive for the table's
    /// own lifetime, never swept while the interner exists).
    pub fn roots(&self) -> impl Iterator<Item = HeapId> + '_ {
        self.buckets.values().flatten().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_bytes_intern_to_the_same_id() {
        let mut heap = Heap::new();
        let mut interner = Interner::new();
        let a = interner.intern(&mut heap, "hello");
        let b = interner.intern(&mut heap, "hello");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_bytes_intern_to_distinct_ids() {
        let mut heap = Heap::new();
        let mut interner = Interner::new();
        let a = interner.intern(&mut heap, "hello");
        let b = interner.intern(&mut heap, "world");
        assert_ne!(a, b);
    }

    #[test]
    fn repeated_interning_does_not_grow_the_heap() {
        let mut heap = Heap::new();
        let mut interner = Interner::new();
        interner.intern(&mut heap, "repeat");
        let before = heap.stats().live_objects;
        for _ in 0..50 {
            interner.intern(&mut heap, "repeat");
        }
        assert_eq!(heap.stats().live_objects, before);
    }
}
