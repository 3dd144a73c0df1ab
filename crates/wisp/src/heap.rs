//! The object heap and its precise, non-moving mark-and-sweep collector.
//!
//! Objects live in a flat arena (`Vec<Option<HeapSlot>>`) indexed by
//! [`HeapId`], per the design note that using indices instead of raw
//! pointers lets the mark bit live alongside the object and turns the
//! collector's "linked list of objects" into a plain iteration over the
//! arena. Freed slots are returned to a free list and recycled by the next
//! allocation.

use std::collections::BTreeMap;

use crate::{
    object::Obj,
    value::Value,
};

/// An index into the heap's object arena.
///
/// Never reused while the object it names is reachable: the GC only frees a
/// slot after a full mark phase finds it unreachable, so a live `Value`
/// referencing a `HeapId` can never have that id recycled out from under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapId(u32);

impl HeapId {
    #[must_use]
    pub(crate) fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).expect("heap arena grew past u32::MAX objects"))
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

struct HeapSlot {
    marked: bool,
    obj: Obj,
}

/// The default growth threshold before the very first collection.
const INITIAL_NEXT_GC: usize = 1 << 10;

/// Snapshot counts useful for tests and diagnostics, mirroring the kind of
/// summary a long-lived embedding would want to log between executions.
#[derive(Debug, Clone, Default)]
pub struct HeapStats {
    pub live_objects: usize,
    pub free_slots: usize,
    pub total_slots: usize,
    pub objects_by_kind: BTreeMap<&'static str, usize>,
}

/// The object heap: an arena of [`Obj`]s plus the bookkeeping the collector
/// needs to decide when to run.
pub struct Heap {
    slots: Vec<Option<HeapSlot>>,
    free: Vec<u32>,
    allocated: usize,
    next_gc: usize,
    /// When set, `maybe_collect` runs a collection on every allocation
    /// instead of waiting for `allocated` to cross `next_gc`. Used by the
    /// `gc-stress` feature and by tests that want deterministic collections.
    pub stress: bool,
    collections_run: usize,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            allocated: 0,
            next_gc: INITIAL_NEXT_GC,
            stress: cfg!(feature = "gc-stress"),
            collections_run: 0,
        }
    }

    /// Allocates `obj`, returning its handle. May trigger a collection first
    /// if the allocation budget (or stress mode) demands it; the caller is
    /// responsible for making sure anything that must survive that
    /// collection is already reachable from a root (see module docs on
    /// "allocation safety" in `SPEC_FULL.md` §4.6).
    pub fn allocate(&mut self, obj: Obj) -> HeapId {
        self.allocated += 1;
        if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Some(HeapSlot { marked: false, obj });
            HeapId(index)
        } else {
            self.slots.push(Some(HeapSlot { marked: false, obj }));
            HeapId::from_index(self.slots.len() - 1)
        }
    }

    #[must_use]
    pub fn get(&self, id: HeapId) -> &Obj {
        &self.slots[id.index()].as_ref().expect("dangling HeapId").obj
    }

    pub fn get_mut(&mut self, id: HeapId) -> &mut Obj {
        &mut self.slots[id.index()].as_mut().expect("dangling HeapId").obj
    }

    /// Whether a collection should run before the next allocation, given the
    /// current allocation count.
    #[must_use]
    pub fn should_collect(&self) -> bool {
        self.stress || self.allocated >= self.next_gc
    }

    /// Runs one full mark-and-sweep collection.
    ///
    /// `roots` enumerates every externally-reachable handle: the VM stack,
    /// open upvalues, in-flight compiler state, and the intern table's keys.
    /// After sweeping, `next_gc` doubles the post-collection allocation
    /// count, matching the original implementation's growth policy.
    pub fn collect_garbage(&mut self, roots: impl IntoIterator<Item = HeapId>) {
        let mut gray: Vec<HeapId> = Vec::new();
        for root in roots {
            self.mark(root, &mut gray);
        }
        while let Some(id) = gray.pop() {
            self.trace(id, &mut gray);
        }
        self.sweep();
        self.collections_run += 1;
        self.next_gc = (self.allocated * 2).max(INITIAL_NEXT_GC);
    }

    fn mark(&mut self, id: HeapId, gray: &mut Vec<HeapId>) {
        if let Some(slot) = self.slots[id.index()].as_mut() {
            if slot.marked {
                return;
            }
            slot.marked = true;
            gray.push(id);
        }
    }

    fn mark_value(&mut self, value: Value, gray: &mut Vec<HeapId>) {
        if let Value::Object(id) = value {
            self.mark(id, gray);
        }
    }

    fn trace(&mut self, id: HeapId, gray: &mut Vec<HeapId>) {
        // Clone the handles we need to recurse into first: the borrow of
        // `self.slots[id]` can't be held live across a recursive `self.mark`.
        match self.get(id).clone() {
            Obj::String(_) | Obj::Native(_) | Obj::File(_) => {}
            Obj::Function(func) => {
                if let Some(name) = func.name {
                    self.mark(name, gray);
                }
                let constants: Vec<_> = func.code.constants().to_vec();
                for c in constants {
                    self.mark_value(c, gray);
                }
            }
            Obj::Closure(closure) => {
                self.mark(closure.function, gray);
                for uv in closure.upvalues {
                    self.mark(uv, gray);
                }
            }
            Obj::Upvalue(crate::object::ObjUpvalue::Closed(value)) => {
                self.mark_value(value, gray);
            }
            Obj::Upvalue(crate::object::ObjUpvalue::Open { .. }) => {}
            Obj::Struct(s) => {
                self.mark(s.name, gray);
                let values: Vec<_> = s.props.iter().map(|(_, v)| *v).collect();
                for v in values {
                    self.mark_value(v, gray);
                }
            }
            Obj::Instance(inst) => {
                self.mark(inst.struct_id, gray);
                let values: Vec<_> = inst.props.iter().map(|(_, v)| *v).collect();
                for v in values {
                    self.mark_value(v, gray);
                }
            }
            Obj::Enum(e) => {
                self.mark(e.name, gray);
            }
            Obj::List(list) => {
                for v in list.elements {
                    self.mark_value(v, gray);
                }
                self.mark_value(list.default, gray);
            }
            Obj::Map(map) => {
                let values: Vec<_> = map.table.iter().map(|(_, v)| *v).collect();
                for v in values {
                    self.mark_value(v, gray);
                }
                self.mark_value(map.default, gray);
            }
        }
    }

    fn sweep(&mut self) {
        for index in 0..self.slots.len() {
            let free_this = match &mut self.slots[index] {
                Some(slot) if slot.marked => {
                    slot.marked = false;
                    false
                }
                Some(_) => true,
                None => false,
            };
            if free_this {
                self.slots[index] = None;
                self.free.push(u32::try_from(index).expect("heap index fits u32"));
                self.allocated = self.allocated.saturating_sub(1);
            }
        }
    }

    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats {
            total_slots: self.slots.len(),
            free_slots: self.free.len(),
            ..HeapStats::default()
        };
        for slot in self.slots.iter().flatten() {
            stats.live_objects += 1;
            *stats.objects_by_kind.entry(slot.obj.kind_name()).or_default() += 1;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjString;

    #[test]
    fn a_rooted_object_survives_collection() {
        let mut heap = Heap::new();
        let id = heap.allocate(Obj::String(ObjString::new("kept")));
        heap.collect_garbage([id]);
        assert!(matches!(heap.get(id), Obj::String(s) if s.as_str() == "kept"));
    }

    #[test]
    fn an_unreachable_object_is_swept() {
        let mut heap = Heap::new();
        heap.allocate(Obj::String(ObjString::new("garbage")));
        assert_eq!(heap.stats().live_objects, 1);
        heap.collect_garbage([]);
        assert_eq!(heap.stats().live_objects, 0);
    }

    #[test]
    fn a_swept_slot_is_recycled_by_the_next_allocation() {
        let mut heap = Heap::new();
        let first = heap.allocate(Obj::String(ObjString::new("first")));
        heap.collect_garbage([]);
        let second = heap.allocate(Obj::String(ObjString::new("second")));
        assert_eq!(first, second, "the freed slot should be reused rather than growing the arena");
    }

    #[test]
    fn next_gc_doubles_the_surviving_allocation_count() {
        let mut heap = Heap::new();
        let id = heap.allocate(Obj::String(ObjString::new("kept")));
        heap.collect_garbage([id]);
        assert_eq!(heap.next_gc, (1usize * 2).max(INITIAL_NEXT_GC));
    }
}
