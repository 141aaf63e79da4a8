use std::mem::size_of;
use std::ptr::NonNull;

use crate::object::{hash_string, ClosureObj, FunctionObj, Gc, InstanceObj, NativeFn, NativeObj, Obj, ObjKind, StringObj, UpvalueObj, UpvalueState};
use crate::table::Table;
use crate::value::Value;

const INITIAL_NEXT_GC: usize = 1024 * 1024;
const HEAP_GROW_FACTOR: usize = 2;

/// Owns every heap allocation through its lifetime: allocates (pushing
/// `Obj`s onto an intrusive singly-linked list via `Obj::next`), tracks
/// bytes for GC triggering, and is the only thing permitted to free an
/// object (during `sweep`). Also owns the string-interning table, since
/// interning is itself an allocation-producing operation that every
/// allocator of strings (compiler and VM alike) needs.
pub struct Heap {
    head: Option<Gc>,
    pub bytes_allocated: usize,
    pub next_gc: usize,
    pub strings: Table,
    /// When true, every allocation attempts a collection first (used by
    /// tests exercising GC correctness under maximum pressure).
    pub stress_gc: bool,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Self {
        Self {
            head: None,
            bytes_allocated: 0,
            next_gc: INITIAL_NEXT_GC,
            strings: Table::new(),
            stress_gc: false,
        }
    }

    pub fn should_collect(&self) -> bool {
        self.stress_gc || self.bytes_allocated > self.next_gc
    }

    pub fn note_collected(&mut self) {
        self.next_gc = self.bytes_allocated * HEAP_GROW_FACTOR;
    }

    pub fn head(&self) -> Option<Gc> {
        self.head
    }

    fn push(&mut self, kind: ObjKind, size: usize) -> Gc {
        let obj = Box::new(Obj {
            marked: std::cell::Cell::new(false),
            next: std::cell::Cell::new(self.head),
            kind,
        });
        let gc = NonNull::from(Box::leak(obj));
        self.head = Some(gc);
        self.bytes_allocated += size;
        gc
    }

    /// Interns `chars`: returns the existing String object if one with
    /// identical bytes is already live, otherwise allocates a new one.
    /// This is the sole producer of `ObjKind::String`, which is what makes
    /// "equal bytes implies equal pointer" hold for every live string.
    pub fn intern(&mut self, chars: &str) -> Gc {
        let hash = hash_string(chars.as_bytes());
        if let Some(existing) = self.strings.find_string(chars.as_bytes(), hash) {
            return existing;
        }
        let gc = self.push(
            ObjKind::String(StringObj { chars: chars.to_string(), hash }),
            size_of::<StringObj>() + chars.len(),
        );
        self.strings.set(gc, Value::Nil);
        gc
    }

    pub fn alloc_function(
        &mut self,
        name: Option<Gc>,
        arity: u8,
        upvalue_count: usize,
        chunk: crate::chunk::Chunk,
    ) -> Gc {
        self.push(
            ObjKind::Function(FunctionObj { name, arity, upvalue_count, chunk }),
            size_of::<FunctionObj>(),
        )
    }

    pub fn alloc_closure(&mut self, function: Gc, upvalues: Vec<Gc>) -> Gc {
        let size = size_of::<ClosureObj>() + upvalues.len() * size_of::<Gc>();
        self.push(ObjKind::Closure(ClosureObj { function, upvalues }), size)
    }

    pub fn alloc_upvalue(&mut self, slot: usize) -> Gc {
        self.push(
            ObjKind::Upvalue(UpvalueObj { state: std::cell::Cell::new(UpvalueState::Open(slot)) }),
            size_of::<UpvalueObj>(),
        )
    }

    pub fn alloc_class(&mut self, name: Gc) -> Gc {
        self.push(ObjKind::Class(crate::object::ClassObj { name }), size_of::<crate::object::ClassObj>())
    }

    pub fn alloc_instance(&mut self, class: Gc) -> Gc {
        self.push(
            ObjKind::Instance(InstanceObj { class, fields: Table::new() }),
            size_of::<InstanceObj>(),
        )
    }

    pub fn alloc_native(&mut self, name: &'static str, function: NativeFn) -> Gc {
        self.push(ObjKind::Native(NativeObj { name, function }), size_of::<NativeObj>())
    }

    /// Walks the object list, freeing everything whose mark bit is clear,
    /// and clears the mark on survivors for the next cycle. Returns the
    /// number of bytes reclaimed.
    ///
    /// # Safety
    /// Every live (still-referenced) object must already be marked; the
    /// caller (the garbage collector) is responsible for having completed
    /// mark and trace before calling this.
    pub unsafe fn sweep(&mut self) -> usize {
        let mut freed = 0;
        let mut prev: Option<Gc> = None;
        let mut current = self.head;

        while let Some(gc) = current {
            let next = gc.as_ref().next.get();
            if gc.as_ref().marked.get() {
                gc.as_ref().marked.set(false);
                prev = Some(gc);
                current = next;
            } else {
                match prev {
                    Some(p) => p.as_ref().next.set(next),
                    None => self.head = next,
                }
                freed += Self::free_size(gc);
                drop(Box::from_raw(gc.as_ptr()));
                current = next;
            }
        }

        self.bytes_allocated -= freed;
        freed
    }

    fn free_size(gc: Gc) -> usize {
        // SAFETY: called from `sweep` only, on an object about to be freed
        // but not yet deallocated.
        let obj = unsafe { gc.as_ref() };
        match &obj.kind {
            ObjKind::String(s) => size_of::<StringObj>() + s.chars.len(),
            ObjKind::Function(_) => size_of::<FunctionObj>(),
            ObjKind::Closure(c) => size_of::<ClosureObj>() + c.upvalues.len() * size_of::<Gc>(),
            ObjKind::Upvalue(_) => size_of::<UpvalueObj>(),
            ObjKind::Class(_) => size_of::<crate::object::ClassObj>(),
            ObjKind::Instance(_) => size_of::<InstanceObj>(),
            ObjKind::Native(_) => size_of::<NativeObj>(),
        }
    }

    /// Frees every live object unconditionally. Called once at VM/heap
    /// teardown — this is the correct place to release the single
    /// gray-stack allocation too, not inside each per-object free (a
    /// mistake present in the reference implementation; see the garbage
    /// collector's corrected-bugs notes).
    pub fn free_all(&mut self) {
        let mut current = self.head.take();
        while let Some(gc) = current {
            // SAFETY: every object on the list is owned exclusively by
            // this heap and has not been freed yet.
            current = unsafe { gc.as_ref().next.get() };
            unsafe { drop(Box::from_raw(gc.as_ptr())) };
        }
        self.bytes_allocated = 0;
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        self.free_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_returns_the_same_object_for_equal_bytes() {
        let mut heap = Heap::new();
        let a = heap.intern("hello");
        let b = heap.intern("hello");
        assert_eq!(a, b);
    }

    #[test]
    fn interning_distinguishes_different_bytes() {
        let mut heap = Heap::new();
        let a = heap.intern("hello");
        let b = heap.intern("world");
        assert_ne!(a, b);
    }

    #[test]
    fn sweep_frees_unmarked_and_keeps_marked() {
        let mut heap = Heap::new();
        let keep = heap.intern("keep");
        let _drop_me = heap.intern("drop-me");

        // SAFETY: `keep` is a live object we just allocated.
        unsafe { keep.as_ref().marked.set(true) };

        let freed = unsafe { heap.sweep() };
        assert!(freed > 0);

        // the surviving object's mark bit should be cleared for next cycle
        // SAFETY: `keep` was retained by sweep because it was marked.
        assert!(!unsafe { keep.as_ref().marked.get() });
    }

    #[test]
    fn next_gc_starts_at_one_megabyte() {
        let heap = Heap::new();
        assert_eq!(heap.next_gc, 1024 * 1024);
    }

    #[test]
    fn collection_doubles_the_threshold() {
        let mut heap = Heap::new();
        heap.bytes_allocated = 500;
        heap.note_collected();
        assert_eq!(heap.next_gc, 1000);
    }
}
