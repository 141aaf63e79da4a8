use embers_compiler::{Gc, Heap, ObjKind, Table, UpvalueState, Value};

use crate::vm::CallFrame;

/// One full mark-sweep cycle. The gray worklist is a plain local `Vec`
/// allocated fresh per collection and dropped when this function returns —
/// unlike the reference interpreter, which keeps it as a persistent VM-owned
/// buffer and (incorrectly) frees it inside the per-object free routine
/// instead of once at teardown. Freeing it here, implicitly, every time
/// sidesteps that bug entirely rather than reproducing it.
///
/// Called once per dispatched instruction (see `Vm::execute`), never in the
/// middle of one — an instruction that allocates more than once (`Closure`
/// captures N upvalues before allocating the closure itself) still runs to
/// completion first, so every intermediate object stays reachable off the
/// Rust stack without needing to be pushed onto the VM stack as a root.
pub fn collect_garbage(
    heap: &mut Heap,
    stack: &[Value],
    frames: &[CallFrame],
    globals: &Table,
    open_upvalues: &[Gc],
) {
    let debug = cfg!(feature = "debug-gc");
    if debug {
        eprintln!("-- gc begin");
    }

    let mut gray = Vec::new();
    mark_roots(stack, frames, globals, open_upvalues, &mut gray);
    trace_references(&mut gray);
    heap.strings.remove_unmarked_keys();
    let freed = unsafe { heap.sweep() };
    heap.note_collected();

    if debug {
        eprintln!("-- gc end, freed {freed} bytes, next collection at {}", heap.next_gc);
    }
}

fn mark_roots(
    stack: &[Value],
    frames: &[CallFrame],
    globals: &Table,
    open_upvalues: &[Gc],
    gray: &mut Vec<Gc>,
) {
    for &value in stack {
        mark_value(value, gray);
    }
    for frame in frames {
        mark_object(frame.closure, gray);
    }
    for (key, value) in globals.iter() {
        mark_object(key, gray);
        mark_value(value, gray);
    }
    for &upvalue in open_upvalues {
        mark_object(upvalue, gray);
    }
}

fn mark_value(value: Value, gray: &mut Vec<Gc>) {
    if let Value::Object(gc) = value {
        mark_object(gc, gray);
    }
}

fn mark_object(gc: Gc, gray: &mut Vec<Gc>) {
    // SAFETY: every object reachable from a root is live; the caller only
    // calls this on values read from a live root or from an already-gray
    // object's fields.
    let obj = unsafe { gc.as_ref() };
    if obj.marked.get() {
        return;
    }
    obj.marked.set(true);
    gray.push(gc);
}

fn trace_references(gray: &mut Vec<Gc>) {
    while let Some(gc) = gray.pop() {
        blacken_object(gc, gray);
    }
}

fn blacken_object(gc: Gc, gray: &mut Vec<Gc>) {
    // SAFETY: `gc` was pushed onto the gray stack by `mark_object`, which
    // only does so for objects that were just found live.
    let obj = unsafe { gc.as_ref() };
    match &obj.kind {
        ObjKind::String(_) | ObjKind::Native(_) => {}
        ObjKind::Function(f) => {
            if let Some(name) = f.name {
                mark_object(name, gray);
            }
            for &constant in f.chunk.constants() {
                mark_value(constant, gray);
            }
        }
        ObjKind::Closure(c) => {
            mark_object(c.function, gray);
            for &upvalue in &c.upvalues {
                mark_object(upvalue, gray);
            }
        }
        ObjKind::Upvalue(u) => {
            if let UpvalueState::Closed(value) = u.state.get() {
                mark_value(value, gray);
            }
        }
        ObjKind::Class(c) => mark_object(c.name, gray),
        ObjKind::Instance(i) => {
            mark_object(i.class, gray);
            for (key, value) in i.fields.iter() {
                mark_object(key, gray);
                mark_value(value, gray);
            }
        }
    }
}
