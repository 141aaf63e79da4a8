use std::cell::Cell;
use std::fmt;
use std::ptr::NonNull;

use crate::chunk::Chunk;
use crate::value::Value;

/// A non-owning handle to a heap object. Copy, like a raw pointer, because
/// the collector is the sole owner; every other holder (the VM stack, a
/// closure's upvalue slots, a table entry) just aliases it.
pub type Gc = NonNull<Obj>;

/// Type of a native function: takes the argument slice, returns a value or
/// an error message (wrapped into a runtime error by the caller).
pub type NativeFn = fn(&[Value]) -> Result<Value, String>;

/// Header shared by every heap allocation: the mark bit the collector flips
/// during tracing, and the intrusive next-pointer linking every live
/// allocation into one list so sweep can walk them without a side table.
pub struct Obj {
    pub marked: Cell<bool>,
    pub next: Cell<Option<Gc>>,
    pub kind: ObjKind,
}

pub enum ObjKind {
    String(StringObj),
    Function(FunctionObj),
    Closure(ClosureObj),
    Upvalue(UpvalueObj),
    Class(ClassObj),
    Instance(InstanceObj),
    Native(NativeObj),
}

pub struct StringObj {
    pub chars: String,
    pub hash: u32,
}

pub struct FunctionObj {
    pub name: Option<Gc>,
    pub arity: u8,
    pub upvalue_count: usize,
    pub chunk: Chunk,
}

pub struct ClosureObj {
    pub function: Gc,
    pub upvalues: Vec<Gc>,
}

#[derive(Clone, Copy)]
pub enum UpvalueState {
    /// Points at a live slot on the VM stack.
    Open(usize),
    /// The enclosing frame returned; the value lives here now.
    Closed(Value),
}

pub struct UpvalueObj {
    pub state: Cell<UpvalueState>,
}

pub struct ClassObj {
    pub name: Gc,
}

pub struct InstanceObj {
    pub class: Gc,
    pub fields: crate::table::Table,
}

pub struct NativeObj {
    pub name: &'static str,
    pub function: NativeFn,
}

/// FNV-1a, matching the reference implementation's string hash exactly so
/// hashing is not a point of behavioral divergence.
pub fn hash_string(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

impl Obj {
    /// # Safety
    /// `gc` must point at a live `Obj` whose `kind` is `ObjKind::String`,
    /// and must stay live for the returned lifetime `'a`.
    pub unsafe fn as_string<'a>(gc: Gc) -> &'a StringObj {
        match &gc.as_ref().kind {
            ObjKind::String(s) => s,
            _ => unreachable!("Gc did not point at a String"),
        }
    }

    /// # Safety
    /// `gc` must point at a live `Obj` whose `kind` is `ObjKind::Function`,
    /// and must stay live for the returned lifetime `'a`.
    pub unsafe fn as_function<'a>(gc: Gc) -> &'a FunctionObj {
        match &gc.as_ref().kind {
            ObjKind::Function(f) => f,
            _ => unreachable!("Gc did not point at a Function"),
        }
    }

    /// # Safety
    /// `gc` must point at a live `Obj` whose `kind` is `ObjKind::Closure`,
    /// and must stay live for the returned lifetime `'a`.
    pub unsafe fn as_closure<'a>(gc: Gc) -> &'a ClosureObj {
        match &gc.as_ref().kind {
            ObjKind::Closure(c) => c,
            _ => unreachable!("Gc did not point at a Closure"),
        }
    }

    /// # Safety
    /// `gc` must point at a live `Obj` whose `kind` is `ObjKind::Upvalue`,
    /// and must stay live for the returned lifetime `'a`.
    pub unsafe fn as_upvalue<'a>(gc: Gc) -> &'a UpvalueObj {
        match &gc.as_ref().kind {
            ObjKind::Upvalue(u) => u,
            _ => unreachable!("Gc did not point at an Upvalue"),
        }
    }

    /// # Safety
    /// `gc` must point at a live `Obj` whose `kind` is `ObjKind::Class`, and
    /// must stay live for the returned lifetime `'a`.
    pub unsafe fn as_class<'a>(gc: Gc) -> &'a ClassObj {
        match &gc.as_ref().kind {
            ObjKind::Class(c) => c,
            _ => unreachable!("Gc did not point at a Class"),
        }
    }

    /// # Safety
    /// `gc` must point at a live `Obj` whose `kind` is `ObjKind::Instance`,
    /// and must stay live for the returned lifetime `'a`.
    pub unsafe fn as_instance<'a>(gc: Gc) -> &'a InstanceObj {
        match &gc.as_ref().kind {
            ObjKind::Instance(i) => i,
            _ => unreachable!("Gc did not point at an Instance"),
        }
    }

    /// # Safety
    /// `gc` must point at a live `Obj` whose `kind` is `ObjKind::Instance`,
    /// must stay live for the returned lifetime `'a`, and the caller must
    /// hold the only reference in use at the call site (no aliasing `&`
    /// borrow of the same object outstanding).
    pub unsafe fn as_instance_mut<'a>(mut gc: Gc) -> &'a mut InstanceObj {
        match &mut gc.as_mut().kind {
            ObjKind::Instance(i) => i,
            _ => unreachable!("Gc did not point at an Instance"),
        }
    }

    /// # Safety
    /// `gc` must point at a live `Obj` whose `kind` is `ObjKind::Native`, and
    /// must stay live for the returned lifetime `'a`.
    pub unsafe fn as_native<'a>(gc: Gc) -> &'a NativeObj {
        match &gc.as_ref().kind {
            ObjKind::Native(n) => n,
            _ => unreachable!("Gc did not point at a Native"),
        }
    }

    pub fn kind_name(kind: &ObjKind) -> &'static str {
        match kind {
            ObjKind::String(_) => "string",
            ObjKind::Function(_) => "function",
            ObjKind::Closure(_) => "closure",
            ObjKind::Upvalue(_) => "upvalue",
            ObjKind::Class(_) => "class",
            ObjKind::Instance(_) => "instance",
            ObjKind::Native(_) => "native",
        }
    }
}

/// # Safety
/// Caller guarantees `gc` is live for the duration of the borrow; every
/// call site holds it via a root (VM stack, constants pool, or a frame) for
/// strictly longer than the returned reference is used.
pub unsafe fn display_obj(gc: Gc, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &gc.as_ref().kind {
        ObjKind::String(s) => write!(f, "{}", s.chars),
        ObjKind::Function(func) => match func.name {
            Some(name) => write!(f, "<fn {}>", Obj::as_string(name).chars),
            None => write!(f, "<script>"),
        },
        ObjKind::Closure(c) => display_obj(c.function, f),
        ObjKind::Upvalue(_) => write!(f, "upvalue"),
        ObjKind::Class(class) => write!(f, "{}", Obj::as_string(class.name).chars),
        ObjKind::Instance(inst) => {
            let class = match &inst.class.as_ref().kind {
                ObjKind::Class(c) => c,
                _ => unreachable!(),
            };
            write!(f, "{} instance", Obj::as_string(class.name).chars)
        }
        ObjKind::Native(_) => write!(f, "<native fn>"),
    }
}
