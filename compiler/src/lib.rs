pub mod chunk;
pub mod compiler;
pub mod error;
pub mod heap;
pub mod object;
pub mod table;
pub mod value;

pub use chunk::{Chunk, OpCode};
pub use compiler::Compiler;
pub use error::{AtToken, Backtrace, BacktraceFrame, CompileError, RuntimeError};
pub use heap::Heap;
pub use object::{
    display_obj, hash_string, ClassObj, ClosureObj, FunctionObj, Gc, InstanceObj, NativeFn,
    NativeObj, Obj, ObjKind, StringObj, UpvalueObj, UpvalueState,
};
pub use table::Table;
pub use value::Value;

/// Compiles `source` to a top-level function object, or the list of
/// compile errors collected along the way.
pub fn compile(source: &str, heap: &mut Heap) -> Result<Gc, Vec<CompileError>> {
    Compiler::compile(source, heap)
}
