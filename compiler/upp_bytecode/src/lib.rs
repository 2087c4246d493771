//! Flat bytecode generator and single-threaded interpreter: the last two
//! stages of the pipeline, turning a typed IR program into an executable
//! instruction stream and then running it.

mod bytecode_type;
mod frame;
mod generator;
mod hardcoded;
mod instruction;
mod interpreter;
mod program;

pub use bytecode_type::BytecodeType;
pub use frame::{align_offset_next_multiple, layout_function, reachable_blocks, FunctionFrame};
pub use generator::compile_program;
pub use hardcoded::HardcodedFunction;
pub use instruction::{CastKind, Instruction};
pub use interpreter::Interpreter;
pub use program::BytecodeProgram;
