use hashbrown::HashMap;
use upp_ir::FunctionId;

use crate::instruction::Instruction;

#[derive(Debug, Clone, Default)]
pub struct BytecodeProgram {
    pub instructions: Vec<Instruction>,
    pub function_locations: HashMap<FunctionId, usize>,
    pub entry_point: Option<usize>,
    pub maximum_function_stack_depth: u32,
    pub frame_sizes: HashMap<FunctionId, u32>,
}
