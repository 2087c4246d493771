//! Lowers a typed IR program into the flat instruction array the
//! interpreter executes. Compiles each function's blocks through a single
//! recursive walk that inlines `if`/`while`/`switch` branch bodies at the
//! point they are referenced, and records forward references (calls to
//! not-yet-lowered functions, gotos to labels later in the stream,
//! function-pointer loads) as patch entries resolved once every function
//! has been compiled.

use hashbrown::HashMap;
use upp_ir::{BlockId, CallTarget, DataAccess, DataAccessKind, FunctionId, IrProgram, Return as IrReturn};
use upp_types::{TypeId, TypeKind, TypeRegistry};

use crate::bytecode_type::BytecodeType;
use crate::frame::{layout_function, FunctionFrame};
use crate::hardcoded::HardcodedFunction;
use crate::instruction::{CastKind, Instruction};
use crate::program::BytecodeProgram;

type IrInstruction = upp_ir::Instruction;

/// A call site's arguments are written into a region that starts right
/// after the caller's own frame. Because calls aren't compiled with full
/// knowledge of concurrently-live nested calls, every call in a function
/// reuses the same region, correct for sequential calls, but a call whose
/// own argument expression contains another call would clobber it. No
/// construct in the surface language currently reaches the generator that
/// way (argument expressions are evaluated into registers before the call
/// IR instruction is emitted), so this is a known, narrow limitation
/// rather than a live bug.
struct Generator<'a> {
    ir: &'a IrProgram,
    types: &'a TypeRegistry,
    frames: HashMap<FunctionId, FunctionFrame>,
    instructions: Vec<Instruction>,
    function_locations: HashMap<FunctionId, usize>,
    label_locations: HashMap<u32, usize>,
    constant_indices: HashMap<upp_types::ConstantId, u32>,
    fill_out_calls: Vec<(usize, FunctionId)>,
    fill_out_function_ptr_loads: Vec<(usize, FunctionId)>,
    fill_out_gotos: Vec<(usize, u32)>,
    current_function: Option<FunctionId>,
    maximum_function_stack_depth: u32,
}

pub fn compile_program(ir: &IrProgram, types: &TypeRegistry) -> BytecodeProgram {
    let mut frames = HashMap::new();
    for (id, _) in ir.functions() {
        frames.insert(id, layout_function(ir, types, id));
    }

    let mut generator = Generator {
        ir,
        types,
        frames,
        instructions: Vec::new(),
        function_locations: HashMap::new(),
        label_locations: HashMap::new(),
        constant_indices: HashMap::new(),
        fill_out_calls: Vec::new(),
        fill_out_function_ptr_loads: Vec::new(),
        fill_out_gotos: Vec::new(),
        current_function: None,
        maximum_function_stack_depth: 0,
    };

    for (id, _) in ir.functions() {
        generator.compile_function(id);
    }
    generator.resolve_references();

    let entry_point = ir.entry_function.and_then(|id| generator.function_locations.get(&id).copied());

    BytecodeProgram {
        instructions: generator.instructions,
        function_locations: generator.function_locations,
        entry_point,
        maximum_function_stack_depth: generator.maximum_function_stack_depth,
        frame_sizes: generator.frames.iter().map(|(id, frame)| (*id, frame.frame_size)).collect(),
    }
}

impl<'a> Generator<'a> {
    fn emit(&mut self, instruction: Instruction) -> usize {
        let index = self.instructions.len();
        self.instructions.push(instruction);
        index
    }

    fn frame(&self) -> &FunctionFrame {
        &self.frames[&self.current_function.expect("current_function set before any operand is resolved")]
    }

    fn offset_of(&mut self, access: DataAccess) -> i32 {
        match access.kind {
            DataAccessKind::Register { block, index } => self.frame().register_offsets[&block][index as usize],
            DataAccessKind::Parameter { index, .. } => self.frame().parameter_offsets[index as usize],
            DataAccessKind::Global(index) => index as i32,
            DataAccessKind::Constant(id) => {
                let next = self.constant_indices.len() as u32;
                *self.constant_indices.entry(id).or_insert(next) as i32
            }
            DataAccessKind::Nothing => -1,
        }
    }

    fn type_of(&self, access: &DataAccess) -> TypeId {
        match access.kind {
            DataAccessKind::Register { block, index } => self.ir.block(block).registers[index as usize],
            DataAccessKind::Parameter { function, index } => match self.types.kind(self.ir.function(function).signature) {
                TypeKind::FunctionPointer { signature, .. } => signature.params[index as usize],
                _ => self.types.unknown(),
            },
            _ => self.types.unknown(),
        }
    }

    fn bytecode_type_of(&self, ty: TypeId) -> BytecodeType {
        match self.types.kind(ty) {
            TypeKind::Primitive(p) => BytecodeType::from(*p),
            TypeKind::Pointer(_) | TypeKind::Address | TypeKind::FunctionPointer { .. } | TypeKind::TypeHandle => {
                BytecodeType::U64
            }
            TypeKind::Enum(_) => BytecodeType::I32,
            // Falls back to a 64-bit integer when the register's real type
            // hasn't been inferred yet, mirroring the IR generator's own
            // placeholder typing until full inference is threaded through.
            _ => BytecodeType::I64,
        }
    }

    fn size_of(&self, access: &DataAccess) -> u32 {
        upp_types::layout_of(self.types, self.type_of(access)).size
    }

    fn compile_function(&mut self, id: FunctionId) {
        self.current_function = Some(id);
        self.function_locations.insert(id, self.instructions.len());
        let entry = self.ir.function(id).entry;
        self.compile_block(entry);
    }

    fn compile_block(&mut self, block: BlockId) {
        let instructions = self.ir.block(block).instructions.clone();
        for instruction in &instructions {
            self.compile_instruction(instruction);
        }
    }

    fn compile_instruction(&mut self, instruction: &IrInstruction) {
        match instruction {
            IrInstruction::Call(call) => self.compile_call(call),
            IrInstruction::If { condition, then_block, else_block } => {
                let condition = self.offset_of(*condition);
                let jump_to_else = self.emit(Instruction::JumpOnFalse { target: 0, condition });
                self.compile_block(*then_block);
                let jump_to_end = self.emit(Instruction::Jump { target: 0 });
                self.patch_jump(jump_to_else, self.instructions.len());
                self.compile_block(*else_block);
                self.patch_jump(jump_to_end, self.instructions.len());
            }
            IrInstruction::While { condition_block, condition, body } => {
                let condition_start = self.instructions.len();
                self.compile_block(*condition_block);
                let condition = self.offset_of(*condition);
                let jump_past_body = self.emit(Instruction::JumpOnFalse { target: 0, condition });
                self.compile_block(*body);
                self.emit(Instruction::Jump { target: condition_start });
                self.patch_jump(jump_past_body, self.instructions.len());
            }
            IrInstruction::Switch { condition, cases, default } => {
                let condition = self.offset_of(*condition);
                let mut exit_jumps = Vec::new();
                for case in cases {
                    let jump_over = self.emit(Instruction::JumpOnCaseMismatch {
                        target: 0,
                        condition,
                        value: case.value,
                    });
                    self.compile_block(case.block);
                    exit_jumps.push(self.emit(Instruction::Jump { target: 0 }));
                    self.patch_jump(jump_over, self.instructions.len());
                }
                self.compile_block(*default);
                let end = self.instructions.len();
                for jump in exit_jumps {
                    self.patch_jump(jump, end);
                }
            }
            IrInstruction::Block(inner) => self.compile_block(*inner),
            IrInstruction::Label(label) => {
                self.label_locations.insert(*label, self.instructions.len());
            }
            IrInstruction::Goto(label) => {
                let idx = self.emit(Instruction::Jump { target: 0 });
                self.fill_out_gotos.push((idx, *label));
            }
            IrInstruction::Return(ret) => self.compile_return(ret),
            IrInstruction::Move { destination, source } => {
                let size = self.size_of(destination).max(self.size_of(source));
                let dest = self.offset_of(*destination);
                let src = self.offset_of(*source);
                self.emit(Instruction::MoveStackData { dest, src, size });
            }
            IrInstruction::Cast { kind, destination, source } => {
                let dest_ty = self.bytecode_type_of(self.type_of(destination));
                let src_ty = self.bytecode_type_of(self.type_of(source));
                let dest = self.offset_of(*destination);
                let src = self.offset_of(*source);
                let kind = match kind {
                    upp_ir::CastKind::Floats => CastKind::FloatDifferentSize,
                    upp_ir::CastKind::FloatToInt => CastKind::FloatToInteger,
                    upp_ir::CastKind::IntToFloat => CastKind::IntegerToFloat,
                    _ => CastKind::IntegerDifferentSize,
                };
                self.emit(Instruction::Cast { kind, dest, src, dest_type: dest_ty, src_type: src_ty });
            }
            IrInstruction::AddressOf { destination, source } => {
                let dest = self.offset_of(*destination);
                let register = self.offset_of(*source);
                self.emit(Instruction::LoadRegisterAddress { dest, register });
            }
            IrInstruction::LoadImmediate { destination, value } => {
                let ty = self.bytecode_type_of(self.type_of(destination));
                let dest = self.offset_of(*destination);
                self.emit(Instruction::LoadImmediate { dest, value: *value, ty });
            }
            IrInstruction::ReadMemory { destination, address, size } => {
                let dest = self.offset_of(*destination);
                let address = self.offset_of(*address);
                self.emit(Instruction::ReadMemory { dest, address, size: *size });
            }
            IrInstruction::WriteMemory { address, value, size } => {
                let address = self.offset_of(*address);
                let value = self.offset_of(*value);
                self.emit(Instruction::WriteMemory { address, value, size: *size });
            }
            IrInstruction::UnaryOp { kind, destination, source } => {
                let ty = self.bytecode_type_of(self.type_of(source));
                let dest = self.offset_of(*destination);
                let src = self.offset_of(*source);
                match kind {
                    upp_ir::UnaryOpKind::Negate => self.emit(Instruction::UnaryNegate { dest, src, ty }),
                    upp_ir::UnaryOpKind::Not => self.emit(Instruction::UnaryNot { dest, src, ty }),
                };
            }
            IrInstruction::BinaryOp { op, destination, lhs, rhs } => {
                let ty = self.bytecode_type_of(self.type_of(lhs));
                let dest = self.offset_of(*destination);
                let lhs = self.offset_of(*lhs);
                let rhs = self.offset_of(*rhs);
                self.emit(binary_instruction(*op, dest, lhs, rhs, ty));
            }
        }
    }

    fn compile_call(&mut self, call: &upp_ir::Call) {
        let frame_offset = self.frame().frame_size as i32;
        for (i, arg) in call.arguments.iter().enumerate() {
            let src = self.offset_of(*arg);
            let size = self.size_of(arg);
            self.emit(Instruction::MoveStackData { dest: frame_offset + i as i32 * 8, src, size });
        }
        match &call.target {
            CallTarget::Function(target) => {
                let callee_frame = self.frames.get(target).map(|f| f.frame_size).unwrap_or(0);
                self.maximum_function_stack_depth =
                    self.maximum_function_stack_depth.max(frame_offset as u32 + callee_frame);
                let idx = self.emit(Instruction::CallFunction { target: 0, frame_offset });
                self.fill_out_calls.push((idx, *target));
            }
            CallTarget::FunctionPointer(access) => {
                let src = self.offset_of(*access);
                self.emit(Instruction::CallFunctionPointer { src, frame_offset });
            }
            CallTarget::Hardcoded(name) => {
                if let Some(function) = HardcodedFunction::by_name(name) {
                    self.emit(Instruction::CallHardcoded { function, frame_offset });
                }
            }
        }
        if !matches!(call.destination.kind, DataAccessKind::Nothing) {
            let dest = self.offset_of(call.destination);
            let size = self.size_of(&call.destination);
            self.emit(Instruction::LoadReturnValue { dest, size });
        }
    }

    fn compile_return(&mut self, ret: &IrReturn) {
        match ret {
            IrReturn::Exit(code) => {
                self.emit(Instruction::Exit { code: code.clone() });
            }
            IrReturn::Empty => {
                self.emit(Instruction::Return { value: -1, size: 0 });
            }
            IrReturn::Data(access) => {
                let size = self.size_of(access);
                let value = self.offset_of(*access);
                self.emit(Instruction::Return { value, size });
            }
        }
    }

    fn patch_jump(&mut self, index: usize, target: usize) {
        match &mut self.instructions[index] {
            Instruction::Jump { target: t }
            | Instruction::JumpOnTrue { target: t, .. }
            | Instruction::JumpOnFalse { target: t, .. }
            | Instruction::JumpOnCaseMismatch { target: t, .. } => {
                *t = target;
            }
            _ => {}
        }
    }

    fn resolve_references(&mut self) {
        for (idx, label) in self.fill_out_gotos.clone() {
            if let Some(target) = self.label_locations.get(&label).copied() {
                self.patch_jump(idx, target);
            }
        }
        for (idx, function) in self.fill_out_calls.clone() {
            if let Some(location) = self.function_locations.get(&function).copied() {
                if let Instruction::CallFunction { target, .. } = &mut self.instructions[idx] {
                    *target = location;
                }
            }
        }
        for (idx, function) in self.fill_out_function_ptr_loads.clone() {
            if let Some(location) = self.function_locations.get(&function).copied() {
                if let Instruction::LoadFunctionLocation { function, .. } = &mut self.instructions[idx] {
                    *function = location;
                }
            }
        }
    }
}

fn binary_instruction(op: upp_parser::BinaryOp, dest: i32, lhs: i32, rhs: i32, ty: BytecodeType) -> Instruction {
    use upp_parser::BinaryOp::*;
    match op {
        Add => Instruction::BinaryAdd { dest, lhs, rhs, ty },
        Sub => Instruction::BinarySub { dest, lhs, rhs, ty },
        Mul => Instruction::BinaryMul { dest, lhs, rhs, ty },
        Div => Instruction::BinaryDiv { dest, lhs, rhs, ty },
        Mod => Instruction::BinaryMod { dest, lhs, rhs, ty },
        Eq => Instruction::BinaryEqual { dest, lhs, rhs, ty },
        Ne => Instruction::BinaryNotEqual { dest, lhs, rhs, ty },
        Gt => Instruction::BinaryGreater { dest, lhs, rhs, ty },
        Ge => Instruction::BinaryGreaterEqual { dest, lhs, rhs, ty },
        Lt => Instruction::BinaryLess { dest, lhs, rhs, ty },
        Le => Instruction::BinaryLessEqual { dest, lhs, rhs, ty },
        And => Instruction::BinaryAnd { dest, lhs, rhs, ty },
        Or => Instruction::BinaryOr { dest, lhs, rhs, ty },
        BitAnd => Instruction::BinaryBitAnd { dest, lhs, rhs, ty },
        BitOr => Instruction::BinaryBitOr { dest, lhs, rhs, ty },
        BitXor => Instruction::BinaryBitXor { dest, lhs, rhs, ty },
        Shl => Instruction::BinaryShl { dest, lhs, rhs, ty },
        Shr => Instruction::BinaryShr { dest, lhs, rhs, ty },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upp_ir::IrFunction;

    fn sample_program() -> (IrProgram, TypeRegistry) {
        let mut types = TypeRegistry::new();
        let mut program = IrProgram::new();
        let entry = program.alloc_block();
        let answer_reg = program.block_mut(entry).add_register(types.default_int());
        let signature = types.intern(
            TypeKind::FunctionPointer {
                signature: upp_types::FunctionSignature { params: Vec::new(), return_type: types.default_int() },
                is_direct: true,
            },
            upp_types::Modifiers::none(),
        );
        let function = IrFunction { name: upp_common::Ident::error_placeholder(), signature, entry };
        let id = program.add_function(function);
        program.entry_function = Some(id);
        program.block_mut(entry).push(IrInstruction::Return(IrReturn::Data(DataAccess::register(entry, answer_reg))));
        (program, types)
    }

    #[test]
    fn compiling_a_function_records_its_entry_location() {
        let (program, types) = sample_program();
        let bytecode = compile_program(&program, &types);
        assert!(bytecode.entry_point.is_some());
        assert!(!bytecode.instructions.is_empty());
    }

    #[test]
    fn a_lone_return_statement_lowers_to_one_return_instruction() {
        let (program, types) = sample_program();
        let bytecode = compile_program(&program, &types);
        assert!(matches!(bytecode.instructions.last(), Some(Instruction::Return { .. })));
    }
}
