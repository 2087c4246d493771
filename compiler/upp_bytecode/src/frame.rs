//! Stack-frame layout: assigns a byte offset to every parameter and
//! register of a function before any bytecode is emitted, following the
//! frame shape `[param0]…[paramN][return address][saved stack pointer]
//! [reg0][reg1]…`. Offsets are assigned greedily: each slot is placed at
//! the next multiple of its own alignment, and the free offset then
//! advances by the slot's size.

use hashbrown::HashMap;
use upp_ir::{BlockId, FunctionId, Instruction, IrProgram};
use upp_types::{layout_of, TypeKind, TypeRegistry};

const FRAME_HEADER_SIZE: u32 = 16; // return address + saved stack pointer

pub fn align_offset_next_multiple(offset: u32, alignment: u32) -> u32 {
    if alignment <= 1 {
        return offset;
    }
    (offset + alignment - 1) / alignment * alignment
}

#[derive(Debug, Clone, Default)]
pub struct FunctionFrame {
    pub parameter_offsets: Vec<i32>,
    pub register_offsets: HashMap<BlockId, Vec<i32>>,
    pub frame_size: u32,
}

/// Every block reachable from `entry` by following the control-flow edges
/// an `If`/`While`/`Switch` instruction carries, in the order a recursive
/// compile pass would first visit them.
pub fn reachable_blocks(program: &IrProgram, entry: BlockId) -> Vec<BlockId> {
    let mut seen = hashbrown::HashSet::new();
    let mut order = Vec::new();
    collect_blocks(program, entry, &mut seen, &mut order);
    order
}

fn collect_blocks(program: &IrProgram, block: BlockId, seen: &mut hashbrown::HashSet<BlockId>, out: &mut Vec<BlockId>) {
    if !seen.insert(block) {
        return;
    }
    out.push(block);
    for instruction in &program.block(block).instructions {
        match instruction {
            Instruction::If { then_block, else_block, .. } => {
                collect_blocks(program, *then_block, seen, out);
                collect_blocks(program, *else_block, seen, out);
            }
            Instruction::While { condition_block, body, .. } => {
                collect_blocks(program, *condition_block, seen, out);
                collect_blocks(program, *body, seen, out);
            }
            Instruction::Switch { cases, default, .. } => {
                for case in cases {
                    collect_blocks(program, case.block, seen, out);
                }
                collect_blocks(program, *default, seen, out);
            }
            Instruction::Block(inner) => collect_blocks(program, *inner, seen, out),
            _ => {}
        }
    }
}

pub fn layout_function(
    program: &IrProgram,
    types: &TypeRegistry,
    function_id: FunctionId,
) -> FunctionFrame {
    let function = program.function(function_id);
    let mut offset = 0u32;

    let param_types: Vec<_> = match types.kind(function.signature) {
        TypeKind::FunctionPointer { signature, .. } => signature.params.clone(),
        _ => Vec::new(),
    };
    let mut parameter_offsets = Vec::with_capacity(param_types.len());
    for param_ty in &param_types {
        let layout = layout_of(types, *param_ty);
        offset = align_offset_next_multiple(offset, layout.align.max(1));
        parameter_offsets.push(offset as i32);
        offset += layout.size;
    }

    offset = align_offset_next_multiple(offset, 8) + FRAME_HEADER_SIZE;

    let mut register_offsets = HashMap::new();
    for block_id in reachable_blocks(program, function.entry) {
        let block = program.block(block_id);
        let mut offsets = Vec::with_capacity(block.registers.len());
        for reg_ty in &block.registers {
            let layout = layout_of(types, *reg_ty);
            offset = align_offset_next_multiple(offset, layout.align.max(1));
            offsets.push(offset as i32);
            offset += layout.size;
        }
        register_offsets.insert(block_id, offsets);
    }

    offset = align_offset_next_multiple(offset, 8);

    FunctionFrame { parameter_offsets, register_offsets, frame_size: offset }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_within_a_block_never_overlap() {
        let mut program = IrProgram::new();
        let types = TypeRegistry::new();
        let entry = program.alloc_block();
        program.block_mut(entry).add_register(types.unknown());
        program.block_mut(entry).add_register(types.default_int());
        let function = upp_ir::IrFunction {
            name: upp_common::Ident::error_placeholder(),
            signature: types.unknown(),
            entry,
        };
        let id = program.add_function(function);
        let frame = layout_function(&program, &types, id);
        let offsets = &frame.register_offsets[&entry];
        assert_eq!(offsets.len(), 2);
        assert_ne!(offsets[0], offsets[1]);
    }
}
