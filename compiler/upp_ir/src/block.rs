//! A code block owns its own register file and instruction stream;
//! nested scopes (the branches of an `if`, a loop body) are separate
//! blocks rather than ranges within one flat list.

use upp_types::TypeId;

use crate::instruction::Instruction;

#[derive(Debug, Clone, Default)]
pub struct IrCodeBlock {
    pub registers: Vec<TypeId>,
    pub instructions: Vec<Instruction>,
}

impl IrCodeBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_register(&mut self, ty: TypeId) -> u32 {
        let index = self.registers.len() as u32;
        self.registers.push(ty);
        index
    }

    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }
}
