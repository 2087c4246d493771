//! Flat bytecode instructions. Each carries a kind tag plus up to four
//! integer operands, mirroring the originating design's fixed-shape
//! `Bytecode_Instruction`, generalized to a Rust enum so each operand is
//! named instead of positional.

use crate::bytecode_type::BytecodeType;
use crate::hardcoded::HardcodedFunction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    IntegerDifferentSize,
    FloatDifferentSize,
    FloatToInteger,
    IntegerToFloat,
}

#[derive(Debug, Clone)]
pub enum Instruction {
    MoveStackData { dest: i32, src: i32, size: u32 },
    WriteMemory { address: i32, value: i32, size: u32 },
    ReadMemory { dest: i32, address: i32, size: u32 },
    MemoryCopy { dest_address: i32, src_address: i32, size: u32 },
    ReadGlobal { dest: i32, global: u32, size: u32 },
    WriteGlobal { global: u32, src: i32, size: u32 },
    ReadConstant { dest: i32, constant: u32, size: u32 },

    Jump { target: usize },
    JumpOnTrue { target: usize, condition: i32 },
    JumpOnFalse { target: usize, condition: i32 },
    /// Reads the `Bytecode_Type::I64`-sized value at `condition` and jumps
    /// to `target` unless it equals `value`: a switch case test.
    JumpOnCaseMismatch { target: usize, condition: i32, value: i64 },

    CallFunction { target: usize, frame_offset: i32 },
    CallFunctionPointer { src: i32, frame_offset: i32 },
    CallHardcoded { function: HardcodedFunction, frame_offset: i32 },
    Return { value: i32, size: u32 },
    Exit { code: upp_ir::ExitCode },

    LoadReturnValue { dest: i32, size: u32 },
    LoadRegisterAddress { dest: i32, register: i32 },
    LoadGlobalAddress { dest: i32, global: u32 },
    LoadFunctionLocation { dest: i32, function: usize },
    LoadConstantAddress { dest: i32, constant: u32 },
    /// Writes a compile-time-known value straight into `dest`, typed by
    /// `ty`. The only bytecode-level source of a constant: there is no
    /// constant pool backing `ReadConstant` yet.
    LoadImmediate { dest: i32, value: i64, ty: BytecodeType },

    Cast { kind: CastKind, dest: i32, src: i32, dest_type: BytecodeType, src_type: BytecodeType },

    BinaryAdd { dest: i32, lhs: i32, rhs: i32, ty: BytecodeType },
    BinarySub { dest: i32, lhs: i32, rhs: i32, ty: BytecodeType },
    BinaryMul { dest: i32, lhs: i32, rhs: i32, ty: BytecodeType },
    BinaryDiv { dest: i32, lhs: i32, rhs: i32, ty: BytecodeType },
    BinaryMod { dest: i32, lhs: i32, rhs: i32, ty: BytecodeType },
    BinaryEqual { dest: i32, lhs: i32, rhs: i32, ty: BytecodeType },
    BinaryNotEqual { dest: i32, lhs: i32, rhs: i32, ty: BytecodeType },
    BinaryGreater { dest: i32, lhs: i32, rhs: i32, ty: BytecodeType },
    BinaryGreaterEqual { dest: i32, lhs: i32, rhs: i32, ty: BytecodeType },
    BinaryLess { dest: i32, lhs: i32, rhs: i32, ty: BytecodeType },
    BinaryLessEqual { dest: i32, lhs: i32, rhs: i32, ty: BytecodeType },
    BinaryAnd { dest: i32, lhs: i32, rhs: i32, ty: BytecodeType },
    BinaryOr { dest: i32, lhs: i32, rhs: i32, ty: BytecodeType },
    BinaryBitAnd { dest: i32, lhs: i32, rhs: i32, ty: BytecodeType },
    BinaryBitOr { dest: i32, lhs: i32, rhs: i32, ty: BytecodeType },
    BinaryBitXor { dest: i32, lhs: i32, rhs: i32, ty: BytecodeType },
    BinaryShl { dest: i32, lhs: i32, rhs: i32, ty: BytecodeType },
    BinaryShr { dest: i32, lhs: i32, rhs: i32, ty: BytecodeType },

    UnaryNegate { dest: i32, src: i32, ty: BytecodeType },
    UnaryNot { dest: i32, src: i32, ty: BytecodeType },
}
