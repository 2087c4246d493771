//! The fixed set of intrinsics available by name in any compilation,
//! dispatched by the interpreter instead of by a called function's own
//! bytecode.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardcodedFunction {
    Assert,
    Panic,
    SizeOf,
    AlignOf,
    TypeOf,
    TypeInfo,
    ReturnType,
    StructTag,
    MemoryCopy,
    MemoryZero,
    MemoryCompare,
    SystemAlloc,
    SystemFree,
    BitwiseNot,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseShiftLeft,
    BitwiseShiftRight,
    PrintI32,
    PrintF32,
    PrintBool,
    PrintString,
    PrintLine,
    ReadI32,
    ReadF32,
    ReadBool,
    RandomI32,
}

impl HardcodedFunction {
    pub fn by_name(name: &str) -> Option<Self> {
        Some(match name {
            "assert" => Self::Assert,
            "panic" => Self::Panic,
            "size_of" => Self::SizeOf,
            "align_of" => Self::AlignOf,
            "type_of" => Self::TypeOf,
            "type_info" => Self::TypeInfo,
            "return_type" => Self::ReturnType,
            "struct_tag" => Self::StructTag,
            "memory_copy" => Self::MemoryCopy,
            "memory_zero" => Self::MemoryZero,
            "memory_compare" => Self::MemoryCompare,
            "system_alloc" => Self::SystemAlloc,
            "system_free" => Self::SystemFree,
            "bitwise_not" => Self::BitwiseNot,
            "bitwise_and" => Self::BitwiseAnd,
            "bitwise_or" => Self::BitwiseOr,
            "bitwise_xor" => Self::BitwiseXor,
            "bitwise_shift_left" => Self::BitwiseShiftLeft,
            "bitwise_shift_right" => Self::BitwiseShiftRight,
            "print_i32" => Self::PrintI32,
            "print_f32" => Self::PrintF32,
            "print_bool" => Self::PrintBool,
            "print_string" => Self::PrintString,
            "print_line" => Self::PrintLine,
            "read_i32" => Self::ReadI32,
            "read_f32" => Self::ReadF32,
            "read_bool" => Self::ReadBool,
            "random_i32" => Self::RandomI32,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_name_round_trips() {
        let names = [
            "assert", "panic", "size_of", "align_of", "type_of", "type_info", "return_type", "struct_tag",
            "memory_copy", "memory_zero", "memory_compare", "system_alloc", "system_free", "bitwise_not",
            "bitwise_and", "bitwise_or", "bitwise_xor", "bitwise_shift_left", "bitwise_shift_right", "print_i32",
            "print_f32", "print_bool", "print_string", "print_line", "read_i32", "read_f32", "read_bool",
            "random_i32",
        ];
        for name in names {
            assert!(HardcodedFunction::by_name(name).is_some(), "{name} should resolve");
        }
    }

    #[test]
    fn unknown_name_is_not_hardcoded() {
        assert!(HardcodedFunction::by_name("not_a_real_function").is_none());
    }
}
