//! Canonical, pool-interned type system: type shapes, the interning
//! registry, size/alignment layout, and the compile-time constant pool.

mod constant;
mod kind;
mod layout;
mod registry;

pub use constant::{ConstantId, ConstantPool};
pub use kind::{
    ArrayCount, EnumShape, FunctionSignature, Modifiers, PrimitiveType, StructMember, StructShape,
    StructSubtypeShape, TypeKind,
};
pub use layout::{layout_of, primitive_layout, struct_member_offsets, Layout};
pub use registry::{TypeDisplay, TypeId, TypeRegistry};
