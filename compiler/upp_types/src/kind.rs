//! The shapes a canonical type can take, independent of interning.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use upp_common::Ident;

use crate::registry::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bool,
}

impl PrimitiveType {
    pub fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64)
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, Self::F32 | Self::F64 | Self::Bool)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Bool => "bool",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArrayCount {
    Known(u32),
    /// Unresolved element count: a polymorphic `$N` not yet bound, or the
    /// result of an earlier error.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub params: Vec<TypeId>,
    pub return_type: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructMember {
    pub name: Ident,
    pub ty: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructSubtypeShape {
    pub name: Ident,
    pub members: Vec<StructMember>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructShape {
    pub name: Ident,
    pub members: Vec<StructMember>,
    /// Tagged-union children; empty for a plain struct.
    pub subtypes: Vec<StructSubtypeShape>,
    pub discriminant: Option<Ident>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumShape {
    pub name: Ident,
    pub variants: Vec<Ident>,
}

/// The base shape of a type, before const/subtype-refinement modifiers are
/// applied. Recursive references go through [`TypeId`] so the registry, not
/// this enum, owns sharing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Void,
    Primitive(PrimitiveType),
    Pointer(TypeId),
    Optional(TypeId),
    FunctionPointer { signature: FunctionSignature, is_direct: bool },
    Array { element: TypeId, count: ArrayCount },
    Slice { element: TypeId },
    Struct(StructShape),
    Enum(EnumShape),
    /// The type of a value that names a type at runtime (`Type`, as in
    /// `comptime T: Type`).
    TypeHandle,
    /// A type-erased value: a data pointer paired with a type handle.
    Any,
    /// An opaque word-sized pointer value with no pointee type.
    Address,
    Unknown,
}

/// Modifiers attach to a base [`TypeKind`] orthogonally: two types are
/// semantically equal iff both their kind and their modifiers are equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    pub is_const: bool,
    /// Indices into nested `StructShape::subtypes`, outermost first.
    /// Refines a tagged-union struct type down to one branch.
    pub subtype_path: SmallVec<[u32; 2]>,
}

impl Modifiers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_const(mut self) -> Self {
        self.is_const = true;
        self
    }

    pub fn with_subtype(mut self, index: u32) -> Self {
        self.subtype_path.push(index);
        self
    }
}
