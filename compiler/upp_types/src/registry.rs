//! Interns `(kind, modifiers)` pairs into [`TypeId`] handles. Handle
//! equality is semantic equality: the registry never hands out two ids for
//! the same pair.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::kind::{Modifiers, PrimitiveType, TypeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeId(u32);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ty#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TypeData {
    kind: TypeKind,
    modifiers: Modifiers,
}

pub struct TypeRegistry {
    entries: Vec<TypeData>,
    lookup: HashMap<TypeData, TypeId>,
    void: TypeId,
    unknown: TypeId,
    bool_ty: TypeId,
    primitives: HashMap<PrimitiveType, TypeId>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut entries = Vec::new();
        let mut lookup = HashMap::new();
        let mut intern_bare = |entries: &mut Vec<TypeData>, lookup: &mut HashMap<TypeData, TypeId>, kind: TypeKind| {
            let data = TypeData { kind, modifiers: Modifiers::none() };
            let id = TypeId(entries.len() as u32);
            entries.push(data.clone());
            lookup.insert(data, id);
            id
        };
        let void = intern_bare(&mut entries, &mut lookup, TypeKind::Void);
        let unknown = intern_bare(&mut entries, &mut lookup, TypeKind::Unknown);
        let bool_ty = intern_bare(&mut entries, &mut lookup, TypeKind::Primitive(PrimitiveType::Bool));

        let mut registry = Self { entries, lookup, void, unknown, bool_ty, primitives: HashMap::new() };
        registry.primitives.insert(PrimitiveType::Bool, bool_ty);
        for prim in [
            PrimitiveType::I8,
            PrimitiveType::I16,
            PrimitiveType::I32,
            PrimitiveType::I64,
            PrimitiveType::U8,
            PrimitiveType::U16,
            PrimitiveType::U32,
            PrimitiveType::U64,
            PrimitiveType::F32,
            PrimitiveType::F64,
        ] {
            let id = registry.intern(TypeKind::Primitive(prim), Modifiers::none());
            registry.primitives.insert(prim, id);
        }
        registry
    }

    pub fn void(&self) -> TypeId {
        self.void
    }

    pub fn unknown(&self) -> TypeId {
        self.unknown
    }

    pub fn bool(&self) -> TypeId {
        self.bool_ty
    }

    pub fn primitive(&self, prim: PrimitiveType) -> TypeId {
        self.primitives[&prim]
    }

    /// Default width for a context-free integer literal.
    pub fn default_int(&self) -> TypeId {
        self.primitives[&PrimitiveType::I32]
    }

    pub fn intern(&mut self, kind: TypeKind, modifiers: Modifiers) -> TypeId {
        let data = TypeData { kind, modifiers };
        if let Some(id) = self.lookup.get(&data) {
            return *id;
        }
        let id = TypeId(self.entries.len() as u32);
        self.entries.push(data.clone());
        self.lookup.insert(data, id);
        id
    }

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.entries[id.0 as usize].kind
    }

    pub fn modifiers(&self, id: TypeId) -> &Modifiers {
        &self.entries[id.0 as usize].modifiers
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if `id` is a pointer, optional, or `any`: anything that can
    /// hold a null/empty representation.
    pub fn is_nullable(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Pointer(_) | TypeKind::Optional(_) | TypeKind::Any)
    }

    pub fn is_numeric(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Primitive(p) if p.is_integer() || p.is_float())
    }

    /// Structural equality ignoring a struct type's subtype refinement path.
    /// Used when checking whether a value may be widened back up to its
    /// tagged-union base.
    pub fn shares_struct_base(&self, a: TypeId, b: TypeId) -> bool {
        match (self.kind(a), self.kind(b)) {
            (TypeKind::Struct(sa), TypeKind::Struct(sb)) => sa.name == sb.name,
            _ => false,
        }
    }

    pub fn display(&self, id: TypeId) -> TypeDisplay<'_> {
        TypeDisplay { registry: self, id }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TypeDisplay<'a> {
    registry: &'a TypeRegistry,
    id: TypeId,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modifiers = self.registry.modifiers(self.id);
        if modifiers.is_const {
            write!(f, "const ")?;
        }
        match self.registry.kind(self.id) {
            TypeKind::Void => write!(f, "void"),
            TypeKind::Primitive(p) => write!(f, "{p}"),
            TypeKind::Pointer(inner) => write!(f, "*{}", self.registry.display(*inner)),
            TypeKind::Optional(inner) => write!(f, "?{}", self.registry.display(*inner)),
            TypeKind::FunctionPointer { signature, .. } => {
                write!(f, "(")?;
                for (i, p) in signature.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", self.registry.display(*p))?;
                }
                write!(f, ") -> {}", self.registry.display(signature.return_type))
            }
            TypeKind::Array { element, count } => match count {
                crate::kind::ArrayCount::Known(n) => write!(f, "[{n}]{}", self.registry.display(*element)),
                crate::kind::ArrayCount::Unknown => write!(f, "[?]{}", self.registry.display(*element)),
            },
            TypeKind::Slice { element } => write!(f, "[]{}", self.registry.display(*element)),
            TypeKind::Struct(shape) => write!(f, "struct#{}", shape.name.index()),
            TypeKind::Enum(shape) => write!(f, "enum#{}", shape.name.index()),
            TypeKind::TypeHandle => write!(f, "Type"),
            TypeKind::Any => write!(f, "any"),
            TypeKind::Address => write!(f, "address"),
            TypeKind::Unknown => write!(f, "<unknown>"),
        }?;
        if !modifiers.subtype_path.is_empty() {
            write!(f, " (subtype path {:?})", modifiers.subtype_path.as_slice())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_dedups_identical_shapes() {
        let mut reg = TypeRegistry::new();
        let a = reg.intern(TypeKind::Pointer(reg.default_int()), Modifiers::none());
        let b = reg.intern(TypeKind::Pointer(reg.default_int()), Modifiers::none());
        assert_eq!(a, b);
    }

    #[test]
    fn const_and_non_const_are_distinct() {
        let mut reg = TypeRegistry::new();
        let plain = reg.intern(TypeKind::Primitive(PrimitiveType::I32), Modifiers::none());
        let constant = reg.intern(TypeKind::Primitive(PrimitiveType::I32), Modifiers::none().with_const());
        assert_ne!(plain, constant);
    }

    #[test]
    fn well_known_ids_are_stable_across_calls() {
        let reg = TypeRegistry::new();
        assert_eq!(reg.void(), reg.void());
        assert_ne!(reg.void(), reg.unknown());
    }
}
