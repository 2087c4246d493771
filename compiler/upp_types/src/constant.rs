//! Process-wide pool of compile-time constant values, deduped by
//! `(type, bytes)` so two identical literals share one id.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::registry::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConstantId(u32);

impl fmt::Display for ConstantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "const#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ConstantKey {
    ty: TypeId,
    bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct ConstantPool {
    entries: Vec<ConstantKey>,
    lookup: HashMap<ConstantKey, ConstantId>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a little-endian byte payload under `ty`, returning the
    /// existing id if an identical `(ty, bytes)` pair was already seen.
    pub fn intern(&mut self, ty: TypeId, bytes: Vec<u8>) -> ConstantId {
        let key = ConstantKey { ty, bytes };
        if let Some(id) = self.lookup.get(&key) {
            return *id;
        }
        let id = ConstantId(self.entries.len() as u32);
        self.entries.push(key.clone());
        self.lookup.insert(key, id);
        id
    }

    pub fn intern_i64(&mut self, ty: TypeId, value: i64) -> ConstantId {
        self.intern(ty, value.to_le_bytes().to_vec())
    }

    pub fn intern_f64(&mut self, ty: TypeId, value: f64) -> ConstantId {
        self.intern(ty, value.to_le_bytes().to_vec())
    }

    pub fn intern_bool(&mut self, ty: TypeId, value: bool) -> ConstantId {
        self.intern(ty, vec![value as u8])
    }

    pub fn intern_bytes_literal(&mut self, ty: TypeId, value: &[u8]) -> ConstantId {
        self.intern(ty, value.to_vec())
    }

    pub fn ty(&self, id: ConstantId) -> TypeId {
        self.entries[id.0 as usize].ty
    }

    pub fn bytes(&self, id: ConstantId) -> &[u8] {
        &self.entries[id.0 as usize].bytes
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{Modifiers, PrimitiveType, TypeKind};
    use crate::registry::TypeRegistry;

    #[test]
    fn identical_values_under_the_same_type_dedup() {
        let reg = TypeRegistry::new();
        let i32_ty = reg.primitive(PrimitiveType::I32);
        let mut pool = ConstantPool::new();
        let a = pool.intern_i64(i32_ty, 42);
        let b = pool.intern_i64(i32_ty, 42);
        assert_eq!(a, b);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn same_bytes_under_different_types_are_distinct() {
        let mut reg = TypeRegistry::new();
        let i32_ty = reg.primitive(PrimitiveType::I32);
        let const_i32 = reg.intern(TypeKind::Primitive(PrimitiveType::I32), Modifiers::none().with_const());
        let mut pool = ConstantPool::new();
        let a = pool.intern_i64(i32_ty, 7);
        let b = pool.intern_i64(const_i32, 7);
        assert_ne!(a, b);
    }

    #[test]
    fn round_trips_stored_bytes() {
        let reg = TypeRegistry::new();
        let f64_ty = reg.primitive(PrimitiveType::F64);
        let mut pool = ConstantPool::new();
        let id = pool.intern_f64(f64_ty, 3.5);
        assert_eq!(f64::from_le_bytes(pool.bytes(id).try_into().unwrap()), 3.5);
        assert_eq!(pool.ty(id), f64_ty);
    }
}
