//! A data access names a storage location rather than a materialised
//! value: a register in some block, a parameter slot, a global, or a
//! constant-pool entry. Lowering an expression that is already a
//! projection (member access, array index, dereference) yields the access
//! term directly instead of copying it into a fresh register, since a
//! projection is free: it names a place, it doesn't produce a value.

use upp_types::ConstantId;

use crate::ids::{BlockId, FunctionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataAccessKind {
    Global(u32),
    Parameter { function: FunctionId, index: u32 },
    Register { block: BlockId, index: u32 },
    Constant(ConstantId),
    /// The result of a call or statement that produces nothing.
    Nothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataAccess {
    pub kind: DataAccessKind,
    /// When true, the location holds a pointer and must be dereferenced
    /// to reach the value; address-of and dereference each flip this bit,
    /// so applying both in sequence cancels back to the original access.
    pub is_memory_access: bool,
}

impl DataAccess {
    pub fn register(block: BlockId, index: u32) -> Self {
        Self { kind: DataAccessKind::Register { block, index }, is_memory_access: false }
    }

    pub fn parameter(function: FunctionId, index: u32) -> Self {
        Self { kind: DataAccessKind::Parameter { function, index }, is_memory_access: false }
    }

    pub fn global(index: u32) -> Self {
        Self { kind: DataAccessKind::Global(index), is_memory_access: false }
    }

    pub fn constant(id: ConstantId) -> Self {
        Self { kind: DataAccessKind::Constant(id), is_memory_access: false }
    }

    pub fn nothing() -> Self {
        Self { kind: DataAccessKind::Nothing, is_memory_access: false }
    }

    /// Address-of: wraps this access one level deeper in indirection.
    pub fn addr_of(mut self) -> Self {
        self.is_memory_access = !self.is_memory_access;
        self
    }

    /// Dereference: same flip as `addr_of`, so `a.addr_of().deref() == a`.
    pub fn deref(self) -> Self {
        self.addr_of()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_of_then_deref_cancels_back_to_the_original() {
        let a = DataAccess::register(BlockId(0), 3);
        assert_eq!(a.addr_of().deref(), a);
    }

    #[test]
    fn fresh_access_is_a_direct_value_not_a_memory_access() {
        let mut pool = upp_types::ConstantPool::new();
        let registry = upp_types::TypeRegistry::new();
        let id = pool.intern_i64(registry.default_int(), 5);
        let a = DataAccess::constant(id);
        assert!(!a.is_memory_access);
    }
}
