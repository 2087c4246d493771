//! Polymorphic function instantiation: unifies `$T` pattern variables and
//! `comptime` parameter values against a call site, memoising the result so
//! the same combination always yields the same concrete instance.

use hashbrown::HashMap;
use upp_types::{ConstantId, TypeId};

use crate::item::AnalysisItemId;
use crate::symbol::SymbolId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstantiationKey {
    pub callable: SymbolId,
    pub comptime_values: Vec<ConstantId>,
    pub pattern_bindings: Vec<TypeId>,
}

/// Attempts to unify a pattern variable already bound to `existing` with a
/// new observed argument type `observed`. A pattern variable may only bind
/// once per call; a second, conflicting observation fails unification.
pub fn unify_pattern(existing: Option<TypeId>, observed: TypeId) -> Result<TypeId, ()> {
    match existing {
        None => Ok(observed),
        Some(bound) if bound == observed => Ok(bound),
        Some(_) => Err(()),
    }
}

#[derive(Debug, Default)]
pub struct InstantiationCache {
    instances: HashMap<InstantiationKey, AnalysisItemId>,
}

impl InstantiationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the memoised instance for `key`, if one was already produced.
    pub fn get(&self, key: &InstantiationKey) -> Option<AnalysisItemId> {
        self.instances.get(key).copied()
    }

    pub fn insert(&mut self, key: InstantiationKey, item: AnalysisItemId) {
        self.instances.insert(key, item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_binds_the_pattern_variable() {
        let reg = upp_types::TypeRegistry::new();
        let bound = unify_pattern(None, reg.default_int()).unwrap();
        assert_eq!(bound, reg.default_int());
    }

    #[test]
    fn conflicting_second_observation_fails() {
        let reg = upp_types::TypeRegistry::new();
        let i32_ty = reg.default_int();
        let bool_ty = reg.bool();
        assert!(unify_pattern(Some(i32_ty), bool_ty).is_err());
    }

    #[test]
    fn same_key_returns_the_memoised_instance() {
        let mut cache = InstantiationCache::new();
        let reg = upp_types::TypeRegistry::new();
        let key = InstantiationKey {
            callable: crate::symbol::SymbolId(0),
            comptime_values: vec![],
            pattern_bindings: vec![reg.default_int()],
        };
        let item = AnalysisItemId(3);
        cache.insert(key.clone(), item);
        assert_eq!(cache.get(&key), Some(item));
    }
}
