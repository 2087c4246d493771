//! Bundles every piece of global mutable state one compilation shares:
//! the identifier pool, constant pool, type registry, and scheduler.
//! Passed by `&mut` reference to every phase rather than living in statics.

use upp_common::{Diagnostics, IdentPool};
use upp_types::{ConstantPool, TypeRegistry};

use crate::context::ContextChange;
use crate::dependency::DependencyAnalyser;
use crate::poly::InstantiationCache;
use crate::scheduler::Scheduler;

pub struct Compiler {
    pub idents: IdentPool,
    pub constants: ConstantPool,
    pub types: TypeRegistry,
    pub scheduler: Scheduler,
    pub dependencies: DependencyAnalyser,
    pub instantiations: InstantiationCache,
    pub root_context: ContextChange,
    pub diagnostics: Diagnostics,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            idents: IdentPool::new(),
            constants: ConstantPool::new(),
            types: TypeRegistry::new(),
            scheduler: Scheduler::new(),
            dependencies: DependencyAnalyser::new(),
            instantiations: InstantiationCache::new(),
            root_context: ContextChange::root(),
            diagnostics: Diagnostics::new(),
        }
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_compiler_has_well_known_types_preinterned() {
        let compiler = Compiler::new();
        assert_ne!(compiler.types.void(), compiler.types.unknown());
    }
}
