//! Drives analysis items to completion through the scheduler, running the
//! semantic pass (currently: type inference for top-level definitions) on
//! each one and suspending when a dependency isn't resolved yet.

use crate::compiler::Compiler;
use crate::infer::TypeChecker;
use crate::item::{AnalysisItemId, AnalysisItemKind, ItemState};
use crate::scheduler::{Driver, RequiredState, StepOutcome};
use crate::symbol::{SymbolId, SymbolKind};

/// Runs the full dependency + semantic pass over a parsed module already
/// fed to `compiler.dependencies`: top-level definitions are type-checked,
/// function headers and struct/enum declarations have their symbols
/// resolved once the names their signatures read are themselves resolved.
/// Returns the analysis items left permanently suspended, i.e. a dependency
/// cycle. Function bodies and bake execution aren't driven by this pass;
/// they're a later, IR-level concern (see `upp_cli`'s pipeline).
pub fn run_definitions(compiler: &mut Compiler) -> Vec<AnalysisItemId> {
    let ready: Vec<AnalysisItemId> = compiler
        .dependencies
        .items
        .ids()
        .filter(|id| {
            matches!(
                compiler.dependencies.items.get(*id).kind,
                AnalysisItemKind::Definition | AnalysisItemKind::Function | AnalysisItemKind::Structure
            )
        })
        .collect();
    for id in &ready {
        compiler.scheduler.enqueue(*id);
    }
    compiler.scheduler_run()
}

impl Compiler {
    fn scheduler_run(&mut self) -> Vec<AnalysisItemId> {
        // Scheduler::run needs `&mut dyn Driver`, but the driver itself
        // needs `&mut Compiler`. Split the borrow here so the scheduler
        // and the rest of the compiler state aren't borrowed through the
        // same path at once.
        let mut scheduler = std::mem::replace(&mut self.scheduler, crate::scheduler::Scheduler::new());
        let stuck = scheduler.run(&mut ActiveDriver { compiler: self });
        self.scheduler = scheduler;
        stuck
    }
}

struct ActiveDriver<'c> {
    compiler: &'c mut Compiler,
}

impl Driver for ActiveDriver<'_> {
    fn symbol_state(&self, symbol: SymbolId) -> (ItemState, bool) {
        let sym = self.compiler.dependencies.symbols.symbol(symbol);
        let is_defined = !matches!(sym.kind, SymbolKind::Unresolved { .. });
        (ItemState::Pending, is_defined)
    }

    fn step(&mut self, item: AnalysisItemId) -> StepOutcome {
        match self.compiler.dependencies.items.get(item).kind {
            AnalysisItemKind::Definition => self.step_definition(item),
            AnalysisItemKind::Function => self.step_function(item),
            AnalysisItemKind::Structure => self.step_structure(item),
            _ => StepOutcome::Complete,
        }
    }
}

impl ActiveDriver<'_> {
    fn step_definition(&mut self, item: AnalysisItemId) -> StepOutcome {
        let Some((table, expr)) = self.compiler.dependencies.definitions.get(&item).cloned() else {
            return StepOutcome::Complete;
        };
        if let Some(blocking) = first_unresolved_read(self.compiler, item) {
            return StepOutcome::Suspend { symbol: blocking, required: RequiredState::Defined };
        }
        let ty = {
            let mut checker = TypeChecker {
                registry: &self.compiler.types,
                symbols: &self.compiler.dependencies.symbols,
                diagnostics: &mut self.compiler.diagnostics,
                overloads: &[],
            };
            checker.infer(table, &expr)
        };
        if let Some(symbol) = self.compiler.dependencies.items.get(item).symbol {
            self.compiler.dependencies.symbols.resolve(symbol, SymbolKind::Constant { ty });
        }
        self.compiler.dependencies.items.get_mut(item).state = ItemState::Complete;
        StepOutcome::Complete
    }

    /// A function header's own symbol only needs its parameter and return
    /// types to name something defined; the body is a separate
    /// `FunctionBody` item and isn't type-checked by this pass (see
    /// `upp_ir`'s generator, which lowers and resolves it directly).
    fn step_function(&mut self, item: AnalysisItemId) -> StepOutcome {
        if let Some(blocking) = first_unresolved_read(self.compiler, item) {
            return StepOutcome::Suspend { symbol: blocking, required: RequiredState::Defined };
        }
        if let Some(symbol) = self.compiler.dependencies.items.get(item).symbol {
            let kind = match self.compiler.dependencies.function_poly_params.get(&item) {
                Some(count) if *count > 0 => SymbolKind::PolymorphicFunction { item },
                _ => SymbolKind::Function { item },
            };
            self.compiler.dependencies.symbols.resolve(symbol, kind);
        }
        self.compiler.dependencies.items.get_mut(item).state = ItemState::Complete;
        StepOutcome::Complete
    }

    /// A struct or enum's symbol only needs the names its member/variant
    /// types read to be defined. The struct's own layout (full
    /// `StructShape`/`EnumShape`, used to size and lay out values) is
    /// computed later, in `upp_ir`'s generator, which has the type-expr
    /// resolver this pass doesn't duplicate.
    fn step_structure(&mut self, item: AnalysisItemId) -> StepOutcome {
        if let Some(blocking) = first_unresolved_read(self.compiler, item) {
            return StepOutcome::Suspend { symbol: blocking, required: RequiredState::Defined };
        }
        if let Some(symbol) = self.compiler.dependencies.items.get(item).symbol {
            let ty = self.compiler.types.unknown();
            self.compiler.dependencies.symbols.resolve(symbol, SymbolKind::Type { ty });
        }
        self.compiler.dependencies.items.get_mut(item).state = ItemState::Complete;
        StepOutcome::Complete
    }
}

fn first_unresolved_read(compiler: &Compiler, item: AnalysisItemId) -> Option<SymbolId> {
    compiler.dependencies.items.get(item).symbol_reads.iter().find_map(|dep| {
        matches!(compiler.dependencies.symbols.symbol(dep.symbol).kind, SymbolKind::Unresolved { .. })
            .then_some(dep.symbol)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use upp_parser::parse;

    #[test]
    fn independent_definitions_all_complete() {
        let mut compiler = Compiler::new();
        let (output, _) = parse("a :: 1; b :: 2;", 0, &mut compiler.idents);
        compiler.dependencies.analyse_module(&output.module);
        let stuck = run_definitions(&mut compiler);
        assert!(stuck.is_empty());
    }

    #[test]
    fn a_definition_resolves_after_the_one_it_depends_on() {
        let mut compiler = Compiler::new();
        let (output, _) = parse("limit :: 5; double :: limit * 2;", 0, &mut compiler.idents);
        compiler.dependencies.analyse_module(&output.module);
        let stuck = run_definitions(&mut compiler);
        assert!(stuck.is_empty());
        let name = compiler.idents.intern("double");
        let symbol = compiler.dependencies.symbols.lookup(compiler.dependencies.root_table, name).unwrap();
        assert!(matches!(compiler.dependencies.symbols.symbol(symbol).kind, SymbolKind::Constant { .. }));
    }

    #[test]
    fn reference_to_a_name_that_was_never_defined_completes_with_a_diagnostic() {
        let mut compiler = Compiler::new();
        let (output, _) = parse("orphan :: missing_name;", 0, &mut compiler.idents);
        compiler.dependencies.analyse_module(&output.module);
        let stuck = run_definitions(&mut compiler);
        assert!(stuck.is_empty());
        assert!(!compiler.diagnostics.is_empty());
    }
}
