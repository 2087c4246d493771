//! Dependency analysis, fiber-style workload scheduling, and semantic
//! analysis (types, casts, overload resolution, polymorphism, bake).

mod analyser;
mod bake;
mod cast;
mod compiler;
mod context;
mod dependency;
mod infer;
mod item;
mod overload;
mod poly;
mod scheduler;
mod symbol;

pub use analyser::run_definitions;
pub use bake::{run_bake, BakeError, BakeRunner};
pub use cast::{classify, CastKind};
pub use compiler::Compiler;
pub use context::{ContextChange, ContextOption};
pub use dependency::{DependencyAnalyser, DuplicateDefinition};
pub use infer::{OperatorOverload, TypeChecker};
pub use item::{
    AnalysisItem, AnalysisItemArena, AnalysisItemId, AnalysisItemKind, DependencyKind, ItemState,
    SymbolDependency,
};
pub use overload::{
    Binding, CallArg, Callable, CallableParam, MatchResult, OverloadError, resolve as resolve_overload,
};
pub use poly::{unify_pattern, InstantiationCache, InstantiationKey};
pub use scheduler::{Driver, RequiredState, ResumeToken, Scheduler, StepOutcome};
pub use symbol::{Symbol, SymbolArena, SymbolId, SymbolKind, SymbolTableId};
