//! Parser crate: turns a token stream into an AST, never aborting on
//! malformed input.

mod ast;
mod parser;
mod precedence;

pub use ast::{
    Arg, BakeBody, BakeDef, BinaryOp, Block, Definition, EnumDef, EnumVariant, Expr, ExprKind,
    FunctionDef, Import, ImportKind, Item, ItemKind, Member, Module, NodeArena, NodeId, Param,
    Path, PolyParam, Stmt, StmtKind, StructDef, StructSubtype, SwitchCase, TypeExpr, TypeExprKind,
    UnaryOp,
};
pub use parser::{parse, ParseOutput, Parser};
pub use precedence::Precedence;
