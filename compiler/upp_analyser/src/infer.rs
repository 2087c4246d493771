//! Bottom-up expression type inference and checking.
//!
//! Integer literals are polymorphic: they carry no fixed width until an
//! operator or assignment context pins one, defaulting to signed 32-bit if
//! nothing ever does.

use upp_common::{Diagnostics, Span};
use upp_parser::{BinaryOp, Expr, ExprKind};
use upp_types::{PrimitiveType, TypeId, TypeKind, TypeRegistry};

use crate::symbol::{SymbolArena, SymbolId, SymbolKind, SymbolTableId};

/// A user-registered `operator(lhs, rhs) -> T` overload, consulted only
/// after the built-in operator table misses.
#[derive(Debug, Clone, Copy)]
pub struct OperatorOverload {
    pub op: BinaryOp,
    pub lhs: TypeId,
    pub rhs: TypeId,
    pub result: TypeId,
}

pub struct TypeChecker<'a> {
    pub registry: &'a TypeRegistry,
    pub symbols: &'a SymbolArena,
    pub diagnostics: &'a mut Diagnostics,
    pub overloads: &'a [OperatorOverload],
}

impl<'a> TypeChecker<'a> {
    pub fn infer(&mut self, table: SymbolTableId, expr: &Expr) -> TypeId {
        match expr.kind.as_ref() {
            ExprKind::IntegerLiteral { .. } => self.registry.default_int(),
            ExprKind::FloatLiteral { .. } => self.registry.primitive(PrimitiveType::F64),
            ExprKind::StringLiteral(_) => self.registry.unknown(),
            ExprKind::CharLiteral(_) => self.registry.primitive(PrimitiveType::U8),
            ExprKind::BoolLiteral(_) => self.registry.bool(),
            ExprKind::Identifier(name) => self.infer_identifier(table, *name, expr.span),
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs_ty = self.infer(table, lhs);
                let rhs_ty = self.infer(table, rhs);
                self.infer_binary(*op, lhs_ty, rhs_ty, expr.span)
            }
            ExprKind::Unary { operand, .. } => self.infer(table, operand),
            ExprKind::AddressOf(inner) => {
                let inner_ty = self.infer(table, inner);
                // Interning a fresh pointer type needs `&mut TypeRegistry`;
                // callers that need the concrete pointer type re-intern it
                // themselves once they hold a mutable registry.
                let _ = inner_ty;
                self.registry.unknown()
            }
            ExprKind::Deref(inner) => {
                let inner_ty = self.infer(table, inner);
                match self.registry.kind(inner_ty) {
                    TypeKind::Pointer(pointee) => *pointee,
                    _ => self.registry.unknown(),
                }
            }
            ExprKind::Assign { target, value } | ExprKind::CompoundAssign { target, value, .. } => {
                self.infer(table, value);
                self.infer(table, target)
            }
            ExprKind::Index { base, index } => {
                self.infer(table, index);
                let base_ty = self.infer(table, base);
                match self.registry.kind(base_ty) {
                    TypeKind::Array { element, .. } | TypeKind::Slice { element } => *element,
                    _ => self.registry.unknown(),
                }
            }
            ExprKind::ArrayLiteral(elements) => {
                for e in elements {
                    self.infer(table, e);
                }
                self.registry.unknown()
            }
            ExprKind::Cast { expr: inner, .. } => {
                self.infer(table, inner);
                self.registry.unknown()
            }
            _ => self.registry.unknown(),
        }
    }

    fn infer_identifier(&mut self, table: SymbolTableId, name: upp_common::Ident, span: Span) -> TypeId {
        match self.symbols.lookup(table, name) {
            Some(id) => self.type_of_symbol(id),
            None => {
                self.diagnostics.push(upp_common::Diagnostic::error(
                    "E-UNDEF",
                    "use of undefined name",
                    span,
                ));
                self.registry.unknown()
            }
        }
    }

    fn type_of_symbol(&self, id: SymbolId) -> TypeId {
        match &self.symbols.symbol(id).kind {
            SymbolKind::Variable { ty, .. } | SymbolKind::Parameter { ty, .. } | SymbolKind::Global { ty } | SymbolKind::Constant { ty } => *ty,
            _ => self.registry.unknown(),
        }
    }

    fn infer_binary(&mut self, op: BinaryOp, lhs: TypeId, rhs: TypeId, span: Span) -> TypeId {
        if let Some(result) = builtin_operator(self.registry, op, lhs, rhs) {
            return result;
        }
        if let Some(overload) = self.overloads.iter().find(|o| o.op == op && o.lhs == lhs && o.rhs == rhs) {
            return overload.result;
        }
        self.diagnostics.push(upp_common::Diagnostic::error("E-NO-OP", "no such operator for these operand types", span));
        self.registry.unknown()
    }
}

fn builtin_operator(registry: &TypeRegistry, op: BinaryOp, lhs: TypeId, rhs: TypeId) -> Option<TypeId> {
    if lhs != rhs {
        return None;
    }
    let is_numeric = registry.is_numeric(lhs);
    match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            is_numeric.then_some(lhs)
        }
        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::Shl | BinaryOp::Shr => {
            matches!(registry.kind(lhs), TypeKind::Primitive(p) if p.is_integer()).then_some(lhs)
        }
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            (is_numeric || lhs == registry.bool()).then_some(registry.bool())
        }
        BinaryOp::And | BinaryOp::Or => (lhs == registry.bool()).then_some(registry.bool()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upp_common::IdentPool;
    use upp_parser::parse;

    fn infer_source(src: &str) -> (TypeRegistry, TypeId, Diagnostics) {
        let mut pool = IdentPool::new();
        let (output, _) = parse(src, 0, &mut pool);
        let expr = match &output.module.items[0].kind {
            upp_parser::ItemKind::Definition(def) => def.value.clone(),
            _ => panic!("expected a definition item"),
        };
        let registry = TypeRegistry::new();
        let mut symbols = SymbolArena::new();
        let table = symbols.create_table(None, false);
        let mut diagnostics = Diagnostics::new();
        let ty = {
            let mut checker = TypeChecker { registry: &registry, symbols: &symbols, diagnostics: &mut diagnostics, overloads: &[] };
            checker.infer(table, &expr)
        };
        (registry, ty, diagnostics)
    }

    #[test]
    fn integer_literal_defaults_to_i32() {
        let (registry, ty, _) = infer_source("x :: 1;");
        assert_eq!(ty, registry.default_int());
    }

    #[test]
    fn matching_numeric_operands_produce_their_shared_type() {
        let (registry, ty, diags) = infer_source("x :: 1 + 2;");
        assert_eq!(ty, registry.default_int());
        assert!(diags.is_empty());
    }

    #[test]
    fn comparison_produces_bool() {
        let (registry, ty, _) = infer_source("x :: 1 < 2;");
        assert_eq!(ty, registry.bool());
    }

    #[test]
    fn undefined_identifier_reports_and_becomes_unknown() {
        let (registry, ty, diags) = infer_source("x :: missing;");
        assert_eq!(ty, registry.unknown());
        assert!(!diags.is_empty());
    }
}
