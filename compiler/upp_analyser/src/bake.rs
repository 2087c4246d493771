//! Compile-time execution of `bake` bodies.
//!
//! A bake's body is lowered and run the same way any other code runs, through
//! the IR generator and bytecode interpreter, so the semantic analyser
//! itself never duplicates evaluation logic. This module only owns the
//! boundary: given something that can execute a lowered body and report
//! back raw bytes, intern the result as a constant of the declared type.

use upp_parser::Expr;
use upp_types::{ConstantId, ConstantPool, TypeId};

/// Implemented by whatever can actually run a bake body to completion.
/// `upp_bytecode::Interpreter` is the real implementation; it lowers the
/// expression through `upp_ir` and executes the resulting bytecode on an
/// internal interpreter instance, per the one-thread-per-bake model.
pub trait BakeRunner {
    /// Runs `body`, expected to produce a value of `expected_type`, and
    /// returns its little-endian byte representation.
    fn run(&mut self, body: &Expr, expected_type: TypeId) -> Result<Vec<u8>, BakeError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BakeError {
    /// The body attempted to observe an analysis item that hasn't finished
    /// yet; bakes may only read completed items.
    ReadOfIncompleteItem,
    ExecutionFailed(String),
}

pub fn run_bake(
    runner: &mut dyn BakeRunner,
    pool: &mut ConstantPool,
    body: &Expr,
    declared_type: TypeId,
) -> Result<ConstantId, BakeError> {
    let bytes = runner.run(body, declared_type)?;
    Ok(pool.intern(declared_type, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use upp_common::IdentPool;
    use upp_parser::parse;
    use upp_types::{PrimitiveType, TypeRegistry};

    struct StubRunner {
        bytes: Vec<u8>,
    }

    impl BakeRunner for StubRunner {
        fn run(&mut self, _body: &Expr, _expected_type: TypeId) -> Result<Vec<u8>, BakeError> {
            Ok(self.bytes.clone())
        }
    }

    #[test]
    fn successful_run_interns_a_constant() {
        let reg = TypeRegistry::new();
        let i32_ty = reg.primitive(PrimitiveType::I32);
        let mut pool_ident = IdentPool::new();
        let (output, _) = parse("limit :: 10;", 0, &mut pool_ident);
        let body = match &output.module.items[0].kind {
            upp_parser::ItemKind::Definition(def) => def.value.clone(),
            _ => panic!("expected a definition item"),
        };
        let mut runner = StubRunner { bytes: 10i64.to_le_bytes().to_vec() };
        let mut pool = ConstantPool::new();
        let id = run_bake(&mut runner, &mut pool, &body, i32_ty).unwrap();
        assert_eq!(pool.ty(id), i32_ty);
    }

    #[test]
    fn runner_failure_propagates() {
        let reg = TypeRegistry::new();
        let i32_ty = reg.primitive(PrimitiveType::I32);
        let mut pool_ident = IdentPool::new();
        let (output, _) = parse("limit :: bake { 5 };", 0, &mut pool_ident);
        let body = match &output.module.items[0].kind {
            upp_parser::ItemKind::Definition(def) => match def.value.kind.as_ref() {
                upp_parser::ExprKind::Bake(body) => match body.as_ref() {
                    upp_parser::BakeBody::Block(block) => match &block.statements[0].kind {
                        upp_parser::StmtKind::Expr(e) => e.clone(),
                        _ => panic!("expected expr statement"),
                    },
                    upp_parser::BakeBody::Expr(e) => e.clone(),
                },
                _ => panic!("expected a bake expression"),
            },
            _ => panic!("expected a definition item"),
        };
        struct FailingRunner;
        impl BakeRunner for FailingRunner {
            fn run(&mut self, _body: &Expr, _expected_type: TypeId) -> Result<Vec<u8>, BakeError> {
                Err(BakeError::ExecutionFailed("boom".to_string()))
            }
        }
        let mut pool = ConstantPool::new();
        let result = run_bake(&mut FailingRunner, &mut pool, &body, i32_ty);
        assert_eq!(result.unwrap_err(), BakeError::ExecutionFailed("boom".to_string()));
    }
}
