//! Overload resolution: binds call arguments to the best-matching
//! candidate's parameters.

use upp_common::Ident;
use upp_types::{TypeId, TypeRegistry};

use crate::cast::classify;
use crate::context::ContextChange;
use crate::symbol::SymbolId;

#[derive(Debug, Clone)]
pub struct CallableParam {
    pub name: Ident,
    pub ty: TypeId,
    pub required: bool,
    pub named_only: bool,
    pub must_not_be_set: bool,
    pub has_default: bool,
}

#[derive(Debug, Clone)]
pub struct Callable {
    pub symbol: SymbolId,
    pub params: Vec<CallableParam>,
    pub poly_param_count: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct CallArg {
    pub name: Option<Ident>,
    pub ty: TypeId,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub param_index: usize,
    pub arg_index: usize,
    pub implicit_cast: bool,
}

#[derive(Debug, Clone)]
pub struct MatchResult {
    pub callable: SymbolId,
    pub bindings: Vec<Binding>,
    pub implicit_cast_count: usize,
    pub poly_param_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverloadError {
    NoSuchOperator,
    AmbiguousCall,
}

/// Attempts to bind `args` against `candidate`'s parameters. Positional
/// arguments fill non-`named_only` parameters left to right; named
/// arguments match by name anywhere. Fails if any argument has no
/// compatible parameter, any required parameter is left unbound, or a
/// `must_not_be_set` parameter is explicitly bound.
fn try_bind(registry: &TypeRegistry, ctx: &ContextChange, candidate: &Callable, args: &[CallArg]) -> Option<(Vec<Binding>, usize)> {
    let mut bound_param = vec![false; candidate.params.len()];
    let mut bindings = Vec::with_capacity(args.len());
    let mut implicit_casts = 0usize;
    let mut next_positional = 0usize;

    for (arg_index, arg) in args.iter().enumerate() {
        let param_index = if let Some(name) = arg.name {
            candidate.params.iter().position(|p| p.name == name)?
        } else {
            while next_positional < candidate.params.len() && candidate.params[next_positional].named_only {
                next_positional += 1;
            }
            let idx = next_positional;
            if idx >= candidate.params.len() {
                return None;
            }
            next_positional += 1;
            idx
        };
        if bound_param[param_index] {
            return None;
        }
        let param = &candidate.params[param_index];
        if param.must_not_be_set {
            return None;
        }
        if param.ty != arg.ty {
            let kind = classify(registry, arg.ty, param.ty)?;
            if !kind.is_implicit_in(ctx) {
                return None;
            }
            implicit_casts += 1;
        }
        bound_param[param_index] = true;
        bindings.push(Binding { param_index, arg_index, implicit_cast: param.ty != arg.ty });
    }

    for (index, param) in candidate.params.iter().enumerate() {
        if !bound_param[index] && param.required && !param.has_default {
            return None;
        }
    }
    Some((bindings, implicit_casts))
}

/// Picks the best candidate: fewest implicit casts, tie-broken by fewer
/// polymorphic parameters (more specific wins). A remaining tie is
/// `AmbiguousCall`.
pub fn resolve(
    registry: &TypeRegistry,
    ctx: &ContextChange,
    candidates: &[Callable],
    args: &[CallArg],
) -> Result<MatchResult, OverloadError> {
    let mut matches: Vec<MatchResult> = candidates
        .iter()
        .filter_map(|c| {
            try_bind(registry, ctx, c, args).map(|(bindings, casts)| MatchResult {
                callable: c.symbol,
                bindings,
                implicit_cast_count: casts,
                poly_param_count: c.poly_param_count,
            })
        })
        .collect();

    if matches.is_empty() {
        return Err(OverloadError::NoSuchOperator);
    }
    matches.sort_by_key(|m| (m.implicit_cast_count, m.poly_param_count));
    if matches.len() > 1 {
        let best = &matches[0];
        let runner_up = &matches[1];
        if best.implicit_cast_count == runner_up.implicit_cast_count && best.poly_param_count == runner_up.poly_param_count {
            return Err(OverloadError::AmbiguousCall);
        }
    }
    Ok(matches.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use upp_common::IdentPool;
    use upp_types::PrimitiveType;

    fn symbol(n: u32) -> SymbolId {
        SymbolId(n)
    }

    #[test]
    fn exact_type_match_needs_no_cast() {
        let mut pool = IdentPool::new();
        let reg = TypeRegistry::new();
        let i32_ty = reg.primitive(PrimitiveType::I32);
        let param_name = pool.intern("x");
        let candidate = Callable {
            symbol: symbol(0),
            params: vec![CallableParam { name: param_name, ty: i32_ty, required: true, named_only: false, must_not_be_set: false, has_default: false }],
            poly_param_count: 0,
        };
        let args = [CallArg { name: None, ty: i32_ty }];
        let result = resolve(&reg, &ContextChange::root(), &[candidate], &args).unwrap();
        assert_eq!(result.implicit_cast_count, 0);
    }

    #[test]
    fn widening_candidate_beats_no_match() {
        let mut pool = IdentPool::new();
        let reg = TypeRegistry::new();
        let i8_ty = reg.primitive(PrimitiveType::I8);
        let i32_ty = reg.primitive(PrimitiveType::I32);
        let param_name = pool.intern("x");
        let candidate = Callable {
            symbol: symbol(0),
            params: vec![CallableParam { name: param_name, ty: i32_ty, required: true, named_only: false, must_not_be_set: false, has_default: false }],
            poly_param_count: 0,
        };
        let args = [CallArg { name: None, ty: i8_ty }];
        let result = resolve(&reg, &ContextChange::root(), &[candidate], &args).unwrap();
        assert_eq!(result.implicit_cast_count, 1);
    }

    #[test]
    fn missing_required_parameter_fails() {
        let mut pool = IdentPool::new();
        let reg = TypeRegistry::new();
        let i32_ty = reg.primitive(PrimitiveType::I32);
        let param_name = pool.intern("x");
        let candidate = Callable {
            symbol: symbol(0),
            params: vec![CallableParam { name: param_name, ty: i32_ty, required: true, named_only: false, must_not_be_set: false, has_default: false }],
            poly_param_count: 0,
        };
        let result = resolve(&reg, &ContextChange::root(), &[candidate], &[]);
        assert_eq!(result.unwrap_err(), OverloadError::NoSuchOperator);
    }

    #[test]
    fn equally_good_overloads_are_ambiguous() {
        let mut pool = IdentPool::new();
        let reg = TypeRegistry::new();
        let i32_ty = reg.primitive(PrimitiveType::I32);
        let param_name = pool.intern("x");
        let make = |id| Callable {
            symbol: symbol(id),
            params: vec![CallableParam { name: param_name, ty: i32_ty, required: true, named_only: false, must_not_be_set: false, has_default: false }],
            poly_param_count: 0,
        };
        let candidates = [make(0), make(1)];
        let args = [CallArg { name: None, ty: i32_ty }];
        let result = resolve(&reg, &ContextChange::root(), &candidates, &args);
        assert_eq!(result.unwrap_err(), OverloadError::AmbiguousCall);
    }
}
