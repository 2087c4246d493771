//! The cast matrix: which conversions exist, and whether each is applied
//! implicitly, requires an explicit `as`, or is simply not possible.

use upp_types::{PrimitiveType, TypeId, TypeKind, TypeRegistry};

use crate::context::{ContextChange, ContextOption};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    IntegerWiden,
    IntegerNarrow,
    SignUnsignedConvert,
    EnumToInt,
    IntToEnum,
    ArrayToSlice,
    ValueToOptional,
    AnyToConcrete,
    ValueToAny,
    FloatWiden,
    FloatNarrow,
    FloatToInt,
    IntToFloat,
    PointerToPointer,
    PointerToAddress,
    AddressToPointer,
    SubtypeUpcast,
    SubtypeDowncast,
}

impl CastKind {
    /// Carries a runtime check that can fail: `any`-to-concrete narrows by a
    /// type-tag comparison, a subtype downcast by a discriminant comparison.
    pub fn needs_runtime_check(self) -> bool {
        matches!(self, CastKind::AnyToConcrete | CastKind::SubtypeDowncast)
    }

    /// Whether this cast applies without an explicit `as`, independent of
    /// any context change that might additionally permit it.
    fn implicit_by_default(self) -> bool {
        matches!(
            self,
            CastKind::IntegerWiden
                | CastKind::EnumToInt
                | CastKind::IntToEnum
                | CastKind::ArrayToSlice
                | CastKind::ValueToOptional
                | CastKind::AnyToConcrete
                | CastKind::ValueToAny
                | CastKind::SubtypeUpcast
        )
    }

    fn gating_option(self) -> Option<ContextOption> {
        match self {
            CastKind::IntegerNarrow | CastKind::SignUnsignedConvert => Some(ContextOption::ImplicitNarrowingCast),
            CastKind::FloatWiden | CastKind::FloatNarrow | CastKind::FloatToInt | CastKind::IntToFloat => {
                Some(ContextOption::ImplicitFloatIntCast)
            }
            CastKind::PointerToPointer | CastKind::PointerToAddress | CastKind::AddressToPointer => {
                Some(ContextOption::ImplicitPointerCast)
            }
            CastKind::SubtypeDowncast => Some(ContextOption::ImplicitSubtypeDowncast),
            _ => None,
        }
    }

    /// True if this cast can be performed without the module's context
    /// change opting in (either it's implicit by default, or the module
    /// explicitly widened its dialect).
    pub fn is_implicit_in(self, ctx: &ContextChange) -> bool {
        if self.implicit_by_default() {
            return true;
        }
        self.gating_option().map(|opt| ctx.is_enabled(opt)).unwrap_or(false)
    }
}

/// Classifies the conversion from `from` to `to`, or `None` if no cast
/// connects them at all (neither implicit nor explicit).
pub fn classify(registry: &TypeRegistry, from: TypeId, to: TypeId) -> Option<CastKind> {
    if from == to {
        return None;
    }
    match (registry.kind(from), registry.kind(to)) {
        (TypeKind::Primitive(a), TypeKind::Primitive(b)) => classify_primitive(*a, *b),
        (TypeKind::Enum(_), TypeKind::Primitive(p)) if p.is_integer() => Some(CastKind::EnumToInt),
        (TypeKind::Primitive(p), TypeKind::Enum(_)) if p.is_integer() => Some(CastKind::IntToEnum),
        (TypeKind::Array { element: ea, .. }, TypeKind::Slice { element: eb }) if ea == eb => {
            Some(CastKind::ArrayToSlice)
        }
        (_, TypeKind::Optional(inner)) if *inner == from => Some(CastKind::ValueToOptional),
        (TypeKind::Any, _) => Some(CastKind::AnyToConcrete),
        (_, TypeKind::Any) => Some(CastKind::ValueToAny),
        (TypeKind::Pointer(_), TypeKind::Pointer(_)) => Some(CastKind::PointerToPointer),
        (TypeKind::Pointer(_), TypeKind::Address) => Some(CastKind::PointerToAddress),
        (TypeKind::Address, TypeKind::Pointer(_)) => Some(CastKind::AddressToPointer),
        (TypeKind::Struct(sa), TypeKind::Struct(sb)) if sa.name == sb.name => {
            let a_mods = registry.modifiers(from);
            let b_mods = registry.modifiers(to);
            if b_mods.subtype_path.len() < a_mods.subtype_path.len() {
                Some(CastKind::SubtypeUpcast)
            } else if b_mods.subtype_path.len() > a_mods.subtype_path.len() {
                Some(CastKind::SubtypeDowncast)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn classify_primitive(a: PrimitiveType, b: PrimitiveType) -> Option<CastKind> {
    if a == b {
        return None;
    }
    if a.is_integer() && b.is_integer() {
        if a.is_signed() != b.is_signed() {
            return Some(CastKind::SignUnsignedConvert);
        }
        return Some(if width_of(b) >= width_of(a) { CastKind::IntegerWiden } else { CastKind::IntegerNarrow });
    }
    if a.is_float() && b.is_float() {
        return Some(if width_of(b) >= width_of(a) { CastKind::FloatWiden } else { CastKind::FloatNarrow });
    }
    if a.is_integer() && b.is_float() {
        return Some(CastKind::IntToFloat);
    }
    if a.is_float() && b.is_integer() {
        return Some(CastKind::FloatToInt);
    }
    None
}

fn width_of(p: PrimitiveType) -> u8 {
    match p {
        PrimitiveType::I8 | PrimitiveType::U8 => 8,
        PrimitiveType::I16 | PrimitiveType::U16 => 16,
        PrimitiveType::I32 | PrimitiveType::U32 | PrimitiveType::F32 => 32,
        PrimitiveType::I64 | PrimitiveType::U64 | PrimitiveType::F64 => 64,
        PrimitiveType::Bool => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upp_types::Modifiers;

    #[test]
    fn widening_same_signedness_is_implicit_everywhere() {
        let reg = TypeRegistry::new();
        let from = reg.primitive(PrimitiveType::I8);
        let to = reg.primitive(PrimitiveType::I32);
        let kind = classify(&reg, from, to).unwrap();
        assert_eq!(kind, CastKind::IntegerWiden);
        assert!(kind.is_implicit_in(&ContextChange::root()));
    }

    #[test]
    fn narrowing_requires_context_opt_in() {
        let reg = TypeRegistry::new();
        let from = reg.primitive(PrimitiveType::I32);
        let to = reg.primitive(PrimitiveType::I8);
        let kind = classify(&reg, from, to).unwrap();
        assert_eq!(kind, CastKind::IntegerNarrow);
        assert!(!kind.is_implicit_in(&ContextChange::root()));
        let mut ctx = ContextChange::root();
        ctx.enable(ContextOption::ImplicitNarrowingCast);
        assert!(kind.is_implicit_in(&ctx));
    }

    #[test]
    fn array_to_slice_of_same_element_is_implicit() {
        let mut reg = TypeRegistry::new();
        let elem = reg.primitive(PrimitiveType::I32);
        let arr = reg.intern(TypeKind::Array { element: elem, count: upp_types::ArrayCount::Known(3) }, Modifiers::none());
        let slice = reg.intern(TypeKind::Slice { element: elem }, Modifiers::none());
        let kind = classify(&reg, arr, slice).unwrap();
        assert_eq!(kind, CastKind::ArrayToSlice);
        assert!(kind.is_implicit_in(&ContextChange::root()));
    }

    #[test]
    fn subtype_downcast_needs_runtime_check() {
        assert!(CastKind::SubtypeDowncast.needs_runtime_check());
        assert!(!CastKind::SubtypeUpcast.needs_runtime_check());
    }
}
