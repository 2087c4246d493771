//! Per-module context changes: the set of language extensions/restrictions
//! a module opts into, inherited from its parent module unless overridden.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextOption {
    /// Allow narrowing/signed-unsigned integer casts implicitly rather than
    /// requiring an explicit `as`.
    ImplicitNarrowingCast,
    /// Allow implicit float<->int conversion.
    ImplicitFloatIntCast,
    /// Allow implicit pointer<->pointer conversion between unrelated
    /// pointee types.
    ImplicitPointerCast,
    /// Allow implicit subtype downcast without an explicit `as` (the
    /// runtime tag-check still happens).
    ImplicitSubtypeDowncast,
    /// Recognise the custom-iterator protocol (`create`/`has_next`/`next`/
    /// `get_value`) for `foreach` over non-array/slice types.
    CustomIterators,
    /// Allow dot-call syntax (`x.f()` resolving to a free function `f(x)`).
    DotCalls,
}

/// A module's recognised set of context options, inheriting from its
/// parent unless explicitly added to or removed from.
#[derive(Debug, Clone, Default)]
pub struct ContextChange {
    enabled: Vec<ContextOption>,
}

impl ContextChange {
    pub fn root() -> Self {
        Self { enabled: vec![ContextOption::DotCalls] }
    }

    pub fn inherit(parent: &ContextChange) -> Self {
        parent.clone()
    }

    pub fn enable(&mut self, option: ContextOption) {
        if !self.enabled.contains(&option) {
            self.enabled.push(option);
        }
    }

    pub fn disable(&mut self, option: ContextOption) {
        self.enabled.retain(|o| *o != option);
    }

    pub fn is_enabled(&self, option: ContextOption) -> bool {
        self.enabled.contains(&option)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_inherits_parent_options() {
        let mut parent = ContextChange::root();
        parent.enable(ContextOption::ImplicitFloatIntCast);
        let child = ContextChange::inherit(&parent);
        assert!(child.is_enabled(ContextOption::ImplicitFloatIntCast));
        assert!(child.is_enabled(ContextOption::DotCalls));
    }

    #[test]
    fn disable_removes_a_default_option() {
        let mut ctx = ContextChange::root();
        ctx.disable(ContextOption::DotCalls);
        assert!(!ctx.is_enabled(ContextOption::DotCalls));
    }
}
