//! Analysable units: the things the scheduler drives to completion.

use upp_parser::NodeId;

use crate::symbol::SymbolId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnalysisItemId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisItemKind {
    Definition,
    Structure,
    Function,
    FunctionBody,
    Bake,
    Import,
}

/// How a struct's dependency on another type affects layout ordering: a
/// member embedded by value must have its full layout known before the
/// containing struct's layout can be computed, while a reference or a
/// call only needs the referenced item to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Normal,
    MemberInMemory,
    MemberReference,
}

#[derive(Debug, Clone, Copy)]
pub struct SymbolDependency {
    pub symbol: SymbolId,
    pub reader: NodeId,
    pub kind: DependencyKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    Running,
    Suspended,
    Complete,
    Failed,
}

#[derive(Debug)]
pub struct AnalysisItem {
    pub id: AnalysisItemId,
    pub kind: AnalysisItemKind,
    pub node: NodeId,
    pub symbol: Option<SymbolId>,
    pub symbol_reads: Vec<SymbolDependency>,
    pub state: ItemState,
    /// For a `Function` item, the body's own item id. The header can
    /// complete (and unblock callers) while the body is still running.
    pub function_body_item: Option<AnalysisItemId>,
}

#[derive(Debug, Default)]
pub struct AnalysisItemArena {
    items: Vec<AnalysisItem>,
}

impl AnalysisItemArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, kind: AnalysisItemKind, node: NodeId, symbol: Option<SymbolId>) -> AnalysisItemId {
        let id = AnalysisItemId(self.items.len() as u32);
        self.items.push(AnalysisItem {
            id,
            kind,
            node,
            symbol,
            symbol_reads: Vec::new(),
            state: ItemState::Pending,
            function_body_item: None,
        });
        id
    }

    pub fn get(&self, id: AnalysisItemId) -> &AnalysisItem {
        &self.items[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: AnalysisItemId) -> &mut AnalysisItem {
        &mut self.items[id.0 as usize]
    }

    pub fn record_dependency(&mut self, item: AnalysisItemId, dep: SymbolDependency) {
        self.items[item.0 as usize].symbol_reads.push(dep);
    }

    pub fn ids(&self) -> impl Iterator<Item = AnalysisItemId> + '_ {
        self.items.iter().map(|i| i.id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upp_parser::parse;
    use upp_common::IdentPool;

    fn dummy_node() -> NodeId {
        let mut pool = IdentPool::new();
        let (output, _tokens) = parse("x :: 1;", 0, &mut pool);
        output.module.items[0].id
    }

    #[test]
    fn created_items_start_pending() {
        let mut arena = AnalysisItemArena::new();
        let id = arena.create(AnalysisItemKind::Definition, dummy_node(), None);
        assert_eq!(arena.get(id).state, ItemState::Pending);
    }

    #[test]
    fn dependencies_accumulate_on_the_item() {
        let mut arena = AnalysisItemArena::new();
        let node = dummy_node();
        let id = arena.create(AnalysisItemKind::Function, node, None);
        arena.record_dependency(
            id,
            SymbolDependency { symbol: SymbolId(0), reader: node, kind: DependencyKind::Normal },
        );
        assert_eq!(arena.get(id).symbol_reads.len(), 1);
    }
}
