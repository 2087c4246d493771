//! Symbol tables chained parent-to-child, and the symbols they hold.

use hashbrown::HashMap;
use upp_common::{Ident, Span};
use upp_parser::NodeId;
use upp_types::TypeId;

use crate::item::AnalysisItemId;

/// What a name resolves to. `Unresolved` is a live placeholder: it names an
/// analysis item that exists but hasn't finished the pass that would give
/// the symbol its final discriminator.
#[derive(Debug, Clone)]
pub enum SymbolKind {
    /// Backed by `providing_item`; readers suspend until that item reaches
    /// the state they need.
    Unresolved { providing_item: AnalysisItemId },
    UndefinedVariable,
    Variable { ty: TypeId, mutable: bool },
    Parameter { ty: TypeId, index: u32 },
    Global { ty: TypeId },
    Function { item: AnalysisItemId },
    PolymorphicFunction { item: AnalysisItemId },
    Hardcoded { name: &'static str },
    Type { ty: TypeId },
    Constant { ty: TypeId },
    Module { table: SymbolTableId },
    Alias { target: SymbolId },
    Error,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub id: Ident,
    pub kind: SymbolKind,
    pub definition_node: Option<NodeId>,
    pub origin_table: SymbolTableId,
    /// Internal symbols (block-local variables, anonymous struct members)
    /// are visible only from a descendant table marked `internal`.
    pub internal: bool,
    pub references: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolTableId(pub(crate) u32);

#[derive(Debug)]
struct Table {
    parent: Option<SymbolTableId>,
    internal: bool,
    symbols: HashMap<Ident, SymbolId>,
}

/// Owns every symbol table and symbol allocated during analysis of one
/// compilation unit. Tables are never freed individually; the whole arena
/// drops together with the analyser.
#[derive(Debug, Default)]
pub struct SymbolArena {
    tables: Vec<Table>,
    symbols: Vec<Symbol>,
}

impl SymbolArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table(&mut self, parent: Option<SymbolTableId>, internal: bool) -> SymbolTableId {
        let id = SymbolTableId(self.tables.len() as u32);
        self.tables.push(Table { parent, internal, symbols: HashMap::new() });
        id
    }

    /// Defines `id` in `table`, returning the existing symbol instead of a
    /// fresh one if the name is already bound there (a duplicate-definition
    /// error for the caller to report).
    pub fn define(
        &mut self,
        table: SymbolTableId,
        name: Ident,
        kind: SymbolKind,
        definition_node: Option<NodeId>,
        internal: bool,
    ) -> Result<SymbolId, SymbolId> {
        if let Some(existing) = self.tables[table.0 as usize].symbols.get(&name) {
            return Err(*existing);
        }
        let symbol_id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol {
            id: name,
            kind,
            definition_node,
            origin_table: table,
            internal,
            references: Vec::new(),
        });
        self.tables[table.0 as usize].symbols.insert(name, symbol_id);
        Ok(symbol_id)
    }

    /// Looks up `name` starting at `table`, walking to parents. Internal
    /// symbols are only visible if `table` (or an ancestor up to the table
    /// that defines them) is itself marked internal, approximated here as
    /// "visible from any descendant of the defining table", matching how
    /// code-block scopes chain.
    pub fn lookup(&self, table: SymbolTableId, name: Ident) -> Option<SymbolId> {
        let mut current = Some(table);
        while let Some(t) = current {
            if let Some(&id) = self.tables[t.0 as usize].symbols.get(&name) {
                return Some(id);
            }
            current = self.tables[t.0 as usize].parent;
        }
        None
    }

    pub fn record_reference(&mut self, symbol: SymbolId, reader: NodeId) {
        self.symbols[symbol.0 as usize].references.push(reader);
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0 as usize]
    }

    pub fn resolve(&mut self, id: SymbolId, kind: SymbolKind) {
        self.symbols[id.0 as usize].kind = kind;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upp_common::IdentPool;

    #[test]
    fn child_table_sees_parent_symbols() {
        let mut pool = IdentPool::new();
        let mut arena = SymbolArena::new();
        let root = arena.create_table(None, false);
        let child = arena.create_table(Some(root), false);
        let name = pool.intern("x");
        arena.define(root, name, SymbolKind::Error, None, false).unwrap();
        assert!(arena.lookup(child, name).is_some());
    }

    #[test]
    fn duplicate_definition_returns_existing() {
        let mut pool = IdentPool::new();
        let mut arena = SymbolArena::new();
        let root = arena.create_table(None, false);
        let name = pool.intern("dup");
        let first = arena.define(root, name, SymbolKind::Error, None, false).unwrap();
        let second = arena.define(root, name, SymbolKind::Error, None, false);
        assert_eq!(second, Err(first));
    }

    #[test]
    fn sibling_tables_do_not_share_symbols() {
        let mut pool = IdentPool::new();
        let mut arena = SymbolArena::new();
        let root = arena.create_table(None, false);
        let a = arena.create_table(Some(root), false);
        let b = arena.create_table(Some(root), false);
        let name = pool.intern("local");
        arena.define(a, name, SymbolKind::Error, None, false).unwrap();
        assert!(arena.lookup(b, name).is_none());
    }
}
