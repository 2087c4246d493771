//! Walks a parsed module to discover analysable units, build the symbol
//! table, and record each item's dependency list.

use hashbrown::HashMap;
use upp_common::Ident;
use upp_parser::{
    Block, Expr, ExprKind, FunctionDef, Item, ItemKind, Module, NodeId, Param, Stmt, StmtKind, StructDef,
    TypeExpr, TypeExprKind,
};

use crate::item::{AnalysisItemArena, AnalysisItemId, AnalysisItemKind, DependencyKind, SymbolDependency};
use crate::symbol::{SymbolArena, SymbolId, SymbolKind, SymbolTableId};

pub struct DuplicateDefinition {
    pub existing: SymbolId,
    pub node: NodeId,
}

pub struct DependencyAnalyser {
    pub symbols: SymbolArena,
    pub items: AnalysisItemArena,
    pub root_table: SymbolTableId,
    pub mapping_ast_to_items: HashMap<NodeId, AnalysisItemId>,
    pub errors: Vec<DuplicateDefinition>,
    /// The value expression of each top-level `name :: value;` item, kept
    /// so the semantic pass can type-check it without re-walking the AST.
    pub definitions: HashMap<AnalysisItemId, (SymbolTableId, Expr)>,
    /// How many polymorphic parameters each `Function` item's header
    /// declares, so the semantic pass can tell an ordinary function from
    /// one needing per-call-site instantiation without re-walking the AST.
    pub function_poly_params: HashMap<AnalysisItemId, usize>,
}

impl DependencyAnalyser {
    pub fn new() -> Self {
        let mut symbols = SymbolArena::new();
        let root_table = symbols.create_table(None, false);
        Self {
            symbols,
            items: AnalysisItemArena::new(),
            root_table,
            mapping_ast_to_items: HashMap::new(),
            errors: Vec::new(),
            definitions: HashMap::new(),
            function_poly_params: HashMap::new(),
        }
    }

    pub fn analyse_module(&mut self, module: &Module) {
        for item in &module.items {
            self.analyse_item(self.root_table, item);
        }
    }

    fn define_or_report(
        &mut self,
        table: SymbolTableId,
        name: Ident,
        kind: SymbolKind,
        node: NodeId,
        internal: bool,
    ) -> SymbolId {
        match self.symbols.define(table, name, kind, Some(node), internal) {
            Ok(id) => id,
            Err(existing) => {
                self.errors.push(DuplicateDefinition { existing, node });
                existing
            }
        }
    }

    fn analyse_item(&mut self, table: SymbolTableId, item: &Item) {
        match &item.kind {
            ItemKind::Import(_) => {
                let analysis_id = self.items.create(AnalysisItemKind::Import, item.id, None);
                self.mapping_ast_to_items.insert(item.id, analysis_id);
            }
            ItemKind::Function(func) => self.analyse_function(table, item.id, func),
            ItemKind::Struct(def) => self.analyse_struct(table, item.id, def),
            ItemKind::Enum(def) => {
                let analysis_id = self.items.create(AnalysisItemKind::Structure, item.id, None);
                let symbol = self.define_or_report(
                    table,
                    def.name,
                    SymbolKind::Unresolved { providing_item: analysis_id },
                    item.id,
                    false,
                );
                self.items.get_mut(analysis_id).symbol = Some(symbol);
                self.mapping_ast_to_items.insert(item.id, analysis_id);
            }
            ItemKind::Bake(_) => {
                let analysis_id = self.items.create(AnalysisItemKind::Bake, item.id, None);
                self.mapping_ast_to_items.insert(item.id, analysis_id);
            }
            ItemKind::Definition(def) => {
                let analysis_id = self.items.create(AnalysisItemKind::Definition, item.id, None);
                let symbol = self.define_or_report(
                    table,
                    def.name,
                    SymbolKind::Unresolved { providing_item: analysis_id },
                    item.id,
                    false,
                );
                self.items.get_mut(analysis_id).symbol = Some(symbol);
                self.mapping_ast_to_items.insert(item.id, analysis_id);
                self.collect_expr_dependencies(table, analysis_id, &def.value);
                self.definitions.insert(analysis_id, (table, def.value.clone()));
            }
            ItemKind::Error(_) => {}
        }
    }

    fn analyse_function(&mut self, table: SymbolTableId, node: NodeId, func: &FunctionDef) {
        let header_id = self.items.create(AnalysisItemKind::Function, node, None);
        let symbol = self.define_or_report(
            table,
            func.name,
            SymbolKind::Unresolved { providing_item: header_id },
            node,
            false,
        );
        self.items.get_mut(header_id).symbol = Some(symbol);
        self.mapping_ast_to_items.insert(node, header_id);
        self.function_poly_params.insert(header_id, func.poly_params.len());

        for param in &func.params {
            self.collect_type_dependencies(table, header_id, node, &param.ty, DependencyKind::MemberReference);
        }
        if let Some(ret) = &func.return_type {
            self.collect_type_dependencies(table, header_id, node, ret, DependencyKind::MemberReference);
        }

        let body_id = self.items.create(AnalysisItemKind::FunctionBody, func.body.id, None);
        self.items.get_mut(header_id).function_body_item = Some(body_id);
        self.mapping_ast_to_items.insert(func.body.id, body_id);

        let param_table = self.symbols.create_table(Some(table), true);
        for param in &func.params {
            self.define_param(param_table, header_id, param);
        }
        self.analyse_block(param_table, body_id, &func.body);
    }

    /// Parameters are only known by name at this stage; their type and
    /// final `Parameter { ty, index }` discriminator are filled in once the
    /// header item's semantic pass runs.
    fn define_param(&mut self, table: SymbolTableId, header_id: AnalysisItemId, param: &Param) {
        let _ = self.symbols.define(
            table,
            param.name,
            SymbolKind::Unresolved { providing_item: header_id },
            None,
            true,
        );
    }

    fn analyse_struct(&mut self, table: SymbolTableId, node: NodeId, def: &StructDef) {
        let analysis_id = self.items.create(AnalysisItemKind::Structure, node, None);
        let symbol = self.define_or_report(
            table,
            def.name,
            SymbolKind::Unresolved { providing_item: analysis_id },
            node,
            false,
        );
        self.items.get_mut(analysis_id).symbol = Some(symbol);
        self.mapping_ast_to_items.insert(node, analysis_id);

        for member in &def.members {
            self.collect_type_dependencies(table, analysis_id, node, &member.ty, DependencyKind::MemberInMemory);
        }
        for subtype in &def.subtypes {
            for member in &subtype.members {
                self.collect_type_dependencies(table, analysis_id, node, &member.ty, DependencyKind::MemberInMemory);
            }
        }
    }

    fn analyse_block(&mut self, table: SymbolTableId, item: AnalysisItemId, block: &Block) {
        let block_table = self.symbols.create_table(Some(table), true);
        for stmt in &block.statements {
            self.analyse_stmt(block_table, item, stmt);
        }
    }

    fn analyse_stmt(&mut self, block_table: SymbolTableId, item: AnalysisItemId, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::VarDecl { name, init, .. } => {
                if let Some(init) = init {
                    self.collect_expr_dependencies(block_table, item, init);
                }
                let _ =
                    self.symbols.define(block_table, *name, SymbolKind::UndefinedVariable, Some(stmt.id), true);
            }
            StmtKind::Expr(e) | StmtKind::Return(Some(e)) => {
                self.collect_expr_dependencies(block_table, item, e);
            }
            StmtKind::If { condition, then_branch, else_branch } => {
                self.collect_expr_dependencies(block_table, item, condition);
                self.analyse_block(block_table, item, then_branch);
                if let Some(else_stmt) = else_branch {
                    self.analyse_stmt(block_table, item, else_stmt);
                }
            }
            StmtKind::While { condition, body } => {
                self.collect_expr_dependencies(block_table, item, condition);
                self.analyse_block(block_table, item, body);
            }
            StmtKind::For { condition, increment, body, .. } => {
                self.collect_expr_dependencies(block_table, item, condition);
                self.collect_expr_dependencies(block_table, item, increment);
                self.analyse_block(block_table, item, body);
            }
            StmtKind::Foreach { iterable, body, .. } => {
                self.collect_expr_dependencies(block_table, item, iterable);
                self.analyse_block(block_table, item, body);
            }
            StmtKind::Switch { scrutinee, cases, default } => {
                self.collect_expr_dependencies(block_table, item, scrutinee);
                for case in cases {
                    self.collect_expr_dependencies(block_table, item, &case.value);
                    self.analyse_block(block_table, item, &case.body);
                }
                if let Some(d) = default {
                    self.analyse_block(block_table, item, d);
                }
            }
            StmtKind::Block(b) => self.analyse_block(block_table, item, b),
            StmtKind::Defer(inner) => self.analyse_stmt(block_table, item, inner),
            StmtKind::DeferRestore { target, value } => {
                self.collect_expr_dependencies(block_table, item, target);
                self.collect_expr_dependencies(block_table, item, value);
            }
            StmtKind::Item(nested) => self.analyse_item(block_table, nested),
            StmtKind::Return(None) | StmtKind::Break | StmtKind::Continue | StmtKind::Error(_) | StmtKind::Empty => {}
        }
    }

    fn collect_expr_dependencies(&mut self, table: SymbolTableId, item: AnalysisItemId, expr: &Expr) {
        match expr.kind.as_ref() {
            ExprKind::Identifier(name) => self.record_name_dependency(table, item, *name, expr.id),
            ExprKind::Path(path) => {
                if let Some(first) = path.segments.first() {
                    self.record_name_dependency(table, item, *first, expr.id);
                }
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                self.collect_expr_dependencies(table, item, lhs);
                self.collect_expr_dependencies(table, item, rhs);
            }
            ExprKind::Unary { operand, .. }
            | ExprKind::AddressOf(operand)
            | ExprKind::Deref(operand)
            | ExprKind::Delete(operand) => {
                self.collect_expr_dependencies(table, item, operand);
            }
            ExprKind::Call { callee, args } => {
                self.collect_expr_dependencies(table, item, callee);
                for arg in args {
                    self.collect_expr_dependencies(table, item, &arg.value);
                }
            }
            ExprKind::MemberAccess { object, .. } => self.collect_expr_dependencies(table, item, object),
            ExprKind::Index { base, index } => {
                self.collect_expr_dependencies(table, item, base);
                self.collect_expr_dependencies(table, item, index);
            }
            ExprKind::ArrayLiteral(elems) => {
                for e in elems {
                    self.collect_expr_dependencies(table, item, e);
                }
            }
            ExprKind::StructLiteral { fields, .. } => {
                for (_, value) in fields {
                    self.collect_expr_dependencies(table, item, value);
                }
            }
            ExprKind::Cast { expr, ty, .. } => {
                self.collect_expr_dependencies(table, item, expr);
                self.collect_type_dependencies(table, item, expr.id, ty, DependencyKind::MemberReference);
            }
            ExprKind::New { ty, count } => {
                self.collect_type_dependencies(table, item, expr.id, ty, DependencyKind::MemberReference);
                if let Some(count) = count {
                    self.collect_expr_dependencies(table, item, count);
                }
            }
            ExprKind::Assign { target, value } | ExprKind::CompoundAssign { target, value, .. } => {
                self.collect_expr_dependencies(table, item, target);
                self.collect_expr_dependencies(table, item, value);
            }
            ExprKind::Range { start, end } => {
                if let Some(s) = start {
                    self.collect_expr_dependencies(table, item, s);
                }
                if let Some(e) = end {
                    self.collect_expr_dependencies(table, item, e);
                }
            }
            ExprKind::IntegerLiteral { .. }
            | ExprKind::FloatLiteral { .. }
            | ExprKind::StringLiteral(_)
            | ExprKind::CharLiteral(_)
            | ExprKind::BoolLiteral(_)
            | ExprKind::Bake(_)
            | ExprKind::Error(_) => {}
        }
    }

    fn record_name_dependency(&mut self, table: SymbolTableId, item: AnalysisItemId, name: Ident, reader: NodeId) {
        if let Some(symbol) = self.symbols.lookup(table, name) {
            self.symbols.record_reference(symbol, reader);
            self.items.record_dependency(item, SymbolDependency { symbol, reader, kind: DependencyKind::Normal });
        }
    }

    fn collect_type_dependencies(
        &mut self,
        table: SymbolTableId,
        item: AnalysisItemId,
        reader: NodeId,
        ty: &TypeExpr,
        kind: DependencyKind,
    ) {
        match ty.kind.as_ref() {
            TypeExprKind::Named(path) => {
                if let Some(first) = path.segments.first() {
                    if let Some(symbol) = self.symbols.lookup(table, *first) {
                        self.items.record_dependency(item, SymbolDependency { symbol, reader, kind });
                    }
                }
            }
            TypeExprKind::Pointer(inner) | TypeExprKind::Slice(inner) => {
                self.collect_type_dependencies(table, item, reader, inner, DependencyKind::MemberReference);
            }
            TypeExprKind::Optional(inner) => {
                self.collect_type_dependencies(table, item, reader, inner, kind);
            }
            TypeExprKind::Array { element, .. } => {
                self.collect_type_dependencies(table, item, reader, element, kind);
            }
            TypeExprKind::FunctionPointer { params, return_type } => {
                for p in params {
                    self.collect_type_dependencies(table, item, reader, p, DependencyKind::MemberReference);
                }
                if let Some(r) = return_type {
                    self.collect_type_dependencies(table, item, reader, r, DependencyKind::MemberReference);
                }
            }
            TypeExprKind::PolymorphicVar(_) | TypeExprKind::Error(_) => {}
        }
    }
}

impl Default for DependencyAnalyser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upp_common::IdentPool;
    use upp_parser::parse;

    #[test]
    fn function_defines_its_own_symbol() {
        let mut pool = IdentPool::new();
        let (output, _) = parse("main :: () { }", 0, &mut pool);
        let mut analyser = DependencyAnalyser::new();
        analyser.analyse_module(&output.module);
        let name = pool.intern("main");
        assert!(analyser.symbols.lookup(analyser.root_table, name).is_some());
    }

    #[test]
    fn duplicate_top_level_names_are_reported() {
        let mut pool = IdentPool::new();
        let (output, _) = parse("x :: 1; x :: 2;", 0, &mut pool);
        let mut analyser = DependencyAnalyser::new();
        analyser.analyse_module(&output.module);
        assert_eq!(analyser.errors.len(), 1);
    }

    #[test]
    fn identifier_use_records_a_dependency() {
        let mut pool = IdentPool::new();
        let (output, _) = parse("limit :: 5; double :: limit * 2;", 0, &mut pool);
        let mut analyser = DependencyAnalyser::new();
        analyser.analyse_module(&output.module);
        let double_item = *analyser.mapping_ast_to_items.get(&output.module.items[1].id).unwrap();
        assert_eq!(analyser.items.get(double_item).symbol_reads.len(), 1);
    }

    #[test]
    fn struct_member_of_named_type_is_member_in_memory() {
        let mut pool = IdentPool::new();
        let src = "Point :: struct { x: i32, y: i32 } Line :: struct { from: Point, to: Point }";
        let (output, _) = parse(src, 0, &mut pool);
        let mut analyser = DependencyAnalyser::new();
        analyser.analyse_module(&output.module);
        let line_item = *analyser.mapping_ast_to_items.get(&output.module.items[1].id).unwrap();
        let deps = &analyser.items.get(line_item).symbol_reads;
        assert_eq!(deps.len(), 2);
        assert!(deps.iter().all(|d| d.kind == DependencyKind::MemberInMemory));
    }
}
