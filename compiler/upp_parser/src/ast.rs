//! Abstract syntax tree for Upp.
//!
//! Nodes are arena-indexed: every node carries a monotonic `NodeId` handed
//! out by a [`NodeArena`], which also records each id's parent and span.
//! Ownership of children is by plain `Vec`/`Box`, never `Rc`/`RefCell`. The
//! arena exists only to answer "who is my parent" and "which came first"
//! without threading a parent pointer through every node type.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use upp_common::{Ident, Span};
use upp_lexer::{FloatSuffix, IntegerSuffix};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u32);

/// Tracks parent/span metadata for every node allocated during a parse.
/// The AST itself never stores a parent pointer; this table is the single
/// source of truth; an empty parent means "this is the compilation unit
/// root".
#[derive(Debug, Default)]
pub struct NodeArena {
    next: u32,
    parents: HashMap<NodeId, Option<NodeId>>,
    spans: HashMap<NodeId, Span>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, span: Span, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        self.parents.insert(id, parent);
        self.spans.insert(id, span);
        id
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied().flatten()
    }

    pub fn span_of(&self, id: NodeId) -> Span {
        self.spans[&id]
    }

    pub fn len(&self) -> usize {
        self.next as usize
    }

    pub fn is_empty(&self) -> bool {
        self.next == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub items: Vec<Item>,
    pub span: Span,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub kind: ItemKind,
    pub span: Span,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ItemKind {
    Import(Import),
    Function(FunctionDef),
    Struct(StructDef),
    Enum(EnumDef),
    Bake(BakeDef),
    /// A comptime binding that is neither a function nor a struct, e.g.
    /// `answer :: 42;`.
    Definition(Definition),
    /// A malformed top-level item; downstream phases see `unknown` and move on.
    Error(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    pub kind: ImportKind,
    pub span: Span,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ImportKind {
    /// `import "path/to/file.upp"`
    File(String),
    /// `import project other_project`
    Project(Ident),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Definition {
    pub name: Ident,
    pub value: Expr,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: Ident,
    pub poly_params: Vec<PolyParam>,
    pub params: Vec<Param>,
    pub return_type: Option<TypeExpr>,
    pub body: Block,
    pub id: NodeId,
}

/// A polymorphic callable parameter: either `comptime T: Type` (a value
/// fixed at the call site) or a pattern variable `$T` unified against
/// argument types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PolyParam {
    Comptime { name: Ident, ty: TypeExpr, span: Span, id: NodeId },
    /// `$T` or `$T: Type`, a pattern variable unified against argument
    /// types at the call site. `constraint` is the optional `: Type`
    /// annotation restricting what it may unify with.
    Pattern { name: Ident, constraint: Option<TypeExpr>, span: Span, id: NodeId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: Ident,
    pub ty: TypeExpr,
    pub required: bool,
    pub named_only: bool,
    pub must_not_be_set: bool,
    pub default: Option<Expr>,
    pub span: Span,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructDef {
    pub name: Ident,
    pub members: Vec<Member>,
    /// Tagged-union children; present only on a struct with `subtype` blocks.
    pub subtypes: Vec<StructSubtype>,
    pub discriminant: Option<Ident>,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructSubtype {
    pub name: Ident,
    pub members: Vec<Member>,
    pub span: Span,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub name: Ident,
    pub ty: TypeExpr,
    pub span: Span,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: Ident,
    pub variants: Vec<EnumVariant>,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumVariant {
    pub name: Ident,
    pub value: Option<Expr>,
    pub span: Span,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BakeDef {
    pub body: BakeBody,
    pub span: Span,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BakeBody {
    Expr(Expr),
    Block(Block),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeExpr {
    pub kind: Box<TypeExprKind>,
    pub span: Span,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeExprKind {
    Named(Path),
    Pointer(TypeExpr),
    Optional(TypeExpr),
    Array { element: TypeExpr, size: Option<Expr> },
    Slice(TypeExpr),
    FunctionPointer { params: Vec<TypeExpr>, return_type: Option<TypeExpr> },
    /// A reference to a pattern variable bound by `$T` in an enclosing
    /// polymorphic parameter list.
    PolymorphicVar(Ident),
    Error(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Path {
    pub segments: Vec<Ident>,
    pub span: Span,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub span: Span,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StmtKind {
    Expr(Expr),
    VarDecl { name: Ident, ty: Option<TypeExpr>, mutable: bool, init: Option<Expr> },
    Defer(Box<Stmt>),
    /// `defer_restore lhs = rhs`, captures `lhs`'s current value at
    /// registration time and restores it on every exit path.
    DeferRestore { target: Expr, value: Expr },
    Return(Option<Expr>),
    Break,
    Continue,
    If { condition: Expr, then_branch: Block, else_branch: Option<Box<Stmt>> },
    While { condition: Expr, body: Block },
    For { init: Box<Stmt>, condition: Expr, increment: Expr, body: Block },
    Foreach { binding: Ident, iterable: Expr, body: Block },
    Switch { scrutinee: Expr, cases: Vec<SwitchCase>, default: Option<Block> },
    Block(Block),
    Item(Item),
    /// A malformed statement; parsing resumes at the next statement boundary.
    Error(String),
    Empty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    pub value: Expr,
    pub body: Block,
    pub span: Span,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    pub kind: Box<ExprKind>,
    pub span: Span,
    pub id: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    IntegerLiteral { digits: String, suffix: Option<IntegerSuffix> },
    FloatLiteral { digits: String, suffix: Option<FloatSuffix> },
    StringLiteral(String),
    CharLiteral(char),
    BoolLiteral(bool),
    Identifier(Ident),
    Path(Path),
    Binary { op: BinaryOp, lhs: Expr, rhs: Expr },
    Unary { op: UnaryOp, operand: Expr },
    Call { callee: Expr, args: Vec<Arg> },
    MemberAccess { object: Expr, member: Ident },
    Index { base: Expr, index: Expr },
    /// `.[1, 2, 3]`
    ArrayLiteral(Vec<Expr>),
    StructLiteral { path: Option<Path>, fields: Vec<(Ident, Expr)> },
    Cast { expr: Expr, ty: TypeExpr, explicit: bool },
    AddressOf(Expr),
    Deref(Expr),
    New { ty: TypeExpr, count: Option<Expr> },
    Delete(Expr),
    Assign { target: Expr, value: Expr },
    CompoundAssign { op: BinaryOp, target: Expr, value: Expr },
    Range { start: Option<Expr>, end: Option<Expr> },
    Bake(Box<BakeBody>),
    /// A malformed expression; downstream phases treat it as `unknown`.
    Error(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arg {
    pub name: Option<Ident>,
    pub value: Expr,
    pub id: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    BitNot,
}

/// A borrowed reference to any node in the tree, so a walker can hold one
/// without first matching on which concrete type produced it.
pub enum AnyNode<'a> {
    Module(&'a Module),
    Item(&'a Item),
    Import(&'a Import),
    Definition(&'a Definition),
    FunctionDef(&'a FunctionDef),
    PolyParam(&'a PolyParam),
    Param(&'a Param),
    StructDef(&'a StructDef),
    StructSubtype(&'a StructSubtype),
    Member(&'a Member),
    EnumDef(&'a EnumDef),
    EnumVariant(&'a EnumVariant),
    BakeDef(&'a BakeDef),
    TypeExpr(&'a TypeExpr),
    Path(&'a Path),
    Block(&'a Block),
    Stmt(&'a Stmt),
    SwitchCase(&'a SwitchCase),
    Expr(&'a Expr),
    Arg(&'a Arg),
}

/// Implemented by every node type the parser hands an id to, so generic
/// tooling (a tree-walker, a span lookup, a pretty-printer) can recurse
/// through the AST without a bespoke visitor per node type.
pub trait AstNode {
    fn node_id(&self) -> NodeId;
    fn children(&self) -> Vec<AnyNode<'_>>;
}

impl AstNode for Module {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn children(&self) -> Vec<AnyNode<'_>> {
        self.items.iter().map(AnyNode::Item).collect()
    }
}

impl AstNode for Item {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn children(&self) -> Vec<AnyNode<'_>> {
        match &self.kind {
            ItemKind::Import(i) => vec![AnyNode::Import(i)],
            ItemKind::Function(f) => vec![AnyNode::FunctionDef(f)],
            ItemKind::Struct(s) => vec![AnyNode::StructDef(s)],
            ItemKind::Enum(e) => vec![AnyNode::EnumDef(e)],
            ItemKind::Bake(b) => vec![AnyNode::BakeDef(b)],
            ItemKind::Definition(d) => vec![AnyNode::Definition(d)],
            ItemKind::Error(_) => vec![],
        }
    }
}

impl AstNode for Import {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn children(&self) -> Vec<AnyNode<'_>> {
        Vec::new()
    }
}

impl AstNode for Definition {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn children(&self) -> Vec<AnyNode<'_>> {
        vec![AnyNode::Expr(&self.value)]
    }
}

impl AstNode for FunctionDef {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn children(&self) -> Vec<AnyNode<'_>> {
        let mut children: Vec<AnyNode<'_>> = self.poly_params.iter().map(AnyNode::PolyParam).collect();
        children.extend(self.params.iter().map(AnyNode::Param));
        children.extend(self.return_type.iter().map(AnyNode::TypeExpr));
        children.push(AnyNode::Block(&self.body));
        children
    }
}

impl AstNode for PolyParam {
    fn node_id(&self) -> NodeId {
        match self {
            PolyParam::Comptime { id, .. } | PolyParam::Pattern { id, .. } => *id,
        }
    }

    fn children(&self) -> Vec<AnyNode<'_>> {
        match self {
            PolyParam::Comptime { ty, .. } => vec![AnyNode::TypeExpr(ty)],
            PolyParam::Pattern { constraint, .. } => constraint.iter().map(AnyNode::TypeExpr).collect(),
        }
    }
}

impl AstNode for Param {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn children(&self) -> Vec<AnyNode<'_>> {
        let mut children = vec![AnyNode::TypeExpr(&self.ty)];
        children.extend(self.default.iter().map(AnyNode::Expr));
        children
    }
}

impl AstNode for StructDef {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn children(&self) -> Vec<AnyNode<'_>> {
        let mut children: Vec<AnyNode<'_>> = self.members.iter().map(AnyNode::Member).collect();
        children.extend(self.subtypes.iter().map(AnyNode::StructSubtype));
        children
    }
}

impl AstNode for StructSubtype {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn children(&self) -> Vec<AnyNode<'_>> {
        self.members.iter().map(AnyNode::Member).collect()
    }
}

impl AstNode for Member {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn children(&self) -> Vec<AnyNode<'_>> {
        vec![AnyNode::TypeExpr(&self.ty)]
    }
}

impl AstNode for EnumDef {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn children(&self) -> Vec<AnyNode<'_>> {
        self.variants.iter().map(AnyNode::EnumVariant).collect()
    }
}

impl AstNode for EnumVariant {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn children(&self) -> Vec<AnyNode<'_>> {
        self.value.iter().map(AnyNode::Expr).collect()
    }
}

impl AstNode for BakeDef {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn children(&self) -> Vec<AnyNode<'_>> {
        match &self.body {
            BakeBody::Expr(e) => vec![AnyNode::Expr(e)],
            BakeBody::Block(b) => vec![AnyNode::Block(b)],
        }
    }
}

impl AstNode for TypeExpr {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn children(&self) -> Vec<AnyNode<'_>> {
        match self.kind.as_ref() {
            TypeExprKind::Named(path) => vec![AnyNode::Path(path)],
            TypeExprKind::Pointer(inner) | TypeExprKind::Optional(inner) | TypeExprKind::Slice(inner) => {
                vec![AnyNode::TypeExpr(inner)]
            }
            TypeExprKind::Array { element, size } => {
                let mut children = vec![AnyNode::TypeExpr(element)];
                children.extend(size.iter().map(AnyNode::Expr));
                children
            }
            TypeExprKind::FunctionPointer { params, return_type } => {
                let mut children: Vec<AnyNode<'_>> = params.iter().map(AnyNode::TypeExpr).collect();
                children.extend(return_type.iter().map(AnyNode::TypeExpr));
                children
            }
            TypeExprKind::PolymorphicVar(_) | TypeExprKind::Error(_) => Vec::new(),
        }
    }
}

impl AstNode for Path {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn children(&self) -> Vec<AnyNode<'_>> {
        Vec::new()
    }
}

impl AstNode for Block {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn children(&self) -> Vec<AnyNode<'_>> {
        self.statements.iter().map(AnyNode::Stmt).collect()
    }
}

impl AstNode for Stmt {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn children(&self) -> Vec<AnyNode<'_>> {
        match &self.kind {
            StmtKind::Expr(e) => vec![AnyNode::Expr(e)],
            StmtKind::VarDecl { ty, init, .. } => {
                let mut children: Vec<AnyNode<'_>> = ty.iter().map(AnyNode::TypeExpr).collect();
                children.extend(init.iter().map(AnyNode::Expr));
                children
            }
            StmtKind::Defer(inner) => vec![AnyNode::Stmt(inner)],
            StmtKind::DeferRestore { target, value } => vec![AnyNode::Expr(target), AnyNode::Expr(value)],
            StmtKind::Return(value) => value.iter().map(AnyNode::Expr).collect(),
            StmtKind::Break | StmtKind::Continue => Vec::new(),
            StmtKind::If { condition, then_branch, else_branch } => {
                let mut children = vec![AnyNode::Expr(condition), AnyNode::Block(then_branch)];
                children.extend(else_branch.iter().map(|s| AnyNode::Stmt(s)));
                children
            }
            StmtKind::While { condition, body } => vec![AnyNode::Expr(condition), AnyNode::Block(body)],
            StmtKind::For { init, condition, increment, body } => {
                vec![AnyNode::Stmt(init), AnyNode::Expr(condition), AnyNode::Expr(increment), AnyNode::Block(body)]
            }
            StmtKind::Foreach { iterable, body, .. } => vec![AnyNode::Expr(iterable), AnyNode::Block(body)],
            StmtKind::Switch { scrutinee, cases, default } => {
                let mut children = vec![AnyNode::Expr(scrutinee)];
                children.extend(cases.iter().map(AnyNode::SwitchCase));
                children.extend(default.iter().map(AnyNode::Block));
                children
            }
            StmtKind::Block(b) => vec![AnyNode::Block(b)],
            StmtKind::Item(i) => vec![AnyNode::Item(i)],
            StmtKind::Error(_) | StmtKind::Empty => Vec::new(),
        }
    }
}

impl AstNode for SwitchCase {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn children(&self) -> Vec<AnyNode<'_>> {
        vec![AnyNode::Expr(&self.value), AnyNode::Block(&self.body)]
    }
}

impl AstNode for Expr {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn children(&self) -> Vec<AnyNode<'_>> {
        match self.kind.as_ref() {
            ExprKind::IntegerLiteral { .. }
            | ExprKind::FloatLiteral { .. }
            | ExprKind::StringLiteral(_)
            | ExprKind::CharLiteral(_)
            | ExprKind::BoolLiteral(_)
            | ExprKind::Identifier(_)
            | ExprKind::Error(_) => Vec::new(),
            ExprKind::Path(p) => vec![AnyNode::Path(p)],
            ExprKind::Binary { lhs, rhs, .. } => vec![AnyNode::Expr(lhs), AnyNode::Expr(rhs)],
            ExprKind::Unary { operand, .. } => vec![AnyNode::Expr(operand)],
            ExprKind::Call { callee, args } => {
                let mut children = vec![AnyNode::Expr(callee)];
                children.extend(args.iter().map(AnyNode::Arg));
                children
            }
            ExprKind::MemberAccess { object, .. } => vec![AnyNode::Expr(object)],
            ExprKind::Index { base, index } => vec![AnyNode::Expr(base), AnyNode::Expr(index)],
            ExprKind::ArrayLiteral(elements) => elements.iter().map(AnyNode::Expr).collect(),
            ExprKind::StructLiteral { path, fields } => {
                let mut children: Vec<AnyNode<'_>> = path.iter().map(AnyNode::Path).collect();
                children.extend(fields.iter().map(|(_, value)| AnyNode::Expr(value)));
                children
            }
            ExprKind::Cast { expr, ty, .. } => vec![AnyNode::Expr(expr), AnyNode::TypeExpr(ty)],
            ExprKind::AddressOf(inner) | ExprKind::Deref(inner) | ExprKind::Delete(inner) => {
                vec![AnyNode::Expr(inner)]
            }
            ExprKind::New { ty, count } => {
                let mut children = vec![AnyNode::TypeExpr(ty)];
                children.extend(count.iter().map(AnyNode::Expr));
                children
            }
            ExprKind::Assign { target, value } | ExprKind::CompoundAssign { target, value, .. } => {
                vec![AnyNode::Expr(target), AnyNode::Expr(value)]
            }
            ExprKind::Range { start, end } => {
                let mut children: Vec<AnyNode<'_>> = start.iter().map(AnyNode::Expr).collect();
                children.extend(end.iter().map(AnyNode::Expr));
                children
            }
            ExprKind::Bake(body) => match body.as_ref() {
                BakeBody::Expr(e) => vec![AnyNode::Expr(e)],
                BakeBody::Block(b) => vec![AnyNode::Block(b)],
            },
        }
    }
}

impl AstNode for Arg {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn children(&self) -> Vec<AnyNode<'_>> {
        vec![AnyNode::Expr(&self.value)]
    }
}
