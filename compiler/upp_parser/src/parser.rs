//! Recursive-descent parser with Pratt expression precedence. Never panics:
//! a malformed construct is skipped to the next recovery point and replaced
//! by an `error-expression`/`error-statement` node so downstream phases can
//! still walk a complete tree.

use crate::ast::*;
use crate::precedence::Precedence;
use upp_common::{Diagnostics, Ident, Span};
use upp_lexer::{Token, TokenType};

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    file_id: u32,
    arena: NodeArena,
    diagnostics: Diagnostics,
    /// True while parsing a condition/scrutinee directly followed by a
    /// block, so `name { ... }` is read as the block rather than a struct
    /// literal. Lifted inside any bracketed sub-expression.
    restrict_struct_literal: bool,
}

pub struct ParseOutput {
    pub module: Module,
    pub arena: NodeArena,
    pub diagnostics: Diagnostics,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], file_id: u32) -> Self {
        Self {
            tokens,
            pos: 0,
            file_id,
            arena: NodeArena::new(),
            diagnostics: Diagnostics::new(),
            restrict_struct_literal: false,
        }
    }

    fn restricted_expr(&mut self, min_prec: Precedence, parent: Option<NodeId>) -> Expr {
        let prev = self.restrict_struct_literal;
        self.restrict_struct_literal = true;
        let expr = self.parse_expr(min_prec, parent);
        self.restrict_struct_literal = prev;
        expr
    }

    fn allowing_struct_literal<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let prev = self.restrict_struct_literal;
        self.restrict_struct_literal = false;
        let result = f(self);
        self.restrict_struct_literal = prev;
        result
    }

    pub fn parse_module(mut self) -> ParseOutput {
        let start = self.current_span();
        let mut items = Vec::new();
        while !self.is_at_end() {
            items.push(self.parse_item(None));
        }
        let end = self.previous_span_or(start);
        let span = start.combine(end);
        let id = self.arena.alloc(span, None);
        ParseOutput { module: Module { items, span, id }, arena: self.arena, diagnostics: self.diagnostics }
    }

    // ---- token stream helpers ----

    fn peek(&self) -> &TokenType {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].value
    }

    fn peek_at(&self, offset: usize) -> &TokenType {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx].value
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos.min(self.tokens.len() - 1)].span
    }

    fn previous_span_or(&self, fallback: Span) -> Span {
        if self.pos == 0 {
            fallback
        } else {
            self.tokens[self.pos - 1].span
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek(), TokenType::EndOfFile)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.pos += 1;
        }
        &self.tokens[self.pos - 1]
    }

    fn check(&self, tt: &TokenType) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(tt)
    }

    fn matches(&mut self, tt: &TokenType) -> bool {
        if self.check(tt) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tt: TokenType, what: &str) -> Span {
        if self.check(&tt) {
            self.advance().span
        } else {
            let span = self.current_span();
            self.diagnostics.error("E-PARSE-EXPECT", format!("expected {what}, found '{}'", self.peek()), span);
            span
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Ident {
        if let TokenType::Identifier(id) = self.peek().clone() {
            self.advance();
            id
        } else {
            let span = self.current_span();
            self.diagnostics.error("E-PARSE-IDENT", format!("expected {what}"), span);
            Ident::error_placeholder()
        }
    }

    /// Skip tokens until the next statement-starting token or a closing
    /// delimiter, so parsing can resume after a malformed construct. Always
    /// consumes at least one token so callers can never spin in place.
    fn synchronize(&mut self) {
        if !self.is_at_end() {
            self.advance();
        }
        while !self.is_at_end() {
            if matches!(self.peek(), TokenType::Semicolon) {
                self.advance();
                return;
            }
            if matches!(
                self.peek(),
                TokenType::KeywordIf
                    | TokenType::KeywordWhile
                    | TokenType::KeywordFor
                    | TokenType::KeywordReturn
                    | TokenType::KeywordDefer
                    | TokenType::RightBrace
            ) {
                return;
            }
            if let TokenType::Identifier(_) = self.peek() {
                if matches!(self.peek_at(1), TokenType::DoubleColon) {
                    return;
                }
            }
            if matches!(self.peek(), TokenType::KeywordImport | TokenType::KeywordBake) {
                return;
            }
            self.advance();
        }
    }

    // ---- items ----

    fn parse_item(&mut self, parent: Option<NodeId>) -> Item {
        let start = self.current_span();
        let id = self.arena.alloc(start, parent);
        let kind = match self.peek().clone() {
            TokenType::KeywordImport => ItemKind::Import(self.parse_import(id)),
            TokenType::Identifier(_) if matches!(self.peek_at(1), TokenType::DoubleColon) => {
                self.parse_comptime_binding(id)
            }
            TokenType::KeywordBake => ItemKind::Bake(self.parse_bake(Some(id))),
            _ => {
                let span = self.current_span();
                let msg = format!("expected a top-level item, found '{}'", self.peek());
                self.diagnostics.error("E-PARSE-ITEM", msg.clone(), span);
                self.synchronize();
                ItemKind::Error(msg)
            }
        };
        let span = start.combine(self.previous_span_or(start));
        Item { kind, span, id }
    }

    fn parse_import(&mut self, parent: NodeId) -> Import {
        let start = self.current_span();
        self.advance();
        let kind = if self.matches(&TokenType::KeywordProject) {
            let name = self.expect_identifier("project name");
            ImportKind::Project(name)
        } else if let TokenType::StringLiteral(path) = self.peek().clone() {
            self.advance();
            ImportKind::File(path)
        } else {
            let span = self.current_span();
            self.diagnostics.error("E-PARSE-IMPORT", "expected a string path or 'project'", span);
            ImportKind::File(String::new())
        };
        self.matches(&TokenType::Semicolon);
        let span = start.combine(self.previous_span_or(start));
        Import { kind, span, id: self.arena.alloc(span, Some(parent)) }
    }

    /// A binding shaped `name :: ...`: function, struct, enum, or a plain
    /// comptime value definition; all share the same `::` prefix.
    fn parse_comptime_binding(&mut self, id: NodeId) -> ItemKind {
        let name = self.expect_identifier("binding name");
        self.advance(); // `::`
        match self.peek().clone() {
            TokenType::LeftParen => ItemKind::Function(self.parse_function_tail(name, id)),
            TokenType::KeywordStruct => ItemKind::Struct(self.parse_struct_tail(name, Some(id))),
            TokenType::KeywordEnum => ItemKind::Enum(self.parse_enum_tail(name, Some(id))),
            _ => {
                let value = self.parse_expr(Precedence::Assignment, Some(id));
                self.matches(&TokenType::Semicolon);
                ItemKind::Definition(Definition { name, value, id })
            }
        }
    }

    fn parse_function_tail(&mut self, name: Ident, id: NodeId) -> FunctionDef {
        let mut poly_params = Vec::new();
        let mut params = Vec::new();
        self.expect(TokenType::LeftParen, "'('");
        while !self.check(&TokenType::RightParen) && !self.is_at_end() {
            if self.matches(&TokenType::Dollar) {
                let pstart = self.previous_span_or(self.current_span());
                let pname = self.expect_identifier("pattern variable name");
                let constraint = if self.matches(&TokenType::Colon) { Some(self.parse_type(Some(id))) } else { None };
                let span = pstart.combine(self.previous_span_or(pstart));
                poly_params.push(PolyParam::Pattern { name: pname, constraint, span, id: self.arena.alloc(span, Some(id)) });
            } else if self.matches(&TokenType::KeywordComptime) {
                let pstart = self.previous_span_or(self.current_span());
                let pname = self.expect_identifier("comptime parameter name");
                self.expect(TokenType::Colon, "':'");
                let ty = self.parse_type(Some(id));
                let span = pstart.combine(self.previous_span_or(pstart));
                poly_params.push(PolyParam::Comptime { name: pname, ty, span, id: self.arena.alloc(span, Some(id)) });
            } else {
                params.push(self.parse_param(Some(id)));
            }
            if !self.matches(&TokenType::Comma) {
                break;
            }
        }
        self.expect(TokenType::RightParen, "')'");
        let return_type = if self.matches(&TokenType::Arrow) { Some(self.parse_type(Some(id))) } else { None };
        let body = self.parse_block(Some(id));
        FunctionDef { name, poly_params, params, return_type, body, id }
    }

    fn parse_param(&mut self, parent: Option<NodeId>) -> Param {
        let start = self.current_span();
        let must_not_be_set = self.matches(&TokenType::LogicalNot);
        let named_only = false;
        let name = self.expect_identifier("parameter name");
        self.expect(TokenType::Colon, "':'");
        let ty = self.parse_type(parent);
        let default = if self.matches(&TokenType::Assign) { Some(self.parse_expr(Precedence::Assignment, parent)) } else { None };
        let span = start.combine(self.previous_span_or(start));
        Param {
            name,
            ty,
            required: default.is_none() && !must_not_be_set,
            named_only,
            must_not_be_set,
            default,
            span,
            id: self.arena.alloc(span, parent),
        }
    }

    fn parse_struct_tail(&mut self, name: Ident, parent: Option<NodeId>) -> StructDef {
        self.advance(); // 'struct'
        self.expect(TokenType::LeftBrace, "'{'");
        let mut members = Vec::new();
        let mut subtypes = Vec::new();
        let mut discriminant = None;
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            if let TokenType::Identifier(_) = self.peek().clone() {
                if matches!(self.peek_at(1), TokenType::KeywordStruct) {
                    let sub_name = self.expect_identifier("subtype name");
                    self.advance(); // 'struct'
                    self.expect(TokenType::LeftBrace, "'{'");
                    let sub_start = self.previous_span_or(self.current_span());
                    let mut sub_members = Vec::new();
                    while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
                        sub_members.push(self.parse_member(parent));
                    }
                    let end = self.expect(TokenType::RightBrace, "'}'");
                    let span = sub_start.combine(end);
                    subtypes.push(StructSubtype { name: sub_name, members: sub_members, span, id: self.arena.alloc(span, parent) });
                    continue;
                }
            }
            let member = self.parse_member(parent);
            if discriminant.is_none() && subtypes.is_empty() {
                discriminant = Some(member.name);
            }
            members.push(member);
        }
        self.expect(TokenType::RightBrace, "'}'");
        let id = parent.unwrap_or_else(|| self.arena.alloc(self.current_span(), parent));
        let discriminant = if subtypes.is_empty() { None } else { discriminant };
        StructDef { name, members, subtypes, discriminant, id }
    }

    fn parse_member(&mut self, parent: Option<NodeId>) -> Member {
        let start = self.current_span();
        let name = self.expect_identifier("member name");
        self.expect(TokenType::Colon, "':'");
        let ty = self.parse_type(parent);
        self.matches(&TokenType::Semicolon);
        let span = start.combine(self.previous_span_or(start));
        Member { name, ty, span, id: self.arena.alloc(span, parent) }
    }

    fn parse_enum_tail(&mut self, name: Ident, parent: Option<NodeId>) -> EnumDef {
        self.advance(); // 'enum'
        self.expect(TokenType::LeftBrace, "'{'");
        let mut variants = Vec::new();
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            let start = self.current_span();
            let vname = self.expect_identifier("variant name");
            let value = if self.matches(&TokenType::Assign) { Some(self.parse_expr(Precedence::Assignment, parent)) } else { None };
            self.matches(&TokenType::Comma);
            let span = start.combine(self.previous_span_or(start));
            variants.push(EnumVariant { name: vname, value, span, id: self.arena.alloc(span, parent) });
        }
        self.expect(TokenType::RightBrace, "'}'");
        let id = parent.unwrap_or_else(|| self.arena.alloc(self.current_span(), parent));
        EnumDef { name, variants, id }
    }

    fn parse_bake(&mut self, parent: Option<NodeId>) -> BakeDef {
        let start = self.current_span();
        self.advance(); // 'bake'
        let body = if self.check(&TokenType::LeftBrace) {
            BakeBody::Block(self.parse_block(parent))
        } else {
            BakeBody::Expr(self.parse_expr(Precedence::Assignment, parent))
        };
        self.matches(&TokenType::Semicolon);
        let span = start.combine(self.previous_span_or(start));
        BakeDef { body, span, id: parent.unwrap_or_else(|| self.arena.alloc(span, parent)) }
    }

    // ---- types ----

    fn parse_type(&mut self, parent: Option<NodeId>) -> TypeExpr {
        let start = self.current_span();
        if self.matches(&TokenType::Star) {
            let inner = self.parse_type(parent);
            let span = start.combine(inner.span);
            return TypeExpr { span, kind: Box::new(TypeExprKind::Pointer(inner)), id: self.arena.alloc(span, parent) };
        }
        if self.matches(&TokenType::Question) {
            let inner = self.parse_type(parent);
            let span = start.combine(inner.span);
            return TypeExpr { span, kind: Box::new(TypeExprKind::Optional(inner)), id: self.arena.alloc(span, parent) };
        }
        if self.matches(&TokenType::Dollar) {
            let name = self.expect_identifier("pattern variable");
            let span = start.combine(self.previous_span_or(start));
            return TypeExpr { span, kind: Box::new(TypeExprKind::PolymorphicVar(name)), id: self.arena.alloc(span, parent) };
        }
        if self.matches(&TokenType::LeftBracket) {
            let size = if !self.check(&TokenType::RightBracket) { Some(self.parse_expr(Precedence::Assignment, parent)) } else { None };
            self.expect(TokenType::RightBracket, "']'");
            let element = self.parse_type(parent);
            let span = start.combine(element.span);
            return TypeExpr {
                span,
                kind: Box::new(TypeExprKind::Array { element, size }),
                id: self.arena.alloc(span, parent),
            };
        }
        if self.matches(&TokenType::LeftBrace) {
            // `{}T` slice syntax
            self.expect(TokenType::RightBrace, "'}'");
            let element = self.parse_type(parent);
            let span = start.combine(element.span);
            return TypeExpr { span, kind: Box::new(TypeExprKind::Slice(element)), id: self.arena.alloc(span, parent) };
        }
        if let TokenType::Identifier(_) = self.peek().clone() {
            let path = self.parse_path(parent);
            let span = path.span;
            return TypeExpr { span, kind: Box::new(TypeExprKind::Named(path)), id: self.arena.alloc(span, parent) };
        }
        let span = self.current_span();
        let msg = format!("expected a type, found '{}'", self.peek());
        self.diagnostics.error("E-PARSE-TYPE", msg.clone(), span);
        TypeExpr { span, kind: Box::new(TypeExprKind::Error(msg)), id: self.arena.alloc(span, parent) }
    }

    fn parse_path(&mut self, parent: Option<NodeId>) -> Path {
        let start = self.current_span();
        let mut segments = vec![self.expect_identifier("identifier")];
        while self.matches(&TokenType::DoubleColon) {
            segments.push(self.expect_identifier("path segment"));
        }
        let span = start.combine(self.previous_span_or(start));
        Path { segments, span, id: self.arena.alloc(span, parent) }
    }

    // ---- statements ----

    fn parse_block(&mut self, parent: Option<NodeId>) -> Block {
        let start = self.current_span();
        let id = self.arena.alloc(start, parent);
        self.expect(TokenType::LeftBrace, "'{'");
        let mut statements = Vec::new();
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            statements.push(self.parse_statement(Some(id)));
        }
        let end = self.expect(TokenType::RightBrace, "'}'");
        Block { statements, span: start.combine(end), id }
    }

    fn parse_statement(&mut self, parent: Option<NodeId>) -> Stmt {
        let start = self.current_span();
        let id = self.arena.alloc(start, parent);
        let kind = match self.peek().clone() {
            TokenType::Semicolon => {
                self.advance();
                StmtKind::Empty
            }
            TokenType::LeftBrace => StmtKind::Block(self.parse_block(parent)),
            TokenType::KeywordDefer => {
                self.advance();
                let target_start = self.current_span();
                let expr = self.parse_expr(Precedence::Assignment, Some(id));
                if self.matches(&TokenType::Assign) {
                    let value = self.parse_expr(Precedence::Assignment, Some(id));
                    self.matches(&TokenType::Semicolon);
                    StmtKind::DeferRestore { target: expr, value }
                } else {
                    self.matches(&TokenType::Semicolon);
                    let inner_id = self.arena.alloc(target_start, Some(id));
                    let inner_span = expr.span;
                    StmtKind::Defer(Box::new(Stmt { kind: StmtKind::Expr(expr), span: inner_span, id: inner_id }))
                }
            }
            TokenType::KeywordReturn => {
                self.advance();
                let value =
                    if self.check(&TokenType::Semicolon) { None } else { Some(self.parse_expr(Precedence::Assignment, Some(id))) };
                self.matches(&TokenType::Semicolon);
                StmtKind::Return(value)
            }
            TokenType::KeywordBreak => {
                self.advance();
                self.matches(&TokenType::Semicolon);
                StmtKind::Break
            }
            TokenType::KeywordContinue => {
                self.advance();
                self.matches(&TokenType::Semicolon);
                StmtKind::Continue
            }
            TokenType::KeywordIf => self.parse_if(id),
            TokenType::KeywordWhile => self.parse_while(id),
            TokenType::KeywordFor => self.parse_for(id),
            TokenType::KeywordForeach => self.parse_foreach(id),
            TokenType::KeywordSwitch => self.parse_switch(id),
            TokenType::Identifier(_)
                if matches!(self.peek_at(1), TokenType::Colon)
                    && !matches!(self.peek_at(2), TokenType::Colon) =>
            {
                self.parse_var_decl(id)
            }
            _ => {
                let expr = self.parse_expr(Precedence::Assignment, Some(id));
                self.matches(&TokenType::Semicolon);
                StmtKind::Expr(expr)
            }
        };
        let span = start.combine(self.previous_span_or(start));
        Stmt { kind, span, id }
    }

    fn parse_var_decl(&mut self, id: NodeId) -> StmtKind {
        let name = self.expect_identifier("variable name");
        self.expect(TokenType::Colon, "':'");
        let mutable = self.matches(&TokenType::KeywordMut);
        let ty = if !self.check(&TokenType::Assign) { Some(self.parse_type(Some(id))) } else { None };
        let init = if self.matches(&TokenType::Assign) { Some(self.parse_expr(Precedence::Assignment, Some(id))) } else { None };
        self.matches(&TokenType::Semicolon);
        StmtKind::VarDecl { name, ty, mutable, init }
    }

    fn parse_if(&mut self, id: NodeId) -> StmtKind {
        self.advance();
        let condition = self.restricted_expr(Precedence::Assignment, Some(id));
        let then_branch = self.parse_block(Some(id));
        let else_branch = if self.matches(&TokenType::KeywordElse) {
            if self.check(&TokenType::KeywordIf) {
                let start = self.current_span();
                let else_id = self.arena.alloc(start, Some(id));
                let kind = self.parse_if(else_id);
                Some(Box::new(Stmt { kind, span: start.combine(self.previous_span_or(start)), id: else_id }))
            } else {
                let block = self.parse_block(Some(id));
                let else_id = self.arena.alloc(block.span, Some(id));
                Some(Box::new(Stmt { span: block.span, kind: StmtKind::Block(block), id: else_id }))
            }
        } else {
            None
        };
        StmtKind::If { condition, then_branch, else_branch }
    }

    fn parse_while(&mut self, id: NodeId) -> StmtKind {
        self.advance();
        let condition = self.restricted_expr(Precedence::Assignment, Some(id));
        let body = self.parse_block(Some(id));
        StmtKind::While { condition, body }
    }

    fn parse_for(&mut self, id: NodeId) -> StmtKind {
        self.advance();
        let init_start = self.current_span();
        let init_id = self.arena.alloc(init_start, Some(id));
        let init_kind = self.parse_var_decl(init_id);
        let init = Box::new(Stmt { kind: init_kind, span: init_start.combine(self.previous_span_or(init_start)), id: init_id });
        self.expect(TokenType::Semicolon, "';'");
        let condition = self.restricted_expr(Precedence::Assignment, Some(id));
        self.expect(TokenType::Semicolon, "';'");
        let increment = self.restricted_expr(Precedence::Assignment, Some(id));
        let body = self.parse_block(Some(id));
        StmtKind::For { init, condition, increment, body }
    }

    fn parse_foreach(&mut self, id: NodeId) -> StmtKind {
        self.advance();
        let binding = self.expect_identifier("loop variable");
        self.expect(TokenType::KeywordIn, "'in'");
        let iterable = self.restricted_expr(Precedence::Assignment, Some(id));
        let body = self.parse_block(Some(id));
        StmtKind::Foreach { binding, iterable, body }
    }

    fn parse_switch(&mut self, id: NodeId) -> StmtKind {
        self.advance();
        let scrutinee = self.restricted_expr(Precedence::Assignment, Some(id));
        self.expect(TokenType::LeftBrace, "'{'");
        let mut cases = Vec::new();
        let mut default = None;
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            let start = self.current_span();
            if self.matches(&TokenType::KeywordDefault) {
                self.expect(TokenType::FatArrow, "'=>'");
                default = Some(self.parse_block(Some(id)));
            } else {
                let value = self.parse_expr(Precedence::Assignment, Some(id));
                self.expect(TokenType::FatArrow, "'=>'");
                let body = self.parse_block(Some(id));
                let span = start.combine(self.previous_span_or(start));
                cases.push(SwitchCase { value, body, span, id: self.arena.alloc(span, Some(id)) });
            }
        }
        self.expect(TokenType::RightBrace, "'}'");
        StmtKind::Switch { scrutinee, cases, default }
    }

    // ---- expressions (Pratt) ----

    fn parse_expr(&mut self, min_prec: Precedence, parent: Option<NodeId>) -> Expr {
        let mut left = self.parse_unary(parent);
        loop {
            if min_prec <= Precedence::Assignment {
                if let Some(op) = self.compound_assign_op() {
                    self.advance();
                    let value = self.parse_expr(Precedence::Assignment, parent);
                    let span = left.span.combine(value.span);
                    left = Expr {
                        span,
                        id: self.fresh_expr_id(span, parent),
                        kind: Box::new(ExprKind::CompoundAssign { op, target: left, value }),
                    };
                    continue;
                }
            }
            let (op, prec, right_assoc) = match self.binary_op_info() {
                Some(info) => info,
                None => break,
            };
            if prec < min_prec {
                break;
            }
            self.advance();
            if op.is_none() {
                left = self.parse_assignment_tail(left, parent);
                continue;
            }
            let next_min = if right_assoc { prec } else { prec.next() };
            let right = self.parse_expr(next_min, parent);
            let span = left.span.combine(right.span);
            left = Expr {
                span,
                id: self.fresh_expr_id(span, parent),
                kind: Box::new(ExprKind::Binary { op: op.unwrap(), lhs: left, rhs: right }),
            };
        }
        left
    }

    fn compound_assign_op(&self) -> Option<BinaryOp> {
        use BinaryOp::*;
        Some(match self.peek() {
            TokenType::PlusAssign => Add,
            TokenType::MinusAssign => Sub,
            TokenType::StarAssign => Mul,
            TokenType::SlashAssign => Div,
            TokenType::PercentAssign => Mod,
            _ => return None,
        })
    }

    fn fresh_expr_id(&mut self, span: Span, parent: Option<NodeId>) -> NodeId {
        self.arena.alloc(span, parent)
    }

    fn parse_assignment_tail(&mut self, target: Expr, parent: Option<NodeId>) -> Expr {
        let value = self.parse_expr(Precedence::Assignment, parent);
        let span = target.span.combine(value.span);
        Expr { span, id: self.fresh_expr_id(span, parent), kind: Box::new(ExprKind::Assign { target, value }) }
    }

    /// Returns `(op, precedence, right_associative)`. `op = None` marks a
    /// plain `=` assignment, handled by the caller rather than folded into
    /// `BinaryOp`.
    fn binary_op_info(&self) -> Option<(Option<BinaryOp>, Precedence, bool)> {
        use BinaryOp::*;
        use Precedence as P;
        Some(match self.peek() {
            TokenType::Assign => (None, P::Assignment, true),
            TokenType::LogicalOr => (Some(Or), P::Or, false),
            TokenType::LogicalAnd => (Some(And), P::And, false),
            TokenType::Equal => (Some(Eq), P::Equality, false),
            TokenType::NotEqual => (Some(Ne), P::Equality, false),
            TokenType::Less => (Some(Lt), P::Comparison, false),
            TokenType::LessEqual => (Some(Le), P::Comparison, false),
            TokenType::Greater => (Some(Gt), P::Comparison, false),
            TokenType::GreaterEqual => (Some(Ge), P::Comparison, false),
            TokenType::Pipe => (Some(BitOr), P::BitOr, false),
            TokenType::Caret => (Some(BitXor), P::BitXor, false),
            TokenType::Ampersand => (Some(BitAnd), P::BitAnd, false),
            TokenType::LeftShift => (Some(Shl), P::Shift, false),
            TokenType::RightShift => (Some(Shr), P::Shift, false),
            TokenType::Plus => (Some(Add), P::Term, false),
            TokenType::Minus => (Some(Sub), P::Term, false),
            TokenType::Star => (Some(Mul), P::Factor, false),
            TokenType::Slash => (Some(Div), P::Factor, false),
            TokenType::Percent => (Some(Mod), P::Factor, false),
            _ => return None,
        })
    }

    fn parse_unary(&mut self, parent: Option<NodeId>) -> Expr {
        let start = self.current_span();
        match self.peek() {
            TokenType::Minus => {
                self.advance();
                let operand = self.parse_unary(parent);
                self.wrap_unary(UnaryOp::Neg, operand, start, parent)
            }
            TokenType::LogicalNot => {
                self.advance();
                let operand = self.parse_unary(parent);
                self.wrap_unary(UnaryOp::Not, operand, start, parent)
            }
            TokenType::Tilde => {
                self.advance();
                let operand = self.parse_unary(parent);
                self.wrap_unary(UnaryOp::BitNot, operand, start, parent)
            }
            TokenType::Ampersand => {
                self.advance();
                let operand = self.parse_unary(parent);
                let span = start.combine(operand.span);
                Expr { span, id: self.fresh_expr_id(span, parent), kind: Box::new(ExprKind::AddressOf(operand)) }
            }
            TokenType::Star => {
                self.advance();
                let operand = self.parse_unary(parent);
                let span = start.combine(operand.span);
                Expr { span, id: self.fresh_expr_id(span, parent), kind: Box::new(ExprKind::Deref(operand)) }
            }
            TokenType::KeywordNew => {
                self.advance();
                let ty = self.parse_type(parent);
                let count = if self.matches(&TokenType::LeftBracket) {
                    let expr = self.parse_expr(Precedence::Assignment, parent);
                    self.expect(TokenType::RightBracket, "']'");
                    Some(expr)
                } else {
                    None
                };
                let span = start.combine(self.previous_span_or(start));
                Expr { span, id: self.fresh_expr_id(span, parent), kind: Box::new(ExprKind::New { ty, count }) }
            }
            TokenType::KeywordDelete => {
                self.advance();
                let operand = self.parse_unary(parent);
                let span = start.combine(operand.span);
                Expr { span, id: self.fresh_expr_id(span, parent), kind: Box::new(ExprKind::Delete(operand)) }
            }
            _ => self.parse_call_and_postfix(parent),
        }
    }

    fn wrap_unary(&mut self, op: UnaryOp, operand: Expr, start: Span, parent: Option<NodeId>) -> Expr {
        let span = start.combine(operand.span);
        Expr { span, id: self.fresh_expr_id(span, parent), kind: Box::new(ExprKind::Unary { op, operand }) }
    }

    fn parse_call_and_postfix(&mut self, parent: Option<NodeId>) -> Expr {
        let mut expr = self.parse_primary(parent);
        loop {
            match self.peek() {
                TokenType::LeftParen => {
                    self.advance();
                    let mut args = Vec::new();
                    self.allowing_struct_literal(|this| {
                        while !this.check(&TokenType::RightParen) && !this.is_at_end() {
                            let name = if matches!(this.peek(), TokenType::Identifier(_)) && matches!(this.peek_at(1), TokenType::Colon) {
                                let n = this.expect_identifier("argument name");
                                this.advance(); // ':'
                                Some(n)
                            } else {
                                None
                            };
                            let value = this.parse_expr(Precedence::Assignment, parent);
                            let arg_id = this.arena.alloc(value.span, parent);
                            args.push(Arg { name, value, id: arg_id });
                            if !this.matches(&TokenType::Comma) {
                                break;
                            }
                        }
                    });
                    let end = self.expect(TokenType::RightParen, "')'");
                    let span = expr.span.combine(end);
                    expr = Expr { span, id: self.fresh_expr_id(span, parent), kind: Box::new(ExprKind::Call { callee: expr, args }) };
                }
                TokenType::Dot => {
                    self.advance();
                    let member = self.expect_identifier("member name");
                    let span = expr.span.combine(self.previous_span_or(expr.span));
                    expr =
                        Expr { span, id: self.fresh_expr_id(span, parent), kind: Box::new(ExprKind::MemberAccess { object: expr, member }) };
                }
                TokenType::LeftBracket => {
                    self.advance();
                    let index = self.allowing_struct_literal(|this| this.parse_expr(Precedence::Assignment, parent));
                    let end = self.expect(TokenType::RightBracket, "']'");
                    let span = expr.span.combine(end);
                    expr = Expr { span, id: self.fresh_expr_id(span, parent), kind: Box::new(ExprKind::Index { base: expr, index }) };
                }
                TokenType::KeywordAs => {
                    self.advance();
                    let ty = self.parse_type(parent);
                    let span = expr.span.combine(ty.span);
                    expr = Expr { span, id: self.fresh_expr_id(span, parent), kind: Box::new(ExprKind::Cast { expr, ty, explicit: true }) };
                }
                TokenType::DoubleDot => {
                    self.advance();
                    let end_expr = if self.can_start_expr() { Some(self.parse_unary(parent)) } else { None };
                    let span = expr.span.combine(end_expr.as_ref().map(|e| e.span).unwrap_or(expr.span));
                    expr = Expr {
                        span,
                        id: self.fresh_expr_id(span, parent),
                        kind: Box::new(ExprKind::Range { start: Some(expr), end: end_expr }),
                    };
                }
                _ => break,
            }
        }
        expr
    }

    fn can_start_expr(&self) -> bool {
        !matches!(
            self.peek(),
            TokenType::Semicolon
                | TokenType::RightParen
                | TokenType::RightBrace
                | TokenType::RightBracket
                | TokenType::Comma
                | TokenType::EndOfFile
        )
    }

    fn parse_primary(&mut self, parent: Option<NodeId>) -> Expr {
        let start = self.current_span();
        let kind = match self.peek().clone() {
            TokenType::IntegerLiteral { digits, suffix } => {
                self.advance();
                ExprKind::IntegerLiteral { digits, suffix }
            }
            TokenType::FloatLiteral { digits, suffix } => {
                self.advance();
                ExprKind::FloatLiteral { digits, suffix }
            }
            TokenType::StringLiteral(s) => {
                self.advance();
                ExprKind::StringLiteral(s)
            }
            TokenType::CharLiteral(c) => {
                self.advance();
                ExprKind::CharLiteral(c)
            }
            TokenType::BooleanLiteral(b) => {
                self.advance();
                ExprKind::BoolLiteral(b)
            }
            TokenType::KeywordBake => ExprKind::Bake(Box::new(self.parse_bake(parent).body)),
            TokenType::Dollar => {
                self.advance();
                let name = self.expect_identifier("pattern variable reference");
                ExprKind::Identifier(name)
            }
            TokenType::Dot => {
                self.advance();
                self.expect(TokenType::LeftBracket, "'['");
                let mut elements = Vec::new();
                self.allowing_struct_literal(|this| {
                    while !this.check(&TokenType::RightBracket) && !this.is_at_end() {
                        elements.push(this.parse_expr(Precedence::Assignment, parent));
                        if !this.matches(&TokenType::Comma) {
                            break;
                        }
                    }
                });
                self.expect(TokenType::RightBracket, "']'");
                ExprKind::ArrayLiteral(elements)
            }
            TokenType::LeftParen => {
                self.advance();
                let inner = self.allowing_struct_literal(|this| this.parse_expr(Precedence::Assignment, parent));
                self.expect(TokenType::RightParen, "')'");
                return inner;
            }
            TokenType::Identifier(_) => {
                let path = self.parse_path(parent);
                if self.check(&TokenType::LeftBrace) && self.looks_like_struct_literal() {
                    self.advance();
                    let mut fields = Vec::new();
                    while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
                        let fname = self.expect_identifier("field name");
                        self.expect(TokenType::Colon, "':'");
                        let fvalue = self.parse_expr(Precedence::Assignment, parent);
                        fields.push((fname, fvalue));
                        if !self.matches(&TokenType::Comma) {
                            break;
                        }
                    }
                    self.expect(TokenType::RightBrace, "'}'");
                    ExprKind::StructLiteral { path: Some(path), fields }
                } else if path.segments.len() == 1 {
                    ExprKind::Identifier(path.segments[0])
                } else {
                    ExprKind::Path(path)
                }
            }
            other => {
                let span = self.current_span();
                let msg = format!("expected an expression, found '{other}'");
                self.diagnostics.error("E-PARSE-EXPR", msg.clone(), span);
                if !self.is_at_end() {
                    self.advance();
                }
                ExprKind::Error(msg)
            }
        };
        let span = start.combine(self.previous_span_or(start));
        Expr { span, id: self.fresh_expr_id(span, parent), kind: Box::new(kind) }
    }

    fn looks_like_struct_literal(&self) -> bool {
        !self.restrict_struct_literal
    }
}

/// Runs the full pipeline: lex then parse. Tokens are produced against the
/// caller-owned identifier pool so names resolve consistently downstream.
pub fn parse(source: &str, file_id: u32, pool: &mut upp_common::IdentPool) -> (ParseOutput, Vec<Token>) {
    let (tokens, lex_diags) = upp_lexer::lex(source, file_id, pool);
    let parser = Parser::new(&tokens, file_id);
    let mut output = parser.parse_module();
    output.diagnostics.extend(lex_diags);
    (output, tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use upp_common::IdentPool;

    fn parse_source(source: &str) -> (ParseOutput, IdentPool) {
        let mut pool = IdentPool::new();
        let (tokens, _) = upp_lexer::lex(source, 0, &mut pool);
        let parser = Parser::new(&tokens, 0);
        (parser.parse_module(), pool)
    }

    #[test]
    fn parses_main_with_assert() {
        let (out, _) = parse_source("main :: () { assert(1 + 1 == 2); }");
        assert!(out.diagnostics.is_empty());
        assert_eq!(out.module.items.len(), 1);
        match &out.module.items[0].kind {
            ItemKind::Function(f) => {
                assert_eq!(f.params.len(), 0);
                assert_eq!(f.body.statements.len(), 1);
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn parses_polymorphic_function() {
        let (out, pool) = parse_source("id :: ($T: Type, x: T) -> T { return x; }");
        match &out.module.items[0].kind {
            ItemKind::Function(f) => {
                assert_eq!(f.poly_params.len(), 1);
                match &f.poly_params[0] {
                    PolyParam::Pattern { name, constraint, .. } => {
                        assert_eq!(pool.resolve(*name), "T");
                        assert!(constraint.is_some());
                    }
                    other => panic!("expected pattern param, got {other:?}"),
                }
                assert_eq!(f.params.len(), 1);
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn parses_array_literal_and_index() {
        let (out, _) = parse_source("main :: () { a: [3]i32 = .[1, 2, 3]; print_i32(a[3]); }");
        match &out.module.items[0].kind {
            ItemKind::Function(f) => {
                assert_eq!(f.body.statements.len(), 2);
                match &f.body.statements[0].kind {
                    StmtKind::VarDecl { init: Some(e), .. } => {
                        assert!(matches!(*e.kind, ExprKind::ArrayLiteral(_)));
                    }
                    other => panic!("expected var decl, got {other:?}"),
                }
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn parses_struct_with_tagged_union_subtype() {
        let (out, _) = parse_source(
            "shape :: struct { kind: i32; circle struct { radius: i32; } square struct { side: i32; } }",
        );
        match &out.module.items[0].kind {
            ItemKind::Struct(s) => {
                assert_eq!(s.members.len(), 1);
                assert_eq!(s.subtypes.len(), 2);
                assert!(s.discriminant.is_some());
            }
            other => panic!("expected struct, got {other:?}"),
        }
    }

    #[test]
    fn parses_defer_and_return() {
        let (out, _) = parse_source("main :: () { defer print_i32(1); return 0; }");
        match &out.module.items[0].kind {
            ItemKind::Function(f) => {
                assert!(matches!(f.body.statements[0].kind, StmtKind::Defer(_)));
                assert!(matches!(f.body.statements[1].kind, StmtKind::Return(Some(_))));
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn malformed_item_recovers_with_error_node() {
        let (out, _) = parse_source("@@@ main :: () {}");
        assert!(out.diagnostics.has_errors());
        assert!(out.module.items.iter().any(|i| matches!(i.kind, ItemKind::Function(_))));
    }

    #[test]
    fn node_arena_records_block_parent() {
        let (out, _) = parse_source("main :: () { return 0; }");
        match &out.module.items[0].kind {
            ItemKind::Function(f) => {
                let block_parent = out.arena.parent_of(f.body.id);
                assert!(block_parent.is_some());
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn named_bake_binds_a_value() {
        let (out, _) = parse_source("limit :: bake { 5 + 5 };");
        match &out.module.items[0].kind {
            ItemKind::Definition(d) => assert!(matches!(*d.value.kind, ExprKind::Bake(_))),
            other => panic!("expected definition, got {other:?}"),
        }
    }

    #[test]
    fn anonymous_bake_is_a_standalone_item() {
        let (out, _) = parse_source("bake { assert(1 == 1); }");
        match &out.module.items[0].kind {
            ItemKind::Bake(b) => assert!(matches!(b.body, BakeBody::Block(_))),
            other => panic!("expected bake item, got {other:?}"),
        }
    }
}
