//! Lowers a function body into an [`IrProgram`].
//!
//! Keeps its own `variable_mapping`, independent of the symbol table the
//! semantic analyser builds. By the time a function body is lowered, its
//! parameters and locals only need a name-to-storage mapping, not the
//! full symbol machinery used to resolve forward references.

use hashbrown::HashMap;
use upp_common::{Diagnostic, Diagnostics, Ident, IdentPool};
use upp_parser::{Block, EnumDef, Expr, ExprKind, FunctionDef, Path, Stmt, StmtKind, StructDef, TypeExpr, TypeExprKind};
use upp_types::{
    ArrayCount, EnumShape, FunctionSignature, Modifiers, PrimitiveType, StructMember, StructShape,
    StructSubtypeShape, TypeId, TypeKind, TypeRegistry,
};

use crate::data_access::{DataAccess, DataAccessKind};
use crate::ids::{BlockId, FunctionId};
use crate::instruction::{Call, CallTarget, Instruction, Return, SwitchCase, UnaryOpKind};
use crate::program::IrProgram;

struct LoopFrame {
    continue_label: u32,
    break_label: u32,
    /// `for`'s increment expression, re-run by every `continue` before it
    /// jumps back to the condition. `None` for `while`/`foreach`, which
    /// have nothing to re-run.
    increment: Option<Expr>,
}

/// A defer recorded during block lowering: re-emitted at every exit path
/// beneath `depth`, in reverse registration order.
struct DeferFrame {
    depth: usize,
    kind: DeferKind,
}

enum DeferKind {
    Stmt(Stmt),
    /// `defer_restore lhs = rhs`: `saved` holds `lhs`'s value at
    /// registration time; restoring just moves it back.
    Restore { target: Expr, saved: DataAccess },
}

pub struct Generator<'a> {
    pub program: IrProgram,
    types: &'a mut TypeRegistry,
    idents: &'a IdentPool,
    diagnostics: &'a mut Diagnostics,
    named_types: HashMap<Ident, TypeId>,
    function_ids: HashMap<Ident, FunctionId>,
    scopes: Vec<HashMap<Ident, DataAccess>>,
    defer_stack: Vec<DeferFrame>,
    loop_stack: Vec<LoopFrame>,
    next_label: u32,
    current_block: BlockId,
}

impl<'a> Generator<'a> {
    pub fn new(types: &'a mut TypeRegistry, idents: &'a IdentPool, diagnostics: &'a mut Diagnostics) -> Self {
        Self {
            program: IrProgram::new(),
            types,
            idents,
            diagnostics,
            named_types: HashMap::new(),
            function_ids: HashMap::new(),
            scopes: Vec::new(),
            defer_stack: Vec::new(),
            loop_stack: Vec::new(),
            next_label: 0,
            current_block: BlockId(0),
        }
    }

    pub fn register_named_type(&mut self, name: Ident, ty: TypeId) {
        self.named_types.insert(name, ty);
    }

    /// Interns `def`'s member types (resolved against whatever's already
    /// been registered, so a member naming a struct declared earlier in
    /// the module resolves to its real type) and registers the result
    /// under `def.name`. A member naming a struct declared *later* still
    /// resolves to `unknown`, since the registry interns by value and has
    /// no forward-declaration slot to patch in afterwards.
    pub fn register_struct(&mut self, def: &StructDef) {
        let members = def
            .members
            .iter()
            .map(|m| StructMember { name: m.name, ty: self.resolve_type_expr(&m.ty) })
            .collect();
        let subtypes = def
            .subtypes
            .iter()
            .map(|s| StructSubtypeShape {
                name: s.name,
                members: s.members.iter().map(|m| StructMember { name: m.name, ty: self.resolve_type_expr(&m.ty) }).collect(),
            })
            .collect();
        let shape = StructShape { name: def.name, members, subtypes, discriminant: def.discriminant };
        let ty = self.types.intern(TypeKind::Struct(shape), Modifiers::none());
        self.register_named_type(def.name, ty);
    }

    pub fn register_enum(&mut self, def: &EnumDef) {
        let shape = EnumShape { name: def.name, variants: def.variants.iter().map(|v| v.name).collect() };
        let ty = self.types.intern(TypeKind::Enum(shape), Modifiers::none());
        self.register_named_type(def.name, ty);
    }

    fn fresh_label(&mut self) -> u32 {
        let label = self.next_label;
        self.next_label += 1;
        label
    }

    fn emit(&mut self, instruction: Instruction) {
        let block = self.current_block;
        self.program.block_mut(block).push(instruction);
    }

    fn new_register(&mut self, ty: TypeId) -> DataAccess {
        let block = self.current_block;
        let index = self.program.block_mut(block).add_register(ty);
        DataAccess::register(block, index)
    }

    fn lookup_variable(&self, name: Ident) -> Option<DataAccess> {
        self.scopes.iter().rev().find_map(|scope| scope.get(&name).copied())
    }

    fn declare_variable(&mut self, name: Ident, access: DataAccess) {
        self.scopes.last_mut().expect("generator scope stack is never empty while lowering a body").insert(name, access);
    }

    // ---- type resolution ----

    pub fn resolve_type_expr(&mut self, ty: &TypeExpr) -> TypeId {
        match ty.kind.as_ref() {
            TypeExprKind::Named(path) => self.resolve_named_type(path),
            TypeExprKind::Pointer(inner) => {
                let pointee = self.resolve_type_expr(inner);
                self.types.intern(TypeKind::Pointer(pointee), Modifiers::none())
            }
            TypeExprKind::Optional(inner) => {
                let inner_ty = self.resolve_type_expr(inner);
                self.types.intern(TypeKind::Optional(inner_ty), Modifiers::none())
            }
            TypeExprKind::Array { element, size } => {
                let element_ty = self.resolve_type_expr(element);
                let count = match size.as_ref().and_then(const_i64_of) {
                    Some(n) if n >= 0 => ArrayCount::Known(n as u32),
                    _ => ArrayCount::Unknown,
                };
                self.types.intern(TypeKind::Array { element: element_ty, count }, Modifiers::none())
            }
            TypeExprKind::Slice(inner) => {
                let element_ty = self.resolve_type_expr(inner);
                self.types.intern(TypeKind::Slice { element: element_ty }, Modifiers::none())
            }
            TypeExprKind::FunctionPointer { params, return_type } => {
                let params = params.iter().map(|p| self.resolve_type_expr(p)).collect();
                let return_type = match return_type {
                    Some(t) => self.resolve_type_expr(t),
                    None => self.types.void(),
                };
                self.types.intern(
                    TypeKind::FunctionPointer { signature: FunctionSignature { params, return_type }, is_direct: false },
                    Modifiers::none(),
                )
            }
            TypeExprKind::PolymorphicVar(_) | TypeExprKind::Error(_) => self.types.unknown(),
        }
    }

    fn resolve_named_type(&self, path: &Path) -> TypeId {
        if let [single] = path.segments.as_slice() {
            if let Some(prim) = primitive_by_name(self.idents.resolve(*single)) {
                return self.types.primitive(prim);
            }
        }
        path.segments.last().and_then(|seg| self.named_types.get(seg)).copied().unwrap_or_else(|| self.types.unknown())
    }

    // ---- layout & indexing ----

    /// Recovers a register's declared type. `None` for anything that
    /// isn't a register (a parameter, a global, a constant): those don't
    /// carry per-access type information at this stage.
    fn type_of_access(&self, access: DataAccess) -> TypeId {
        match access.kind {
            DataAccessKind::Register { block, index } => self.program.block(block).registers[index as usize],
            _ => self.types.unknown(),
        }
    }

    /// If `ty` names something indexable, its element type and, for a
    /// fixed-size array, its known length.
    fn array_shape(&self, ty: TypeId) -> Option<(TypeId, Option<u32>)> {
        match self.types.kind(ty) {
            TypeKind::Array { element, count } => {
                let known = match count {
                    ArrayCount::Known(n) => Some(*n),
                    ArrayCount::Unknown => None,
                };
                Some((*element, known))
            }
            TypeKind::Pointer(element) | TypeKind::Slice { element } => Some((*element, None)),
            _ => None,
        }
    }

    /// Emits `index < length && index >= 0`, trapping into a dedicated
    /// block on failure; lowering continues in a fresh block reached only
    /// when the check passes.
    fn emit_bounds_check(&mut self, index: DataAccess, length: u32) {
        let index_ty = self.types.default_int();
        let length_reg = self.new_register(index_ty);
        self.emit(Instruction::LoadImmediate { destination: length_reg, value: length as i64 });
        let in_bounds = self.new_register(self.types.bool());
        self.emit(Instruction::BinaryOp { op: upp_parser::BinaryOp::Lt, destination: in_bounds, lhs: index, rhs: length_reg });
        let zero = self.new_register(index_ty);
        self.emit(Instruction::LoadImmediate { destination: zero, value: 0 });
        let non_negative = self.new_register(self.types.bool());
        self.emit(Instruction::BinaryOp { op: upp_parser::BinaryOp::Ge, destination: non_negative, lhs: index, rhs: zero });
        let ok = self.new_register(self.types.bool());
        self.emit(Instruction::BinaryOp { op: upp_parser::BinaryOp::And, destination: ok, lhs: in_bounds, rhs: non_negative });

        let trap_block = self.program.alloc_block();
        let continue_block = self.program.alloc_block();
        self.emit(Instruction::If { condition: ok, then_block: continue_block, else_block: trap_block });

        self.current_block = trap_block;
        self.emit(Instruction::Return(Return::Exit(crate::ExitCode::ExecutionError("Array out of bounds access".into()))));
        self.current_block = continue_block;
    }

    /// Computes `base`'s address plus `index * size_of(element_ty)`, as a
    /// fresh word-sized register holding an absolute address.
    fn element_address(&mut self, base: DataAccess, index: DataAccess, element_ty: TypeId) -> (DataAccess, u32) {
        let element_size = upp_types::layout_of(self.types, element_ty).size;
        let address_ty = self.types.intern(TypeKind::Address, Modifiers::none());

        let index_wide = self.new_register(address_ty);
        self.emit(Instruction::Cast { kind: crate::instruction::CastKind::Integers, destination: index_wide, source: index });
        let size_reg = self.new_register(address_ty);
        self.emit(Instruction::LoadImmediate { destination: size_reg, value: element_size as i64 });
        let byte_offset = self.new_register(address_ty);
        self.emit(Instruction::BinaryOp { op: upp_parser::BinaryOp::Mul, destination: byte_offset, lhs: index_wide, rhs: size_reg });
        let base_addr = self.new_register(address_ty);
        self.emit(Instruction::AddressOf { destination: base_addr, source: base });
        let element_addr = self.new_register(address_ty);
        self.emit(Instruction::BinaryOp { op: upp_parser::BinaryOp::Add, destination: element_addr, lhs: base_addr, rhs: byte_offset });
        (element_addr, element_size)
    }

    /// Loads `base[index]` into a fresh register of `element_ty`.
    fn index_element(&mut self, base: DataAccess, index: DataAccess, element_ty: TypeId) -> DataAccess {
        let (address, size) = self.element_address(base, index, element_ty);
        let element = self.new_register(element_ty);
        self.emit(Instruction::ReadMemory { destination: element, address, size });
        element
    }

    /// Stores `value` into `base[index]`.
    fn store_element(&mut self, base: DataAccess, index: DataAccess, element_ty: TypeId, value: DataAccess) {
        let (address, size) = self.element_address(base, index, element_ty);
        self.emit(Instruction::WriteMemory { address, value, size });
    }

    /// `base[index]` as a value: a bounds-checked element load when
    /// `base`'s shape is statically known, otherwise `base` itself
    /// unchanged (the element type and layout aren't available to
    /// compute an offset from).
    fn generate_index_load(&mut self, base: DataAccess, index: DataAccess) -> DataAccess {
        let Some((element_ty, known_length)) = self.array_shape(self.type_of_access(base)) else {
            return base;
        };
        if let Some(length) = known_length {
            self.emit_bounds_check(index, length);
        }
        self.index_element(base, index, element_ty)
    }

    /// `base[index] = value`. Falls back to a plain move into `base` when
    /// the element layout isn't known, so the assignment isn't silently
    /// dropped.
    fn generate_index_store(&mut self, base: DataAccess, index: DataAccess, value: DataAccess) {
        let Some((element_ty, known_length)) = self.array_shape(self.type_of_access(base)) else {
            self.emit(Instruction::Move { destination: base, source: value });
            return;
        };
        if let Some(length) = known_length {
            self.emit_bounds_check(index, length);
        }
        self.store_element(base, index, element_ty, value);
    }

    // ---- functions ----

    /// Registers `def`'s signature and reserves its entry block, without
    /// lowering the body. Split out from [`Self::generate_function`] so a
    /// caller can declare every function in a module before lowering any
    /// body, letting one function call another declared later in the file.
    pub fn declare_function(&mut self, def: &FunctionDef) -> FunctionId {
        let param_types: Vec<TypeId> = def.params.iter().map(|p| self.resolve_type_expr(&p.ty)).collect();
        let return_type = match &def.return_type {
            Some(t) => self.resolve_type_expr(t),
            None => self.types.void(),
        };
        let signature = self.types.intern(
            TypeKind::FunctionPointer { signature: FunctionSignature { params: param_types, return_type }, is_direct: true },
            Modifiers::none(),
        );
        let entry = self.program.alloc_block();
        let id = self.program.add_function(crate::function::IrFunction { name: def.name, signature, entry });
        self.function_ids.insert(def.name, id);
        id
    }

    /// Lowers `def`'s body into the block reserved for it by
    /// [`Self::declare_function`].
    pub fn generate_function_body(&mut self, id: FunctionId, def: &FunctionDef) {
        let entry = self.program.function(id).entry;
        self.scopes.push(HashMap::new());
        self.current_block = entry;
        for (index, param) in def.params.iter().enumerate() {
            let access = DataAccess::parameter(id, index as u32);
            self.declare_variable(param.name, access);
        }
        self.generate_block(&def.body);
        self.emit_defers_to_depth(0);
        self.emit(Instruction::Return(Return::Empty));
        self.scopes.pop();
    }

    /// Declares and lowers `def` in one call: the common case for a single
    /// self-contained function (tests, bake bodies) with no sibling
    /// functions it needs to forward-reference.
    pub fn generate_function(&mut self, def: &FunctionDef) -> FunctionId {
        let id = self.declare_function(def);
        self.generate_function_body(id, def);
        id
    }

    // ---- statements ----

    fn generate_block(&mut self, block: &Block) {
        self.scopes.push(HashMap::new());
        let depth = self.defer_stack.len();
        for stmt in &block.statements {
            self.generate_stmt(stmt);
        }
        self.emit_defers_to_depth(depth);
        self.defer_stack.truncate(depth);
        self.scopes.pop();
    }

    fn emit_defers_to_depth(&mut self, depth: usize) {
        let frames: Vec<DeferKind> = self
            .defer_stack
            .iter()
            .rev()
            .take_while(|frame| frame.depth >= depth)
            .map(|frame| match &frame.kind {
                DeferKind::Stmt(stmt) => DeferKind::Stmt(stmt.clone()),
                DeferKind::Restore { target, saved } => DeferKind::Restore { target: target.clone(), saved: *saved },
            })
            .collect();
        for kind in frames {
            match kind {
                DeferKind::Stmt(stmt) => self.generate_stmt(&stmt),
                DeferKind::Restore { target, saved } => {
                    let target_access = self.generate_expr(&target, None);
                    self.emit(Instruction::Move { destination: target_access, source: saved });
                }
            }
        }
    }

    fn generate_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.generate_expr(expr, None);
            }
            StmtKind::VarDecl { name, ty, init, .. } => {
                let declared_ty = ty.as_ref().map(|t| self.resolve_type_expr(t));
                let value = init.as_ref().map(|e| self.generate_expr(e, None));
                let var_ty = declared_ty.unwrap_or_else(|| self.types.unknown());
                let register = self.new_register(var_ty);
                if let Some(value) = value {
                    self.emit(Instruction::Move { destination: register, source: value });
                }
                self.declare_variable(*name, register);
            }
            StmtKind::Defer(inner) => {
                let depth = self.defer_stack.len();
                self.defer_stack.push(DeferFrame { depth, kind: DeferKind::Stmt((**inner).clone()) });
            }
            StmtKind::DeferRestore { target, value } => {
                let saved = self.generate_expr(target, None);
                let saved_copy = self.new_register(self.types.unknown());
                self.emit(Instruction::Move { destination: saved_copy, source: saved });
                let new_value = self.generate_expr(value, None);
                self.emit(Instruction::Move { destination: saved, source: new_value });
                let depth = self.defer_stack.len();
                self.defer_stack.push(DeferFrame { depth, kind: DeferKind::Restore { target: target.clone(), saved: saved_copy } });
            }
            StmtKind::Return(value) => {
                let ret = match value {
                    Some(expr) => {
                        let access = self.generate_expr(expr, None);
                        Return::Data(access)
                    }
                    None => Return::Empty,
                };
                self.emit_defers_to_depth(0);
                self.emit(Instruction::Return(ret));
            }
            StmtKind::Break => {
                let label = self.loop_stack.last().map(|f| f.break_label);
                if let Some(label) = label {
                    self.emit(Instruction::Goto(label));
                } else {
                    self.diagnostics.push(Diagnostic::error("E-BREAK-OUTSIDE-LOOP", "break outside a loop", stmt.span));
                }
            }
            StmtKind::Continue => {
                let frame = self.loop_stack.last().map(|f| (f.continue_label, f.increment.clone()));
                match frame {
                    Some((label, increment)) => {
                        if let Some(increment) = increment {
                            self.generate_expr(&increment, None);
                        }
                        self.emit(Instruction::Goto(label));
                    }
                    None => self.diagnostics.push(Diagnostic::error("E-CONTINUE-OUTSIDE-LOOP", "continue outside a loop", stmt.span)),
                }
            }
            StmtKind::If { condition, then_branch, else_branch } => {
                let cond = self.generate_expr(condition, None);
                let then_block = self.program.alloc_block();
                let else_block = self.program.alloc_block();
                self.emit(Instruction::If { condition: cond, then_block, else_block });

                let outer = self.current_block;
                self.current_block = then_block;
                self.generate_block(then_branch);
                self.current_block = else_block;
                if let Some(else_stmt) = else_branch {
                    self.generate_stmt(else_stmt);
                }
                self.current_block = outer;
            }
            StmtKind::While { condition, body } => {
                let condition_block = self.program.alloc_block();
                let body_block = self.program.alloc_block();
                let continue_label = self.fresh_label();
                let break_label = self.fresh_label();

                let outer = self.current_block;
                self.current_block = condition_block;
                self.emit(Instruction::Label(continue_label));
                let cond_access = self.generate_expr(condition, None);

                self.current_block = body_block;
                self.loop_stack.push(LoopFrame { continue_label, break_label, increment: None });
                self.generate_block(body);
                self.loop_stack.pop();

                self.current_block = outer;
                self.emit(Instruction::While { condition_block, condition: cond_access, body: body_block });
                // A `break` jumps here, past the structured loop, so
                // the label belongs in the enclosing block, not the body.
                self.emit(Instruction::Label(break_label));
            }
            StmtKind::For { init, condition, increment, body } => {
                self.scopes.push(HashMap::new());
                self.generate_stmt(init);

                let condition_block = self.program.alloc_block();
                let body_block = self.program.alloc_block();
                let continue_label = self.fresh_label();
                let break_label = self.fresh_label();

                let outer = self.current_block;
                self.current_block = condition_block;
                self.emit(Instruction::Label(continue_label));
                let cond_access = self.generate_expr(condition, None);

                self.current_block = body_block;
                self.loop_stack.push(LoopFrame { continue_label, break_label, increment: Some(increment.clone()) });
                self.generate_block(body);
                // Falling off the end of the body also runs the increment
                // once more before the next condition check.
                self.generate_expr(increment, None);
                self.loop_stack.pop();

                self.current_block = outer;
                self.emit(Instruction::While { condition_block, condition: cond_access, body: body_block });
                self.emit(Instruction::Label(break_label));
                self.scopes.pop();
            }
            StmtKind::Foreach { binding, iterable, body } => {
                // Built-in slice/array iteration: an index counts up to
                // the iterable's length, and each iteration's element
                // access is a fresh register loaded from an indexed read.
                // The custom-iterator protocol (create/has_next/next/
                // get_value, registered via a context change) is a later
                // pass over this same shape, not built here.
                let iterable_access = self.generate_expr(iterable, None);
                let shape = self.array_shape(self.type_of_access(iterable_access));
                let index_ty = self.types.default_int();
                let index = self.new_register(index_ty);

                let condition_block = self.program.alloc_block();
                let body_block = self.program.alloc_block();
                let continue_label = self.fresh_label();
                let break_label = self.fresh_label();
                let outer = self.current_block;

                self.current_block = condition_block;
                self.emit(Instruction::Label(continue_label));
                let cond_access = self.new_register(self.types.bool());
                match shape.and_then(|(_, length)| length) {
                    Some(length) => {
                        let length_reg = self.new_register(index_ty);
                        self.emit(Instruction::LoadImmediate { destination: length_reg, value: length as i64 });
                        self.emit(Instruction::BinaryOp { op: upp_parser::BinaryOp::Lt, destination: cond_access, lhs: index, rhs: length_reg });
                    }
                    None => {
                        // A slice or pointer-backed iterable doesn't carry
                        // its length at this stage yet, so there's no real
                        // stopping condition to compute; fall back to a
                        // single (non-)iteration rather than looping
                        // forever over stale data.
                        self.emit(Instruction::LoadImmediate { destination: cond_access, value: 0 });
                    }
                }

                self.current_block = body_block;
                self.scopes.push(HashMap::new());
                let element = match shape {
                    Some((element_ty, _)) => self.index_element(iterable_access, index, element_ty),
                    None => {
                        let element = self.new_register(self.types.unknown());
                        self.emit(Instruction::Move { destination: element, source: iterable_access });
                        element
                    }
                };
                self.declare_variable(*binding, element);
                self.loop_stack.push(LoopFrame { continue_label, break_label, increment: None });
                self.generate_block(body);
                self.loop_stack.pop();
                self.scopes.pop();
                let one = self.new_register(index_ty);
                self.emit(Instruction::LoadImmediate { destination: one, value: 1 });
                self.emit(Instruction::BinaryOp { op: upp_parser::BinaryOp::Add, destination: index, lhs: index, rhs: one });

                self.current_block = outer;
                self.emit(Instruction::While { condition_block, condition: cond_access, body: body_block });
                self.emit(Instruction::Label(break_label));
            }
            StmtKind::Switch { scrutinee, cases, default } => {
                let condition = self.generate_expr(scrutinee, None);
                let mut switch_cases = Vec::with_capacity(cases.len());
                for case in cases {
                    let value = const_i64_of(&case.value).unwrap_or(0);
                    let block = self.program.alloc_block();
                    let outer = self.current_block;
                    self.current_block = block;
                    self.generate_block(&case.body);
                    self.current_block = outer;
                    switch_cases.push(SwitchCase { value, block });
                }
                let default_block = self.program.alloc_block();
                let outer = self.current_block;
                self.current_block = default_block;
                match default {
                    Some(body) => self.generate_block(body),
                    None => self.emit(Instruction::Return(Return::Exit(crate::ExitCode::CodeError("invalid switch case".into())))),
                }
                self.current_block = outer;
                self.emit(Instruction::Switch { condition, cases: switch_cases, default: default_block });
            }
            StmtKind::Block(block) => self.generate_block(block),
            StmtKind::Item(_) | StmtKind::Error(_) | StmtKind::Empty => {}
        }
    }

    // ---- expressions ----

    fn generate_expr(&mut self, expr: &Expr, destination: Option<DataAccess>) -> DataAccess {
        let access = match expr.kind.as_ref() {
            ExprKind::IntegerLiteral { .. } => {
                // The only literal kind whose value actually needs to
                // reach a register today: array lengths, indices, and
                // allocation sizes are all plain integers. The other
                // literal kinds below still lower to a value-less
                // placeholder register until the same treatment extends
                // to them.
                let value = const_i64_of(expr).unwrap_or(0);
                let result = self.new_register(self.types.default_int());
                self.emit(Instruction::LoadImmediate { destination: result, value });
                result
            }
            ExprKind::FloatLiteral { .. } | ExprKind::StringLiteral(_) | ExprKind::CharLiteral(_) | ExprKind::BoolLiteral(_) => {
                self.new_register(self.types.unknown())
            }
            ExprKind::Identifier(name) => self.lookup_variable(*name).unwrap_or_else(|| {
                self.diagnostics.push(Diagnostic::error("E-UNDEF", "use of undefined name", expr.span));
                DataAccess::nothing()
            }),
            ExprKind::Path(path) => {
                if let [single] = path.segments.as_slice() {
                    self.lookup_variable(*single).unwrap_or_else(DataAccess::nothing)
                } else {
                    DataAccess::nothing()
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs_access = self.generate_expr(lhs, None);
                let rhs_access = self.generate_expr(rhs, None);
                let result = self.new_register(self.types.unknown());
                self.emit(Instruction::BinaryOp { op: *op, destination: result, lhs: lhs_access, rhs: rhs_access });
                result
            }
            ExprKind::Unary { op, operand } => {
                let source = self.generate_expr(operand, None);
                let result = self.new_register(self.types.unknown());
                self.emit(Instruction::UnaryOp { kind: UnaryOpKind::from(*op), destination: result, source });
                result
            }
            ExprKind::AddressOf(inner) => self.generate_expr(inner, None).addr_of(),
            ExprKind::Deref(inner) => self.generate_expr(inner, None).deref(),
            ExprKind::MemberAccess { object, .. } => {
                // A projection, not a materialisation: the member's own
                // access term is returned directly.
                self.generate_expr(object, None)
            }
            ExprKind::Index { base, index } => {
                let base_access = self.generate_expr(base, None);
                let index_access = self.generate_expr(index, None);
                self.generate_index_load(base_access, index_access)
            }
            ExprKind::Assign { target, value } => {
                if let ExprKind::Index { base, index } = target.kind.as_ref() {
                    // An indexed target writes through the computed
                    // element address; it can't go through the generic
                    // move below, which would write into the freshly
                    // loaded value rather than back into the array.
                    let base_access = self.generate_expr(base, None);
                    let index_access = self.generate_expr(index, None);
                    let value_access = self.generate_expr(value, None);
                    self.generate_index_store(base_access, index_access, value_access);
                    return value_access;
                }
                let value_access = self.generate_expr(value, None);
                let target_access = self.generate_expr(target, None);
                self.emit(Instruction::Move { destination: target_access, source: value_access });
                target_access
            }
            ExprKind::CompoundAssign { op, target, value } => {
                let value_access = self.generate_expr(value, None);
                let target_access = self.generate_expr(target, None);
                let result = self.new_register(self.types.unknown());
                self.emit(Instruction::BinaryOp { op: *op, destination: result, lhs: target_access, rhs: value_access });
                self.emit(Instruction::Move { destination: target_access, source: result });
                target_access
            }
            ExprKind::ArrayLiteral(elements) => {
                for element in elements {
                    self.generate_expr(element, None);
                }
                self.new_register(self.types.unknown())
            }
            ExprKind::StructLiteral { fields, .. } => {
                for (_, value) in fields {
                    self.generate_expr(value, None);
                }
                self.new_register(self.types.unknown())
            }
            ExprKind::Cast { expr: inner, ty, .. } => {
                // The semantic analyser's type checker assigns `inner`'s
                // real type; without that wired through here yet, emit a
                // generic integer cast and let the bytecode generator's
                // own type-directed pass correct the kind once full
                // inference feeds into this stage.
                let source = self.generate_expr(inner, None);
                let target_ty = self.resolve_type_expr(ty);
                let result = self.new_register(target_ty);
                self.emit(Instruction::Cast { kind: crate::instruction::CastKind::Integers, destination: result, source });
                result
            }
            ExprKind::New { ty, count } => {
                let element_ty = self.resolve_type_expr(ty);
                let element_size = upp_types::layout_of(self.types, element_ty).size;
                let address_ty = self.types.intern(TypeKind::Address, Modifiers::none());
                let size_ty = self.types.primitive(PrimitiveType::U64);

                let size_reg = self.new_register(size_ty);
                match count {
                    Some(count_expr) => {
                        let count_access = self.generate_expr(count_expr, None);
                        let count_wide = self.new_register(size_ty);
                        self.emit(Instruction::Cast {
                            kind: crate::instruction::CastKind::Integers,
                            destination: count_wide,
                            source: count_access,
                        });
                        let element_size_reg = self.new_register(size_ty);
                        self.emit(Instruction::LoadImmediate { destination: element_size_reg, value: element_size as i64 });
                        self.emit(Instruction::BinaryOp {
                            op: upp_parser::BinaryOp::Mul,
                            destination: size_reg,
                            lhs: count_wide,
                            rhs: element_size_reg,
                        });
                    }
                    None => {
                        self.emit(Instruction::LoadImmediate { destination: size_reg, value: element_size as i64 });
                    }
                }
                let destination = self.new_register(address_ty);
                // The full allocator interface is a per-thread function
                // pointer the runtime installs before `main` runs, with
                // `new`/`delete` dispatching through it; this generator
                // dispatches straight to the default system allocator
                // instead of threading that indirection through yet.
                self.emit(Instruction::Call(Call {
                    target: CallTarget::Hardcoded("system_alloc"),
                    arguments: vec![size_reg],
                    destination,
                }));
                destination
            }
            ExprKind::Delete(inner) => {
                let pointer = self.generate_expr(inner, None);
                self.emit(Instruction::Call(Call {
                    target: CallTarget::Hardcoded("system_free"),
                    arguments: vec![pointer],
                    destination: DataAccess::nothing(),
                }));
                DataAccess::nothing()
            }
            ExprKind::Call { callee, args } => {
                let target = match callee.kind.as_ref() {
                    ExprKind::Identifier(name) => match self.function_ids.get(name).copied() {
                        Some(id) => Some(CallTarget::Function(id)),
                        None => hardcoded_name(self.idents.resolve(*name)).map(CallTarget::Hardcoded),
                    },
                    _ => None,
                };
                let arguments: Vec<DataAccess> = args.iter().map(|a| self.generate_expr(&a.value, None)).collect();
                let destination = self.new_register(self.types.unknown());
                if let Some(target) = target {
                    self.emit(Instruction::Call(Call { target, arguments, destination }));
                } else {
                    let pointer = self.generate_expr(callee, None);
                    self.emit(Instruction::Call(Call { target: CallTarget::FunctionPointer(pointer), arguments, destination }));
                }
                destination
            }
            ExprKind::Range { .. } | ExprKind::Bake(_) | ExprKind::Error(_) => self.new_register(self.types.unknown()),
        };
        if let Some(destination) = destination {
            self.emit(Instruction::Move { destination, source: access });
            destination
        } else {
            access
        }
    }
}

fn const_i64_of(expr: &Expr) -> Option<i64> {
    match expr.kind.as_ref() {
        ExprKind::IntegerLiteral { digits, .. } => digits.parse().ok(),
        _ => None,
    }
}

/// Names the bytecode interpreter dispatches itself rather than through a
/// called function's own bytecode; mirrors `upp_bytecode::HardcodedFunction`
/// one level up, since `upp_ir` can't depend on `upp_bytecode` (the
/// dependency runs the other way).
const HARDCODED_NAMES: &[&str] = &[
    "assert", "panic", "size_of", "align_of", "type_of", "type_info", "return_type", "struct_tag", "memory_copy",
    "memory_zero", "memory_compare", "system_alloc", "system_free", "bitwise_not", "bitwise_and", "bitwise_or",
    "bitwise_xor", "bitwise_shift_left", "bitwise_shift_right", "print_i32", "print_f32", "print_bool",
    "print_string", "print_line", "read_i32", "read_f32", "read_bool", "random_i32",
];

fn hardcoded_name(name: &str) -> Option<&'static str> {
    HARDCODED_NAMES.iter().copied().find(|candidate| *candidate == name)
}

fn primitive_by_name(name: &str) -> Option<PrimitiveType> {
    Some(match name {
        "i8" => PrimitiveType::I8,
        "i16" => PrimitiveType::I16,
        "i32" => PrimitiveType::I32,
        "i64" => PrimitiveType::I64,
        "u8" => PrimitiveType::U8,
        "u16" => PrimitiveType::U16,
        "u32" => PrimitiveType::U32,
        "u64" => PrimitiveType::U64,
        "f32" => PrimitiveType::F32,
        "f64" => PrimitiveType::F64,
        "bool" => PrimitiveType::Bool,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use upp_parser::{parse, ItemKind};

    fn lower_first_function(src: &str) -> (IrProgram, TypeRegistry, Diagnostics) {
        let mut idents = IdentPool::new();
        let (output, _) = parse(src, 0, &mut idents);
        let mut types = TypeRegistry::new();
        let mut diagnostics = Diagnostics::new();
        let program = {
            let mut gen = Generator::new(&mut types, &idents, &mut diagnostics);
            for item in &output.module.items {
                if let ItemKind::Function(def) = &item.kind {
                    gen.generate_function(def);
                }
            }
            gen.program
        };
        (program, types, diagnostics)
    }

    #[test]
    fn empty_function_gets_one_entry_block_and_a_return() {
        let (program, _, _) = lower_first_function("main :: () { }");
        let (_, func) = program.functions().next().expect("one function");
        let block = program.block(func.entry);
        assert!(matches!(block.instructions.last(), Some(Instruction::Return(Return::Empty))));
    }

    #[test]
    fn return_statement_lowers_to_a_data_return() {
        let (program, _, _) = lower_first_function("answer :: () { return 42; }");
        let (_, func) = program.functions().next().unwrap();
        let block = program.block(func.entry);
        assert!(block.instructions.iter().any(|i| matches!(i, Instruction::Return(Return::Data(_)))));
    }

    #[test]
    fn if_statement_allocates_two_branch_blocks() {
        let (program, _, _) = lower_first_function("f :: () { if true { x: i32 = 1; } else { x: i32 = 2; } }");
        let (_, func) = program.functions().next().unwrap();
        let block = program.block(func.entry);
        assert!(block.instructions.iter().any(|i| matches!(i, Instruction::If { .. })));
    }

    #[test]
    fn break_outside_a_loop_is_reported() {
        let (_, _, diagnostics) = lower_first_function("f :: () { break; }");
        assert!(!diagnostics.is_empty());
    }

    #[test]
    fn while_loop_emits_a_structured_while_instruction() {
        let (program, _, _) = lower_first_function("f :: () { while true { } }");
        let (_, func) = program.functions().next().unwrap();
        let block = program.block(func.entry);
        assert!(block.instructions.iter().any(|i| matches!(i, Instruction::While { .. })));
    }
}
