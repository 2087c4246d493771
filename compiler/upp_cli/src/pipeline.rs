//! Drives the phases in order: lex+parse, dependency/semantic analysis,
//! IR generation, bytecode generation, interpretation. Each command stops
//! at the phase it needs (`check` after analysis, `build` after bytecode
//! generation, `run` after interpretation).

use std::fs;
use std::path::Path;

use upp_analyser::{run_definitions, Compiler};
use upp_bytecode::{compile_program, BytecodeProgram, Interpreter};
use upp_common::{CompileError, CompileResult, Diagnostic};
use upp_ir::{ExitCode, Generator as IrGenerator, IrProgram};
use upp_parser::{parse, BakeBody, Block, FunctionDef, ItemKind, Module, NodeArena, Stmt, StmtKind};

fn read_source(path: &Path) -> CompileResult<String> {
    fs::read_to_string(path).map_err(|source| CompileError::Io { path: path.display().to_string(), source })
}

/// Everything the `check` command needs, and the shared prefix the later
/// commands build on.
pub struct Analysed {
    pub compiler: Compiler,
    pub module: Module,
    pub arena: NodeArena,
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs lexing, parsing, dependency analysis, and semantic analysis over
/// one file. Never aborts on a diagnostic; only a `CompileError` (missing
/// file) stops this early.
pub fn analyse(path: &Path) -> CompileResult<Analysed> {
    let source = read_source(path)?;
    let mut compiler = Compiler::new();

    let (parsed, _tokens) = parse(&source, 0, &mut compiler.idents);
    let mut diagnostics = parsed.diagnostics.into_vec();

    compiler.dependencies.analyse_module(&parsed.module);
    for dup in &compiler.dependencies.errors {
        let name = compiler.idents.resolve(compiler.dependencies.symbols.symbol(dup.existing).id);
        diagnostics.push(
            Diagnostic::error("E-DUP-SYM", format!("duplicate symbol '{name}'"), parsed.arena.span_of(dup.node)),
        );
    }

    let stuck = run_definitions(&mut compiler);
    for item in stuck {
        let node = compiler.dependencies.items.get(item).node;
        diagnostics.push(Diagnostic::error(
            "E-CYCLE",
            "dependency cycle among top-level definitions",
            parsed.arena.span_of(node),
        ));
    }
    diagnostics.extend(compiler.diagnostics.clone().into_vec());

    let mut analysed = Analysed { compiler, module: parsed.module, arena: parsed.arena, diagnostics };
    if !has_errors(&analysed.diagnostics) {
        run_bakes(&mut analysed);
    }
    Ok(analysed)
}

/// Runs every top-level `bake { ... }` item to completion at compile time.
/// A top-level bake binds no name, so only its side effects matter; the
/// body is lowered as a throwaway zero-argument function and executed on
/// its own interpreter, one bake per interpreter instance, matching the
/// one-thread-per-bake model `upp_analyser::bake` describes for the
/// name-binding case (`name :: bake { ... };`, not yet wired to this
/// runner — see DESIGN.md).
fn run_bakes(analysed: &mut Analysed) {
    let bakes: Vec<(upp_common::Span, BakeBody)> = analysed
        .module
        .items
        .iter()
        .filter_map(|item| match &item.kind {
            ItemKind::Bake(def) => Some((def.span, def.body.clone())),
            _ => None,
        })
        .collect();

    for (span, body) in bakes {
        let block = match body {
            BakeBody::Block(block) => block,
            BakeBody::Expr(expr) => {
                let stmt_id = analysed.arena.alloc(expr.span, None);
                let block_id = analysed.arena.alloc(expr.span, None);
                Block { statements: vec![Stmt { kind: StmtKind::Expr(expr.clone()), span: expr.span, id: stmt_id }], span: expr.span, id: block_id }
            }
        };
        let name = analysed.compiler.idents.intern("$bake");
        let id = analysed.arena.alloc(span, None);
        let def = FunctionDef { name, poly_params: Vec::new(), params: Vec::new(), return_type: None, body: block, id };

        let mut generator =
            IrGenerator::new(&mut analysed.compiler.types, &analysed.compiler.idents, &mut analysed.compiler.diagnostics);
        let id = generator.generate_function(&def);
        generator.program.entry_function = Some(id);
        let ir_program = generator.program;
        let program = compile_program(&ir_program, &analysed.compiler.types);

        let mut interpreter = Interpreter::with_output(&program, Box::new(std::io::sink()));
        match interpreter.run() {
            ExitCode::Success => {}
            other => {
                analysed.diagnostics.push(Diagnostic::error("E-BAKE-FAIL", format!("bake execution failed: {other:?}"), span));
            }
        }
    }
}

fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| d.severity == upp_common::Severity::Error)
}

/// Lowers every function in the module to IR, wiring up `main` as the
/// entry point if one exists. Skipped entirely once `analyse` already
/// reported an error; downstream phases assume a clean symbol table.
///
/// Runs in three passes over the module's items: structs and enums are
/// registered first so any function signature or body can name them;
/// functions are then declared (signature + reserved entry block, no body)
/// so one function can call another declared later in the file; only then
/// are bodies lowered. `Definition` and top-level `Bake` items aren't
/// reachable from a function body yet (there's no IR-level global slot for
/// a top-level constant), so they're not lowered here.
fn generate_ir(analysed: &mut Analysed) -> IrProgram {
    let mut generator = IrGenerator::new(&mut analysed.compiler.types, &analysed.compiler.idents, &mut analysed.compiler.diagnostics);

    for item in &analysed.module.items {
        match &item.kind {
            ItemKind::Struct(def) => generator.register_struct(def),
            ItemKind::Enum(def) => generator.register_enum(def),
            _ => {}
        }
    }

    let mut declared = Vec::new();
    for item in &analysed.module.items {
        if let ItemKind::Function(def) = &item.kind {
            declared.push((generator.declare_function(def), def));
        }
    }

    let mut main_id = None;
    for (id, def) in declared {
        generator.generate_function_body(id, def);
        if analysed.compiler.idents.resolve(def.name) == "main" {
            main_id = Some(id);
        }
    }
    generator.program.entry_function = main_id;
    generator.program
}

pub struct Built {
    pub diagnostics: Vec<Diagnostic>,
    pub program: Option<BytecodeProgram>,
}

/// Runs the full pipeline through bytecode generation. `program` is `None`
/// when analysis already failed; code generation never runs on a module
/// with unresolved symbols.
pub fn build(path: &Path) -> CompileResult<Built> {
    let mut analysed = analyse(path)?;
    if has_errors(&analysed.diagnostics) {
        return Ok(Built { diagnostics: analysed.diagnostics, program: None });
    }
    let ir = generate_ir(&mut analysed);
    let program = compile_program(&ir, &analysed.compiler.types);
    Ok(Built { diagnostics: analysed.diagnostics, program: Some(program) })
}

/// Builds, then runs the result on the bytecode interpreter. Returns
/// `ExitCode::CompilationFailed` without touching the interpreter if
/// analysis reported any error.
pub fn run(path: &Path) -> CompileResult<(Vec<Diagnostic>, ExitCode)> {
    let built = build(path)?;
    let Some(program) = built.program else {
        return Ok((built.diagnostics, ExitCode::CompilationFailed));
    };
    let mut interpreter = upp_bytecode::Interpreter::new(&program);
    let exit_code = interpreter.run();
    Ok((built.diagnostics, exit_code))
}

/// Renders a diagnostic the way the CLI prints it: `(file:line:col)
/// severity: message`, with an optional `help:` line.
pub fn render_diagnostic(path: &Path, diagnostic: &Diagnostic) -> String {
    let (line, column) = diagnostic.span.line_col();
    let mut rendered = format!("({}:{}:{}) {}: {}", path.display(), line, column, diagnostic.severity, diagnostic.message);
    if let Some(help) = &diagnostic.help {
        rendered.push_str(&format!("\n  help: {help}"));
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_source(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file
    }

    #[test]
    fn clean_program_analyses_without_diagnostics() {
        let file = write_source("main :: () { assert(1 + 1 == 2); }");
        let analysed = analyse(file.path()).unwrap();
        assert!(!has_errors(&analysed.diagnostics));
    }

    #[test]
    fn undefined_file_is_a_compile_error_not_a_panic() {
        let result = analyse(Path::new("/nonexistent/upp/source.upp"));
        assert!(result.is_err());
    }

    #[test]
    fn successful_program_runs_to_completion() {
        let file = write_source("main :: () { assert(1 + 1 == 2); }");
        let (diagnostics, exit_code) = run(file.path()).unwrap();
        assert!(!has_errors(&diagnostics));
        assert_eq!(exit_code, ExitCode::Success);
    }
}
