//! Whole-pipeline scenarios, driven the way the CLI itself drives them:
//! source text in, diagnostics and an `ExitCode` out.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use upp_cli::pipeline;
use upp_ir::ExitCode;

fn source_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

/// A `Write` sink the test can still read after handing ownership of a
/// `Box<dyn Write>` to the interpreter.
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

#[test]
fn assert_true_compiles_clean_and_succeeds() {
    let file = source_file("main :: () { assert(1 + 1 == 2); }");
    let (diagnostics, exit_code) = pipeline::run(file.path()).unwrap();
    assert!(diagnostics.iter().all(|d| d.severity != upp_common::Severity::Error));
    assert_eq!(exit_code, ExitCode::Success);
}

#[test]
fn single_defer_runs_before_the_return_value_is_produced() {
    let file = source_file("main :: () { defer print_i32(1); return 0; }");
    let built = pipeline::build(file.path()).unwrap();
    let program = built.program.expect("clean program should reach bytecode generation");

    let output = SharedBuffer::default();
    let mut interpreter = upp_bytecode::Interpreter::with_output(&program, Box::new(output.clone()));
    let exit_code = interpreter.run();
    assert_eq!(exit_code, ExitCode::Success);
    assert_eq!(output.contents(), "1");
}

#[test]
fn two_defers_run_in_lifo_order() {
    let file = source_file("main :: () { defer print_i32(1); defer print_i32(2); return 0; }");
    let built = pipeline::build(file.path()).unwrap();
    let program = built.program.expect("clean program should reach bytecode generation");

    let output = SharedBuffer::default();
    let mut interpreter = upp_bytecode::Interpreter::with_output(&program, Box::new(output.clone()));
    let exit_code = interpreter.run();
    assert_eq!(exit_code, ExitCode::Success);
    assert_eq!(output.contents(), "21");
}

#[test]
fn check_command_reports_no_diagnostics_for_a_clean_program() {
    let file = source_file("main :: () { assert(1 + 1 == 2); }");
    let analysed = pipeline::analyse(file.path()).unwrap();
    assert!(analysed.diagnostics.iter().all(|d| d.severity != upp_common::Severity::Error));
}

#[test]
fn a_value_stored_through_an_in_bounds_index_reads_back_unchanged() {
    // Goes through the store side (`a[i] = v`) and the load side (`a[i]`)
    // of element addressing, independent of array-literal initialization
    // (see DESIGN.md: `ArrayLiteral` doesn't materialize its elements yet).
    let file = source_file("main :: () { a: [3]i32 = .[0, 0, 0]; a[1] = 99; print_i32(a[1]); }");
    let built = pipeline::build(file.path()).unwrap();
    let program = built.program.expect("clean program should reach bytecode generation");

    let output = SharedBuffer::default();
    let mut interpreter = upp_bytecode::Interpreter::with_output(&program, Box::new(output.clone()));
    let exit_code = interpreter.run();
    assert_eq!(exit_code, ExitCode::Success);
    assert_eq!(output.contents(), "99");
}

#[test]
fn out_of_bounds_array_index_traps_with_an_execution_error() {
    let file = source_file("main :: () { a: [3]i32 = .[1, 2, 3]; print_i32(a[5]); }");
    let built = pipeline::build(file.path()).unwrap();
    let program = built.program.expect("clean program should reach bytecode generation");

    let mut interpreter = upp_bytecode::Interpreter::with_output(&program, Box::new(io::sink()));
    let exit_code = interpreter.run();
    assert_eq!(exit_code, ExitCode::ExecutionError("Array out of bounds access".to_string()));
}

#[test]
fn a_function_may_call_another_declared_later_in_the_file() {
    let file = source_file(
        "main :: () { print_i32(doubled(21)); } doubled :: (n: i32) -> i32 { return n * 2; }",
    );
    let built = pipeline::build(file.path()).unwrap();
    let program = built.program.expect("clean program should reach bytecode generation");

    let output = SharedBuffer::default();
    let mut interpreter = upp_bytecode::Interpreter::with_output(&program, Box::new(output.clone()));
    let exit_code = interpreter.run();
    assert_eq!(exit_code, ExitCode::Success);
    assert_eq!(output.contents(), "42");
}

#[test]
fn struct_definition_and_a_struct_typed_variable_analyse_without_diagnostics() {
    let file = source_file(
        "counter :: struct { value: i32; } main :: () { c: counter = counter { value: 7 }; assert(1 == 1); }",
    );
    let analysed = pipeline::analyse(file.path()).unwrap();
    assert!(analysed.diagnostics.iter().all(|d| d.severity != upp_common::Severity::Error));
}

#[test]
fn enum_definition_analyses_without_diagnostics() {
    let file = source_file("status :: enum { ok = 0, failed = 1 } main :: () { assert(1 == 1); }");
    let analysed = pipeline::analyse(file.path()).unwrap();
    assert!(analysed.diagnostics.iter().all(|d| d.severity != upp_common::Severity::Error));
}

#[test]
fn a_passing_top_level_bake_runs_at_compile_time_without_diagnostics() {
    let file = source_file("bake { assert(1 + 1 == 2); } main :: () { assert(1 == 1); }");
    let analysed = pipeline::analyse(file.path()).unwrap();
    assert!(analysed.diagnostics.iter().all(|d| d.severity != upp_common::Severity::Error));
}

#[test]
fn a_failing_top_level_bake_is_reported_as_a_diagnostic() {
    let file = source_file("bake { assert(1 == 2); } main :: () { assert(1 == 1); }");
    let analysed = pipeline::analyse(file.path()).unwrap();
    assert!(analysed.diagnostics.iter().any(|d| d.severity == upp_common::Severity::Error));
}
