//! Command-line driver: `upp build|run|check <file>`.

use std::path::PathBuf;
use std::process::ExitCode as ProcessExitCode;

use clap::{Parser, Subcommand};
use log::error;
use upp_cli::pipeline;
use upp_ir::ExitCode;

/// The Upp compiler and interpreter.
#[derive(Parser)]
#[command(name = "upp")]
#[command(about = "Compiler and interpreter for the Upp language")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline through bytecode generation; does not execute.
    Build { file: PathBuf },
    /// Build, then execute on the bytecode interpreter.
    Run { file: PathBuf },
    /// Run semantic analysis only, for fast diagnostics.
    Check { file: PathBuf },
}

fn main() -> ProcessExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        log::LevelFilter::Debug
    } else if cli.quiet {
        log::LevelFilter::Error
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    match cli.command {
        Commands::Check { file } => run_check(&file),
        Commands::Build { file } => run_build(&file),
        Commands::Run { file } => run_run(&file),
    }
}

fn run_check(file: &PathBuf) -> ProcessExitCode {
    let analysed = match pipeline::analyse(file) {
        Ok(analysed) => analysed,
        Err(err) => {
            error!("{err}");
            return ProcessExitCode::from(1);
        }
    };
    report(file, &analysed.diagnostics)
}

fn run_build(file: &PathBuf) -> ProcessExitCode {
    let built = match pipeline::build(file) {
        Ok(built) => built,
        Err(err) => {
            error!("{err}");
            return ProcessExitCode::from(1);
        }
    };
    report(file, &built.diagnostics)
}

fn run_run(file: &PathBuf) -> ProcessExitCode {
    let (diagnostics, exit_code) = match pipeline::run(file) {
        Ok(result) => result,
        Err(err) => {
            error!("{err}");
            return ProcessExitCode::from(1);
        }
    };
    for diagnostic in &diagnostics {
        print_diagnostic(file, diagnostic);
    }
    ProcessExitCode::from(exit_code_to_status(&exit_code))
}

fn report(file: &PathBuf, diagnostics: &[upp_common::Diagnostic]) -> ProcessExitCode {
    for diagnostic in diagnostics {
        print_diagnostic(file, diagnostic);
    }
    let failed = diagnostics.iter().any(|d| d.severity == upp_common::Severity::Error);
    ProcessExitCode::from(if failed { 1 } else { 0 })
}

fn print_diagnostic(file: &PathBuf, diagnostic: &upp_common::Diagnostic) {
    let rendered = pipeline::render_diagnostic(file, diagnostic);
    if diagnostic.severity == upp_common::Severity::Error {
        eprintln!("{rendered}");
    } else {
        println!("{rendered}");
    }
}

/// Maps the interpreter's closed exit-code set onto a process status. Only
/// `Success` is zero; everything else is a distinct non-zero reason so a
/// calling script can tell `EXECUTION_ERROR` apart from `INSTRUCTION_LIMIT_REACHED`.
fn exit_code_to_status(code: &ExitCode) -> u8 {
    match code {
        ExitCode::Success => 0,
        ExitCode::CompilationFailed => 1,
        ExitCode::CodeError(_) => 2,
        ExitCode::ExecutionError(_) => 3,
        ExitCode::InstructionLimitReached => 4,
        ExitCode::TypeInfoWaitingForTypeFinished => 5,
    }
}
