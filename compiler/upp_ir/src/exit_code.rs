//! The closed set of ways a program (or a bake running inside the
//! compiler) can stop.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    CompilationFailed,
    CodeError(String),
    ExecutionError(String),
    InstructionLimitReached,
    TypeInfoWaitingForTypeFinished,
}
