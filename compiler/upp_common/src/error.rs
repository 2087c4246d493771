//! Phase-abort errors. These are distinct from [`crate::diagnostics::Diagnostic`]s:
//! a `CompileError` stops the pipeline outright (bad file, internal invariant
//! broken), while a diagnostic is reported and compilation continues.

use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("lexer error: {message}")]
    Lex { message: String },

    #[error("parser error: {message}")]
    Parse { message: String },

    #[error("symbol resolution error: {message}")]
    Symbol { message: String },

    #[error("type error: {message}")]
    Type { message: String },

    #[error("ir generation error: {message}")]
    Ir { message: String },

    #[error("bytecode generation error: {message}")]
    Bytecode { message: String },

    #[error("execution error: {message}")]
    Execution { message: String },

    #[error("could not read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("internal compiler error: {message}")]
    Internal { message: String },
}

impl CompileError {
    pub fn lex(message: impl Into<String>) -> Self {
        Self::Lex { message: message.into() }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse { message: message.into() }
    }

    pub fn symbol(message: impl Into<String>) -> Self {
        Self::Symbol { message: message.into() }
    }

    pub fn ty(message: impl Into<String>) -> Self {
        Self::Type { message: message.into() }
    }

    pub fn ir(message: impl Into<String>) -> Self {
        Self::Ir { message: message.into() }
    }

    pub fn bytecode(message: impl Into<String>) -> Self {
        Self::Bytecode { message: message.into() }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }
}
