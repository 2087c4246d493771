//! Shared span tracking, diagnostics, and phase-abort errors for the Upp
//! compiler workspace. Every other `upp_*` crate depends on this one.

pub mod diagnostics;
pub mod error;
pub mod intern;
pub mod span;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{CompileError, CompileResult};
pub use intern::{Ident, IdentPool};

pub use span::{Position, Span, Spanned};
