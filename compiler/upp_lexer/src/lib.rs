//! Lexical analysis for Upp source files.

mod lexer;
mod token;

pub use lexer::{lex, Lexer};
pub use token::{FloatSuffix, IntegerSuffix, Token, TokenExt, TokenType};
