//! Token definitions for Upp.

use serde::{Deserialize, Serialize};
use std::fmt;
use upp_common::{Ident, Span, Spanned};

/// Suffix on an integer literal selecting its canonical width and
/// signedness. Absent means the literal is polymorphic; the analyser
/// picks a width from context, defaulting to signed 32-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntegerSuffix {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntegerSuffix {
    fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "i8" => Self::I8,
            "i16" => Self::I16,
            "i32" => Self::I32,
            "i64" => Self::I64,
            "u8" => Self::U8,
            "u16" => Self::U16,
            "u32" => Self::U32,
            "u64" => Self::U64,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatSuffix {
    F32,
    F64,
}

impl FloatSuffix {
    fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "f32" => Self::F32,
            "f64" => Self::F64,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    // Literals
    IntegerLiteral { digits: String, suffix: Option<IntegerSuffix> },
    FloatLiteral { digits: String, suffix: Option<FloatSuffix> },
    StringLiteral(String),
    CharLiteral(char),
    BooleanLiteral(bool),

    Identifier(Ident),

    // Keywords
    KeywordStruct,
    KeywordEnum,
    KeywordImport,
    KeywordProject,
    KeywordBake,
    KeywordComptime,
    KeywordDefer,
    KeywordReturn,
    KeywordIf,
    KeywordElse,
    KeywordWhile,
    KeywordFor,
    KeywordForeach,
    KeywordIn,
    KeywordSwitch,
    KeywordDefault,
    KeywordNew,
    KeywordDelete,
    KeywordBreak,
    KeywordContinue,
    KeywordAs,
    KeywordMut,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    LogicalAnd,
    LogicalOr,
    LogicalNot,
    Ampersand,
    Pipe,
    Caret,
    Tilde,
    LeftShift,
    RightShift,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    Arrow,
    FatArrow,
    Question,
    Dot,
    DoubleDot,
    TripleDot,
    DoubleColon,
    Colon,
    Dollar,

    // Delimiters
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Semicolon,
    Comma,

    Comment(String),
    EndOfFile,

    /// Error recovery token, never an exception, per the lexer contract.
    Error(String),
}

impl TokenType {
    pub fn keyword_from_identifier(ident: &str) -> Option<TokenType> {
        Some(match ident {
            "struct" => TokenType::KeywordStruct,
            "enum" => TokenType::KeywordEnum,
            "import" => TokenType::KeywordImport,
            "project" => TokenType::KeywordProject,
            "bake" => TokenType::KeywordBake,
            "comptime" => TokenType::KeywordComptime,
            "defer" => TokenType::KeywordDefer,
            "return" => TokenType::KeywordReturn,
            "if" => TokenType::KeywordIf,
            "else" => TokenType::KeywordElse,
            "while" => TokenType::KeywordWhile,
            "for" => TokenType::KeywordFor,
            "foreach" => TokenType::KeywordForeach,
            "in" => TokenType::KeywordIn,
            "switch" => TokenType::KeywordSwitch,
            "default" => TokenType::KeywordDefault,
            "new" => TokenType::KeywordNew,
            "delete" => TokenType::KeywordDelete,
            "break" => TokenType::KeywordBreak,
            "continue" => TokenType::KeywordContinue,
            "as" => TokenType::KeywordAs,
            "mut" => TokenType::KeywordMut,
            "true" => TokenType::BooleanLiteral(true),
            "false" => TokenType::BooleanLiteral(false),
            _ => return None,
        })
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::IntegerLiteral { digits, .. } => write!(f, "{digits}"),
            TokenType::FloatLiteral { digits, .. } => write!(f, "{digits}"),
            TokenType::StringLiteral(s) => write!(f, "\"{s}\""),
            TokenType::CharLiteral(c) => write!(f, "'{c}'"),
            TokenType::BooleanLiteral(b) => write!(f, "{b}"),
            TokenType::Identifier(name) => write!(f, "{name}"),
            TokenType::Comment(text) => write!(f, "// {text}"),
            TokenType::Error(msg) => write!(f, "<error: {msg}>"),
            other => write!(f, "{}", other.punctuation_str().unwrap_or("?")),
        }
    }
}

impl TokenType {
    fn punctuation_str(&self) -> Option<&'static str> {
        use TokenType::*;
        Some(match self {
            KeywordStruct => "struct",
            KeywordEnum => "enum",
            KeywordImport => "import",
            KeywordProject => "project",
            KeywordBake => "bake",
            KeywordComptime => "comptime",
            KeywordDefer => "defer",
            KeywordReturn => "return",
            KeywordIf => "if",
            KeywordElse => "else",
            KeywordWhile => "while",
            KeywordFor => "for",
            KeywordForeach => "foreach",
            KeywordIn => "in",
            KeywordSwitch => "switch",
            KeywordDefault => "default",
            KeywordNew => "new",
            KeywordDelete => "delete",
            KeywordBreak => "break",
            KeywordContinue => "continue",
            KeywordAs => "as",
            KeywordMut => "mut",
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",
            Assign => "=",
            Equal => "==",
            NotEqual => "!=",
            Less => "<",
            LessEqual => "<=",
            Greater => ">",
            GreaterEqual => ">=",
            LogicalAnd => "&&",
            LogicalOr => "||",
            LogicalNot => "!",
            Ampersand => "&",
            Pipe => "|",
            Caret => "^",
            Tilde => "~",
            LeftShift => "<<",
            RightShift => ">>",
            PlusAssign => "+=",
            MinusAssign => "-=",
            StarAssign => "*=",
            SlashAssign => "/=",
            PercentAssign => "%=",
            Arrow => "->",
            FatArrow => "=>",
            Question => "?",
            Dot => ".",
            DoubleDot => "..",
            TripleDot => "...",
            DoubleColon => "::",
            Colon => ":",
            Dollar => "$",
            LeftParen => "(",
            RightParen => ")",
            LeftBrace => "{",
            RightBrace => "}",
            LeftBracket => "[",
            RightBracket => "]",
            Semicolon => ";",
            Comma => ",",
            EndOfFile => "<eof>",
            _ => return None,
        })
    }
}

pub type Token = Spanned<TokenType>;

pub trait TokenExt {
    fn is_keyword(&self) -> bool;
    fn is_literal(&self) -> bool;
    fn is_error(&self) -> bool;
}

impl TokenExt for Token {
    fn is_keyword(&self) -> bool {
        matches!(
            self.value,
            TokenType::KeywordStruct
                | TokenType::KeywordEnum
                | TokenType::KeywordImport
                | TokenType::KeywordProject
                | TokenType::KeywordBake
                | TokenType::KeywordComptime
                | TokenType::KeywordDefer
                | TokenType::KeywordReturn
                | TokenType::KeywordIf
                | TokenType::KeywordElse
                | TokenType::KeywordWhile
                | TokenType::KeywordFor
                | TokenType::KeywordForeach
                | TokenType::KeywordIn
                | TokenType::KeywordSwitch
                | TokenType::KeywordDefault
                | TokenType::KeywordNew
                | TokenType::KeywordDelete
                | TokenType::KeywordBreak
                | TokenType::KeywordContinue
                | TokenType::KeywordAs
                | TokenType::KeywordMut
        )
    }

    fn is_literal(&self) -> bool {
        matches!(
            self.value,
            TokenType::IntegerLiteral { .. }
                | TokenType::FloatLiteral { .. }
                | TokenType::StringLiteral(_)
                | TokenType::CharLiteral(_)
                | TokenType::BooleanLiteral(_)
        )
    }

    fn is_error(&self) -> bool {
        matches!(self.value, TokenType::Error(_))
    }
}

impl IntegerSuffix {
    pub(crate) fn parse(s: &str) -> Option<Self> {
        Self::from_str(s)
    }
}

impl FloatSuffix {
    pub(crate) fn parse(s: &str) -> Option<Self> {
        Self::from_str(s)
    }
}
