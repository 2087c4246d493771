//! Byte-indexed lexer: fast ASCII path, UTF-8 fallback for identifiers and
//! string contents. Every byte of the source is covered by exactly one
//! token or one whitespace/comment region; the lexer never raises an
//! exception, it emits `TokenType::Error` and keeps going.

use crate::token::{FloatSuffix, IntegerSuffix, Token, TokenType};
use unicode_xid::UnicodeXID;
use upp_common::{Diagnostics, IdentPool, Position, Span};

pub struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    position: usize,
    current_pos: Position,
    file_id: u32,
    pool: &'a mut IdentPool,
    diagnostics: Diagnostics,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, file_id: u32, pool: &'a mut IdentPool) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            position: 0,
            current_pos: Position::start(),
            file_id,
            pool,
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    /// Tokenizes the whole input, dropping whitespace but keeping comments
    /// out of the stream too (they're skipped, not emitted, matching the
    /// contract that every byte is covered by a region rather than a token).
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token() {
            tokens.push(token);
        }
        let eof_span = Span::single(self.current_pos, self.file_id);
        tokens.push(Token::new(TokenType::EndOfFile, eof_span));
        tokens
    }

    fn next_token(&mut self) -> Option<Token> {
        self.skip_whitespace_and_comments();
        if self.is_at_end() {
            return None;
        }

        let start_pos = self.current_pos;
        let token_type = match self.current_char() {
            '(' => { self.advance(); TokenType::LeftParen }
            ')' => { self.advance(); TokenType::RightParen }
            '{' => { self.advance(); TokenType::LeftBrace }
            '}' => { self.advance(); TokenType::RightBrace }
            '[' => { self.advance(); TokenType::LeftBracket }
            ']' => { self.advance(); TokenType::RightBracket }
            ';' => { self.advance(); TokenType::Semicolon }
            ',' => { self.advance(); TokenType::Comma }
            '?' => { self.advance(); TokenType::Question }
            '~' => { self.advance(); TokenType::Tilde }
            '$' => { self.advance(); TokenType::Dollar }

            '+' => self.scan_two(TokenType::Plus, '=', TokenType::PlusAssign),
            '-' => self.scan_minus(),
            '*' => self.scan_two(TokenType::Star, '=', TokenType::StarAssign),
            '/' => self.scan_two(TokenType::Slash, '=', TokenType::SlashAssign),
            '%' => self.scan_two(TokenType::Percent, '=', TokenType::PercentAssign),
            '=' => self.scan_equal(),
            '!' => self.scan_two(TokenType::LogicalNot, '=', TokenType::NotEqual),
            '<' => self.scan_less(),
            '>' => self.scan_greater(),
            '&' => self.scan_two(TokenType::Ampersand, '&', TokenType::LogicalAnd),
            '|' => self.scan_two(TokenType::Pipe, '|', TokenType::LogicalOr),
            '^' => { self.advance(); TokenType::Caret }
            ':' => self.scan_two(TokenType::Colon, ':', TokenType::DoubleColon),
            '.' => self.scan_dot(),

            '"' => self.scan_string_literal(),
            '\'' => self.scan_char_literal(),

            c if c.is_ascii_digit() => self.scan_number(),
            c if c.is_xid_start() || c == '_' => self.scan_identifier_or_keyword(),

            c => {
                self.advance();
                let msg = format!("illegal character '{c}'");
                self.diagnostics.error("E-LEX-CHAR", msg.clone(), Span::single(start_pos, self.file_id));
                TokenType::Error(msg)
            }
        };

        let span = Span::new(start_pos, self.current_pos, self.file_id);
        Some(Token::new(token_type, span))
    }

    fn scan_two(&mut self, one: TokenType, follow: char, two: TokenType) -> TokenType {
        self.advance();
        if !self.is_at_end() && self.current_char() == follow {
            self.advance();
            two
        } else {
            one
        }
    }

    fn scan_minus(&mut self) -> TokenType {
        self.advance();
        match self.current_char_opt() {
            Some('=') => { self.advance(); TokenType::MinusAssign }
            Some('>') => { self.advance(); TokenType::Arrow }
            _ => TokenType::Minus,
        }
    }

    fn scan_equal(&mut self) -> TokenType {
        self.advance();
        match self.current_char_opt() {
            Some('=') => { self.advance(); TokenType::Equal }
            Some('>') => { self.advance(); TokenType::FatArrow }
            _ => TokenType::Assign,
        }
    }

    fn scan_less(&mut self) -> TokenType {
        self.advance();
        match self.current_char_opt() {
            Some('=') => { self.advance(); TokenType::LessEqual }
            Some('<') => { self.advance(); TokenType::LeftShift }
            _ => TokenType::Less,
        }
    }

    fn scan_greater(&mut self) -> TokenType {
        self.advance();
        match self.current_char_opt() {
            Some('=') => { self.advance(); TokenType::GreaterEqual }
            Some('>') => { self.advance(); TokenType::RightShift }
            _ => TokenType::Greater,
        }
    }

    fn scan_dot(&mut self) -> TokenType {
        self.advance();
        if !self.is_at_end() && self.current_char() == '.' {
            self.advance();
            if !self.is_at_end() && self.current_char() == '.' {
                self.advance();
                TokenType::TripleDot
            } else {
                TokenType::DoubleDot
            }
        } else {
            TokenType::Dot
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            if self.is_at_end() {
                return;
            }
            match self.current_char() {
                ' ' | '\t' | '\r' => self.advance(),
                '\n' => self.advance_line(),
                '/' if self.peek_char() == Some('/') => self.skip_line_comment(),
                '/' if self.peek_char() == Some('*') => self.skip_block_comment(),
                _ => return,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while !self.is_at_end() && self.current_char() != '\n' {
            self.advance();
        }
    }

    /// Block comments nest: `/* a /* b */ a */` is one comment.
    fn skip_block_comment(&mut self) {
        let start = self.current_pos;
        self.advance();
        self.advance();
        let mut depth = 1u32;
        while !self.is_at_end() && depth > 0 {
            if self.current_char() == '/' && self.peek_char() == Some('*') {
                self.advance();
                self.advance();
                depth += 1;
            } else if self.current_char() == '*' && self.peek_char() == Some('/') {
                self.advance();
                self.advance();
                depth -= 1;
            } else if self.current_char() == '\n' {
                self.advance_line();
            } else {
                self.advance();
            }
        }
        if depth > 0 {
            self.diagnostics.error(
                "E-LEX-COMMENT",
                "unterminated block comment",
                Span::new(start, self.current_pos, self.file_id),
            );
        }
    }

    fn scan_identifier_or_keyword(&mut self) -> TokenType {
        let start = self.position;
        while !self.is_at_end() && (self.current_char().is_xid_continue() || self.current_char() == '_') {
            self.advance();
        }
        let ident = &self.input[start..self.position];
        TokenType::keyword_from_identifier(ident).unwrap_or_else(|| TokenType::Identifier(self.pool.intern(ident)))
    }

    fn scan_string_literal(&mut self) -> TokenType {
        let start_pos = self.current_pos;
        self.advance();
        let mut value = String::new();
        while !self.is_at_end() && self.current_char() != '"' {
            if self.current_char() == '\\' {
                self.advance();
                if self.is_at_end() {
                    break;
                }
                value.push(self.decode_escape());
            } else if self.current_char() == '\n' {
                value.push('\n');
                self.advance_line();
            } else {
                value.push(self.current_char());
                self.advance();
            }
        }
        if self.is_at_end() {
            self.diagnostics.error(
                "E-LEX-STRING",
                "unterminated string literal",
                Span::new(start_pos, self.current_pos, self.file_id),
            );
            return TokenType::StringLiteral(value);
        }
        self.advance();
        TokenType::StringLiteral(value)
    }

    fn scan_char_literal(&mut self) -> TokenType {
        let start_pos = self.current_pos;
        self.advance();
        if self.is_at_end() {
            self.diagnostics.error("E-LEX-CHAR-LIT", "unterminated character literal", Span::single(self.current_pos, self.file_id));
            return TokenType::CharLiteral('\0');
        }
        let ch = if self.current_char() == '\\' {
            self.advance();
            if self.is_at_end() {
                self.diagnostics.error("E-LEX-CHAR-LIT", "unterminated character literal", Span::single(self.current_pos, self.file_id));
                return TokenType::CharLiteral('\\');
            }
            self.decode_escape()
        } else {
            let c = self.current_char();
            self.advance();
            c
        };
        if self.is_at_end() || self.current_char() != '\'' {
            self.diagnostics.error(
                "E-LEX-CHAR-LIT",
                "unterminated character literal",
                Span::new(start_pos, self.current_pos, self.file_id),
            );
            return TokenType::CharLiteral(ch);
        }
        self.advance();
        TokenType::CharLiteral(ch)
    }

    fn decode_escape(&mut self) -> char {
        let c = self.current_char();
        let decoded = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            '0' => '\0',
            other => {
                self.diagnostics.warning(
                    "W-LEX-ESCAPE",
                    format!("unknown escape sequence '\\{other}'"),
                    Span::single(self.current_pos, self.file_id),
                );
                other
            }
        };
        self.advance();
        decoded
    }

    /// Decimal digits, an optional fractional part, and an optional
    /// `i8`/`u32`/`f64`-style width suffix. Hex and binary prefixes are not
    /// part of this language's literal grammar.
    fn scan_number(&mut self) -> TokenType {
        let start = self.position;
        while !self.is_at_end() && self.current_char().is_ascii_digit() {
            self.advance();
        }

        let is_float = !self.is_at_end()
            && self.current_char() == '.'
            && self.peek_char().is_some_and(|c| c.is_ascii_digit());

        if is_float {
            self.advance();
            while !self.is_at_end() && self.current_char().is_ascii_digit() {
                self.advance();
            }
            let digits = self.input[start..self.position].to_string();
            let suffix = self.scan_suffix();
            TokenType::FloatLiteral { digits, suffix: suffix.and_then(|s| FloatSuffix::parse(&s)) }
        } else {
            let digits = self.input[start..self.position].to_string();
            let suffix = self.scan_suffix();
            TokenType::IntegerLiteral { digits, suffix: suffix.and_then(|s| IntegerSuffix::parse(&s)) }
        }
    }

    fn scan_suffix(&mut self) -> Option<String> {
        if self.is_at_end() || !self.current_char().is_ascii_alphabetic() {
            return None;
        }
        let start = self.position;
        while !self.is_at_end() && self.current_char().is_ascii_alphanumeric() {
            self.advance();
        }
        Some(self.input[start..self.position].to_string())
    }

    fn current_char(&self) -> char {
        self.current_char_opt().unwrap_or('\0')
    }

    fn current_char_opt(&self) -> Option<char> {
        if self.position >= self.bytes.len() {
            return None;
        }
        let byte = self.bytes[self.position];
        if byte < 128 {
            return Some(byte as char);
        }
        self.input[self.position..].chars().next()
    }

    fn peek_char(&self) -> Option<char> {
        if self.position + 1 >= self.bytes.len() {
            return None;
        }
        let byte = self.bytes[self.position + 1];
        if byte < 128 {
            return Some(byte as char);
        }
        let mut chars = self.input[self.position..].chars();
        chars.next();
        chars.next()
    }

    fn char_len(&self) -> usize {
        if self.is_at_end() {
            return 0;
        }
        let byte = self.bytes[self.position];
        if byte < 128 {
            1
        } else {
            self.input[self.position..].chars().next().map_or(1, |c| c.len_utf8())
        }
    }

    fn advance(&mut self) {
        if self.is_at_end() {
            return;
        }
        self.position += self.char_len();
        self.current_pos.column += 1;
        self.current_pos.offset = self.position as u32;
    }

    fn advance_line(&mut self) {
        if self.is_at_end() {
            return;
        }
        self.position += self.char_len();
        self.current_pos.line += 1;
        self.current_pos.column = 1;
        self.current_pos.offset = self.position as u32;
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.bytes.len()
    }
}

/// Convenience wrapper mirroring the other phases' `run`/`analyse` naming.
pub fn lex(source: &str, file_id: u32, pool: &mut IdentPool) -> (Vec<Token>, Diagnostics) {
    let mut lexer = Lexer::new(source, file_id, pool);
    let tokens = lexer.tokenize();
    (tokens, lexer.into_diagnostics())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_with_pool(source: &str) -> (Vec<TokenType>, IdentPool) {
        let mut pool = IdentPool::new();
        let (tokens, _) = lex(source, 0, &mut pool);
        (tokens.into_iter().map(|t| t.value).collect(), pool)
    }

    fn ident_names(kinds: &[TokenType], pool: &IdentPool) -> Vec<Option<String>> {
        kinds
            .iter()
            .map(|k| match k {
                TokenType::Identifier(id) => Some(pool.resolve(*id).to_string()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn tokenizes_function_definition() {
        let (kinds, pool) = lex_with_pool("main :: () { assert(1 + 1 == 2); }");
        let names = ident_names(&kinds, &pool);
        assert_eq!(names[0].as_deref(), Some("main"));
        assert_eq!(names[5].as_deref(), Some("assert"));
        assert_eq!(
            kinds[1..5],
            [TokenType::DoubleColon, TokenType::LeftParen, TokenType::RightParen, TokenType::LeftBrace]
        );
        assert_eq!(
            kinds[6..],
            [
                TokenType::LeftParen,
                TokenType::IntegerLiteral { digits: "1".into(), suffix: None },
                TokenType::Plus,
                TokenType::IntegerLiteral { digits: "1".into(), suffix: None },
                TokenType::Equal,
                TokenType::IntegerLiteral { digits: "2".into(), suffix: None },
                TokenType::RightParen,
                TokenType::Semicolon,
                TokenType::RightBrace,
                TokenType::EndOfFile,
            ]
        );
    }

    #[test]
    fn same_identifier_interns_to_same_handle() {
        let (kinds, _) = lex_with_pool("foo foo bar");
        assert_eq!(kinds[0], kinds[1]);
        assert_ne!(kinds[0], kinds[2]);
    }

    #[test]
    fn integer_suffix_selects_width() {
        let (kinds, _) = lex_with_pool("5u8 7i64");
        assert_eq!(kinds[0], TokenType::IntegerLiteral { digits: "5".into(), suffix: Some(IntegerSuffix::U8) });
        assert_eq!(kinds[1], TokenType::IntegerLiteral { digits: "7".into(), suffix: Some(IntegerSuffix::I64) });
    }

    #[test]
    fn float_literal_without_suffix() {
        let (kinds, _) = lex_with_pool("5.0");
        assert_eq!(kinds[0], TokenType::FloatLiteral { digits: "5.0".into(), suffix: None });
    }

    #[test]
    fn nested_block_comments() {
        let (kinds, _) = lex_with_pool("/* outer /* inner */ still outer */ 1");
        assert_eq!(kinds, vec![TokenType::IntegerLiteral { digits: "1".into(), suffix: None }, TokenType::EndOfFile]);
    }

    #[test]
    fn unterminated_block_comment_reports_diagnostic() {
        let mut pool = IdentPool::new();
        let mut lexer = Lexer::new("/* never closed", 0, &mut pool);
        lexer.tokenize();
        assert!(lexer.diagnostics().has_errors());
    }

    #[test]
    fn string_escapes_decode() {
        let (kinds, _) = lex_with_pool(r#""line\nbreak""#);
        assert_eq!(kinds[0], TokenType::StringLiteral("line\nbreak".to_string()));
    }

    #[test]
    fn dot_prefixed_array_literal_tokens() {
        let (kinds, _) = lex_with_pool(".[1, 2, 3]");
        assert_eq!(
            kinds,
            vec![
                TokenType::Dot,
                TokenType::LeftBracket,
                TokenType::IntegerLiteral { digits: "1".into(), suffix: None },
                TokenType::Comma,
                TokenType::IntegerLiteral { digits: "2".into(), suffix: None },
                TokenType::Comma,
                TokenType::IntegerLiteral { digits: "3".into(), suffix: None },
                TokenType::RightBracket,
                TokenType::EndOfFile,
            ]
        );
    }

    #[test]
    fn illegal_character_becomes_error_token_not_panic() {
        let (kinds, _) = lex_with_pool("1 @ 2");
        assert!(matches!(kinds[1], TokenType::Error(_)));
    }

    #[test]
    fn polymorphic_parameter_syntax() {
        let (kinds, _) = lex_with_pool("id :: ($T: Type, x: T) -> T { return x; }");
        assert!(kinds.contains(&TokenType::Dollar));
        assert!(kinds.contains(&TokenType::Arrow));
        assert!(kinds.contains(&TokenType::KeywordReturn));
    }

    #[test]
    fn relexing_concatenated_spans_matches_original_stream() {
        let source = "a :: 1 + 2;";
        let mut pool = IdentPool::new();
        let (tokens, _) = lex(source, 0, &mut pool);
        let significant: Vec<_> = tokens.iter().filter(|t| t.value != TokenType::EndOfFile).collect();
        let rebuilt: String = significant
            .iter()
            .map(|t| &source[t.span.start.offset as usize..t.span.end.offset as usize])
            .collect::<Vec<_>>()
            .join("");
        let mut pool2 = IdentPool::new();
        let (retokenized, _) = lex(&rebuilt, 0, &mut pool2);
        let original_kinds: Vec<_> = tokens.iter().map(|t| &t.value).collect();
        let retokenized_kinds: Vec<_> = retokenized.iter().map(|t| &t.value).collect();
        assert_eq!(original_kinds.len(), retokenized_kinds.len());
        for (orig, retok) in original_kinds.iter().zip(retokenized_kinds.iter()) {
            match (orig, retok) {
                (TokenType::Identifier(_), TokenType::Identifier(_)) => {}
                _ => assert_eq!(orig, retok),
            }
        }
    }
}
