//! # SQL Lexer
//!
//! Single-pass tokenizer with one-character lookahead. String tokens borrow
//! slices of the input wherever possible; only a string literal containing a
//! `''` escape allocates for its resolved value.
//!
//! ## Dispatch
//!
//! - **Whitespace**: space, tab, CR, LF consumed; LF advances the line
//!   counter and resets the column to 1 (CRLF counts as one line break).
//! - **Comments**: `--` and `##` both run to end-of-line. A `##` comment
//!   terminated by end of input instead of a newline is reported as an
//!   unclosed comment.
//! - **Identifiers**: letter or `_` start, alphanumeric/`_` body. Classified
//!   as KEYWORD when the upper-cased form is reserved (perfect-hash lookup),
//!   IDENTIFIER otherwise. The lexer never rejects a near-keyword; spelling
//!   suggestions happen at parse time.
//! - **Numbers**: `[0-9]+ ('.' [0-9]+)? ([eE] [+-]? [0-9]+)?`. A second `.`
//!   inside one numeric run or an exponent without digits produces a
//!   diagnostic and a synthesized FLOAT token covering the run.
//! - **Strings**: `'`-delimited, `''` resolves to a literal quote. A newline
//!   or end of input before the closing quote produces a diagnostic and a
//!   synthesized STRING token with the content scanned so far.
//! - **Operators**: `+ - * / % & | ^ || << >>` are OPERATOR; `= < > <= >=
//!   <> !=` are COMPARISON; `,` `(` `)` `;` are DELIMITER; `.` is DOT.
//!   A lone `!` is reported and dropped.
//!
//! ## Recovery
//!
//! The lexer never fails. Every malformation becomes a [`Diagnostic`] with
//! a synthesized token of the expected category when one can be formed, and
//! scanning continues with the next character. Tokens are emitted in source
//! order, diagnostics in position order, and the stream always ends with
//! exactly one EOF token.

use crate::diag::{Diagnostic, Stage};
use crate::token::{Keyword, Position, Token, TokenKind, Value};
use std::borrow::Cow;

/// Tokenize `input`, returning the complete token stream (terminated by one
/// EOF token) and all lexical diagnostics.
pub fn scan(input: &str) -> (Vec<Token<'_>>, Vec<Diagnostic>) {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token();
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }
    tracing::trace!(
        tokens = tokens.len(),
        diagnostics = lexer.diagnostics.len(),
        "scan complete"
    );
    (tokens, lexer.diagnostics)
}

pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: u32,
    column: u32,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            column: 1,
            diagnostics: Vec::new(),
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn current(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().nth(1)
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.pos += ch.len_utf8();
        }
    }

    fn error(&mut self, pos: Position, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::error(Stage::Lexical, pos, message));
    }

    fn make(&self, kind: TokenKind, start: usize, value: Value<'a>, pos: Position) -> Token<'a> {
        Token {
            kind,
            lexeme: &self.input[start..self.pos],
            value,
            pos,
        }
    }

    pub fn next_token(&mut self) -> Token<'a> {
        loop {
            match self.current() {
                Some(c) if c.is_whitespace() => self.advance(),
                Some('-') if self.peek_char() == Some('-') => self.skip_line_comment(false),
                Some('#') if self.peek_char() == Some('#') => self.skip_line_comment(true),
                _ => break,
            }
        }

        let pos = self.position();
        let start = self.pos;

        let ch = match self.current() {
            Some(ch) => ch,
            None => return self.make(TokenKind::Eof, start, Value::None, pos),
        };

        if ch.is_ascii_alphabetic() || ch == '_' {
            return self.scan_identifier_or_keyword(start, pos);
        }
        if ch.is_ascii_digit() {
            return self.scan_number(start, pos);
        }

        match ch {
            '\'' => self.scan_string(start, pos),
            ',' | '(' | ')' | ';' => {
                self.advance();
                let symbol = match ch {
                    ',' => ",",
                    '(' => "(",
                    ')' => ")",
                    _ => ";",
                };
                self.make(TokenKind::Delimiter, start, Value::Symbol(symbol), pos)
            }
            '.' => {
                self.advance();
                self.make(TokenKind::Dot, start, Value::Symbol("."), pos)
            }
            '+' => self.single_operator(start, pos, "+"),
            '-' => self.single_operator(start, pos, "-"),
            '*' => self.single_operator(start, pos, "*"),
            '/' => self.single_operator(start, pos, "/"),
            '%' => self.single_operator(start, pos, "%"),
            '&' => self.single_operator(start, pos, "&"),
            '^' => self.single_operator(start, pos, "^"),
            '|' => {
                self.advance();
                if self.current() == Some('|') {
                    self.advance();
                    self.make(TokenKind::Operator, start, Value::Symbol("||"), pos)
                } else {
                    self.make(TokenKind::Operator, start, Value::Symbol("|"), pos)
                }
            }
            '<' => {
                self.advance();
                match self.current() {
                    Some('=') => {
                        self.advance();
                        self.make(TokenKind::Comparison, start, Value::Symbol("<="), pos)
                    }
                    Some('>') => {
                        self.advance();
                        self.make(TokenKind::Comparison, start, Value::Symbol("<>"), pos)
                    }
                    Some('<') => {
                        self.advance();
                        self.make(TokenKind::Operator, start, Value::Symbol("<<"), pos)
                    }
                    _ => self.make(TokenKind::Comparison, start, Value::Symbol("<"), pos),
                }
            }
            '>' => {
                self.advance();
                match self.current() {
                    Some('=') => {
                        self.advance();
                        self.make(TokenKind::Comparison, start, Value::Symbol(">="), pos)
                    }
                    Some('>') => {
                        self.advance();
                        self.make(TokenKind::Operator, start, Value::Symbol(">>"), pos)
                    }
                    _ => self.make(TokenKind::Comparison, start, Value::Symbol(">"), pos),
                }
            }
            '=' => {
                self.advance();
                self.make(TokenKind::Comparison, start, Value::Symbol("="), pos)
            }
            '!' => {
                self.advance();
                if self.current() == Some('=') {
                    self.advance();
                    self.make(TokenKind::Comparison, start, Value::Symbol("!="), pos)
                } else {
                    self.error(pos, "expected '=' after '!'");
                    self.next_token()
                }
            }
            other => {
                self.error(pos, format!("invalid character '{}'", other));
                self.advance();
                self.next_token()
            }
        }
    }

    fn single_operator(&mut self, start: usize, pos: Position, symbol: &'static str) -> Token<'a> {
        self.advance();
        self.make(TokenKind::Operator, start, Value::Symbol(symbol), pos)
    }

    fn skip_line_comment(&mut self, report_unclosed: bool) {
        let start = self.position();
        while let Some(ch) = self.current() {
            if ch == '\n' {
                return;
            }
            self.advance();
        }
        // `##` comments are expected to end before the input does.
        if report_unclosed {
            self.error(start, format!("unclosed comment starting at {}", start));
        }
    }

    fn scan_identifier_or_keyword(&mut self, start: usize, pos: Position) -> Token<'a> {
        while let Some(ch) = self.current() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let lexeme = &self.input[start..self.pos];
        match Keyword::lookup(lexeme) {
            Some(keyword) => self.make(TokenKind::Keyword, start, Value::Keyword(keyword), pos),
            None => self.make(
                TokenKind::Identifier,
                start,
                Value::Text(Cow::Borrowed(lexeme)),
                pos,
            ),
        }
    }

    fn scan_number(&mut self, start: usize, pos: Position) -> Token<'a> {
        let mut is_float = false;
        let mut malformed = false;

        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                self.advance();
            } else if ch == '.' {
                if is_float && !malformed {
                    malformed = true;
                    let fault = self.position();
                    self.error(fault, "invalid number: multiple decimal points");
                }
                is_float = true;
                self.advance();
            } else {
                break;
            }
        }

        if matches!(self.current(), Some('e') | Some('E')) {
            is_float = true;
            self.advance();
            if matches!(self.current(), Some('+') | Some('-')) {
                self.advance();
            }
            if !matches!(self.current(), Some(c) if c.is_ascii_digit()) {
                let fault = self.position();
                self.error(fault, "invalid number: exponent requires digits");
            }
            while matches!(self.current(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }

        let lexeme = &self.input[start..self.pos];
        if is_float {
            self.make(TokenKind::Float, start, Value::Float(parse_float(lexeme)), pos)
        } else {
            let magnitude = lexeme.parse::<i64>().unwrap_or(i64::MAX);
            self.make(TokenKind::Integer, start, Value::Int(magnitude), pos)
        }
    }

    fn scan_string(&mut self, start: usize, pos: Position) -> Token<'a> {
        self.advance();
        let content_start = self.pos;
        let mut resolved: Option<String> = None;

        loop {
            match self.current() {
                None | Some('\n') => {
                    self.error(pos, "unclosed string literal");
                    let value = finish_string(resolved, &self.input[content_start..self.pos]);
                    return self.make(TokenKind::String, start, Value::Text(value), pos);
                }
                Some('\'') if self.peek_char() == Some('\'') => {
                    let owned = resolved.get_or_insert_with(|| {
                        self.input[content_start..self.pos].to_string()
                    });
                    owned.push('\'');
                    self.advance();
                    self.advance();
                }
                Some('\'') => {
                    let value = finish_string(resolved, &self.input[content_start..self.pos]);
                    self.advance();
                    return self.make(TokenKind::String, start, Value::Text(value), pos);
                }
                Some(ch) => {
                    if let Some(owned) = resolved.as_mut() {
                        owned.push(ch);
                    }
                    self.advance();
                }
            }
        }
    }
}

fn finish_string<'a>(resolved: Option<String>, raw: &'a str) -> Cow<'a, str> {
    match resolved {
        Some(owned) => Cow::Owned(owned),
        None => Cow::Borrowed(raw),
    }
}

/// Best-effort magnitude for malformed float lexemes: full parse first, then
/// the prefix before a second decimal point, then without a dangling
/// exponent marker.
fn parse_float(lexeme: &str) -> f64 {
    if let Ok(v) = lexeme.parse::<f64>() {
        return v;
    }
    if let Some(first) = lexeme.find('.') {
        if let Some(second) = lexeme[first + 1..].find('.') {
            if let Ok(v) = lexeme[..first + 1 + second].parse::<f64>() {
                return v;
            }
        }
    }
    let trimmed = lexeme.trim_end_matches(['+', '-']).trim_end_matches(['e', 'E']);
    trimmed.parse::<f64>().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let (tokens, _) = scan(input);
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lex_keywords() {
        let (tokens, diags) = scan("SELECT FROM WHERE INSERT UPDATE DELETE");
        assert!(diags.is_empty());
        let keywords: Vec<Keyword> = tokens.iter().filter_map(|t| t.keyword()).collect();
        assert_eq!(
            keywords,
            vec![
                Keyword::Select,
                Keyword::From,
                Keyword::Where,
                Keyword::Insert,
                Keyword::Update,
                Keyword::Delete,
            ]
        );
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn lex_keywords_preserve_lexeme_case() {
        let (tokens, _) = scan("select SeLeCt");
        assert_eq!(tokens[0].lexeme, "select");
        assert_eq!(tokens[1].lexeme, "SeLeCt");
        assert!(tokens[0].is_keyword(Keyword::Select));
        assert!(tokens[1].is_keyword(Keyword::Select));
    }

    #[test]
    fn lex_identifiers() {
        let (tokens, diags) = scan("users table_name _private col1");
        assert!(diags.is_empty());
        assert_eq!(tokens[0].text(), Some("users"));
        assert_eq!(tokens[1].text(), Some("table_name"));
        assert_eq!(tokens[2].text(), Some("_private"));
        assert_eq!(tokens[3].text(), Some("col1"));
        assert!(tokens[..4].iter().all(|t| t.kind == TokenKind::Identifier));
    }

    #[test]
    fn lex_string_with_escaped_quote() {
        let (tokens, diags) = scan("'O''Brien'");
        assert!(diags.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].text(), Some("O'Brien"));
        assert_eq!(tokens[0].text().unwrap().len(), 7);
        assert_eq!(tokens[0].lexeme, "'O''Brien'");
    }

    #[test]
    fn lex_string_borrows_without_escapes() {
        let (tokens, _) = scan("'hello'");
        assert!(matches!(&tokens[0].value, Value::Text(Cow::Borrowed("hello"))));
    }

    #[test]
    fn unclosed_string_at_eof_synthesizes_token() {
        let (tokens, diags) = scan("'hello");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].to_string().contains("unclosed string literal"));
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].text(), Some("hello"));
    }

    #[test]
    fn unclosed_string_at_newline_recovers() {
        let (tokens, diags) = scan("'abc\nSELECT");
        assert_eq!(diags.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].text(), Some("abc"));
        assert!(tokens[1].is_keyword(Keyword::Select));
    }

    #[test]
    fn lex_integers_and_floats() {
        let (tokens, diags) = scan("42 3.14 1.5e-3 2E+5 7e2");
        assert!(diags.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Integer);
        assert_eq!(tokens[0].value, Value::Int(42));
        assert_eq!(tokens[1].kind, TokenKind::Float);
        assert_eq!(tokens[1].value, Value::Float(3.14));
        assert_eq!(tokens[2].value, Value::Float(1.5e-3));
        assert_eq!(tokens[3].value, Value::Float(2e5));
        assert_eq!(tokens[4].value, Value::Float(7e2));
    }

    #[test]
    fn multiple_decimal_points_reported_once() {
        let (tokens, diags) = scan("1.2.5 ok");
        assert_eq!(diags.len(), 1);
        assert!(diags[0]
            .to_string()
            .contains("invalid number: multiple decimal points"));
        // Fault sits on the second dot.
        assert_eq!(diags[0].pos, Position::new(1, 4));
        assert_eq!(tokens[0].kind, TokenKind::Float);
        assert_eq!(tokens[0].lexeme, "1.2.5");
        assert_eq!(tokens[1].text(), Some("ok"));
    }

    #[test]
    fn exponent_without_digits_is_reported() {
        let (tokens, diags) = scan("1e +");
        assert_eq!(diags.len(), 1);
        assert!(diags[0]
            .to_string()
            .contains("invalid number: exponent requires digits"));
        assert_eq!(tokens[0].kind, TokenKind::Float);
    }

    #[test]
    fn lex_operators_and_comparisons() {
        let (tokens, diags) = scan("+ - * / % & | ^ || << >> = < > <= >= <> !=");
        assert!(diags.is_empty());
        let symbols: Vec<&str> = tokens
            .iter()
            .take_while(|t| t.kind != TokenKind::Eof)
            .map(|t| match t.value {
                Value::Symbol(s) => s,
                _ => panic!("expected symbol"),
            })
            .collect();
        assert_eq!(
            symbols,
            vec![
                "+", "-", "*", "/", "%", "&", "|", "^", "||", "<<", ">>", "=", "<", ">", "<=",
                ">=", "<>", "!="
            ]
        );
        let comparisons = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Comparison)
            .count();
        assert_eq!(comparisons, 7);
    }

    #[test]
    fn lone_exclamation_is_dropped_with_diagnostic() {
        let (tokens, diags) = scan("a ! b");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].to_string().contains("expected '=' after '!'"));
        assert_eq!(tokens[0].text(), Some("a"));
        assert_eq!(tokens[1].text(), Some("b"));
    }

    #[test]
    fn lex_delimiters_and_dot() {
        assert_eq!(
            kinds(", ( ) ; ."),
            vec![
                TokenKind::Delimiter,
                TokenKind::Delimiter,
                TokenKind::Delimiter,
                TokenKind::Delimiter,
                TokenKind::Dot,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_comments() {
        let (tokens, diags) = scan("SELECT -- trailing\n## block style\nFROM");
        assert!(diags.is_empty());
        assert!(tokens[0].is_keyword(Keyword::Select));
        assert!(tokens[1].is_keyword(Keyword::From));
    }

    #[test]
    fn unclosed_hash_comment_at_eof() {
        let (tokens, diags) = scan("SELECT ## runs off the end");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].to_string().contains("unclosed comment"));
        assert!(tokens[0].is_keyword(Keyword::Select));
        assert_eq!(tokens[1].kind, TokenKind::Eof);
    }

    #[test]
    fn invalid_character_is_consumed() {
        let (tokens, diags) = scan("id @ name");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].to_string().contains("invalid character '@'"));
        assert_eq!(diags[0].pos, Position::new(1, 4));
        assert_eq!(tokens[0].text(), Some("id"));
        assert_eq!(tokens[1].text(), Some("name"));
    }

    #[test]
    fn line_and_column_tracking() {
        let (tokens, _) = scan("SELECT\nFROM\n  WHERE");
        assert_eq!(tokens[0].pos, Position::new(1, 1));
        assert_eq!(tokens[1].pos, Position::new(2, 1));
        assert_eq!(tokens[2].pos, Position::new(3, 3));
    }

    #[test]
    fn crlf_counts_as_one_line_break() {
        let (tokens, _) = scan("SELECT\r\nFROM");
        assert_eq!(tokens[1].pos, Position::new(2, 1));
    }

    #[test]
    fn exactly_one_eof_at_final_position() {
        let (tokens, _) = scan("a b");
        let eofs: Vec<&Token> = tokens.iter().filter(|t| t.kind == TokenKind::Eof).collect();
        assert_eq!(eofs.len(), 1);
        assert_eq!(eofs[0].pos, Position::new(1, 4));
    }

    #[test]
    fn lexemes_reproduce_source_modulo_trivia() {
        let source = "SELECT name, price * 1.2 FROM products WHERE id <> 4;";
        let (tokens, diags) = scan(source);
        assert!(diags.is_empty());
        let mut rebuilt = String::new();
        let mut cursor = 0;
        for token in tokens.iter().filter(|t| t.kind != TokenKind::Eof) {
            let at = source[cursor..].find(token.lexeme).unwrap() + cursor;
            rebuilt.push_str(&source[cursor..at]);
            rebuilt.push_str(token.lexeme);
            cursor = at + token.lexeme.len();
        }
        rebuilt.push_str(&source[cursor..]);
        assert_eq!(rebuilt, source);
    }
}
