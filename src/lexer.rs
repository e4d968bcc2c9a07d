// ABOUTME: Indentation-sensitive lexer turning Flowby source text into a token stream

use crate::error::LexError;
use crate::token::{keyword_for, Token, TokenKind};

const INDENT_STEP: i64 = 4;

/// Longest-match-first time-unit suffixes for NUMBER literals (`90s`,
/// `250ms`, `2 seconds` written without a space as `2seconds` etc).
const TIME_SUFFIXES: &[&str] = &["ms", "seconds", "second", "sec", "s"];

#[derive(Debug, Clone, Copy, PartialEq)]
enum IndentChar {
    Space,
    Tab,
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    indent_stack: Vec<i64>,
    pending_dedents: u32,
    at_line_start: bool,
    file_indent_type: Option<IndentChar>,
    tokens: Vec<Token>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            indent_stack: vec![0],
            pending_dedents: 0,
            at_line_start: true,
            file_indent_type: None,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        loop {
            let tok = self.scan_token()?;
            let is_eof = tok.kind == TokenKind::Eof;
            self.tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(self.tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>, suggestion: Option<String>) -> LexError {
        LexError {
            message: message.into(),
            line: self.line,
            column: self.column,
            suggestion,
        }
    }

    /// Drains one synthetic DEDENT per call, returning `true` while more
    /// remain so the caller keeps invoking it before producing a real
    /// token. Mirrors the original implementation's `pending_dedents`
    /// counter, which emits one DEDENT per `_scan_token` call rather than
    /// flushing the whole stack at once.
    fn next_dedent(&mut self) -> Option<Token> {
        if self.pending_dedents > 0 {
            self.pending_dedents -= 1;
            self.indent_stack.pop();
            return Some(Token::new(TokenKind::Dedent, "", self.line, 1));
        }
        None
    }

    fn scan_token(&mut self) -> Result<Token, LexError> {
        if let Some(tok) = self.next_dedent() {
            return Ok(tok);
        }

        if self.at_line_start {
            if let Some(tok) = self.handle_indentation()? {
                return Ok(tok);
            }
        }

        self.skip_inline_whitespace();

        let Some(c) = self.peek() else {
            return self.at_eof();
        };

        if c == '\n' {
            self.advance();
            self.at_line_start = true;
            return Ok(Token::new(TokenKind::Newline, "\n", self.line - 1, self.column));
        }

        if c == '#' {
            while let Some(c) = self.peek() {
                if c == '\n' {
                    break;
                }
                self.advance();
            }
            return self.scan_token();
        }

        if c == '"' && self.peek_at(1) == Some('"') && self.peek_at(2) == Some('"') {
            self.skip_triple_quote_comment()?;
            return self.scan_token();
        }

        let line = self.line;
        let column = self.column;

        if c == '"' {
            return self.scan_string(line, column);
        }
        if c == 'f' && self.peek_at(1) == Some('"') {
            self.advance();
            return self.scan_fstring(line, column);
        }
        if c.is_ascii_digit() {
            return self.scan_number(line, column);
        }
        if c.is_alphabetic() || c == '_' {
            return self.scan_identifier(line, column);
        }

        self.scan_operator(line, column)
    }

    fn at_eof(&mut self) -> Result<Token, LexError> {
        if self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            return Ok(Token::new(TokenKind::Dedent, "", self.line, self.column));
        }
        Ok(Token::new(TokenKind::Eof, "", self.line, self.column))
    }

    fn skip_inline_whitespace(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t') | Some('\r')) {
            self.advance();
        }
    }

    /// Measures the indentation of the current logical line (skipping
    /// blank and comment-only lines without disturbing the indent stack),
    /// then pushes an INDENT, pops to a DEDENT, or falls through with no
    /// token if the level is unchanged.
    fn handle_indentation(&mut self) -> Result<Option<Token>, LexError> {
        loop {
            let line_start = self.pos;
            let mut width = 0i64;
            let mut seen_space = false;
            let mut seen_tab = false;

            loop {
                match self.peek() {
                    Some(' ') => {
                        seen_space = true;
                        width += 1;
                        self.advance();
                    }
                    Some('\t') => {
                        seen_tab = true;
                        width += 4;
                        self.advance();
                    }
                    _ => break,
                }
            }

            if seen_space && seen_tab {
                return Err(self.error(
                    "inconsistent use of tabs and spaces in indentation",
                    Some("use either tabs or spaces consistently, not both on one line".to_string()),
                ));
            }

            match self.peek() {
                None => {
                    self.at_line_start = false;
                    return Ok(None);
                }
                Some('\n') => {
                    self.advance();
                    continue;
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                    continue;
                }
                Some('"') if self.peek_at(1) == Some('"') && self.peek_at(2) == Some('"') => {
                    self.skip_triple_quote_comment()?;
                    continue;
                }
                _ => {}
            }

            if width > 0 {
                let kind = if seen_tab { IndentChar::Tab } else { IndentChar::Space };
                match self.file_indent_type {
                    None => self.file_indent_type = Some(kind),
                    Some(existing) if existing != kind => {
                        return Err(self.error(
                            "file mixes tabs and spaces for indentation",
                            Some("pick one indentation style for the whole file".to_string()),
                        ));
                    }
                    _ => {}
                }
            }

            self.at_line_start = false;
            let _ = line_start;

            let current = *self.indent_stack.last().unwrap();
            if width == current {
                return Ok(None);
            } else if width > current {
                let jump = width - current;
                if jump != INDENT_STEP {
                    return Err(self.error(
                        format!("indent jump {} -> {} is not a multiple of {}", current, width, INDENT_STEP),
                        Some(format!("indent by exactly {} spaces per level", INDENT_STEP)),
                    ));
                }
                self.indent_stack.push(width);
                return Ok(Some(Token::new(TokenKind::Indent, "", self.line, 1)));
            } else {
                let mut count = 0;
                while *self.indent_stack.last().unwrap() > width {
                    self.indent_stack.pop();
                    count += 1;
                }
                if *self.indent_stack.last().unwrap() != width {
                    return Err(self.error(
                        format!("dedent to column {} does not match any enclosing indentation level", width),
                        None,
                    ));
                }
                if count == 0 {
                    return Ok(None);
                }
                self.pending_dedents = count - 1;
                return Ok(Some(Token::new(TokenKind::Dedent, "", self.line, 1)));
            }
        }
    }

    fn skip_triple_quote_comment(&mut self) -> Result<(), LexError> {
        self.advance();
        self.advance();
        self.advance();
        loop {
            match self.peek() {
                None => {
                    return Err(self.error("unterminated triple-quote comment", None));
                }
                Some('"') if self.peek_at(1) == Some('"') && self.peek_at(2) == Some('"') => {
                    self.advance();
                    self.advance();
                    self.advance();
                    return Ok(());
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn scan_string(&mut self, line: u32, column: u32) -> Result<Token, LexError> {
        self.advance();
        let mut value = String::new();
        loop {
            match self.advance() {
                None => return Err(self.error("unterminated string literal", None)),
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some(other) => value.push(other),
                    None => return Err(self.error("unterminated string literal", None)),
                },
                Some(c) => value.push(c),
            }
        }
        Ok(Token::new(TokenKind::String(value.clone()), value, line, column))
    }

    fn scan_fstring(&mut self, line: u32, column: u32) -> Result<Token, LexError> {
        self.advance();
        let mut value = String::new();
        loop {
            match self.advance() {
                None => return Err(self.error("unterminated f-string literal", None)),
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('"') => value.push('"'),
                    Some(other) => value.push(other),
                    None => return Err(self.error("unterminated f-string literal", None)),
                },
                Some(c) => value.push(c),
            }
        }
        Ok(Token::new(TokenKind::InterpolatedString(value.clone()), value, line, column))
    }

    fn scan_number(&mut self, line: u32, column: u32) -> Result<Token, LexError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }

        let mut is_float = false;
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }

        let digits: String = self.chars[start..self.pos].iter().collect();

        for suffix in TIME_SUFFIXES {
            if self.matches_ahead(suffix) {
                for _ in 0..suffix.chars().count() {
                    self.advance();
                }
                let lexeme = format!("{}{}", digits, suffix);
                let value: f64 = digits.parse().map_err(|_| self.error("invalid number literal", None))?;
                // `ms` is the only suffix not already in seconds.
                let seconds = if *suffix == "ms" { value / 1000.0 } else { value };
                return Ok(Token::new(TokenKind::Float(seconds), lexeme, line, column));
            }
        }

        if is_float {
            let value: f64 = digits.parse().map_err(|_| self.error("invalid float literal", None))?;
            Ok(Token::new(TokenKind::Float(value), digits, line, column))
        } else {
            let value: i64 = digits.parse().map_err(|_| self.error("invalid integer literal", None))?;
            Ok(Token::new(TokenKind::Integer(value), digits, line, column))
        }
    }

    fn matches_ahead(&self, suffix: &str) -> bool {
        suffix
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    /// Identifiers starting with an uppercase letter are never treated as
    /// keywords, even if their lowercase form matches one (preserved from
    /// the original implementation so e.g. `Resource(...)` stays callable).
    fn scan_identifier(&mut self, line: u32, column: u32) -> Result<Token, LexError> {
        let start = self.pos;
        let first = self.peek().unwrap();
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let word: String = self.chars[start..self.pos].iter().collect();

        if first.is_uppercase() {
            return Ok(Token::new(TokenKind::Identifier(word.clone()), word, line, column));
        }

        // `none` (lowercase) is only legal as the diagnosis-level keyword
        // directly after `diagnosis` in `step ... with diagnosis none:`
        // (§4.1.S). Everywhere else it's the same casing mistake as a
        // lowercase `true`/`false`/`null`.
        if word == "none" {
            if matches!(self.tokens.last().map(|t| &t.kind), Some(TokenKind::Diagnosis)) {
                return Ok(Token::new(TokenKind::DiagnosisNone, word, line, column));
            }
            return Err(self.error(
                "'none' is not a valid literal",
                Some("use Python-style 'None'".to_string()),
            ));
        }

        if let Some(kind) = keyword_for(&word) {
            return Ok(Token::new(kind, word, line, column));
        }

        for bad in ["true", "false", "null"] {
            if word.eq_ignore_ascii_case(bad) && word != bad {
                return Err(self.error(
                    format!("'{}' is not a valid literal", word),
                    Some(format!("use Python-style '{}'", capitalize(bad))),
                ));
            }
        }

        Ok(Token::new(TokenKind::Identifier(word.clone()), word, line, column))
    }

    fn scan_operator(&mut self, line: u32, column: u32) -> Result<Token, LexError> {
        let c = self.advance().unwrap();
        macro_rules! two_char {
            ($next:expr, $two:expr, $one:expr) => {
                if self.peek() == Some($next) {
                    self.advance();
                    Token::new($two, format!("{}{}", c, $next), line, column)
                } else {
                    Token::new($one, c.to_string(), line, column)
                }
            };
        }

        let tok = match c {
            '+' => Token::new(TokenKind::Plus, "+", line, column),
            '-' => Token::new(TokenKind::Minus, "-", line, column),
            '*' => two_char!('*', TokenKind::Pow, TokenKind::Star),
            '/' => two_char!('/', TokenKind::FloorDiv, TokenKind::Slash),
            '%' => Token::new(TokenKind::Percent, "%", line, column),
            '|' => Token::new(TokenKind::Pipe, "|", line, column),
            '=' => {
                if self.peek() == Some('>') {
                    self.advance();
                    Token::new(TokenKind::Arrow, "=>", line, column)
                } else if self.peek() == Some('=') {
                    self.advance();
                    Token::new(TokenKind::Eq, "==", line, column)
                } else {
                    Token::new(TokenKind::Assign, "=", line, column)
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    Token::new(TokenKind::NotEq, "!=", line, column)
                } else {
                    return Err(self.error("unexpected character '!'", Some("did you mean 'not'?".to_string())));
                }
            }
            '<' => two_char!('=', TokenKind::LtEq, TokenKind::Lt),
            '>' => two_char!('=', TokenKind::GtEq, TokenKind::Gt),
            '.' => Token::new(TokenKind::Dot, ".", line, column),
            ',' => Token::new(TokenKind::Comma, ",", line, column),
            ':' => Token::new(TokenKind::Colon, ":", line, column),
            '(' => Token::new(TokenKind::LParen, "(", line, column),
            ')' => Token::new(TokenKind::RParen, ")", line, column),
            '[' => Token::new(TokenKind::LBracket, "[", line, column),
            ']' => Token::new(TokenKind::RBracket, "]", line, column),
            '{' => Token::new(TokenKind::LBrace, "{", line, column),
            '}' => Token::new(TokenKind::RBrace, "}", line, column),
            other => return Err(self.error(format!("unexpected character '{}'", other), None)),
        };
        Ok(tok)
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn simple_let_statement() {
        let toks = kinds("let x = 1\n");
        assert_eq!(
            toks,
            vec![
                TokenKind::Let,
                TokenKind::Identifier("x".into()),
                TokenKind::Assign,
                TokenKind::Integer(1),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn indent_and_dedent_emitted() {
        let toks = kinds("if x:\n    let y = 1\nlet z = 2\n");
        assert!(toks.contains(&TokenKind::Indent));
        assert!(toks.contains(&TokenKind::Dedent));
    }

    #[test]
    fn uppercase_identifier_is_never_a_keyword() {
        let toks = kinds("Resource(x)\n");
        assert_eq!(toks[0], TokenKind::Identifier("Resource".into()));
    }

    #[test]
    fn lowercase_true_false_null_are_rejected() {
        assert!(tokenize("let x = true\n").is_err());
        assert!(tokenize("let x = false\n").is_err());
        assert!(tokenize("let x = null\n").is_err());
    }

    #[test]
    fn lowercase_none_as_an_ordinary_value_is_rejected() {
        assert!(tokenize("let x = none\n").is_err());
    }

    #[test]
    fn lowercase_none_is_accepted_only_after_diagnosis_keyword() {
        let toks = kinds("step \"s\" with diagnosis none:\n    log \"hi\"\n");
        assert!(toks.contains(&TokenKind::DiagnosisNone));
    }

    #[test]
    fn python_style_literals_accepted() {
        let toks = kinds("let x = True\nlet y = False\nlet z = None\n");
        assert!(toks.contains(&TokenKind::True));
        assert!(toks.contains(&TokenKind::False));
        assert!(toks.contains(&TokenKind::Null));
    }

    #[test]
    fn time_suffixed_number_picks_longest_match() {
        let toks = kinds("250ms\n");
        assert_eq!(toks[0], TokenKind::Float(250.0));
    }

    #[test]
    fn tab_and_space_mixed_on_one_line_rejected() {
        assert!(tokenize("if x:\n \tlet y = 1\n").is_err());
    }

    #[test]
    fn bad_indent_jump_rejected() {
        assert!(tokenize("if x:\n  let y = 1\n").is_err());
    }

    #[test]
    fn blank_and_comment_lines_do_not_affect_indent_stack() {
        let toks = kinds("if x:\n    let y = 1\n\n    # comment\n    let z = 2\n");
        let indent_count = toks.iter().filter(|t| **t == TokenKind::Indent).count();
        assert_eq!(indent_count, 1);
    }
}
