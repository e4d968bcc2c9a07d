// ABOUTME: Recursive-descent parser with inline scope validation against a live symbol table

use crate::ast::{BinOp, DiagnosisLevel, Expr, Program, Stmt, StringPart, UnOp};
use crate::error::ParseError;
use crate::symbol_table::{SymbolKind, SymbolTableStack};
use crate::token::{Token, TokenKind};
use crate::value::Value;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct ParseWarning {
    pub code: Option<String>,
    pub message: String,
    pub line: u32,
    pub symbol: Option<String>,
    pub suggestion: Option<String>,
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    scopes: SymbolTableStack,
    warnings: Vec<ParseWarning>,
    loop_depth: u32,
    function_depth: u32,
}

type PResult<T> = Result<T, ParseError>;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            scopes: SymbolTableStack::new(),
            warnings: Vec::new(),
            loop_depth: 0,
            function_depth: 0,
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_at_kind(&self, offset: usize) -> &TokenKind {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)].kind
    }

    /// Speculative lookahead from the current `(` token: does a balanced
    /// `(IDENT (, IDENT)*)?)` immediately precede `=>`? Used to distinguish
    /// a parenthesized lambda parameter list from a parenthesized
    /// expression without mutating parser/scope state.
    fn is_paren_lambda_ahead(&self) -> bool {
        let mut i = self.pos + 1;
        if matches!(self.tokens.get(i).map(|t| &t.kind), Some(TokenKind::RParen)) {
            i += 1;
        } else {
            loop {
                match self.tokens.get(i).map(|t| &t.kind) {
                    Some(TokenKind::Identifier(_)) => i += 1,
                    _ => return false,
                }
                match self.tokens.get(i).map(|t| &t.kind) {
                    Some(TokenKind::Comma) => {
                        i += 1;
                        continue;
                    }
                    Some(TokenKind::RParen) => {
                        i += 1;
                        break;
                    }
                    _ => return false,
                }
            }
        }
        matches!(self.tokens.get(i).map(|t| &t.kind), Some(TokenKind::Arrow))
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Newline) {
            self.advance();
        }
    }

    fn expect(&mut self, kind: TokenKind, context: &str) -> PResult<Token> {
        if self.peek_kind() == &kind {
            Ok(self.advance())
        } else {
            Err(self.error(
                format!("expected {:?} {}", kind, context),
                Some(format!("{:?}", kind)),
                Some(format!("{:?}", self.peek_kind())),
            ))
        }
    }

    fn error(&self, message: impl Into<String>, expected: Option<String>, actual: Option<String>) -> ParseError {
        ParseError {
            message: message.into(),
            line: self.peek().line,
            column: self.peek().column,
            expected,
            actual,
            suggestion: None,
        }
    }

    pub fn parse_program(mut self) -> PResult<(Program, Vec<ParseWarning>)> {
        self.skip_newlines();
        let mut library = None;
        let mut statements = Vec::new();

        if matches!(self.peek_kind(), TokenKind::Library) {
            let line = self.peek().line;
            self.advance();
            let name = self.expect_identifier("after 'library'")?;
            library = Some(name.clone());
            statements.push(Stmt::Library { name, line });
            self.skip_newlines();
        }

        while !matches!(self.peek_kind(), TokenKind::Eof) {
            statements.push(self.parse_statement()?);
            self.skip_newlines();
        }

        self.check_unused_variables();

        Ok((Program { library, statements }, self.warnings.clone()))
    }

    fn expect_identifier(&mut self, context: &str) -> PResult<String> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.error(format!("expected identifier {}", context), Some("identifier".into()), Some(format!("{:?}", other)))),
        }
    }

    fn check_unused_variables(&mut self) {
        for (name, sym) in self.scopes.get_all_symbols() {
            if name.starts_with('_') {
                continue;
            }
            if !sym.used.get() && matches!(sym.kind, SymbolKind::Variable | SymbolKind::Constant) {
                self.warnings.push(ParseWarning {
                    code: Some("VR-006".to_string()),
                    message: format!("'{}' is never used", name),
                    line: sym.defining_line,
                    symbol: Some(name.clone()),
                    suggestion: Some(format!("prefix with '_' (e.g. '_{}') if this is intentional", name)),
                });
            }
        }
    }

    // ----- statements --------------------------------------------------

    fn parse_block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(TokenKind::Colon, "before block")?;
        self.skip_newlines();
        self.expect(TokenKind::Indent, "to start a block")?;
        self.skip_newlines();
        let mut stmts = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::Dedent | TokenKind::Eof) {
            stmts.push(self.parse_statement()?);
            self.skip_newlines();
        }
        if matches!(self.peek_kind(), TokenKind::Dedent) {
            self.advance();
        }
        Ok(stmts)
    }

    fn parse_statement(&mut self) -> PResult<Stmt> {
        match self.peek_kind().clone() {
            TokenKind::Let => self.parse_let(false),
            TokenKind::Const => self.parse_let(true),
            TokenKind::If => self.parse_if(),
            TokenKind::When => self.parse_when(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Function => self.parse_function_def(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Break => {
                let line = self.advance().line;
                if self.loop_depth == 0 {
                    return Err(self.error("'break' used outside of a loop", None, None));
                }
                Ok(Stmt::Break { line })
            }
            TokenKind::Continue => {
                let line = self.advance().line;
                if self.loop_depth == 0 {
                    return Err(self.error("'continue' used outside of a loop", None, None));
                }
                Ok(Stmt::Continue { line })
            }
            TokenKind::Assert => self.parse_assert(),
            TokenKind::Exit => self.parse_exit(),
            TokenKind::Log => self.parse_log(),
            TokenKind::Step => self.parse_step(),
            TokenKind::Export => self.parse_export(),
            TokenKind::Import => self.parse_import(),
            TokenKind::ActionVerb(verb) => self.parse_action(verb),
            _ => self.parse_expr_or_assign_statement(),
        }
    }

    fn parse_let(&mut self, is_const: bool) -> PResult<Stmt> {
        let line = self.advance().line;
        let name = self.expect_identifier("after let/const")?;
        if self.scopes.exists_in_current_scope(&name) {
            return Err(self.error(format!("'{}' is already declared in this scope", name), None, None));
        }
        self.expect(TokenKind::Assign, "in declaration")?;
        let value = self.parse_expression()?;
        let kind = if is_const { SymbolKind::Constant } else { SymbolKind::Variable };
        self.scopes
            .define(&name, Value::Null, kind, line)
            .map_err(|e| self.error(e.to_string(), None, None))?;
        if is_const {
            Ok(Stmt::Const { name, value, line })
        } else {
            Ok(Stmt::Let { name, value, line })
        }
    }

    /// §4.2's VR-001 row exempts "identifiers that are the target of an
    /// assignment or declaration" from the use-before-declare check — a
    /// bare `name =` is resolved by the dedicated undeclared-assignment
    /// diagnostic below, not by the ordinary identifier-read path in
    /// `parse_primary`. So a plain identifier immediately followed by `=`
    /// is consumed directly here, never routed through `parse_expression`
    /// (which would trip VR-001 on the unresolved name first).
    fn parse_expr_or_assign_statement(&mut self) -> PResult<Stmt> {
        let line = self.peek().line;
        if let TokenKind::Identifier(name) = self.peek_kind().clone() {
            if matches!(self.peek_at_kind(1), TokenKind::Assign) {
                self.advance();
                self.advance();
                if is_reserved_namespace(&name) || crate::symbol_table::BUILTIN_FUNCTION_NAMES.contains(&name.as_str()) {
                    return Err(self.error(format!("'{}' is a reserved name and cannot be assigned to", name), None, None));
                }
                match self.scopes.kind_of(&name) {
                    None => {
                        return Err(self.error(format!("assignment to undeclared variable '{}'", name), None, None));
                    }
                    Some((kind, defining_line)) if !kind.is_mutable() => {
                        return Err(self.error(
                            format!(
                                "cannot assign to '{}': declared as {:?} on line {}",
                                name, kind, defining_line
                            ),
                            None,
                            None,
                        ));
                    }
                    Some(_) => {}
                }
                let value = self.parse_expression()?;
                return Ok(Stmt::Assign { target: Expr::Identifier(name, line), value, line });
            }
        }
        let expr = self.parse_expression()?;
        if matches!(self.peek_kind(), TokenKind::Assign) {
            return Err(self.error(
                format!("invalid assignment target {:?}; only a plain name can appear on the left of '='", expr),
                None,
                None,
            ));
        }
        Ok(Stmt::ExprStmt(expr))
    }

    /// `if`/`elif`/`else` each push their own child scope (confirmed by the
    /// shadowing boundary case: `let x = 1; if x == 1: let x = 2` must not
    /// trip VR-003, which only rejects redeclaration within the *same*
    /// scope). A `let` inside a branch body is therefore invisible to
    /// sibling branches and to code after the `if`.
    fn parse_if(&mut self) -> PResult<Stmt> {
        let line = self.advance().line;
        let mut branches = Vec::new();
        let cond = self.parse_expression()?;
        self.scopes.enter_scope("if");
        let body = self.parse_block()?;
        self.scopes.exit_scope().ok();
        branches.push((cond, body));

        let mut else_branch = None;
        loop {
            self.skip_newlines_lookahead();
            match self.peek_kind() {
                TokenKind::Elif => {
                    self.advance();
                    let cond = self.parse_expression()?;
                    self.scopes.enter_scope("elif");
                    let body = self.parse_block()?;
                    self.scopes.exit_scope().ok();
                    branches.push((cond, body));
                }
                TokenKind::Else => {
                    self.advance();
                    self.scopes.enter_scope("else");
                    let body = self.parse_block()?;
                    self.scopes.exit_scope().ok();
                    else_branch = Some(body);
                    break;
                }
                _ => break,
            }
        }

        Ok(Stmt::If { branches, else_branch, line })
    }

    /// elif/else must directly continue the same statement, so we peek
    /// past a single newline without consuming a real blank-line gap.
    fn skip_newlines_lookahead(&mut self) {
        let save = self.pos;
        while matches!(self.peek_kind(), TokenKind::Newline) {
            self.advance();
        }
        if !matches!(self.peek_kind(), TokenKind::Elif | TokenKind::Else) {
            self.pos = save;
        }
    }

    /// Each `when` arm and the `otherwise` body get their own child scope,
    /// same reasoning as `if`/`elif`/`else`.
    fn parse_when(&mut self) -> PResult<Stmt> {
        let line = self.advance().line;
        let subject = self.parse_expression()?;
        self.expect(TokenKind::Colon, "before when arms")?;
        self.skip_newlines();
        self.expect(TokenKind::Indent, "to start when arms")?;
        self.skip_newlines();

        let mut arms = Vec::new();
        let mut else_branch = None;
        while !matches!(self.peek_kind(), TokenKind::Otherwise | TokenKind::Dedent | TokenKind::Eof) {
            let mut patterns = vec![self.parse_expression()?];
            while matches!(self.peek_kind(), TokenKind::Pipe) {
                self.advance();
                patterns.push(self.parse_expression()?);
            }
            self.scopes.enter_scope("when-arm");
            let body = self.parse_block()?;
            self.scopes.exit_scope().ok();
            arms.push((patterns, body));
            self.skip_newlines();
        }
        if matches!(self.peek_kind(), TokenKind::Otherwise) {
            self.advance();
            self.scopes.enter_scope("otherwise");
            let body = self.parse_block()?;
            self.scopes.exit_scope().ok();
            else_branch = Some(body);
            self.skip_newlines();
        }
        if matches!(self.peek_kind(), TokenKind::Dedent) {
            self.advance();
        }
        Ok(Stmt::When { subject, arms, else_branch, line })
    }

    /// `while` pushes a child scope for its body, re-entered fresh on every
    /// iteration at runtime (mirrors `for`) so a `let` inside the loop body
    /// doesn't collide with itself across iterations.
    fn parse_while(&mut self) -> PResult<Stmt> {
        let line = self.advance().line;
        let condition = self.parse_expression()?;
        self.loop_depth += 1;
        self.scopes.enter_scope("while");
        let body = self.parse_block()?;
        self.scopes.exit_scope().ok();
        self.loop_depth -= 1;
        Ok(Stmt::While { condition, body, line })
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let line = self.advance().line;
        let mut vars = vec![self.expect_identifier("in for-loop")?];
        while matches!(self.peek_kind(), TokenKind::Comma) {
            self.advance();
            vars.push(self.expect_identifier("in for-loop tuple")?);
        }
        self.expect(TokenKind::In, "in for-loop")?;
        let iterable = self.parse_expression()?;

        self.loop_depth += 1;
        self.scopes.enter_scope("for");
        for v in &vars {
            self.scopes
                .define(v, Value::Null, SymbolKind::LoopVariable, line)
                .map_err(|e| self.error(e.to_string(), None, None))?;
        }
        let body = self.parse_block()?;
        self.scopes.exit_scope().ok();
        self.loop_depth -= 1;

        Ok(Stmt::For { vars, iterable, body, line })
    }

    fn parse_function_def(&mut self) -> PResult<Stmt> {
        let line = self.advance().line;
        let name = self.expect_identifier("after 'function'")?;
        self.expect(TokenKind::LParen, "in function signature")?;
        let mut params = Vec::new();
        if !matches!(self.peek_kind(), TokenKind::RParen) {
            loop {
                params.push(self.expect_identifier("in parameter list")?);
                if matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "to close parameter list")?;

        self.scopes
            .define(&name, Value::Null, SymbolKind::Function, line)
            .map_err(|e| self.error(e.to_string(), None, None))?;

        self.function_depth += 1;
        self.scopes.enter_scope(&format!("function:{}", name));
        for p in &params {
            self.scopes
                .define(p, Value::Null, SymbolKind::Parameter, line)
                .map_err(|e| self.error(e.to_string(), None, None))?;
        }
        let body = self.parse_block()?;
        self.scopes.exit_scope().ok();
        self.function_depth -= 1;

        Ok(Stmt::FunctionDef {
            name,
            params,
            body: Rc::new(body),
            line,
        })
    }

    fn parse_return(&mut self) -> PResult<Stmt> {
        let line = self.advance().line;
        if self.function_depth == 0 {
            return Err(self.error("'return' used outside of a function", None, None));
        }
        if matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Dedent | TokenKind::Eof) {
            return Ok(Stmt::Return { value: None, line });
        }
        let value = self.parse_expression()?;
        Ok(Stmt::Return { value: Some(value), line })
    }

    fn parse_assert(&mut self) -> PResult<Stmt> {
        let line = self.advance().line;
        let condition = self.parse_expression()?;
        let message = if matches!(self.peek_kind(), TokenKind::Comma) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(Stmt::Assert { condition, message, line })
    }

    fn parse_step(&mut self) -> PResult<Stmt> {
        let line = self.advance().line;
        let name = if let TokenKind::String(s) = self.peek_kind().clone() {
            self.advance();
            Some(s)
        } else {
            None
        };
        let mut diagnosis = DiagnosisLevel::None;
        if matches!(self.peek_kind(), TokenKind::With) {
            self.advance();
            self.expect(TokenKind::Diagnosis, "after 'with'")?;
            diagnosis = match self.peek_kind().clone() {
                TokenKind::DiagnosisNone => {
                    self.advance();
                    DiagnosisLevel::None
                }
                TokenKind::Identifier(name) => {
                    self.advance();
                    match name.as_str() {
                        "minimal" => DiagnosisLevel::Minimal,
                        "basic" => DiagnosisLevel::Basic,
                        "standard" => DiagnosisLevel::Standard,
                        "detailed" => DiagnosisLevel::Detailed,
                        "full" => DiagnosisLevel::Full,
                        other => {
                            return Err(self.error(format!("unknown diagnosis level '{}'", other), None, None))
                        }
                    }
                }
                other => return Err(self.error(format!("expected diagnosis level, got {:?}", other), None, None)),
            };
        }
        let guard = if matches!(self.peek_kind(), TokenKind::If) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.scopes.enter_scope("step");
        let body = self.parse_block()?;
        self.scopes.exit_scope().ok();
        Ok(Stmt::Step { name, body, diagnosis, guard, line })
    }

    fn parse_exit(&mut self) -> PResult<Stmt> {
        let line = self.advance().line;
        let code = if matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Dedent | TokenKind::Eof) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        let message = if matches!(self.peek_kind(), TokenKind::Comma) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };
        Ok(Stmt::Exit { code, message, line })
    }

    const LOG_LEVELS: &'static [&'static str] = &["debug", "info", "success", "warning", "error"];

    /// `log "msg"` defaults to `info`; `log LEVEL "msg"` picks the level
    /// explicitly where `LEVEL` is one of debug/info/success/warning/error.
    fn parse_log(&mut self) -> PResult<Stmt> {
        let line = self.advance().line;
        let mut level = "info".to_string();
        if let TokenKind::Identifier(name) = self.peek_kind().clone() {
            if Self::LOG_LEVELS.contains(&name.as_str()) {
                self.advance();
                level = name;
            }
        }
        let message = self.parse_expression()?;
        Ok(Stmt::Log { level, message, line })
    }

    /// `export` wraps the next `const`/`function` declaration and copies its
    /// symbol into the enclosing library's export map at module-load time.
    fn parse_export(&mut self) -> PResult<Stmt> {
        let line = self.advance().line;
        let target = match self.peek_kind() {
            TokenKind::Const => self.parse_let(true)?,
            TokenKind::Function => self.parse_function_def()?,
            other => return Err(self.error(format!("'export' must be followed by 'const' or 'function', got {:?}", other), None, None)),
        };
        Ok(Stmt::Export { target: Box::new(target), line })
    }

    /// Two forms: `import NAME from STRING` (alias form, registers a
    /// `Module` symbol) and `from STRING import NAME (, NAME)*` (selective
    /// form, registers each name as `Imported`).
    fn parse_import(&mut self) -> PResult<Stmt> {
        let line = self.peek().line;
        if matches!(self.peek_kind(), TokenKind::From) {
            self.advance();
            let path = self.expect_string("as import path")?;
            self.expect(TokenKind::Import, "after import path")?;
            let mut names = vec![self.expect_identifier("in import list")?];
            while matches!(self.peek_kind(), TokenKind::Comma) {
                self.advance();
                names.push(self.expect_identifier("in import list")?);
            }
            for n in &names {
                self.scopes
                    .define(n, Value::Null, SymbolKind::Imported, line)
                    .map_err(|e| self.error(e.to_string(), None, None))?;
            }
            return Ok(Stmt::Import { path, alias: None, names, line });
        }

        self.expect(TokenKind::Import, "to start import statement")?;
        let alias = self.expect_identifier("after 'import'")?;
        self.expect(TokenKind::From, "after import name")?;
        let path = self.expect_string("as import path")?;
        self.scopes
            .define(&alias, Value::Null, SymbolKind::Module, line)
            .map_err(|e| self.error(e.to_string(), None, None))?;
        Ok(Stmt::Import { path, alias: Some(alias), names: Vec::new(), line })
    }

    fn parse_action(&mut self, verb: &'static str) -> PResult<Stmt> {
        let line = self.advance().line;
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        while !matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Colon | TokenKind::Dedent | TokenKind::Eof) {
            // `as`/`from` are already keywords elsewhere (import aliasing);
            // inside an action statement they are just connector words.
            if matches!(self.peek_kind(), TokenKind::As | TokenKind::From) {
                let lexeme = self.advance().lexeme;
                args.push(Expr::StringLit(lexeme));
                continue;
            }
            // Other connector words (until/where/into/attr/pattern/fullpage/
            // file/option/back/forward) are parsed as bare identifiers and
            // folded into args so the host sees the statement's full shape.
            if let TokenKind::Identifier(name) = self.peek_kind().clone() {
                if crate::token::ACTION_CONNECTORS.contains(&name.as_str()) {
                    self.advance();
                    args.push(Expr::StringLit(name));
                    continue;
                }
            }
            if let TokenKind::Identifier(name) = self.peek_kind().clone() {
                let save = self.pos;
                self.advance();
                if matches!(self.peek_kind(), TokenKind::Colon) {
                    self.advance();
                    kwargs.push((name, self.parse_expression()?));
                    continue;
                }
                self.pos = save;
            }
            args.push(self.parse_expression()?);
        }
        Ok(Stmt::Action { verb: verb.to_string(), args, kwargs, line })
    }

    fn expect_string(&mut self, context: &str) -> PResult<String> {
        match self.peek_kind().clone() {
            TokenKind::String(s) => {
                self.advance();
                Ok(s)
            }
            other => Err(self.error(format!("expected string {}", context), Some("string".into()), Some(format!("{:?}", other)))),
        }
    }

    // ----- expressions (precedence climbing) ---------------------------

    fn parse_expression(&mut self) -> PResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut left = self.parse_and()?;
        while matches!(self.peek_kind(), TokenKind::Or) {
            let line = self.advance().line;
            let right = self.parse_and()?;
            left = Expr::BinaryOp { op: BinOp::Or, left: Box::new(left), right: Box::new(right), line };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut left = self.parse_not()?;
        while matches!(self.peek_kind(), TokenKind::And) {
            let line = self.advance().line;
            let right = self.parse_not()?;
            left = Expr::BinaryOp { op: BinOp::And, left: Box::new(left), right: Box::new(right), line };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> PResult<Expr> {
        if matches!(self.peek_kind(), TokenKind::Not) {
            let line = self.advance().line;
            let operand = self.parse_not()?;
            return Ok(Expr::UnaryOp { op: UnOp::Not, operand: Box::new(operand), line });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Eq => BinOp::Eq,
                TokenKind::NotEq => BinOp::NotEq,
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::LtEq => BinOp::LtEq,
                TokenKind::GtEq => BinOp::GtEq,
                TokenKind::Contains => BinOp::Contains,
                TokenKind::Matches => BinOp::Matches,
                TokenKind::Equals => BinOp::Equals,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.parse_additive()?;
            left = Expr::BinaryOp { op, left: Box::new(left), right: Box::new(right), line };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.parse_multiplicative()?;
            left = Expr::BinaryOp { op, left: Box::new(left), right: Box::new(right), line };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::FloorDiv => BinOp::FloorDiv,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            let line = self.advance().line;
            let right = self.parse_unary()?;
            left = Expr::BinaryOp { op, left: Box::new(left), right: Box::new(right), line };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        if matches!(self.peek_kind(), TokenKind::Minus) {
            let line = self.advance().line;
            let operand = self.parse_unary()?;
            return Ok(Expr::UnaryOp { op: UnOp::Neg, operand: Box::new(operand), line });
        }
        if matches!(self.peek_kind(), TokenKind::Plus) {
            let line = self.advance().line;
            let operand = self.parse_unary()?;
            return Ok(Expr::UnaryOp { op: UnOp::Pos, operand: Box::new(operand), line });
        }
        self.parse_power()
    }

    /// `**` binds tighter than unary and is right-associative: `2 ** 3 ** 2`
    /// is `2 ** (3 ** 2)`.
    fn parse_power(&mut self) -> PResult<Expr> {
        let base = self.parse_postfix()?;
        if matches!(self.peek_kind(), TokenKind::Pow) {
            let line = self.advance().line;
            let exp = self.parse_unary()?;
            return Ok(Expr::BinaryOp { op: BinOp::Pow, left: Box::new(base), right: Box::new(exp), line });
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    let line = self.advance().line;
                    let name = self.expect_identifier("after '.'")?;
                    if matches!(self.peek_kind(), TokenKind::LParen) {
                        self.advance();
                        let (args, kwargs) = self.parse_call_args_kw()?;
                        expr = Expr::MethodCall { receiver: Box::new(expr), method: name, args, kwargs, line };
                    } else {
                        expr = Expr::Member { object: Box::new(expr), name, line };
                    }
                }
                TokenKind::LBracket => {
                    let line = self.advance().line;
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RBracket, "to close index")?;
                    expr = Expr::Index { object: Box::new(expr), index: Box::new(index), line };
                }
                TokenKind::LParen => {
                    let line = self.advance().line;
                    let (args, kwargs) = self.parse_call_args_kw()?;
                    expr = Expr::Call { callee: Box::new(expr), args, kwargs, line };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_args_kw(&mut self) -> PResult<(Vec<Expr>, Vec<(String, Expr)>)> {
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        if !matches!(self.peek_kind(), TokenKind::RParen) {
            loop {
                // `type` and a few other kwarg names double as action-verb
                // keywords at the lexer level (§6.3); accept either spelling
                // here so e.g. `input(..., type: "integer")` still parses.
                let kwarg_name = match self.peek_kind().clone() {
                    TokenKind::Identifier(name) => Some(name),
                    TokenKind::ActionVerb(name) => Some(name.to_string()),
                    _ => None,
                };
                if let Some(name) = kwarg_name {
                    let save = self.pos;
                    self.advance();
                    if matches!(self.peek_kind(), TokenKind::Colon) {
                        self.advance();
                        let value = self.parse_expression()?;
                        kwargs.push((name, value));
                    } else {
                        self.pos = save;
                        args.push(self.parse_expression()?);
                    }
                } else {
                    args.push(self.parse_expression()?);
                }
                if matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "to close call arguments")?;
        Ok((args, kwargs))
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Integer(n) => {
                self.advance();
                Ok(Expr::IntegerLit(n))
            }
            TokenKind::Float(n) => {
                self.advance();
                Ok(Expr::FloatLit(n))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expr::StringLit(s))
            }
            TokenKind::InterpolatedString(s) => {
                self.advance();
                Ok(Expr::InterpolatedString(self.parse_fstring_parts(&s, tok.line), tok.line))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::BoolLit(true))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::BoolLit(false))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::NullLit)
            }
            TokenKind::Identifier(name) if name == "input" && matches!(self.peek_at_kind(1), TokenKind::LParen) => {
                self.advance();
                self.advance();
                let (args, kwargs) = self.parse_call_args_kw()?;
                let prompt = args.into_iter().next().map(Box::new);
                let mut default = None;
                let mut type_tag = None;
                for (k, v) in kwargs {
                    match k.as_str() {
                        "default" => default = Some(Box::new(v)),
                        "type" => type_tag = Some(match v {
                            Expr::StringLit(s) => s,
                            Expr::Identifier(s, _) => s,
                            other => return Err(self.error(format!("input() 'type' must be a literal, got {:?}", other), None, None)),
                        }),
                        other => return Err(self.error(format!("input() has no keyword argument '{}'", other), None, None)),
                    }
                }
                Ok(Expr::Input { prompt, default, type_tag, line: tok.line })
            }
            // `x => expr` — single bare-parameter lambda (§4.4 lambda grammar).
            TokenKind::Identifier(name) if matches!(self.peek_at_kind(1), TokenKind::Arrow) => {
                self.advance();
                self.parse_lambda(vec![name])
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if !self.scopes.exists(&name)
                    && !is_reserved_namespace(&name)
                    && !crate::symbol_table::BUILTIN_FUNCTION_NAMES.contains(&name.as_str())
                {
                    return Err(self.error(format!("use of undefined variable '{}'", name), None, None));
                }
                // Reading a name here is what VR-006 means by "used" — mark
                // it so the end-of-parse unused-variable pass leaves it alone.
                self.scopes.get(&name);
                Ok(Expr::Identifier(name, tok.line))
            }
            // `(a, b) => expr` — the parser speculatively checks for a
            // trailing `=>` after a balanced identifier list; on failure
            // this is just a parenthesized expression.
            TokenKind::LParen if self.is_paren_lambda_ahead() => {
                self.advance();
                let mut params = Vec::new();
                if !matches!(self.peek_kind(), TokenKind::RParen) {
                    loop {
                        params.push(self.expect_identifier("in lambda parameter list")?);
                        if matches!(self.peek_kind(), TokenKind::Comma) {
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen, "to close lambda parameter list")?;
                self.parse_lambda(params)
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen, "to close parenthesized expression")?;
                Ok(expr)
            }
            TokenKind::LBracket => self.parse_list_literal(),
            TokenKind::LBrace => self.parse_object_literal(),
            _ => Err(self.error(format!("unexpected token {:?}", tok.kind), None, None)),
        }
    }

    fn parse_list_literal(&mut self) -> PResult<Expr> {
        let line = self.advance().line;
        let mut items = Vec::new();
        if !matches!(self.peek_kind(), TokenKind::RBracket) {
            loop {
                items.push(self.parse_expression()?);
                if matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBracket, "to close list literal")?;
        Ok(Expr::ListLit(items, line))
    }

    fn parse_object_literal(&mut self) -> PResult<Expr> {
        let line = self.advance().line;
        let mut entries = Vec::new();
        if !matches!(self.peek_kind(), TokenKind::RBrace) {
            loop {
                let key = match self.peek_kind().clone() {
                    TokenKind::Identifier(name) => {
                        self.advance();
                        name
                    }
                    TokenKind::String(s) => {
                        self.advance();
                        s
                    }
                    other => return Err(self.error(format!("expected object key, got {:?}", other), None, None)),
                };
                self.expect(TokenKind::Colon, "after object key")?;
                let value = self.parse_expression()?;
                entries.push((key, value));
                if matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace, "to close object literal")?;
        Ok(Expr::ObjectLit(entries, line))
    }

    /// `=> expr` tail of a lambda whose parameter list has already been
    /// consumed — either a single bare name or a parenthesized list.
    fn parse_lambda(&mut self, params: Vec<String>) -> PResult<Expr> {
        let line = self.expect(TokenKind::Arrow, "after lambda parameters")?.line;

        self.scopes.enter_scope("lambda");
        for p in &params {
            self.scopes
                .define(p, Value::Null, SymbolKind::Parameter, line)
                .map_err(|e| self.error(e.to_string(), None, None))?;
        }
        let body = self.parse_expression()?;
        self.scopes.exit_scope().ok();

        Ok(Expr::Lambda { params, body: Box::new(body), line })
    }
}

fn is_reserved_namespace(name: &str) -> bool {
    crate::symbol_table::RESERVED_SYSTEM_NAMESPACES.contains(&name)
}

impl Parser {
    /// Splits an f-string body into literal/`{expr}` parts, re-lexing and
    /// re-parsing each embedded expression on its own token stream. The
    /// nested parser is seeded with a *clone* of the enclosing symbol-table
    /// stack (cheap — scopes are `Rc`-backed) so VR-001 resolution inside
    /// `{...}` sees exactly the names visible at this point in the program.
    fn parse_fstring_parts(&self, raw: &str, line: u32) -> Vec<StringPart> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '{' {
                let mut expr_src = String::new();
                let mut depth = 1;
                for c in chars.by_ref() {
                    if c == '{' {
                        depth += 1;
                    } else if c == '}' {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    expr_src.push(c);
                }
                if !literal.is_empty() {
                    parts.push(StringPart::Literal(std::mem::take(&mut literal)));
                }
                match crate::lexer::tokenize(&format!("{}\n", expr_src)) {
                    Ok(tokens) => {
                        let mut nested = Parser::new(tokens);
                        nested.scopes = self.scopes.clone();
                        match nested.parse_expression() {
                            Ok(expr) => parts.push(StringPart::Expr(expr)),
                            Err(_) => parts.push(StringPart::Literal(format!("{{{}}}", expr_src))),
                        }
                    }
                    Err(_) => parts.push(StringPart::Literal(format!("{{{}}}", expr_src))),
                }
            } else {
                literal.push(c);
            }
        }
        if !literal.is_empty() {
            parts.push(StringPart::Literal(literal));
        }
        if parts.is_empty() {
            parts.push(StringPart::Literal(String::new()));
        }
        let _ = line;
        parts
    }
}

pub fn parse(tokens: Vec<Token>) -> PResult<(Program, Vec<ParseWarning>)> {
    Parser::new(tokens).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_src(src: &str) -> PResult<(Program, Vec<ParseWarning>)> {
        parse(tokenize(src).unwrap())
    }

    #[test]
    fn parses_let_and_expression_statement() {
        let (program, _) = parse_src("let x = 1\nlog x\n").unwrap();
        assert_eq!(program.statements.len(), 2);
    }

    #[test]
    fn undefined_variable_is_a_parse_error() {
        assert!(parse_src("log y\n").is_err());
    }

    #[test]
    fn redeclaration_in_same_scope_is_rejected() {
        assert!(parse_src("let x = 1\nlet x = 2\n").is_err());
    }

    /// Assigning to an undeclared name must fail with the dedicated
    /// "assignment to undeclared variable" diagnostic (§4.2's VR-001
    /// exemption for assignment targets), not the generic
    /// "use of undefined variable" read-path error.
    #[test]
    fn assignment_to_undeclared_variable_gets_its_own_diagnostic() {
        let err = parse_src("x = 5\n").unwrap_err();
        assert!(err.to_string().contains("assignment to undeclared variable"));
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        assert!(parse_src("break\n").is_err());
    }

    #[test]
    fn break_inside_while_is_accepted() {
        assert!(parse_src("while True:\n    break\n").is_ok());
    }

    #[test]
    fn function_params_are_scoped_to_body() {
        let (program, _) = parse_src("function add(a, b):\n    return a + b\n").unwrap();
        assert_eq!(program.statements.len(), 1);
    }

    #[test]
    fn if_elif_else_chain() {
        let (program, _) = parse_src("let x = 1\nif x == 1:\n    let a = 1\nelif x == 2:\n    let b = 2\nelse:\n    let c = 3\n").unwrap();
        match &program.statements[1] {
            Stmt::If { branches, else_branch, .. } => {
                assert_eq!(branches.len(), 2);
                assert!(else_branch.is_some());
            }
            _ => panic!("expected if statement"),
        }
    }

    #[test]
    fn unused_variable_produces_warning() {
        let (_, warnings) = parse_src("let x = 1\n").unwrap();
        assert!(!warnings.is_empty());
    }

    #[test]
    fn reading_a_variable_suppresses_the_unused_warning() {
        let (_, warnings) = parse_src("let x = 1\nlog x\n").unwrap();
        assert!(warnings.iter().all(|w| w.code.as_deref() != Some("VR-006")));
    }

    #[test]
    fn when_arm_supports_or_patterns_and_otherwise() {
        let (program, _) = parse_src(
            "let x = 1\nwhen x:\n    1 | 2:\n        let a = 1\n    otherwise:\n        let b = 2\n",
        )
        .unwrap();
        match &program.statements[1] {
            Stmt::When { arms, else_branch, .. } => {
                assert_eq!(arms[0].0.len(), 2);
                assert!(else_branch.is_some());
            }
            _ => panic!("expected when statement"),
        }
    }

    #[test]
    fn export_wraps_const_declaration() {
        let (program, _) = parse_src("export const ANSWER = 42\n").unwrap();
        match &program.statements[0] {
            Stmt::Export { target, .. } => assert!(matches!(**target, Stmt::Const { .. })),
            _ => panic!("expected export statement"),
        }
    }

    #[test]
    fn import_selective_form_registers_each_name() {
        let (program, _) = parse_src("from \"helpers\" import add, subtract\n").unwrap();
        match &program.statements[0] {
            Stmt::Import { names, alias, .. } => {
                assert_eq!(names, &vec!["add".to_string(), "subtract".to_string()]);
                assert!(alias.is_none());
            }
            _ => panic!("expected import statement"),
        }
    }

    #[test]
    fn import_alias_form_registers_module_symbol() {
        let (program, _) = parse_src("import helpers from \"helpers\"\n").unwrap();
        match &program.statements[0] {
            Stmt::Import { alias, .. } => assert_eq!(alias.as_deref(), Some("helpers")),
            _ => panic!("expected import statement"),
        }
    }

    #[test]
    fn exit_with_code_and_message() {
        let (program, _) = parse_src("exit 1, \"failed\"\n").unwrap();
        match &program.statements[0] {
            Stmt::Exit { code, message, .. } => {
                assert!(code.is_some());
                assert!(message.is_some());
            }
            _ => panic!("expected exit statement"),
        }
    }

    #[test]
    fn log_defaults_to_info_level() {
        let (program, _) = parse_src("log \"hello\"\n").unwrap();
        match &program.statements[0] {
            Stmt::Log { level, .. } => assert_eq!(level, "info"),
            _ => panic!("expected log statement"),
        }
    }

    #[test]
    fn log_accepts_explicit_level() {
        let (program, _) = parse_src("log warning \"careful\"\n").unwrap();
        match &program.statements[0] {
            Stmt::Log { level, .. } => assert_eq!(level, "warning"),
            _ => panic!("expected log statement"),
        }
    }

    #[test]
    fn power_operator_is_right_associative() {
        let (program, _) = parse_src("let x = 2 ** 3 ** 2\n").unwrap();
        match &program.statements[0] {
            Stmt::Let { value: Expr::BinaryOp { op: BinOp::Pow, right, .. }, .. } => {
                assert!(matches!(**right, Expr::BinaryOp { op: BinOp::Pow, .. }));
            }
            _ => panic!("expected power expression"),
        }
    }

    #[test]
    fn floor_division_is_distinct_from_division() {
        let (program, _) = parse_src("let x = 7 // 2\n").unwrap();
        match &program.statements[0] {
            Stmt::Let { value: Expr::BinaryOp { op, .. }, .. } => assert_eq!(*op, BinOp::FloorDiv),
            _ => panic!("expected floor-division expression"),
        }
    }

    #[test]
    fn input_expression_parses_default_and_type_kwargs() {
        let (program, _) = parse_src("let x = input(\"Age?\", default: 0, type: \"integer\")\n").unwrap();
        match &program.statements[0] {
            Stmt::Let { value: Expr::Input { default, type_tag, .. }, .. } => {
                assert!(default.is_some());
                assert_eq!(type_tag.as_deref(), Some("integer"));
            }
            _ => panic!("expected input expression"),
        }
    }

    #[test]
    fn action_statement_parses_as_generic_verb_with_kwargs() {
        let (program, _) = parse_src("click \"#submit\"\n").unwrap();
        match &program.statements[0] {
            Stmt::Action { verb, .. } => assert_eq!(verb, "click"),
            _ => panic!("expected action statement"),
        }
    }
}
