// ABOUTME: Combined expression evaluator and statement interpreter for Flowby programs

use crate::ast::{BinOp, Expr, Program, Stmt, StringPart, UnOp};
use crate::builtins::{globals, methods};
use crate::error::RuntimeError;
use crate::host::Host;
use crate::module::ModuleLoader;
use crate::symbol_table::{SymbolKind, SymbolTableStack, BUILTIN_FUNCTION_NAMES, RESERVED_SYSTEM_NAMESPACES};
use crate::value::{FunctionValue, LambdaValue, NamespaceHandle, Value};
use indexmap::IndexMap;
use regex::Regex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Namespaces dispatched through `Host::call_builtin_namespace` (§4.3): the
/// rest of `RESERVED_SYSTEM_NAMESPACES` resolves through
/// `Host::resolve_system` as a plain value instead.
const CALL_NAMESPACES: &[&str] = &["Math", "Date", "JSON", "UUID", "Hash", "Base64", "random", "http"];

/// Safety valve for `while` loops that never terminate (§4.6).
pub const MAX_LOOP_ITERATIONS: u64 = 100_000;

/// How a statement or block finished executing.
#[derive(Debug, Clone)]
pub enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

/// `exit code, msg` stops the whole program, not just the current call —
/// it rides the same `?`-propagated channel as a genuine `RuntimeError` so
/// it unwinds through every intermediate frame without special-casing each
/// call site.
#[derive(Debug, Clone)]
pub enum ExecError {
    Runtime(RuntimeError),
    Exit(i32, Option<String>),
}

impl From<RuntimeError> for ExecError {
    fn from(e: RuntimeError) -> Self {
        ExecError::Runtime(e)
    }
}

type EResult<T> = Result<T, ExecError>;

/// Walks a parsed `Program`, evaluating expressions and executing
/// statements against a runtime scope stack that starts fresh (the
/// parser's own stack, used only for static validation, is discarded once
/// parsing finishes).
pub struct Interpreter<'h> {
    host: &'h dyn Host,
    module_loader: Rc<ModuleLoader>,
    scopes: SymbolTableStack,
    call_stack: Vec<String>,
}

impl<'h> Interpreter<'h> {
    pub fn new(host: &'h dyn Host, module_loader: Rc<ModuleLoader>) -> Self {
        Interpreter {
            host,
            module_loader,
            scopes: SymbolTableStack::new(),
            call_stack: Vec::new(),
        }
    }

    /// Reads a top-level binding after `run_program` returns. Used by
    /// embedders that need a script's result without wrapping it in an
    /// explicit `export`.
    pub fn get_var(&self, name: &str) -> Option<Value> {
        self.scopes.get(name)
    }

    pub fn run_program(&mut self, program: &Program) -> EResult<()> {
        self.exec_block(&program.statements)?;
        Ok(())
    }

    // ----- statements ----------------------------------------------------

    fn exec_block(&mut self, stmts: &[Stmt]) -> EResult<Flow> {
        for stmt in stmts {
            match self.exec_stmt(stmt)? {
                Flow::Normal => continue,
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> EResult<Flow> {
        match stmt {
            Stmt::Let { name, value, line } => {
                let v = self.eval_expr(value)?;
                self.scopes.define(name, v, SymbolKind::Variable, *line)?;
                Ok(Flow::Normal)
            }
            Stmt::Const { name, value, line } => {
                let v = self.eval_expr(value)?;
                self.scopes.define(name, v, SymbolKind::Constant, *line)?;
                Ok(Flow::Normal)
            }
            Stmt::Assign { target, value, line } => {
                let name = match target {
                    Expr::Identifier(name, _) => name,
                    other => return Err(RuntimeError::runtime(format!("invalid assignment target {:?}", other), *line).into()),
                };
                let v = self.eval_expr(value)?;
                self.scopes.set(name, v, *line)?;
                Ok(Flow::Normal)
            }
            Stmt::ExprStmt(expr) => {
                self.eval_expr(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::If { branches, else_branch, .. } => {
                for (cond, body) in branches {
                    if self.eval_expr(cond)?.is_truthy() {
                        return self.exec_scoped_block("if", body);
                    }
                }
                match else_branch {
                    Some(body) => self.exec_scoped_block("else", body),
                    None => Ok(Flow::Normal),
                }
            }
            Stmt::When { subject, arms, else_branch, .. } => {
                let subject_val = self.eval_expr(subject)?;
                for (patterns, body) in arms {
                    let mut matched = false;
                    for pattern in patterns {
                        if self.eval_expr(pattern)? == subject_val {
                            matched = true;
                            break;
                        }
                    }
                    if matched {
                        return self.exec_scoped_block("when-arm", body);
                    }
                }
                match else_branch {
                    Some(body) => self.exec_scoped_block("otherwise", body),
                    None => Ok(Flow::Normal),
                }
            }
            Stmt::While { condition, body, line } => {
                let mut iterations: u64 = 0;
                loop {
                    if !self.eval_expr(condition)?.is_truthy() {
                        break;
                    }
                    match self.exec_scoped_block("while", body)? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                    }
                    iterations += 1;
                    if iterations >= MAX_LOOP_ITERATIONS {
                        return Err(RuntimeError::InfiniteLoopDetected {
                            max: MAX_LOOP_ITERATIONS,
                            line: *line,
                        }
                        .into());
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::For { vars, iterable, body, line } => {
                let items = self.iterable_items(iterable)?;
                for item in items {
                    self.scopes.enter_scope("for");
                    let bind_result = self.bind_for_vars(vars, item, *line);
                    let flow = match bind_result {
                        Ok(()) => self.exec_block(body),
                        Err(e) => {
                            self.scopes.exit_scope().ok();
                            return Err(e);
                        }
                    };
                    self.scopes.exit_scope().ok();
                    match flow? {
                        Flow::Break => break,
                        Flow::Continue | Flow::Normal => {}
                        Flow::Return(v) => return Ok(Flow::Return(v)),
                    }
                }
                Ok(Flow::Normal)
            }
            Stmt::FunctionDef { name, params, body, line } => {
                let func = Value::Function(Rc::new(FunctionValue {
                    name: Some(name.clone()),
                    params: params.clone(),
                    body: body.clone(),
                    closure_scope: self.scopes.clone(),
                    source_file: None,
                }));
                self.scopes.define(name, func, SymbolKind::Function, *line)?;
                Ok(Flow::Normal)
            }
            Stmt::Return { value, .. } => {
                let v = match value {
                    Some(e) => self.eval_expr(e)?,
                    None => Value::Null,
                };
                Ok(Flow::Return(v))
            }
            Stmt::Break { .. } => Ok(Flow::Break),
            Stmt::Continue { .. } => Ok(Flow::Continue),
            Stmt::Assert { condition, message, line } => {
                if self.eval_expr(condition)?.is_truthy() {
                    return Ok(Flow::Normal);
                }
                let message = match message {
                    Some(e) => self.eval_expr(e)?.to_string(),
                    None => "assertion failed".to_string(),
                };
                Err(RuntimeError::ActionError { message, line: *line }.into())
            }
            Stmt::Exit { code, message, line } => {
                let code_val = match code {
                    Some(e) => self.eval_expr(e)?,
                    None => Value::Integer(0),
                };
                let raw_code = match code_val {
                    Value::Integer(n) => n,
                    Value::Float(n) => n as i64,
                    other => return Err(RuntimeError::type_error("exit", "number", other.type_name(), *line).into()),
                };
                let code = raw_code.clamp(0, 255) as i32;
                let message = match message {
                    Some(e) => Some(self.eval_expr(e)?.to_string()),
                    None => None,
                };
                Err(ExecError::Exit(code, message))
            }
            Stmt::Log { level, message, .. } => {
                let text = self.eval_expr(message)?.to_string();
                match level.as_str() {
                    "debug" => tracing::debug!("{}", text),
                    "success" => tracing::info!(outcome = "success", "{}", text),
                    "warning" => tracing::warn!("{}", text),
                    "error" => tracing::error!("{}", text),
                    _ => tracing::info!("{}", text),
                }
                Ok(Flow::Normal)
            }
            Stmt::Step { name, body, diagnosis: _, guard, .. } => {
                if let Some(guard) = guard {
                    if !self.eval_expr(guard)?.is_truthy() {
                        return Ok(Flow::Normal);
                    }
                }
                if let Some(name) = name {
                    tracing::info!(step = %name, "entering step");
                }
                self.exec_scoped_block("step", body)
            }
            Stmt::Library { .. } => Ok(Flow::Normal),
            Stmt::Export { target, .. } => self.exec_stmt(target),
            Stmt::Import { path, alias, names, line } => {
                self.exec_import(path, alias.as_deref(), names, *line)?;
                Ok(Flow::Normal)
            }
            Stmt::Action { verb, args, kwargs, line } => {
                let mut all = self.eval_exprs(args)?;
                let kwarg_vals = self.eval_kwargs(kwargs)?;
                if !kwarg_vals.is_empty() {
                    all.push(Value::new_object(kwarg_vals));
                }
                self.host.perform_action(verb, &all, *line)?;
                Ok(Flow::Normal)
            }
        }
    }

    fn exec_scoped_block(&mut self, scope_name: &str, body: &[Stmt]) -> EResult<Flow> {
        self.scopes.enter_scope(scope_name);
        let flow = self.exec_block(body);
        self.scopes.exit_scope().ok();
        flow
    }

    fn iterable_items(&mut self, expr: &Expr) -> EResult<Vec<Value>> {
        let line = expr.line();
        match self.eval_expr(expr)? {
            Value::List(items) => Ok(items.borrow().clone()),
            Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
            other => Err(RuntimeError::type_error("for", "list or string", other.type_name(), line).into()),
        }
    }

    fn bind_for_vars(&mut self, vars: &[String], item: Value, line: u32) -> EResult<()> {
        if vars.len() == 1 {
            self.scopes.define(&vars[0], item, SymbolKind::LoopVariable, line)?;
            return Ok(());
        }
        let elems = match item {
            Value::List(items) => items.borrow().clone(),
            other => {
                return Err(RuntimeError::runtime(
                    format!("for loop expected a {}-element list to unpack, got {}", vars.len(), other.type_name()),
                    line,
                )
                .into())
            }
        };
        if elems.len() != vars.len() {
            return Err(RuntimeError::runtime(
                format!("for loop expected {} values to unpack, got {}", vars.len(), elems.len()),
                line,
            )
            .into());
        }
        for (name, val) in vars.iter().zip(elems.into_iter()) {
            self.scopes.define(name, val, SymbolKind::LoopVariable, line)?;
        }
        Ok(())
    }

    // ----- module imports --------------------------------------------------

    fn exec_import(&mut self, path: &str, alias: Option<&str>, names: &[String], line: u32) -> EResult<()> {
        let resolved = self.module_loader.resolve_path(path, line)?;
        let host = self.host;
        let loader_for_closure = self.module_loader.clone();

        let record = self.module_loader.load(&resolved, line, move |source, file_path| {
            let tokens = crate::lexer::tokenize(source).map_err(|e| RuntimeError::ModuleError {
                message: e.to_string(),
                line: e.line,
            })?;
            let (program, _warnings) = crate::parser::parse(tokens).map_err(|e| RuntimeError::ModuleError {
                message: e.to_string(),
                line: e.line,
            })?;
            let mut sub = Interpreter::new(host, loader_for_closure.clone());
            match sub.run_program(&program) {
                Ok(()) => {}
                Err(ExecError::Runtime(e)) => return Err(e),
                Err(ExecError::Exit(code, message)) => {
                    return Err(RuntimeError::ModuleError {
                        message: format!(
                            "module '{}' called exit({}){} — exit inside an imported module is reported, not propagated",
                            file_path.display(),
                            code,
                            message.map(|m| format!(": {}", m)).unwrap_or_default()
                        ),
                        line,
                    })
                }
            }
            let mut exports = HashMap::new();
            collect_exports(&program.statements, &sub.scopes, &mut exports);
            Ok((program.library.clone(), program.statements, exports))
        })?;

        match alias {
            Some(alias) => {
                self.scopes.define(alias, Value::Module(record), SymbolKind::Module, line)?;
            }
            None => {
                for name in names {
                    let value = record.exports.borrow().get(name).cloned().ok_or_else(|| RuntimeError::ModuleError {
                        message: format!("module '{}' has no export named '{}'", record.library_name, name),
                        line,
                    })?;
                    self.scopes.define(name, value, SymbolKind::Imported, line)?;
                }
            }
        }
        Ok(())
    }

    // ----- expressions ---------------------------------------------------

    fn eval_expr(&mut self, expr: &Expr) -> EResult<Value> {
        match expr {
            Expr::IntegerLit(n) => Ok(Value::Integer(*n)),
            Expr::FloatLit(n) => Ok(Value::Float(*n)),
            Expr::StringLit(s) => Ok(Value::String(s.clone())),
            Expr::BoolLit(b) => Ok(Value::Bool(*b)),
            Expr::NullLit => Ok(Value::Null),
            Expr::Identifier(name, line) => self.eval_identifier(name, *line),
            Expr::InterpolatedString(parts, _) => self.eval_interpolated(parts),
            Expr::ListLit(items, _) => Ok(Value::new_list(self.eval_exprs(items)?)),
            Expr::ObjectLit(pairs, _) => {
                let mut map = IndexMap::new();
                for (key, value) in pairs {
                    let v = self.eval_expr(value)?;
                    map.insert(key.clone(), v);
                }
                Ok(Value::new_object(map))
            }
            Expr::Lambda { params, body, .. } => Ok(Value::Lambda(Rc::new(LambdaValue {
                params: params.clone(),
                body: Rc::new((**body).clone()),
                closure_scope: self.scopes.clone(),
            }))),
            Expr::BinaryOp { op, left, right, line } => self.eval_binop(op, left, right, *line),
            Expr::UnaryOp { op, operand, line } => self.eval_unop(op, operand, *line),
            Expr::Member { object, name, line } => {
                let obj = self.eval_expr(object)?;
                eval_member(&obj, name, *line).map_err(Into::into)
            }
            Expr::Index { object, index, line } => {
                let obj = self.eval_expr(object)?;
                let idx = self.eval_expr(index)?;
                eval_index(&obj, &idx, *line).map_err(Into::into)
            }
            Expr::Call { callee, args, kwargs, line } => self.eval_call(callee, args, kwargs, *line),
            Expr::MethodCall { receiver, method, args, kwargs, line } => {
                self.eval_method_call(receiver, method, args, kwargs, *line)
            }
            Expr::Input { prompt, default, type_tag, line } => self.eval_input(prompt, default, type_tag, *line),
        }
    }

    fn eval_exprs(&mut self, exprs: &[Expr]) -> EResult<Vec<Value>> {
        exprs.iter().map(|e| self.eval_expr(e)).collect()
    }

    fn eval_kwargs(&mut self, kwargs: &[(String, Expr)]) -> EResult<IndexMap<String, Value>> {
        let mut out = IndexMap::new();
        for (key, value) in kwargs {
            let v = self.eval_expr(value)?;
            out.insert(key.clone(), v);
        }
        Ok(out)
    }

    fn eval_identifier(&mut self, name: &str, line: u32) -> EResult<Value> {
        if let Some(v) = self.scopes.get(name) {
            return Ok(v);
        }
        if CALL_NAMESPACES.contains(&name) {
            return Ok(Value::HostObject(Rc::new(NamespaceHandle(name.to_string()))));
        }
        if RESERVED_SYSTEM_NAMESPACES.contains(&name) {
            return Ok(self.host.resolve_system(name, line)?);
        }
        if BUILTIN_FUNCTION_NAMES.contains(&name) {
            return Err(RuntimeError::runtime(
                format!("'{}' is a built-in function and must be called, not used as a value", name),
                line,
            )
            .into());
        }
        Err(RuntimeError::VariableNotFound { name: name.to_string(), line }.into())
    }

    fn eval_interpolated(&mut self, parts: &[StringPart]) -> EResult<Value> {
        let mut out = String::new();
        for part in parts {
            match part {
                StringPart::Literal(s) => out.push_str(s),
                StringPart::Expr(e) => out.push_str(&self.eval_expr(e)?.to_string()),
            }
        }
        Ok(Value::String(out))
    }

    fn eval_binop(&mut self, op: &BinOp, left: &Expr, right: &Expr, line: u32) -> EResult<Value> {
        match op {
            BinOp::And => {
                let l = self.eval_expr(left)?;
                if !l.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                let r = self.eval_expr(right)?;
                Ok(Value::Bool(r.is_truthy()))
            }
            BinOp::Or => {
                let l = self.eval_expr(left)?;
                if l.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                let r = self.eval_expr(right)?;
                Ok(Value::Bool(r.is_truthy()))
            }
            _ => {
                let l = self.eval_expr(left)?;
                let r = self.eval_expr(right)?;
                eval_binop_values(op, &l, &r, line).map_err(Into::into)
            }
        }
    }

    fn eval_unop(&mut self, op: &UnOp, operand: &Expr, line: u32) -> EResult<Value> {
        let v = self.eval_expr(operand)?;
        match op {
            UnOp::Not => Ok(Value::Bool(!v.is_truthy())),
            UnOp::Neg => match numeric_of(&v) {
                Some((true, n)) => Ok(Value::Float(-n)),
                Some((false, n)) => Ok(Value::Integer(-(n as i64))),
                None => Err(RuntimeError::type_error("-", "number", v.type_name(), line).into()),
            },
            UnOp::Pos => match numeric_of(&v) {
                Some((true, n)) => Ok(Value::Float(n)),
                Some((false, n)) => Ok(Value::Integer(n as i64)),
                None => Err(RuntimeError::type_error("+", "number", v.type_name(), line).into()),
            },
        }
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], kwargs: &[(String, Expr)], line: u32) -> EResult<Value> {
        if let Expr::Identifier(name, _) = callee {
            if !self.scopes.exists(name) {
                match name.as_str() {
                    "env" => return self.eval_env_call(args, kwargs, line),
                    "Resource" => return self.eval_resource_call(args, line),
                    _ if BUILTIN_FUNCTION_NAMES.contains(&name.as_str()) => {
                        let arg_vals = self.eval_exprs(args)?;
                        return globals::call(name, &arg_vals, line).map_err(Into::into);
                    }
                    _ => {}
                }
            }
        }
        let callee_val = self.eval_expr(callee)?;
        let arg_vals = self.eval_exprs(args)?;
        let kwarg_vals = self.eval_kwargs(kwargs)?;
        self.call_value(&callee_val, arg_vals, kwarg_vals, line)
    }

    fn eval_env_call(&mut self, args: &[Expr], kwargs: &[(String, Expr)], line: u32) -> EResult<Value> {
        let arg_vals = self.eval_exprs(args)?;
        let name = match arg_vals.first() {
            Some(Value::String(s)) => s.clone(),
            Some(other) => return Err(RuntimeError::type_error("env", "string", other.type_name(), line).into()),
            None => return Err(RuntimeError::arity_error("env", "1-2", arg_vals.len(), line).into()),
        };
        let positional_default = arg_vals.get(1).cloned();
        let default = match positional_default {
            Some(v) => Some(v),
            None => self.eval_kwargs(kwargs)?.shift_remove("default"),
        };
        match self.host.env_lookup(&name) {
            Some(v) => Ok(Value::String(v)),
            None => default.ok_or_else(|| RuntimeError::runtime(format!("environment variable '{}' is not set", name), line).into()),
        }
    }

    fn eval_resource_call(&mut self, args: &[Expr], line: u32) -> EResult<Value> {
        let arg_vals = self.eval_exprs(args)?;
        let name = match arg_vals.first() {
            Some(Value::String(s)) => s.clone(),
            Some(other) => return Err(RuntimeError::type_error("Resource", "string", other.type_name(), line).into()),
            None => return Err(RuntimeError::arity_error("Resource", "1", arg_vals.len(), line).into()),
        };
        Ok(self.host.open_spec(&name, line)?)
    }

    fn eval_method_call(
        &mut self,
        receiver: &Expr,
        method: &str,
        args: &[Expr],
        kwargs: &[(String, Expr)],
        line: u32,
    ) -> EResult<Value> {
        let recv = self.eval_expr(receiver)?;
        match &recv {
            Value::HostObject(h) => {
                if let Some(namespace) = h.as_namespace() {
                    let arg_vals = self.eval_exprs(args)?;
                    Ok(self.host.call_builtin_namespace(namespace, method, &arg_vals, line)?)
                } else {
                    let arg_vals = self.eval_exprs(args)?;
                    let kwarg_vals = self.eval_kwargs(kwargs)?;
                    Ok(self.host.call_resource_operation(&recv, method, &arg_vals, &kwarg_vals, line)?)
                }
            }
            Value::Module(m) => {
                let func = m.exports.borrow().get(method).cloned().ok_or_else(|| RuntimeError::ModuleError {
                    message: format!("module '{}' has no export '{}'", m.library_name, method),
                    line,
                })?;
                let arg_vals = self.eval_exprs(args)?;
                let kwarg_vals = self.eval_kwargs(kwargs)?;
                self.call_value(&func, arg_vals, kwarg_vals, line)
            }
            Value::List(items) => self.call_list_method(items.clone(), method, args, line),
            Value::String(s) => {
                let s = s.clone();
                let arg_vals = self.eval_exprs(args)?;
                methods::call_string_method(&s, method, &arg_vals, line).map_err(Into::into)
            }
            Value::Object(map) => {
                let arg_vals = self.eval_exprs(args)?;
                let map = map.borrow();
                methods::call_object_method(&map, method, &arg_vals, line).map_err(Into::into)
            }
            other => Err(RuntimeError::runtime(format!("{} has no method '{}'", other.type_name(), method), line).into()),
        }
    }

    fn call_list_method(&mut self, items: Rc<RefCell<Vec<Value>>>, method: &str, args: &[Expr], line: u32) -> EResult<Value> {
        match method {
            "push" => {
                let value = self.eval_expr(args.first().ok_or_else(|| RuntimeError::arity_error("push", "1", 0, line))?)?;
                items.borrow_mut().push(value);
                Ok(Value::Null)
            }
            "pop" => {
                let requested = match args.first() {
                    Some(e) => match self.eval_expr(e)? {
                        Value::Integer(n) => n,
                        other => return Err(RuntimeError::type_error("pop", "integer", other.type_name(), line).into()),
                    },
                    None => -1,
                };
                let mut list = items.borrow_mut();
                if list.is_empty() {
                    return Err(RuntimeError::runtime("pop() called on an empty list", line).into());
                }
                let len = list.len() as i64;
                let index = if requested < 0 { len + requested } else { requested };
                if index < 0 || index >= len {
                    return Err(RuntimeError::runtime(format!("pop index {} out of range", requested), line).into());
                }
                Ok(list.remove(index as usize))
            }
            "filter" | "map" => {
                let callback = self.eval_expr(args.first().ok_or_else(|| RuntimeError::arity_error(method, "1", 0, line))?)?;
                let snapshot = items.borrow().clone();
                let mut out = Vec::with_capacity(snapshot.len());
                for item in snapshot {
                    let result = self.call_value(&callback, vec![item.clone()], IndexMap::new(), line)?;
                    if method == "filter" {
                        if result.is_truthy() {
                            out.push(item);
                        }
                    } else {
                        out.push(result);
                    }
                }
                Ok(Value::new_list(out))
            }
            "reduce" => {
                let callback = self.eval_expr(args.first().ok_or_else(|| RuntimeError::arity_error("reduce", "2", 0, line))?)?;
                let mut acc = self.eval_expr(args.get(1).ok_or_else(|| RuntimeError::arity_error("reduce", "2", 1, line))?)?;
                let snapshot = items.borrow().clone();
                for item in snapshot {
                    acc = self.call_value(&callback, vec![acc, item], IndexMap::new(), line)?;
                }
                Ok(acc)
            }
            other => {
                let arg_vals = self.eval_exprs(args)?;
                let items = items.borrow();
                methods::call_list_method(&items, other, &arg_vals, line).map_err(Into::into)
            }
        }
    }

    fn eval_input(
        &mut self,
        prompt: &Option<Box<Expr>>,
        default: &Option<Box<Expr>>,
        type_tag: &Option<String>,
        line: u32,
    ) -> EResult<Value> {
        let prompt_str = match prompt {
            Some(e) => Some(self.eval_expr(e)?.to_string()),
            None => None,
        };
        let default_val = match default {
            Some(e) => Some(self.eval_expr(e)?),
            None => None,
        };
        let raw = match self.host.read_input(prompt_str.as_deref(), line) {
            Ok(s) => s,
            Err(e) => {
                return match default_val {
                    Some(v) => Ok(v),
                    None => Err(e.into()),
                }
            }
        };
        match type_tag.as_deref().unwrap_or("text") {
            "integer" => raw
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| RuntimeError::runtime(format!("input(): '{}' is not a valid integer", raw), line).into()),
            "float" => raw
                .trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| RuntimeError::runtime(format!("input(): '{}' is not a valid float", raw), line).into()),
            "text" | "password" => Ok(Value::String(raw)),
            other => Err(RuntimeError::runtime(format!("input(): unknown type '{}'", other), line).into()),
        }
    }

    // ----- calling functions/lambdas --------------------------------------

    fn call_value(&mut self, callee: &Value, args: Vec<Value>, kwargs: IndexMap<String, Value>, line: u32) -> EResult<Value> {
        match callee {
            Value::Function(f) => self.call_function(f.clone(), args, kwargs, line),
            Value::Lambda(l) => {
                if !kwargs.is_empty() {
                    return Err(RuntimeError::runtime("lambdas do not accept keyword arguments", line).into());
                }
                self.call_lambda(l.clone(), args, line)
            }
            Value::NativeFunction(native) => (native.func)(&args).map_err(Into::into),
            other => Err(RuntimeError::type_error("call", "function", other.type_name(), line).into()),
        }
    }

    /// The function-call protocol, §4.5: arity/recursion checks, a call
    /// scope parented on the closure rather than the caller, parameter
    /// binding, body execution, and unwinding back to the caller's scope
    /// whether or not the body errored.
    fn call_function(&mut self, f: Rc<FunctionValue>, args: Vec<Value>, kwargs: IndexMap<String, Value>, line: u32) -> EResult<Value> {
        let name = f.name.clone().unwrap_or_else(|| "<anonymous>".to_string());
        let bound = bind_params(&f.params, args, kwargs, &name, line)?;

        if self.call_stack.contains(&name) {
            return Err(RuntimeError::runtime(format!("recursive call to '{}' is not supported", name), line).into());
        }
        self.call_stack.push(name.clone());

        // A call scope parents on the function's *closure* scope, not the
        // caller's — this is what makes a library's functions see the
        // library's own top-level consts regardless of who calls them.
        self.scopes
            .enter_scope_with_parent(&format!("call:{}", name), f.closure_scope.current());
        let bind_result = (|| -> EResult<()> {
            for (param, value) in f.params.iter().zip(bound.into_iter()) {
                self.scopes.define(param, value, SymbolKind::Parameter, line)?;
            }
            Ok(())
        })();

        let result = match bind_result {
            Ok(()) => self.exec_block(&f.body),
            Err(e) => Err(e),
        };

        self.scopes.exit_scope().ok();
        self.call_stack.pop();

        match result? {
            Flow::Return(v) => Ok(v),
            Flow::Normal => Ok(Value::Null),
            Flow::Break | Flow::Continue => Err(RuntimeError::runtime("'break'/'continue' used outside of a loop", line).into()),
        }
    }

    fn call_lambda(&mut self, l: Rc<LambdaValue>, args: Vec<Value>, line: u32) -> EResult<Value> {
        if args.len() != l.params.len() {
            return Err(RuntimeError::arity_error("<lambda>", l.params.len().to_string(), args.len(), line).into());
        }
        self.scopes.enter_scope_with_parent("lambda", l.closure_scope.current());
        let bind_result = (|| -> EResult<()> {
            for (param, value) in l.params.iter().zip(args.into_iter()) {
                self.scopes.define(param, value, SymbolKind::Parameter, line)?;
            }
            Ok(())
        })();
        let result = match bind_result {
            Ok(()) => self.eval_expr(&l.body),
            Err(e) => Err(e),
        };
        self.scopes.exit_scope().ok();
        result
    }
}

/// Merges positional and keyword arguments against a parameter list in
/// declaration order (Flowby functions have no `*args`/`**kwargs`).
fn bind_params(
    params: &[String],
    args: Vec<Value>,
    kwargs: IndexMap<String, Value>,
    name: &str,
    line: u32,
) -> Result<Vec<Value>, RuntimeError> {
    if args.len() > params.len() {
        return Err(RuntimeError::arity_error(name, params.len().to_string(), args.len(), line));
    }
    let mut bound: Vec<Option<Value>> = args.into_iter().map(Some).collect();
    bound.resize_with(params.len(), || None);

    for (key, value) in kwargs {
        let idx = params
            .iter()
            .position(|p| *p == key)
            .ok_or_else(|| RuntimeError::runtime(format!("{}: no parameter named '{}'", name, key), line))?;
        if bound[idx].is_some() {
            return Err(RuntimeError::runtime(format!("{}: parameter '{}' supplied twice", name, key), line));
        }
        bound[idx] = Some(value);
    }

    bound
        .into_iter()
        .enumerate()
        .map(|(i, v)| v.ok_or_else(|| RuntimeError::arity_error(name, params.len().to_string(), i, line)))
        .collect()
}

fn export_name(stmt: &Stmt) -> Option<&str> {
    match stmt {
        Stmt::Const { name, .. } => Some(name),
        Stmt::FunctionDef { name, .. } => Some(name),
        _ => None,
    }
}

/// After a module's top-level statements have executed, copies each
/// `export`ed name's current value out of the module's (still-live) scope
/// so the record can be cached independently of that scope (§4.7 step 7).
fn collect_exports(stmts: &[Stmt], scopes: &SymbolTableStack, out: &mut HashMap<String, Value>) {
    for stmt in stmts {
        if let Stmt::Export { target, .. } = stmt {
            if let Some(name) = export_name(target) {
                if let Some(value) = scopes.get(name) {
                    out.insert(name.to_string(), value);
                }
            }
        }
    }
}

fn eval_member(obj: &Value, name: &str, line: u32) -> Result<Value, RuntimeError> {
    match obj {
        Value::Object(map) => map
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::runtime(format!("object has no key '{}'", name), line)),
        Value::List(items) if name == "length" => Ok(Value::Integer(items.borrow().len() as i64)),
        Value::String(s) if name == "length" => Ok(Value::Integer(s.chars().count() as i64)),
        Value::Module(m) => m.exports.borrow().get(name).cloned().ok_or_else(|| RuntimeError::ModuleError {
            message: format!("module '{}' has no export '{}'", m.library_name, name),
            line,
        }),
        other => Err(RuntimeError::runtime(format!("{} has no member '{}'", other.type_name(), name), line)),
    }
}

fn eval_index(obj: &Value, index: &Value, line: u32) -> Result<Value, RuntimeError> {
    match obj {
        Value::List(items) => {
            let items = items.borrow();
            let i = index_to_usize(index, items.len(), line)?;
            Ok(items[i].clone())
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = index_to_usize(index, chars.len(), line)?;
            Ok(Value::String(chars[i].to_string()))
        }
        Value::Object(map) => match index {
            Value::String(key) => map
                .borrow()
                .get(key)
                .cloned()
                .ok_or_else(|| RuntimeError::runtime(format!("object has no key '{}'", key), line)),
            other => Err(RuntimeError::type_error("index", "string key", other.type_name(), line)),
        },
        other => Err(RuntimeError::type_error("index", "list, string or object", other.type_name(), line)),
    }
}

fn index_to_usize(index: &Value, len: usize, line: u32) -> Result<usize, RuntimeError> {
    let n = match index {
        Value::Integer(n) => *n,
        other => return Err(RuntimeError::type_error("index", "integer", other.type_name(), line)),
    };
    if n < 0 || n as usize >= len {
        return Err(RuntimeError::runtime(format!("index {} out of range (length {})", n, len), line));
    }
    Ok(n as usize)
}

/// `(is_float, value)` for the three kinds that participate in numeric
/// contexts — booleans count as 0/1 per the data model (§3.3).
fn numeric_of(v: &Value) -> Option<(bool, f64)> {
    match v {
        Value::Integer(n) => Some((false, *n as f64)),
        Value::Float(n) => Some((true, *n)),
        Value::Bool(b) => Some((false, if *b { 1.0 } else { 0.0 })),
        _ => None,
    }
}

fn eval_binop_values(op: &BinOp, l: &Value, r: &Value, line: u32) -> Result<Value, RuntimeError> {
    match op {
        BinOp::Add => add_values(l, r, line),
        BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::FloorDiv | BinOp::Mod | BinOp::Pow => arithmetic(op, l, r, line),
        BinOp::Eq | BinOp::Equals => Ok(Value::Bool(l == r)),
        BinOp::NotEq => Ok(Value::Bool(l != r)),
        BinOp::Lt | BinOp::Gt | BinOp::LtEq | BinOp::GtEq => ordering(op, l, r, line),
        BinOp::Contains => contains(l, r, line),
        BinOp::Matches => matches_op(l, r, line),
        BinOp::And | BinOp::Or => unreachable!("short-circuit ops are handled in eval_binop before reaching values"),
    }
}

/// `+` is overloaded (§4.4): string concatenation (stringifying the other
/// side) wins over list concatenation, which wins over numeric addition.
fn add_values(l: &Value, r: &Value, line: u32) -> Result<Value, RuntimeError> {
    match (l, r) {
        (Value::String(_), _) | (_, Value::String(_)) => Ok(Value::String(format!("{}{}", l, r))),
        (Value::List(a), Value::List(b)) => {
            let mut out = a.borrow().clone();
            out.extend(b.borrow().iter().cloned());
            Ok(Value::new_list(out))
        }
        _ => match (numeric_of(l), numeric_of(r)) {
            (Some((lf, lv)), Some((rf, rv))) => Ok(if lf || rf {
                Value::Float(lv + rv)
            } else {
                Value::Integer(lv as i64 + rv as i64)
            }),
            _ => {
                let actual = format!("{} and {}", l.type_name(), r.type_name());
                Err(RuntimeError::type_error("+", "string, list or number", &actual, line))
            }
        },
    }
}

fn arithmetic(op: &BinOp, l: &Value, r: &Value, line: u32) -> Result<Value, RuntimeError> {
    let (lf, lv) = numeric_of(l).ok_or_else(|| RuntimeError::type_error("arithmetic", "number", l.type_name(), line))?;
    let (rf, rv) = numeric_of(r).ok_or_else(|| RuntimeError::type_error("arithmetic", "number", r.type_name(), line))?;
    match op {
        BinOp::Sub => Ok(if lf || rf { Value::Float(lv - rv) } else { Value::Integer(lv as i64 - rv as i64) }),
        BinOp::Mul => Ok(if lf || rf { Value::Float(lv * rv) } else { Value::Integer(lv as i64 * rv as i64) }),
        BinOp::Div => {
            if rv == 0.0 {
                return Err(RuntimeError::runtime("division by zero", line));
            }
            Ok(Value::Float(lv / rv))
        }
        BinOp::FloorDiv => {
            if rv == 0.0 {
                return Err(RuntimeError::runtime("division by zero", line));
            }
            let floored = (lv / rv).floor();
            Ok(if lf || rf { Value::Float(floored) } else { Value::Integer(floored as i64) })
        }
        BinOp::Mod => {
            if rv == 0.0 {
                return Err(RuntimeError::runtime("modulo by zero", line));
            }
            // Always returns an (explicitly truncated) integer, per §4.4,
            // regardless of whether either operand was a float.
            let remainder = lv - (lv / rv).floor() * rv;
            Ok(Value::Integer(remainder.trunc() as i64))
        }
        BinOp::Pow => {
            if !lf && !rf && rv >= 0.0 {
                let base = lv as i64;
                let exp = rv as u32;
                base.checked_pow(exp)
                    .map(Value::Integer)
                    .ok_or_else(|| RuntimeError::runtime("exponent overflowed integer range", line))
            } else {
                Ok(Value::Float(lv.powf(rv)))
            }
        }
        _ => unreachable!(),
    }
}

fn ordering(op: &BinOp, l: &Value, r: &Value, line: u32) -> Result<Value, RuntimeError> {
    let (_, lv) = numeric_of(l).ok_or_else(|| RuntimeError::type_error("comparison", "number", l.type_name(), line))?;
    let (_, rv) = numeric_of(r).ok_or_else(|| RuntimeError::type_error("comparison", "number", r.type_name(), line))?;
    let result = match op {
        BinOp::Lt => lv < rv,
        BinOp::Gt => lv > rv,
        BinOp::LtEq => lv <= rv,
        BinOp::GtEq => lv >= rv,
        _ => unreachable!(),
    };
    Ok(Value::Bool(result))
}

fn contains(l: &Value, r: &Value, line: u32) -> Result<Value, RuntimeError> {
    match l {
        Value::String(s) => Ok(Value::Bool(s.contains(&r.to_string()))),
        Value::List(items) => Ok(Value::Bool(items.borrow().iter().any(|item| item == r))),
        Value::HostObject(_) => Ok(Value::Bool(l.to_string().contains(&r.to_string()))),
        other => Err(RuntimeError::type_error("contains", "string or list", other.type_name(), line)),
    }
}

fn matches_op(l: &Value, r: &Value, line: u32) -> Result<Value, RuntimeError> {
    let pattern = match r {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let re = Regex::new(&pattern).map_err(|e| RuntimeError::runtime(format!("invalid regex '{}': {}", pattern, e), line))?;
    Ok(Value::Bool(re.is_match(&l.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FsConfig, NetConfig};
    use crate::host::DefaultHost;
    use crate::sandbox::Sandbox;
    use std::path::PathBuf;

    fn run(src: &str) -> Result<Interpreter<'static>, ExecError> {
        let tokens = crate::lexer::tokenize(src).unwrap();
        let (program, _warnings) = crate::parser::parse(tokens).unwrap();
        let host: &'static DefaultHost = Box::leak(Box::new(DefaultHost::new(
            Sandbox::new(FsConfig::default(), NetConfig::default()).unwrap(),
            false,
        )));
        let loader = Rc::new(ModuleLoader::new(PathBuf::from(".")));
        let mut interp = Interpreter::new(host, loader);
        interp.run_program(&program)?;
        Ok(interp)
    }

    fn get(interp: &Interpreter, name: &str) -> Value {
        interp.scopes.get(name).unwrap_or_else(|| panic!("'{}' was never bound", name))
    }

    #[test]
    fn arithmetic_promotes_to_float_only_for_true_division() {
        let interp = run("let x = 3\nlet y = 2\nlet a = x / y\nlet b = x // y\nlet c = x % y\n").unwrap();
        assert_eq!(get(&interp, "x"), Value::Integer(3));
        assert_eq!(get(&interp, "y"), Value::Integer(2));
        assert_eq!(get(&interp, "a"), Value::Float(1.5));
        assert_eq!(get(&interp, "b"), Value::Integer(1));
        assert_eq!(get(&interp, "c"), Value::Integer(1));
    }

    #[test]
    fn string_interpolation_evaluates_embedded_expressions() {
        let interp = run("let name = \"Alice\"\nlet age = 30\nlet msg = f\"Hello {name}, age {age + 1}\"\n").unwrap();
        assert_eq!(get(&interp, "msg"), Value::String("Hello Alice, age 31".to_string()));
    }

    #[test]
    fn shadowing_inside_if_does_not_leak_out() {
        let src = "let x = 1\nif x == 1:\n    let x = 2\n    let inner = x\nlet outer = x\n";
        let interp = run(src).unwrap();
        assert_eq!(get(&interp, "inner"), Value::Integer(2));
        assert_eq!(get(&interp, "outer"), Value::Integer(1));
    }

    #[test]
    fn assert_failure_reports_action_error_with_evaluated_message() {
        let src = "let n = 3\nassert n > 5, f\"n={n} must be larger\"\n";
        match run(src) {
            Err(ExecError::Runtime(RuntimeError::ActionError { message, .. })) => {
                assert_eq!(message, "n=3 must be larger");
            }
            other => panic!("expected ActionError, got {:?}", other),
        }
    }

    #[test]
    fn higher_order_list_methods_chain() {
        let src = "let xs = [1, 2, 3, 4]\nlet evens = xs.filter(x => x % 2 == 0).map(x => x * 10)\n";
        let interp = run(src).unwrap();
        assert_eq!(get(&interp, "evens"), Value::new_list(vec![Value::Integer(20), Value::Integer(40)]));
    }

    #[test]
    fn exit_statement_propagates_as_exec_error() {
        match run("exit 2, \"bye\"\n") {
            Err(ExecError::Exit(2, Some(msg))) => assert_eq!(msg, "bye"),
            other => panic!("expected Exit(2, Some(\"bye\")), got {:?}", other),
        }
    }

    #[test]
    fn for_loop_sums_a_list() {
        let src = "let total = 0\nfor n in [1, 2, 3]:\n    total = total + n\n";
        let interp = run(src).unwrap();
        assert_eq!(get(&interp, "total"), Value::Integer(6));
    }

    #[test]
    fn for_loop_over_a_non_iterable_reports_the_iterable_expressions_own_line() {
        let src = "let x = 5\nfor n in x:\n    log n\n";
        match run(src) {
            Err(ExecError::Runtime(RuntimeError::TypeError { line, .. })) => assert_eq!(line, 2),
            other => panic!("expected a TypeError, got {:?}", other),
        }
    }

    #[test]
    fn while_loop_respects_break_and_continue() {
        let src = "let i = 0\nlet total = 0\nwhile i < 10:\n    i = i + 1\n    if i == 5:\n        continue\n    if i == 8:\n        break\n    total = total + i\n";
        let interp = run(src).unwrap();
        assert_eq!(get(&interp, "total"), Value::Integer(1 + 2 + 3 + 4 + 6 + 7));
    }

    #[test]
    fn contains_stringifies_a_host_object() {
        let handle = Value::HostObject(Rc::new(NamespaceHandle("Math".to_string())));
        let result = contains(&handle, &Value::String("Mat".to_string()), 1).unwrap();
        assert_eq!(result, Value::Bool(true));
    }

    #[test]
    fn recursive_call_is_rejected() {
        let src = "function fact(n):\n    return fact(n)\nlet result = fact(3)\n";
        match run(src) {
            Err(ExecError::Runtime(RuntimeError::Runtime { message, .. })) => {
                assert!(message.contains("recursive"));
            }
            other => panic!("expected a recursion error, got {:?}", other),
        }
    }
}
