// ABOUTME: Scope stack tracking variable/function bindings and their mutability

use crate::error::RuntimeError;
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Names the host is expected to populate before a program runs; user code
/// may never `let`/`const` over them.
pub const RESERVED_SYSTEM_NAMESPACES: &[&str] = &[
    "page", "context", "browser", "env", "config", "response", "Math", "Date", "JSON", "UUID",
    "Hash", "Base64", "random", "http",
];

/// Host-provided global functions (§4.2 VR-001 exemption: "host-provided
/// built-in function ... names"). Recognized by the parser without a prior
/// declaration, same as the namespace names above. Includes both the
/// always-global set (§4.4 "Global") and the string-method names §4.4's
/// "Function call without receiver" paragraph also allows bare (e.g.
/// `upper(s)` alongside `s.upper()`).
pub const BUILTIN_FUNCTION_NAMES: &[&str] = &[
    "int", "float", "str", "bool", "len", "range", "enumerate", "isNaN", "isFinite", "env",
    "Resource", "input", "upper", "lower", "strip", "split", "join", "replace", "substring",
    "startswith", "endswith", "find",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Constant,
    System,
    Function,
    LoopVariable,
    Parameter,
    Module,
    Imported,
}

impl SymbolKind {
    pub fn is_mutable(&self) -> bool {
        matches!(
            self,
            SymbolKind::Variable | SymbolKind::LoopVariable | SymbolKind::Parameter
        )
    }
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub value: Value,
    pub kind: SymbolKind,
    pub defining_line: u32,
    pub used: Rc<Cell<bool>>,
}

impl Symbol {
    pub fn new(name: String, value: Value, kind: SymbolKind, line: u32) -> Self {
        Symbol {
            name,
            value,
            kind,
            defining_line: line,
            used: Rc::new(Cell::new(false)),
        }
    }

    pub fn mark_used(&self) {
        self.used.set(true);
    }
}

#[derive(Debug)]
struct ScopeInner {
    symbols: RefCell<HashMap<String, Symbol>>,
    parent: Option<Rc<ScopeInner>>,
    name: String,
}

/// A single lexical scope. Cheap to clone (it's a reference-counted
/// pointer), which is what lets closures capture "the scope as it existed
/// at definition time" by holding onto an `Rc<ScopeInner>` chain.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    inner: Rc<ScopeInner>,
}

impl SymbolTable {
    fn new_root(name: &str) -> Self {
        SymbolTable {
            inner: Rc::new(ScopeInner {
                symbols: RefCell::new(HashMap::new()),
                parent: None,
                name: name.to_string(),
            }),
        }
    }

    fn child(&self, name: &str) -> Self {
        SymbolTable {
            inner: Rc::new(ScopeInner {
                symbols: RefCell::new(HashMap::new()),
                parent: Some(self.inner.clone()),
                name: name.to_string(),
            }),
        }
    }

    pub fn scope_name(&self) -> &str {
        &self.inner.name
    }

    /// Defines `name` in THIS scope. Rejects redefinition of a name already
    /// present in this exact scope, and rejects shadowing a reserved
    /// system namespace anywhere.
    pub fn define(&self, name: &str, value: Value, kind: SymbolKind, line: u32) -> Result<(), RuntimeError> {
        if RESERVED_SYSTEM_NAMESPACES.contains(&name) {
            return Err(RuntimeError::InvalidState {
                message: format!("'{}' is a reserved name and cannot be redefined", name),
                line,
            });
        }
        if self.inner.symbols.borrow().contains_key(name) {
            return Err(RuntimeError::InvalidState {
                message: format!("'{}' is already defined in this scope", name),
                line,
            });
        }
        self.inner
            .symbols
            .borrow_mut()
            .insert(name.to_string(), Symbol::new(name.to_string(), value, kind, line));
        Ok(())
    }

    pub fn exists_in_current_scope(&self, name: &str) -> bool {
        self.inner.symbols.borrow().contains_key(name)
    }

    /// Walks the parent chain for `name`'s `(kind, defining_line)`, used by
    /// the parser to enforce VR-002/VR-004 without fetching the value.
    pub fn kind_of(&self, name: &str) -> Option<(SymbolKind, u32)> {
        if let Some(sym) = self.inner.symbols.borrow().get(name) {
            return Some((sym.kind, sym.defining_line));
        }
        match &self.inner.parent {
            Some(parent) => SymbolTable { inner: parent.clone() }.kind_of(name),
            None => None,
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        if self.inner.symbols.borrow().contains_key(name) {
            return true;
        }
        match &self.inner.parent {
            Some(parent) => SymbolTable { inner: parent.clone() }.exists(name),
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(sym) = self.inner.symbols.borrow().get(name) {
            sym.mark_used();
            return Some(sym.value.clone());
        }
        match &self.inner.parent {
            Some(parent) => SymbolTable { inner: parent.clone() }.get(name),
            None => None,
        }
    }

    /// Walks the parent chain to find `name`, checks it is mutable, then
    /// overwrites its value in the scope that owns it.
    pub fn set(&self, name: &str, value: Value, line: u32) -> Result<(), RuntimeError> {
        if self.inner.symbols.borrow().contains_key(name) {
            let mut symbols = self.inner.symbols.borrow_mut();
            let sym = symbols.get_mut(name).unwrap();
            if !sym.kind.is_mutable() {
                return Err(RuntimeError::InvalidState {
                    message: format!("cannot assign to '{}' ({:?} is immutable)", name, sym.kind),
                    line,
                });
            }
            sym.value = value;
            sym.mark_used();
            return Ok(());
        }
        match &self.inner.parent {
            Some(parent) => SymbolTable { inner: parent.clone() }.set(name, value, line),
            None => Err(RuntimeError::VariableNotFound {
                name: name.to_string(),
                line,
            }),
        }
    }

    /// Outermost-scope-wins flattening used for the unused-variable pass:
    /// a name shadowed in an inner scope should only be reported once, for
    /// whichever definition is actually still live.
    fn collect_into(&self, out: &mut HashMap<String, Symbol>) {
        if let Some(parent) = &self.inner.parent {
            SymbolTable { inner: parent.clone() }.collect_into(out);
        }
        for (name, sym) in self.inner.symbols.borrow().iter() {
            out.insert(name.clone(), sym.clone());
        }
    }
}

/// The parser's live view of nested scopes. `enter_scope` pushes a child of
/// the current top; `enter_scope_with_parent` pushes a child of an
/// explicit ancestor, which is how a function call scope parents itself on
/// the function's *closure* scope rather than the caller's scope.
#[derive(Debug, Clone)]
pub struct SymbolTableStack {
    stack: Vec<SymbolTable>,
}

impl SymbolTableStack {
    pub fn new() -> Self {
        SymbolTableStack {
            stack: vec![SymbolTable::new_root("global")],
        }
    }

    pub fn current(&self) -> &SymbolTable {
        self.stack.last().expect("symbol table stack is never empty")
    }

    pub fn enter_scope(&mut self, name: &str) {
        let child = self.current().child(name);
        self.stack.push(child);
    }

    pub fn enter_scope_with_parent(&mut self, name: &str, parent: &SymbolTable) {
        self.stack.push(parent.child(name));
    }

    pub fn exit_scope(&mut self) -> Result<(), RuntimeError> {
        if self.stack.len() <= 1 {
            return Err(RuntimeError::InvalidState {
                message: "cannot exit the global scope".to_string(),
                line: 0,
            });
        }
        self.stack.pop();
        Ok(())
    }

    pub fn scope_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn define(&self, name: &str, value: Value, kind: SymbolKind, line: u32) -> Result<(), RuntimeError> {
        self.current().define(name, value, kind, line)
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.current().get(name)
    }

    pub fn set(&self, name: &str, value: Value, line: u32) -> Result<(), RuntimeError> {
        self.current().set(name, value, line)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.current().exists(name)
    }

    pub fn exists_in_current_scope(&self, name: &str) -> bool {
        self.current().exists_in_current_scope(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<(SymbolKind, u32)> {
        self.current().kind_of(name)
    }

    pub fn get_all_symbols(&self) -> HashMap<String, Symbol> {
        let mut out = HashMap::new();
        self.current().collect_into(&mut out);
        out
    }
}

impl Default for SymbolTableStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_get_in_same_scope() {
        let stack = SymbolTableStack::new();
        stack.define("x", Value::Integer(42), SymbolKind::Variable, 1).unwrap();
        assert_eq!(stack.get("x"), Some(Value::Integer(42)));
    }

    #[test]
    fn redefinition_in_same_scope_is_rejected() {
        let stack = SymbolTableStack::new();
        stack.define("x", Value::Integer(1), SymbolKind::Variable, 1).unwrap();
        assert!(stack.define("x", Value::Integer(2), SymbolKind::Variable, 2).is_err());
    }

    #[test]
    fn child_scope_can_shadow_parent() {
        let mut stack = SymbolTableStack::new();
        stack.define("x", Value::Integer(1), SymbolKind::Variable, 1).unwrap();
        stack.enter_scope("block");
        stack.define("x", Value::Integer(2), SymbolKind::Variable, 2).unwrap();
        assert_eq!(stack.get("x"), Some(Value::Integer(2)));
        stack.exit_scope().unwrap();
        assert_eq!(stack.get("x"), Some(Value::Integer(1)));
    }

    #[test]
    fn set_requires_mutable_kind() {
        let stack = SymbolTableStack::new();
        stack
            .define("PI", Value::Float(3.14), SymbolKind::Constant, 1)
            .unwrap();
        assert!(stack.set("PI", Value::Float(3.0), 2).is_err());
    }

    #[test]
    fn set_walks_parent_chain() {
        let mut stack = SymbolTableStack::new();
        stack.define("x", Value::Integer(1), SymbolKind::Variable, 1).unwrap();
        stack.enter_scope("block");
        stack.set("x", Value::Integer(99), 2).unwrap();
        stack.exit_scope().unwrap();
        assert_eq!(stack.get("x"), Some(Value::Integer(99)));
    }

    #[test]
    fn reserved_namespace_cannot_be_defined() {
        let stack = SymbolTableStack::new();
        assert!(stack.define("Math", Value::Null, SymbolKind::Variable, 1).is_err());
    }

    #[test]
    fn cannot_exit_global_scope() {
        let mut stack = SymbolTableStack::new();
        assert!(stack.exit_scope().is_err());
    }
}
