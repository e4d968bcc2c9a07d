// ABOUTME: Runtime value types produced and consumed by the Flowby evaluator

use crate::ast::Expr;
use crate::symbol_table::SymbolTableStack;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A function closure captured at `function` definition time.
///
/// `closure_scope` is the scope stack snapshot the function body executes
/// against, re-entered by pushing a fresh call scope on top of it rather
/// than on top of the caller's scope. This is what makes closures see the
/// variables that were in scope where they were defined.
#[derive(Debug, Clone)]
pub struct FunctionValue {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Rc<Vec<crate::ast::Stmt>>,
    pub closure_scope: SymbolTableStack,
    pub source_file: Option<String>,
}

/// A loaded module's exported bindings, kept alive for the lifetime of the
/// program so re-imports hit the cache rather than re-executing the file.
#[derive(Debug)]
pub struct ModuleRecord {
    pub library_name: String,
    pub path: std::path::PathBuf,
    pub exports: RefCell<IndexMap<String, Value>>,
}

/// An opaque value handed back by a host capability (a browser handle, an
/// open resource spec, a diagnosis context). The evaluator never inspects
/// the contents; it only stores, passes, and displays it.
pub trait HostObject: fmt::Debug {
    fn type_tag(&self) -> &str;

    /// `Some(namespace)` for the sentinel bound to a bare namespace
    /// identifier (`Math`, `JSON`, ...), so the evaluator can route a
    /// following `.method(...)` to `Host::call_builtin_namespace` instead of
    /// `Host::call_resource_operation`. Every other host object — resource
    /// handles the host itself produced via `Resource(...)` — leaves this
    /// as `None`.
    fn as_namespace(&self) -> Option<&str> {
        None
    }
}

/// A lambda literal (`(params) => expr`), captured at the point it is
/// written rather than at `function` definition. Single-expression body
/// only, per the grammar — no `return`/statements inside.
#[derive(Debug, Clone)]
pub struct LambdaValue {
    pub params: Vec<String>,
    pub body: Rc<Expr>,
    pub closure_scope: SymbolTableStack,
}

/// Namespace handle bound to bare identifiers like `Math`/`JSON`/`http`, so
/// `Math.abs(x)` resolves through the ordinary member/call dispatch path
/// instead of needing a dedicated `Value` variant per namespace.
#[derive(Debug, Clone)]
pub struct NamespaceHandle(pub String);

impl HostObject for NamespaceHandle {
    fn type_tag(&self) -> &str {
        "namespace"
    }

    fn as_namespace(&self) -> Option<&str> {
        Some(&self.0)
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Null,
    List(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<IndexMap<String, Value>>>),
    Function(Rc<FunctionValue>),
    Lambda(Rc<LambdaValue>),
    Module(Rc<ModuleRecord>),
    /// Evaluator-native function bound into a scope (namespace methods,
    /// string/list/object methods) — not user-callable by name, only
    /// reachable via member/method dispatch.
    NativeFunction(Rc<NativeFunction>),
    HostObject(Rc<dyn HostObject>),
}

pub struct NativeFunction {
    pub name: String,
    pub func: Box<dyn Fn(&[Value]) -> Result<Value, crate::error::RuntimeError>>,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native {}>", self.name)
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::String(_) => "string",
            Value::Null => "null",
            Value::List(_) => "list",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Lambda(_) => "function",
            Value::Module(_) => "module",
            Value::NativeFunction(_) => "function",
            Value::HostObject(_) => "host_object",
        }
    }

    /// Flowby truthiness: `false`, `null`, `0`, `0.0`, `""`, empty list and
    /// empty object are falsy; everything else truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Null => false,
            Value::Integer(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Object(map) => !map.borrow().is_empty(),
            _ => true,
        }
    }

    pub fn new_list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn new_object(map: IndexMap<String, Value>) -> Value {
        Value::Object(Rc::new(RefCell::new(map)))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Bool(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{}", s),
            Value::Null => write!(f, "null"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item.repr())?;
                }
                write!(f, "]")
            }
            Value::Object(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value.repr())?;
                }
                write!(f, "}}")
            }
            Value::Function(func) => {
                write!(f, "<function {}>", func.name.as_deref().unwrap_or("anonymous"))
            }
            Value::Lambda(_) => write!(f, "<function anonymous>"),
            Value::Module(m) => write!(f, "<module {}>", m.library_name),
            Value::NativeFunction(n) => write!(f, "<function {}>", n.name),
            Value::HostObject(h) => write!(f, "<{}>", h.type_tag()),
        }
    }
}

impl Value {
    /// Representation used when a value is nested inside a list/object
    /// display (strings keep their quotes, unlike top-level `print`).
    fn repr(&self) -> String {
        match self {
            Value::String(s) => format!("\"{}\"", s),
            other => other.to_string(),
        }
    }
}

/// Structural equality per the language's `==` semantics: numbers compare
/// by value across the int/float split, but booleans never compare equal
/// to numbers (the Open Question this spec resolves — see DESIGN.md).
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                *a as f64 == *b
            }
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::List(a), Value::List(b)) => *a.borrow() == *b.borrow(),
            (Value::Object(a), Value::Object(b)) => *a.borrow() == *b.borrow(),
            _ => false,
        }
    }
}

/// Marker type kept for signature clarity at call sites that accept a
/// pre-parsed expression body (lambda literals).
pub type ExprBody = Rc<Expr>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_and_float_display_differ() {
        assert_eq!(Value::Integer(42).to_string(), "42");
        assert_eq!(Value::Float(42.0).to_string(), "42.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
    }

    #[test]
    fn bool_and_number_are_never_equal() {
        assert!(Value::Bool(true) != Value::Integer(1));
        assert!(Value::Bool(false) != Value::Integer(0));
    }

    #[test]
    fn integer_and_float_compare_by_value() {
        assert_eq!(Value::Integer(3), Value::Float(3.0));
    }

    #[test]
    fn falsy_values() {
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Integer(0).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
        assert!(!Value::new_list(vec![]).is_truthy());
        assert!(!Value::new_object(IndexMap::new()).is_truthy());
        assert!(Value::new_list(vec![Value::Integer(0)]).is_truthy());
    }

    #[test]
    fn list_display_quotes_nested_strings() {
        let list = Value::new_list(vec![Value::String("a".into()), Value::Integer(1)]);
        assert_eq!(list.to_string(), "[\"a\", 1]");
    }
}
