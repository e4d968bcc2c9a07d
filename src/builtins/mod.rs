// ABOUTME: Builtin namespace implementations dispatched by the Host and the evaluator

pub mod base64_ns;
pub mod date;
pub mod globals;
pub mod hash;
pub mod http;
pub mod json;
pub mod math;
pub mod methods;
pub mod random_ns;
pub mod uuid_ns;

use crate::error::RuntimeError;
use crate::value::Value;

pub(crate) fn arg(args: &[Value], idx: usize, func: &str, line: u32) -> Result<&Value, RuntimeError> {
    args.get(idx)
        .ok_or_else(|| RuntimeError::arity_error(func, format!("at least {}", idx + 1), args.len(), line))
}

pub(crate) fn as_f64(value: &Value, func: &str, line: u32) -> Result<f64, RuntimeError> {
    match value {
        Value::Integer(n) => Ok(*n as f64),
        Value::Float(n) => Ok(*n),
        other => Err(RuntimeError::type_error(func, "number", other.type_name(), line)),
    }
}

pub(crate) fn as_str<'a>(value: &'a Value, func: &str, line: u32) -> Result<&'a str, RuntimeError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(RuntimeError::type_error(func, "string", other.type_name(), line)),
    }
}
