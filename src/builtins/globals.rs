// ABOUTME: Global bare-callable builtins (int/float/str/bool/len/range/...) and bare string methods

use super::{arg, as_str};
use crate::error::RuntimeError;
use crate::value::Value;

/// The "to number" coercion (§4.4): booleans are 1/0, numeric strings parse,
/// anything else is a `TypeError`. Shared by `int`/`float`/`isNaN`/`isFinite`.
pub fn to_number(value: &Value, func: &str, line: u32) -> Result<f64, RuntimeError> {
    match value {
        Value::Integer(n) => Ok(*n as f64),
        Value::Float(n) => Ok(*n),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| RuntimeError::type_error(func, "number or numeric string", value.type_name(), line)),
        other => Err(RuntimeError::type_error(func, "number or numeric string", other.type_name(), line)),
    }
}

/// Dispatches every name in `BUILTIN_FUNCTION_NAMES` except `env`, `Resource`
/// and `input`, which the evaluator special-cases before reaching here (they
/// need host access or lazily-evaluated arguments the other builtins don't).
pub fn call(name: &str, args: &[Value], line: u32) -> Result<Value, RuntimeError> {
    match name {
        "int" => {
            let v = arg(args, 0, "int", line)?;
            Ok(Value::Integer(to_number(v, "int", line)?.trunc() as i64))
        }
        "float" => Ok(Value::Float(to_number(arg(args, 0, "float", line)?, "float", line)?)),
        "str" => Ok(Value::String(arg(args, 0, "str", line)?.to_string())),
        "bool" => Ok(Value::Bool(arg(args, 0, "bool", line)?.is_truthy())),
        "len" => match arg(args, 0, "len", line)? {
            Value::String(s) => Ok(Value::Integer(s.chars().count() as i64)),
            Value::List(items) => Ok(Value::Integer(items.borrow().len() as i64)),
            Value::Object(map) => Ok(Value::Integer(map.borrow().len() as i64)),
            other => Err(RuntimeError::type_error("len", "string, list or object", other.type_name(), line)),
        },
        "range" => range(args, line),
        "enumerate" => enumerate(args, line),
        "isNaN" => {
            // Coercion failure means "not a number" just as surely as an
            // actual NaN float does, so it counts as true here rather than
            // propagating a TypeError.
            Ok(Value::Bool(to_number(arg(args, 0, "isNaN", line)?, "isNaN", line).map(|n| n.is_nan()).unwrap_or(true)))
        }
        "isFinite" => Ok(Value::Bool(to_number(arg(args, 0, "isFinite", line)?, "isFinite", line)?.is_finite())),
        "upper" | "lower" | "strip" | "split" | "join" | "replace" | "substring" | "startswith" | "endswith" | "find" => {
            let s = as_str(arg(args, 0, name, line)?, name, line)?;
            super::methods::call_string_method(s, name, &args[1..], line)
        }
        other => Err(RuntimeError::Runtime {
            message: format!("'{}' is not a callable builtin", other),
            line,
        }),
    }
}

fn range(args: &[Value], line: u32) -> Result<Value, RuntimeError> {
    let as_i64 = |v: &Value| to_number(v, "range", line).map(|f| f as i64);
    let (start, stop, step) = match args.len() {
        1 => (0, as_i64(&args[0])?, 1),
        2 => (as_i64(&args[0])?, as_i64(&args[1])?, 1),
        3 => (as_i64(&args[0])?, as_i64(&args[1])?, as_i64(&args[2])?),
        n => return Err(RuntimeError::arity_error("range", "1-3", n, line)),
    };
    if step == 0 {
        return Err(RuntimeError::runtime("range: step cannot be 0", line));
    }
    let mut out = Vec::new();
    let mut i = start;
    if step > 0 {
        while i < stop {
            out.push(Value::Integer(i));
            i += step;
        }
    } else {
        while i > stop {
            out.push(Value::Integer(i));
            i += step;
        }
    }
    Ok(Value::new_list(out))
}

fn enumerate(args: &[Value], line: u32) -> Result<Value, RuntimeError> {
    let list = match arg(args, 0, "enumerate", line)? {
        Value::List(items) => items.borrow().clone(),
        other => return Err(RuntimeError::type_error("enumerate", "list", other.type_name(), line)),
    };
    let start = match args.get(1) {
        Some(v) => to_number(v, "enumerate", line)? as i64,
        None => 0,
    };
    let out = list
        .into_iter()
        .enumerate()
        .map(|(i, item)| Value::new_list(vec![Value::Integer(start + i as i64), item]))
        .collect();
    Ok(Value::new_list(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_with_single_arg_starts_at_zero() {
        let result = range(&[Value::Integer(3)], 1).unwrap();
        assert_eq!(result, Value::new_list(vec![Value::Integer(0), Value::Integer(1), Value::Integer(2)]));
    }

    #[test]
    fn range_supports_negative_step() {
        let result = range(&[Value::Integer(3), Value::Integer(0), Value::Integer(-1)], 1).unwrap();
        assert_eq!(result, Value::new_list(vec![Value::Integer(3), Value::Integer(2), Value::Integer(1)]));
    }

    #[test]
    fn enumerate_pairs_index_with_item() {
        let list = Value::new_list(vec![Value::String("a".into()), Value::String("b".into())]);
        let result = enumerate(&[list], 1).unwrap();
        assert_eq!(
            result,
            Value::new_list(vec![
                Value::new_list(vec![Value::Integer(0), Value::String("a".into())]),
                Value::new_list(vec![Value::Integer(1), Value::String("b".into())]),
            ])
        );
    }

    #[test]
    fn is_nan_is_false_for_ordinary_numbers() {
        assert_eq!(call("isNaN", &[Value::Integer(4)], 1).unwrap(), Value::Bool(false));
    }

    #[test]
    fn bool_coerces_booleans_as_truthy_rule() {
        assert_eq!(call("bool", &[Value::Integer(0)], 1).unwrap(), Value::Bool(false));
        assert_eq!(call("bool", &[Value::String("x".into())], 1).unwrap(), Value::Bool(true));
    }
}
