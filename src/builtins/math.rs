// ABOUTME: The Math namespace — pure numeric functions and constants

use super::{arg, as_f64};
use crate::error::RuntimeError;
use crate::value::Value;

pub fn call(member: &str, args: &[Value], line: u32) -> Result<Value, RuntimeError> {
    match member {
        "abs" => {
            let v = arg(args, 0, "Math.abs", line)?;
            match v {
                Value::Integer(n) => Ok(Value::Integer(n.abs())),
                Value::Float(n) => Ok(Value::Float(n.abs())),
                other => Err(RuntimeError::type_error("Math.abs", "number", other.type_name(), line)),
            }
        }
        "floor" => Ok(Value::Integer(as_f64(arg(args, 0, "Math.floor", line)?, "Math.floor", line)?.floor() as i64)),
        "ceil" => Ok(Value::Integer(as_f64(arg(args, 0, "Math.ceil", line)?, "Math.ceil", line)?.ceil() as i64)),
        "round" => Ok(Value::Integer(as_f64(arg(args, 0, "Math.round", line)?, "Math.round", line)?.round() as i64)),
        "sqrt" => Ok(Value::Float(as_f64(arg(args, 0, "Math.sqrt", line)?, "Math.sqrt", line)?.sqrt())),
        "pow" => {
            let base = as_f64(arg(args, 0, "Math.pow", line)?, "Math.pow", line)?;
            let exp = as_f64(arg(args, 1, "Math.pow", line)?, "Math.pow", line)?;
            Ok(Value::Float(base.powf(exp)))
        }
        "min" => {
            let a = as_f64(arg(args, 0, "Math.min", line)?, "Math.min", line)?;
            let b = as_f64(arg(args, 1, "Math.min", line)?, "Math.min", line)?;
            Ok(numeric_result(a.min(b), args))
        }
        "max" => {
            let a = as_f64(arg(args, 0, "Math.max", line)?, "Math.max", line)?;
            let b = as_f64(arg(args, 1, "Math.max", line)?, "Math.max", line)?;
            Ok(numeric_result(a.max(b), args))
        }
        "pi" => Ok(Value::Float(std::f64::consts::PI)),
        "e" => Ok(Value::Float(std::f64::consts::E)),
        // Routed through `random` so the whole crate draws from one
        // entropy source rather than each namespace seeding its own.
        "random" => super::random_ns::call("float", args, line),
        other => Err(RuntimeError::ModuleError {
            message: format!("Math has no member '{}'", other),
            line,
        }),
    }
}

/// min/max preserve Integer-ness when both operands were integers.
fn numeric_result(value: f64, args: &[Value]) -> Value {
    if args.iter().all(|v| matches!(v, Value::Integer(_))) {
        Value::Integer(value as i64)
    } else {
        Value::Float(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abs_preserves_integer_type() {
        assert_eq!(call("abs", &[Value::Integer(-5)], 1).unwrap(), Value::Integer(5));
    }

    #[test]
    fn sqrt_returns_float() {
        assert_eq!(call("sqrt", &[Value::Integer(9)], 1).unwrap(), Value::Float(3.0));
    }

    #[test]
    fn max_of_two_integers_stays_integer() {
        assert_eq!(call("max", &[Value::Integer(3), Value::Integer(7)], 1).unwrap(), Value::Integer(7));
    }

    #[test]
    fn random_returns_a_float_in_unit_range() {
        match call("random", &[], 1).unwrap() {
            Value::Float(n) => assert!((0.0..1.0).contains(&n)),
            other => panic!("expected float, got {:?}", other),
        }
    }
}
