// ABOUTME: The random namespace — non-cryptographic randomness for scripts

use super::{arg, as_f64};
use crate::error::RuntimeError;
use crate::value::Value;
use rand::Rng;

pub fn call(member: &str, args: &[Value], line: u32) -> Result<Value, RuntimeError> {
    match member {
        "int" => {
            let lo = as_f64(arg(args, 0, "random.int", line)?, "random.int", line)? as i64;
            let hi = as_f64(arg(args, 1, "random.int", line)?, "random.int", line)? as i64;
            if lo > hi {
                return Err(RuntimeError::runtime(format!("random.int: lower bound {} exceeds upper bound {}", lo, hi), line));
            }
            Ok(Value::Integer(rand::thread_rng().gen_range(lo..=hi)))
        }
        "float" => Ok(Value::Float(rand::thread_rng().gen_range(0.0..1.0))),
        "boolean" => Ok(Value::Bool(rand::thread_rng().gen_bool(0.5))),
        "choice" => {
            let list = arg(args, 0, "random.choice", line)?;
            match list {
                Value::List(items) => {
                    let items = items.borrow();
                    if items.is_empty() {
                        return Err(RuntimeError::runtime("random.choice: list is empty", line));
                    }
                    let idx = rand::thread_rng().gen_range(0..items.len());
                    Ok(items[idx].clone())
                }
                other => Err(RuntimeError::type_error("random.choice", "list", other.type_name(), line)),
            }
        }
        other => Err(RuntimeError::ModuleError {
            message: format!("random has no member '{}'", other),
            line,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_stays_within_bounds() {
        for _ in 0..20 {
            match call("int", &[Value::Integer(1), Value::Integer(3)], 1).unwrap() {
                Value::Integer(n) => assert!((1..=3).contains(&n)),
                _ => panic!("expected integer"),
            }
        }
    }

    #[test]
    fn choice_rejects_empty_list() {
        assert!(call("choice", &[Value::new_list(vec![])], 1).is_err());
    }

    #[test]
    fn boolean_returns_a_bool() {
        match call("boolean", &[], 1).unwrap() {
            Value::Bool(_) => {}
            _ => panic!("expected bool"),
        }
    }
}
