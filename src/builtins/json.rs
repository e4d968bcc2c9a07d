// ABOUTME: The JSON namespace — encode/decode between Flowby values and JSON text

use super::as_str;
use crate::error::RuntimeError;
use crate::value::Value;
use indexmap::IndexMap;

pub fn call(member: &str, args: &[Value], line: u32) -> Result<Value, RuntimeError> {
    match member {
        "stringify" | "encode" => {
            let value = args.get(0).ok_or_else(|| RuntimeError::arity_error("JSON.stringify", "1", args.len(), line))?;
            let json = to_json(value);
            serde_json::to_string(&json)
                .map(Value::String)
                .map_err(|e| RuntimeError::runtime(format!("JSON.stringify failed: {}", e), line))
        }
        "parse" | "decode" => {
            let text = as_str(args.get(0).ok_or_else(|| RuntimeError::arity_error("JSON.parse", "1", args.len(), line))?, "JSON.parse", line)?;
            let parsed: serde_json::Value =
                serde_json::from_str(text).map_err(|e| RuntimeError::runtime(format!("invalid JSON: {}", e), line))?;
            Ok(from_json(&parsed))
        }
        other => Err(RuntimeError::ModuleError {
            message: format!("JSON has no member '{}'", other),
            line,
        }),
    }
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Integer(n) => serde_json::Value::from(*n),
        Value::Float(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Null => serde_json::Value::Null,
        Value::List(items) => serde_json::Value::Array(items.borrow().iter().map(to_json).collect()),
        Value::Object(map) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in map.borrow().iter() {
                obj.insert(k.clone(), to_json(v));
            }
            serde_json::Value::Object(obj)
        }
        other => serde_json::Value::String(other.to_string()),
    }
}

/// A JSON number with no fractional part round-trips to `Integer`, matching
/// how the rest of the language treats integer/float as distinct types.
fn from_json(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::new_list(items.iter().map(from_json).collect()),
        serde_json::Value::Object(map) => {
            let mut out = IndexMap::new();
            for (k, v) in map {
                out.insert(k.clone(), from_json(v));
            }
            Value::new_object(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stringify_then_parse_round_trips_integers() {
        let list = Value::new_list(vec![Value::Integer(1), Value::Integer(2)]);
        let text = call("stringify", &[list], 1).unwrap();
        let Value::String(s) = text else { panic!("expected string") };
        let parsed = call("parse", &[Value::String(s)], 1).unwrap();
        assert_eq!(parsed, Value::new_list(vec![Value::Integer(1), Value::Integer(2)]));
    }

    #[test]
    fn parse_whole_number_yields_integer_not_float() {
        let parsed = call("parse", &[Value::String("42".to_string())], 1).unwrap();
        assert_eq!(parsed, Value::Integer(42));
    }

    #[test]
    fn parse_object_preserves_keys() {
        let parsed = call("parse", &[Value::String(r#"{"a": 1, "b": 2}"#.to_string())], 1).unwrap();
        match parsed {
            Value::Object(map) => {
                let map = map.borrow();
                assert_eq!(map.get("a"), Some(&Value::Integer(1)));
            }
            _ => panic!("expected object"),
        }
    }
}
