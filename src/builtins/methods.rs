// ABOUTME: Built-in string/list/object method dispatch used by MethodCall evaluation
//
// Higher-order list methods (`map`/`filter`/`reduce`) need to call back into
// the evaluator to invoke a Flowby lambda, so they are NOT handled here —
// they're dispatched directly from interpreter.rs before falling through to
// this module.

use crate::error::RuntimeError;
use crate::value::Value;
use indexmap::IndexMap;

pub fn call_string_method(s: &str, method: &str, args: &[Value], line: u32) -> Result<Value, RuntimeError> {
    match method {
        "upper" => Ok(Value::String(s.to_uppercase())),
        "lower" => Ok(Value::String(s.to_lowercase())),
        "strip" => match string_arg(args, 0, "strip", line)? {
            Some(chars) => {
                let chars: Vec<char> = chars.chars().collect();
                Ok(Value::String(s.trim_matches(|c| chars.contains(&c)).to_string()))
            }
            None => Ok(Value::String(s.trim().to_string())),
        },
        "length" => Ok(Value::Integer(s.chars().count() as i64)),
        "split" => {
            let sep = string_arg(args, 0, "split", line)?;
            let sep = sep.as_deref().unwrap_or(" ");
            let max = int_arg(args, 1, "split", line)?;
            let parts: Vec<Value> = match (sep.is_empty(), max) {
                (true, None) => s.chars().map(|c| Value::String(c.to_string())).collect(),
                (true, Some(max)) => {
                    let chars: Vec<char> = s.chars().collect();
                    let max = max.max(0) as usize;
                    let mut out: Vec<Value> = chars.iter().take(max).map(|c| Value::String(c.to_string())).collect();
                    if chars.len() > max {
                        out.push(Value::String(chars[max..].iter().collect()));
                    }
                    out
                }
                (false, None) => s.split(sep).map(|part| Value::String(part.to_string())).collect(),
                (false, Some(max)) => {
                    let n = (max.max(0) as usize).saturating_add(1);
                    s.splitn(n, sep).map(|part| Value::String(part.to_string())).collect()
                }
            };
            Ok(Value::new_list(parts))
        }
        "replace" => {
            let from = string_arg(args, 0, "replace", line)?.unwrap_or_default();
            let to = string_arg(args, 1, "replace", line)?.unwrap_or_default();
            match int_arg(args, 2, "replace", line)? {
                Some(count) => Ok(Value::String(s.replacen(&from, &to, count.max(0) as usize))),
                None => Ok(Value::String(s.replace(&from, &to))),
            }
        }
        "substring" => {
            let chars: Vec<char> = s.chars().collect();
            let start = int_arg(args, 0, "substring", line)?.unwrap_or(0).max(0) as usize;
            let end = match int_arg(args, 1, "substring", line)? {
                Some(e) => (e.max(0) as usize).min(chars.len()),
                None => chars.len(),
            };
            let start = start.min(chars.len());
            let end = end.max(start);
            Ok(Value::String(chars[start..end].iter().collect()))
        }
        "startswith" => Ok(Value::Bool(s.starts_with(&string_arg(args, 0, "startswith", line)?.unwrap_or_default()))),
        "endswith" => Ok(Value::Bool(s.ends_with(&string_arg(args, 0, "endswith", line)?.unwrap_or_default()))),
        "contains" => Ok(Value::Bool(s.contains(&string_arg(args, 0, "contains", line)?.unwrap_or_default()))),
        "find" => {
            let needle = string_arg(args, 0, "find", line)?.unwrap_or_default();
            let start = int_arg(args, 1, "find", line)?.unwrap_or(0).max(0) as usize;
            let chars: Vec<char> = s.chars().collect();
            let start = start.min(chars.len());
            let tail: String = chars[start..].iter().collect();
            match tail.find(&needle) {
                Some(byte_idx) => Ok(Value::Integer((start + tail[..byte_idx].chars().count()) as i64)),
                None => Ok(Value::Integer(-1)),
            }
        }
        "tonumber" => s
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .or_else(|_| s.trim().parse::<f64>().map(Value::Float))
            .map_err(|_| RuntimeError::type_error("tonumber", "numeric string", s, line)),
        other => Err(RuntimeError::Runtime {
            message: format!("string has no method '{}'", other),
            line,
        }),
    }
}

pub fn call_list_method(items: &[Value], method: &str, args: &[Value], line: u32) -> Result<Value, RuntimeError> {
    match method {
        "length" => Ok(Value::Integer(items.len() as i64)),
        "contains" => {
            let needle = args.get(0).ok_or_else(|| RuntimeError::arity_error("contains", "1", args.len(), line))?;
            Ok(Value::Bool(items.contains(needle)))
        }
        "join" => {
            let sep = string_arg(args, 0, "join", line)?.unwrap_or_default();
            let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
            Ok(Value::String(parts.join(&sep)))
        }
        "reverse" => {
            let mut cloned = items.to_vec();
            cloned.reverse();
            Ok(Value::new_list(cloned))
        }
        "sort" => {
            let mut cloned = items.to_vec();
            cloned.sort_by(|a, b| compare_values(a, b));
            Ok(Value::new_list(cloned))
        }
        "first" => items.first().cloned().ok_or_else(|| RuntimeError::Runtime {
            message: "first() called on an empty list".to_string(),
            line,
        }),
        "last" => items.last().cloned().ok_or_else(|| RuntimeError::Runtime {
            message: "last() called on an empty list".to_string(),
            line,
        }),
        other => Err(RuntimeError::Runtime {
            message: format!("list has no method '{}'", other),
            line,
        }),
    }
}

pub fn call_object_method(map: &IndexMap<String, Value>, method: &str, args: &[Value], line: u32) -> Result<Value, RuntimeError> {
    match method {
        "keys" => Ok(Value::new_list(map.keys().map(|k| Value::String(k.clone())).collect())),
        "values" => Ok(Value::new_list(map.values().cloned().collect())),
        "has" => {
            let key = string_arg(args, 0, "has", line)?.ok_or_else(|| RuntimeError::arity_error("has", "1", args.len(), line))?;
            Ok(Value::Bool(map.contains_key(&key)))
        }
        "get" => {
            let key = string_arg(args, 0, "get", line)?.ok_or_else(|| RuntimeError::arity_error("get", "1", args.len(), line))?;
            Ok(map.get(&key).cloned().unwrap_or_else(|| {
                args.get(1).cloned().unwrap_or(Value::Null)
            }))
        }
        "length" => Ok(Value::Integer(map.len() as i64)),
        other => Err(RuntimeError::Runtime {
            message: format!("object has no method '{}'", other),
            line,
        }),
    }
}

fn string_arg(args: &[Value], idx: usize, method: &str, line: u32) -> Result<Option<String>, RuntimeError> {
    match args.get(idx) {
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(RuntimeError::type_error(method, "string", other.type_name(), line)),
        None => Ok(None),
    }
}

fn int_arg(args: &[Value], idx: usize, method: &str, line: u32) -> Result<Option<i64>, RuntimeError> {
    match args.get(idx) {
        Some(Value::Integer(n)) => Ok(Some(*n)),
        Some(Value::Float(n)) => Ok(Some(*n as i64)),
        Some(other) => Err(RuntimeError::type_error(method, "integer", other.type_name(), line)),
        None => Ok(None),
    }
}

fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_slices_by_char_index() {
        let result = call_string_method("hello world", "substring", &[Value::Integer(0), Value::Integer(5)], 1).unwrap();
        assert_eq!(result, Value::String("hello".to_string()));
    }

    #[test]
    fn split_on_empty_separator_splits_into_characters() {
        let result = call_string_method("abc", "split", &[Value::String(String::new())], 1).unwrap();
        assert_eq!(result, Value::new_list(vec![Value::String("a".into()), Value::String("b".into()), Value::String("c".into())]));
    }

    #[test]
    fn list_sort_orders_integers() {
        let items = vec![Value::Integer(3), Value::Integer(1), Value::Integer(2)];
        let result = call_list_method(&items, "sort", &[], 1).unwrap();
        assert_eq!(result, Value::new_list(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]));
    }

    #[test]
    fn object_get_falls_back_to_default() {
        let mut map = IndexMap::new();
        map.insert("a".to_string(), Value::Integer(1));
        let result = call_object_method(&map, "get", &[Value::String("missing".into()), Value::Integer(99)], 1).unwrap();
        assert_eq!(result, Value::Integer(99));
    }

    #[test]
    fn split_honors_max_splits() {
        let result = call_string_method(
            "a,b,c",
            "split",
            &[Value::String(",".into()), Value::Integer(1)],
            1,
        )
        .unwrap();
        assert_eq!(result, Value::new_list(vec![Value::String("a".into()), Value::String("b,c".into())]));
    }

    #[test]
    fn replace_honors_count() {
        let result = call_string_method(
            "aaaa",
            "replace",
            &[Value::String("a".into()), Value::String("b".into()), Value::Integer(2)],
            1,
        )
        .unwrap();
        assert_eq!(result, Value::String("bbaa".to_string()));
    }

    #[test]
    fn find_honors_start_offset() {
        let result = call_string_method("abcabc", "find", &[Value::String("a".into()), Value::Integer(1)], 1).unwrap();
        assert_eq!(result, Value::Integer(3));
    }

    #[test]
    fn strip_honors_custom_chars() {
        let result = call_string_method("xxhelloxx", "strip", &[Value::String("x".into())], 1).unwrap();
        assert_eq!(result, Value::String("hello".to_string()));
    }
}
