// ABOUTME: The http namespace — the one builtin namespace that is a real network action

use super::as_str;
use crate::error::RuntimeError;
use crate::sandbox::{Sandbox, SandboxError};
use crate::value::Value;
use indexmap::IndexMap;

pub fn call(sandbox: &Sandbox, member: &str, args: &[Value], line: u32) -> Result<Value, SandboxError> {
    let method = match member {
        "get" => "GET",
        "post" => "POST",
        "put" => "PUT",
        "delete" => "DELETE",
        "patch" => "PATCH",
        "head" => "HEAD",
        other => {
            return Err(SandboxError::IoError(format!("http has no member '{}'", other)));
        }
    };

    let url = as_str(&args[0], "http", line).map_err(|e| SandboxError::IoError(e.to_string()))?;
    let body = args.get(1).map(|v| v.to_string());

    let response = sandbox.http_request(url, method, None, body.as_deref(), None)?;

    let mut result = IndexMap::new();
    result.insert("status".to_string(), Value::Integer(response.status as i64));
    result.insert("body".to_string(), Value::String(response.body));
    let headers: IndexMap<String, Value> = response
        .headers
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    result.insert("headers".to_string(), Value::new_object(headers));
    Ok(Value::new_object(result))
}
