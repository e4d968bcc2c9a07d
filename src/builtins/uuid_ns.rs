// ABOUTME: The UUID namespace — random identifier generation

use crate::error::RuntimeError;
use crate::value::Value;
use uuid::Uuid;

pub fn call(member: &str, _args: &[Value], line: u32) -> Result<Value, RuntimeError> {
    match member {
        "v4" | "generate" => Ok(Value::String(Uuid::new_v4().to_string())),
        other => Err(RuntimeError::ModuleError {
            message: format!("UUID has no member '{}'", other),
            line,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v4_produces_a_valid_uuid_string() {
        let Value::String(s) = call("v4", &[], 1).unwrap() else { panic!("expected string") };
        assert!(Uuid::parse_str(&s).is_ok());
    }
}
