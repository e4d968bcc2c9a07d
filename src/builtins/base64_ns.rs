// ABOUTME: The Base64 namespace — standard-alphabet encode/decode

use super::as_str;
use crate::error::RuntimeError;
use crate::value::Value;
use base64::{engine::general_purpose::STANDARD, Engine as _};

pub fn call(member: &str, args: &[Value], line: u32) -> Result<Value, RuntimeError> {
    match member {
        "encode" => {
            let input = as_str(args.get(0).ok_or_else(|| RuntimeError::arity_error("Base64.encode", "1", args.len(), line))?, "Base64.encode", line)?;
            Ok(Value::String(STANDARD.encode(input.as_bytes())))
        }
        "decode" => {
            let input = as_str(args.get(0).ok_or_else(|| RuntimeError::arity_error("Base64.decode", "1", args.len(), line))?, "Base64.decode", line)?;
            let bytes = STANDARD
                .decode(input)
                .map_err(|e| RuntimeError::runtime(format!("invalid base64: {}", e), line))?;
            String::from_utf8(bytes)
                .map(Value::String)
                .map_err(|e| RuntimeError::runtime(format!("decoded bytes are not valid UTF-8: {}", e), line))
        }
        other => Err(RuntimeError::ModuleError {
            message: format!("Base64 has no member '{}'", other),
            line,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_round_trips() {
        let encoded = call("encode", &[Value::String("hello".to_string())], 1).unwrap();
        let Value::String(encoded_str) = encoded.clone() else { panic!() };
        assert_eq!(encoded_str, "aGVsbG8=");
        let decoded = call("decode", &[encoded], 1).unwrap();
        assert_eq!(decoded, Value::String("hello".to_string()));
    }
}
