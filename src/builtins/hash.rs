// ABOUTME: The Hash namespace — one-way digests, not for password storage

use super::as_str;
use crate::error::RuntimeError;
use crate::value::Value;
use md5::{Digest, Md5};
use sha2::Sha256;

pub fn call(member: &str, args: &[Value], line: u32) -> Result<Value, RuntimeError> {
    let input = as_str(args.get(0).ok_or_else(|| RuntimeError::arity_error(&format!("Hash.{}", member), "1", args.len(), line))?, "Hash", line)?;
    match member {
        "sha256" => {
            let mut hasher = Sha256::new();
            hasher.update(input.as_bytes());
            Ok(Value::String(hex(&hasher.finalize())))
        }
        "md5" => {
            let mut hasher = Md5::new();
            hasher.update(input.as_bytes());
            Ok(Value::String(hex(&hasher.finalize())))
        }
        other => Err(RuntimeError::ModuleError {
            message: format!("Hash has no member '{}'", other),
            line,
        }),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_string_matches_known_digest() {
        let result = call("sha256", &[Value::String(String::new())], 1).unwrap();
        assert_eq!(
            result,
            Value::String("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855".to_string())
        );
    }

    #[test]
    fn md5_of_abc_matches_known_digest() {
        let result = call("md5", &[Value::String("abc".to_string())], 1).unwrap();
        assert_eq!(result, Value::String("900150983cd24fb0d6963f7d28e17f72".to_string()));
    }
}
