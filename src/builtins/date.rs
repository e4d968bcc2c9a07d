// ABOUTME: The Date namespace — wall-clock timestamps, no timezone/calendar math

use super::{arg, as_f64};
use crate::error::RuntimeError;
use crate::value::Value;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn call(member: &str, args: &[Value], line: u32) -> Result<Value, RuntimeError> {
    match member {
        "now" => {
            let secs = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_err(|e| RuntimeError::runtime(format!("system clock error: {}", e), line))?
                .as_secs_f64();
            Ok(Value::Float(secs))
        }
        "format" => {
            let epoch_secs = as_f64(arg(args, 0, "Date.format", line)?, "Date.format", line)?;
            Ok(Value::String(format_epoch(epoch_secs)))
        }
        other => Err(RuntimeError::ModuleError {
            message: format!("Date has no member '{}'", other),
            line,
        }),
    }
}

/// Minimal UTC ISO-8601 rendering, no timezone/locale database — Flowby's
/// `Date` namespace deliberately has no calendar-arithmetic surface.
fn format_epoch(epoch_secs: f64) -> String {
    let total_secs = epoch_secs.floor() as i64;
    let days = total_secs.div_euclid(86_400);
    let secs_of_day = total_secs.rem_euclid(86_400);

    let (year, month, day) = civil_from_days(days);
    let hour = secs_of_day / 3600;
    let minute = (secs_of_day % 3600) / 60;
    let second = secs_of_day % 60;

    format!("{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z", year, month, day, hour, minute, second)
}

/// Howard Hinnant's days-from-civil algorithm, used here in reverse.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_epoch_zero_is_unix_epoch() {
        assert_eq!(format_epoch(0.0), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn now_returns_a_positive_float() {
        match call("now", &[], 1).unwrap() {
            Value::Float(secs) => assert!(secs > 0.0),
            _ => panic!("expected float"),
        }
    }
}
