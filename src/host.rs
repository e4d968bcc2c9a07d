// ABOUTME: The Host trait seam between the evaluator and the embedding environment

use crate::error::RuntimeError;
use crate::sandbox::{Sandbox, SandboxError};
use crate::value::Value;
use std::cell::RefCell;
use std::io::Write;

/// Everything the evaluator needs from the outside world. A real automation
/// host (a browser driver, a test runner, a CI agent) supplies its own
/// implementation; `DefaultHost` is the standalone-script implementation
/// used by the `flowby` binary.
pub trait Host {
    /// Resolves a reserved system namespace identifier (`page`, `browser`,
    /// `context`, `env`, `config`) to its current value. Called once per
    /// lookup, not cached by the evaluator.
    fn resolve_system(&self, name: &str, line: u32) -> Result<Value, RuntimeError>;

    /// Dispatches a call into a builtin namespace (`Math`, `Date`, `JSON`,
    /// `UUID`, `Hash`, `Base64`, `random`, `http`) that needs host
    /// capabilities rather than pure computation.
    fn call_builtin_namespace(
        &self,
        namespace: &str,
        member: &str,
        args: &[Value],
        line: u32,
    ) -> Result<Value, RuntimeError>;

    /// Performs a side-effecting action outside the language core (a
    /// browser interaction, a UI automation step). The default host has no
    /// such capabilities and always reports `ActionError`.
    fn perform_action(&self, action: &str, args: &[Value], line: u32) -> Result<Value, RuntimeError>;

    /// Reads one line from the script's input source (stdin when
    /// interactive, the next queued input in an automation host).
    fn read_input(&self, prompt: Option<&str>, line: u32) -> Result<String, RuntimeError>;

    fn is_interactive(&self) -> bool;

    /// Looks up a process/host environment variable for the `env`
    /// namespace.
    fn env_lookup(&self, name: &str) -> Option<String>;

    /// Opens a named resource spec (a page object, a recorded fixture).
    /// The default host has no resource registry and always reports
    /// `ModuleError`.
    fn open_spec(&self, name: &str, line: u32) -> Result<Value, RuntimeError>;

    /// Dispatches a method call on a value returned by `Resource(...)`. The
    /// evaluator never interprets resource objects itself; it only routes
    /// method calls on them here. The default host has no resources to
    /// operate on and always reports `ActionError`.
    fn call_resource_operation(
        &self,
        resource: &Value,
        operation: &str,
        args: &[Value],
        kwargs: &indexmap::IndexMap<String, Value>,
        line: u32,
    ) -> Result<Value, RuntimeError>;
}

/// Standalone-script host: filesystem/network via `Sandbox`, stdin for
/// `input()`, process environment for `env`, and native implementations of
/// the pure builtin namespaces.
pub struct DefaultHost {
    sandbox: Sandbox,
    interactive: bool,
    queued_input: RefCell<Vec<String>>,
}

impl DefaultHost {
    pub fn new(sandbox: Sandbox, interactive: bool) -> Self {
        DefaultHost {
            sandbox,
            interactive,
            queued_input: RefCell::new(Vec::new()),
        }
    }

    /// Feeds pre-recorded answers to `input()` calls, consumed in order.
    /// Used by non-interactive scripted runs (CI, automation).
    pub fn queue_input(&self, lines: Vec<String>) {
        self.queued_input.borrow_mut().extend(lines);
    }

    fn sandbox_err(err: SandboxError, line: u32) -> RuntimeError {
        RuntimeError::ActionError {
            message: err.to_string(),
            line,
        }
    }
}

impl Host for DefaultHost {
    fn resolve_system(&self, name: &str, line: u32) -> Result<Value, RuntimeError> {
        match name {
            "env" => {
                let map: indexmap::IndexMap<String, Value> = std::env::vars()
                    .map(|(k, v)| (k, Value::String(v)))
                    .collect();
                Ok(Value::new_object(map))
            }
            _ => Err(RuntimeError::ActionError {
                message: format!("'{}' is not available in this host", name),
                line,
            }),
        }
    }

    fn call_builtin_namespace(
        &self,
        namespace: &str,
        member: &str,
        args: &[Value],
        line: u32,
    ) -> Result<Value, RuntimeError> {
        match namespace {
            "http" => crate::builtins::http::call(&self.sandbox, member, args, line)
                .map_err(|e| Self::sandbox_err(e, line)),
            "Math" => crate::builtins::math::call(member, args, line),
            "JSON" => crate::builtins::json::call(member, args, line),
            "Date" => crate::builtins::date::call(member, args, line),
            "UUID" => crate::builtins::uuid_ns::call(member, args, line),
            "Hash" => crate::builtins::hash::call(member, args, line),
            "Base64" => crate::builtins::base64_ns::call(member, args, line),
            "random" => crate::builtins::random_ns::call(member, args, line),
            other => Err(RuntimeError::ModuleError {
                message: format!("unknown namespace '{}'", other),
                line,
            }),
        }
    }

    fn perform_action(&self, action: &str, _args: &[Value], line: u32) -> Result<Value, RuntimeError> {
        Err(RuntimeError::ActionError {
            message: format!(
                "action '{}' requires a host capability not provided by the standalone runner",
                action
            ),
            line,
        })
    }

    fn read_input(&self, prompt: Option<&str>, line: u32) -> Result<String, RuntimeError> {
        if let Some(queued) = self.queued_input.borrow_mut().pop() {
            return Ok(queued);
        }
        if !self.interactive {
            return Err(RuntimeError::ActionError {
                message: "input() called with no input available in a non-interactive run".to_string(),
                line,
            });
        }
        if let Some(p) = prompt {
            print!("{}", p);
            std::io::stdout().flush().ok();
        }
        let mut buf = String::new();
        std::io::stdin()
            .read_line(&mut buf)
            .map_err(|e| RuntimeError::ActionError {
                message: format!("failed to read input: {}", e),
                line,
            })?;
        Ok(buf.trim_end_matches(['\n', '\r']).to_string())
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn env_lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn open_spec(&self, name: &str, line: u32) -> Result<Value, RuntimeError> {
        Err(RuntimeError::ModuleError {
            message: format!("no resource spec named '{}' is registered with this host", name),
            line,
        })
    }

    fn call_resource_operation(
        &self,
        _resource: &Value,
        operation: &str,
        _args: &[Value],
        _kwargs: &indexmap::IndexMap<String, Value>,
        line: u32,
    ) -> Result<Value, RuntimeError> {
        Err(RuntimeError::ActionError {
            message: format!(
                "resource operation '{}' requires a host capability not provided by the standalone runner",
                operation
            ),
            line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FsConfig, NetConfig};

    fn test_host() -> DefaultHost {
        let sandbox = Sandbox::new(FsConfig::default(), NetConfig::default()).unwrap();
        DefaultHost::new(sandbox, false)
    }

    #[test]
    fn queued_input_is_consumed_in_order() {
        let host = test_host();
        host.queue_input(vec!["b".to_string(), "a".to_string()]);
        assert_eq!(host.read_input(None, 1).unwrap(), "a");
        assert_eq!(host.read_input(None, 1).unwrap(), "b");
    }

    #[test]
    fn perform_action_reports_missing_capability() {
        let host = test_host();
        assert!(host.perform_action("click", &[], 1).is_err());
    }

    #[test]
    fn env_lookup_reads_process_environment() {
        std::env::set_var("FLOWBY_HOST_TEST_VAR", "hello");
        let host = test_host();
        assert_eq!(host.env_lookup("FLOWBY_HOST_TEST_VAR"), Some("hello".to_string()));
        std::env::remove_var("FLOWBY_HOST_TEST_VAR");
    }
}
