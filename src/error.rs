// ABOUTME: Structured error types for lexing, parsing and evaluating Flowby programs

use thiserror::Error;

#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct LexError {
    pub message: String,
    pub line: u32,
    pub column: u32,
    pub suggestion: Option<String>,
}

#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub column: u32,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub suggestion: Option<String>,
}

#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    #[error("{function}: expected {expected}, got {actual}")]
    TypeError {
        function: String,
        expected: String,
        actual: String,
        line: u32,
    },

    #[error("{function}: expected {expected} argument(s), got {actual}")]
    ArityError {
        function: String,
        expected: String,
        actual: usize,
        line: u32,
    },

    #[error("{message}")]
    Runtime { message: String, line: u32 },

    #[error("undefined variable '{name}'")]
    VariableNotFound { name: String, line: u32 },

    #[error("{message}")]
    InvalidState { message: String, line: u32 },

    #[error("loop exceeded the maximum of {max} iterations")]
    InfiniteLoopDetected { max: u64, line: u32 },

    #[error("{message}")]
    ModuleError { message: String, line: u32 },

    #[error("{message}")]
    ActionError { message: String, line: u32 },
}

impl RuntimeError {
    pub fn line(&self) -> u32 {
        match self {
            RuntimeError::TypeError { line, .. }
            | RuntimeError::ArityError { line, .. }
            | RuntimeError::Runtime { line, .. }
            | RuntimeError::VariableNotFound { line, .. }
            | RuntimeError::InvalidState { line, .. }
            | RuntimeError::InfiniteLoopDetected { line, .. }
            | RuntimeError::ModuleError { line, .. }
            | RuntimeError::ActionError { line, .. } => *line,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            RuntimeError::TypeError { .. } => "RuntimeError",
            RuntimeError::ArityError { .. } => "RuntimeError",
            RuntimeError::Runtime { .. } => "RuntimeError",
            RuntimeError::VariableNotFound { .. } => "VariableNotFound",
            RuntimeError::InvalidState { .. } => "InvalidState",
            RuntimeError::InfiniteLoopDetected { .. } => "InfiniteLoopDetected",
            RuntimeError::ModuleError { .. } => "ModuleError",
            RuntimeError::ActionError { .. } => "ActionError",
        }
    }

    pub fn type_error(function: &str, expected: &str, actual: &str, line: u32) -> Self {
        RuntimeError::TypeError {
            function: function.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
            line,
        }
    }

    pub fn arity_error(function: &str, expected: impl Into<String>, actual: usize, line: u32) -> Self {
        RuntimeError::ArityError {
            function: function.to_string(),
            expected: expected.into(),
            actual,
            line,
        }
    }

    pub fn runtime(message: impl Into<String>, line: u32) -> Self {
        RuntimeError::Runtime {
            message: message.into(),
            line,
        }
    }
}

/// The top-level error a driver sees once a program stops lexing, parsing,
/// or evaluating. `render` produces the user-visible format from spec §7:
/// a kind/location header, a source excerpt with a caret under the
/// offending column, and an optional expected/actual + suggestion block.
#[derive(Error, Debug, Clone)]
pub enum FlowbyError {
    #[error(transparent)]
    Lexer(#[from] LexError),
    #[error(transparent)]
    Parser(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl FlowbyError {
    pub fn line(&self) -> u32 {
        match self {
            FlowbyError::Lexer(e) => e.line,
            FlowbyError::Parser(e) => e.line,
            FlowbyError::Runtime(e) => e.line(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            FlowbyError::Lexer(_) => "LexerError",
            FlowbyError::Parser(_) => "ParserError",
            FlowbyError::Runtime(e) => e.kind_name(),
        }
    }

    /// Render the full user-visible error block: kind + file:line:col,
    /// a `source` excerpt (2 lines of context either side) with a caret,
    /// and any suggestion the error carries.
    pub fn render(&self, file_path: &str, source: &str) -> String {
        let line = self.line();
        let column = match self {
            FlowbyError::Lexer(e) => e.column,
            FlowbyError::Parser(e) => e.column,
            FlowbyError::Runtime(_) => 1,
        };

        let mut out = format!("{}: {}\n  --> {}:{}:{}\n", self.kind_name(), self, file_path, line, column);

        let lines: Vec<&str> = source.lines().collect();
        let line_idx = line.saturating_sub(1) as usize;
        let start = line_idx.saturating_sub(2);
        let end = (line_idx + 3).min(lines.len());
        for (i, text) in lines.iter().enumerate().take(end).skip(start) {
            let lineno = i + 1;
            out.push_str(&format!("{:>5} | {}\n", lineno, text));
            if lineno as u32 == line {
                let caret_pos = column.saturating_sub(1) as usize;
                out.push_str(&format!("      | {}^\n", " ".repeat(caret_pos)));
            }
        }

        if let FlowbyError::Parser(ParseError {
            expected: Some(exp),
            actual: Some(act),
            ..
        }) = self
        {
            out.push_str(&format!("  expected: {}\n  actual:   {}\n", exp, act));
        }

        let suggestion = match self {
            FlowbyError::Lexer(e) => e.suggestion.as_deref(),
            FlowbyError::Parser(e) => e.suggestion.as_deref(),
            FlowbyError::Runtime(_) => None,
        };
        if let Some(s) = suggestion {
            out.push_str(&format!("  suggestion: {}\n", s));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_caret_at_column() {
        let err = FlowbyError::Runtime(RuntimeError::VariableNotFound {
            name: "total".to_string(),
            line: 2,
        });
        let rendered = err.render("script.flow", "let x = 1\nprint(total)\n");
        assert!(rendered.contains("VariableNotFound"));
        assert!(rendered.contains("script.flow:2:1"));
    }

    #[test]
    fn runtime_error_kind_names() {
        assert_eq!(
            RuntimeError::InfiniteLoopDetected { max: 100_000, line: 1 }.kind_name(),
            "InfiniteLoopDetected"
        );
        assert_eq!(
            RuntimeError::ModuleError { message: "x".into(), line: 1 }.kind_name(),
            "ModuleError"
        );
    }
}
