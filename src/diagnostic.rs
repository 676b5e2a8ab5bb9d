use crate::token::Token;
use std::fmt;
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum DiagnosticKind {
    SyntaxError,
    SemanticError,
    Warning,
    RuntimeError,
}

/// A positioned message from any stage of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: String, line: usize, column: usize) -> Diagnostic {
        Diagnostic {
            kind,
            message,
            line,
            column,
        }
    }
    pub fn at(kind: DiagnosticKind, message: String, token: &Token) -> Diagnostic {
        Diagnostic::new(kind, message, token.line, token.column)
    }
    pub fn is_error(&self) -> bool {
        self.kind != DiagnosticKind::Warning
    }
    /// Header, the offending source line, then a caret under the column.
    pub fn render(&self, source: &str) -> String {
        let line = source
            .lines()
            .nth(self.line.saturating_sub(1))
            .unwrap_or("");
        let pad: String = line
            .chars()
            .take(self.column.saturating_sub(1))
            .map(|c| if c == '\t' { '\t' } else { ' ' })
            .collect();
        format!("{}\n{}\n{}^", self, line, pad)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} [{}:{}]",
            self.kind, self.message, self.line, self.column
        )
    }
}
