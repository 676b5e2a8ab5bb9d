pub mod ast;
pub mod config;
pub mod diagnostic;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

mod callable;
mod class;
mod environment;
mod instance;
mod natives;
mod shared_list;

use crate::diagnostic::Diagnostic;
use crate::interpreter::Interpreter;
use crate::resolver::Resolver;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    StaticError,
    RuntimeError,
}

/// Everything one pass through the pipeline had to say about a source text.
#[derive(Debug, Clone)]
pub struct Report {
    pub diagnostics: Vec<Diagnostic>,
    pub status: Status,
}

impl Report {
    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }
}

/// Scans, parses, resolves and evaluates `source` against `interpreter`.
/// Nothing is evaluated if an earlier stage reported an error. Globals and
/// resolved locals persist in `interpreter` across calls.
pub fn run(source: &str, interpreter: &mut Interpreter) -> Report {
    let (tokens, scan_errors) = scanner::scan_tokens(source);
    let (statements, parse_errors) = parser::parse(&tokens);
    debug!(
        tokens = tokens.len(),
        statements = statements.len(),
        "parsed"
    );
    let mut diagnostics: Vec<Diagnostic> = scan_errors
        .iter()
        .map(scanner::ScanError::diagnostic)
        .chain(parse_errors.iter().map(parser::ParseError::diagnostic))
        .collect();
    if !diagnostics.is_empty() {
        return Report {
            diagnostics,
            status: Status::StaticError,
        };
    }

    let mut resolver = Resolver::new();
    let resolved = resolver.resolve(&statements);
    let failed = resolved.iter().any(Diagnostic::is_error);
    let report_warnings = interpreter.config().report_warnings;
    diagnostics.extend(
        resolved
            .into_iter()
            .filter(|d| d.is_error() || report_warnings),
    );
    if failed {
        return Report {
            diagnostics,
            status: Status::StaticError,
        };
    }

    interpreter.resolve_locals(resolver.locals());
    let status = match interpreter.interpret(&statements) {
        Ok(()) => Status::Ok,
        Err(err) => {
            diagnostics.push(err.diagnostic());
            Status::RuntimeError
        }
    };
    Report {
        diagnostics,
        status,
    }
}

#[cfg(test)]
mod run_tests {
    use super::{run, Status};
    use crate::config::Config;
    use crate::diagnostic::DiagnosticKind;
    use crate::interpreter::{Interpreter, SharedBuffer};
    use pretty_assertions::assert_eq;
    use std::io;

    fn interpreter(config: Config) -> (Interpreter, SharedBuffer) {
        let output = SharedBuffer::new();
        let interpreter = Interpreter::with_io(config, Box::new(output.clone()), Box::new(io::empty()));
        (interpreter, output)
    }

    #[test]
    fn syntax_errors_stop_before_resolution() {
        let (mut interp, output) = interpreter(Config::default());
        let report = run("println(1); var = 2; println(2)", &mut interp);
        assert_eq!(report.status, Status::StaticError);
        assert_eq!(report.diagnostics.len(), 2);
        assert!(report
            .diagnostics
            .iter()
            .all(|d| d.kind == DiagnosticKind::SyntaxError));
        assert_eq!(output.contents(), "");
    }

    #[test]
    fn warnings_can_be_suppressed() {
        let source = "{ var unused = 1; }";
        let (mut interp, _) = interpreter(Config::default());
        let report = run(source, &mut interp);
        assert!(report.is_ok());
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].kind, DiagnosticKind::Warning);

        let quiet = Config {
            report_warnings: false,
            ..Config::default()
        };
        let (mut interp, _) = interpreter(quiet);
        assert!(run(source, &mut interp).diagnostics.is_empty());
    }

    #[test]
    fn runtime_error_is_positioned() {
        let (mut interp, _) = interpreter(Config::default());
        let report = run("var x = 1 / 0;", &mut interp);
        assert_eq!(report.status, Status::RuntimeError);
        let diagnostic = &report.diagnostics[0];
        assert_eq!(diagnostic.kind, DiagnosticKind::RuntimeError);
        assert_eq!(diagnostic.message, "Division by zero in '/'.");
        assert_eq!((diagnostic.line, diagnostic.column), (1, 11));
    }
}
