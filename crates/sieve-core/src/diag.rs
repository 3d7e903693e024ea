//! Error sink: accumulates diagnostics with severity and source location,
//! enforces a per-compile error ceiling, and routes messages to handlers.
//!
//! Mirrors `sieve_error_handler` from `original_source/sieve-error.c`: a
//! handler has a reference count there (`ref`/`unref`); here ownership is
//! `Rc<dyn Sink>`, which Rust's drop glue already frees at zero refs.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Diagnostic severity, ordered least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
    Fatal,
    Panic,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
            Severity::Panic => "panic",
        };
        f.write_str(s)
    }
}

/// One diagnostic message with source location.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub source_filename: String,
    pub line: u32,
    pub message: String,
    pub event: Option<String>,
}

impl Diagnostic {
    /// Formats as `<name>: line N: message`, the canonical script-location
    /// helper from §4.1.
    pub fn location(&self) -> String {
        format!("{}: line {}", self.source_filename, self.line)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.location(), self.severity, self.message)
    }
}

/// A diagnostic sink. Implementations must never panic.
pub trait Sink {
    fn report(&self, diag: &Diagnostic);
}

/// Accumulates diagnostics into memory; used by tests and by tooling that
/// wants to inspect the full list after a compile.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub diagnostics: RefCell<Vec<Diagnostic>>,
}

impl Sink for MemorySink {
    fn report(&self, diag: &Diagnostic) {
        self.diagnostics.borrow_mut().push(diag.clone());
    }
}

/// Writes to stderr, matching `sieve_stderr_ehandler_create`.
#[derive(Debug, Default)]
pub struct StderrSink;

impl Sink for StderrSink {
    fn report(&self, diag: &Diagnostic) {
        eprintln!("{diag}");
    }
}

/// Routes through `tracing`, matching the rest of the workspace's logging
/// story (`sieve-runtime`/`sieve-storage` emit spans through the same
/// subscriber a host has already configured).
#[derive(Debug, Default)]
pub struct TracingSink;

impl Sink for TracingSink {
    fn report(&self, diag: &Diagnostic) {
        match diag.severity {
            Severity::Debug => tracing::debug!(target: "sieve", "{diag}"),
            Severity::Info => tracing::info!(target: "sieve", "{diag}"),
            Severity::Warning => tracing::warn!(target: "sieve", "{diag}"),
            Severity::Error | Severity::Fatal | Severity::Panic => {
                tracing::error!(target: "sieve", "{diag}")
            }
        }
    }
}

/// A reference-counted sink handle, analogous to the original's
/// ref-counted `sieve_error_handler`.
pub type ErrorHandler = Rc<dyn Sink>;

/// Diagnostics accumulator for one compile or one execution.
///
/// Enforces the error ceiling from §4.1: once `errors >= max_errors` (when
/// `max_errors > 0`), subsequent errors are suppressed from the handler but
/// still counted, so `error_count()` stays accurate.
pub struct Diagnostics {
    handler: ErrorHandler,
    max_errors: u32,
    error_count: u32,
    warning_count: u32,
}

impl Diagnostics {
    pub fn new(handler: ErrorHandler, max_errors: u32) -> Self {
        Self {
            handler,
            max_errors,
            error_count: 0,
            warning_count: 0,
        }
    }

    fn ceiling_reached(&self) -> bool {
        self.max_errors > 0 && self.error_count >= self.max_errors
    }

    /// Emit one diagnostic. Errors/fatals/panics past the ceiling are
    /// counted but not forwarded to the handler.
    pub fn emit(&mut self, diag: Diagnostic) {
        let severe = diag.severity >= Severity::Error;
        if severe {
            if !self.ceiling_reached() {
                self.handler.report(&diag);
            }
            self.error_count += 1;
        } else {
            if diag.severity == Severity::Warning {
                self.warning_count += 1;
            }
            self.handler.report(&diag);
        }
    }

    pub fn error(&mut self, source_filename: &str, line: u32, message: impl Into<String>) {
        self.emit(Diagnostic {
            severity: Severity::Error,
            source_filename: source_filename.to_owned(),
            line,
            message: message.into(),
            event: None,
        });
    }

    pub fn warning(&mut self, source_filename: &str, line: u32, message: impl Into<String>) {
        self.emit(Diagnostic {
            severity: Severity::Warning,
            source_filename: source_filename.to_owned(),
            line,
            message: message.into(),
            event: None,
        });
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn warning_count(&self) -> u32 {
        self.warning_count
    }

    /// `true` iff no error-or-worse diagnostic has been emitted: the
    /// compile phase may proceed to the next stage.
    pub fn ok(&self) -> bool {
        self.error_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_suppresses_but_still_counts() {
        let sink: Rc<MemorySink> = Rc::new(MemorySink::default());
        let mut diag = Diagnostics::new(sink.clone() as ErrorHandler, 2);
        diag.error("script.sieve", 1, "first");
        diag.error("script.sieve", 2, "second");
        diag.error("script.sieve", 3, "third past ceiling");
        assert_eq!(diag.error_count(), 3);
        assert_eq!(sink.diagnostics.borrow().len(), 2);
        assert!(!diag.ok());
    }

    #[test]
    fn warnings_never_fail_the_phase() {
        let sink: Rc<MemorySink> = Rc::new(MemorySink::default());
        let mut diag = Diagnostics::new(sink as ErrorHandler, 0);
        diag.warning("script.sieve", 4, "unused variable");
        assert!(diag.ok());
        assert_eq!(diag.warning_count(), 1);
    }

    #[test]
    fn location_formats_name_and_line() {
        let d = Diagnostic {
            severity: Severity::Error,
            source_filename: "script.sieve".into(),
            line: 12,
            message: "oops".into(),
            event: None,
        };
        assert_eq!(d.location(), "script.sieve: line 12");
    }
}
