//! Diagnostics channel for resolution and expansion.
//!
//! Warnings, errors and fatal errors raised while expanding a document
//! are forwarded to an [`ErrorHandler`] with a textual message and, when
//! the parser position is known, a 1-based line number. Handler callbacks
//! return a [`Signal`]: returning [`Signal::Stop`] terminates the
//! expansion in an orderly way and hands the optional payload back to the
//! caller. There is no sentinel error to catch; stopping is an explicit
//! return value threaded through the driving loop.

use core::fmt;

/// Severity of a reported diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Recoverable; the surrounding document is unaffected.
    Warning,
    /// An error the expansion can continue past.
    Error,
    /// The current expansion level cannot continue.
    Fatal,
}

/// A single diagnostic reported during resolution or expansion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity classification.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
    /// 1-based line in the source being parsed, when known.
    pub line: Option<u64>,
}

impl Diagnostic {
    /// Build a warning diagnostic.
    pub fn warning(message: impl Into<String>, line: Option<u64>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            line,
        }
    }

    /// Build an error diagnostic.
    pub fn error(message: impl Into<String>, line: Option<u64>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            line,
        }
    }

    /// Build a fatal diagnostic.
    pub fn fatal(message: impl Into<String>, line: Option<u64>) -> Self {
        Self {
            severity: Severity::Fatal,
            message: message.into(),
            line,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        match self.line {
            Some(line) => write!(f, "{} (line {}): {}", label, line, self.message),
            None => write!(f, "{}: {}", label, self.message),
        }
    }
}

/// Flow signal returned by handler callbacks.
///
/// `Stop` requests cooperative termination of the expansion; the payload,
/// if any, is surfaced to the caller through the includer.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Signal {
    /// Keep processing.
    #[default]
    Continue,
    /// Terminate the expansion, carrying an optional payload back.
    Stop(Option<String>),
}

impl Signal {
    /// Returns `true` for [`Signal::Stop`].
    pub fn is_stop(&self) -> bool {
        matches!(self, Signal::Stop(_))
    }
}

/// Callback interface for diagnostics raised during expansion.
///
/// All methods default to ignoring the diagnostic and continuing, so an
/// implementation only overrides the severities it cares about.
pub trait ErrorHandler {
    /// A recoverable problem (missing inclusion target, malformed href).
    fn warning(&mut self, _diagnostic: &Diagnostic) -> Signal {
        Signal::Continue
    }

    /// A parse error the expansion can continue past.
    fn error(&mut self, _diagnostic: &Diagnostic) -> Signal {
        Signal::Continue
    }

    /// A fatal parse error; the current expansion level aborts after this.
    fn fatal_error(&mut self, _diagnostic: &Diagnostic) -> Signal {
        Signal::Continue
    }
}

/// An [`ErrorHandler`] that records every diagnostic it sees.
#[derive(Debug, Default)]
pub struct CollectingHandler {
    diagnostics: Vec<Diagnostic>,
}

impl CollectingHandler {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded diagnostics, in report order.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Number of warning-level diagnostics.
    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    /// Number of error-level diagnostics.
    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    /// Returns `true` when a fatal diagnostic was recorded.
    pub fn has_fatal(&self) -> bool {
        self.count(Severity::Fatal) > 0
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

impl ErrorHandler for CollectingHandler {
    fn warning(&mut self, diagnostic: &Diagnostic) -> Signal {
        self.diagnostics.push(diagnostic.clone());
        Signal::Continue
    }

    fn error(&mut self, diagnostic: &Diagnostic) -> Signal {
        self.diagnostics.push(diagnostic.clone());
        Signal::Continue
    }

    fn fatal_error(&mut self, diagnostic: &Diagnostic) -> Signal {
        self.diagnostics.push(diagnostic.clone());
        Signal::Continue
    }
}
