//! # Diagnostics recorded when a slice of the pipeline degrades.
//!
//! On a handler failure or an upstream fault, the dependency tree simply
//! stops updating for the affected framework/slice rather than crashing the
//! host. A [`Diagnostic`] records what happened (kind + target framework +
//! upstream rule name) for later troubleshooting.

use crate::model::TargetFramework;

/// Classification of recorded diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A dependency-kind handler returned an error; updates for the affected
    /// configuration stopped, sibling subscribers keep operating.
    HandlerFault,

    /// An upstream feed reported an unrecoverable fault; the subscriber's
    /// merged feed was terminated so the aggregate fails fast.
    SourceFault,
}

impl DiagnosticKind {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DiagnosticKind::HandlerFault => "handler_fault",
            DiagnosticKind::SourceFault => "source_fault",
        }
    }
}

/// One recorded degradation of a framework/slice.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// What kind of failure occurred.
    pub kind: DiagnosticKind,
    /// The target framework whose updates stopped.
    pub target: TargetFramework,
    /// The upstream rule being processed when the failure occurred, if any.
    pub rule: Option<String>,
    /// The underlying failure message.
    pub message: String,
}
