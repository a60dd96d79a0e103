use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueCode {
    General,
    WrongType,
    ShouldCast,
    UnknownOperator,
    NotFunctional,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: IssueCode,
    pub message: String,
}

/// Receives problems found while building expressions. Construction goes on
/// after a report; the caller decides whether to stop.
pub trait DiagnosticCollector {
    fn warning(&mut self, message: &str, code: IssueCode);
    fn error(&mut self, message: &str, code: IssueCode);
}

/// Diagnostics of one compilation unit, in the order they were reported.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl DiagnosticCollector for Diagnostics {
    fn warning(&mut self, message: &str, code: IssueCode) {
        log::debug!("warning [{:?}]: {}", code, message);
        self.items.push(Diagnostic {
            severity: Severity::Warning,
            code,
            message: message.to_string(),
        });
    }

    fn error(&mut self, message: &str, code: IssueCode) {
        log::debug!("error [{:?}]: {}", code, message);
        self.items.push(Diagnostic {
            severity: Severity::Error,
            code,
            message: message.to_string(),
        });
    }
}
