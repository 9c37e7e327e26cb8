//! Diagnostics sink
//!
//! Constraint operations never log user-facing problems to a global logger. They
//! record them in a [`Diagnostics`] value owned by the caller. Each record is also
//! emitted as a `tracing` event so it shows up in the process log.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(label)
    }
}

/// Position of a rule in its FSH source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLocation {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

/// Where a rule came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<TextLocation>,
}

impl SourceInfo {
    pub fn is_empty(&self) -> bool {
        self.file.is_none() && self.location.is_none()
    }
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, &self.location) {
            (Some(file), Some(loc)) => write!(
                f,
                "{}:{}:{} - {}:{}",
                file, loc.start_line, loc.start_column, loc.end_line, loc.end_column
            ),
            (Some(file), None) => f.write_str(file),
            (None, Some(loc)) => write!(f, "line {}", loc.start_line),
            (None, None) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Id of the element the message is about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceInfo>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;
        if let Some(source) = self.source.as_ref().filter(|s| !s.is_empty()) {
            write!(f, " ({})", source)?;
        }
        Ok(())
    }
}

/// Collected diagnostics of one or more operations.
///
/// A current [`SourceInfo`] can be set while a rule is being applied; every record
/// made in the meantime carries it.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    source: Option<SourceInfo>,
    /// Held back from logging until committed into a sink that is not deferred.
    deferred: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attribute subsequent records to `source` (or to nothing when `None`).
    pub fn set_source(&mut self, source: Option<SourceInfo>) {
        self.source = source.filter(|s| !s.is_empty());
    }

    pub fn push(&mut self, severity: Severity, element: Option<&str>, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            severity,
            message: message.into(),
            element: element.map(str::to_string),
            source: self.source.clone(),
        };
        if !self.deferred {
            emit(&diagnostic);
        }
        self.entries.push(diagnostic);
    }

    /// An empty sink for records that only count if an operation succeeds.
    /// It shares the current source and logs nothing until [`commit`](Self::commit).
    pub fn buffer(&self) -> Diagnostics {
        Diagnostics {
            entries: Vec::new(),
            source: self.source.clone(),
            deferred: true,
        }
    }

    /// Take over the records of a buffer.
    pub fn commit(&mut self, buffer: Diagnostics) {
        if !self.deferred {
            buffer.entries.iter().for_each(emit);
        }
        self.entries.extend(buffer.entries);
    }

    pub fn error(&mut self, element: &str, message: impl Into<String>) {
        self.push(Severity::Error, Some(element), message);
    }

    pub fn warn(&mut self, element: &str, message: impl Into<String>) {
        self.push(Severity::Warning, Some(element), message);
    }

    pub fn info(&mut self, element: &str, message: impl Into<String>) {
        self.push(Severity::Info, Some(element), message);
    }

    pub fn debug(&mut self, element: &str, message: impl Into<String>) {
        self.push(Severity::Debug, Some(element), message);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.with_severity(Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.with_severity(Severity::Warning)
    }

    fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.severity == severity)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

fn emit(diagnostic: &Diagnostic) {
    let (element, source, message) = (&diagnostic.element, &diagnostic.source, &diagnostic.message);
    match diagnostic.severity {
        Severity::Error => tracing::error!(element = ?element, source = ?source, "{}", message),
        Severity::Warning => tracing::warn!(element = ?element, source = ?source, "{}", message),
        Severity::Info => tracing::info!(element = ?element, "{}", message),
        Severity::Debug => tracing::debug!(element = ?element, "{}", message),
    }
}
