//! Diagnostics and error propagation.
//!
//! The preprocessor reports problems in a fixed single-line format on
//! standard error:
//!
//! ```text
//! mucgly <severity> in "<file>:<line>:<column>": <message>
//! ```
//!
//! Warnings are printed immediately and processing continues. Errors and
//! fatal errors propagate out of the library as [`Error`] values; the
//! command-line driver prints them and exits with a non-zero status.

use std::fmt;

/// Severity of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Fatal => write!(f, "fatal error"),
        }
    }
}

/// Position of a diagnostic in an input source.
///
/// Lines and columns are stored 0-based and rendered 1-based.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line + 1, self.column + 1)
    }
}

/// A diagnostic raised by the preprocessor.
#[derive(Debug)]
pub struct Error {
    severity: Severity,
    message: String,
    location: Option<Location>,
}

impl Error {
    /// Create a new boxed error diagnostic.
    pub fn error<M: Into<String>>(location: Option<Location>, message: M) -> Box<Error> {
        Box::new(Error {
            severity: Severity::Error,
            message: message.into(),
            location,
        })
    }

    /// Create a new boxed fatal-error diagnostic.
    pub fn fatal<M: Into<String>>(location: Option<Location>, message: M) -> Box<Error> {
        Box::new(Error {
            severity: Severity::Fatal,
            message: message.into(),
            location,
        })
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// Attach a location if the diagnostic does not already carry one.
    pub fn at(mut self: Box<Error>, location: Option<Location>) -> Box<Error> {
        if self.location.is_none() {
            self.location = location;
        }
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => {
                write!(f, "mucgly {} in \"{}\": {}", self.severity, location, self.message)
            }
            None => write!(f, "mucgly {}: {}", self.severity, self.message),
        }
    }
}

impl std::error::Error for Error {}

/// Print a warning diagnostic to standard error. Processing continues.
pub fn warn(location: Option<Location>, message: &str) {
    let warning = Error {
        severity: Severity::Warning,
        message: message.into(),
        location,
    };
    eprintln!("{warning}");
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Box<Error>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_location() {
        let err = Error::error(
            Some(Location {
                file: "in.txt".into(),
                line: 2,
                column: 7,
            }),
            "something went wrong",
        );
        assert_eq!(
            err.to_string(),
            "mucgly error in \"in.txt:3:8\": something went wrong"
        );
    }

    #[test]
    fn display_without_location() {
        let err = Error::fatal(None, "end of input within macro");
        assert_eq!(
            err.to_string(),
            "mucgly fatal error: end of input within macro"
        );
    }

    #[test]
    fn at_does_not_overwrite() {
        let location = Location {
            file: "a".into(),
            line: 0,
            column: 0,
        };
        let other = Location {
            file: "b".into(),
            line: 1,
            column: 1,
        };
        let err = Error::error(Some(location.clone()), "m").at(Some(other.clone()));
        assert_eq!(err.location(), Some(&location));
        let err = Error::error(None, "m").at(Some(other.clone()));
        assert_eq!(err.location(), Some(&other));
    }
}
