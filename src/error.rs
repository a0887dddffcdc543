//! Specification errors

use std::fmt;

/// The kind of specification error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A matcher rejected the candidate value
    AssertionFailed,
    /// The test body panicked
    Panicked,
    /// A before hook panicked; the case depending on it was not run
    HookFailed,
    /// The test body returned an error
    BodyError,
    /// `before` or `it` was called with no enclosing `describe`
    RegistrationMisuse,
    /// The case-name filter is not a valid regular expression
    InvalidFilter,
}

/// A specification error with case context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecError {
    pub kind: ErrorKind,
    pub message: String,
    /// Full name of the case this error was recorded on
    pub case: Option<String>,
}

impl SpecError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            case: None,
        }
    }

    pub fn with_case(mut self, case: impl Into<String>) -> Self {
        self.case = Some(case.into());
        self
    }

    pub fn assertion(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::AssertionFailed, msg)
    }

    pub fn panicked(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Panicked, format!("panicked: {}", msg.into()))
    }

    pub fn body(err: impl std::fmt::Display) -> Self {
        Self::new(ErrorKind::BodyError, err.to_string())
    }

    pub fn hook_failed(group: &str, msg: &str) -> Self {
        Self::new(
            ErrorKind::HookFailed,
            format!("before hook of {} panicked: {}", group, msg),
        )
    }

    pub fn misuse(call: &str) -> Self {
        Self::new(
            ErrorKind::RegistrationMisuse,
            format!("{} called outside of describe; ignored", call),
        )
    }

    pub fn is_assertion(&self) -> bool {
        self.kind == ErrorKind::AssertionFailed
    }
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref case) = self.case {
            write!(f, "{}: ", case)?;
        }
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SpecError {}

impl From<regex::Error> for SpecError {
    fn from(e: regex::Error) -> Self {
        Self::new(ErrorKind::InvalidFilter, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_without_case() {
        let err = SpecError::assertion("expected `1` to be `2`");
        assert_eq!(err.to_string(), "expected `1` to be `2`");
    }

    #[test]
    fn test_display_with_case() {
        let err = SpecError::assertion("boom").with_case("Foo works");
        assert_eq!(err.to_string(), "Foo works: boom");
        assert!(err.is_assertion());
    }

    #[test]
    fn test_hook_failed_message() {
        let err = SpecError::hook_failed("Foo", "no db");
        assert_eq!(err.kind, ErrorKind::HookFailed);
        assert_eq!(err.message, "before hook of Foo panicked: no db");
    }

    #[test]
    fn test_body_error_keeps_message() {
        let err = SpecError::body("disk full");
        assert_eq!(err.kind, ErrorKind::BodyError);
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn test_invalid_filter_from_regex() {
        let err: SpecError = regex::Regex::new("(").unwrap_err().into();
        assert_eq!(err.kind, ErrorKind::InvalidFilter);
    }
}
