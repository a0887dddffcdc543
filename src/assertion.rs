//! Assertion binding
//!
//! An [`It`] handle is created for one executing test case and handed to its
//! body. `it.that(value).should(matcher)` runs the matcher and records the
//! verdict on the handle. Only the first failure is kept; later assertions
//! still run.

use crate::error::SpecError;
use crate::matcher::Matcher;

/// Assertion handle scoped to one executing test case
#[derive(Debug)]
pub struct It {
    case: String,
    failure: Option<SpecError>,
    assertions: usize,
}

impl It {
    pub(crate) fn new(case: impl Into<String>) -> Self {
        Self {
            case: case.into(),
            failure: None,
            assertions: 0,
        }
    }

    /// Full name of the owning test case
    pub fn name(&self) -> &str {
        &self.case
    }

    /// Capture a value to assert on.
    pub fn that<T>(&mut self, value: T) -> That<'_, T> {
        That { it: self, value }
    }

    /// Record a failure. Ignored if one was already recorded.
    pub fn fail(&mut self, err: SpecError) {
        if self.failure.is_none() {
            self.failure = Some(err.with_case(self.case.clone()));
        }
    }

    /// Whether a failure has been recorded so far
    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Number of assertions evaluated so far
    pub fn assertions(&self) -> usize {
        self.assertions
    }

    pub(crate) fn into_failure(self) -> Option<SpecError> {
        self.failure
    }
}

/// A captured value waiting for a matcher
pub struct That<'h, T> {
    it: &'h mut It,
    value: T,
}

impl<'h, T> That<'h, T> {
    /// Assert that `matcher` accepts the value. Returns whether it passed.
    pub fn should<M: Matcher<T>>(self, matcher: M) -> bool {
        let verdict = matcher.should(&self.value);
        self.record(verdict)
    }

    /// Assert that `matcher` rejects the value. Returns whether it passed.
    pub fn should_not<M: Matcher<T>>(self, matcher: M) -> bool {
        let verdict = matcher.should_not(&self.value);
        self.record(verdict)
    }

    fn record(self, verdict: Result<(), SpecError>) -> bool {
        self.it.assertions += 1;
        match verdict {
            Ok(()) => true,
            Err(e) => {
                self.it.fail(e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::be;

    #[test]
    fn test_passing_assertions_record_nothing() {
        let mut it = It::new("Foo works");
        assert!(it.that(1).should(be(1)));
        assert!(it.that(1).should_not(be(2)));
        assert!(!it.failed());
        assert_eq!(it.assertions(), 2);
        assert!(it.into_failure().is_none());
    }

    #[test]
    fn test_first_failure_wins() {
        let mut it = It::new("Foo works");
        assert!(!it.that(1).should(be(2)));
        assert!(!it.that(3).should(be(4)));
        assert!(it.that(5).should(be(5)));
        assert_eq!(it.assertions(), 3);

        let failure = it.into_failure().unwrap();
        assert_eq!(failure.case.as_deref(), Some("Foo works"));
        assert_eq!(failure.message, "expected `1` to be `2`");
    }

    #[test]
    fn test_manual_fail_respects_first_failure() {
        let mut it = It::new("case");
        it.fail(SpecError::assertion("first"));
        it.fail(SpecError::assertion("second"));
        assert_eq!(it.into_failure().unwrap().message, "first");
    }
}
