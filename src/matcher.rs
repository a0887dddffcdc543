//! Matcher protocol
//!
//! A matcher judges a candidate value and explains a mismatch. `Ok(())` is a
//! passing verdict; `Err` carries the diagnostic. Matchers must not mutate the
//! candidate, so they only ever see it by shared reference.

use std::fmt::Debug;
use similar::TextDiff;
use crate::error::SpecError;

/// A value comparison usable with `that(..).should(..)` and `should_not(..)`
pub trait Matcher<T: ?Sized> {
    /// Verdict for the positive form
    fn should(&self, actual: &T) -> Result<(), SpecError>;

    /// Verdict for the negated form
    fn should_not(&self, actual: &T) -> Result<(), SpecError>;
}

/// Equality matcher returned by [`be`]
#[derive(Debug, Clone)]
pub struct Be<E> {
    expected: E,
}

/// Match a value equal to `expected`.
pub fn be<E>(expected: E) -> Be<E> {
    Be { expected }
}

impl<T, E> Matcher<T> for Be<E>
where
    T: PartialEq<E> + Debug + ?Sized,
    E: Debug,
{
    fn should(&self, actual: &T) -> Result<(), SpecError> {
        if actual == &self.expected {
            return Ok(());
        }
        let mut msg = format!("expected `{:?}` to be `{:?}`", actual, self.expected);
        if let Some(diff) = pretty_diff(actual, &self.expected) {
            msg.push('\n');
            msg.push_str(&diff);
        }
        Err(SpecError::assertion(msg))
    }

    fn should_not(&self, actual: &T) -> Result<(), SpecError> {
        if actual == &self.expected {
            return Err(SpecError::assertion(format!(
                "expected `{:?}` not to be `{:?}`",
                actual, self.expected
            )));
        }
        Ok(())
    }
}

/// Unified diff of the pretty-printed values, only when they span lines.
fn pretty_diff<A: Debug + ?Sized, B: Debug>(actual: &A, expected: &B) -> Option<String> {
    let actual = format!("{:#?}\n", actual);
    let expected = format!("{:#?}\n", expected);
    if actual.lines().count() < 2 && expected.lines().count() < 2 {
        return None;
    }
    let diff = TextDiff::from_lines(&actual, &expected);
    Some(diff.unified_diff().header("actual", "expected").to_string())
}
