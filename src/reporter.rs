//! Reporters
//!
//! A reporter receives one `pass` or `fail` event per executed test case and
//! a single `finish` at the end of a run. Reporters never fail: output errors
//! are swallowed.

use std::io::{self, Write};
use crate::error::SpecError;

/// Sink for test outcomes
pub trait Reporter {
    /// A test case passed
    fn pass(&mut self);

    /// A test case failed with `diagnostic`
    fn fail(&mut self, diagnostic: SpecError);

    /// The run is over
    fn finish(&mut self);

    /// Run an ad-hoc test outside any specification tree and report it.
    fn run(&mut self, test: &mut dyn FnMut() -> Result<(), SpecError>) -> bool {
        match test() {
            Ok(()) => {
                self.pass();
                true
            }
            Err(e) => {
                self.fail(e);
                false
            }
        }
    }
}

/// Reporter that accepts every event and keeps nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicReporter;

impl Reporter for BasicReporter {
    fn pass(&mut self) {}
    fn fail(&mut self, _diagnostic: SpecError) {}
    fn finish(&mut self) {}
}

/// Incremental reporter: one progress character per case, then a summary.
///
/// ```text
/// .F.
/// FAILED TESTS:
/// - Foo fails: expected `1` to be `2`
/// Passed: 2 Failed: 1 Total: 3
/// ```
pub struct DotReporter<W: Write = io::Stdout> {
    out: W,
    passed: usize,
    failed: usize,
    failures: Vec<SpecError>,
}

impl DotReporter<io::Stdout> {
    /// Report to standard output
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl Default for DotReporter<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> DotReporter<W> {
    /// Report to an arbitrary writer
    pub fn with_writer(out: W) -> Self {
        Self {
            out,
            passed: 0,
            failed: 0,
            failures: Vec::new(),
        }
    }

    pub fn passed_count(&self) -> usize {
        self.passed
    }

    pub fn failed_count(&self) -> usize {
        self.failed
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    /// Recorded failures, in the order they were reported
    pub fn failures(&self) -> &[SpecError] {
        &self.failures
    }

    /// Format the summary line
    pub fn summary(&self) -> String {
        format!(
            "Passed: {} Failed: {} Total: {}",
            self.passed,
            self.failed,
            self.total(),
        )
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    pub fn into_writer(self) -> W {
        self.out
    }

    fn emit(&mut self, s: &str) {
        let _ = self.out.write_all(s.as_bytes());
        let _ = self.out.flush();
    }
}

impl<W: Write> Reporter for DotReporter<W> {
    fn pass(&mut self) {
        self.passed += 1;
        self.emit(".");
    }

    fn fail(&mut self, diagnostic: SpecError) {
        self.failed += 1;
        self.failures.push(diagnostic);
        self.emit("F");
    }

    fn finish(&mut self) {
        let mut text = String::from("\n");
        if self.failed > 0 {
            text.push_str("FAILED TESTS:\n");
            for failure in &self.failures {
                text.push_str(&format!("- {}\n", failure));
            }
        }
        text.push_str(&self.summary());
        text.push('\n');
        self.emit(&text);
    }
}
