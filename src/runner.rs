//! Execution engine
//!
//! Walks a [`Specification`] depth-first in declaration order, runs before
//! hooks and test bodies, and forwards one event per case to a [`Reporter`].
//! Every hook and body runs inside its own unwind boundary, so a panic fails
//! only the cases that depend on it.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use std::time::{Duration, Instant};
use regex::Regex;
use crate::assertion::It;
use crate::error::SpecError;
use crate::reporter::{DotReporter, Reporter};
use crate::spec::{Case, Example, Group, Hook, Specification};

/// When before hooks run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HookPolicy {
    /// Once when the group starts, before its first case
    #[default]
    OncePerGroup,
    /// Before every case, outermost group first
    EachCase,
}

/// Which of a group's before hooks run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BeforePolicy {
    /// Only the last registered hook
    #[default]
    LastWins,
    /// Every hook, in registration order
    Stack,
}

/// Configuration for a run
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Only run cases whose full name matches this regular expression
    pub filter: Option<String>,
    pub hook_policy: HookPolicy,
    pub before_policy: BeforePolicy,
    /// Verbose mode: print the execution log
    pub verbose: bool,
}

/// Result of a single test case
#[derive(Debug, Clone)]
pub struct CaseResult {
    /// Full name: enclosing group names followed by the case name
    pub name: String,
    pub passed: bool,
    /// Failure diagnostic if failed
    pub error: Option<SpecError>,
    /// Number of assertions the body evaluated
    pub assertions: usize,
    pub duration: Duration,
}

/// Result of a whole run
#[derive(Debug)]
pub struct RunResult {
    /// Executed cases, in execution order
    pub cases: Vec<CaseResult>,
    /// Cases excluded by the filter
    pub filtered: usize,
    /// Execution log
    pub log: String,
    pub duration: Duration,
}

impl RunResult {
    pub fn all_passed(&self) -> bool {
        self.cases.iter().all(|c| c.passed)
    }

    pub fn passed_count(&self) -> usize {
        self.cases.iter().filter(|c| c.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.cases.iter().filter(|c| !c.passed).count()
    }

    /// Format a summary line
    pub fn summary(&self) -> String {
        format!(
            "{} passed, {} failed, {} filtered ({}ms)",
            self.passed_count(),
            self.failed_count(),
            self.filtered,
            self.duration.as_millis(),
        )
    }
}

/// The runner: validated configuration, reusable across runs
#[derive(Default)]
pub struct Runner {
    config: RunConfig,
    filter: Option<Regex>,
}

impl Runner {
    /// Create a runner. Fails only if the filter is not a valid regex.
    pub fn new(config: RunConfig) -> Result<Self, SpecError> {
        let filter = match config.filter {
            Some(ref pattern) => Some(Regex::new(pattern)?),
            None => None,
        };
        Ok(Self { config, filter })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run every group of `spec`, then call `reporter.finish()` once.
    pub fn run(&self, spec: &Specification, reporter: &mut dyn Reporter) -> RunResult {
        let start = Instant::now();
        let mut exec = Execution {
            runner: self,
            reporter,
            cases: Vec::new(),
            log: String::new(),
        };

        for warning in spec.warnings() {
            exec.logf(&format!("[warning: {}]", warning));
        }

        let mut ancestors = Vec::new();
        for group in spec.groups() {
            exec.run_group(group, "", &mut ancestors, None);
        }
        exec.reporter.finish();

        let filtered = spec.case_count() - exec.cases.len();
        RunResult {
            cases: exec.cases,
            filtered,
            log: exec.log,
            duration: start.elapsed(),
        }
    }

    fn selected(&self, full_name: &str) -> bool {
        self.filter.as_ref().map_or(true, |re| re.is_match(full_name))
    }

    fn any_selected(&self, group: &Group, path: &str) -> bool {
        group.children().iter().any(|child| match child {
            Example::Case(case) => self.selected(&join(path, case.name())),
            Example::Group(inner) => self.any_selected(inner, &join(path, inner.name())),
        })
    }

    fn active_hooks<'g>(&self, group: &'g Group) -> &'g [Hook] {
        let hooks = group.hooks();
        match self.config.before_policy {
            BeforePolicy::Stack => hooks,
            BeforePolicy::LastWins => &hooks[hooks.len().saturating_sub(1)..],
        }
    }
}

/// State of one run in progress
struct Execution<'a, 'r> {
    runner: &'a Runner,
    reporter: &'r mut dyn Reporter,
    cases: Vec<CaseResult>,
    log: String,
}

impl Execution<'_, '_> {
    fn logf(&mut self, msg: &str) {
        self.log.push_str(msg);
        if !msg.ends_with('\n') {
            self.log.push('\n');
        }
    }

    /// `ancestors` holds the enclosing groups with their full paths, used to
    /// replay hooks under `HookPolicy::EachCase`. `broken` is a failed hook of
    /// an enclosing group, inherited by every case below it.
    fn run_group<'g>(
        &mut self,
        group: &'g Group,
        parent: &str,
        ancestors: &mut Vec<(&'g Group, String)>,
        broken: Option<&SpecError>,
    ) {
        let path = join(parent, group.name());
        if self.runner.filter.is_some() && !self.runner.any_selected(group, &path) {
            return;
        }
        self.logf(&format!("> describe {}", path));

        let mut own_failure = None;
        if self.runner.config.hook_policy == HookPolicy::OncePerGroup && broken.is_none() {
            own_failure = self.run_hooks(group, &path).err();
        }
        let broken = broken.or(own_failure.as_ref());

        ancestors.push((group, path.clone()));
        for child in group.children() {
            match child {
                Example::Case(case) => self.run_case(case, &path, ancestors, broken),
                Example::Group(inner) => self.run_group(inner, &path, ancestors, broken),
            }
        }
        ancestors.pop();
    }

    fn run_case(
        &mut self,
        case: &Case,
        parent: &str,
        ancestors: &[(&Group, String)],
        broken: Option<&SpecError>,
    ) {
        let name = join(parent, case.name());
        if !self.runner.selected(&name) {
            return;
        }
        self.logf(&format!("it {}", name));
        let start = Instant::now();

        let mut setup_failure = broken.cloned();
        if setup_failure.is_none() && self.runner.config.hook_policy == HookPolicy::EachCase {
            for (group, path) in ancestors {
                if let Err(e) = self.run_hooks(group, path) {
                    setup_failure = Some(e);
                    break;
                }
            }
        }

        let mut it = It::new(name.clone());
        match setup_failure {
            Some(e) => it.fail(e),
            None => {
                let body = case.body();
                match isolate(|| body(&mut it)) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => it.fail(e),
                    Err(payload) => it.fail(SpecError::panicked(panic_message(&*payload))),
                }
            }
        }

        let assertions = it.assertions();
        let error = it.into_failure();
        match error {
            Some(ref e) => {
                self.logf(&format!("[failed: {}]", e.message));
                self.reporter.fail(e.clone());
            }
            None => self.reporter.pass(),
        }

        self.cases.push(CaseResult {
            name,
            passed: error.is_none(),
            error,
            assertions,
            duration: start.elapsed(),
        });
    }

    fn run_hooks(&mut self, group: &Group, path: &str) -> Result<(), SpecError> {
        for hook in self.runner.active_hooks(group) {
            self.logf(&format!("before {}", path));
            if let Err(payload) = isolate(|| hook()) {
                let msg = panic_message(&*payload);
                self.logf(&format!("[before hook panicked: {}]", msg));
                return Err(SpecError::hook_failed(path, &msg));
            }
        }
        Ok(())
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{} {}", parent, name)
    }
}

thread_local! {
    static ISOLATING: Cell<bool> = Cell::new(false);
}

static QUIET_PANICS: Once = Once::new();

/// Run `f` under an unwind boundary. Panics raised on this thread while
/// isolating skip the previously installed panic hook; their message ends
/// up in the case diagnostic instead.
fn isolate<R>(f: impl FnOnce() -> R) -> std::thread::Result<R> {
    QUIET_PANICS.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !ISOLATING.with(Cell::get) {
                previous(info);
            }
        }));
    });

    let outer = ISOLATING.with(|flag| flag.replace(true));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    ISOLATING.with(|flag| flag.set(outer));
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Builder API for convenient runner construction
#[derive(Default)]
pub struct RunnerBuilder {
    config: RunConfig,
}

impl RunnerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the case-name filter (a regular expression)
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.config.filter = Some(filter.into());
        self
    }

    pub fn hook_policy(mut self, policy: HookPolicy) -> Self {
        self.config.hook_policy = policy;
        self
    }

    pub fn before_policy(mut self, policy: BeforePolicy) -> Self {
        self.config.before_policy = policy;
        self
    }

    /// Enable verbose output
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    /// Validate the configuration and return the runner
    pub fn build(self) -> Result<Runner, SpecError> {
        Runner::new(self.config)
    }

    /// Build and run `spec` against `reporter`
    pub fn run(
        self,
        spec: &Specification,
        reporter: &mut dyn Reporter,
    ) -> Result<RunResult, SpecError> {
        Ok(self.build()?.run(spec, reporter))
    }
}

impl Specification {
    /// Run with the default configuration.
    pub fn run(&self, reporter: &mut dyn Reporter) -> RunResult {
        Runner::default().run(self, reporter)
    }
}

/// Run a specification and integrate with `#[test]` by panicking on failure.
///
/// Usage in cargo tests:
/// ```rust,ignore
/// #[test]
/// fn specs() {
///     let mut spec = specify::Specification::new();
///     // describe ...
///     specify::run_and_assert(&spec);
/// }
/// ```
pub fn run_and_assert(spec: &Specification) {
    run_and_assert_with(spec, |_| {});
}

/// Like `run_and_assert` but allows configuration.
///
/// `SPECIFY_VERBOSE` enables the execution log and `SPECIFY_FILTER` sets the
/// case filter; `customize` runs after both are applied.
pub fn run_and_assert_with(spec: &Specification, customize: impl FnOnce(&mut RunConfig)) {
    let mut config = RunConfig {
        verbose: std::env::var("SPECIFY_VERBOSE").is_ok(),
        filter: std::env::var("SPECIFY_FILTER").ok(),
        ..Default::default()
    };
    customize(&mut config);

    let verbose = config.verbose;
    let runner = Runner::new(config).expect("invalid run configuration");
    let mut reporter = DotReporter::new();
    let result = runner.run(spec, &mut reporter);

    if verbose {
        eprintln!("--- log ---");
        for line in result.log.lines() {
            eprintln!("  {}", line);
        }
    }
    eprintln!("{}", result.summary());

    if !result.all_passed() {
        panic!("{} test(s) failed", result.failed_count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::matcher::be;
    use crate::reporter::BasicReporter;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    type Trace = Rc<RefCell<Vec<String>>>;

    fn push(trace: &Trace, s: &str) {
        trace.borrow_mut().push(s.to_string());
    }

    /// Two groups; "A" has a hook and two cases, "B" nests "C" between cases.
    fn traced_spec(trace: &Trace) -> Specification {
        let mut spec = Specification::new();
        let t = trace.clone();
        spec.describe("A", move |g| {
            let h = t.clone();
            g.before(move || push(&h, "before A"));
            let c = t.clone();
            g.it("one", move |_| push(&c, "A one"));
            let c = t.clone();
            g.it("two", move |_| push(&c, "A two"));
        });
        let t = trace.clone();
        spec.describe("B", move |g| {
            let c = t.clone();
            g.it("three", move |_| push(&c, "B three"));
            let inner = t.clone();
            g.describe("C", move |g| {
                let h = inner.clone();
                g.before(move || push(&h, "before C"));
                let c = inner.clone();
                g.it("four", move |_| push(&c, "C four"));
            });
            let c = t.clone();
            g.it("five", move |_| push(&c, "B five"));
        });
        spec
    }

    fn names(result: &RunResult) -> Vec<&str> {
        result.cases.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_hook_runs_once_per_group_before_first_case() {
        let trace = Trace::default();
        let spec = traced_spec(&trace);
        let result = spec.run(&mut BasicReporter);

        assert_eq!(
            *trace.borrow(),
            vec!["before A", "A one", "A two", "B three", "before C", "C four", "B five"]
        );
        assert_eq!(names(&result), vec!["A one", "A two", "B three", "B C four", "B five"]);
        assert!(result.all_passed());
    }

    #[test]
    fn test_each_case_policy_replays_ancestor_hooks() {
        let trace = Trace::default();
        let spec = traced_spec(&trace);
        let mut outer = Specification::new();
        let t = trace.clone();
        outer.describe("Outer", move |g| {
            let h = t.clone();
            g.before(move || push(&h, "before Outer"));
            g.describe("Inner", move |g| {
                let h = t.clone();
                g.before(move || push(&h, "before Inner"));
                let c = t.clone();
                g.it("x", move |_| push(&c, "x"));
                let c = t.clone();
                g.it("y", move |_| push(&c, "y"));
            });
        });

        let runner = RunnerBuilder::new().hook_policy(HookPolicy::EachCase).build().unwrap();
        runner.run(&spec, &mut BasicReporter);
        assert_eq!(
            trace.borrow()[..4].to_vec(),
            vec!["before A", "A one", "before A", "A two"]
        );

        trace.borrow_mut().clear();
        runner.run(&outer, &mut BasicReporter);
        assert_eq!(
            *trace.borrow(),
            vec![
                "before Outer",
                "before Inner",
                "x",
                "before Outer",
                "before Inner",
                "y",
            ]
        );
    }

    #[test]
    fn test_before_policy() {
        let build = |trace: &Trace| {
            let mut spec = Specification::new();
            let t = trace.clone();
            spec.describe("A", move |g| {
                let h = t.clone();
                g.before(move || push(&h, "first"));
                let h = t.clone();
                g.before(move || push(&h, "second"));
                g.it("case", |_| {});
            });
            spec
        };

        let trace = Trace::default();
        build(&trace).run(&mut BasicReporter);
        assert_eq!(*trace.borrow(), vec!["second"]);

        let trace = Trace::default();
        RunnerBuilder::new()
            .before_policy(BeforePolicy::Stack)
            .run(&build(&trace), &mut BasicReporter)
            .unwrap();
        assert_eq!(*trace.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn test_panicking_body_is_isolated() {
        let mut spec = Specification::new();
        spec.describe("Faults", |g| {
            g.it("explodes", |_| panic!("kaboom"));
            g.it("formats", |_| panic!("bad value {}", 7));
            g.it("survives", |it| {
                it.that(1).should(be(1));
            });
        });

        let result = spec.run(&mut BasicReporter);
        assert_eq!(result.passed_count(), 1);
        assert_eq!(result.failed_count(), 2);

        let err = result.cases[0].error.as_ref().unwrap();
        assert_eq!(err.kind, ErrorKind::Panicked);
        assert_eq!(err.to_string(), "Faults explodes: panicked: kaboom");
        assert_eq!(result.cases[1].error.as_ref().unwrap().message, "panicked: bad value 7");
    }

    #[test]
    fn test_assertion_failure_before_panic_wins() {
        let mut spec = Specification::new();
        spec.describe("A", |g| {
            g.it("both", |it| {
                it.that(1).should(be(2));
                panic!("later");
            });
        });

        let result = spec.run(&mut BasicReporter);
        let err = result.cases[0].error.as_ref().unwrap();
        assert!(err.is_assertion());
        assert_eq!(result.cases[0].assertions, 1);
    }

    #[test]
    fn test_body_error_fails_case() {
        let mut spec = Specification::new();
        spec.describe("A", |g| {
            g.it_result("returns err", |_| Err::<(), _>("connection refused"));
            g.it_result("returns ok", |_| Ok::<(), String>(()));
        });

        let result = spec.run(&mut BasicReporter);
        let err = result.cases[0].error.as_ref().unwrap();
        assert_eq!(err.kind, ErrorKind::BodyError);
        assert_eq!(err.to_string(), "A returns err: connection refused");
        assert!(result.cases[1].passed);
    }

    #[test]
    fn test_assertion_failure_before_body_error_wins() {
        let mut spec = Specification::new();
        spec.describe("A", |g| {
            g.it_result("both", |it| {
                it.that(1).should(be(2));
                Err::<(), _>("io")
            });
        });

        let result = spec.run(&mut BasicReporter);
        assert!(result.cases[0].error.as_ref().unwrap().is_assertion());
    }

    #[test]
    fn test_hook_of_caseless_group_runs_once() {
        let ran = Rc::new(Cell::new(0));
        let mut spec = Specification::new();
        let r = ran.clone();
        spec.describe("Setup only", move |g| g.before(move || r.set(r.get() + 1)));

        let result = spec.run(&mut BasicReporter);
        assert_eq!(ran.get(), 1);
        assert!(result.cases.is_empty());
        assert_eq!(result.log, "> describe Setup only\nbefore Setup only\n");
    }

    #[test]
    fn test_filter_still_skips_caseless_group() {
        let ran = Rc::new(Cell::new(0));
        let mut spec = Specification::new();
        let r = ran.clone();
        spec.describe("Setup only", move |g| g.before(move || r.set(r.get() + 1)));

        RunnerBuilder::new()
            .filter("anything")
            .run(&spec, &mut BasicReporter)
            .unwrap();
        assert_eq!(ran.get(), 0);
    }

    #[test]
    fn test_isolate_restores_outer_state() {
        assert!(!ISOLATING.with(Cell::get));
        let outer = isolate(|| {
            let inner = isolate::<()>(|| panic!("inner"));
            assert!(inner.is_err());
            assert!(ISOLATING.with(Cell::get));
            7
        });
        assert_eq!(outer.unwrap(), 7);
        assert!(!ISOLATING.with(Cell::get));

        let payload = isolate::<()>(|| panic!("quiet")).unwrap_err();
        assert_eq!(panic_message(&*payload), "quiet");
    }

    #[test]
    fn test_panicking_hook_fails_dependent_cases() {
        let ran = Rc::new(Cell::new(false));
        let mut spec = Specification::new();
        let r = ran.clone();
        spec.describe("Broken", move |g| {
            g.before(|| panic!("no database"));
            let r1 = r.clone();
            g.it("one", move |_| r1.set(true));
            g.describe("Nested", move |g| {
                let r2 = r.clone();
                g.it("two", move |_| r2.set(true));
            });
        });
        spec.describe("Fine", |g| {
            g.it("three", |_| {});
        });

        let result = spec.run(&mut BasicReporter);
        assert!(!ran.get());
        assert_eq!(result.failed_count(), 2);
        assert_eq!(result.passed_count(), 1);

        let err = result.cases[1].error.as_ref().unwrap();
        assert_eq!(err.kind, ErrorKind::HookFailed);
        assert_eq!(
            err.to_string(),
            "Broken Nested two: before hook of Broken panicked: no database"
        );
    }

    #[test]
    fn test_filter_selects_cases_and_skips_idle_hooks() {
        let trace = Trace::default();
        let spec = traced_spec(&trace);
        let result = RunnerBuilder::new()
            .filter("^B C")
            .run(&spec, &mut BasicReporter)
            .unwrap();

        assert_eq!(names(&result), vec!["B C four"]);
        assert_eq!(result.filtered, 4);
        assert_eq!(*trace.borrow(), vec!["before C", "C four"]);
    }

    #[test]
    fn test_invalid_filter_is_rejected() {
        let err = RunnerBuilder::new().filter("(").build().err().unwrap();
        assert_eq!(err.kind, ErrorKind::InvalidFilter);
    }

    #[test]
    fn test_log_records_execution() {
        let mut spec = Specification::new();
        spec.it("stray", |_| {});
        spec.describe("Foo", |g| {
            g.before(|| {});
            g.it("fails", |it| {
                it.that(1).should(be(2));
            });
        });

        let result = spec.run(&mut BasicReporter);
        let lines: Vec<&str> = result.log.lines().collect();
        assert_eq!(
            lines,
            vec![
                "[warning: stray: it called outside of describe; ignored]",
                "> describe Foo",
                "before Foo",
                "it Foo fails",
                "[failed: expected `1` to be `2`]",
            ]
        );
    }

    #[test]
    fn test_run_summary() {
        let mut spec = Specification::new();
        spec.describe("A", |g| {
            g.it("ok", |_| {});
            g.it("bad", |it| {
                it.that("x").should(be("y"));
            });
        });

        let result = spec.run(&mut BasicReporter);
        assert!(!result.all_passed());
        assert!(result.summary().starts_with("1 passed, 1 failed, 0 filtered ("));
    }
}
