//! specify CLI
//!
//! Run the engine's own self-specification.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::cell::Cell;
use std::process::ExitCode;
use std::rc::Rc;
use specify::{
    be, BasicReporter, BeforePolicy, DotReporter, HookPolicy, Reporter, RunnerBuilder,
    Specification,
};

#[derive(Parser, Debug)]
#[command(name = "specify")]
#[command(author = "nzinfo <li.monan@gmail.com>")]
#[command(version)]
#[command(about = "Run the specify self-specification")]
struct Cli {
    /// Only run cases whose full name matches this regular expression
    #[arg(short = 'f', long)]
    filter: Option<String>,

    /// Verbose output: show the execution log
    #[arg(short, long)]
    verbose: bool,

    /// Re-run before hooks before every case instead of once per group
    #[arg(long = "each")]
    each: bool,

    /// Run every registered before hook instead of only the last one
    #[arg(long = "stack")]
    stack: bool,

    /// Reporter to use
    #[arg(long, value_enum, default_value_t = ReporterKind::Dot)]
    reporter: ReporterKind,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ReporterKind {
    Dot,
    Basic,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut builder = RunnerBuilder::new()
        .verbose(cli.verbose)
        .hook_policy(if cli.each { HookPolicy::EachCase } else { HookPolicy::OncePerGroup })
        .before_policy(if cli.stack { BeforePolicy::Stack } else { BeforePolicy::LastWins });
    if let Some(filter) = cli.filter {
        builder = builder.filter(filter);
    }
    let runner = builder.build().context("invalid run configuration")?;

    let spec = self_spec();
    let mut reporter: Box<dyn Reporter> = match cli.reporter {
        ReporterKind::Dot => Box::new(DotReporter::new()),
        ReporterKind::Basic => Box::new(BasicReporter),
    };
    let result = runner.run(&spec, reporter.as_mut());

    if runner.config().verbose {
        println!("--- log ---");
        for line in result.log.lines() {
            println!("  {}", line);
        }
    }
    if let ReporterKind::Basic = cli.reporter {
        for case in result.cases.iter().filter(|c| !c.passed) {
            if let Some(ref err) = case.error {
                println!("FAIL  {}", err);
            }
        }
        println!("{}", result.summary());
    }

    Ok(result.all_passed())
}

/// Run `inner` silently and return its reporter.
fn run_quiet(inner: &Specification) -> DotReporter<Vec<u8>> {
    let mut reporter = DotReporter::with_writer(Vec::new());
    inner.run(&mut reporter);
    reporter
}

fn self_spec() -> Specification {
    let mut spec = Specification::new();

    spec.describe("Before", |g| {
        let passed = Rc::new(Cell::new(0));
        let p = passed.clone();
        g.before(move || {
            let mut inner = Specification::new();
            inner.describe("Foo", |g| {
                let val = Rc::new(Cell::new(0));
                let v = val.clone();
                g.before(move || v.set(42));
                g.it("sees the hook", move |it| {
                    it.that(val.get()).should_not(be(0));
                });
            });
            p.set(run_quiet(&inner).passed_count());
        });
        g.it("runs before the case", move |it| {
            it.that(passed.get()).should(be(1));
        });
    });

    spec.describe("Be", |g| {
        g.it("matches equal values", |it| {
            it.that(42).should(be(42));
            it.that(43).should_not(be(42));
        });
        g.it("explains a mismatch", |it| {
            let mut inner = Specification::new();
            inner.describe("Mismatch", |g| {
                g.it("fails", |it| {
                    it.that(1).should(be(2));
                });
                g.it("passes", |it| {
                    it.that(1).should(be(1));
                });
            });
            let reporter = run_quiet(&inner);
            it.that(reporter.summary()).should(be("Passed: 1 Failed: 1 Total: 2"));
            it.that(reporter.failures().len()).should(be(1));
        });
    });

    spec.describe("Isolation", |g| {
        g.it("turns a panic into a failure", |it| {
            let mut inner = Specification::new();
            inner.describe("Faulty", |g| {
                g.it("panics", |_| panic!("boom"));
                g.it("still runs", |_| {});
            });
            let reporter = run_quiet(&inner);
            it.that(reporter.failed_count()).should(be(1));
            it.that(reporter.passed_count()).should(be(1));
        });
    });

    spec
}
