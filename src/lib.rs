//! specify: a behavior-driven specification engine
//!
//! Specifications are registered with nested `describe` blocks, `before`
//! hooks and `it` cases, then executed as a separate phase that reports each
//! outcome to a [`Reporter`].
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use specify::{be, DotReporter, Specification};
//!
//! let mut spec = Specification::new();
//! spec.describe("Stack", |g| {
//!     let len = Rc::new(Cell::new(0));
//!     let l = len.clone();
//!     g.before(move || l.set(3));
//!     g.it("has three items", move |it| {
//!         it.that(len.get()).should(be(3));
//!         it.that(len.get()).should_not(be(0));
//!     });
//! });
//!
//! let mut reporter = DotReporter::with_writer(Vec::new());
//! let result = spec.run(&mut reporter);
//! assert!(result.all_passed());
//! assert_eq!(reporter.summary(), "Passed: 1 Failed: 0 Total: 1");
//! ```
//!
//! # Semantics
//!
//! | Concern | Behavior |
//! |---------|----------|
//! | Order | Declaration order, depth-first |
//! | `before` | Once per group by default; see [`HookPolicy`] |
//! | Several `before` | Last wins by default; see [`BeforePolicy`] |
//! | Failures | First failure per case wins |
//! | Panics | Isolated per case, reported as failures |
//! | `before`/`it` outside `describe` | Inert, recorded as a warning |

mod error;
mod matcher;
mod assertion;
mod spec;
mod reporter;
mod runner;

pub use error::{SpecError, ErrorKind};
pub use matcher::{Matcher, Be, be};
pub use assertion::{It, That};
pub use spec::{Specification, GroupBuilder, Group, Case, Example, Hook, Body};
pub use reporter::{Reporter, BasicReporter, DotReporter};
pub use runner::{
    Runner, RunnerBuilder, RunConfig, RunResult, CaseResult, HookPolicy, BeforePolicy,
};

// Convenience functions for cargo test integration
pub use runner::{run_and_assert, run_and_assert_with};
