//! Specification tree
//!
//! Registration runs eagerly: `describe` hands a [`GroupBuilder`] to its
//! block, runs the block immediately and appends the finished group. Nested
//! `describe` calls register child groups of the enclosing builder, so the
//! tree always mirrors the declaration order.
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use specify::{be, Specification};
//!
//! let mut spec = Specification::new();
//! spec.describe("Foo", |g| {
//!     let val = Rc::new(Cell::new(0));
//!     let hook_val = val.clone();
//!     g.before(move || hook_val.set(42));
//!     g.it("is set up", move |it| {
//!         it.that(val.get()).should_not(be(0));
//!     });
//! });
//! assert_eq!(spec.case_count(), 1);
//! ```

use std::fmt::Display;
use crate::assertion::It;
use crate::error::SpecError;

/// A setup hook
pub type Hook = Box<dyn Fn()>;

/// A type-erased test body
pub type Body = Box<dyn Fn(&mut It) -> Result<(), SpecError>>;

/// A named test case ("it")
pub struct Case {
    name: String,
    body: Body,
}

impl Case {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn body(&self) -> &Body {
        &self.body
    }
}

/// A named group ("describe") owning hooks and children in declaration order
pub struct Group {
    name: String,
    hooks: Vec<Hook>,
    children: Vec<Example>,
}

impl Group {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hooks: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registered before hooks, in registration order
    pub fn hooks(&self) -> &[Hook] {
        &self.hooks
    }

    pub fn children(&self) -> &[Example] {
        &self.children
    }

    /// Number of cases in this group and every nested group
    pub fn case_count(&self) -> usize {
        self.children.iter().map(Example::case_count).sum()
    }
}

/// A node of the specification tree
pub enum Example {
    Case(Case),
    Group(Group),
}

impl Example {
    pub fn name(&self) -> &str {
        match self {
            Example::Case(c) => c.name(),
            Example::Group(g) => g.name(),
        }
    }

    pub fn case_count(&self) -> usize {
        match self {
            Example::Case(_) => 1,
            Example::Group(g) => g.case_count(),
        }
    }
}

/// Builder handed to a `describe` block
pub struct GroupBuilder {
    group: Group,
}

impl GroupBuilder {
    /// Name of the group being registered
    pub fn name(&self) -> &str {
        &self.group.name
    }

    /// Register a nested group. `block` runs before this call returns.
    pub fn describe(
        &mut self,
        name: impl Into<String>,
        block: impl FnOnce(&mut GroupBuilder),
    ) {
        let group = build_group(name, block);
        self.group.children.push(Example::Group(group));
    }

    /// Attach a setup hook to this group.
    pub fn before<F>(&mut self, hook: F)
    where
        F: Fn() + 'static,
    {
        self.group.hooks.push(Box::new(hook));
    }

    /// Append a test case to this group.
    pub fn it<F>(&mut self, name: impl Into<String>, body: F)
    where
        F: Fn(&mut It) + 'static,
    {
        self.push_case(name, Box::new(move |it: &mut It| -> Result<(), SpecError> {
            body(it);
            Ok(())
        }));
    }

    /// Append a test case whose body returns a `Result`. An `Err` fails the
    /// case unless an assertion already failed.
    pub fn it_result<F, E>(&mut self, name: impl Into<String>, body: F)
    where
        F: Fn(&mut It) -> Result<(), E> + 'static,
        E: Display,
    {
        self.push_case(name, Box::new(move |it: &mut It| body(it).map_err(SpecError::body)));
    }

    fn push_case(&mut self, name: impl Into<String>, body: Body) {
        self.group.children.push(Example::Case(Case {
            name: name.into(),
            body,
        }));
    }
}

fn build_group(name: impl Into<String>, block: impl FnOnce(&mut GroupBuilder)) -> Group {
    let mut builder = GroupBuilder {
        group: Group::new(name),
    };
    block(&mut builder);
    builder.group
}

/// The top-level specification: an ordered list of groups
#[derive(Default)]
pub struct Specification {
    groups: Vec<Group>,
    warnings: Vec<SpecError>,
}

impl Specification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a top-level group. `block` runs before this call returns.
    pub fn describe(
        &mut self,
        name: impl Into<String>,
        block: impl FnOnce(&mut GroupBuilder),
    ) -> &mut Self {
        let group = build_group(name, block);
        self.groups.push(group);
        self
    }

    /// A hook with no enclosing `describe` is inert; the call is only noted
    /// in [`Specification::warnings`].
    pub fn before<F>(&mut self, _hook: F) -> &mut Self
    where
        F: Fn() + 'static,
    {
        self.warnings.push(SpecError::misuse("before"));
        self
    }

    /// A case with no enclosing `describe` is inert; the call is only noted
    /// in [`Specification::warnings`].
    pub fn it<F>(&mut self, name: impl Into<String>, _body: F) -> &mut Self
    where
        F: Fn(&mut It) + 'static,
    {
        let name = name.into();
        self.warnings.push(SpecError::misuse("it").with_case(name));
        self
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Non-fatal registration problems
    pub fn warnings(&self) -> &[SpecError] {
        &self.warnings
    }

    pub fn case_count(&self) -> usize {
        self.groups.iter().map(Group::case_count).sum()
    }
}
