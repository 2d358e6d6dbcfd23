//! Suites, test descriptors and explicit test registration.
//!
//! A suite is assembled through [`SuiteBuilder`]: every test is registered
//! with its name, a [`TestOptions`] record carrying its dependency metadata,
//! and its body. Nothing is discovered by introspection.
//!
//! ```rust
//! use integrate::{Suite, TestOptions};
//!
//! let suite = Suite::builder("accounts", Vec::<String>::new())
//!     .test("create", TestOptions::new(), |users, check| {
//!         users.push("alice".into());
//!         check.equal(users.len(), 1, None);
//!     })
//!     .test(
//!         "rename",
//!         TestOptions::new().skip_if_failed(["create"]),
//!         |users, check| check.equal(users[0].as_str(), "alice", Some("first user")),
//!     )
//!     .build();
//! assert_eq!(suite.len(), 2);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::{self, Debug, Display};

use crate::check::{short_type_name, Check};

/// Static declaration of one test: identity, dependencies and flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDescriptor {
    name: String,
    label: String,
    depends: Vec<String>,
    skip_if_failed: Vec<String>,
    skip: bool,
    expect_fail: bool,
}

impl TestDescriptor {
    pub fn new(name: impl Into<String>, options: TestOptions) -> Self {
        let name = name.into();
        Self {
            label: options.label.unwrap_or_else(|| name.clone()),
            name,
            depends: options.depends,
            skip_if_failed: options.skip_if_failed,
            skip: options.skip,
            expect_fail: options.expect_fail,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Tests that must run before this one.
    pub fn depends(&self) -> &[String] {
        &self.depends
    }

    /// Tests whose failure or skip forces this one to be skipped.
    pub fn skip_if_failed(&self) -> &[String] {
        &self.skip_if_failed
    }

    pub fn skip(&self) -> bool {
        self.skip
    }

    pub fn expect_fail(&self) -> bool {
        self.expect_fail
    }

    /// Both dependency kinds, `depends` first, in declared order.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.depends
            .iter()
            .chain(self.skip_if_failed.iter())
            .map(String::as_str)
    }
}

/// Per-test metadata supplied at registration time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestOptions {
    pub label: Option<String>,
    pub depends: Vec<String>,
    pub skip_if_failed: Vec<String>,
    pub skip: bool,
    pub expect_fail: bool,
}

impl TestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn depends<I, T>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.depends.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn skip_if_failed<I, T>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.skip_if_failed
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn expect_fail(mut self, expect_fail: bool) -> Self {
        self.expect_fail = expect_fail;
        self
    }
}

/// An error a test body or hook raised instead of recording it in its [`Check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uncaught {
    pub kind: String,
    pub message: String,
    /// Where a panic was raised, when known.
    pub location: Option<String>,
}

impl Uncaught {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            location: None,
        }
    }

    /// Wraps any displayable error, using its short type name as the kind.
    pub fn from_error<E: Display>(error: E) -> Self {
        Self::new(short_type_name::<E>(), error.to_string())
    }
}

impl Display for Uncaught {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

pub type TestBody<S> = Box<dyn FnMut(&mut S, &mut Check) -> Result<(), Uncaught>>;
pub type HookFn<S> = Box<dyn FnMut(&mut S) -> Result<(), Uncaught>>;

/// A descriptor paired with the body that executes it.
pub struct RegisteredTest<S> {
    pub descriptor: TestDescriptor,
    pub body: TestBody<S>,
}

/// The four optional lifecycle hooks of a suite.
pub struct Hooks<S> {
    pub setup_all: Option<HookFn<S>>,
    pub teardown_all: Option<HookFn<S>>,
    pub setup_test: Option<HookFn<S>>,
    pub teardown_test: Option<HookFn<S>>,
}

impl<S> Default for Hooks<S> {
    fn default() -> Self {
        Self {
            setup_all: None,
            teardown_all: None,
            setup_test: None,
            teardown_test: None,
        }
    }
}

/// A named collection of tests sharing a fixture and lifecycle hooks.
pub struct Suite<S = ()> {
    name: String,
    label: String,
    pub(crate) fixture: S,
    pub(crate) tests: Vec<RegisteredTest<S>>,
    pub(crate) hooks: Hooks<S>,
}

impl<S: Debug> Debug for Suite<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suite")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("fixture", &self.fixture)
            .field("tests", &self.descriptors())
            .finish()
    }
}

impl<S> Suite<S> {
    pub fn builder(name: impl Into<String>, fixture: S) -> SuiteBuilder<S> {
        let name = name.into();
        SuiteBuilder {
            label: name.clone(),
            name,
            fixture,
            tests: Vec::new(),
            hooks: Hooks::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn fixture(&self) -> &S {
        &self.fixture
    }

    pub fn fixture_mut(&mut self) -> &mut S {
        &mut self.fixture
    }

    pub fn descriptors(&self) -> Vec<TestDescriptor> {
        self.tests.iter().map(|t| t.descriptor.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Keeps the tests selected by a name prefix plus everything they
    /// transitively depend on. Returns the number of tests kept.
    ///
    /// A test is selected when the suite name starts with `prefix`, or when
    /// its qualified name `suite.test` does.
    pub fn select(&mut self, prefix: &str) -> usize {
        if self.name.starts_with(prefix) {
            return self.tests.len();
        }

        let by_name: HashMap<&str, &TestDescriptor> = self
            .tests
            .iter()
            .map(|t| (t.descriptor.name(), &t.descriptor))
            .collect();
        let mut keep: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<&str> = self
            .tests
            .iter()
            .map(|t| t.descriptor.name())
            .filter(|n| format!("{}.{}", self.name, n).starts_with(prefix))
            .collect();
        while let Some(name) = queue.pop_front() {
            if !keep.insert(name.to_string()) {
                continue;
            }
            // Unknown names are left for the graph builder to report.
            if let Some(&descriptor) = by_name.get(name) {
                queue.extend(descriptor.dependencies());
            }
        }

        self.tests.retain(|t| keep.contains(t.descriptor.name()));
        self.tests.len()
    }
}

/// Explicit registration of a suite's tests and hooks.
pub struct SuiteBuilder<S> {
    name: String,
    label: String,
    fixture: S,
    tests: Vec<RegisteredTest<S>>,
    hooks: Hooks<S>,
}

impl<S: 'static> SuiteBuilder<S> {
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Registers a test whose body only reports through its [`Check`].
    pub fn test<F>(self, name: impl Into<String>, options: TestOptions, mut body: F) -> Self
    where
        F: FnMut(&mut S, &mut Check) + 'static,
    {
        self.register(
            TestDescriptor::new(name, options),
            Box::new(move |fixture, check| {
                body(fixture, check);
                Ok(())
            }),
        )
    }

    /// Registers a test whose body may return an error; an `Err` becomes an
    /// uncaught failure tagged with the error's type name.
    pub fn try_test<F, E>(self, name: impl Into<String>, options: TestOptions, mut body: F) -> Self
    where
        F: FnMut(&mut S, &mut Check) -> Result<(), E> + 'static,
        E: Display,
    {
        self.register(
            TestDescriptor::new(name, options),
            Box::new(move |fixture, check| body(fixture, check).map_err(Uncaught::from_error)),
        )
    }

    pub fn register(mut self, descriptor: TestDescriptor, body: TestBody<S>) -> Self {
        self.tests.push(RegisteredTest { descriptor, body });
        self
    }

    pub fn setup_all<F, E>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut S) -> Result<(), E> + 'static,
        E: Display,
    {
        self.hooks.setup_all = Some(wrap_hook(hook));
        self
    }

    pub fn teardown_all<F, E>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut S) -> Result<(), E> + 'static,
        E: Display,
    {
        self.hooks.teardown_all = Some(wrap_hook(hook));
        self
    }

    pub fn setup_test<F, E>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut S) -> Result<(), E> + 'static,
        E: Display,
    {
        self.hooks.setup_test = Some(wrap_hook(hook));
        self
    }

    pub fn teardown_test<F, E>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut S) -> Result<(), E> + 'static,
        E: Display,
    {
        self.hooks.teardown_test = Some(wrap_hook(hook));
        self
    }

    pub fn build(self) -> Suite<S> {
        Suite {
            name: self.name,
            label: self.label,
            fixture: self.fixture,
            tests: self.tests,
            hooks: self.hooks,
        }
    }
}

fn wrap_hook<S, F, E>(mut hook: F) -> HookFn<S>
where
    F: FnMut(&mut S) -> Result<(), E> + 'static,
    E: Display,
{
    Box::new(move |fixture| hook(fixture).map_err(Uncaught::from_error))
}
