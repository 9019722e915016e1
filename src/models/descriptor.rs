//! Test descriptors
//!
//! A descriptor is one registered unit of work: its name, its body, its
//! [`TestKind`] and its per-test options.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::TestError;
use crate::assert::Assert;

/// Future returned by a test body
pub type TestFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Type-erased test body.
///
/// Bodies receive the assertion handle and the test's input data. Every body
/// is asynchronous; a body that never awaits simply completes on first poll.
pub type TestFn = Arc<dyn Fn(Assert, Option<Value>) -> TestFuture + Send + Sync>;

/// Wrap an async closure into a [`TestFn`]
pub fn body<F, Fut>(f: F) -> TestFn
where
    F: Fn(Assert, Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |assert, data| Box::pin(f(assert, data)))
}

/// How a registered test participates in a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    Normal,
    Skip,
    Todo,
    /// Exclusive: once any `Only` test exists, only these run
    Only,
    /// Failures are displayed but never counted
    Demo,
    /// Assertion output is suppressed
    Mute,
    /// Runs inside an isolate
    Fork,
}

impl TestKind {
    /// Display label used by reporters
    pub fn label(&self) -> &'static str {
        match self {
            TestKind::Normal => "test",
            TestKind::Skip => "skip",
            TestKind::Todo => "todo",
            TestKind::Only => "only",
            TestKind::Demo => "demo",
            TestKind::Mute => "mute",
            TestKind::Fork => "fork",
        }
    }

    /// Whether the test survives only-mode filtering
    pub fn survives_only(&self) -> bool {
        matches!(self, TestKind::Only | TestKind::Skip | TestKind::Todo)
    }

    /// Reason reported for explicitly skipped kinds
    pub fn skip_reason(&self) -> Option<&'static str> {
        match self {
            TestKind::Skip => Some("skip"),
            TestKind::Todo => Some("todo"),
            _ => None,
        }
    }

    pub fn all() -> Vec<TestKind> {
        vec![
            TestKind::Normal,
            TestKind::Skip,
            TestKind::Todo,
            TestKind::Only,
            TestKind::Demo,
            TestKind::Mute,
            TestKind::Fork,
        ]
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Input data handed to a test body
#[derive(Clone)]
pub enum TestData {
    Value(Value),
    /// Produced right before each attempt
    Lazy(Arc<dyn Fn() -> Value + Send + Sync>),
    /// Data that could not be encoded at registration time
    Invalid(String),
}

impl TestData {
    pub fn resolve(&self) -> Result<Value, TestError> {
        match self {
            TestData::Value(value) => Ok(value.clone()),
            TestData::Lazy(produce) => Ok(produce()),
            TestData::Invalid(reason) => Err(TestError::Serialization(reason.clone())),
        }
    }
}

impl fmt::Debug for TestData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestData::Value(value) => f.debug_tuple("Value").field(value).finish(),
            TestData::Lazy(_) => f.write_str("Lazy(..)"),
            TestData::Invalid(reason) => f.debug_tuple("Invalid").field(reason).finish(),
        }
    }
}

/// Per-test options
#[derive(Clone, Debug, Default)]
pub struct TestOptions {
    /// Overrides the run-wide timeout
    pub timeout: Option<Duration>,
    /// Extra attempts after a failure
    pub retries: u32,
    pub data: Option<TestData>,
}

impl TestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout = Some(Duration::from_millis(ms));
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn data<T: Serialize>(mut self, data: T) -> Self {
        self.data = Some(match serde_json::to_value(data) {
            Ok(value) => TestData::Value(value),
            Err(e) => TestData::Invalid(e.to_string()),
        });
        self
    }

    pub fn data_with<F>(mut self, produce: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.data = Some(TestData::Lazy(Arc::new(produce)));
        self
    }

    /// Resolve the input data for one attempt
    pub fn resolve_data(&self) -> Result<Option<Value>, TestError> {
        self.data.as_ref().map(TestData::resolve).transpose()
    }
}

/// A registered test
#[derive(Clone)]
pub struct Descriptor {
    /// Registration order within the current cycle
    pub index: usize,
    pub name: String,
    pub kind: TestKind,
    pub options: TestOptions,
    pub body: Option<TestFn>,
}

impl Descriptor {
    /// Build a descriptor, demoting a body-less test to `Todo`
    pub fn new(
        name: impl Into<String>,
        kind: TestKind,
        options: TestOptions,
        body: Option<TestFn>,
    ) -> Self {
        let kind = match (&body, kind) {
            (None, TestKind::Skip) => TestKind::Skip,
            (None, _) => TestKind::Todo,
            (Some(_), kind) => kind,
        };
        Self {
            index: 0,
            name: name.into(),
            kind,
            options,
            body,
        }
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("options", &self.options)
            .field("body", &self.body.as_ref().map(|_| ".."))
            .finish()
    }
}
