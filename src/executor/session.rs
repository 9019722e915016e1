//! Test session
//!
//! Owns the registry, the assertion bridge and the run configuration. Each
//! session is independent, so several can coexist in one process.
//!
//! Lifecycle: `new → register* → run → register* → run ...`. A run drains
//! everything registered so far; registering afterwards starts a new cycle.

use std::future::Future;
use std::process::ExitCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::autorun::Stabilizer;
use super::runner::Runner;
use super::RunOptions;
use crate::assert::{Assert, Bridge};
use crate::isolate;
use crate::models::{body, Descriptor, RunState, TestFn, TestKind, TestOptions};
use crate::output::Reporter;
use crate::registry::{Listing, Registry};

pub struct Session {
    registry: Registry,
    bridge: Arc<Bridge>,
    options: RunOptions,
    /// Bumped whenever a run starts
    generation: AtomicU64,
    /// Held for the whole duration of a run
    gate: Mutex<()>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(RunOptions::default())
    }
}

impl Session {
    pub fn new(options: RunOptions) -> Self {
        Self {
            registry: Registry::new(),
            bridge: Arc::new(Bridge::new()),
            options,
            generation: AtomicU64::new(0),
            gate: Mutex::new(()),
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }

    /// Tests registered in the current cycle
    pub fn pending(&self) -> usize {
        self.registry.len()
    }

    pub fn list(&self) -> Vec<Listing> {
        self.registry.list()
    }

    /// Register a test of any kind; returns its index in the cycle
    pub fn register(
        &self,
        name: impl Into<String>,
        kind: TestKind,
        options: TestOptions,
        body: Option<TestFn>,
    ) -> usize {
        self.registry
            .register(Descriptor::new(name, kind, options, body))
    }

    pub fn test<F, Fut>(&self, name: impl Into<String>, f: F) -> usize
    where
        F: Fn(Assert, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(name, TestKind::Normal, TestOptions::default(), Some(body(f)))
    }

    pub fn test_with<F, Fut>(&self, name: impl Into<String>, options: TestOptions, f: F) -> usize
    where
        F: Fn(Assert, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(name, TestKind::Normal, options, Some(body(f)))
    }

    pub fn skip<F, Fut>(&self, name: impl Into<String>, f: F) -> usize
    where
        F: Fn(Assert, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(name, TestKind::Skip, TestOptions::default(), Some(body(f)))
    }

    /// A placeholder with no body yet
    pub fn todo(&self, name: impl Into<String>) -> usize {
        self.register(name, TestKind::Todo, TestOptions::default(), None)
    }

    pub fn only<F, Fut>(&self, name: impl Into<String>, f: F) -> usize
    where
        F: Fn(Assert, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(name, TestKind::Only, TestOptions::default(), Some(body(f)))
    }

    /// Runs and reports normally, but a failure never counts
    pub fn demo<F, Fut>(&self, name: impl Into<String>, f: F) -> usize
    where
        F: Fn(Assert, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(name, TestKind::Demo, TestOptions::default(), Some(body(f)))
    }

    /// Runs normally without per-assertion output
    pub fn mute<F, Fut>(&self, name: impl Into<String>, f: F) -> usize
    where
        F: Fn(Assert, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(name, TestKind::Mute, TestOptions::default(), Some(body(f)))
    }

    /// Runs in an isolate; only `options.data` crosses the boundary
    pub fn fork<F, Fut>(&self, name: impl Into<String>, options: TestOptions, f: F) -> usize
    where
        F: Fn(Assert, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(name, TestKind::Fork, options, Some(body(f)))
    }

    /// Run every pending test and report through `reporter`
    pub async fn run(&self, reporter: &mut dyn Reporter) -> RunState {
        let _gate = self.gate.lock().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.run_locked(reporter).await
    }

    /// Wait for registration to settle, then run.
    ///
    /// Returns `None` when nothing was registered or an explicit
    /// [`Session::run`] got there first.
    pub async fn auto_run(
        &self,
        reporter: &mut dyn Reporter,
        stabilizer: &Stabilizer,
    ) -> Option<RunState> {
        let generation = self.generation.load(Ordering::SeqCst);
        let decision = stabilizer
            .wait(
                || self.pending(),
                || self.generation.load(Ordering::SeqCst) != generation,
            )
            .await;
        info!("autorun decision: {:?}", decision);
        if !decision.should_run() {
            return None;
        }

        let _gate = self.gate.lock().await;
        if self
            .generation
            .compare_exchange(generation, generation + 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("explicit run started first, autorun suppressed");
            return None;
        }
        Some(self.run_locked(reporter).await)
    }

    async fn run_locked(&self, reporter: &mut dyn Reporter) -> RunState {
        let descriptors = self.registry.drain();
        Runner::new(&self.options, &self.bridge, reporter)
            .run(descriptors)
            .await
    }

    /// Drop pending tests and reset assertion numbering
    pub fn reset(&self) {
        let dropped = self.registry.drain().len();
        self.bridge.clear();
        self.bridge.reset();
        debug!("session reset, {} pending tests dropped", dropped);
    }

    /// Act as an isolate child: resolve the requested fork test from this
    /// session's registrations and execute it.
    pub async fn serve_isolate(&self) -> ExitCode {
        isolate::serve_child(self.registry.drain()).await
    }
}
