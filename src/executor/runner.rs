//! Scheduling loop
//!
//! Drives drained descriptors to completion one at a time, in registration
//! order, and keeps the run statistics consistent.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::RunOptions;
use crate::assert::{Assert, AssertionEvent, Bridge};
use crate::isolate;
use crate::models::{
    Descriptor, FailedTest, RunState, TestError, TestKind, TestOutcome, TestStatus,
};
use crate::output::{Reporter, SummaryFilters};
use crate::utils::Timer;

/// What filtering decided for one descriptor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Selection {
    Run,
    /// Skipped without a reporter event
    Silent,
    /// Skipped with a `test_skip` event
    Skip(&'static str),
}

/// Single-run scheduler
pub struct Runner<'a> {
    options: &'a RunOptions,
    bridge: &'a Arc<Bridge>,
    reporter: &'a mut dyn Reporter,
    state: RunState,
}

impl<'a> Runner<'a> {
    pub fn new(
        options: &'a RunOptions,
        bridge: &'a Arc<Bridge>,
        reporter: &'a mut dyn Reporter,
    ) -> Self {
        Self {
            options,
            bridge,
            reporter,
            state: RunState::default(),
        }
    }

    /// Run every descriptor and return the final statistics
    pub async fn run(mut self, descriptors: Vec<Descriptor>) -> RunState {
        let only_count = descriptors
            .iter()
            .filter(|d| d.kind == TestKind::Only)
            .count();
        self.state = RunState::new(only_count);
        self.bridge.reset();

        info!(
            "Starting run of {} tests ({} only)",
            descriptors.len(),
            only_count
        );
        let timer = Timer::start("run");

        let mut remaining = descriptors.iter();
        for descriptor in remaining.by_ref() {
            match self.select(descriptor) {
                Selection::Silent => {
                    self.state
                        .record_skip(descriptor.index, &descriptor.name, descriptor.kind);
                }
                Selection::Skip(reason) => {
                    self.state
                        .record_skip(descriptor.index, &descriptor.name, descriptor.kind);
                    if !self.options.mute {
                        self.reporter.test_skip(&descriptor.name, reason);
                    }
                }
                Selection::Run => {
                    if self.run_test(descriptor).await {
                        info!("Bailing out after {:?} failed", descriptor.name);
                        break;
                    }
                }
            }
        }
        // bail leaves the rest unexecuted; they still need a classification
        for descriptor in remaining {
            self.state
                .record_skip(descriptor.index, &descriptor.name, descriptor.kind);
        }

        self.reporter.summary(
            &self.state,
            SummaryFilters {
                pattern: self.options.pattern.as_ref(),
                only_count,
            },
        );

        info!(
            "Run completed in {}ms - pass {} / fail {} / skip {} ({} assertions)",
            timer.elapsed_ms(),
            self.state.passed,
            self.state.failed.len(),
            self.state.skipped,
            self.state.assertion_count
        );

        self.state
    }

    fn select(&self, descriptor: &Descriptor) -> Selection {
        if self.state.only_count > 0 && !descriptor.kind.survives_only() {
            return Selection::Silent;
        }
        if !self.options.selects(&descriptor.name) {
            return Selection::Silent;
        }
        match descriptor.kind.skip_reason() {
            Some(reason) => Selection::Skip(reason),
            None => Selection::Run,
        }
    }

    /// Execute one descriptor; returns `true` when the run must stop
    async fn run_test(&mut self, descriptor: &Descriptor) -> bool {
        let name = descriptor.name.as_str();
        let kind = descriptor.kind;
        let muted = self.options.mute || kind == TestKind::Mute;

        if !self.options.mute {
            self.reporter.test_start(name, kind, muted);
        }
        debug!("Running {:?} ({})", name, kind);

        let (tx, mut rx) = mpsc::unbounded_channel();
        self.bridge.on_pass(Box::new(move |event| {
            let _ = tx.send(event);
        }));

        let timeout = descriptor.options.timeout.unwrap_or(self.options.timeout);
        let max_retries = descriptor.options.retries;
        let timer = Timer::start(name);

        let mut count = 0;
        let mut last_error = None;
        for attempt in 0..=max_retries {
            let result = if kind == TestKind::Fork {
                self.attempt_isolated(descriptor, timeout, muted, &mut count)
                    .await
            } else {
                self.attempt_local(descriptor, timeout, muted, &mut rx, &mut count)
                    .await
            };

            match result {
                Ok(()) => {
                    last_error = None;
                    break;
                }
                Err(error) => {
                    if attempt < max_retries {
                        info!(
                            "{:?} failed ({}), retry {}/{}",
                            name,
                            error,
                            attempt + 1,
                            max_retries
                        );
                        self.reporter.retry(name, attempt + 1, max_retries);
                    }
                    last_error = Some(error);
                }
            }
        }

        let duration_ms = timer.elapsed_ms();
        let mut stop = false;
        let status = match last_error {
            None => {
                self.state.passed += 1;
                self.reporter.test_pass(name, kind, count, muted);
                TestStatus::Passed
            }
            Some(error) => {
                if kind != TestKind::Demo {
                    self.state.failed.push(FailedTest {
                        message: error.to_string(),
                        index: descriptor.index,
                        name: name.to_string(),
                    });
                    stop = self.options.bail;
                }
                self.reporter.test_fail(name, &error, count, muted);
                TestStatus::Failed
            }
        };

        let outcome = TestOutcome {
            index: descriptor.index,
            name: name.to_string(),
            kind,
            status,
            assertions: count,
            duration_ms,
        };
        debug!("  {}", outcome);
        self.state.outcomes.push(outcome);

        // let work the body left behind reach the hook before it goes away
        tokio::task::yield_now().await;
        self.bridge.clear();
        while let Ok(event) = rx.try_recv() {
            self.forward(event, &mut count, muted);
        }

        stop
    }

    async fn attempt_local(
        &mut self,
        descriptor: &Descriptor,
        timeout: Duration,
        muted: bool,
        rx: &mut mpsc::UnboundedReceiver<AssertionEvent>,
        count: &mut usize,
    ) -> Result<(), TestError> {
        *count = 0;
        let result = match (descriptor.options.resolve_data(), &descriptor.body) {
            (Err(e), _) => Err(e),
            (Ok(_), None) => Ok(()),
            (Ok(data), Some(body)) => {
                let fut = AssertUnwindSafe(body(Assert::new(self.bridge.clone()), data))
                    .catch_unwind();
                let deadline = tokio::time::sleep(timeout);
                tokio::pin!(fut, deadline);

                loop {
                    tokio::select! {
                        biased;
                        Some(event) = rx.recv() => self.forward(event, count, muted),
                        res = &mut fut => break match res {
                            Ok(Ok(())) => Ok(()),
                            Ok(Err(e)) => Err(TestError::from_body(e)),
                            Err(payload) => Err(TestError::from_panic(payload)),
                        },
                        _ = &mut deadline => break Err(TestError::Timeout(timeout.as_millis() as u64)),
                    }
                }
            }
        };

        // passes reported right before the body finished
        while let Ok(event) = rx.try_recv() {
            self.forward(event, count, muted);
        }
        if result.is_err() {
            self.count_failure_point(count);
        }
        result
    }

    async fn attempt_isolated(
        &mut self,
        descriptor: &Descriptor,
        timeout: Duration,
        muted: bool,
        count: &mut usize,
    ) -> Result<(), TestError> {
        *count = 0;
        let data = match descriptor.options.resolve_data() {
            Ok(data) => data,
            Err(e) => {
                self.count_failure_point(count);
                return Err(e);
            }
        };

        let options = self.options;
        let bridge = self.bridge;
        let reporter = &mut *self.reporter;
        let state = &mut self.state;
        let outcome = isolate::run_isolated(
            &options.isolation,
            descriptor,
            data,
            timeout,
            |n, operator, message| {
                *count = n;
                state.assertion_count += 1;
                let event = AssertionEvent {
                    sequence: bridge.next_sequence(),
                    operator: operator.to_string(),
                    message: message.to_string(),
                };
                if !muted {
                    reporter.assertion(n, &event);
                }
            },
        )
        .await;

        // reconcile once against what the isolate reported
        if outcome.assertion_count < *count {
            warn!(
                "isolate for {:?} reported {} assertions after streaming {}",
                descriptor.name, outcome.assertion_count, count
            );
        }
        for _ in *count..outcome.assertion_count {
            self.bridge.next_sequence();
            self.state.assertion_count += 1;
        }
        *count = outcome.assertion_count;

        outcome.result.map(|elapsed_ms| {
            debug!(
                "isolate for {:?} completed in {:.1}ms",
                descriptor.name, elapsed_ms
            );
        })
    }

    fn forward(&mut self, event: AssertionEvent, count: &mut usize, muted: bool) {
        *count += 1;
        self.state.assertion_count += 1;
        if !muted {
            self.reporter.assertion(*count, &event);
        }
    }

    /// A failed attempt counts its failure point as one assertion
    fn count_failure_point(&mut self, count: &mut usize) {
        *count += 1;
        self.bridge.next_sequence();
        self.state.assertion_count += 1;
    }
}
