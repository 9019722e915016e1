//! Isolation broker
//!
//! Runs a single fork test inside an independent execution context and
//! streams its assertions back to the host.
//!
//! Nothing executable crosses the boundary: the isolate receives the test's
//! registration index and name plus its JSON data, and resolves the body from
//! its own registry.
//!
//! ## Lifecycle
//!
//! `Idle → Spawned → Running → (assertion)* → Completed | Failed | TimedOut`
//!
//! The isolate handle is shut down on every exit path, including timeouts and
//! crashes.

mod process;
mod protocol;
mod thread;
mod worker;

pub use process::{
    is_isolate_child, serve_child, ProcessIsolate, ProcessIsolation, EXIT_CRASHED,
    EXIT_UNRESOLVED, ISOLATE_ENV,
};
pub use protocol::{IsolateMessage, IsolateRequest};
pub use thread::ThreadIsolate;
pub use worker::execute;

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{Descriptor, TestError};

/// Where fork tests run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Isolation {
    /// Dedicated OS thread; cancelled cooperatively
    #[default]
    Thread,
    /// Child process; killed on timeout
    Process(ProcessIsolation),
}

/// Isolate-level failures
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum IsolateError {
    #[error("failed to spawn isolate: {0}")]
    Spawn(String),

    #[error("isolate crashed: {0}")]
    Crashed(String),

    #[error("{0}")]
    Serialization(String),
}

impl From<IsolateError> for TestError {
    fn from(err: IsolateError) -> Self {
        match err {
            IsolateError::Serialization(reason) => TestError::Serialization(reason),
            other => TestError::Isolate(other.to_string()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IsolateState {
    Idle,
    Spawned,
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl fmt::Display for IsolateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IsolateState::Idle => "idle",
            IsolateState::Spawned => "spawned",
            IsolateState::Running => "running",
            IsolateState::Completed => "completed",
            IsolateState::Failed => "failed",
            IsolateState::TimedOut => "timed out",
        };
        f.write_str(s)
    }
}

/// Final result of one isolated attempt
#[derive(Clone, Debug)]
pub struct IsolateOutcome {
    pub state: IsolateState,
    /// Elapsed milliseconds reported by the isolate, or the failure
    pub result: Result<f64, TestError>,
    /// Assertion count for the attempt; failures count their failure point
    pub assertion_count: usize,
}

enum Handle {
    Thread(ThreadIsolate),
    Process(ProcessIsolate),
}

impl Handle {
    async fn recv(&mut self) -> Option<IsolateMessage> {
        match self {
            Handle::Thread(isolate) => isolate.recv().await,
            Handle::Process(isolate) => isolate.recv().await,
        }
    }

    async fn crash_reason(&mut self) -> IsolateError {
        match self {
            Handle::Thread(isolate) => isolate.crash_reason().await,
            Handle::Process(isolate) => isolate.crash_reason().await,
        }
    }

    async fn shutdown(&mut self) {
        match self {
            Handle::Thread(isolate) => isolate.shutdown(),
            Handle::Process(isolate) => isolate.shutdown().await,
        }
    }
}

/// Run `descriptor` in an isolate, racing it against `timeout`.
///
/// `on_assertion` receives every streamed assertion as
/// `(isolate_count, operator, message)`, in order, before the outcome is
/// returned.
pub async fn run_isolated<F>(
    isolation: &Isolation,
    descriptor: &Descriptor,
    data: Option<Value>,
    timeout: Duration,
    mut on_assertion: F,
) -> IsolateOutcome
where
    F: FnMut(usize, &str, &str),
{
    let failed = |state, error: TestError| IsolateOutcome {
        state,
        result: Err(error),
        assertion_count: 1,
    };

    let Some(body) = descriptor.body.clone() else {
        return failed(
            IsolateState::Idle,
            TestError::Serialization(format!("{} has no body to isolate", descriptor.name)),
        );
    };
    let request = match IsolateRequest::for_descriptor(descriptor, data).encode() {
        Ok(request) => request,
        Err(e) => return failed(IsolateState::Idle, e.into()),
    };

    let spawned = match isolation {
        Isolation::Thread => ThreadIsolate::spawn(body, request).map(Handle::Thread),
        Isolation::Process(config) => ProcessIsolate::spawn(config, request)
            .await
            .map(Handle::Process),
    };
    let mut handle = match spawned {
        Ok(handle) => handle,
        Err(e) => return failed(IsolateState::Failed, e.into()),
    };
    debug!("isolate for {:?} {}", descriptor.name, IsolateState::Spawned);

    let timeout_ms = timeout.as_millis() as u64;
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    let mut streamed = 0;
    debug!("isolate for {:?} {}", descriptor.name, IsolateState::Running);
    let (state, result, assertion_count) = loop {
        tokio::select! {
            biased;
            msg = handle.recv() => match msg {
                Some(IsolateMessage::Assertion { sequence_number, operator, message }) => {
                    streamed = sequence_number;
                    on_assertion(sequence_number, &operator, &message);
                }
                Some(IsolateMessage::Done { ok: true, elapsed_ms, assertion_count, .. }) => {
                    break (IsolateState::Completed, Ok(elapsed_ms), assertion_count);
                }
                // the isolate counts passes only; the failure point is added here
                Some(IsolateMessage::Done { assertion_count, error_message, .. }) => {
                    let message = error_message.unwrap_or_else(|| "isolate reported failure".to_string());
                    break (IsolateState::Failed, Err(TestError::Runtime(message)), assertion_count + 1);
                }
                // a closed stream with a live child must still honor the deadline
                None => tokio::select! {
                    biased;
                    reason = handle.crash_reason() => {
                        break (IsolateState::Failed, Err(reason.into()), streamed + 1);
                    }
                    _ = &mut deadline => {
                        info!("isolate for {:?} closed its stream and outlived {}ms, terminating", descriptor.name, timeout_ms);
                        break (IsolateState::TimedOut, Err(TestError::Timeout(timeout_ms)), streamed + 1);
                    }
                },
            },
            _ = &mut deadline => {
                info!("isolate for {:?} timed out after {}ms, terminating", descriptor.name, timeout_ms);
                break (IsolateState::TimedOut, Err(TestError::Timeout(timeout_ms)), streamed + 1);
            }
        }
    };

    handle.shutdown().await;
    debug!("isolate for {:?} {}", descriptor.name, state);

    IsolateOutcome {
        state,
        result,
        assertion_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{body, TestKind, TestOptions};

    fn fork(name: &str, test: crate::models::TestFn) -> Descriptor {
        Descriptor::new(name, TestKind::Fork, TestOptions::new(), Some(test))
    }

    #[tokio::test]
    async fn test_run_isolated_forwards_in_order() {
        let descriptor = fork(
            "ordered",
            body(|t, _| async move {
                t.ok(true, "one")?;
                t.ok(true, "two")?;
                t.ok(true, "three")?;
                Ok(())
            }),
        );

        let mut seen = Vec::new();
        let outcome = run_isolated(
            &Isolation::Thread,
            &descriptor,
            None,
            Duration::from_secs(5),
            |n, _, message| seen.push((n, message.to_string())),
        )
        .await;

        assert_eq!(outcome.state, IsolateState::Completed);
        assert!(outcome.result.is_ok());
        assert_eq!(outcome.assertion_count, 3);
        assert_eq!(
            seen,
            vec![
                (1, "one".to_string()),
                (2, "two".to_string()),
                (3, "three".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_run_isolated_timeout_keeps_streamed_count() {
        let descriptor = fork(
            "slow",
            body(|t, _| async move {
                t.pass("before the wait")?;
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            }),
        );

        let mut streamed = 0;
        let outcome = run_isolated(
            &Isolation::Thread,
            &descriptor,
            None,
            Duration::from_millis(100),
            |n, _, _| streamed = n,
        )
        .await;

        assert_eq!(outcome.state, IsolateState::TimedOut);
        assert_eq!(outcome.result.unwrap_err(), TestError::Timeout(100));
        assert_eq!(streamed, 1);
        assert_eq!(outcome.assertion_count, 2);
    }

    #[tokio::test]
    async fn test_run_isolated_reports_body_failure() {
        let descriptor = fork(
            "failing",
            body(|t, _| async move {
                t.is(1, 2, "numbers differ")?;
                Ok(())
            }),
        );

        let outcome = run_isolated(
            &Isolation::Thread,
            &descriptor,
            None,
            Duration::from_secs(5),
            |_, _, _| {},
        )
        .await;

        assert_eq!(outcome.state, IsolateState::Failed);
        assert_eq!(
            outcome.result.unwrap_err(),
            TestError::Runtime("numbers differ".to_string())
        );
        assert_eq!(outcome.assertion_count, 1);
    }

    #[tokio::test]
    async fn test_run_isolated_crash() {
        let descriptor = fork(
            "crashing",
            body(|t, _| async move {
                t.pass("about to crash")?;
                let crash = true;
                if crash {
                    panic!("isolate went down");
                }
                Ok(())
            }),
        );

        let outcome = run_isolated(
            &Isolation::Thread,
            &descriptor,
            None,
            Duration::from_secs(5),
            |_, _, _| {},
        )
        .await;

        assert_eq!(outcome.state, IsolateState::Failed);
        match outcome.result.unwrap_err() {
            TestError::Isolate(message) => assert!(message.contains("isolate went down")),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(outcome.assertion_count, 2);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_isolate_error() {
        let descriptor = fork("unspawnable", body(|_, _| async { Ok(()) }));
        let isolation = Isolation::Process(ProcessIsolation::new("/nonexistent/tst-binary"));

        let outcome = run_isolated(
            &isolation,
            &descriptor,
            None,
            Duration::from_secs(1),
            |_, _, _| {},
        )
        .await;

        assert_eq!(outcome.state, IsolateState::Failed);
        assert!(matches!(outcome.result, Err(TestError::Isolate(_))));
    }

    #[test]
    fn test_isolate_error_classification() {
        assert_eq!(
            TestError::from(IsolateError::Serialization("bad".to_string())),
            TestError::Serialization("bad".to_string())
        );
        assert!(matches!(
            TestError::from(IsolateError::Crashed("gone".to_string())),
            TestError::Isolate(_)
        ));
    }
}
