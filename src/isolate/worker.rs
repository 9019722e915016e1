//! Isolate-side execution
//!
//! Runs one resolved body behind a private bridge and turns everything it
//! does into protocol messages. Shared by the thread backend and by a child
//! process serving a request.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tracing::debug;

use super::protocol::IsolateMessage;
use super::IsolateError;
use crate::assert::{Assert, Bridge};
use crate::models::{panic_message, TestError, TestFn};
use crate::utils::Timer;

/// Run `body` with `data`, emitting messages through `sink`.
///
/// A body that returns normally or with an error always produces exactly one
/// `done` message. A panic produces no `done`; the host sees the stream end
/// and treats it as a crash.
pub async fn execute<S>(body: TestFn, data: Option<Value>, sink: S) -> Result<(), IsolateError>
where
    S: Fn(IsolateMessage) + Send + Sync + 'static,
{
    let sink = Arc::new(sink);
    let count = Arc::new(AtomicUsize::new(0));

    let bridge = Arc::new(Bridge::new());
    {
        let sink = sink.clone();
        let count = count.clone();
        bridge.on_pass(Box::new(move |event| {
            let n = count.fetch_add(1, Ordering::SeqCst) + 1;
            sink(IsolateMessage::Assertion {
                sequence_number: n,
                operator: event.operator,
                message: event.message,
            });
        }));
    }

    let timer = Timer::start("isolate body");
    let result = AssertUnwindSafe(body(Assert::new(bridge.clone()), data))
        .catch_unwind()
        .await;
    bridge.clear();
    let elapsed_ms = timer.elapsed_ms_f64();
    let passes = count.load(Ordering::SeqCst);

    match result {
        Ok(Ok(())) => {
            sink(IsolateMessage::passed(elapsed_ms, passes));
            Ok(())
        }
        Ok(Err(err)) => {
            let error = TestError::from_body(err);
            debug!("isolate body failed: {}", error);
            // passes only; the host adds the failure point
            sink(IsolateMessage::failed(elapsed_ms, passes, error.to_string()));
            Ok(())
        }
        Err(payload) => Err(IsolateError::Crashed(format!(
            "panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}
