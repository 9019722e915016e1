//! Thread isolate backend
//!
//! Runs the body on a dedicated OS thread with its own single-threaded tokio
//! runtime. Termination is cooperative: the body is dropped at its next
//! await point, a body stuck in synchronous code keeps its thread until it
//! returns.

use std::thread::JoinHandle;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::protocol::{IsolateMessage, IsolateRequest};
use super::{worker, IsolateError};
use crate::models::TestFn;

pub struct ThreadIsolate {
    messages: mpsc::UnboundedReceiver<IsolateMessage>,
    terminate: Option<oneshot::Sender<()>>,
    fatal: oneshot::Receiver<IsolateError>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadIsolate {
    /// Spawn a thread running `body` for the encoded `request`
    pub fn spawn(body: TestFn, request: String) -> Result<Self, IsolateError> {
        let (tx, messages) = mpsc::unbounded_channel();
        let (terminate_tx, terminate_rx) = oneshot::channel::<()>();
        let (fatal_tx, fatal) = oneshot::channel();

        let handle = std::thread::Builder::new()
            .name("tst-isolate".to_string())
            .spawn(move || {
                if let Err(e) = serve(body, &request, tx, terminate_rx) {
                    let _ = fatal_tx.send(e);
                }
            })
            .map_err(|e| IsolateError::Spawn(e.to_string()))?;

        Ok(Self {
            messages,
            terminate: Some(terminate_tx),
            fatal,
            handle: Some(handle),
        })
    }

    pub async fn recv(&mut self) -> Option<IsolateMessage> {
        self.messages.recv().await
    }

    /// Explain why the stream ended without a `done` message
    pub async fn crash_reason(&mut self) -> IsolateError {
        match (&mut self.fatal).await {
            Ok(e) => e,
            Err(_) => IsolateError::Crashed("isolate thread closed its channel".to_string()),
        }
    }

    /// Signal termination and release the thread handle
    pub fn shutdown(&mut self) {
        if let Some(terminate) = self.terminate.take() {
            let _ = terminate.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.is_finished() {
                if handle.join().is_err() {
                    warn!("isolate thread panicked outside the test body");
                }
            } else {
                debug!("detaching isolate thread that is still unwinding its body");
            }
        }
        self.messages.close();
    }
}

impl Drop for ThreadIsolate {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn serve(
    body: TestFn,
    request: &str,
    tx: mpsc::UnboundedSender<IsolateMessage>,
    terminate: oneshot::Receiver<()>,
) -> Result<(), IsolateError> {
    // Same decode path as a child process so data must survive JSON
    let request = IsolateRequest::decode(request)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| IsolateError::Spawn(e.to_string()))?;

    runtime.block_on(async move {
        let sink = move |msg: IsolateMessage| {
            let _ = tx.send(msg);
        };
        tokio::select! {
            result = worker::execute(body, request.data, sink) => result,
            _ = terminate => {
                debug!("isolate thread terminated by host");
                Ok(())
            }
        }
    })
}
