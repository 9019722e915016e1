//! Process isolate backend
//!
//! The host launches a child process with [`ISOLATE_ENV`] set, writes one
//! [`IsolateRequest`] line to its stdin and reads protocol lines from its
//! stdout. The child re-registers its suite, resolves the requested test by
//! index and name, and runs it through [`serve_child`]. Timeouts kill the
//! child.

use std::io::Write;
use std::path::PathBuf;
use std::process::{ExitCode, Stdio};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::protocol::{IsolateMessage, IsolateRequest};
use super::{worker, IsolateError};
use crate::models::{Descriptor, TestKind};

/// Environment variable that switches a binary into isolate mode
pub const ISOLATE_ENV: &str = "TST_ISOLATE";

/// Child exit code: the request could not be decoded or resolved
pub const EXIT_UNRESOLVED: u8 = 3;

/// Child exit code: the body panicked
pub const EXIT_CRASHED: u8 = 70;

/// Which program to launch as an isolate
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessIsolation {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ProcessIsolation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Re-launch the running binary
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }
}

pub struct ProcessIsolate {
    child: Child,
    messages: mpsc::UnboundedReceiver<IsolateMessage>,
    reader: Option<JoinHandle<()>>,
}

impl ProcessIsolate {
    /// Launch the child and hand it `request`
    pub async fn spawn(config: &ProcessIsolation, request: String) -> Result<Self, IsolateError> {
        let mut child = Command::new(&config.program)
            .args(&config.args)
            .env(ISOLATE_ENV, "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                IsolateError::Spawn(format!("{}: {}", config.program.display(), e))
            })?;

        debug!("spawned isolate process {:?}", child.id());

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| IsolateError::Spawn("isolate stdout not captured".to_string()))?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| IsolateError::Spawn("isolate stdin not captured".to_string()))?;

        let (tx, messages) = mpsc::unbounded_channel();
        let reader = tokio::spawn(async move {
            let mut frames = BufReader::new(stdout).split(b'\n');
            loop {
                match frames.next_segment().await {
                    Ok(Some(frame)) => {
                        let line = String::from_utf8_lossy(&frame);
                        match IsolateMessage::decode(&line) {
                            Some(msg) => {
                                if tx.send(msg).is_err() {
                                    break;
                                }
                            }
                            None => debug!("isolate stdout: {}", line.trim_end()),
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("failed to read isolate stdout: {}", e);
                        break;
                    }
                }
            }
        });

        let mut isolate = Self {
            child,
            messages,
            reader: Some(reader),
        };

        let written = async {
            stdin.write_all(request.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.shutdown().await
        }
        .await;
        if let Err(e) = written {
            isolate.shutdown().await;
            return Err(IsolateError::Spawn(format!("failed to send request: {e}")));
        }

        Ok(isolate)
    }

    pub async fn recv(&mut self) -> Option<IsolateMessage> {
        self.messages.recv().await
    }

    /// Explain why the stream ended without a `done` message
    pub async fn crash_reason(&mut self) -> IsolateError {
        match self.child.wait().await {
            Ok(status) if status.code() == Some(i32::from(EXIT_UNRESOLVED)) => {
                IsolateError::Serialization(
                    "isolate could not resolve the requested test".to_string(),
                )
            }
            Ok(status) => IsolateError::Crashed(format!("isolate exited with {status}")),
            Err(e) => IsolateError::Crashed(e.to_string()),
        }
    }

    /// Kill the child if it is still running and reap it
    pub async fn shutdown(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            if let Err(e) = self.child.start_kill() {
                warn!("failed to kill isolate process: {}", e);
            }
        }
        if let Err(e) = self.child.wait().await {
            warn!("failed to reap isolate process: {}", e);
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.messages.close();
    }
}

impl Drop for ProcessIsolate {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Whether this process was launched as an isolate
pub fn is_isolate_child() -> bool {
    std::env::var_os(ISOLATE_ENV).is_some()
}

/// Serve one request read from stdin against `descriptors`.
///
/// `descriptors` must come from the same registration code the host ran so
/// indexes and names line up.
pub async fn serve_child(descriptors: Vec<Descriptor>) -> ExitCode {
    let mut line = String::new();
    let mut stdin = BufReader::new(tokio::io::stdin());
    if let Err(e) = stdin.read_line(&mut line).await {
        error!("failed to read isolate request: {}", e);
        return ExitCode::from(EXIT_UNRESOLVED);
    }
    let request = match IsolateRequest::decode(&line) {
        Ok(request) => request,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(EXIT_UNRESOLVED);
        }
    };

    let Some(body) = descriptors
        .into_iter()
        .find(|d| request.matches(d) && d.kind == TestKind::Fork)
        .and_then(|d| d.body)
    else {
        error!(
            "no fork test #{} named {:?} in this binary",
            request.index, request.name
        );
        return ExitCode::from(EXIT_UNRESOLVED);
    };

    let sink = |msg: IsolateMessage| match msg.encode() {
        Ok(line) => {
            let mut out = std::io::stdout().lock();
            if writeln!(out, "{line}").and_then(|_| out.flush()).is_err() {
                error!("failed to write isolate message");
            }
        }
        Err(e) => error!("{}", e),
    };

    match worker::execute(body, request.data, sink).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(EXIT_CRASHED)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_failure() {
        let config = ProcessIsolation::new("/nonexistent/tst-isolate-binary");
        let err = ProcessIsolate::spawn(&config, "{}".to_string())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, IsolateError::Spawn(_)));
    }

    #[test]
    fn test_process_isolation_builder() {
        let config = ProcessIsolation::new("tst").arg("--quiet");
        assert_eq!(config.program, PathBuf::from("tst"));
        assert_eq!(config.args, vec!["--quiet".to_string()]);
        assert!(ProcessIsolation::current_exe().is_ok());
    }
}
