//! tst-engine - minimal test execution engine
//!
//! Registers tests into a [`Session`], runs them sequentially with timeouts,
//! retries and filtering, executes fork tests in an isolate (thread or child
//! process), and reports through a pluggable [`Reporter`].
//!
//! ## Usage
//!
//! ```no_run
//! use tst_engine::{PrettyReporter, Session};
//!
//! # async fn example() {
//! let session = Session::default();
//! session.test("math: addition", |t, _| async move {
//!     t.is(2 + 2, 4, "two plus two")?;
//!     Ok(())
//! });
//!
//! let mut reporter = PrettyReporter::stdout();
//! let state = session.run(&mut reporter).await;
//! std::process::exit(if state.is_success() { 0 } else { 1 });
//! # }
//! ```

pub mod assert;
pub mod cli;
pub mod config;
pub mod demo;
pub mod executor;
pub mod isolate;
pub mod models;
pub mod output;
pub mod registry;
pub mod utils;

pub use assert::{Assert, AssertionEvent, Bridge};
pub use executor::{RunOptions, Session, Stabilizer};
pub use isolate::{Isolation, ProcessIsolation};
pub use models::{AssertionFailure, RunState, TestError, TestKind, TestOptions};
pub use output::{EventLog, OutputFormat, PrettyReporter, Reporter, TapReporter};
