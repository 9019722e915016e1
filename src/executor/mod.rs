//! Test execution engine
//!
//! [`Session`] is the entry point: register tests, then run them explicitly
//! or let [`Session::auto_run`] start once registration settles. The
//! [`Runner`] executes one drained batch sequentially.

mod autorun;
mod options;
mod runner;
mod session;

pub use autorun::{StartDecision, Stabilizer};
pub use options::{RunOptions, DEFAULT_TIMEOUT_MS};
pub use runner::Runner;
pub use session::Session;
