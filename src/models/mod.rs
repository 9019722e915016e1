//! Data models for the test engine
//!
//! Descriptors, run statistics and the failure taxonomy shared by every
//! other module.

mod descriptor;
mod error;
mod run_state;

pub use descriptor::{body, Descriptor, TestData, TestFn, TestFuture, TestKind, TestOptions};
pub use error::{panic_message, AssertionFailure, TestError};
pub use run_state::{FailedTest, RunState, TestOutcome, TestStatus};
