//! Run-level statistics
//!
//! Defines the aggregate state a scheduling loop accumulates and the
//! per-test terminal classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::ExitCode;

use super::TestKind;

/// Terminal classification of a descriptor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

impl TestStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            TestStatus::Passed => "✓",
            TestStatus::Failed => "✗",
            TestStatus::Skipped => "○",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Passed => write!(f, "PASS"),
            TestStatus::Failed => write!(f, "FAIL"),
            TestStatus::Skipped => write!(f, "SKIP"),
        }
    }
}

/// Final status of one descriptor, in registration order
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestOutcome {
    pub index: usize,
    pub name: String,
    pub kind: TestKind,
    pub status: TestStatus,
    pub assertions: usize,
    pub duration_ms: u64,
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}) [{}ms]",
            self.status.symbol(),
            self.name,
            self.kind,
            self.duration_ms
        )
    }
}

/// A counted failure
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FailedTest {
    pub message: String,
    pub index: usize,
    pub name: String,
}

/// Aggregate statistics of one run
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RunState {
    /// Assertions across the whole run, failure points included
    pub assertion_count: u64,
    pub passed: usize,
    pub failed: Vec<FailedTest>,
    pub skipped: usize,
    /// Number of `Only` descriptors in the run
    pub only_count: usize,
    pub outcomes: Vec<TestOutcome>,
}

impl RunState {
    pub fn new(only_count: usize) -> Self {
        Self {
            only_count,
            ..Self::default()
        }
    }

    /// Tests counted in the summary; demo failures are not
    pub fn total(&self) -> usize {
        self.passed + self.failed.len() + self.skipped
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }

    pub fn outcome(&self, name: &str) -> Option<&TestOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }

    pub(crate) fn record_skip(&mut self, index: usize, name: &str, kind: TestKind) {
        self.skipped += 1;
        self.outcomes.push(TestOutcome {
            index,
            name: name.to_string(),
            kind,
            status: TestStatus::Skipped,
            assertions: 0,
            duration_ms: 0,
        });
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "total {} ({} assertions) | pass {} | fail {} | skip {}",
            self.total(),
            self.assertion_count,
            self.passed,
            self.failed.len(),
            self.skipped
        )?;
        for failed in &self.failed {
            writeln!(f, "  ✗ {}: {}", failed.name, failed.message)?;
        }
        Ok(())
    }
}
