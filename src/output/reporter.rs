//! Reporter contract
//!
//! The scheduler reports through this trait and never renders anything
//! itself. Implement it to add an output format.

use regex::Regex;

use crate::assert::AssertionEvent;
use crate::models::{RunState, TestError, TestKind};

/// Filters active during the run, echoed in the summary
#[derive(Clone, Copy, Debug, Default)]
pub struct SummaryFilters<'a> {
    pub pattern: Option<&'a Regex>,
    pub only_count: usize,
}

pub trait Reporter: Send {
    /// A test is about to execute
    fn test_start(&mut self, name: &str, kind: TestKind, muted: bool);

    /// An explicitly skipped test (`skip` or `todo`)
    fn test_skip(&mut self, name: &str, reason: &str);

    /// A passing assertion; `n` counts within the current test
    fn assertion(&mut self, n: usize, event: &AssertionEvent);

    /// A failed attempt is about to be retried
    fn retry(&mut self, _name: &str, _attempt: u32, _max: u32) {}

    fn test_pass(&mut self, name: &str, kind: TestKind, assertion_count: usize, muted: bool);

    fn test_fail(&mut self, name: &str, error: &TestError, assertion_count: usize, muted: bool);

    fn summary(&mut self, state: &RunState, filters: SummaryFilters<'_>);
}

/// One recorded reporter call
#[derive(Clone, Debug, PartialEq)]
pub enum ReportEvent {
    TestStart {
        name: String,
        kind: TestKind,
        muted: bool,
    },
    TestSkip {
        name: String,
        reason: String,
    },
    Assertion {
        n: usize,
        sequence: u64,
        operator: String,
        message: String,
    },
    Retry {
        name: String,
        attempt: u32,
        max: u32,
    },
    TestPass {
        name: String,
        kind: TestKind,
        assertion_count: usize,
        muted: bool,
    },
    TestFail {
        name: String,
        error: TestError,
        assertion_count: usize,
        muted: bool,
    },
    Summary {
        passed: usize,
        failed: usize,
        skipped: usize,
        assertion_count: u64,
        pattern: Option<String>,
        only_count: usize,
    },
}

/// Reporter that keeps every event, for checking a run from the outside
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    pub events: Vec<ReportEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of started tests, in order
    pub fn started(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReportEvent::TestStart { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Run-wide sequence numbers of every reported assertion
    pub fn sequences(&self) -> Vec<u64> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReportEvent::Assertion { sequence, .. } => Some(*sequence),
                _ => None,
            })
            .collect()
    }

    pub fn retries(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ReportEvent::Retry { .. }))
            .count()
    }

    pub fn failures(&self) -> Vec<(&str, &TestError)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReportEvent::TestFail { name, error, .. } => Some((name.as_str(), error)),
                _ => None,
            })
            .collect()
    }
}

impl Reporter for EventLog {
    fn test_start(&mut self, name: &str, kind: TestKind, muted: bool) {
        self.events.push(ReportEvent::TestStart {
            name: name.to_string(),
            kind,
            muted,
        });
    }

    fn test_skip(&mut self, name: &str, reason: &str) {
        self.events.push(ReportEvent::TestSkip {
            name: name.to_string(),
            reason: reason.to_string(),
        });
    }

    fn assertion(&mut self, n: usize, event: &AssertionEvent) {
        self.events.push(ReportEvent::Assertion {
            n,
            sequence: event.sequence,
            operator: event.operator.clone(),
            message: event.message.clone(),
        });
    }

    fn retry(&mut self, name: &str, attempt: u32, max: u32) {
        self.events.push(ReportEvent::Retry {
            name: name.to_string(),
            attempt,
            max,
        });
    }

    fn test_pass(&mut self, name: &str, kind: TestKind, assertion_count: usize, muted: bool) {
        self.events.push(ReportEvent::TestPass {
            name: name.to_string(),
            kind,
            assertion_count,
            muted,
        });
    }

    fn test_fail(&mut self, name: &str, error: &TestError, assertion_count: usize, muted: bool) {
        self.events.push(ReportEvent::TestFail {
            name: name.to_string(),
            error: error.clone(),
            assertion_count,
            muted,
        });
    }

    fn summary(&mut self, state: &RunState, filters: SummaryFilters<'_>) {
        self.events.push(ReportEvent::Summary {
            passed: state.passed,
            failed: state.failed.len(),
            skipped: state.skipped,
            assertion_count: state.assertion_count,
            pattern: filters.pattern.map(|p| p.as_str().to_string()),
            only_count: filters.only_count,
        });
    }
}
