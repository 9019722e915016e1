//! TAP reporter
//!
//! Machine-readable output: one `ok`/`not ok` line per test.

use std::io::{self, Write};

use tracing::warn;

use super::reporter::{Reporter, SummaryFilters};
use crate::assert::AssertionEvent;
use crate::models::{RunState, TestError, TestKind};

pub struct TapReporter<W: Write> {
    out: W,
    n: usize,
}

impl TapReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TapReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out, n: 0 }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{text}") {
            warn!("failed to write report: {}", e);
        }
    }

    fn next(&mut self) -> usize {
        self.n += 1;
        self.n
    }
}

impl<W: Write + Send> Reporter for TapReporter<W> {
    fn test_start(&mut self, _name: &str, _kind: TestKind, _muted: bool) {}

    fn test_skip(&mut self, name: &str, reason: &str) {
        let n = self.next();
        self.line(&format!("ok {n} - {name} # SKIP {reason}"));
    }

    fn assertion(&mut self, _n: usize, _event: &AssertionEvent) {}

    fn test_pass(&mut self, name: &str, _kind: TestKind, _assertion_count: usize, _muted: bool) {
        let n = self.next();
        self.line(&format!("ok {n} - {name}"));
    }

    fn test_fail(&mut self, name: &str, error: &TestError, _assertion_count: usize, _muted: bool) {
        let n = self.next();
        self.line(&format!("not ok {n} - {name}"));
        self.line("  ---");
        self.line(&format!("  message: {error}"));
        if let Some(failure) = error.assertion() {
            self.line(&format!("  operator: {}", failure.operator));
            if let Some(actual) = &failure.actual {
                self.line(&format!("  actual: {actual}"));
            }
            if let Some(expected) = &failure.expected {
                self.line(&format!("  expected: {expected}"));
            }
        }
        self.line("  ...");
    }

    fn summary(&mut self, state: &RunState, _filters: SummaryFilters<'_>) {
        self.line(&format!("1..{}", self.n));
        self.line(&format!("# tests {}", state.passed + state.failed.len()));
        self.line(&format!("# pass {}", state.passed));
        if !state.failed.is_empty() {
            self.line(&format!("# fail {}", state.failed.len()));
        }
        self.line(&format!("# assertions {}", state.assertion_count));
        if state.skipped > 0 {
            self.line(&format!("# skip {}", state.skipped));
        }
        self.n = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssertionFailure, FailedTest};

    #[test]
    fn test_tap_stream() {
        let mut tap = TapReporter::new(Vec::new());
        tap.test_start("a", TestKind::Normal, false);
        tap.test_pass("a", TestKind::Normal, 2, false);
        tap.test_skip("b", "todo");
        let error = TestError::Assertion(AssertionFailure::new("is", "differ").with_values("x", "y"));
        tap.test_fail("c", &error, 1, false);

        let mut state = RunState::new(0);
        state.passed = 1;
        state.skipped = 1;
        state.assertion_count = 3;
        state.failed.push(FailedTest {
            message: "differ".to_string(),
            index: 2,
            name: "c".to_string(),
        });
        tap.summary(&state, SummaryFilters::default());

        let out = String::from_utf8(tap.into_inner()).unwrap();
        let expected = "\
ok 1 - a
ok 2 - b # SKIP todo
not ok 3 - c
  ---
  message: differ
  operator: is
  actual: \"x\"
  expected: \"y\"
  ...
1..3
# tests 2
# pass 1
# fail 1
# assertions 3
# skip 1
";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_counter_resets_after_summary() {
        let mut tap = TapReporter::new(Vec::new());
        tap.test_pass("a", TestKind::Normal, 0, false);
        tap.summary(&RunState::new(0), SummaryFilters::default());
        tap.test_pass("b", TestKind::Normal, 0, false);

        let out = String::from_utf8(tap.into_inner()).unwrap();
        assert!(out.ends_with("ok 1 - b\n"));
    }
}
