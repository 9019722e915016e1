//! Human-readable reporter
//!
//! Colorized, one line per event, with a summary that lists at most a few
//! failures.

use std::io::{self, Write};

use tracing::warn;

use super::reporter::{Reporter, SummaryFilters};
use crate::assert::AssertionEvent;
use crate::models::{RunState, TestError, TestKind};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const GRAY: &str = "\x1b[90m";
const RESET: &str = "\x1b[0m";

/// Failures listed in full before the summary starts eliding
const MAX_SHOWN_FAILURES: usize = 3;

pub struct PrettyReporter<W: Write> {
    out: W,
    colorize: bool,
}

impl PrettyReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> PrettyReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.colorize {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{text}") {
            warn!("failed to write report: {}", e);
        }
    }

    fn colored(&mut self, color: &str, text: &str) {
        let text = self.paint(color, text);
        self.line(&text);
    }
}

impl<W: Write + Send> Reporter for PrettyReporter<W> {
    fn test_start(&mut self, name: &str, kind: TestKind, muted: bool) {
        if muted {
            return;
        }
        match kind {
            TestKind::Normal => self.line(&format!("► {name}")),
            kind => self.line(&format!("► {name} ({kind})")),
        }
    }

    fn test_skip(&mut self, name: &str, reason: &str) {
        if reason == "todo" {
            self.colored(YELLOW, &format!("🚧 {name}"));
        } else {
            self.colored(GRAY, &format!("» {name} ({reason})"));
        }
    }

    fn assertion(&mut self, n: usize, event: &AssertionEvent) {
        self.colored(
            GREEN,
            &format!("√ {} ({}) — {}", n, event.operator, event.message),
        );
    }

    fn retry(&mut self, _name: &str, attempt: u32, max: u32) {
        self.colored(YELLOW, &format!("↻ retry {attempt}/{max}"));
    }

    fn test_pass(&mut self, name: &str, kind: TestKind, assertion_count: usize, muted: bool) {
        if !muted {
            self.line("");
        }
        if kind == TestKind::Mute {
            self.colored(
                GREEN,
                &format!("► {name} ({assertion_count} assertions)"),
            );
            self.line("");
        }
    }

    fn test_fail(&mut self, name: &str, error: &TestError, assertion_count: usize, muted: bool) {
        if muted {
            self.line(&format!("► {name}"));
        }
        match error.assertion() {
            Some(failure) => {
                self.colored(RED, &format!("× {} — {}", assertion_count, failure.message));
                self.colored(RED, &format!("  operator: {}", failure.operator));
                if let Some(actual) = &failure.actual {
                    self.colored(RED, &format!("  actual:   {actual}"));
                }
                if let Some(expected) = &failure.expected {
                    self.colored(RED, &format!("  expected: {expected}"));
                }
            }
            None => self.colored(RED, &format!("× {assertion_count} — {error}")),
        }
        self.line("");
    }

    fn summary(&mut self, state: &RunState, filters: SummaryFilters<'_>) {
        self.line("───");
        if let Some(pattern) = filters.pattern {
            self.colored(GRAY, &format!("# grep /{}/i", pattern.as_str()));
        }
        if filters.only_count > 0 {
            self.line(&format!("# only {} cases", filters.only_count));
        }
        self.line(&format!(
            "# total {} ({} assertions)",
            state.total(),
            state.assertion_count
        ));
        if state.passed > 0 {
            self.colored(GREEN, &format!("# pass {}", state.passed));
        }
        if !state.failed.is_empty() {
            let failed = &state.failed;
            self.colored(RED, &format!("# fail {}", failed.len()));

            let truncate = failed.len() > MAX_SHOWN_FAILURES + 2;
            let shown = if truncate {
                &failed[..MAX_SHOWN_FAILURES]
            } else {
                &failed[..]
            };
            for f in shown {
                self.colored(RED, &format!("  ✗ {}: {}", f.name, f.message));
            }
            if let (true, Some(last)) = (truncate, failed.last()) {
                self.colored(
                    RED,
                    &format!("  ⋮ {} more", failed.len() - MAX_SHOWN_FAILURES - 1),
                );
                self.colored(RED, &format!("  ✗ {}: {}", last.name, last.message));
            }
        }
        if state.skipped > 0 {
            self.colored(GRAY, &format!("# skip {}", state.skipped));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AssertionFailure, FailedTest};

    fn render(f: impl FnOnce(&mut PrettyReporter<Vec<u8>>)) -> String {
        let mut reporter = PrettyReporter::new(Vec::new()).no_color();
        f(&mut reporter);
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn test_start_and_assertion_lines() {
        let out = render(|r| {
            r.test_start("adds", TestKind::Normal, false);
            r.test_start("isolated", TestKind::Fork, false);
            r.test_start("quiet", TestKind::Mute, true);
            r.assertion(
                1,
                &AssertionEvent {
                    sequence: 7,
                    operator: "is".to_string(),
                    message: "sum".to_string(),
                },
            );
        });
        assert_eq!(out, "► adds\n► isolated (fork)\n√ 1 (is) — sum\n");
    }

    #[test]
    fn test_structured_failure_shows_values() {
        let error = TestError::Assertion(AssertionFailure::new("is", "should match").with_values(1, 2));
        let out = render(|r| r.test_fail("math", &error, 3, false));

        assert!(out.contains("× 3 — should match"));
        assert!(out.contains("operator: is"));
        assert!(out.contains("actual:   1"));
        assert!(out.contains("expected: 2"));
    }

    #[test]
    fn test_unstructured_failure_shows_message() {
        let out = render(|r| r.test_fail("slow", &TestError::Timeout(50), 1, true));
        assert_eq!(out, "► slow\n× 1 — timeout after 50ms\n\n");
    }

    #[test]
    fn test_skip_lines() {
        let out = render(|r| {
            r.test_skip("later", "todo");
            r.test_skip("off", "skip");
        });
        assert_eq!(out, "🚧 later\n» off (skip)\n");
    }

    #[test]
    fn test_summary_truncates_failure_list() {
        let mut state = RunState::new(0);
        state.passed = 1;
        for i in 0..7 {
            state.failed.push(FailedTest {
                message: format!("boom {i}"),
                index: i,
                name: format!("t{i}"),
            });
        }
        let out = render(|r| r.summary(&state, SummaryFilters::default()));

        assert!(out.contains("# total 8 (0 assertions)"));
        assert!(out.contains("# fail 7"));
        assert!(out.contains("✗ t0: boom 0"));
        assert!(out.contains("✗ t2: boom 2"));
        assert!(!out.contains("✗ t3: boom 3"));
        assert!(out.contains("⋮ 3 more"));
        assert!(out.contains("✗ t6: boom 6"));
    }

    #[test]
    fn test_summary_echoes_filters() {
        let pattern = regex::Regex::new("math").unwrap();
        let state = RunState::new(2);
        let out = render(|r| {
            r.summary(
                &state,
                SummaryFilters {
                    pattern: Some(&pattern),
                    only_count: 2,
                },
            )
        });
        assert!(out.contains("# grep /math/i"));
        assert!(out.contains("# only 2 cases"));
    }

    #[test]
    fn test_colors_applied() {
        let mut reporter = PrettyReporter::new(Vec::new());
        reporter.retry("flaky", 1, 2);
        let out = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(out, format!("{YELLOW}↻ retry 1/2{RESET}\n"));
    }
}
