//! Bundled demo suite
//!
//! The suite the `tst` binary runs. Process isolates re-register it to
//! resolve fork tests by index and name, so registration must stay
//! deterministic.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde_json::json;

use crate::executor::Session;
use crate::models::TestOptions;

/// Name of the first fork test; registered at index 0
pub const BASELINE_FORK: &str = "fork: baseline data";

pub fn register(session: &Session) {
    session.fork(
        BASELINE_FORK,
        TestOptions::new().data(json!({ "baseline": 42 })),
        |t, data| async move {
            let baseline = data.as_ref().and_then(|d| d["baseline"].as_i64());
            t.is(baseline, Some(42), "baseline crosses the isolate boundary")?;
            Ok(())
        },
    );

    session.fork(
        "fork: computed data",
        TestOptions::new().data_with(|| json!({ "values": [1, 2, 3, 4] })),
        |t, data| async move {
            let values: Vec<i64> = data
                .and_then(|d| serde_json::from_value(d["values"].clone()).ok())
                .context("values missing from test data")?;
            t.is(values.len(), 4, "all values arrived")?;
            t.is(values.iter().sum::<i64>(), 10, "values sum up")?;
            Ok(())
        },
    );

    session.test("math: addition", |t, _| async move {
        t.is(2 + 2, 4, "two plus two")?;
        t.not(2 + 2, 5, "not five")?;
        Ok(())
    });

    session.test("async: delayed assertion", |t, _| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        t.ok(true, "resolved after a delay")?;
        Ok(())
    });

    let attempts = Arc::new(AtomicU32::new(0));
    session.test_with(
        "retry: passes on third attempt",
        TestOptions::new().retries(2),
        move |t, _| {
            let attempts = attempts.clone();
            async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                t.ok(attempt >= 3, &format!("attempt {attempt}"))?;
                Ok(())
            }
        },
    );

    session.test("strings: membership", |t, _| async move {
        t.any("tap", &["pretty", "tap"], "known format")?;
        t.not_ok("".contains('x'), "empty string has no x")?;
        Ok(())
    });

    session.demo("demo: failing diff", |t, _| async move {
        t.is(vec![1, 2, 3], vec![1, 2, 4], "shows actual and expected")?;
        Ok(())
    });

    session.mute("mute: quiet checks", |t, _| async move {
        for i in 0..3 {
            t.ok(i < 3, "hidden")?;
        }
        Ok(())
    });

    session.skip("skip: platform specific", |t, _| async move {
        t.fail("never runs")?;
        Ok(())
    });

    session.todo("todo: streaming reporter");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TestKind, TestStatus};
    use crate::output::EventLog;

    #[test]
    fn test_registration_is_deterministic() {
        let first = Session::default();
        let second = Session::default();
        register(&first);
        register(&second);

        assert_eq!(first.list(), second.list());
        let listing = first.list();
        assert_eq!(listing[0].name, BASELINE_FORK);
        assert_eq!(listing[0].kind, TestKind::Fork);
    }

    #[tokio::test]
    async fn test_demo_suite_passes() {
        let session = Session::default();
        register(&session);

        let mut log = EventLog::new();
        let state = session.run(&mut log).await;

        assert!(state.is_success(), "failures: {:?}", state.failed);
        assert_eq!(state.passed, 7);
        assert_eq!(state.skipped, 2);
        assert_eq!(log.retries(), 2);
        assert_eq!(
            state.outcome("demo: failing diff").unwrap().status,
            TestStatus::Failed
        );
    }
}
