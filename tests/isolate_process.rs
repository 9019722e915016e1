//! Process isolation against the built `tst` binary

use tst_engine::demo::{self, BASELINE_FORK};
use tst_engine::output::ReportEvent;
use tst_engine::{EventLog, Isolation, ProcessIsolation, RunOptions, Session, TestError, TestOptions};

use std::time::{Duration, Instant};

fn process_session(pattern: Option<&str>) -> Session {
    let isolation = Isolation::Process(ProcessIsolation::new(env!("CARGO_BIN_EXE_tst")));
    let mut options = RunOptions::new().isolation(isolation);
    if let Some(pattern) = pattern {
        options = options.pattern(pattern).unwrap();
    }
    Session::new(options)
}

/// Session whose isolates are `sh -c script`; the script sees the request on stdin
fn scripted_session(script: &str) -> Session {
    let isolation = Isolation::Process(ProcessIsolation::new("/bin/sh").arg("-c").arg(script));
    Session::new(RunOptions::new().isolation(isolation))
}

fn register_scripted_fork(session: &Session, options: TestOptions) {
    session.fork("fork: scripted", options, |t, _| async move {
        t.pass("handled by the script")?;
        Ok(())
    });
}

#[tokio::test]
async fn test_fork_tests_run_in_child_process() {
    let session = process_session(Some("^fork"));
    demo::register(&session);

    let mut log = EventLog::new();
    let state = session.run(&mut log).await;

    assert!(state.is_success(), "failures: {:?}", state.failed);
    assert_eq!(state.passed, 2);
    assert_eq!(log.sequences(), vec![1, 2, 3]);
    assert_eq!(state.outcome(BASELINE_FORK).unwrap().assertions, 1);
    assert_eq!(state.outcome("fork: computed data").unwrap().assertions, 2);

    let first = log
        .events
        .iter()
        .find(|e| matches!(e, ReportEvent::Assertion { .. }))
        .unwrap();
    assert!(matches!(first, ReportEvent::Assertion { n: 1, sequence: 1, .. }));
}

#[tokio::test]
async fn test_unknown_fork_test_is_unresolved() {
    let session = process_session(None);
    session.fork(
        "fork: not in this binary",
        TestOptions::new(),
        |t, _| async move {
            t.pass("unreachable")?;
            Ok(())
        },
    );

    let mut log = EventLog::new();
    let state = session.run(&mut log).await;

    assert_eq!(state.failed.len(), 1);
    let failures = log.failures();
    assert!(matches!(failures[0].1, TestError::Serialization(_)));
    // the failure point is still counted
    assert_eq!(state.assertion_count, 1);
}

#[tokio::test]
async fn test_hung_isolate_is_killed_at_timeout() {
    let session = scripted_session("read -r _; sleep 10");
    register_scripted_fork(&session, TestOptions::new().timeout_ms(300));

    let started = Instant::now();
    let mut log = EventLog::new();
    let state = session.run(&mut log).await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(state.failed.len(), 1);
    assert!(state.failed[0].message.contains("300"));
    let failures = log.failures();
    assert!(failures[0].1.is_timeout());
    assert_eq!(state.assertion_count, 1);
}

#[tokio::test]
async fn test_non_utf8_output_still_honors_timeout() {
    let session = scripted_session(r#"read -r _; printf '\377\376\n'; sleep 10"#);
    register_scripted_fork(&session, TestOptions::new().timeout_ms(300));

    let started = Instant::now();
    let mut log = EventLog::new();
    let state = session.run(&mut log).await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(state.failed.len(), 1);
    let failures = log.failures();
    assert_eq!(failures[0].1, &TestError::Timeout(300));
}

#[tokio::test]
async fn test_stray_output_does_not_hide_assertions() {
    let script = r#"read -r _
printf '\377 not protocol\n'
printf '{"type":"assertion","sequenceNumber":1,"operator":"ok","message":"after noise"}\n'
printf '{"type":"done","ok":true,"elapsedMs":1.0,"assertionCount":1}\n'"#;
    let session = scripted_session(script);
    register_scripted_fork(&session, TestOptions::new().timeout_ms(2000));

    let mut log = EventLog::new();
    let state = session.run(&mut log).await;

    assert!(state.is_success(), "failures: {:?}", state.failed);
    assert_eq!(log.sequences(), vec![1]);
}

#[tokio::test]
async fn test_crashed_isolate_is_isolate_failure() {
    let script = r#"read -r _
printf '{"type":"assertion","sequenceNumber":1,"operator":"ok","message":"before exit"}\n'
exit 70"#;
    let session = scripted_session(script);
    register_scripted_fork(&session, TestOptions::new().timeout_ms(2000));

    let mut log = EventLog::new();
    let state = session.run(&mut log).await;

    assert_eq!(state.failed.len(), 1);
    let failures = log.failures();
    assert!(matches!(failures[0].1, TestError::Isolate(_)), "{:?}", failures[0].1);
    // streamed pass plus the failure point
    assert_eq!(state.assertion_count, 2);
    assert_eq!(state.outcome("fork: scripted").unwrap().assertions, 2);
}

#[tokio::test]
async fn test_crashed_fork_is_retried() {
    let session = scripted_session("read -r _; exit 70");
    register_scripted_fork(&session, TestOptions::new().retries(2).timeout_ms(2000));

    let mut log = EventLog::new();
    let state = session.run(&mut log).await;

    assert_eq!(log.retries(), 2);
    assert_eq!(state.failed.len(), 1);
    assert_eq!(log.failures().len(), 1);
}

#[tokio::test]
async fn test_failed_done_adds_failure_point() {
    let script = r#"read -r _
printf '{"type":"assertion","sequenceNumber":1,"operator":"ok","message":"first"}\n'
printf '{"type":"done","ok":false,"elapsedMs":1.0,"assertionCount":1,"errorMessage":"boom"}\n'"#;
    let session = scripted_session(script);
    register_scripted_fork(&session, TestOptions::new().timeout_ms(2000));

    let mut log = EventLog::new();
    let state = session.run(&mut log).await;

    assert_eq!(state.failed.len(), 1);
    assert!(state.failed[0].message.contains("boom"));
    assert_eq!(state.outcome("fork: scripted").unwrap().assertions, 2);
    assert_eq!(state.assertion_count, 2);
}
