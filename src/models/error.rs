//! Failure taxonomy for test attempts
//!
//! Every way a test attempt can fail ends up as a [`TestError`].

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured failure raised by an assertion predicate
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct AssertionFailure {
    pub operator: String,
    pub message: String,
    pub actual: Option<String>,
    pub expected: Option<String>,
}

impl AssertionFailure {
    pub fn new(operator: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operator: operator.into(),
            message: message.into(),
            actual: None,
            expected: None,
        }
    }

    pub fn with_values(mut self, actual: impl fmt::Debug, expected: impl fmt::Debug) -> Self {
        self.actual = Some(format!("{actual:?}"));
        self.expected = Some(format!("{expected:?}"));
        self
    }
}

/// Why a test attempt failed
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum TestError {
    #[error(transparent)]
    Assertion(#[from] AssertionFailure),

    #[error("timeout after {0}ms")]
    Timeout(u64),

    #[error("{0}")]
    Runtime(String),

    #[error("isolate failure: {0}")]
    Isolate(String),

    #[error("serialization failure: {0}")]
    Serialization(String),
}

impl TestError {
    /// Classify an error returned by a test body.
    ///
    /// Structured assertion failures and engine errors survive the trip
    /// through `anyhow`; everything else is an unstructured runtime failure.
    pub fn from_body(err: anyhow::Error) -> Self {
        let err = match err.downcast::<AssertionFailure>() {
            Ok(failure) => return TestError::Assertion(failure),
            Err(err) => err,
        };
        match err.downcast::<TestError>() {
            Ok(error) => error,
            Err(err) => TestError::Runtime(format!("{err:#}")),
        }
    }

    /// Turn a caught panic payload into a runtime failure
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        TestError::Runtime(format!("panicked: {}", panic_message(payload.as_ref())))
    }

    pub fn is_assertion(&self) -> bool {
        matches!(self, TestError::Assertion(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TestError::Timeout(_))
    }

    /// Structured assertion details, if any
    pub fn assertion(&self) -> Option<&AssertionFailure> {
        match self {
            TestError::Assertion(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Extract the human-readable message from a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_body_keeps_assertion_structure() {
        let failure = AssertionFailure::new("is", "should be equal").with_values(1, 2);
        let err = TestError::from_body(anyhow::Error::new(failure.clone()));

        assert_eq!(err, TestError::Assertion(failure));
        let details = err.assertion().unwrap();
        assert_eq!(details.actual.as_deref(), Some("1"));
        assert_eq!(details.expected.as_deref(), Some("2"));
    }

    #[test]
    fn test_from_body_unstructured() {
        let err = TestError::from_body(anyhow::anyhow!("boom"));
        assert_eq!(err, TestError::Runtime("boom".to_string()));
        assert!(!err.is_assertion());
    }

    #[test]
    fn test_from_body_passes_engine_errors_through() {
        let err = TestError::from_body(anyhow::Error::new(TestError::Serialization(
            "bad data".to_string(),
        )));
        assert_eq!(err, TestError::Serialization("bad data".to_string()));
    }

    #[test]
    fn test_timeout_message_carries_duration() {
        let err = TestError::Timeout(50);
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "timeout after 50ms");
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("kaboom");
        assert_eq!(
            TestError::from_panic(payload),
            TestError::Runtime("panicked: kaboom".to_string())
        );
    }
}
