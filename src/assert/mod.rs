//! Assertions
//!
//! A small predicate set wired to the [`Bridge`]. Every predicate reports a
//! pass through the bridge or returns an [`AssertionFailure`], so test bodies
//! use `?` to stop at the first failing check.

mod bridge;

pub use bridge::{AssertionEvent, Bridge, PassHook};

use std::fmt::Debug;
use std::sync::Arc;

use crate::models::AssertionFailure;

pub type AssertResult = Result<(), AssertionFailure>;

/// Handle passed to every test body
#[derive(Clone)]
pub struct Assert {
    bridge: Arc<Bridge>,
}

impl Assert {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self { bridge }
    }

    fn report(&self, operator: &str, message: &str) -> AssertResult {
        self.bridge.report(operator, message);
        Ok(())
    }

    /// Unconditional pass
    pub fn pass(&self, message: &str) -> AssertResult {
        self.report("pass", message)
    }

    /// Unconditional failure
    pub fn fail(&self, message: &str) -> AssertResult {
        Err(AssertionFailure::new("fail", message))
    }

    pub fn ok(&self, value: bool, message: &str) -> AssertResult {
        if value {
            self.report("ok", message)
        } else {
            Err(AssertionFailure::new("ok", message).with_values(value, true))
        }
    }

    pub fn not_ok(&self, value: bool, message: &str) -> AssertResult {
        if !value {
            self.report("notOk", message)
        } else {
            Err(AssertionFailure::new("notOk", message).with_values(value, false))
        }
    }

    pub fn is<T: PartialEq + Debug>(&self, actual: T, expected: T, message: &str) -> AssertResult {
        if actual == expected {
            self.report("is", message)
        } else {
            Err(AssertionFailure::new("is", message).with_values(actual, expected))
        }
    }

    pub fn not<T: PartialEq + Debug>(&self, actual: T, expected: T, message: &str) -> AssertResult {
        if actual != expected {
            self.report("not", message)
        } else {
            Err(AssertionFailure::new("not", message).with_values(actual, expected))
        }
    }

    /// `actual` equals one of `options`
    pub fn any<T: PartialEq + Debug>(&self, actual: T, options: &[T], message: &str) -> AssertResult {
        if options.contains(&actual) {
            self.report("any", message)
        } else {
            Err(AssertionFailure::new("any", message).with_values(actual, options))
        }
    }
}
