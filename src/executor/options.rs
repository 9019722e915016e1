//! Resolved run configuration
//!
//! What the scheduler needs to know, with sourcing (files, environment,
//! flags) already done by the caller.

use std::time::Duration;

use regex::{Regex, RegexBuilder};

use crate::isolate::Isolation;

/// Timeout applied to tests without their own
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

#[derive(Clone, Debug)]
pub struct RunOptions {
    pub timeout: Duration,
    /// Case-insensitive name filter
    pub pattern: Option<Regex>,
    /// Stop after the first counted failure
    pub bail: bool,
    /// Suppress per-test output
    pub mute: bool,
    pub isolation: Isolation,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            pattern: None,
            bail: false,
            mute: false,
            isolation: Isolation::default(),
        }
    }
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout = Duration::from_millis(ms);
        self
    }

    pub fn pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.pattern = Some(RegexBuilder::new(pattern).case_insensitive(true).build()?);
        Ok(self)
    }

    pub fn bail(mut self, bail: bool) -> Self {
        self.bail = bail;
        self
    }

    pub fn mute(mut self, mute: bool) -> Self {
        self.mute = mute;
        self
    }

    pub fn isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }

    /// Whether `name` passes the pattern filter
    pub fn selects(&self, name: &str) -> bool {
        self.pattern.as_ref().map_or(true, |p| p.is_match(name))
    }
}
