//! Output module
//!
//! The [`Reporter`] contract plus the pretty and TAP renderers.

mod pretty;
mod reporter;
mod tap;

pub use pretty::PrettyReporter;
pub use reporter::{EventLog, ReportEvent, Reporter, SummaryFilters};
pub use tap::TapReporter;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Output format options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Tap,
}

impl OutputFormat {
    /// Reporter writing to stdout
    pub fn reporter(self, colorize: bool) -> Box<dyn Reporter> {
        match self {
            OutputFormat::Pretty if colorize => Box::new(PrettyReporter::stdout()),
            OutputFormat::Pretty => Box::new(PrettyReporter::stdout().no_color()),
            OutputFormat::Tap => Box::new(TapReporter::stdout()),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(OutputFormat::Pretty),
            "tap" => Ok(OutputFormat::Tap),
            other => Err(format!("Unknown format: {other}")),
        }
    }
}
