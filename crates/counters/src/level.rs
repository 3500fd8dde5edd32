use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Visibility level of a counter slot.
///
/// Levels are ordered from most to least important. A slot is shown in the
/// profiler output when its level is less than or equal to the active level.
/// The level never decides whether a slot is aggregated.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    #[default]
    Release = 0,
    Csv = 1,
    Test = 2,
    Trace = 3,
}

impl Level {
    /// Returns true if a slot with this level is shown when `active` is the
    /// configured reporting threshold.
    pub fn is_visible_at(self, active: Level) -> bool {
        self <= active
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Release => "release",
            Level::Csv => "csv",
            Level::Test => "test",
            Level::Trace => "trace",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown level name
#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown visibility level '{0}' (expected release, csv, test or trace)")]
pub struct ParseLevelError(String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "release" => Ok(Level::Release),
            "csv" => Ok(Level::Csv),
            "test" => Ok(Level::Test),
            "trace" => Ok(Level::Trace),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// Static description of one counter slot: display name and visibility level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub name: &'static str,
    pub level: Level,
}

impl Slot {
    pub const fn new(name: &'static str, level: Level) -> Self {
        Self { name, level }
    }
}
