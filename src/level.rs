// SPDX-License-Identifier: Apache-2.0 OR MIT
// Log levels, ordered least to most severe

use serde::{Deserialize, Serialize};

/// Log severity levels (0-4, higher is more severe)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    /// Verbose diagnostics, normally filtered out in production
    Debug = 0,
    /// Normal operational messages
    Info = 1,
    /// Something unexpected that the process can tolerate
    Warn = 2,
    /// An operation failed
    Error = 3,
    /// The process is about to go down
    Fatal = 4,
}

impl Level {
    /// Get level as u8 (0-4)
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Get level name as static string
    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }

    /// Create from u8 value (returns None if invalid)
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Level::Debug),
            1 => Some(Level::Info),
            2 => Some(Level::Warn),
            3 => Some(Level::Error),
            4 => Some(Level::Fatal),
            _ => None,
        }
    }

    /// Parse a level name. Unknown names fall back to `Info`, matching the
    /// behavior callers expect from hand-edited config files.
    pub fn parse(value: &str) -> Self {
        match value {
            "DEBUG" => Level::Debug,
            "INFO" => Level::Info,
            "WARN" => Level::Warn,
            "ERROR" => Level::Error,
            "FATAL" => Level::Fatal,
            _ => Level::Info,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
