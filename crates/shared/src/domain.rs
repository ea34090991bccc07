use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ParseSendModeError;

/// Latest read of a node's counters. Always replaced as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub http_count: u64,
    pub http_last_message: Option<String>,
    pub local_count: u64,
    pub local_last_message: Option<String>,
    pub remote_count: u64,
    pub remote_last_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SendMode {
    #[default]
    Local,
    Remote,
    RemoteMismatch,
}

impl SendMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::RemoteMismatch => "remote-mismatch",
        }
    }
}

impl fmt::Display for SendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SendMode {
    type Err = ParseSendModeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            "remote-mismatch" | "remote_mismatch" => Ok(Self::RemoteMismatch),
            other => Err(ParseSendModeError(other.to_string())),
        }
    }
}
