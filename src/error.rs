//! Typed errors for parsing and configuration.

use crate::order::Channel;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification so callers can tell "no data" from "bad schema"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    MissingColumn,
    DateParseFailure,
    EmptyInput,
    Decode,
    Csv,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::MissingColumn => "missing column",
            ErrorKind::DateParseFailure => "no parseable dates",
            ErrorKind::EmptyInput => "no data",
            ErrorKind::Decode => "not UTF-8",
            ErrorKind::Csv => "malformed CSV",
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{channel}: missing required column '{field}' (accepted: {accepted})")]
    MissingColumn {
        channel: Channel,
        field: &'static str,
        accepted: String,
    },

    #[error("{channel}: none of {rows} data rows had a parseable date")]
    DateParseFailure { channel: Channel, rows: usize },

    #[error("{channel}: {reason}")]
    EmptyInput { channel: Channel, reason: &'static str },

    #[error("{channel}: input is not valid UTF-8 ({source})")]
    Decode {
        channel: Channel,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("{channel}: CSV error: {source}")]
    Csv {
        channel: Channel,
        #[source]
        source: csv::Error,
    },
}

impl ParseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ParseError::MissingColumn { .. } => ErrorKind::MissingColumn,
            ParseError::DateParseFailure { .. } => ErrorKind::DateParseFailure,
            ParseError::EmptyInput { .. } => ErrorKind::EmptyInput,
            ParseError::Decode { .. } => ErrorKind::Decode,
            ParseError::Csv { .. } => ErrorKind::Csv,
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            ParseError::MissingColumn { channel, .. }
            | ParseError::DateParseFailure { channel, .. }
            | ParseError::EmptyInput { channel, .. }
            | ParseError::Decode { channel, .. }
            | ParseError::Csv { channel, .. } => *channel,
        }
    }
}

/// Errors related to loading the report configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value: {0}")]
    Invalid(String),
}
