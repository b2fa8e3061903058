//! Error types
//!
//! Pipeline errors are all recoverable: the controller turns them into
//! reason codes and the next trigger retries.

use thiserror::Error;

use crate::types::ReasonCode;

/// Selector text that does not compile
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid selector {selector:?}: {reason}")]
pub struct SelectorError {
    pub selector: String,
    pub reason: String,
}

/// Page field a pipeline step was after
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Duration,
    Complexity,
    StoryPoints,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Field::Duration => "duration",
            Field::Complexity => "complexity",
            Field::StoryPoints => "story points",
        })
    }
}

/// Outcome of a pipeline step that did not produce a value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("no candidate matched for {0}")]
    NotFound(Field),
    #[error("{0} found but not recognized")]
    Unavailable(Field),
    #[error("edit control did not appear within {0} ms")]
    RaceLost(u64),
}

impl PipelineError {
    /// Reason code reported for this error
    pub fn reason(&self) -> ReasonCode {
        match self {
            PipelineError::NotFound(field) | PipelineError::Unavailable(field) => match field {
                Field::Duration => ReasonCode::R201_DURATION_UNAVAILABLE,
                Field::Complexity => ReasonCode::R202_COMPLEXITY_UNAVAILABLE,
                Field::StoryPoints => ReasonCode::R401_TARGET_NOT_FOUND,
            },
            PipelineError::RaceLost(_) => ReasonCode::R402_RACE_LOST,
        }
    }
}

/// Typed commands that do not parse
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("invalid key combination: {0}")]
    InvalidKeyCombo(String),
    #[error("key combination without a key: {0}")]
    MissingKey(String),
}

/// Configuration loading failures
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Session flag persistence failures
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session flag io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("session flag is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}
