//! Structured error types shared across MARCO crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Process exit status used when a run is stopped by a signal or time limit.
pub const INTERRUPTED_EXIT_STATUS: i32 = 128;

/// Code, message and context carried by every [`MarcoError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Kebab-case code, stable across releases (`bad-literal`, `tag-out-of-range`).
    pub code: String,
    /// What went wrong.
    pub message: String,
    /// Input line, binary path, seed length and similar details.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Suggested fix, typically a command line flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Payload with empty context and no hint.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Records `key = value` in the context.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Attaches a suggested fix.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the enumeration engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum MarcoError {
    /// Unusable configuration, detected before enumeration starts.
    #[error("configuration error: {0}")]
    Config(ErrorInfo),
    /// Unreadable or malformed input formula.
    #[error("input error: {0}")]
    Input(ErrorInfo),
    /// The external minimizer violated its output contract.
    #[error("protocol error: {0}")]
    Protocol(ErrorInfo),
    /// The external minimizer could not be spawned or crashed.
    #[error("process error: {0}")]
    Process(ErrorInfo),
    /// Solver misuse or an engine that gave up.
    #[error("solver error: {0}")]
    Solver(ErrorInfo),
    /// The run was stopped by a signal or an elapsed time limit.
    #[error("interrupted: {0}")]
    Interrupted(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.message, self.code)?;
        for (key, value) in &self.context {
            write!(f, " {key}={value}")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

impl MarcoError {
    /// Payload of any variant.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            MarcoError::Config(info)
            | MarcoError::Input(info)
            | MarcoError::Protocol(info)
            | MarcoError::Process(info)
            | MarcoError::Solver(info)
            | MarcoError::Interrupted(info) => info,
        }
    }

    /// Returns true when the error represents a controlled abort.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, MarcoError::Interrupted(_))
    }

    /// Process exit status the command line front-end reports for this error.
    pub fn exit_status(&self) -> i32 {
        if self.is_interrupted() {
            INTERRUPTED_EXIT_STATUS
        } else {
            1
        }
    }
}

impl From<std::io::Error> for MarcoError {
    fn from(err: std::io::Error) -> Self {
        MarcoError::Input(
            ErrorInfo::new("io", err.to_string()).with_context("kind", format!("{:?}", err.kind())),
        )
    }
}
