// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the scanner

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Scan session errors
    Session(SessionError),
    /// Frame source errors
    Source(SourceError),
    /// Configuration errors
    Config(ConfigError),
    /// Generic error with message
    Other(String),
}

/// Per-frame analysis errors
///
/// None of these are fatal: each one ends the analysis of a single frame and
/// the pipeline carries on with the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Frame carries no extractable image buffer
    EmptyFrame,
    /// Decoder reported a failure
    DecodeFailure(String),
    /// Frame arrived while the pipeline was not active
    SubmissionIgnored,
}

/// Failure reported by a [`Decoder`](crate::pipelines::scan::Decoder)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    message: String,
}

/// Frame source errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Operation not supported by this source
    Unsupported(String),
    /// Reading source input failed
    Io(String),
    /// Source input could not be turned into frames
    Decode(String),
    /// Source already delivers frames to a pipeline
    AlreadySubscribed,
    /// Source has nothing to deliver
    NoFrames,
}

/// Frame release errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseError {
    /// The frame handle is no longer valid at its source
    InvalidHandle(u64),
    /// The source is gone
    SourceClosed,
}

/// Scan session errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A required collaborator was not supplied
    MissingComponent(&'static str),
    /// Session was terminated and cannot be reactivated
    Terminated,
    /// Torch requested on a source that has none
    TorchUnavailable,
    /// Frame source failure
    Source(SourceError),
    /// Background worker could not be started
    Executor(String),
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Reading or writing the config file failed
    Io(String),
    /// Config file content is invalid
    Parse(String),
}

impl DecodeError {
    /// Generic message used when a decoder gives no diagnostic
    pub const FALLBACK_MESSAGE: &'static str = "decode failed";

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Diagnostic text, never empty
    pub fn message(&self) -> &str {
        if self.message.trim().is_empty() {
            Self::FALLBACK_MESSAGE
        } else {
            &self.message
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Session(e) => write!(f, "Session error: {}", e),
            AppError::Source(e) => write!(f, "Source error: {}", e),
            AppError::Config(e) => write!(f, "Configuration error: {}", e),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::EmptyFrame => write!(f, "Image is empty"),
            ScanError::DecodeFailure(msg) => write!(f, "{}", msg),
            ScanError::SubmissionIgnored => write!(f, "Frame submitted while not active"),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Unsupported(what) => write!(f, "Not supported: {}", what),
            SourceError::Io(msg) => write!(f, "I/O error: {}", msg),
            SourceError::Decode(msg) => write!(f, "Failed to load frame: {}", msg),
            SourceError::AlreadySubscribed => write!(f, "Source is already subscribed"),
            SourceError::NoFrames => write!(f, "Source has no frames"),
        }
    }
}

impl fmt::Display for ReleaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseError::InvalidHandle(id) => write!(f, "Frame {} is not held by its source", id),
            ReleaseError::SourceClosed => write!(f, "Frame source is closed"),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::MissingComponent(name) => write!(f, "No {} supplied", name),
            SessionError::Terminated => write!(f, "Session has been terminated"),
            SessionError::TorchUnavailable => write!(f, "Torch is not available"),
            SessionError::Source(e) => write!(f, "Frame source error: {}", e),
            SessionError::Executor(msg) => write!(f, "Analysis worker error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for ScanError {}
impl std::error::Error for DecodeError {}
impl std::error::Error for SourceError {}
impl std::error::Error for ReleaseError {}
impl std::error::Error for SessionError {}
impl std::error::Error for ConfigError {}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::Session(err)
    }
}

impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        AppError::Source(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<SourceError> for SessionError {
    fn from(err: SourceError) -> Self {
        SessionError::Source(err)
    }
}

impl From<DecodeError> for ScanError {
    fn from(err: DecodeError) -> Self {
        ScanError::DecodeFailure(err.message().to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::Io(err.to_string())
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}
