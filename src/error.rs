//! Error taxonomy for the prefilter.
//!
//! Everything in the crate returns `anyhow::Result`. The variants below are
//! the categories callers need to branch on; they travel inside
//! `anyhow::Error` and are recovered with [`PrefilterError::classify`].

/// Categorised prefilter failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrefilterError {
    /// Horizon not found, degenerate crop line, or unusable tile geometry.
    Geometry(String),
    /// Tile topology changed between consecutive frames.
    Comparability(String),
    /// The frame source failed.
    Stream(String),
    /// Invalid configuration at (re)configuration time.
    Config(String),
}

impl PrefilterError {
    /// Find the prefilter category of an `anyhow::Error`, if it has one.
    pub fn classify(err: &anyhow::Error) -> Option<&PrefilterError> {
        err.chain().find_map(|cause| cause.downcast_ref::<PrefilterError>())
    }

    /// Per-cycle errors that make a cycle inconclusive instead of failing the loop.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PrefilterError::Geometry(_) | PrefilterError::Comparability(_)
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            PrefilterError::Geometry(_) => "GEOMETRY",
            PrefilterError::Comparability(_) => "COMPARABILITY",
            PrefilterError::Stream(_) => "STREAM",
            PrefilterError::Config(_) => "CONFIG",
        }
    }

    fn message(&self) -> &str {
        match self {
            PrefilterError::Geometry(msg)
            | PrefilterError::Comparability(msg)
            | PrefilterError::Stream(msg)
            | PrefilterError::Config(msg) => msg,
        }
    }
}

impl std::fmt::Display for PrefilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for PrefilterError {}

/// Shorthand for building a `Geometry` error inside `anyhow`.
pub(crate) fn geometry(msg: impl Into<String>) -> anyhow::Error {
    PrefilterError::Geometry(msg.into()).into()
}

pub(crate) fn comparability(msg: impl Into<String>) -> anyhow::Error {
    PrefilterError::Comparability(msg.into()).into()
}

pub(crate) fn stream(msg: impl Into<String>) -> anyhow::Error {
    PrefilterError::Stream(msg.into()).into()
}

pub(crate) fn config(msg: impl Into<String>) -> anyhow::Error {
    PrefilterError::Config(msg.into()).into()
}
