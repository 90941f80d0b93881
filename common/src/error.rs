//! Error taxonomy shared by all gfcat operations
//!
//! Every error carries the offending input (URL, option string or path) and the underlying
//! system error as an `anyhow` chain. The Display implementation shows the full chain, so log
//! it with `tracing::error!("{:#}", &error)` or any other format specifier.

/// Step of the locked copy at which a failure occurred.
#[derive(Debug, Copy, Clone, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    Open,
    Lock,
    Transfer,
    Close,
}

/// Coarse classification of an [`Error`], used to pick the outcome of a command.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed command line, rejected before any work was done.
    Usage,
    Parse,
    Connect,
    Config,
    Copy(Stage),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{input}: {source:#}")]
    Parse {
        input: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("{target}: {source:#}")]
    Connect {
        target: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("{subject}: {source:#}")]
    Config {
        subject: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("{target}: {source:#}")]
    Copy {
        stage: Stage,
        target: String,
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    pub fn parse(input: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Error::Parse {
            input: input.into(),
            source: source.into(),
        }
    }

    pub fn connect(target: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Error::Connect {
            target: target.into(),
            source: source.into(),
        }
    }

    pub fn config(subject: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Error::Config {
            subject: subject.into(),
            source: source.into(),
        }
    }

    pub fn copy(stage: Stage, target: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Error::Copy {
            stage,
            target: target.into(),
            source: source.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Parse { .. } => ErrorKind::Parse,
            Error::Connect { .. } => ErrorKind::Connect,
            Error::Config { .. } => ErrorKind::Config,
            Error::Copy { stage, .. } => ErrorKind::Copy(*stage),
        }
    }

    /// Stage of a copy failure, `None` for errors raised outside of the copy.
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Copy { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
