use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("terminal I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown option: {0}")]
    UnknownOption(String),

    #[error("option {0} requires a value")]
    MissingValue(&'static str),

    #[error("invalid mode {0:?} (expected both, stdout or stderr)")]
    InvalidMode(String),

    #[error("invalid line capacity {0:?} (expected a positive integer)")]
    InvalidCapacity(String),

    #[error("too many positional arguments")]
    TooManyPaths,
}

#[derive(Debug, Error)]
pub enum FollowError {
    #[error("no path provided")]
    NoPath,

    #[error("creating pipe: {0}")]
    Pipe(#[source] io::Error),

    #[error("starting tail: {0}")]
    Spawn(#[source] io::Error),

    #[error("{0}")]
    Read(#[source] io::Error),

    #[error("end of stream")]
    Eof,

    #[error("log reader not initialized")]
    ReaderNotInitialized,
}

impl FollowError {
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }
}

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("selection too large for the clipboard ({0} encoded bytes)")]
    PayloadTooLarge(usize),

    #[error("clipboard write failed: {0}")]
    Write(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum PagerError {
    #[error("no log path for this pane")]
    NoPath,

    #[error("could not run {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
}
