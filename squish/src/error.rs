use crate::compression::Algorithm;
use std::fmt;
use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Stage of a stream operation an I/O failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Write,
    Flush,
    Finish,
    Read,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Write => "write",
            Phase::Flush => "flush",
            Phase::Finish => "finish",
            Phase::Read => "read",
        })
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// The algorithm identifier does not name a supported format.
    #[error("unsupported compression algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The source did not start with a valid header for the format.
    #[error("failed to create {algorithm} reader: invalid header")]
    InvalidHeader { algorithm: Algorithm },

    /// Reading the header from the source failed.
    #[error("failed to create {algorithm} reader: {source}")]
    Open {
        algorithm: Algorithm,
        #[source]
        source: io::Error,
    },

    /// An I/O or codec failure while the stream was in use.
    #[error("failed to {phase} {algorithm} stream: {source}")]
    Stream {
        algorithm: Algorithm,
        phase: Phase,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Returns true for errors that mean the adapter could not be built at
    /// all. These point at a bad configuration or an unreadable input format
    /// and should not be retried.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::UnsupportedAlgorithm(_) | Error::InvalidHeader { .. } | Error::Open { .. } => {
                true
            }
            Error::Stream { .. } => false,
        }
    }

    pub(crate) fn stream(algorithm: Algorithm, phase: Phase, source: io::Error) -> Self {
        Error::Stream {
            algorithm,
            phase,
            source,
        }
    }
}

/// Annotates an I/O error raised inside a `Read`/`Write` impl with the
/// algorithm and phase, keeping the original error kind.
pub(crate) fn annotate(algorithm: Algorithm, phase: Phase, err: io::Error) -> io::Error {
    io::Error::new(err.kind(), Error::stream(algorithm, phase, err))
}
