use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::io;

/// General-purpose error that can be raised locally or sent across the wire.
///
/// Mirrors the teacher's `distant_protocol::Error`/`ErrorKind` split: a
/// small closed set of kinds plus a human-readable description, rather than
/// one variant per failure site.
#[derive(Clone, Debug, Display, PartialEq, Eq, Serialize, Deserialize)]
#[display(fmt = "{kind}: {description}")]
pub struct Error {
    pub kind: ErrorKind,
    pub description: String,
}

impl std::error::Error for Error {}

impl Error {
    pub fn new(kind: ErrorKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
        }
    }

    pub fn null_argument(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::NullArgument, description)
    }

    pub fn invalid_argument(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, description)
    }

    pub fn illegal_state(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::IllegalState, description)
    }

    pub fn bad_interface(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadInterface, description)
    }

    pub fn no_such_method(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoSuchMethod, description)
    }

    pub fn not_found(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, description)
    }

    pub fn transport(description: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, description)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::Other => ErrorKind::Other,
            _ => ErrorKind::Transport,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::new(ErrorKind::Transport, format!("serialize failed: {err}"))
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::new(ErrorKind::Transport, format!("deserialize failed: {err}"))
    }
}

/// The closed set of error kinds exchanged across the dfs workspace.
///
/// Every kind in spec §7 is represented exactly once. `NullArgument`,
/// `InvalidArgument`, `IllegalState`, and `BadInterface` are always raised
/// locally at an API boundary and never cross the wire; the rest can appear
/// in a remote method's declared `Result` and so may be serialized.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A required argument was absent.
    NullArgument,

    /// A malformed path component or path string.
    InvalidArgument,

    /// A lifecycle violation: double-start, duplicate registration, or a
    /// stub created against a skeleton with no bound endpoint.
    IllegalState,

    /// The supplied interface descriptor was not a valid remote interface.
    BadInterface,

    /// The decoded request did not resolve to a known operation on the
    /// target interface.
    NoSuchMethod,

    /// The requested path does not exist, or is of the wrong kind for the
    /// requested operation.
    NotFound,

    /// Any I/O, connect, serialization, or framing failure on the RPC
    /// channel.
    Transport,

    /// The target method itself raised its declared error; the wrapped
    /// kind is always one of the others in this enum, never `Transport`.
    MethodThrew,

    /// Catch-all for an I/O error that doesn't map onto any of the kinds
    /// above, matching the teacher's own `ErrorKind::Other`.
    Other,
}
