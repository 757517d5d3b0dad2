use derive_more::Display;

/// Failure modes for constructing or navigating a [`crate::Path`].
///
/// These map onto the `invalid-argument` and `not-found` error kinds used
/// by the rest of the workspace; callers that need a unified error type
/// convert a [`PathError`] into their own kind at the API boundary.
#[derive(Copy, Clone, Debug, Display, PartialEq, Eq)]
pub enum PathError {
    #[display(fmt = "path string must not be empty")]
    Empty,

    #[display(fmt = "path string must start with '/'")]
    MissingLeadingSlash,

    #[display(fmt = "path must not contain the reserved character ':'")]
    ReservedCharacter,

    #[display(fmt = "path component must not be empty")]
    EmptyComponent,

    #[display(fmt = "root path has no parent")]
    RootHasNoParent,

    #[display(fmt = "root path has no last component")]
    RootHasNoLast,

    #[display(fmt = "local directory does not exist")]
    DirectoryNotFound,

    #[display(fmt = "local path exists but is not a directory")]
    NotADirectory,

    #[display(fmt = "wire-encoded path's component list did not match its stringified form")]
    InconsistentWireEncoding,
}

impl std::error::Error for PathError {}
