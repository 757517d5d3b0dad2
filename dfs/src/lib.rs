//! Top-level crate tying the distributed filesystem together: re-exports
//! of every layer, plus an in-memory [`reference_storage`] backend used
//! only by this crate's own integration tests. Real storage servers are
//! out of scope here (see `spec.md` §1) — `reference_storage` stands in
//! for the disk backend so the naming server can be exercised end to end.

pub use dfs_naming::{
    NamingServer, NamingServerConfig, NamingServerRef, Registration, RegistrationRequest,
    RegistrationResponse, Service, ServiceRequest, ServiceResponse,
};
pub use dfs_path::{Path, PathError, WirePath};
pub use dfs_rpc::{Error, ErrorKind, Id, RemoteHandler, RemoteInterface, Skeleton, Stub};
pub use dfs_storage_api::{
    Command, CommandClient, CommandHandler, CommandRequest, CommandResponse, Storage,
    StorageBackend, StorageClient, StorageHandle, StorageHandler, StorageRequest, StorageResponse,
};
pub use dfs_tree::Tree;

pub mod reference_storage;
