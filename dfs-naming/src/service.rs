use dfs_path::Path;
use dfs_rpc::{RemoteInterface, Stub};
use dfs_storage_api::Storage;
use serde::{Deserialize, Serialize};

/// The naming server's client-facing interface.
pub struct Service;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceRequest {
    IsDirectory { path: Path },
    List { path: Path },
    CreateFile { path: Path },
    CreateDirectory { path: Path },
    Delete { path: Path },
    GetStorage { path: Path },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceResponse {
    IsDirectory(bool),
    List(Vec<String>),
    CreateFile(bool),
    CreateDirectory(bool),
    Delete(bool),
    /// Only the read/write `Storage` capability — never `Command`, which
    /// stays private to the naming server (spec §2, §6).
    GetStorage(Stub<Storage>),
}

impl RemoteInterface for Service {
    type Request = ServiceRequest;
    type Response = ServiceResponse;
    const NAME: &'static str = "Service";
}
