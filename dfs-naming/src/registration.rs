use dfs_path::Path;
use dfs_rpc::{RemoteInterface, Stub};
use dfs_storage_api::{Command, Storage};
use serde::{Deserialize, Serialize};

/// The naming server's storage-server-facing interface: a single
/// `register` method.
pub struct Registration;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum RegistrationRequest {
    Register {
        storage: Stub<Storage>,
        command: Stub<Command>,
        files: Vec<Path>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationResponse {
    Register(Vec<Path>),
}

impl RemoteInterface for Registration {
    type Request = RegistrationRequest;
    type Response = RegistrationResponse;
    const NAME: &'static str = "Registration";
}
