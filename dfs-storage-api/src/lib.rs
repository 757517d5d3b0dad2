//! The two capability interfaces a storage server exposes to the naming
//! server: [`Storage`] (byte-level read/write) and [`Command`] (filesystem
//! mutation). Both are consumed as [`dfs_rpc::Stub`]s by the naming server
//! and implemented as [`dfs_rpc::RemoteHandler`]s by a storage server's own
//! process — the disk backend behind that implementation is out of scope
//! here (see the root crate's `reference_storage` for an in-memory stand-in
//! used only by tests).

use async_trait::async_trait;
use dfs_path::Path;
use dfs_rpc::{Error, RemoteHandler, RemoteInterface, Stub};
use serde::{Deserialize, Serialize};

/// Marker type for [`RemoteInterface`]; never constructed.
pub struct Storage;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageRequest {
    Size { path: Path },
    Read { path: Path, offset: i64, length: i64 },
    Write { path: Path, offset: i64, data: Vec<u8> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageResponse {
    Size(i64),
    Read(Vec<u8>),
    Write(bool),
}

impl RemoteInterface for Storage {
    type Request = StorageRequest;
    type Response = StorageResponse;
    const NAME: &'static str = "Storage";
}

/// Marker type for [`RemoteInterface`]; never constructed.
pub struct Command;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CommandRequest {
    Create { path: Path },
    Delete { path: Path },
    Copy { path: Path, source: Stub<Storage> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandResponse {
    Create(bool),
    Delete(bool),
    Copy(bool),
}

impl RemoteInterface for Command {
    type Request = CommandRequest;
    type Response = CommandResponse;
    const NAME: &'static str = "Command";
}

/// A storage server's two remote capabilities, obtained together at
/// registration (spec §3's "storage-server handle").
///
/// Equality and hashing use both endpoints, matching spec §3 exactly; two
/// handles are never considered the same server unless both stubs agree.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageHandle {
    pub storage: Stub<Storage>,
    pub command: Stub<Command>,
}

impl StorageHandle {
    pub fn new(storage: Stub<Storage>, command: Stub<Command>) -> Self {
        Self { storage, command }
    }
}

/// Convenience wrapper implemented by a storage server's own process over
/// its local disk backend; `dfs-storage-api` only defines the wire shape,
/// not this trait's implementation.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn size(&self, path: &Path) -> Result<i64, Error>;
    async fn read(&self, path: &Path, offset: i64, length: i64) -> Result<Vec<u8>, Error>;
    async fn write(&self, path: &Path, offset: i64, data: &[u8]) -> Result<bool, Error>;
    async fn create(&self, path: &Path) -> Result<bool, Error>;
    async fn delete(&self, path: &Path) -> Result<bool, Error>;
    async fn copy(&self, path: &Path, source: &Stub<Storage>) -> Result<bool, Error>;
}

/// Dispatches [`StorageRequest`] to a [`StorageBackend`]'s byte-I/O half.
pub struct StorageHandler<B: StorageBackend> {
    backend: std::sync::Arc<B>,
}

impl<B: StorageBackend> StorageHandler<B> {
    pub fn new(backend: std::sync::Arc<B>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl<B: StorageBackend> RemoteHandler<Storage> for StorageHandler<B> {
    async fn handle(&self, request: StorageRequest) -> Result<StorageResponse, Error> {
        match request {
            StorageRequest::Size { path } => {
                self.backend.size(&path).await.map(StorageResponse::Size)
            }
            StorageRequest::Read {
                path,
                offset,
                length,
            } => self
                .backend
                .read(&path, offset, length)
                .await
                .map(StorageResponse::Read),
            StorageRequest::Write { path, offset, data } => self
                .backend
                .write(&path, offset, &data)
                .await
                .map(StorageResponse::Write),
        }
    }
}

/// Dispatches [`CommandRequest`] to a [`StorageBackend`]'s mutation half.
pub struct CommandHandler<B: StorageBackend> {
    backend: std::sync::Arc<B>,
}

impl<B: StorageBackend> CommandHandler<B> {
    pub fn new(backend: std::sync::Arc<B>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl<B: StorageBackend> RemoteHandler<Command> for CommandHandler<B> {
    async fn handle(&self, request: CommandRequest) -> Result<CommandResponse, Error> {
        match request {
            CommandRequest::Create { path } => self
                .backend
                .create(&path)
                .await
                .map(CommandResponse::Create),
            CommandRequest::Delete { path } => self
                .backend
                .delete(&path)
                .await
                .map(CommandResponse::Delete),
            CommandRequest::Copy { path, source } => self
                .backend
                .copy(&path, &source)
                .await
                .map(CommandResponse::Copy),
        }
    }
}

/// Thin client-side wrappers over [`Stub<Storage>`]/[`Stub<Command>`] giving
/// each operation its own method instead of callers constructing request
/// enum variants by hand — matches the ergonomics of a generated stub in
/// spec §4.B.1 ("returns an object that presents the interface").
pub struct StorageClient<'a> {
    stub: &'a Stub<Storage>,
}

impl<'a> StorageClient<'a> {
    pub fn new(stub: &'a Stub<Storage>) -> Self {
        Self { stub }
    }

    pub async fn size(&self, path: &Path) -> Result<i64, Error> {
        match self
            .stub
            .call(StorageRequest::Size { path: path.clone() })
            .await?
        {
            StorageResponse::Size(size) => Ok(size),
            other => Err(unexpected_response("Storage.size", &other)),
        }
    }

    pub async fn read(&self, path: &Path, offset: i64, length: i64) -> Result<Vec<u8>, Error> {
        match self
            .stub
            .call(StorageRequest::Read {
                path: path.clone(),
                offset,
                length,
            })
            .await?
        {
            StorageResponse::Read(bytes) => Ok(bytes),
            other => Err(unexpected_response("Storage.read", &other)),
        }
    }

    pub async fn write(&self, path: &Path, offset: i64, data: &[u8]) -> Result<bool, Error> {
        match self
            .stub
            .call(StorageRequest::Write {
                path: path.clone(),
                offset,
                data: data.to_vec(),
            })
            .await?
        {
            StorageResponse::Write(ok) => Ok(ok),
            other => Err(unexpected_response("Storage.write", &other)),
        }
    }
}

pub struct CommandClient<'a> {
    stub: &'a Stub<Command>,
}

impl<'a> CommandClient<'a> {
    pub fn new(stub: &'a Stub<Command>) -> Self {
        Self { stub }
    }

    pub async fn create(&self, path: &Path) -> Result<bool, Error> {
        match self
            .stub
            .call(CommandRequest::Create { path: path.clone() })
            .await?
        {
            CommandResponse::Create(ok) => Ok(ok),
            other => Err(unexpected_response("Command.create", &other)),
        }
    }

    pub async fn delete(&self, path: &Path) -> Result<bool, Error> {
        match self
            .stub
            .call(CommandRequest::Delete { path: path.clone() })
            .await?
        {
            CommandResponse::Delete(ok) => Ok(ok),
            other => Err(unexpected_response("Command.delete", &other)),
        }
    }

    pub async fn copy(&self, path: &Path, source: Stub<Storage>) -> Result<bool, Error> {
        match self
            .stub
            .call(CommandRequest::Copy {
                path: path.clone(),
                source,
            })
            .await?
        {
            CommandResponse::Copy(ok) => Ok(ok),
            other => Err(unexpected_response("Command.copy", &other)),
        }
    }
}

fn unexpected_response(operation: &str, response: &impl std::fmt::Debug) -> Error {
    Error::transport(format!(
        "{operation} received a response of the wrong shape: {response:?}"
    ))
}
