//! An in-memory stand-in for a storage server's disk backend, grounded on
//! the shape of a disk backend's read/write-vs-mutate capability split but
//! holding bytes in a map rather than touching a filesystem. Used only by
//! this workspace's own tests; a real storage server implements
//! [`StorageBackend`] against actual files.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use crate::{
    Command, CommandHandler, Error, Path, Skeleton, Storage, StorageBackend, StorageHandle,
    StorageHandler, Stub,
};
use async_trait::async_trait;

pub struct InMemoryStorage {
    files: Mutex<HashMap<Path, Vec<u8>>>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    async fn size(&self, path: &Path) -> Result<i64, Error> {
        let files = self.files.lock().unwrap();
        files
            .get(path)
            .map(|bytes| bytes.len() as i64)
            .ok_or_else(|| Error::not_found(format!("{path} does not exist")))
    }

    async fn read(&self, path: &Path, offset: i64, length: i64) -> Result<Vec<u8>, Error> {
        if offset < 0 || length < 0 {
            return Err(Error::invalid_argument(
                "read offset and length must be non-negative",
            ));
        }
        let files = self.files.lock().unwrap();
        let bytes = files
            .get(path)
            .ok_or_else(|| Error::not_found(format!("{path} does not exist")))?;
        let start = (offset as usize).min(bytes.len());
        let end = start.saturating_add(length as usize).min(bytes.len());
        Ok(bytes[start..end].to_vec())
    }

    async fn write(&self, path: &Path, offset: i64, data: &[u8]) -> Result<bool, Error> {
        if offset < 0 {
            return Err(Error::invalid_argument("write offset must be non-negative"));
        }
        let mut files = self.files.lock().unwrap();
        let bytes = files
            .get_mut(path)
            .ok_or_else(|| Error::not_found(format!("{path} does not exist")))?;
        let start = offset as usize;
        if bytes.len() < start + data.len() {
            bytes.resize(start + data.len(), 0);
        }
        bytes[start..start + data.len()].copy_from_slice(data);
        Ok(true)
    }

    async fn create(&self, path: &Path) -> Result<bool, Error> {
        let mut files = self.files.lock().unwrap();
        Ok(files.insert(path.clone(), Vec::new()).is_none())
    }

    async fn delete(&self, path: &Path) -> Result<bool, Error> {
        let mut files = self.files.lock().unwrap();
        Ok(files.remove(path).is_some())
    }

    async fn copy(&self, path: &Path, source: &Stub<Storage>) -> Result<bool, Error> {
        use crate::StorageClient;

        let client = StorageClient::new(source);
        let size = client.size(path).await?;
        let bytes = client.read(path, 0, size).await?;

        let mut files = self.files.lock().unwrap();
        files.insert(path.clone(), bytes);
        Ok(true)
    }
}

/// Starts a pair of skeletons (`Storage`, `Command`) over one
/// [`InMemoryStorage`] backend and returns the [`StorageHandle`] a
/// registration call would submit to the naming server, plus the
/// skeletons themselves so the caller controls their lifetime.
pub async fn start(
    bind_addr: std::net::IpAddr,
) -> Result<
    (
        StorageHandle,
        Skeleton<Storage, StorageHandler<InMemoryStorage>>,
        Skeleton<Command, CommandHandler<InMemoryStorage>>,
    ),
    Error,
> {
    let backend = Arc::new(InMemoryStorage::new());

    let storage_skeleton = Skeleton::new(StorageHandler::new(backend.clone()));
    let storage_addr = storage_skeleton
        .start(SocketAddr::new(bind_addr, 0))
        .await?;

    let command_skeleton = Skeleton::new(CommandHandler::new(backend));
    let command_addr = command_skeleton
        .start(SocketAddr::new(bind_addr, 0))
        .await?;

    let handle = StorageHandle::new(Stub::new(storage_addr), Stub::new(command_addr));
    Ok((handle, storage_skeleton, command_skeleton))
}
