//! The naming server: two remote interfaces, *Service* (client-facing) and
//! *Registration* (storage-server-facing), both fronting the same
//! [`dfs_tree::Tree`].

mod registration;
mod service;

pub use registration::{Registration, RegistrationRequest, RegistrationResponse};
pub use service::{Service, ServiceRequest, ServiceResponse};

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use dfs_path::Path;
use dfs_rpc::{Error, Skeleton};
use dfs_storage_api::{CommandClient, StorageHandle};
use dfs_tree::Tree;
use log::{debug, info};
use rand::seq::SliceRandom;
use tokio::sync::{Mutex, RwLock};

/// The two well-known ports and bind address the naming server listens on,
/// following the small `Default`-able config-struct idiom the teacher uses
/// for its disk-backend configuration.
#[derive(Clone, Debug)]
pub struct NamingServerConfig {
    pub bind_addr: IpAddr,
    pub service_port: u16,
    pub registration_port: u16,
}

impl Default for NamingServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            service_port: 0,
            registration_port: 0,
        }
    }
}

/// The object both the `Service` and `Registration` skeletons dispatch to.
///
/// Holds the namespace tree and the flat list of registered storage-server
/// handles (spec §5: "the storage-replica registry list — appended-to
/// under its own lock during register").
pub struct NamingServer {
    tree: Arc<Tree>,
    registry: RwLock<Vec<StorageHandle>>,
}

impl Default for NamingServer {
    fn default() -> Self {
        Self::new()
    }
}

impl NamingServer {
    pub fn new() -> Self {
        Self {
            tree: Arc::new(Tree::new()),
            registry: RwLock::new(Vec::new()),
        }
    }

    async fn is_directory(&self, path: Path) -> Result<bool, Error> {
        self.tree.is_directory(&path).await
    }

    async fn list(&self, path: Path) -> Result<Vec<String>, Error> {
        self.tree.list(&path).await
    }

    async fn create_directory(&self, path: Path) -> Result<bool, Error> {
        if path.is_root() {
            return Ok(false);
        }
        self.tree.create_directory(&path).await
    }

    /// Picks a registered storage server uniformly at random, inserts the
    /// file into the tree, then calls `Command.create` on that server.
    /// Rolls back the tree insertion if the remote create fails.
    async fn create_file(&self, path: Path) -> Result<bool, Error> {
        if path.is_root() {
            return Ok(false);
        }

        let replica = {
            let registry = self.registry.read().await;
            registry
                .choose(&mut rand::thread_rng())
                .cloned()
                .ok_or_else(|| {
                    Error::illegal_state("no storage servers are registered to host a new file")
                })?
        };

        if !self.tree.create_file(&path, replica.clone()).await? {
            return Ok(false);
        }

        let client = CommandClient::new(&replica.command);
        match client.create(&path).await {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.tree.remove_local(&path).await?;
                Ok(false)
            }
            Err(err) => {
                self.tree.remove_local(&path).await?;
                Err(err)
            }
        }
    }

    async fn delete(&self, path: Path) -> Result<bool, Error> {
        self.tree.delete(&path).await
    }

    /// Only the `Storage` half of the hosting replica's handle is handed
    /// back to a client; `Command` stays private to the naming server so a
    /// client can never mutate a storage server's backend directly (spec
    /// §2, §6).
    async fn get_storage(&self, path: Path) -> Result<dfs_rpc::Stub<dfs_storage_api::Storage>, Error> {
        self.tree.get_storage(&path).await.map(|handle| handle.storage)
    }

    /// Registers a storage server's replica set. Fails with *illegal-state*
    /// if `(storage, command)` was already registered. Returns the list of
    /// submitted paths the tree rejected (already occupied), which the
    /// storage server is expected to delete locally.
    async fn register(
        &self,
        storage: dfs_rpc::Stub<dfs_storage_api::Storage>,
        command: dfs_rpc::Stub<dfs_storage_api::Command>,
        files: Vec<Path>,
    ) -> Result<Vec<Path>, Error> {
        let handle = StorageHandle::new(storage, command);

        {
            let mut registry = self.registry.write().await;
            if registry.contains(&handle) {
                return Err(Error::illegal_state(
                    "this (storage, command) pair is already registered",
                ));
            }
            registry.push(handle.clone());
        }

        let mut duplicates = Vec::new();
        for path in files {
            if path.is_root() {
                continue;
            }
            if !self.tree.register_recursive(&path, handle.clone()).await {
                duplicates.push(path);
            }
        }
        Ok(duplicates)
    }
}

enum RunState {
    Stopped,
    Running {
        service: Arc<Skeleton<Service, ServiceHandler>>,
        registration: Arc<Skeleton<Registration, RegistrationHandler>>,
    },
}

struct ServiceHandler(Arc<NamingServer>);
struct RegistrationHandler(Arc<NamingServer>);

/// Owns the naming server's lifecycle: starting binds both well-known
/// ports, stopping tears both down and discards all namespace state
/// (spec §6: "Persisted state: none. Restarting the naming server
/// discards the namespace.").
pub struct NamingServerRef {
    server: Mutex<Arc<NamingServer>>,
    state: Mutex<RunState>,
}

impl Default for NamingServerRef {
    fn default() -> Self {
        Self::new()
    }
}

impl NamingServerRef {
    pub fn new() -> Self {
        Self {
            server: Mutex::new(Arc::new(NamingServer::new())),
            state: Mutex::new(RunState::Stopped),
        }
    }

    /// Starts skeletons for both interfaces per `config`. Fails with
    /// *illegal-state* if already running.
    pub async fn start(
        &self,
        config: &NamingServerConfig,
    ) -> Result<(SocketAddr, SocketAddr), Error> {
        let mut state = self.state.lock().await;
        if matches!(&*state, RunState::Running { .. }) {
            return Err(Error::illegal_state("naming server is already running"));
        }

        let server = Arc::clone(&*self.server.lock().await);

        let service: Skeleton<Service, ServiceHandler> =
            Skeleton::new(ServiceHandler(Arc::clone(&server)));
        let service_addr = service
            .start(SocketAddr::new(config.bind_addr, config.service_port))
            .await?;

        let registration: Skeleton<Registration, RegistrationHandler> =
            Skeleton::new(RegistrationHandler(Arc::clone(&server)));
        let registration_addr = registration
            .start(SocketAddr::new(config.bind_addr, config.registration_port))
            .await?;

        info!("naming server listening: service={service_addr} registration={registration_addr}");
        *state = RunState::Running {
            service: Arc::new(service),
            registration: Arc::new(registration),
        };
        Ok((service_addr, registration_addr))
    }

    /// Stops both skeletons, then discards the namespace tree and storage
    /// registry by replacing the shared [`NamingServer`] with a fresh one —
    /// a subsequent `start()` begins from an empty tree and an empty
    /// registry, matching spec §6's "restarting the naming server discards
    /// the namespace." A no-op if already stopped.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        let previous = std::mem::replace(&mut *state, RunState::Stopped);
        if let RunState::Running {
            service,
            registration,
        } = previous
        {
            service.stop().await;
            registration.stop().await;
            *self.server.lock().await = Arc::new(NamingServer::new());
            debug!("naming server stopped, namespace discarded");
        }
    }

    pub async fn server(&self) -> Arc<NamingServer> {
        Arc::clone(&*self.server.lock().await)
    }

    pub async fn is_running(&self) -> bool {
        matches!(&*self.state.lock().await, RunState::Running { .. })
    }
}

#[async_trait::async_trait]
impl dfs_rpc::RemoteHandler<Service> for ServiceHandler {
    async fn handle(&self, request: ServiceRequest) -> Result<ServiceResponse, Error> {
        match request {
            ServiceRequest::IsDirectory { path } => {
                self.0.is_directory(path).await.map(ServiceResponse::IsDirectory)
            }
            ServiceRequest::List { path } => self.0.list(path).await.map(ServiceResponse::List),
            ServiceRequest::CreateFile { path } => {
                self.0.create_file(path).await.map(ServiceResponse::CreateFile)
            }
            ServiceRequest::CreateDirectory { path } => self
                .0
                .create_directory(path)
                .await
                .map(ServiceResponse::CreateDirectory),
            ServiceRequest::Delete { path } => {
                self.0.delete(path).await.map(ServiceResponse::Delete)
            }
            ServiceRequest::GetStorage { path } => {
                self.0.get_storage(path).await.map(ServiceResponse::GetStorage)
            }
        }
    }
}

#[async_trait::async_trait]
impl dfs_rpc::RemoteHandler<Registration> for RegistrationHandler {
    async fn handle(&self, request: RegistrationRequest) -> Result<RegistrationResponse, Error> {
        match request {
            RegistrationRequest::Register {
                storage,
                command,
                files,
            } => self
                .0
                .register(storage, command, files)
                .await
                .map(RegistrationResponse::Register),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfs_storage_api::{Command, CommandHandler, Storage, StorageBackend, StorageHandler};
    use std::collections::HashMap as StdHashMap;
    use std::sync::Mutex as StdMutex;

    struct InMemoryBackend {
        files: StdMutex<StdHashMap<Path, Vec<u8>>>,
    }

    impl InMemoryBackend {
        fn new() -> Self {
            Self {
                files: StdMutex::new(StdHashMap::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl StorageBackend for InMemoryBackend {
        async fn size(&self, path: &Path) -> Result<i64, Error> {
            let files = self.files.lock().unwrap();
            files
                .get(path)
                .map(|bytes| bytes.len() as i64)
                .ok_or_else(|| Error::not_found(format!("{path} does not exist")))
        }

        async fn read(&self, path: &Path, offset: i64, length: i64) -> Result<Vec<u8>, Error> {
            let files = self.files.lock().unwrap();
            let bytes = files
                .get(path)
                .ok_or_else(|| Error::not_found(format!("{path} does not exist")))?;
            let start = offset as usize;
            let end = (start + length as usize).min(bytes.len());
            Ok(bytes.get(start..end).unwrap_or_default().to_vec())
        }

        async fn write(&self, path: &Path, offset: i64, data: &[u8]) -> Result<bool, Error> {
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

        async fn copy(&self, _path: &Path, _source: &dfs_rpc::Stub<Storage>) -> Result<bool, Error> {
            Ok(true)
        }
    }

    fn loopback() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    async fn start_storage_server() -> StorageHandle {
        let backend = Arc::new(InMemoryBackend::new());
        let storage_skeleton: Skeleton<Storage, _> =
            Skeleton::new(StorageHandler::new(backend.clone()));
        let storage_addr = storage_skeleton.start(loopback()).await.unwrap();
        let command_skeleton: Skeleton<Command, _> =
            Skeleton::new(CommandHandler::new(backend));
        let command_addr = command_skeleton.start(loopback()).await.unwrap();

        // Skeletons are deliberately leaked for the lifetime of each test
        // process; they're cleaned up when the test's tokio runtime drops.
        std::mem::forget(storage_skeleton);
        std::mem::forget(command_skeleton);

        StorageHandle::new(
            dfs_rpc::Stub::new(storage_addr),
            dfs_rpc::Stub::new(command_addr),
        )
    }

    #[test_log::test(tokio::test)]
    async fn register_then_create_file_through_service() {
        let naming = NamingServerRef::new();
        let config = NamingServerConfig {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            service_port: 0,
            registration_port: 0,
        };
        let (service_addr, registration_addr) = naming.start(&config).await.unwrap();

        let storage_handle = start_storage_server().await;
        let registration_stub: dfs_rpc::Stub<Registration> = dfs_rpc::Stub::new(registration_addr);
        let duplicates = registration_stub
            .call(RegistrationRequest::Register {
                storage: storage_handle.storage.clone(),
                command: storage_handle.command.clone(),
                files: vec![],
            })
            .await
            .unwrap();
        match duplicates {
            RegistrationResponse::Register(list) => assert!(list.is_empty()),
        }

        let service_stub: dfs_rpc::Stub<Service> = dfs_rpc::Stub::new(service_addr);
        let created = service_stub
            .call(ServiceRequest::CreateFile {
                path: Path::new("/a").unwrap(),
            })
            .await
            .unwrap();
        assert_eq!(created, ServiceResponse::CreateFile(true));

        let is_dir = service_stub
            .call(ServiceRequest::IsDirectory {
                path: Path::new("/").unwrap(),
            })
            .await
            .unwrap();
        assert_eq!(is_dir, ServiceResponse::IsDirectory(true));

        let listed = service_stub
            .call(ServiceRequest::List {
                path: Path::new("/").unwrap(),
            })
            .await
            .unwrap();
        assert_eq!(listed, ServiceResponse::List(vec!["a".to_string()]));

        naming.stop().await;
    }

    #[test_log::test(tokio::test)]
    async fn duplicate_registration_is_illegal_state() {
        let naming = NamingServerRef::new();
        let config = NamingServerConfig {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            service_port: 0,
            registration_port: 0,
        };
        let (_, registration_addr) = naming.start(&config).await.unwrap();
        let storage_handle = start_storage_server().await;
        let registration_stub: dfs_rpc::Stub<Registration> = dfs_rpc::Stub::new(registration_addr);

        registration_stub
            .call(RegistrationRequest::Register {
                storage: storage_handle.storage.clone(),
                command: storage_handle.command.clone(),
                files: vec![],
            })
            .await
            .unwrap();

        let err = registration_stub
            .call(RegistrationRequest::Register {
                storage: storage_handle.storage.clone(),
                command: storage_handle.command.clone(),
                files: vec![],
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, dfs_rpc::ErrorKind::IllegalState);

        naming.stop().await;
    }

    #[test_log::test(tokio::test)]
    async fn second_registration_reports_overlapping_path_as_duplicate() {
        let naming = NamingServerRef::new();
        let config = NamingServerConfig {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            service_port: 0,
            registration_port: 0,
        };
        let (_, registration_addr) = naming.start(&config).await.unwrap();
        let registration_stub: dfs_rpc::Stub<Registration> = dfs_rpc::Stub::new(registration_addr);

        let s1 = start_storage_server().await;
        registration_stub
            .call(RegistrationRequest::Register {
                storage: s1.storage.clone(),
                command: s1.command.clone(),
                files: vec![Path::new("/a").unwrap(), Path::new("/b").unwrap()],
            })
            .await
            .unwrap();

        let s2 = start_storage_server().await;
        let response = registration_stub
            .call(RegistrationRequest::Register {
                storage: s2.storage.clone(),
                command: s2.command.clone(),
                files: vec![Path::new("/a").unwrap(), Path::new("/c").unwrap()],
            })
            .await
            .unwrap();

        match response {
            RegistrationResponse::Register(duplicates) => {
                assert_eq!(duplicates, vec![Path::new("/a").unwrap()]);
            }
        }

        naming.stop().await;
    }

    #[test_log::test(tokio::test)]
    async fn stop_then_start_discards_the_namespace_and_registry() {
        let naming = NamingServerRef::new();
        let config = NamingServerConfig {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            service_port: 0,
            registration_port: 0,
        };
        let (service_addr, registration_addr) = naming.start(&config).await.unwrap();

        let storage_handle = start_storage_server().await;
        let registration_stub: dfs_rpc::Stub<Registration> = dfs_rpc::Stub::new(registration_addr);
        registration_stub
            .call(RegistrationRequest::Register {
                storage: storage_handle.storage.clone(),
                command: storage_handle.command.clone(),
                files: vec![],
            })
            .await
            .unwrap();

        let service_stub: dfs_rpc::Stub<Service> = dfs_rpc::Stub::new(service_addr);
        service_stub
            .call(ServiceRequest::CreateFile {
                path: Path::new("/a").unwrap(),
            })
            .await
            .unwrap();

        naming.stop().await;

        let (service_addr, registration_addr) = naming.start(&config).await.unwrap();
        let service_stub: dfs_rpc::Stub<Service> = dfs_rpc::Stub::new(service_addr);

        let listed = service_stub
            .call(ServiceRequest::List {
                path: Path::new("/").unwrap(),
            })
            .await
            .unwrap();
        assert_eq!(listed, ServiceResponse::List(vec![]));

        // The old registration is gone too: re-registering the same
        // (storage, command) pair is no longer a duplicate.
        let registration_stub: dfs_rpc::Stub<Registration> = dfs_rpc::Stub::new(registration_addr);
        let duplicates = registration_stub
            .call(RegistrationRequest::Register {
                storage: storage_handle.storage.clone(),
                command: storage_handle.command.clone(),
                files: vec![],
            })
            .await
            .unwrap();
        match duplicates {
            RegistrationResponse::Register(list) => assert!(list.is_empty()),
        }

        naming.stop().await;
    }
}
