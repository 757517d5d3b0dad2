//! Cross-crate scenarios from spec §8, exercised against a real naming
//! server and real `reference_storage` servers communicating over loopback
//! TCP.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use dfs::{
    NamingServerConfig, NamingServerRef, Path, RegistrationRequest, RegistrationResponse,
    Service, ServiceRequest, ServiceResponse, Stub,
};
use dfs::reference_storage;

fn loopback() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

async fn start_naming() -> (NamingServerRef, Stub<Service>, Stub<dfs::Registration>) {
    let naming = NamingServerRef::new();
    let config = NamingServerConfig {
        bind_addr: loopback(),
        service_port: 0,
        registration_port: 0,
    };
    let (service_addr, registration_addr) = naming.start(&config).await.unwrap();
    (
        naming,
        Stub::new(service_addr),
        Stub::new(registration_addr),
    )
}

#[test_log::test(tokio::test)]
async fn concurrent_create_file_has_exactly_one_winner() {
    let (naming, service, registration) = start_naming().await;
    let (handle, storage_skeleton, command_skeleton) = reference_storage::start(loopback())
        .await
        .unwrap();

    registration
        .call(RegistrationRequest::Register {
            storage: handle.storage.clone(),
            command: handle.command.clone(),
            files: vec![],
        })
        .await
        .unwrap();

    let path = Path::new("/x").unwrap();
    let service_a = service.clone();
    let service_b = service.clone();
    let path_a = path.clone();
    let path_b = path.clone();

    let (a, b) = tokio::join!(
        tokio::spawn(async move {
            service_a
                .call(ServiceRequest::CreateFile { path: path_a })
                .await
                .unwrap()
        }),
        tokio::spawn(async move {
            service_b
                .call(ServiceRequest::CreateFile { path: path_b })
                .await
                .unwrap()
        })
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    let results = [a, b];
    let successes = results
        .iter()
        .filter(|r| **r == ServiceResponse::CreateFile(true))
        .count();
    let failures = results
        .iter()
        .filter(|r| **r == ServiceResponse::CreateFile(false))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(failures, 1);

    let listed = service
        .call(ServiceRequest::List {
            path: Path::new("/").unwrap(),
        })
        .await
        .unwrap();
    assert_eq!(listed, ServiceResponse::List(vec!["x".to_string()]));

    storage_skeleton.stop().await;
    command_skeleton.stop().await;
    naming.stop().await;
}

#[test_log::test(tokio::test)]
async fn registration_across_two_storage_servers_reports_overlapping_duplicate() {
    let (naming, _service, registration) = start_naming().await;

    let (s1, s1_storage, s1_command) = reference_storage::start(loopback()).await.unwrap();
    registration
        .call(RegistrationRequest::Register {
            storage: s1.storage.clone(),
            command: s1.command.clone(),
            files: vec![Path::new("/a").unwrap(), Path::new("/b").unwrap()],
        })
        .await
        .unwrap();

    let (s2, s2_storage, s2_command) = reference_storage::start(loopback()).await.unwrap();
    let response = registration
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

    s1_storage.stop().await;
    s1_command.stop().await;
    s2_storage.stop().await;
    s2_command.stop().await;
    naming.stop().await;
}

#[test_log::test(tokio::test)]
async fn deleting_a_directory_cascades_to_every_hosting_replica() {
    let (naming, service, registration) = start_naming().await;

    let (s1, s1_storage, s1_command) = reference_storage::start(loopback()).await.unwrap();
    registration
        .call(RegistrationRequest::Register {
            storage: s1.storage.clone(),
            command: s1.command.clone(),
            files: vec![],
        })
        .await
        .unwrap();

    service
        .call(ServiceRequest::CreateDirectory {
            path: Path::new("/dir").unwrap(),
        })
        .await
        .unwrap();
    service
        .call(ServiceRequest::CreateFile {
            path: Path::new("/dir/a").unwrap(),
        })
        .await
        .unwrap();
    service
        .call(ServiceRequest::CreateFile {
            path: Path::new("/dir/b").unwrap(),
        })
        .await
        .unwrap();

    let deleted = service
        .call(ServiceRequest::Delete {
            path: Path::new("/dir").unwrap(),
        })
        .await
        .unwrap();
    assert_eq!(deleted, ServiceResponse::Delete(true));

    let err = service
        .call(ServiceRequest::IsDirectory {
            path: Path::new("/dir").unwrap(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind, dfs::ErrorKind::NotFound);

    s1_storage.stop().await;
    s1_command.stop().await;
    naming.stop().await;
}

#[test_log::test(tokio::test)]
async fn stop_joins_the_listener_within_a_bounded_time() {
    let (naming, _service, _registration) = start_naming().await;
    let stopped = tokio::time::timeout(Duration::from_secs(2), naming.stop()).await;
    assert!(stopped.is_ok());
    assert!(!naming.is_running().await);
}
