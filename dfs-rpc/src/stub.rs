use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::net::{IpAddr, SocketAddr};

use log::trace;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;

use crate::error::Error;
use crate::interface::{RemoteHandler, RemoteInterface};
use crate::skeleton::Skeleton;
use crate::wire::{self, Request, Response};

/// Client-side proxy over a [`RemoteInterface`], parameterized by the
/// endpoint it will call.
///
/// A stub is stateless apart from its configuration (spec §3): calling one
/// of its operations opens a fresh TCP connection, performs one
/// request/response exchange, and closes it. Stubs are cheap to clone and
/// safe to share across tasks.
#[derive(Debug, Serialize, Deserialize)]
pub struct Stub<I: RemoteInterface> {
    endpoint: SocketAddr,
    #[serde(skip)]
    _interface: PhantomData<fn() -> I>,
}

impl<I: RemoteInterface> Stub<I> {
    /// Creates a stub targeting `endpoint`.
    pub fn new(endpoint: SocketAddr) -> Self {
        Self {
            endpoint,
            _interface: PhantomData,
        }
    }

    /// `create(interface, skeleton)` (spec §4.B.1): a stub targeting the
    /// endpoint `skeleton` is currently bound to.
    ///
    /// Fails with *illegal-state* if `skeleton` has not been started.
    pub async fn from_skeleton<H>(skeleton: &Skeleton<I, H>) -> Result<Self, Error>
    where
        H: RemoteHandler<I> + 'static,
    {
        let endpoint = skeleton.local_addr().await.ok_or_else(|| {
            Error::illegal_state(format!("{} skeleton has not been started", I::NAME))
        })?;
        Ok(Self::new(endpoint))
    }

    /// `create(interface, skeleton, hostname)` (spec §4.B.1): same as
    /// [`Stub::from_skeleton`], but the resulting stub targets `host`
    /// instead of `skeleton`'s own bind address, keeping only the port —
    /// for a skeleton bound to a wildcard or internal address that is
    /// externally reachable through a different host.
    ///
    /// Fails with *illegal-state* if `skeleton` has not been started.
    pub async fn from_skeleton_with_host<H>(
        skeleton: &Skeleton<I, H>,
        host: IpAddr,
    ) -> Result<Self, Error>
    where
        H: RemoteHandler<I> + 'static,
    {
        let bound = skeleton.local_addr().await.ok_or_else(|| {
            Error::illegal_state(format!("{} skeleton has not been started", I::NAME))
        })?;
        Ok(Self::new(SocketAddr::new(host, bound.port())))
    }

    /// The endpoint this stub calls.
    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    /// Performs one remote call: connect, send the request, read the
    /// response, close.
    ///
    /// Any I/O failure (connection refused, EOF, serialization failure) is
    /// surfaced as a `transport-error`. A `method-threw` response is
    /// re-raised here with its original kind intact.
    pub async fn call(&self, request: I::Request) -> Result<I::Response, Error> {
        trace!(
            "{} stub calling {} with a fresh connection",
            I::NAME,
            self.endpoint
        );

        let mut stream = TcpStream::connect(self.endpoint).await.map_err(|err| {
            Error::transport(format!(
                "failed to connect to {} for {}: {err}",
                self.endpoint,
                I::NAME
            ))
        })?;

        let request = Request::new(request);
        let request_id = request.id.clone();
        let bytes = wire::serialize_to_vec(&request)?;
        wire::write_frame(&mut stream, &bytes).await?;

        let response_bytes = wire::read_frame(&mut stream).await?;
        let response: Response<I::Response> = wire::deserialize_from_slice(&response_bytes)?;

        if response.origin_id != request_id {
            return Err(Error::transport(format!(
                "{} response id {} did not match request id {}",
                I::NAME,
                response.origin_id,
                request_id
            )));
        }

        response.payload.into_result()
    }
}

impl<I: RemoteInterface> Clone for Stub<I> {
    fn clone(&self) -> Self {
        Self::new(self.endpoint)
    }
}

/// Two stubs are equal iff they reference the same interface (guaranteed
/// by the `Stub<I>` type parameter itself — a `Stub<Service>` can never be
/// compared to a `Stub<Registration>`) and the same endpoint.
impl<I: RemoteInterface> PartialEq for Stub<I> {
    fn eq(&self, other: &Self) -> bool {
        self.endpoint == other.endpoint
    }
}

impl<I: RemoteInterface> Eq for Stub<I> {}

impl<I: RemoteInterface> Hash for Stub<I> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        I::NAME.hash(state);
        self.endpoint.hash(state);
    }
}

impl<I: RemoteInterface> fmt::Display for Stub<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Remote Interface: {}", I::NAME)?;
        writeln!(f, "Remote Address: {}", self.endpoint)
    }
}

