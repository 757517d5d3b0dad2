use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Error;

/// A remote interface descriptor, realized at the type level instead of as
/// a runtime reflection target.
///
/// Design note (spec §9): the original source validates interfaces at
/// runtime by scanning declared methods for a marker exception type. Here,
/// validity is a property the compiler checks: every operation of `Request`
/// is handled by a `RemoteHandler` whose `handle` returns
/// `Result<Response, Error>`, so "every operation may fail with a
/// transport-level error" holds unconditionally for any type that
/// implements this trait. There is no runtime path that produces a
/// `bad-interface` failure once a crate compiles; [`crate::Error::bad_interface`]
/// remains available for callers that parse an interface name from
/// configuration and need to reject an unknown one before ever reaching a
/// `RemoteInterface` impl.
pub trait RemoteInterface: Send + Sync + 'static {
    /// Request enum with one variant per declared operation.
    type Request: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Response enum with one variant per declared operation's return type.
    type Response: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Stable name used in stub equality, hashing, and display, and in
    /// error messages naming the interface.
    const NAME: &'static str;
}

/// Implemented by the object a [`crate::Skeleton`] dispatches requests to.
///
/// One `handle` call corresponds to one wire request: decode the matching
/// `Request` variant, perform the operation, and return the matching
/// `Response` variant or the operation's own declared error.
#[async_trait]
pub trait RemoteHandler<I: RemoteInterface>: Send + Sync {
    async fn handle(&self, request: I::Request) -> Result<I::Response, Error>;
}
