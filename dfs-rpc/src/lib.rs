//! Minimal object-oriented RPC: stubs open one connection per call,
//! skeletons dispatch one request per connection, and interfaces are
//! descriptors at the type level rather than runtime-scanned targets.

mod error;
mod interface;
mod skeleton;
mod stub;
mod wire;

pub use error::{Error, ErrorKind};
pub use interface::{RemoteHandler, RemoteInterface};
pub use skeleton::{Hooks, Skeleton};
pub use stub::Stub;
pub use wire::Id;
