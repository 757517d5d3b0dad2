use crate::error::Error;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Unique identifier tied to a request or response, matching the teacher's
/// `distant_net::common::Id` convention of a random `u64` rendered as a
/// string (cheap to generate, cheap to compare, readable in logs).
pub type Id = String;

pub fn new_id() -> Id {
    rand::random::<u64>().to_string()
}

/// A request envelope: a unique id plus the typed payload for one remote
/// interface's request enum.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request<T> {
    pub id: Id,
    pub payload: T,
}

impl<T> Request<T> {
    pub fn new(payload: T) -> Self {
        Self {
            id: new_id(),
            payload,
        }
    }
}

/// Probe type used to recover a request's id when its payload fails to
/// decode against the interface's current request enum — e.g. a client
/// built against an older/newer version of the interface. Relies on
/// msgpack's named-map encoding (`rmp_serde::encode::to_vec_named`), which
/// lets serde ignore the unrecognized `payload` field instead of failing.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct RequestIdOnly {
    id: Id,
}

/// A response envelope: the response's own id, the id of the request that
/// triggered it, and the status-tagged payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response<T> {
    pub id: Id,
    pub origin_id: Id,
    pub payload: Outcome<T>,
}

impl<T> Response<T> {
    pub fn new(origin_id: Id, payload: Outcome<T>) -> Self {
        Self {
            id: new_id(),
            origin_id,
            payload,
        }
    }
}

/// The two-tag status wrapper described normatively in spec §4.B.2: `Ok`
/// carries the method's return value, `Transport`/`MethodThrew` each carry
/// an [`Error`] describing what went wrong and on which side of the
/// channel. The stub re-raises either variant's error faithfully at the
/// call site; the distinction only matters for skeleton-side bookkeeping
/// and tests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome<T> {
    Ok(T),
    Transport(Error),
    MethodThrew(Error),
}

impl<T> Outcome<T> {
    /// Converts the outcome into a `Result`, re-raising the wrapped error
    /// faithfully regardless of which side produced it. This is the whole
    /// of the stub's error-translation policy (spec §4.B.1/§7).
    pub fn into_result(self) -> Result<T, Error> {
        match self {
            Outcome::Ok(value) => Ok(value),
            Outcome::Transport(err) => Err(err),
            Outcome::MethodThrew(err) => Err(err),
        }
    }
}

pub(crate) fn serialize_to_vec<T: Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    rmp_serde::encode::to_vec_named(value).map_err(Error::from)
}

pub(crate) fn deserialize_from_slice<T: DeserializeOwned>(slice: &[u8]) -> Result<T, Error> {
    rmp_serde::decode::from_slice(slice).map_err(Error::from)
}

/// Attempts to recover only the `id` field of an encoded [`Request`] whose
/// typed payload did not decode, so a `no-such-method` response can still
/// be correlated with the request that produced it.
pub(crate) fn recover_request_id(slice: &[u8]) -> Option<Id> {
    rmp_serde::decode::from_slice::<RequestIdOnly>(slice)
        .ok()
        .map(|probe| probe.id)
}

/// Total bytes used for the length header preceding every frame.
const HEADER_SIZE: usize = 8;

/// Writes `bytes` to `writer` as one length-prefixed frame: an 8-byte
/// big-endian length followed by the bytes themselves. Matches the framing
/// scheme in `distant_net::common::transport::framed::Frame`.
pub(crate) async fn write_frame<W>(writer: &mut W, bytes: &[u8]) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
{
    writer.write_u64(bytes.len() as u64).await?;
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed frame from `reader`, failing with a
/// `transport-error` if the connection ends before a complete frame has
/// been read.
pub(crate) async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, Error>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u64().await? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

