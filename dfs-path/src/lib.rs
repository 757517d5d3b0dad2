//! Immutable hierarchical path values shared between the naming server, the
//! storage servers, and clients.
//!
//! A [`Path`] is an ordered sequence of non-empty string components. The
//! root path has zero components and stringifies as `"/"`; any other path
//! stringifies as `"/"` followed by its components joined by `"/"`.

use derive_more::Display;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::fs;
use std::sync::Arc;

mod error;
pub use error::PathError;

/// The character that separates path components on the wire and in string
/// form. Never permitted inside a component.
pub const SEPARATOR: char = '/';

/// Reserved character that can never appear in a path component.
pub const RESERVED: char = ':';

/// An immutable, hierarchical path value.
///
/// Cheaply cloneable: components are stored behind an [`Arc`] so sharing a
/// path across threads or across many tree nodes never deep-copies it.
#[derive(Clone, Debug, Eq, Serialize)]
#[serde(transparent)]
pub struct Path {
    components: Arc<[String]>,
}

/// Deserializes through the same component checks as [`Path::join`], so a
/// peer cannot smuggle an empty or reserved-character component onto the
/// wire just because the frame decoded successfully.
impl<'de> Deserialize<'de> for Path {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let components = Vec::<String>::deserialize(deserializer)?;
        let mut path = Path::root();
        for component in components {
            path = path
                .join(component)
                .map_err(|err| D::Error::custom(err.to_string()))?;
        }
        Ok(path)
    }
}

impl Path {
    /// The root path, containing zero components.
    pub fn root() -> Self {
        Self {
            components: Arc::from(Vec::new()),
        }
    }

    /// Parses `s` into a [`Path`].
    ///
    /// Fails with [`PathError::Empty`] if `s` is empty, with
    /// [`PathError::MissingLeadingSlash`] if `s` does not start with `/`,
    /// and with [`PathError::ReservedCharacter`] if `s` contains `:`. Runs
    /// of consecutive `/` are collapsed and empty components are dropped,
    /// so `"/a/b//c"` and `"/a/b/c/"` both parse to the same value.
    pub fn new(s: impl AsRef<str>) -> Result<Self, PathError> {
        let s = s.as_ref();
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        if !s.starts_with(SEPARATOR) {
            return Err(PathError::MissingLeadingSlash);
        }
        if s.contains(RESERVED) {
            return Err(PathError::ReservedCharacter);
        }

        let components: Vec<String> = s
            .split(SEPARATOR)
            .filter(|c| !c.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            components: Arc::from(components),
        })
    }

    /// Returns an iterator over this path's components, in order.
    ///
    /// The iterator is a fresh, restartable view each time this is called;
    /// it borrows the path and performs no mutation.
    pub fn components(&self) -> impl Iterator<Item = &str> + Clone {
        self.components.iter().map(String::as_str)
    }

    /// Number of components in this path. Zero iff this is the root.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// True iff this path has no components, i.e. it is the root.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// True iff this is the root path.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns a new path with `component` appended.
    ///
    /// Fails with [`PathError::EmptyComponent`] if `component` is empty, or
    /// with [`PathError::ReservedCharacter`] if it contains `/` or `:`.
    pub fn join(&self, component: impl AsRef<str>) -> Result<Self, PathError> {
        let component = component.as_ref();
        if component.is_empty() {
            return Err(PathError::EmptyComponent);
        }
        if component.contains(SEPARATOR) || component.contains(RESERVED) {
            return Err(PathError::ReservedCharacter);
        }

        let mut components: Vec<String> = self.components.to_vec();
        components.push(component.to_string());
        Ok(Self {
            components: Arc::from(components),
        })
    }

    /// Returns the parent of this path.
    ///
    /// Fails with [`PathError::RootHasNoParent`] if this is the root.
    pub fn parent(&self) -> Result<Self, PathError> {
        if self.is_root() {
            return Err(PathError::RootHasNoParent);
        }

        let components = self.components[..self.components.len() - 1].to_vec();
        Ok(Self {
            components: Arc::from(components),
        })
    }

    /// Returns the final component of this path.
    ///
    /// Fails with [`PathError::RootHasNoLast`] if this is the root.
    pub fn last(&self) -> Result<&str, PathError> {
        self.components
            .last()
            .map(String::as_str)
            .ok_or(PathError::RootHasNoLast)
    }

    /// True iff `other`'s components are a (not necessarily proper) prefix
    /// of this path's components — i.e. this path lies inside (or at) the
    /// subtree rooted at `other`.
    ///
    /// Matching is component-wise, never substring-wise: `Path("/ab")` is
    /// not a subpath of `Path("/a")` even though `"ab"` contains `"a"` as a
    /// substring.
    pub fn is_subpath(&self, other: &Path) -> bool {
        if other.components.len() > self.components.len() {
            return false;
        }
        self.components
            .iter()
            .zip(other.components.iter())
            .all(|(a, b)| a == b)
    }

    /// Concatenates `root` with this path's string form, producing a local
    /// filesystem path.
    pub fn to_file(&self, root: impl AsRef<std::path::Path>) -> std::path::PathBuf {
        let mut buf = root.as_ref().to_path_buf();
        for component in self.components() {
            buf.push(component);
        }
        buf
    }

    /// Enumerates every regular file under the local directory `dir`,
    /// returning each one's path relative to `dir` as a [`Path`].
    ///
    /// Fails with [`PathError::DirectoryNotFound`] if `dir` does not exist,
    /// or [`PathError::NotADirectory`] if `dir` exists but is not a
    /// directory.
    pub fn list_local(dir: impl AsRef<std::path::Path>) -> Result<Vec<Path>, PathError> {
        let dir = dir.as_ref();
        let metadata = fs::metadata(dir).map_err(|_| PathError::DirectoryNotFound)?;
        if !metadata.is_dir() {
            return Err(PathError::NotADirectory);
        }

        let mut results = Vec::new();
        list_local_into(dir, dir, &mut results)?;
        Ok(results)
    }
}

fn list_local_into(
    root: &std::path::Path,
    dir: &std::path::Path,
    out: &mut Vec<Path>,
) -> Result<(), PathError> {
    let entries = fs::read_dir(dir).map_err(|_| PathError::DirectoryNotFound)?;
    for entry in entries {
        let entry = entry.map_err(|_| PathError::DirectoryNotFound)?;
        let file_type = entry.file_type().map_err(|_| PathError::DirectoryNotFound)?;
        let path = entry.path();

        if file_type.is_dir() {
            list_local_into(root, &path, out)?;
        } else if file_type.is_file() {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            let mut p = Path::root();
            for component in relative.components() {
                let component = component.as_os_str().to_string_lossy();
                p = p.join(component.as_ref()).map_err(|_| PathError::NotADirectory)?;
            }
            out.push(p);
        }
    }
    Ok(())
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "/");
        }
        for component in self.components.iter() {
            write!(f, "/{component}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::new(s)
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components
    }
}

impl std::hash::Hash for Path {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.components.hash(state);
    }
}

impl PartialOrd for Path {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Path {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.components.cmp(&other.components)
    }
}

/// Wire-friendly representation of a [`Path`]: the stringified form plus
/// its precomputed component list, per spec's "path encoding on the wire".
#[derive(Clone, Debug, PartialEq, Eq, Display, Serialize, Deserialize)]
#[display(fmt = "{text}")]
pub struct WirePath {
    pub text: String,
    pub components: Vec<String>,
}

impl From<&Path> for WirePath {
    fn from(path: &Path) -> Self {
        Self {
            text: path.to_string(),
            components: path.components.to_vec(),
        }
    }
}

impl From<Path> for WirePath {
    fn from(path: Path) -> Self {
        WirePath::from(&path)
    }
}

impl TryFrom<WirePath> for Path {
    type Error = PathError;

    fn try_from(wire: WirePath) -> Result<Self, Self::Error> {
        let reconstructed = Path::new(&wire.text)?;
        if reconstructed.components.as_ref() != wire.components.as_slice() {
            return Err(PathError::InconsistentWireEncoding);
        }
        Ok(reconstructed)
    }
}
