//! The naming server's in-memory namespace: a tree indexed by path
//! components, mapping files to the storage-server replicas that host
//! them.
//!
//! A single [`tokio::sync::RwLock`] guards the whole tree (spec §4.C: "a
//! single coarse lock covering the whole tree is acceptable and matches
//! the source's observable semantics"), matching the teacher's
//! `RwLock`-guarded `GlobalState` in its server state module.

use std::collections::HashMap;

use dfs_path::Path;
use dfs_rpc::Error;
use dfs_storage_api::{CommandClient, StorageHandle};
use log::warn;
use tokio::sync::RwLock;

/// One node of the tree: either an internal directory or a leaf file.
///
/// Invariant: a file node's replica list is never empty (spec §3).
enum Node {
    Directory(HashMap<String, Node>),
    File {
        replicas: Vec<StorageHandle>,
        cursor: usize,
    },
}

impl Node {
    fn new_directory() -> Self {
        Node::Directory(HashMap::new())
    }
}

/// The namespace tree. Always rooted at an empty directory (spec §3:
/// "Tree root. Always a directory. Created empty at naming-server
/// construction").
pub struct Tree {
    root: RwLock<Node>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Node::new_directory()),
        }
    }

    /// Walks `path` component-by-component; true if the final component
    /// names a directory, false if it names a file. Root is always true.
    /// Fails with *not-found* if any intermediate component is missing or
    /// names a file.
    pub async fn is_directory(&self, path: &Path) -> Result<bool, Error> {
        let root = self.root.read().await;
        let node = walk(&root, path)?;
        Ok(matches!(node, Node::Directory(_)))
    }

    /// Returns the immediate child names of the directory at `path`, in no
    /// particular order. Fails with *not-found* if `path` does not resolve
    /// to a directory.
    pub async fn list(&self, path: &Path) -> Result<Vec<String>, Error> {
        let root = self.root.read().await;
        match walk(&root, path)? {
            Node::Directory(children) => Ok(children.keys().cloned().collect()),
            Node::File { .. } => Err(not_a_directory(path)),
        }
    }

    /// Inserts an empty directory node at `path`. Fails with *not-found* if
    /// `path`'s parent chain does not already exist as directories; returns
    /// `false` (without error) if a node already exists at `path`, and
    /// `false` if `path` is root.
    pub async fn create_directory(&self, path: &Path) -> Result<bool, Error> {
        if path.is_root() {
            return Ok(false);
        }
        let mut root = self.root.write().await;
        insert_leaf(&mut root, path, Node::new_directory)
    }

    /// Inserts a file node at `path` whose replica list is `[replica]`.
    /// Same existence/parent rules as [`Tree::create_directory`].
    pub async fn create_file(&self, path: &Path, replica: StorageHandle) -> Result<bool, Error> {
        if path.is_root() {
            return Ok(false);
        }
        let mut root = self.root.write().await;
        insert_leaf(&mut root, path, || Node::File {
            replicas: vec![replica.clone()],
            cursor: 0,
        })
    }

    /// Used only during registration: walks `path`, creating missing
    /// intermediate directories along the way. If `path` is already
    /// present (as file or directory, or if a prefix of it already names a
    /// file), returns `false` without making changes — the caller should
    /// instruct the storage server to delete this path locally. Otherwise
    /// inserts a file leaf for `path` with `[replica]` and returns `true`.
    pub async fn register_recursive(&self, path: &Path, replica: StorageHandle) -> bool {
        if path.is_root() {
            return false;
        }
        let mut root = self.root.write().await;
        register_recursive_into(&mut root, path, replica)
    }

    /// Returns the next replica for the file at `path`, advancing the
    /// round-robin cursor. Fails with *not-found* if `path` does not
    /// resolve to a file.
    pub async fn get_storage(&self, path: &Path) -> Result<StorageHandle, Error> {
        let mut root = self.root.write().await;
        let node = walk_mut(&mut root, path)?;
        match node {
            Node::File { replicas, cursor } => {
                let handle = replicas[*cursor % replicas.len()].clone();
                *cursor = (*cursor + 1) % replicas.len();
                Ok(handle)
            }
            Node::Directory(_) => Err(not_a_file(path)),
        }
    }

    /// Removes the node at `path` without cascading `Command.delete` to any
    /// replica it held. Used by the naming server to roll back a
    /// `create_file` whose remote `Command.create` call failed — the
    /// create never reached the storage server's backend, so there is
    /// nothing there to delete.
    pub async fn remove_local(&self, path: &Path) -> Result<(), Error> {
        let mut root = self.root.write().await;
        remove(&mut root, path)?;
        Ok(())
    }

    /// Removes the node at `path`, collecting every replica handle that
    /// hosted content under it, then issuing `Command.delete` to each one.
    /// Root cannot be deleted. Transport failures from the cascading
    /// deletes are logged, not propagated — the local removal has already
    /// committed by the time they run.
    pub async fn delete(&self, path: &Path) -> Result<bool, Error> {
        if path.is_root() {
            return Err(Error::invalid_argument("the root cannot be deleted"));
        }

        let removed = {
            let mut root = self.root.write().await;
            remove(&mut root, path)?
        };

        let mut targets = Vec::new();
        collect_deletions(&removed, path, &mut targets);
        for (replica, file_path) in targets {
            let client = CommandClient::new(&replica.command);
            if let Err(err) = client.delete(&file_path).await {
                warn!("Command.delete({file_path}) on a replica of {path} failed: {err}");
            }
        }

        Ok(true)
    }
}

fn not_found(path: &Path) -> Error {
    Error::not_found(format!("{path} does not exist"))
}

fn not_a_directory(path: &Path) -> Error {
    Error::not_found(format!("{path} is not a directory"))
}

fn not_a_file(path: &Path) -> Error {
    Error::not_found(format!("{path} is not a file"))
}

fn walk<'a>(root: &'a Node, path: &Path) -> Result<&'a Node, Error> {
    let mut current = root;
    for component in path.components() {
        match current {
            Node::Directory(children) => {
                current = children.get(component).ok_or_else(|| not_found(path))?;
            }
            Node::File { .. } => return Err(not_found(path)),
        }
    }
    Ok(current)
}

fn walk_mut<'a>(root: &'a mut Node, path: &Path) -> Result<&'a mut Node, Error> {
    let mut current = root;
    for component in path.components() {
        match current {
            Node::Directory(children) => {
                current = children.get_mut(component).ok_or_else(|| not_found(path))?;
            }
            Node::File { .. } => return Err(not_found(path)),
        }
    }
    Ok(current)
}

/// Descends to `path`'s parent (requiring it to already exist as a
/// directory) and inserts `make_leaf()` at the final component if absent.
fn insert_leaf(
    root: &mut Node,
    path: &Path,
    make_leaf: impl FnOnce() -> Node,
) -> Result<bool, Error> {
    let parent_path = path.parent().expect("checked not root above");
    let last = path.last().expect("checked not root above");

    let parent = walk_mut(root, &parent_path)?;
    match parent {
        Node::Directory(children) => {
            if children.contains_key(last) {
                Ok(false)
            } else {
                children.insert(last.to_string(), make_leaf());
                Ok(true)
            }
        }
        Node::File { .. } => Err(not_a_directory(&parent_path)),
    }
}

fn register_recursive_into(root: &mut Node, path: &Path, replica: StorageHandle) -> bool {
    let mut current = root;
    let mut components = path.components().peekable();

    while let Some(component) = components.next() {
        let is_last = components.peek().is_none();
        match current {
            Node::Directory(children) => {
                if is_last {
                    if children.contains_key(component) {
                        return false;
                    }
                    children.insert(
                        component.to_string(),
                        Node::File {
                            replicas: vec![replica],
                            cursor: 0,
                        },
                    );
                    return true;
                }
                current = children
                    .entry(component.to_string())
                    .or_insert_with(Node::new_directory);
            }
            Node::File { .. } => return false,
        }
    }

    false
}

fn remove(root: &mut Node, path: &Path) -> Result<Node, Error> {
    let parent_path = path.parent().expect("checked not root above");
    let last = path.last().expect("checked not root above");

    let parent = walk_mut(root, &parent_path)?;
    match parent {
        Node::Directory(children) => children.remove(last).ok_or_else(|| not_found(path)),
        Node::File { .. } => Err(not_found(path)),
    }
}

fn collect_deletions(node: &Node, path: &Path, out: &mut Vec<(StorageHandle, Path)>) {
    match node {
        Node::File { replicas, .. } => {
            for replica in replicas {
                out.push((replica.clone(), path.clone()));
            }
        }
        Node::Directory(children) => {
            for (name, child) in children {
                let child_path = path.join(name).expect("component names are already valid");
                collect_deletions(child, &child_path, out);
            }
        }
    }
}
