use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::repo::STORE_DIR;

/// one complete working-directory state: root-relative path -> blob hash
///
/// keys are `/`-separated and kept in byte order, so iteration is the
/// canonical path-sorted order and `==` is set equality over (path, hash).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Hash>", into = "BTreeMap<String, Hash>")]
pub struct Tree {
    entries: BTreeMap<String, Hash>,
}

impl Tree {
    /// create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// build a tree from (path, hash) pairs, validating every path
    pub fn from_entries<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Hash)>,
        S: Into<String>,
    {
        let mut tree = Self::new();
        for (path, hash) in entries {
            tree.insert(path, hash)?;
        }
        Ok(tree)
    }

    /// insert or replace an entry
    pub fn insert(&mut self, path: impl Into<String>, hash: Hash) -> Result<Option<Hash>> {
        let path = path.into();
        validate_tree_path(&path)?;
        Ok(self.entries.insert(path, hash))
    }

    /// look up the blob hash for a path
    pub fn get(&self, path: &str) -> Option<&Hash> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// iterate entries in path order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Hash)> {
        self.entries.iter().map(|(p, h)| (p.as_str(), h))
    }

    /// iterate paths in order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// distinct blob hashes referenced by this tree
    pub fn blobs(&self) -> BTreeSet<Hash> {
        self.entries.values().copied().collect()
    }

    /// number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// is tree empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<BTreeMap<String, Hash>> for Tree {
    type Error = Error;

    fn try_from(entries: BTreeMap<String, Hash>) -> Result<Self> {
        for path in entries.keys() {
            validate_tree_path(path)?;
        }
        Ok(Self { entries })
    }
}

impl From<Tree> for BTreeMap<String, Hash> {
    fn from(tree: Tree) -> Self {
        tree.entries
    }
}

/// convert a relative filesystem path into a tree key
///
/// `.` components are dropped; `..`, absolute roots and non-UTF-8
/// components are rejected.
pub fn normalize_path(rel: &Path) -> Result<String> {
    let mut parts: Vec<&str> = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => {
                let part = part
                    .to_str()
                    .ok_or_else(|| Error::InvalidPath(rel.to_string_lossy().into_owned()))?;
                parts.push(part);
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::InvalidPath(rel.to_string_lossy().into_owned()));
            }
        }
    }

    let key = parts.join("/");
    validate_tree_path(&key)?;
    Ok(key)
}

/// validate a tree key
fn validate_tree_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::InvalidPath("empty path".to_string()));
    }
    if path.contains('\0') {
        return Err(Error::InvalidPath(format!("path contains null byte: {}", path)));
    }
    for component in path.split('/') {
        if component.is_empty() || component == "." || component == ".." {
            return Err(Error::InvalidPath(format!(
                "path must be relative without '.', '..' or empty components: {}",
                path
            )));
        }
    }
    if path.split('/').next() == Some(STORE_DIR) {
        return Err(Error::InvalidPath(format!(
            "path is inside the reserved store directory: {}",
            path
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::compute_blob_hash;

    #[test]
    fn test_tree_set_equality_ignores_insertion_order() {
        let a = compute_blob_hash(b"a");
        let b = compute_blob_hash(b"b");

        let t1 = Tree::from_entries([("x.txt", a), ("dir/y.txt", b)]).unwrap();
        let t2 = Tree::from_entries([("dir/y.txt", b), ("x.txt", a)]).unwrap();
        assert_eq!(t1, t2);

        let t3 = Tree::from_entries([("dir/y.txt", a), ("x.txt", a)]).unwrap();
        assert_ne!(t1, t3);
    }

    #[test]
    fn test_tree_iteration_is_path_sorted() {
        let h = Hash::ZERO;
        let tree = Tree::from_entries([("b", h), ("a/z", h), ("a.txt", h)]).unwrap();
        let paths: Vec<_> = tree.paths().collect();
        assert_eq!(paths, vec!["a.txt", "a/z", "b"]);
    }

    #[test]
    fn test_tree_blobs_dedup() {
        let same = compute_blob_hash(b"same");
        let tree = Tree::from_entries([("a.txt", same), ("b.txt", same)]).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.blobs().len(), 1);
    }

    #[test]
    fn test_invalid_tree_paths() {
        assert!(validate_tree_path("").is_err());
        assert!(validate_tree_path("/abs").is_err());
        assert!(validate_tree_path("end/").is_err());
        assert!(validate_tree_path("double//slash").is_err());
        assert!(validate_tree_path("with/./dot").is_err());
        assert!(validate_tree_path("with/../dotdot").is_err());
        assert!(validate_tree_path("with\0null").is_err());

        assert!(validate_tree_path("simple.txt").is_ok());
        assert!(validate_tree_path("deep/nested/file.png").is_ok());
        assert!(validate_tree_path(".hidden").is_ok());
    }

    #[test]
    fn test_store_dir_keys_rejected() {
        assert!(matches!(
            validate_tree_path(".vcs"),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(
            validate_tree_path(".vcs/meta"),
            Err(Error::InvalidPath(_))
        ));
        assert!(matches!(
            Tree::new().insert(".vcs/blobs/x", Hash::ZERO),
            Err(Error::InvalidPath(_))
        ));

        // only the root-level store directory is reserved
        assert!(validate_tree_path("nested/.vcs/meta").is_ok());
        assert!(validate_tree_path(".vcs.bak").is_ok());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("a.txt")).unwrap(), "a.txt");
        assert_eq!(normalize_path(Path::new("./dir/./b.txt")).unwrap(), "dir/b.txt");
        assert!(normalize_path(Path::new("../escape")).is_err());
        assert!(normalize_path(Path::new("/etc/passwd")).is_err());
        assert!(normalize_path(Path::new(".")).is_err());
    }

    #[test]
    fn test_tree_json_roundtrip() {
        let tree = Tree::from_entries([("a.txt", compute_blob_hash(b"hello"))]).unwrap();
        let json = serde_json::to_string(&tree).unwrap();
        assert_eq!(
            json,
            r#"{"a.txt":"2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"}"#
        );
        let parsed: Tree = serde_json::from_str(&json).unwrap();
        assert_eq!(tree, parsed);
    }

    #[test]
    fn test_tree_json_rejects_bad_paths() {
        let json = r#"{"../x":"2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"}"#;
        assert!(serde_json::from_str::<Tree>(json).is_err());

        let json = r#"{".vcs/meta":"2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"}"#;
        assert!(serde_json::from_str::<Tree>(json).is_err());
    }
}
