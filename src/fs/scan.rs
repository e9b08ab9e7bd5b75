use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, IoResultExt, Result};
use crate::hash::{compute_blob_hash, Hash};
use crate::types::{normalize_path, Tree};

/// walks a tracked directory and produces its path -> hash mapping
///
/// the reserved store directory at the root is never entered. only regular
/// files are tracked; symlinks are not followed.
#[derive(Clone, Debug)]
pub struct TreeScanner {
    root: PathBuf,
    exclude: OsString,
    ignore: Vec<glob::Pattern>,
}

impl TreeScanner {
    /// scanner over `root`, skipping the root-level directory named `exclude`
    pub fn new(root: impl Into<PathBuf>, exclude: impl Into<OsString>) -> Self {
        Self {
            root: root.into(),
            exclude: exclude.into(),
            ignore: vec![],
        }
    }

    /// additionally skip root-relative paths matching any of these patterns
    pub fn with_ignore(mut self, patterns: Vec<glob::Pattern>) -> Self {
        self.ignore = patterns;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// every tracked file as (tree key, absolute path), sorted by key
    pub fn files(&self) -> Result<Vec<(String, PathBuf)>> {
        let mut files = Vec::new();

        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !self.is_excluded(e));

        for entry in walker {
            let entry = entry.map_err(|e| walk_error(e, &self.root))?;
            let file_type = entry.file_type();
            if file_type.is_dir() {
                continue;
            }
            if !file_type.is_file() {
                debug!(path = ?entry.path(), "skipping non-regular file");
                continue;
            }

            let key = self.key_for(entry.path())?;
            files.push((key, entry.into_path()));
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    /// hash every tracked file
    pub fn scan(&self) -> Result<Tree> {
        self.scan_with(|_, content| Ok(compute_blob_hash(content)))
    }

    /// read every tracked file and let `f` turn its bytes into a hash
    ///
    /// used by save to store blobs while building the tree.
    pub fn scan_with<F>(&self, mut f: F) -> Result<Tree>
    where
        F: FnMut(&str, &[u8]) -> Result<Hash>,
    {
        let mut tree = Tree::new();
        for (key, path) in self.files()? {
            let content = fs::read(&path).with_path(&path)?;
            let hash = f(&key, &content)?;
            tree.insert(key, hash)?;
        }
        Ok(tree)
    }

    /// tree key for an absolute path under the root
    pub fn key_for(&self, path: &Path) -> Result<String> {
        let rel = path
            .strip_prefix(&self.root)
            .map_err(|_| Error::PathOutsideRepository(path.to_path_buf()))?;
        normalize_path(rel)
    }

    fn is_excluded(&self, entry: &walkdir::DirEntry) -> bool {
        if entry.depth() == 1 && entry.file_name() == self.exclude.as_os_str() {
            return true;
        }
        // no tree key can name it: left alone, neither versioned nor deleted
        if entry.file_name().to_str().is_none() {
            warn!(path = ?entry.path(), "skipping entry with non-utf8 name");
            return true;
        }
        if self.ignore.is_empty() {
            return false;
        }
        match self.key_for(entry.path()) {
            Ok(key) => self.ignore.iter().any(|p| p.matches(&key)),
            Err(_) => false,
        }
    }
}

fn walk_error(e: walkdir::Error, root: &Path) -> Error {
    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
    let message = e.to_string();
    let source = e
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, message));
    Error::Io { path, source }
}
