use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, IoResultExt, Result};
use crate::fs::TreeScanner;
use crate::hash::Hash;
use crate::index::SnapshotIndex;
use crate::meta::RepositoryMeta;
use crate::object::{load_snapshots, ContentStore};
use crate::ops::{self, LoadOutcome, SaveOutcome, VerifyReport};
use crate::types::{normalize_path, DiffEntry, Snapshot};

/// name of the reserved store directory inside a tracked directory
pub const STORE_DIR: &str = ".vcs";

/// mutable in-memory state, guarded by the repository lock
#[derive(Debug, Default)]
pub(crate) struct RepoState {
    pub index: SnapshotIndex,
    pub meta: RepositoryMeta,
}

/// a snapshot repository bound to one tracked directory
///
/// all operations take `&self`; saves and loads hold the write side of an
/// internal reader-writer lock, everything else the read side. share it
/// across threads with an `Arc`.
#[derive(Debug)]
pub struct Repository {
    root: PathBuf,
    config: Config,
    store: ContentStore,
    scanner: TreeScanner,
    state: RwLock<RepoState>,
}

impl Repository {
    /// open the repository for `path`, creating the store on first use
    ///
    /// every snapshot record is read into memory. a malformed record, or a
    /// current pointer naming a snapshot that does not exist, fails the open.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = absolute(path.as_ref())?;
        let config_path = root.join(STORE_DIR).join("config.toml");

        let config = if config_path.exists() {
            Config::load(&config_path)?
        } else {
            Config::default()
        };

        Self::open_inner(root, config)
    }

    /// open with an explicit configuration, persisting it
    pub fn open_with_config(path: impl AsRef<Path>, config: Config) -> Result<Self> {
        let root = absolute(path.as_ref())?;
        Self::open_inner(root, config)
    }

    fn open_inner(root: PathBuf, config: Config) -> Result<Self> {
        let store_path = root.join(STORE_DIR);

        // create directory structure (idempotent)
        fs::create_dir_all(&root).with_path(&root)?;
        fs::create_dir_all(store_path.join("snapshots")).with_path(&store_path)?;
        fs::create_dir_all(store_path.join("tmp")).with_path(&store_path)?;

        let config_path = store_path.join("config.toml");
        if !config_path.exists() || Config::load(&config_path)? != config {
            config.save(&config_path, &store_path.join("tmp"))?;
        }

        let store = ContentStore::new(store_path.join("blobs"), store_path.join("tmp"))?
            .with_fsync(config.fsync)
            .with_verify(config.verify_blobs);
        let scanner = TreeScanner::new(&root, STORE_DIR).with_ignore(config.ignore_patterns()?);

        let repo = Self {
            root,
            config,
            store,
            scanner,
            state: RwLock::new(RepoState::default()),
        };

        repo.clear_tmp()?;

        let meta = RepositoryMeta::load(&repo.meta_path())?;
        let index = SnapshotIndex::from_snapshots(load_snapshots(&repo)?);

        if let Some(current) = meta.current {
            if !index.contains(&current) {
                return Err(Error::CorruptMeta(format!(
                    "current snapshot {} is not in the index",
                    current
                )));
            }
        }

        info!(
            root = ?repo.root,
            snapshots = index.len(),
            current = ?meta.current,
            "opened repository"
        );

        *repo.state.write() = RepoState { index, meta };
        Ok(repo)
    }

    /// tracked directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// repository configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// blob store backing this repository
    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// scanner for the tracked directory
    pub fn scanner(&self) -> &TreeScanner {
        &self.scanner
    }

    /// path to the reserved store directory
    pub fn store_path(&self) -> PathBuf {
        self.root.join(STORE_DIR)
    }

    /// path to config.toml
    pub fn config_path(&self) -> PathBuf {
        self.store_path().join("config.toml")
    }

    /// path to the current-pointer record
    pub fn meta_path(&self) -> PathBuf {
        self.store_path().join("meta")
    }

    /// path to snapshot records
    pub fn snapshots_path(&self) -> PathBuf {
        self.store_path().join("snapshots")
    }

    /// path to blobs directory
    pub fn blobs_path(&self) -> PathBuf {
        self.store_path().join("blobs")
    }

    /// path to tmp directory (for atomic writes)
    pub fn tmp_path(&self) -> PathBuf {
        self.store_path().join("tmp")
    }

    /// does the working directory differ from the current snapshot
    ///
    /// always true before the first snapshot.
    pub fn has_unsaved_changes(&self) -> Result<bool> {
        let state = self.state.read();
        ops::has_unsaved_changes(self, &state)
    }

    /// per-path changes of the working directory against the current snapshot
    pub fn status(&self) -> Result<Vec<DiffEntry>> {
        let state = self.state.read();
        ops::status(self, &state)
    }

    /// checkpoint the working directory
    pub fn save_snapshot(&self, description: &str) -> Result<SaveOutcome> {
        let mut state = self.state.write();
        ops::save_snapshot(self, &mut state, description)
    }

    /// rewrite the working directory to match a snapshot exactly
    ///
    /// files not present in the snapshot are deleted.
    pub fn load_snapshot(&self, hash: &Hash) -> Result<LoadOutcome> {
        let mut state = self.state.write();
        ops::load_snapshot(self, &mut state, hash)
    }

    /// open a file, from a snapshot if `snapshot` is given, else the live copy
    ///
    /// `path` is relative to the tracked directory, or absolute inside it.
    pub fn open_file(&self, path: impl AsRef<Path>, snapshot: Option<&Hash>) -> Result<File> {
        let key = self.key_for(path.as_ref())?;
        let state = self.state.read();
        ops::open_file(self, &state, &key, snapshot)
    }

    /// read a whole file, from a snapshot or the live copy
    pub fn read_file(&self, path: impl AsRef<Path>, snapshot: Option<&Hash>) -> Result<Vec<u8>> {
        let key = self.key_for(path.as_ref())?;
        let mut file = self.open_file(&key, snapshot)?;
        let mut content = Vec::new();
        file.read_to_end(&mut content).with_path(self.root.join(&key))?;
        Ok(content)
    }

    /// all snapshots, newest first
    pub fn history(&self) -> Vec<Snapshot> {
        let state = self.state.read();
        ops::history(&state)
    }

    /// parent chain of a snapshot, newest first
    pub fn ancestry(&self, hash: &Hash) -> Result<Vec<Snapshot>> {
        let state = self.state.read();
        ops::ancestry(&state, hash)
    }

    /// the snapshot the working directory was last saved as or restored to
    pub fn current(&self) -> Option<Hash> {
        self.state.read().meta.current
    }

    /// look up one snapshot
    pub fn snapshot(&self, hash: &Hash) -> Result<Snapshot> {
        let state = self.state.read();
        state.index.get(hash).cloned()
    }

    /// compare two snapshots
    pub fn diff(&self, from: &Hash, to: &Hash) -> Result<Vec<DiffEntry>> {
        let state = self.state.read();
        ops::diff(&state, from, to)
    }

    /// check store integrity
    pub fn verify(&self) -> Result<VerifyReport> {
        let state = self.state.read();
        ops::verify(self, &state)
    }

    /// tree key for a caller-supplied path
    ///
    /// keys inside the store directory are rejected.
    pub fn key_for(&self, path: &Path) -> Result<String> {
        if path.is_absolute() {
            self.scanner.key_for(path)
        } else {
            normalize_path(path)
        }
    }

    /// remove staging files left behind by interrupted writes
    fn clear_tmp(&self) -> Result<()> {
        let tmp = self.tmp_path();
        for entry in fs::read_dir(&tmp).with_path(&tmp)? {
            let path = entry.with_path(&tmp)?.path();
            if path.is_file() {
                debug!(path = ?path, "removing stale staging file");
                fs::remove_file(&path).with_path(&path)?;
            }
        }
        Ok(())
    }
}

/// make a path absolute without resolving symlinks
fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().with_path(path)?;
    Ok(cwd.join(path))
}
