use std::io::Read;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{IoResultExt, Result};
use crate::hash::{Hash, SnapshotHasher};
use crate::meta::RepositoryMeta;
use crate::object::{write_snapshot, ContentStore};
use crate::repo::{RepoState, Repository};
use crate::types::{Snapshot, SnapshotHeader, Tree};

/// result of a save
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    /// a snapshot was recorded and is now current
    Saved(Hash),
    /// the working directory matches the current snapshot; nothing was written
    NoOpCommit,
}

impl SaveOutcome {
    /// hash of the saved snapshot, if any
    pub fn hash(&self) -> Option<Hash> {
        match self {
            SaveOutcome::Saved(hash) => Some(*hash),
            SaveOutcome::NoOpCommit => None,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, SaveOutcome::NoOpCommit)
    }
}

/// checkpoint the working directory
///
/// blobs are stored before the record is written, and the record before
/// the current pointer moves.
pub(crate) fn save_snapshot(
    repo: &Repository,
    state: &mut RepoState,
    description: &str,
) -> Result<SaveOutcome> {
    let store = repo.store();

    // store every file; dedup absorbs repeats
    let tree = repo.scanner().scan_with(|_, content| store.put(content))?;

    let parent = state.meta.current;
    if let Some(current) = parent {
        if state.index.get(&current)?.tree == tree {
            warn!(current = %current.short(), "nothing to commit");
            return Ok(SaveOutcome::NoOpCommit);
        }
    }

    let hash = compute_snapshot_hash(store, &tree, description, parent)?;

    if state.index.contains(&hash) {
        // same content, description and parent as an earlier save: the
        // immutable record is reused and only the pointer moves
        info!(snapshot = %hash.short(), "reusing existing snapshot record");
    } else {
        let snapshot = Snapshot {
            hash,
            tree,
            description: description.to_string(),
            parent,
            timestamp: Utc::now(),
        };
        write_snapshot(repo, &snapshot)?;
        state.index.add(snapshot);
    }

    let meta = RepositoryMeta {
        current: Some(hash),
    };
    meta.save(&repo.meta_path(), &repo.tmp_path(), repo.config().fsync)?;
    state.meta = meta;

    info!(
        snapshot = %hash.short(),
        parent = ?parent,
        description,
        "saved snapshot"
    );

    Ok(SaveOutcome::Saved(hash))
}

/// snapshot identity over stored file bytes (in path order) and the header
///
/// every blob in `tree` must already be in `store`.
pub(crate) fn compute_snapshot_hash(
    store: &ContentStore,
    tree: &Tree,
    description: &str,
    parent: Option<Hash>,
) -> Result<Hash> {
    let mut hasher = SnapshotHasher::new();
    let mut buf = vec![0u8; 64 * 1024];

    for (_, blob) in tree.iter() {
        let path = store.blob_path(blob);
        let mut file = store.get(blob)?;
        let len = file.metadata().with_path(&path)?.len();

        hasher.begin_file(len);
        loop {
            let n = file.read(&mut buf).with_path(&path)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
    }

    let header = SnapshotHeader {
        tree,
        description,
        parent,
    }
    .to_bytes()?;

    Ok(hasher.finalize(&header))
}
