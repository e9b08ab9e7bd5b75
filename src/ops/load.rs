use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::fs::{remove_file_and_prune, replace_file};
use crate::hash::Hash;
use crate::meta::RepositoryMeta;
use crate::repo::{RepoState, Repository};

/// result of a load
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// the working directory now matches the snapshot
    Loaded,
    /// already at that snapshot with no unsaved changes; nothing was touched
    NoOp,
}

impl LoadOutcome {
    pub fn is_noop(&self) -> bool {
        matches!(self, LoadOutcome::NoOp)
    }
}

/// restore the working directory to a snapshot
///
/// destructive: tracked files absent from the snapshot are deleted, and
/// unsaved edits to tracked files are overwritten.
pub(crate) fn load_snapshot(
    repo: &Repository,
    state: &mut RepoState,
    hash: &Hash,
) -> Result<LoadOutcome> {
    let target = state.index.get(hash)?.tree.clone();
    let live = repo.scanner().scan()?;

    if state.meta.current == Some(*hash) && live == target {
        warn!(snapshot = %hash.short(), "already at snapshot");
        return Ok(LoadOutcome::NoOp);
    }

    // every blob must be present before the working directory is touched
    let store = repo.store();
    for blob in target.blobs() {
        if !store.contains(&blob) {
            return Err(Error::ObjectNotFound(blob));
        }
        if store.verifies() {
            store.verify(&blob)?;
        }
    }

    let root = repo.root();
    let fsync = repo.config().fsync;

    let mut written = 0usize;
    for (path, blob) in target.iter() {
        if live.get(path) == Some(blob) {
            continue;
        }
        let tmp = repo.tmp_path().join(uuid::Uuid::new_v4().to_string());
        replace_file(root, path, &store.blob_path(blob), &tmp, fsync)?;
        debug!(path, blob = %blob.short(), "restored file");
        written += 1;
    }

    let mut removed = 0usize;
    for path in live.paths() {
        if target.contains(path) {
            continue;
        }
        remove_file_and_prune(root, path)?;
        debug!(path, "removed file absent from snapshot");
        removed += 1;
    }

    let meta = RepositoryMeta {
        current: Some(*hash),
    };
    meta.save(&repo.meta_path(), &repo.tmp_path(), fsync)?;
    state.meta = meta;

    info!(
        snapshot = %hash.short(),
        written,
        removed,
        "loaded snapshot"
    );

    Ok(LoadOutcome::Loaded)
}
