use std::fs::File;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::repo::{RepoState, Repository};

/// open a file by tree key, from a snapshot or the working directory
pub(crate) fn open_file(
    repo: &Repository,
    state: &RepoState,
    key: &str,
    snapshot: Option<&Hash>,
) -> Result<File> {
    match snapshot {
        Some(hash) => {
            let snapshot = state.index.get(hash)?;
            let blob = snapshot
                .tree
                .get(key)
                .ok_or_else(|| Error::PathNotFound(key.to_string()))?;

            let store = repo.store();
            if store.verifies() {
                store.verify(blob)?;
            }
            store.get(blob)
        }
        None => {
            // unversioned read of the live file
            let path = repo.root().join(key);
            File::open(&path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::PathNotFound(key.to_string())
                } else {
                    Error::Io { path, source: e }
                }
            })
        }
    }
}
