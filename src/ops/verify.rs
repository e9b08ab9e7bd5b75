use std::collections::HashSet;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::ops::save::compute_snapshot_hash;
use crate::repo::{RepoState, Repository};

/// integrity report
#[derive(Debug, Default)]
pub struct VerifyReport {
    /// snapshot records checked
    pub snapshots_checked: usize,
    /// distinct blobs checked
    pub blobs_checked: usize,
    /// blobs referenced by a snapshot but absent from the store
    pub missing_blobs: Vec<MissingBlob>,
    /// blobs whose content no longer hashes to their name
    pub corrupt_blobs: Vec<Hash>,
    /// snapshots whose recomputed hash differs from their recorded one
    pub corrupt_snapshots: Vec<Hash>,
    /// snapshots naming a parent that is not in the index
    pub missing_parents: Vec<Hash>,
    /// current pointer names a snapshot that is not in the index
    pub dangling_current: Option<Hash>,
    /// stored blobs no snapshot refers to
    pub unreferenced_blobs: usize,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.missing_blobs.is_empty()
            && self.corrupt_blobs.is_empty()
            && self.corrupt_snapshots.is_empty()
            && self.missing_parents.is_empty()
            && self.dangling_current.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingBlob {
    pub hash: Hash,
    pub snapshot: Hash,
    pub path: String,
}

/// check every snapshot, every referenced blob, and the current pointer
pub(crate) fn verify(repo: &Repository, state: &RepoState) -> Result<VerifyReport> {
    let store = repo.store();
    let mut report = VerifyReport::default();
    let mut referenced = HashSet::new();
    let mut corrupt = HashSet::new();

    let snapshots = state.index.all();
    for snapshot in &snapshots {
        report.snapshots_checked += 1;

        let mut complete = true;
        for (path, blob) in snapshot.tree.iter() {
            if !store.contains(blob) {
                complete = false;
                report.missing_blobs.push(MissingBlob {
                    hash: *blob,
                    snapshot: snapshot.hash,
                    path: path.to_string(),
                });
                continue;
            }

            if referenced.insert(*blob) {
                report.blobs_checked += 1;
                match store.verify(blob) {
                    Ok(()) => {}
                    Err(Error::CorruptObject(_)) => {
                        warn!(blob = %blob.short(), "corrupt blob");
                        corrupt.insert(*blob);
                        report.corrupt_blobs.push(*blob);
                    }
                    Err(e) => return Err(e),
                }
            }
            if corrupt.contains(blob) {
                complete = false;
            }
        }

        if let Some(parent) = snapshot.parent {
            if !state.index.contains(&parent) {
                report.missing_parents.push(snapshot.hash);
            }
        }

        // the identity can only be recomputed from intact blobs
        if complete {
            let actual = compute_snapshot_hash(
                store,
                &snapshot.tree,
                &snapshot.description,
                snapshot.parent,
            )?;
            if actual != snapshot.hash {
                warn!(
                    snapshot = %snapshot.hash.short(),
                    actual = %actual.short(),
                    "snapshot hash mismatch"
                );
                report.corrupt_snapshots.push(snapshot.hash);
            }
        }
    }

    if let Some(current) = state.meta.current {
        if !state.index.contains(&current) {
            report.dangling_current = Some(current);
        }
    }

    report.unreferenced_blobs = store
        .list()?
        .iter()
        .filter(|hash| !referenced.contains(*hash))
        .count();

    info!(
        snapshots = report.snapshots_checked,
        blobs = report.blobs_checked,
        ok = report.is_ok(),
        "verified repository"
    );

    Ok(report)
}
