use crate::error::Result;
use crate::hash::Hash;
use crate::repo::RepoState;
use crate::types::Snapshot;

/// every snapshot, sorted by timestamp descending (newest first)
pub(crate) fn history(state: &RepoState) -> Vec<Snapshot> {
    state.index.all().into_iter().cloned().collect()
}

/// parent chain of one snapshot, newest first
pub(crate) fn ancestry(state: &RepoState, hash: &Hash) -> Result<Vec<Snapshot>> {
    Ok(state
        .index
        .ancestry(hash)?
        .into_iter()
        .cloned()
        .collect())
}
