use crate::error::Result;
use crate::ops::diff::diff_trees;
use crate::repo::{RepoState, Repository};
use crate::types::{DiffEntry, Tree};

/// does the working directory differ from the current snapshot
pub(crate) fn has_unsaved_changes(repo: &Repository, state: &RepoState) -> Result<bool> {
    let Some(current) = state.meta.current else {
        // nothing saved yet: always dirty
        return Ok(true);
    };

    let live = repo.scanner().scan()?;
    Ok(state.index.get(&current)?.tree != live)
}

/// changes of the working directory relative to the current snapshot
pub(crate) fn status(repo: &Repository, state: &RepoState) -> Result<Vec<DiffEntry>> {
    let live = repo.scanner().scan()?;
    let changes = match state.meta.current {
        Some(current) => diff_trees(&state.index.get(&current)?.tree, &live),
        None => diff_trees(&Tree::new(), &live),
    };
    Ok(changes)
}
