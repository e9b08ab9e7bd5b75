use std::cmp::Ordering;

use crate::error::Result;
use crate::hash::Hash;
use crate::repo::RepoState;
use crate::types::{ChangeKind, DiffEntry, Tree};

/// compare two snapshots and return list of changes
pub(crate) fn diff(state: &RepoState, from: &Hash, to: &Hash) -> Result<Vec<DiffEntry>> {
    let t1 = &state.index.get(from)?.tree;
    let t2 = &state.index.get(to)?.tree;
    Ok(diff_trees(t1, t2))
}

/// compare two trees by whole-file hash
///
/// both trees iterate in path order, so this is a single merge pass and the
/// result is sorted by path.
pub fn diff_trees(from: &Tree, to: &Tree) -> Vec<DiffEntry> {
    let mut changes = Vec::new();
    let mut left = from.iter().peekable();
    let mut right = to.iter().peekable();

    loop {
        let order = match (left.peek(), right.peek()) {
            (None, None) => break,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some((p1, _)), Some((p2, _))) => p1.cmp(p2),
        };

        match order {
            Ordering::Less => {
                if let Some((path, hash)) = left.next() {
                    changes.push(DiffEntry {
                        path: path.to_string(),
                        kind: ChangeKind::Deleted,
                        old: Some(*hash),
                        new: None,
                    });
                }
            }
            Ordering::Greater => {
                if let Some((path, hash)) = right.next() {
                    changes.push(DiffEntry {
                        path: path.to_string(),
                        kind: ChangeKind::Added,
                        old: None,
                        new: Some(*hash),
                    });
                }
            }
            Ordering::Equal => {
                if let (Some((path, h1)), Some((_, h2))) = (left.next(), right.next()) {
                    if h1 != h2 {
                        changes.push(DiffEntry {
                            path: path.to_string(),
                            kind: ChangeKind::Modified,
                            old: Some(*h1),
                            new: Some(*h2),
                        });
                    }
                }
            }
        }
    }

    changes
}
