use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::hash::Hash;
use crate::types::Snapshot;

/// every snapshot of a repository, held in memory
///
/// loaded eagerly when the repository opens; the record files stay the
/// source of truth and the index only grows.
#[derive(Clone, Debug, Default)]
pub struct SnapshotIndex {
    snapshots: HashMap<Hash, Snapshot>,
}

impl SnapshotIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// build an index from already-read records
    pub fn from_snapshots(snapshots: impl IntoIterator<Item = Snapshot>) -> Self {
        let mut index = Self::new();
        for snapshot in snapshots {
            index.add(snapshot);
        }
        index
    }

    /// insert a snapshot; an existing record with the same hash is kept
    pub fn add(&mut self, snapshot: Snapshot) -> bool {
        if self.snapshots.contains_key(&snapshot.hash) {
            return false;
        }
        self.snapshots.insert(snapshot.hash, snapshot);
        true
    }

    /// look up a snapshot by hash
    pub fn get(&self, hash: &Hash) -> Result<&Snapshot> {
        self.snapshots
            .get(hash)
            .ok_or(Error::SnapshotNotFound(*hash))
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.snapshots.contains_key(hash)
    }

    /// all snapshots, most recent first
    ///
    /// equal timestamps are ordered by hash so the result is deterministic.
    pub fn all(&self) -> Vec<&Snapshot> {
        let mut all: Vec<&Snapshot> = self.snapshots.values().collect();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.hash.cmp(&b.hash)));
        all
    }

    /// parent chain starting at `hash`, newest first
    ///
    /// stops at a root snapshot or at a parent that is not in the index.
    pub fn ancestry(&self, hash: &Hash) -> Result<Vec<&Snapshot>> {
        let mut chain = vec![self.get(hash)?];
        let mut visited = std::collections::HashSet::from([*hash]);

        while let Some(parent) = chain.last().and_then(|s| s.parent) {
            if !visited.insert(parent) {
                break;
            }
            match self.snapshots.get(&parent) {
                Some(snapshot) => chain.push(snapshot),
                None => break,
            }
        }

        Ok(chain)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::compute_blob_hash;
    use crate::types::Tree;
    use chrono::{Duration, TimeZone, Utc};

    fn snap(name: &str, parent: Option<Hash>, secs: i64) -> Snapshot {
        Snapshot {
            hash: compute_blob_hash(name.as_bytes()),
            tree: Tree::new(),
            description: name.to_string(),
            parent,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(secs),
        }
    }

    #[test]
    fn test_add_and_get() {
        let mut index = SnapshotIndex::new();
        let s = snap("one", None, 0);

        assert!(index.add(s.clone()));
        assert_eq!(index.get(&s.hash).unwrap(), &s);
        assert!(index.contains(&s.hash));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_add_keeps_existing_record() {
        let mut index = SnapshotIndex::new();
        let original = snap("one", None, 0);
        let mut duplicate = original.clone();
        duplicate.description = "changed".to_string();

        index.add(original.clone());
        assert!(!index.add(duplicate));
        assert_eq!(index.get(&original.hash).unwrap().description, "one");
    }

    #[test]
    fn test_get_missing() {
        let index = SnapshotIndex::new();
        assert!(matches!(
            index.get(&Hash::ZERO),
            Err(Error::SnapshotNotFound(_))
        ));
    }

    #[test]
    fn test_all_newest_first() {
        let index = SnapshotIndex::from_snapshots(vec![
            snap("old", None, 0),
            snap("new", None, 20),
            snap("mid", None, 10),
        ]);

        let order: Vec<_> = index.all().iter().map(|s| s.description.as_str()).collect();
        assert_eq!(order, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_all_ties_broken_by_hash() {
        let a = snap("a", None, 5);
        let b = snap("b", None, 5);
        let index = SnapshotIndex::from_snapshots(vec![a.clone(), b.clone()]);

        let hashes: Vec<_> = index.all().iter().map(|s| s.hash).collect();
        let mut expected = vec![a.hash, b.hash];
        expected.sort();
        assert_eq!(hashes, expected);
    }

    #[test]
    fn test_ancestry() {
        let s1 = snap("one", None, 0);
        let s2 = snap("two", Some(s1.hash), 1);
        let s3 = snap("three", Some(s2.hash), 2);
        let other = snap("other", None, 3);
        let index = SnapshotIndex::from_snapshots(vec![s1.clone(), s2.clone(), s3.clone(), other]);

        let chain: Vec<_> = index.ancestry(&s3.hash).unwrap().iter().map(|s| s.hash).collect();
        assert_eq!(chain, vec![s3.hash, s2.hash, s1.hash]);
    }

    #[test]
    fn test_ancestry_stops_at_missing_parent() {
        let orphan = snap("orphan", Some(Hash::ZERO), 0);
        let index = SnapshotIndex::from_snapshots(vec![orphan.clone()]);

        assert_eq!(index.ancestry(&orphan.hash).unwrap().len(), 1);
    }
}
