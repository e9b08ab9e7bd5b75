use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, IoResultExt, Result};
use crate::fs::fsync_dir;
use crate::hash::Hash;
use crate::repo::Repository;
use crate::types::Snapshot;

/// schema version of snapshot records
pub const RECORD_VERSION: u32 = 1;

#[derive(Serialize)]
struct RecordOut<'a> {
    version: u32,
    #[serde(flatten)]
    snapshot: &'a Snapshot,
}

/// persist a snapshot record
///
/// records are JSON tagged with a schema version. returns false if a record
/// with this hash already exists (records are immutable, so it is left as is).
pub fn write_snapshot(repo: &Repository, snapshot: &Snapshot) -> Result<bool> {
    let record_path = snapshot_path(repo, &snapshot.hash);

    // dedup: if record already exists, we're done
    if record_path.exists() {
        return Ok(false);
    }

    let bytes = serde_json::to_vec_pretty(&RecordOut {
        version: RECORD_VERSION,
        snapshot,
    })?;

    // atomic write: temp -> fsync -> rename
    let fsync = repo.config().fsync;
    let tmp_path = repo.tmp_path().join(uuid::Uuid::new_v4().to_string());
    {
        let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
        tmp_file.write_all(&bytes).with_path(&tmp_path)?;
        if fsync {
            tmp_file.sync_all().with_path(&tmp_path)?;
        }
    }

    fs::rename(&tmp_path, &record_path).with_path(&record_path)?;

    if fsync {
        fsync_dir(&repo.snapshots_path())?;
    }

    Ok(true)
}

/// read and validate one snapshot record
pub fn read_snapshot(path: &Path) -> Result<Snapshot> {
    let corrupt = |message: String| Error::CorruptSnapshot {
        path: path.to_path_buf(),
        message,
    };

    let bytes = fs::read(path).with_path(path)?;
    let value: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| corrupt(e.to_string()))?;

    let version = value
        .get("version")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| corrupt("missing schema version".to_string()))?;
    if version > u64::from(RECORD_VERSION) {
        return Err(Error::UnsupportedFormat {
            found: u32::try_from(version).unwrap_or(u32::MAX),
            supported: RECORD_VERSION,
        });
    }

    let snapshot: Snapshot = serde_json::from_value(value).map_err(|e| corrupt(e.to_string()))?;

    // the file name is the identity; a mismatch means the record was tampered with
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if name != snapshot.hash.to_hex() {
        return Err(corrupt(format!(
            "record hash {} does not match file name",
            snapshot.hash
        )));
    }

    Ok(snapshot)
}

/// read every snapshot record of a repository
///
/// any unreadable or malformed record fails the whole load.
pub fn load_snapshots(repo: &Repository) -> Result<Vec<Snapshot>> {
    let dir = repo.snapshots_path();
    let mut snapshots = Vec::new();

    for entry in fs::read_dir(&dir).with_path(&dir)? {
        let entry = entry.with_path(&dir)?;
        let path = entry.path();
        snapshots.push(read_snapshot(&path)?);
    }

    Ok(snapshots)
}

/// get the filesystem path to a snapshot record
pub fn snapshot_path(repo: &Repository, hash: &Hash) -> PathBuf {
    repo.snapshots_path().join(hash.to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::compute_blob_hash;
    use crate::types::Tree;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Repository) {
        let dir = tempdir().unwrap();
        let repo = Repository::open(dir.path()).unwrap();
        (dir, repo)
    }

    fn sample(hash: Hash, parent: Option<Hash>) -> Snapshot {
        Snapshot {
            hash,
            tree: Tree::from_entries([("a.txt", compute_blob_hash(b"hello"))]).unwrap(),
            description: "test snapshot".to_string(),
            parent,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    #[test]
    fn test_write_and_read_snapshot() {
        let (_dir, repo) = test_repo();

        let snapshot = sample(compute_blob_hash(b"snap"), None);
        assert!(write_snapshot(&repo, &snapshot).unwrap());

        let read_back = read_snapshot(&snapshot_path(&repo, &snapshot.hash)).unwrap();
        assert_eq!(snapshot, read_back);
    }

    #[test]
    fn test_record_is_versioned_json() {
        let (_dir, repo) = test_repo();

        let snapshot = sample(compute_blob_hash(b"snap"), Some(compute_blob_hash(b"p")));
        write_snapshot(&repo, &snapshot).unwrap();

        let raw = fs::read_to_string(snapshot_path(&repo, &snapshot.hash)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 1);
        assert_eq!(value["description"], "test snapshot");
        assert_eq!(value["hash"], snapshot.hash.to_hex());
        assert!(value["tree"]["a.txt"].is_string());
    }

    #[test]
    fn test_write_snapshot_is_immutable() {
        let (_dir, repo) = test_repo();

        let hash = compute_blob_hash(b"snap");
        let first = sample(hash, None);
        let mut second = sample(hash, None);
        second.description = "rewritten".to_string();

        assert!(write_snapshot(&repo, &first).unwrap());
        assert!(!write_snapshot(&repo, &second).unwrap());

        let on_disk = read_snapshot(&snapshot_path(&repo, &hash)).unwrap();
        assert_eq!(on_disk.description, "test snapshot");
    }

    #[test]
    fn test_load_snapshots() {
        let (_dir, repo) = test_repo();

        let s1 = sample(compute_blob_hash(b"one"), None);
        let s2 = sample(compute_blob_hash(b"two"), Some(s1.hash));
        write_snapshot(&repo, &s1).unwrap();
        write_snapshot(&repo, &s2).unwrap();

        let mut loaded = load_snapshots(&repo).unwrap();
        loaded.sort_by_key(|s| s.hash);
        let mut expected = vec![s1, s2];
        expected.sort_by_key(|s| s.hash);
        assert_eq!(loaded, expected);
    }

    #[test]
    fn test_malformed_record_fails_loudly() {
        let (_dir, repo) = test_repo();

        let hash = compute_blob_hash(b"garbage");
        fs::write(snapshot_path(&repo, &hash), b"{not json").unwrap();

        assert!(matches!(
            load_snapshots(&repo),
            Err(Error::CorruptSnapshot { .. })
        ));
    }

    #[test]
    fn test_record_name_mismatch_is_corrupt() {
        let (_dir, repo) = test_repo();

        let snapshot = sample(compute_blob_hash(b"snap"), None);
        write_snapshot(&repo, &snapshot).unwrap();

        let wrong = snapshot_path(&repo, &compute_blob_hash(b"other"));
        fs::rename(snapshot_path(&repo, &snapshot.hash), &wrong).unwrap();

        assert!(matches!(
            read_snapshot(&wrong),
            Err(Error::CorruptSnapshot { .. })
        ));
    }

    #[test]
    fn test_newer_record_version_rejected() {
        let (_dir, repo) = test_repo();

        let snapshot = sample(compute_blob_hash(b"snap"), None);
        let mut value = serde_json::to_value(&snapshot).unwrap();
        value["version"] = serde_json::json!(7);
        let path = snapshot_path(&repo, &snapshot.hash);
        fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        assert!(matches!(
            read_snapshot(&path),
            Err(Error::UnsupportedFormat { found: 7, .. })
        ));
    }

    #[test]
    fn test_record_with_store_dir_key_is_corrupt() {
        let (_dir, repo) = test_repo();

        let snapshot = sample(compute_blob_hash(b"snap"), None);
        let mut value = serde_json::to_value(&snapshot).unwrap();
        value["version"] = serde_json::json!(RECORD_VERSION);
        value["tree"] = serde_json::json!({ ".vcs/meta": compute_blob_hash(b"x").to_hex() });
        let path = snapshot_path(&repo, &snapshot.hash);
        fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

        assert!(matches!(
            read_snapshot(&path),
            Err(Error::CorruptSnapshot { .. })
        ));
    }
}
