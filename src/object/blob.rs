use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, IoResultExt, Result};
use crate::fs::fsync_dir;
use crate::hash::{compute_blob_hash, BlobHasher, Hash};

const BUF_SIZE: usize = 64 * 1024;

/// append-only, deduplicating blob storage keyed by content hash
///
/// blobs live flat under one directory, named by the hex digest of their
/// bytes. a blob is never rewritten or removed once it exists.
#[derive(Clone, Debug)]
pub struct ContentStore {
    blobs: PathBuf,
    tmp: PathBuf,
    fsync: bool,
    verify: bool,
}

impl ContentStore {
    /// open a store over `blobs`, staging writes in `tmp`
    ///
    /// both directories are created if missing.
    pub fn new(blobs: impl Into<PathBuf>, tmp: impl Into<PathBuf>) -> Result<Self> {
        let blobs = blobs.into();
        let tmp = tmp.into();
        fs::create_dir_all(&blobs).with_path(&blobs)?;
        fs::create_dir_all(&tmp).with_path(&tmp)?;
        Ok(Self {
            blobs,
            tmp,
            fsync: true,
            verify: false,
        })
    }

    /// toggle fsync of blob files and the blob directory
    pub fn with_fsync(mut self, fsync: bool) -> Self {
        self.fsync = fsync;
        self
    }

    /// toggle hash verification in `read`
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// whether `read` re-hashes blob bytes
    pub fn verifies(&self) -> bool {
        self.verify
    }

    /// blob directory
    pub fn path(&self) -> &Path {
        &self.blobs
    }

    /// get the filesystem path to a blob
    pub fn blob_path(&self, hash: &Hash) -> PathBuf {
        self.blobs.join(hash.to_hex())
    }

    /// store bytes, returning their hash
    ///
    /// writing identical bytes twice is a no-op the second time.
    pub fn put(&self, content: &[u8]) -> Result<Hash> {
        let hash = compute_blob_hash(content);
        let blob_path = self.blob_path(&hash);

        // deduplication: if blob already exists, we're done
        if blob_path.exists() {
            debug!(blob = %hash.short(), "blob already stored");
            return Ok(hash);
        }

        // atomic write: temp file -> fsync -> rename
        let tmp_path = self.tmp_file();
        {
            let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
            tmp_file.write_all(content).with_path(&tmp_path)?;
            if self.fsync {
                tmp_file.sync_all().with_path(&tmp_path)?;
            }
        }

        self.commit_tmp(&tmp_path, &blob_path)?;
        debug!(blob = %hash.short(), bytes = content.len(), "stored blob");

        Ok(hash)
    }

    /// store the contents of a reader (for large files)
    pub fn put_reader<R: Read>(&self, reader: &mut R) -> Result<Hash> {
        // for streaming, write to temp first, then compute hash
        let tmp_path = self.tmp_file();

        let mut hasher = BlobHasher::new();
        let mut total = 0u64;
        {
            let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
            let mut buf = vec![0u8; BUF_SIZE];
            loop {
                let n = reader.read(&mut buf).with_path(&tmp_path)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
                tmp_file.write_all(&buf[..n]).with_path(&tmp_path)?;
                total += n as u64;
            }
            if self.fsync {
                tmp_file.sync_all().with_path(&tmp_path)?;
            }
        }

        let hash = hasher.finalize();
        let blob_path = self.blob_path(&hash);

        // dedup check
        if blob_path.exists() {
            fs::remove_file(&tmp_path).with_path(&tmp_path)?;
            debug!(blob = %hash.short(), "blob already stored");
            return Ok(hash);
        }

        self.commit_tmp(&tmp_path, &blob_path)?;
        debug!(blob = %hash.short(), bytes = total, "stored blob");

        Ok(hash)
    }

    /// open a blob for reading
    ///
    /// the stream is not verified against the hash; see `verify`.
    pub fn get(&self, hash: &Hash) -> Result<File> {
        let path = self.blob_path(hash);
        File::open(&path).map_err(|e| not_found_or_io(e, hash, path))
    }

    /// read blob content, verifying it when the store is configured to
    pub fn read(&self, hash: &Hash) -> Result<Vec<u8>> {
        let path = self.blob_path(hash);
        let content = fs::read(&path).map_err(|e| not_found_or_io(e, hash, path))?;
        if self.verify && compute_blob_hash(&content) != *hash {
            return Err(Error::CorruptObject(*hash));
        }
        Ok(content)
    }

    /// check if a blob exists in the store
    pub fn contains(&self, hash: &Hash) -> bool {
        self.blob_path(hash).is_file()
    }

    /// re-hash a stored blob and compare against its name
    pub fn verify(&self, hash: &Hash) -> Result<()> {
        let path = self.blob_path(hash);
        let mut file = self.get(hash)?;

        let mut hasher = BlobHasher::new();
        let mut buf = vec![0u8; BUF_SIZE];
        loop {
            let n = file.read(&mut buf).with_path(&path)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }

        if hasher.finalize() != *hash {
            return Err(Error::CorruptObject(*hash));
        }
        Ok(())
    }

    /// size of a stored blob in bytes
    pub fn size(&self, hash: &Hash) -> Result<u64> {
        let path = self.blob_path(hash);
        let meta = fs::metadata(&path).map_err(|e| not_found_or_io(e, hash, path))?;
        Ok(meta.len())
    }

    /// list every blob on disk
    ///
    /// entries whose name is not a valid hash are skipped.
    pub fn list(&self) -> Result<Vec<Hash>> {
        let mut hashes = Vec::new();
        for entry in fs::read_dir(&self.blobs).with_path(&self.blobs)? {
            let entry = entry.with_path(&self.blobs)?;
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(hash) = Hash::from_hex(name) {
                    hashes.push(hash);
                }
            }
        }
        hashes.sort();
        Ok(hashes)
    }

    /// unique staging path
    fn tmp_file(&self) -> PathBuf {
        self.tmp.join(uuid::Uuid::new_v4().to_string())
    }

    /// move a fully written temp file into place
    fn commit_tmp(&self, tmp_path: &Path, blob_path: &Path) -> Result<()> {
        fs::rename(tmp_path, blob_path).with_path(blob_path)?;
        if self.fsync {
            fsync_dir(&self.blobs)?;
        }
        Ok(())
    }
}

fn not_found_or_io(e: std::io::Error, hash: &Hash, path: PathBuf) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::ObjectNotFound(*hash)
    } else {
        Error::Io { path, source: e }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_store() -> (tempfile::TempDir, ContentStore) {
        let dir = tempdir().unwrap();
        let store = ContentStore::new(dir.path().join("blobs"), dir.path().join("tmp")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_put_and_get() {
        let (_dir, store) = test_store();

        let content = b"hello, world!";
        let hash = store.put(content).unwrap();

        assert!(store.contains(&hash));

        let mut read_back = Vec::new();
        store.get(&hash).unwrap().read_to_end(&mut read_back).unwrap();
        assert_eq!(read_back, content);
        assert_eq!(store.read(&hash).unwrap(), content);
    }

    #[test]
    fn test_put_deduplication() {
        let (_dir, store) = test_store();

        let content = b"duplicate content";
        let h1 = store.put(content).unwrap();
        let h2 = store.put(content).unwrap();

        assert_eq!(h1, h2);
        assert_eq!(fs::read_dir(store.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_blob_named_by_hex_digest() {
        let (_dir, store) = test_store();

        let hash = store.put(b"hello").unwrap();
        let path = store.blob_path(&hash);

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(fs::read(path).unwrap(), b"hello");
    }

    #[test]
    fn test_empty_blob() {
        let (_dir, store) = test_store();

        let hash = store.put(b"").unwrap();
        assert!(store.contains(&hash));
        assert!(store.read(&hash).unwrap().is_empty());
        assert_eq!(store.size(&hash).unwrap(), 0);
    }

    #[test]
    fn test_get_nonexistent_blob() {
        let (_dir, store) = test_store();

        let fake_hash =
            Hash::from_hex("0000000000000000000000000000000000000000000000000000000000000000")
                .unwrap();

        assert!(!store.contains(&fake_hash));
        assert!(matches!(store.get(&fake_hash), Err(Error::ObjectNotFound(_))));
        assert!(matches!(store.read(&fake_hash), Err(Error::ObjectNotFound(_))));
    }

    #[test]
    fn test_streaming_put() {
        let (_dir, store) = test_store();

        let content = b"streaming content test";
        let mut cursor = std::io::Cursor::new(content.as_slice());

        let hash = store.put_reader(&mut cursor).unwrap();

        // should match non-streaming hash, and not leave a second copy
        let expected_hash = store.put(content).unwrap();
        assert_eq!(hash, expected_hash);
        assert_eq!(store.list().unwrap(), vec![hash]);
    }

    #[test]
    fn test_streaming_put_dedup_cleans_tmp() {
        let dir = tempdir().unwrap();
        let tmp = dir.path().join("tmp");
        let store = ContentStore::new(dir.path().join("blobs"), &tmp).unwrap();

        store.put(b"again").unwrap();
        store
            .put_reader(&mut std::io::Cursor::new(b"again".as_slice()))
            .unwrap();

        assert_eq!(fs::read_dir(&tmp).unwrap().count(), 0);
    }

    #[test]
    fn test_verify_detects_corruption() {
        let (_dir, store) = test_store();

        let hash = store.put(b"pristine").unwrap();
        store.verify(&hash).unwrap();

        fs::write(store.blob_path(&hash), b"tampered").unwrap();
        assert!(matches!(store.verify(&hash), Err(Error::CorruptObject(_))));

        // unverified read hands back whatever is on disk
        assert_eq!(store.read(&hash).unwrap(), b"tampered");

        let verifying = store.clone().with_verify(true);
        assert!(matches!(verifying.read(&hash), Err(Error::CorruptObject(_))));
    }

    #[test]
    fn test_list_skips_foreign_files() {
        let (_dir, store) = test_store();

        let h1 = store.put(b"one").unwrap();
        let h2 = store.put(b"two").unwrap();
        fs::write(store.path().join("README"), b"not a blob").unwrap();

        let mut expected = vec![h1, h2];
        expected.sort();
        assert_eq!(store.list().unwrap(), expected);
    }
}
