use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, IoResultExt, Result};
use crate::fs::fsync_dir;
use crate::hash::Hash;

/// the single persisted mutable pointer of a repository
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryMeta {
    /// snapshot the working directory was last saved as or restored to
    pub current: Option<Hash>,
}

impl RepositoryMeta {
    /// read the meta record; a missing file means no snapshot yet
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e).with_path(path),
        };

        serde_json::from_slice(&content).map_err(|e| Error::CorruptMeta(e.to_string()))
    }

    /// atomically replace the meta record
    ///
    /// staged in `tmp_dir`, then renamed over `path`.
    pub fn save(&self, path: &Path, tmp_dir: &Path, fsync: bool) -> Result<()> {
        let bytes = serde_json::to_vec(self)?;

        let tmp_path = tmp_dir.join(uuid::Uuid::new_v4().to_string());
        {
            let mut tmp_file = File::create(&tmp_path).with_path(&tmp_path)?;
            tmp_file.write_all(&bytes).with_path(&tmp_path)?;
            if fsync {
                tmp_file.sync_all().with_path(&tmp_path)?;
            }
        }

        fs::rename(&tmp_path, path).with_path(path)?;

        if fsync {
            if let Some(parent) = path.parent() {
                fsync_dir(parent)?;
            }
        }

        Ok(())
    }
}
