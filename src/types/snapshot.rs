use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::hash::Hash;
use crate::types::Tree;

/// an immutable record of one complete tracked-directory state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// identity derived from (file bytes, tree, description, parent)
    pub hash: Hash,
    /// path -> blob hash
    pub tree: Tree,
    /// free-form description given at save time
    #[serde(default)]
    pub description: String,
    /// snapshot that was current when this one was saved
    pub parent: Option<Hash>,
    /// creation time
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    /// is this the first snapshot of its lineage
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// the part of a snapshot that feeds its hash
///
/// the timestamp is not part of the identity.
#[derive(Serialize)]
pub(crate) struct SnapshotHeader<'a> {
    pub tree: &'a Tree,
    pub description: &'a str,
    pub parent: Option<Hash>,
}

impl SnapshotHeader<'_> {
    /// canonical serialized form (tree keys are already sorted)
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// format a snapshot for display
impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "snapshot {}", self.hash)?;
        if let Some(parent) = &self.parent {
            writeln!(f, "Parent: {}", parent)?;
        }
        writeln!(f, "Date:   {}", self.timestamp.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(f, "Files:  {}", self.tree.len())?;

        writeln!(f)?;
        for line in self.description.lines() {
            writeln!(f, "    {}", line)?;
        }

        Ok(())
    }
}
