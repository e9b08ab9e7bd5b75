mod diff;
mod snapshot;
mod tree;

pub use diff::{ChangeKind, DiffEntry};
pub(crate) use snapshot::SnapshotHeader;
pub use snapshot::Snapshot;
pub use tree::{normalize_path, Tree};
