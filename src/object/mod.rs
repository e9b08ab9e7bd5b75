pub mod blob;
pub mod snapshot;

pub use blob::ContentStore;
pub use snapshot::{load_snapshots, read_snapshot, snapshot_path, write_snapshot};
