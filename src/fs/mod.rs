pub mod scan;
pub mod write;

pub use scan::TreeScanner;
pub use write::{fsync_dir, fsync_file, remove_file_and_prune, replace_file};
