//! high-level operations on snapshot repositories

mod diff;
mod load;
mod log;
mod open;
mod save;
mod status;
mod verify;

pub use diff::diff_trees;
pub use load::LoadOutcome;
pub use save::SaveOutcome;
pub use verify::{MissingBlob, VerifyReport};

pub(crate) use diff::diff;
pub(crate) use load::load_snapshot;
pub(crate) use log::{ancestry, history};
pub(crate) use open::open_file;
pub(crate) use save::save_snapshot;
pub(crate) use status::{has_unsaved_changes, status};
pub(crate) use verify::verify;
