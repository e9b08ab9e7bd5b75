//! snapstore - per-directory snapshot store
//!
//! a content-addressed, git-like version store scoped to a single directory.
//! every tracked folder carries its own store in a reserved `.vcs`
//! subdirectory and can be checkpointed, diffed, and restored.
//!
//! # Core concepts
//!
//! - **Blob**: raw file bytes, named by their SHA-256 (stored once, deduplicated)
//! - **Tree**: mapping of relative path to blob hash, iterated in path order
//! - **Snapshot**: an immutable checkpoint of a tree with description, parent and time
//! - **Current**: the one mutable pointer, naming the snapshot last saved or loaded
//!
//! # On-disk layout
//!
//! ```text
//! <root>/.vcs/
//!     config.toml      repository configuration
//!     meta             {"current": <hex> | null}
//!     snapshots/<hex>  one JSON record per snapshot
//!     blobs/<hex>      file contents
//!     tmp/             staging for atomic writes
//! ```
//!
//! # Hash format
//!
//! snapshot hash = SHA256(for each file in path order: len | content, then
//! len | header), where header is the JSON of `{tree, description, parent}`.
//! the timestamp is not part of the identity.
//!
//! # Example usage
//!
//! ```no_run
//! use snapstore::{Repository, SaveOutcome};
//!
//! let repo = Repository::open("/path/to/image-1").unwrap();
//!
//! // checkpoint the directory
//! if let SaveOutcome::Saved(hash) = repo.save_snapshot("initial").unwrap() {
//!     // ... edit files ...
//!
//!     // put everything back
//!     repo.load_snapshot(&hash).unwrap();
//! }
//! ```

mod config;
mod error;
mod hash;
mod index;
mod meta;
mod object;
mod ops;
mod repo;

pub mod fs;
pub mod project;
pub mod types;

pub use config::{Config, FORMAT_VERSION};
pub use error::{Error, Result};
pub use hash::{compute_blob_hash, BlobHasher, Hash, SnapshotHasher};
pub use index::SnapshotIndex;
pub use meta::RepositoryMeta;
pub use object::{read_snapshot, ContentStore};
pub use ops::{diff_trees, LoadOutcome, MissingBlob, SaveOutcome, VerifyReport};
pub use project::{Project, TrackedImage};
pub use repo::{Repository, STORE_DIR};
pub use types::{normalize_path, ChangeKind, DiffEntry, Snapshot, Tree};
