//! Model artifact persistence
//!
//! Every fitted classifier is saved as one [`ModelArtifact`] keyed by
//! (classifier type, fold index). On disk each artifact is a bincode payload
//! wrapped in an envelope carrying magic bytes, a format version and an FNV-1a
//! checksum, written atomically through a temporary sibling file.

mod artifact;
mod store;

pub use artifact::ModelArtifact;
pub use store::{ArtifactStore, DirectoryStore, MemoryStore};
