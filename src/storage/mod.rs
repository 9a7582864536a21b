//! Local blob layout and S3-compatible object-store client (§6 "External
//! Interfaces", §5 "Shared resources": a single object-store client per
//! process, reused).

pub mod blob;
pub mod object_store;

pub use blob::BlobLayout;
pub use object_store::{ObjectStore, S3ObjectStore};
