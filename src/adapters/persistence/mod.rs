//! Persistence Adapters - File-based Storage
//!
//! Implements the Repository port with atomic JSON cursor checkpoints
//! and an append-only JSONL trade archive, plus the file-backed model
//! artifact store. No database dependency.

pub mod archive;
pub mod artifact;
pub mod checkpoint;
pub mod repository_impl;

pub use archive::TradeArchive;
pub use artifact::{load_artifact, FileModelStore};
pub use checkpoint::CheckpointStore;
pub use repository_impl::RepositoryImpl;
