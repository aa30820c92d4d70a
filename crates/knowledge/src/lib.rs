//! Loreweaver knowledge base.
//!
//! Stores story settings (documents plus type metadata), embeds them
//! through a configurable backend, answers nearest-neighbor relevance
//! queries and persists everything to a single JSON snapshot. State
//! survives restarts and backend changes: a dimension mismatch on load
//! or swap triggers a transparent re-encode of all stored documents.

pub mod handle;
pub mod index;
pub mod persistence;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use handle::SharedKnowledgeBase;
pub use index::FlatIndex;
pub use persistence::{LoadedSnapshot, SnapshotStore};
pub use store::KnowledgeBase;
pub use types::SettingMetadata;
