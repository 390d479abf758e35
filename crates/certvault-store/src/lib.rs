//! # certvault-store
//!
//! On-disk storage layer for certvault.
//!
//! This crate provides:
//! - The container codec (directory bundles with staged, all-or-nothing writes)
//! - The record index with crash-safe JSON persistence
//! - Path resolution across the local and remote storage tiers
//! - The certificates-root scanner that rebuilds records from disk
//!
//! ## Example
//!
//! ```rust,ignore
//! use certvault_store::{container, index, IndexStore, StorageLayout};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let layout = StorageLayout::new("/data/local", None);
//!     let store = IndexStore::new();
//!
//!     let root = layout.local_certificates_root();
//!     let record = container::reconstruct_record(&root.join("finisher.cert")).await?;
//!     store.insert(record).await;
//!
//!     index::persist(&store, &root.join("certvault-index.json")).await?;
//!     Ok(())
//! }
//! ```
pub mod container;
pub mod index;
pub mod layout;
pub mod scan;

pub use index::IndexStore;
pub use layout::StorageLayout;
pub use scan::{scan_certificates_root, ScanOutcome};
