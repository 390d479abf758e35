//! # certvault-sync
//!
//! Remote discovery and the synchronization orchestrator for certvault.
//!
//! This crate provides:
//! - The remote provider abstraction and the synced-drive implementation
//! - The discovery machine that converges on what the drive holds
//! - The orchestrator tying discovery, scanning, the index, and moves
//!   into crash-tolerant synchronization passes
//! - Tier moves that never leave a document half-relocated
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use certvault_core::traits::NoActivityDirectory;
//! use certvault_sync::{SyncConfig, SyncOrchestrator, SyncedDriveProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig::from_env();
//!     let provider = Arc::new(
//!         SyncedDriveProvider::new("/mnt/drive").with_batch_size(config.discovery_batch_size),
//!     );
//!     let orchestrator = Arc::new(SyncOrchestrator::new(
//!         config,
//!         provider,
//!         Arc::new(NoActivityDirectory),
//!     ));
//!
//!     let handle = orchestrator.clone().start();
//!     handle.trigger_sync()?;
//!
//!     let mut events = handle.events();
//!     println!("{:?}", events.recv().await?);
//!     Ok(())
//! }
//! ```
pub mod config;
pub mod discovery;
pub mod mover;
pub mod orchestrator;
pub mod test_fixtures;

pub use config::SyncConfig;
pub use discovery::{
    DiscoveryPhase, DiscoverySnapshot, RemoteDiscovery, RemoteProvider, SyncedDriveProvider,
};
pub use mover::{move_all_to, move_document, MoveReport};
pub use orchestrator::{SyncHandle, SyncOrchestrator, SyncReport};
