//! # certvault-core
//!
//! Core types, traits, and abstractions for the certvault library.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the certvault store and sync crates depend on.

pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod media;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use events::{EventBus, SyncEvent};
pub use media::{detect_media_kind, kind_from_extension, sanitize_folder_name};
pub use models::*;
pub use traits::{ActivityDirectory, NoActivityDirectory};
