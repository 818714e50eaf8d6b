//! voxbatch - Batch text-to-speech with voice cloning
//!
//! Turns lists of sentences into audio files. Each item is routed to the
//! best available synthesis engine; when cloning is requested the primary
//! engine speaks in the reference voice, and a single plain fallback engine
//! keeps the batch going when it cannot.

pub mod audio;
pub mod batch;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod input;
pub mod language;
pub mod platform;

pub use error::{FailureKind, Result, VoxError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "voxbatch";
