//! # messy-core
//!
//! Core types, traits, and abstractions for the Messy Notes client.
//!
//! This crate provides the note data model, the error taxonomy, the
//! remote API contract, and the local media helpers that the client and
//! store crates build on.

pub mod defaults;
pub mod error;
pub mod media;
pub mod models;
pub mod tags;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use media::{CaptureDevice, CaptureSession, MediaLibrary};
pub use models::*;
pub use tags::TagAliases;
pub use traits::*;
