//! # messy-client
//!
//! reqwest implementation of [`messy_core::NotesApi`] for the Messy Notes
//! service.
//!
//! This crate provides:
//! - Environment-driven client configuration
//! - Bearer authentication through a pluggable [`messy_core::TokenProvider`]
//! - HTTP status classification into the core error taxonomy
//! - Bounded retry with exponential backoff for transient failures
//!
//! # Example
//!
//! ```rust,no_run
//! use messy_client::HttpNotesClient;
//! use messy_core::NotesApi;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = HttpNotesClient::from_env().unwrap();
//!     let notes = client.list_notes().await.unwrap();
//!     println!("{} notes", notes.len());
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod retry;

pub use client::HttpNotesClient;
pub use config::ClientConfig;
pub use error::ApiErrorCode;
pub use retry::{Replay, RetryPolicy};
