//! # messy-store
//!
//! Client-side note state for the Messy Notes front end.
//!
//! - [`NoteStore`]: ordered, most-recent-first collection with optimistic
//!   placeholders reconciled by correlation token
//! - [`NoteService`]: drives the store from a [`messy_core::NotesApi`] and
//!   publishes [`NoteEvent`]s
//! - [`Conversation`]: the assistant chat log

pub mod chat;
pub mod events;
pub mod service;
pub mod store;

pub use chat::Conversation;
pub use events::{EventBus, NoteEvent};
pub use service::NoteService;
pub use store::{NoteStore, Resolution};
