//! Story Player — playback engine for generated branching visual novels.
//!
//! Walks a Story Document scene by scene and line by line, gates choices
//! on the player's relationships, inventory and skills, and applies choice
//! deltas to those ledgers. Presentation and persistence are left to the
//! host; the [`core::session::PlayerSession`] ties the engine to a text
//! reveal, a debounced autosave and a pluggable save store.

pub mod core;
pub mod schema;
