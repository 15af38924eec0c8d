pub mod autosave;
pub mod config;
pub mod playback;
pub mod reveal;
pub mod save;
pub mod session;
