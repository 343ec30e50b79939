//! Leaf caches written by both the dispatch loop and the inbound handler.

pub mod directory_index;
pub mod echo_cache;
pub mod recall_window;

pub use directory_index::{DirectoryEntry, DirectoryIndex};
pub use echo_cache::{EchoCache, EchoRecord};
pub use recall_window::RecallWindow;
