//! Data persistence layer.
//!
//! Progress is kept in a plain key-value backend (one text value per key) and
//! encoded by [`ProgressStore`], which is the only component that knows the
//! key scheme and the JSON layout.

pub mod backend;
pub mod memory;
pub mod progress_store;
pub mod sqlite;

pub use backend::KeyValueBackend;
pub use memory::MemoryBackend;
pub use progress_store::{completed_key, progress_key, ProgressStore};
pub use sqlite::SqliteBackend;
