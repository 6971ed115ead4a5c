//! Key-value backend contract.

use anyhow::Result;

/// Durable string-keyed text storage.
///
/// Every `write` replaces the previous value for the key in full. Calls are
/// synchronous and cheap enough to run on every timer tick.
pub trait KeyValueBackend: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>>;

    fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}
