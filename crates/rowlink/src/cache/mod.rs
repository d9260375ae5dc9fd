//! # The cache boundary
//!
//! The pipeline checks a [`Cache`] before calling the lookup client and
//! populates it after a successful lookup (cache-aside). Caching is optional:
//! the pipeline takes `Option<C>` and absence disables the layer without any
//! behavioral difference beyond the extra lookups.
//!
//! Implementations must tolerate concurrent `get`/`set` from many tasks.
//! Cache failures are never fatal to a task: the caller logs them and treats
//! the access as a miss.

mod memory;

pub use memory::*;

use core::future::Future;

/// Composes the cache key for `key` under a namespace `prefix`, keeping an
/// application's entries apart from other users of a shared backend.
pub fn namespaced(prefix: &str, key: &str) -> String {
    format!("{prefix}:{key}")
}

/// String key/value store consulted before the external lookup.
pub trait Cache: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetches the cached value for `key`; `Ok(None)` is a miss.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = core::result::Result<Option<String>, Self::Error>> + Send;

    /// Stores `value` under `key`.
    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = core::result::Result<(), Self::Error>> + Send;
}
