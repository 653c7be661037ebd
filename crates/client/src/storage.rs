//! Local key-value persistence for the client shell.
//!
//! The SDK needs a small amount of device-local state: the pending
//! email-link address ("sign in on this device without retyping your
//! email") and the persisted provider session. Embedders supply whatever
//! their platform offers - web localStorage, a settings file, a keychain -
//! through this trait; [`MemoryStorage`] backs tests and ephemeral shells.

use std::collections::HashMap;
use std::sync::RwLock;

/// Storage keys used by the SDK.
pub mod keys {
    /// Email awaiting an email-link round trip.
    pub const PENDING_EMAIL: &str = "prysm.auth.pendingEmail";

    /// Persisted provider session for restoration at startup.
    pub const SESSION: &str = "prysm.auth.session";
}

/// Device-local string storage.
pub trait Storage: Send + Sync + 'static {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value.
    fn set(&self, key: &str, value: &str);

    /// Delete a value.
    fn remove(&self, key: &str);
}

/// In-memory storage; state dies with the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.inner
            .read()
            .ok()
            .and_then(|map| map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(key.to_owned(), value.to_owned());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(key);
        }
    }
}
