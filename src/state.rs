//! Shared application state.
//!
//! The store, blob, and presence handles are explicit dependencies bundled
//! here and passed to every session at construction, so tests can inject
//! in-memory fakes. Nothing in the crate reaches for a global.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::blob::BlobStore;
use crate::config::AssetUrls;
use crate::registry::Registry;
use crate::security::PasswordHasher;
use crate::store::AccountStore;

pub struct AppState {
    pub store: Arc<dyn AccountStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub registry: Registry,
    pub hasher: PasswordHasher,
    pub assets: AssetUrls,
    start_time: u64,
}

impl AppState {
    pub fn new(
        store: Arc<dyn AccountStore>,
        blobs: Arc<dyn BlobStore>,
        assets: AssetUrls,
    ) -> Self {
        Self {
            store,
            blobs,
            registry: Registry::new(),
            hasher: PasswordHasher::new(),
            assets,
            start_time: now_secs(),
        }
    }

    pub fn uptime(&self) -> u64 {
        now_secs().saturating_sub(self.start_time)
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// Shared application state type
pub type SharedState = Arc<AppState>;
