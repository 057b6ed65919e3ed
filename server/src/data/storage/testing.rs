//! Test fixtures for the storage layer

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::memory::MemoryStorage;
use super::objects::ObjectStore;
use super::verify::{BackoffPolicy, Sleeper, Verifier};

pub const CDN_BASE: &str = "https://cdn.test";

/// Records requested delays instead of sleeping
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().push(duration);
    }
}

/// Object store over the given memory backend with default backoff and no real sleeps
pub fn store_with(storage: Arc<MemoryStorage>) -> (ObjectStore, Arc<RecordingSleeper>) {
    let sleeper = Arc::new(RecordingSleeper::default());
    let verifier = Verifier::new(storage.clone(), sleeper.clone(), BackoffPolicy::default());
    (ObjectStore::new(storage, verifier, CDN_BASE), sleeper)
}
