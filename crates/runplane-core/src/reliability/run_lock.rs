//! The in-memory run lock (spec §4.7, §9 supplemented feature): prevents two
//! workers from concurrently mutating the same run. TTL-bounded so a
//! crashed holder doesn't wedge a run forever; release is a no-op unless
//! the caller presents the token it was granted.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use uuid::Uuid;

pub trait RunLock: Send + Sync {
    fn try_acquire(&self, run_id: &str, ttl: Duration, now: Instant) -> Option<String>;
    fn release(&self, run_id: &str, token: &str, now: Instant);
}

struct Held {
    token: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct InMemoryRunLock {
    held: Mutex<HashMap<String, Held>>,
}

impl InMemoryRunLock {
    pub fn new() -> Self {
        Self {
            held: Mutex::new(HashMap::new()),
        }
    }
}

impl RunLock for InMemoryRunLock {
    fn try_acquire(&self, run_id: &str, ttl: Duration, now: Instant) -> Option<String> {
        let mut held = self.held.lock().expect("run lock mutex poisoned");
        if let Some(existing) = held.get(run_id) {
            if existing.expires_at > now {
                return None;
            }
        }
        let token = Uuid::new_v4().to_string();
        held.insert(
            run_id.to_string(),
            Held {
                token: token.clone(),
                expires_at: now + ttl,
            },
        );
        Some(token)
    }

    fn release(&self, run_id: &str, token: &str, now: Instant) {
        let mut held = self.held.lock().expect("run lock mutex poisoned");
        if let Some(existing) = held.get(run_id) {
            if existing.token == token || existing.expires_at <= now {
                held.remove(run_id);
            }
        }
    }
}
