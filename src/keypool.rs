//! API key pooling and request rate limiting.
//!
//! [`KeyPool`] hands out the least-loaded key so concurrent calls spread
//! across a pool of provider keys. [`RateLimiter`] enforces a sliding-window
//! request budget with a bounded wait for a permit.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

struct KeySlot {
    key: String,
    in_flight: usize,
}

/// Pool of API keys with least-loaded selection.
#[derive(Clone)]
pub struct KeyPool {
    slots: Arc<Mutex<Vec<KeySlot>>>,
}

impl KeyPool {
    /// An empty `keys` list still yields a usable pool with one placeholder
    /// key, matching local servers that ignore authentication.
    pub fn new(keys: Vec<String>) -> Self {
        let keys = if keys.is_empty() {
            vec!["not-needed".to_string()]
        } else {
            keys
        };
        let slots = keys
            .into_iter()
            .map(|key| KeySlot { key, in_flight: 0 })
            .collect();
        Self {
            slots: Arc::new(Mutex::new(slots)),
        }
    }

    /// Borrows the key with the fewest requests in flight. The returned
    /// handle releases the slot when dropped.
    pub fn acquire(&self) -> KeyHandle {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        let (index, slot) = slots
            .iter_mut()
            .enumerate()
            .min_by_key(|(_, slot)| slot.in_flight)
            .expect("pool always holds at least one key");
        slot.in_flight += 1;
        trace!(index, in_flight = slot.in_flight, "key acquired");
        KeyHandle {
            pool: Arc::clone(&self.slots),
            index,
            key: slot.key.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn load(&self, index: usize) -> usize {
        self.slots.lock().unwrap_or_else(|p| p.into_inner())[index].in_flight
    }
}

/// An in-flight lease on one pool key.
pub struct KeyHandle {
    pool: Arc<Mutex<Vec<KeySlot>>>,
    index: usize,
    key: String,
}

impl KeyHandle {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyHandle {
    fn drop(&mut self) {
        let mut slots = self.pool.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(slot) = slots.get_mut(self.index) {
            slot.in_flight = slot.in_flight.saturating_sub(1);
        }
    }
}

/// Sliding-window rate limiter.
pub struct RateLimiter {
    capacity: usize,
    window: Duration,
    stamps: tokio::sync::Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            window,
            stamps: tokio::sync::Mutex::new(VecDeque::new()),
        }
    }

    /// Waits until a request slot opens inside the window, up to `timeout`.
    /// Returns `false` if the deadline passes first.
    pub async fn acquire_permit(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let wait = {
                let mut stamps = self.stamps.lock().await;
                let now = Instant::now();
                while let Some(front) = stamps.front() {
                    if now.duration_since(*front) >= self.window {
                        stamps.pop_front();
                    } else {
                        break;
                    }
                }
                if stamps.len() < self.capacity {
                    stamps.push_back(now);
                    return true;
                }
                // Oldest stamp decides when the next slot opens.
                let front = *stamps
                    .front()
                    .expect("queue is non-empty when at capacity");
                (front + self.window).saturating_duration_since(now)
            };
            if Instant::now() + wait > deadline {
                return false;
            }
            tokio::time::sleep(wait).await;
        }
    }
}
