//! Guards against a second click on a control whose request is still pending.
//! The first request always runs to completion; the duplicate is turned away.
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct InFlight {
    keys: Arc<Mutex<HashSet<String>>>,
}

/// Held while an action runs; releases its key when dropped.
pub struct InFlightPermit {
    keys: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` if an action with the same key is already running.
    pub fn try_acquire(&self, key: impl Into<String>) -> Option<InFlightPermit> {
        let key = key.into();
        let mut keys = self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !keys.insert(key.clone()) {
            tracing::debug!("Rejected duplicate action {}", key);
            return None;
        }
        Some(InFlightPermit {
            keys: self.keys.clone(),
            key,
        })
    }

    pub fn is_busy(&self, key: &str) -> bool {
        self.keys
            .lock()
            .map(|keys| keys.contains(key))
            .unwrap_or(false)
    }
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        let mut keys = self.keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        keys.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_rejected_until_released() {
        let guard = InFlight::new();

        let permit = guard.try_acquire("wizard:1:next");
        assert!(permit.is_some());
        assert!(guard.is_busy("wizard:1:next"));
        assert!(guard.try_acquire("wizard:1:next").is_none());

        // Different control should work
        assert!(guard.try_acquire("wizard:2:next").is_some());

        drop(permit);
        assert!(!guard.is_busy("wizard:1:next"));
        assert!(guard.try_acquire("wizard:1:next").is_some());
    }

    #[tokio::test]
    async fn test_permit_released_across_tasks() {
        let guard = InFlight::new();
        let permit = guard.try_acquire("toggle:License").unwrap();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            drop(permit);
        });
        assert!(guard.is_busy("toggle:License"));
        handle.await.unwrap();
        assert!(!guard.is_busy("toggle:License"));
    }
}
