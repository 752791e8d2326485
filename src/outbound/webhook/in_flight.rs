use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

/// Set of attempt ids with an HTTP try currently running.
///
/// Claiming is synchronous and never held across an await, so a std mutex
/// is enough.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    ids: Arc<Mutex<HashSet<Uuid>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id`, or `None` if someone else holds it.
    pub fn claim(&self, id: Uuid) -> Option<InFlightGuard> {
        let mut ids = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        ids.insert(id).then(|| InFlightGuard {
            id,
            ids: self.ids.clone(),
        })
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&id)
    }
}

/// Releases its id when dropped
#[derive(Debug)]
pub struct InFlightGuard {
    id: Uuid,
    ids: Arc<Mutex<HashSet<Uuid>>>,
}

impl InFlightGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_is_exclusive_until_dropped() {
        let in_flight = InFlight::new();
        let id = Uuid::new_v4();

        let guard = in_flight.claim(id);
        assert!(guard.is_some());
        assert!(in_flight.claim(id).is_none());
        assert!(in_flight.contains(id));

        drop(guard);
        assert!(!in_flight.contains(id));
        assert!(in_flight.claim(id).is_some());
    }

    #[test]
    fn test_different_ids_do_not_conflict() {
        let in_flight = InFlight::new();

        let a = in_flight.claim(Uuid::new_v4());
        let b = in_flight.clone().claim(Uuid::new_v4());
        assert!(a.is_some() && b.is_some());
    }
}
