use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

/// Hands out one mutex per business unit. Holding the guard across
/// read-max and insert makes sequence assignment linearizable per unit while
/// different units never contend.
#[derive(Default)]
pub struct SequenceAllocator {
    locks: Mutex<HashMap<Arc<str>, Arc<Mutex<()>>>>,
}

impl SequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, business_unit_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        if let Some(lock) = locks.get(business_unit_id) {
            return lock.clone();
        }
        let lock = Arc::new(Mutex::new(()));
        locks.insert(Arc::from(business_unit_id), lock.clone());
        lock
    }

    /// Runs `f` while holding the lock of `business_unit_id`.
    pub fn with_unit<T>(&self, business_unit_id: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(business_unit_id);
        let _guard: MutexGuard<'_, ()> = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f()
    }
}
