//! Single-writer gate shared by the storage backends.
//!
//! At most one transaction is open at a time and it belongs to the thread that
//! began it. Other threads entering the gate wait until it ends, so their
//! writes are never folded into, or undone by, someone else's transaction.

use std::{
    sync::{Condvar, Mutex, MutexGuard},
    thread::{self, ThreadId},
};

use crate::storage::{StorageError, TransactionId};

struct OpenTransaction<S> {
    id: TransactionId,
    owner: ThreadId,
    state: S,
}

/// `S` is whatever the backend must keep until the transaction ends, such as
/// a rollback snapshot.
pub struct TransactionGate<S = ()> {
    open: Mutex<Option<OpenTransaction<S>>>,
    released: Condvar,
}

/// Held for the duration of one backend call. While it lives no transaction
/// can begin or end.
pub struct GatePass<'a, S>(#[allow(dead_code)] MutexGuard<'a, Option<OpenTransaction<S>>>);

impl<S> Default for TransactionGate<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> TransactionGate<S> {
    pub fn new() -> Self {
        Self {
            open: Mutex::new(None),
            released: Condvar::new(),
        }
    }

    fn wait_turn(&self) -> MutexGuard<'_, Option<OpenTransaction<S>>> {
        let me = thread::current().id();
        let open = self.open.lock().unwrap();
        self.released
            .wait_while(open, |open| open.as_ref().is_some_and(|tx| tx.owner != me))
            .unwrap()
    }

    /// Waits until no other thread's transaction is open.
    pub fn enter(&self) -> GatePass<'_, S> {
        GatePass(self.wait_turn())
    }

    /// Opens transaction `id` for the calling thread once the gate is free.
    /// `start` runs with the gate held and yields the state kept until the end.
    pub fn begin(&self, id: TransactionId, start: impl FnOnce() -> Result<S, StorageError>) -> Result<(), StorageError> {
        let mut open = self.wait_turn();
        if open.is_some() {
            return Err(StorageError::TransactionInProgress);
        }
        let state = start()?;
        *open = Some(OpenTransaction {
            id,
            owner: thread::current().id(),
            state,
        });
        Ok(())
    }

    /// Closes transaction `id`, handing its state to `finish` before waiting
    /// threads are released. The gate reopens even when `finish` fails.
    pub fn end<T>(&self, id: TransactionId, finish: impl FnOnce(S) -> Result<T, StorageError>) -> Result<T, StorageError> {
        let mut open = self.open.lock().unwrap();
        let tx = match open.take() {
            Some(tx) if tx.id == id => tx,
            other => {
                *open = other;
                return Err(StorageError::NoActiveTransaction);
            }
        };
        let result = finish(tx.state);
        self.released.notify_all();
        result
    }

    pub fn is_open(&self) -> bool {
        self.open.lock().unwrap().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        time::Duration,
    };

    #[test]
    fn test_nested_begin_is_rejected() {
        let gate: TransactionGate = TransactionGate::new();
        gate.begin(1, || Ok(())).unwrap();
        assert!(matches!(gate.begin(2, || Ok(())), Err(StorageError::TransactionInProgress)));
        let _pass = gate.enter();
    }

    #[test]
    fn test_end_requires_matching_id() {
        let gate: TransactionGate<u32> = TransactionGate::new();
        gate.begin(7, || Ok(42)).unwrap();
        assert!(matches!(gate.end(8, |_| Ok(())), Err(StorageError::NoActiveTransaction)));
        assert_eq!(gate.end(7, Ok).unwrap(), 42);
        assert!(!gate.is_open());
        assert!(matches!(gate.end(7, |_| Ok(())), Err(StorageError::NoActiveTransaction)));
    }

    #[test]
    fn test_other_threads_wait_for_open_transaction() {
        let gate: Arc<TransactionGate> = Arc::new(TransactionGate::new());
        let entered = Arc::new(AtomicBool::new(false));
        gate.begin(1, || Ok(())).unwrap();

        let waiter = {
            let gate = gate.clone();
            let entered = entered.clone();
            thread::spawn(move || {
                let _pass = gate.enter();
                entered.store(true, Ordering::SeqCst);
            })
        };
        thread::sleep(Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst));

        gate.end(1, |_| Ok(())).unwrap();
        waiter.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
    }

    #[test]
    fn test_failed_start_leaves_gate_free() {
        let gate: TransactionGate = TransactionGate::new();
        let err = gate.begin(1, || Err(StorageError::Unavailable("down".into()))).unwrap_err();
        assert!(matches!(err, StorageError::Unavailable(_)));
        assert!(!gate.is_open());
    }
}
