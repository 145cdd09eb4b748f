//! Per-object lock manager with deadlock detection.

use crate::config::DeadlockPolicy;
use crate::error::{CoreError, CoreResult};
use crate::types::{ObjectId, TxId};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

/// State of one object's lock.
///
/// A lock is exclusive: at most one holder at any instant. Waiters queue
/// in FIFO order and are granted in that order; the record is dropped from
/// the table once it has no holder and no waiters.
#[derive(Debug, Default)]
struct LockState {
    holder: Option<TxId>,
    queue: VecDeque<TxId>,
}

/// Lock table plus the wait-for bookkeeping that shares its mutex.
///
/// A blocked transaction waits on exactly one object at a time, so the
/// wait-for graph is a partial function `TxId -> ObjectId` and cycle
/// detection is a chain walk over holders. Keeping the graph under the
/// same mutex as the lock states means the two can never disagree.
#[derive(Debug, Default)]
struct LockTable {
    locks: HashMap<ObjectId, LockState>,
    /// Blocked transaction -> the object it waits on.
    waits_for: HashMap<TxId, ObjectId>,
    /// Holder -> every object it currently holds.
    held_by: HashMap<TxId, HashSet<ObjectId>>,
    /// Transactions marked to fail their pending acquisition.
    victims: HashSet<TxId>,
}

impl LockTable {
    /// Walks the holder chain starting from `id` and returns the cycle
    /// participants if granting `tx` would close a cycle.
    ///
    /// The walk follows: holder of the requested lock, then the lock that
    /// holder waits on, then its holder, and so on. It terminates because
    /// each transaction waits on at most one lock and visited holders are
    /// tracked.
    fn find_cycle(&self, tx: TxId, id: ObjectId) -> Option<Vec<TxId>> {
        let mut participants = vec![tx];
        let mut visited = HashSet::from([tx]);
        let mut current = id;

        loop {
            let holder = self.locks.get(&current).and_then(|state| state.holder)?;
            if holder == tx {
                return Some(participants);
            }
            if !visited.insert(holder) {
                // A cycle not involving the requester; its own members
                // resolve it.
                return None;
            }
            participants.push(holder);
            current = *self.waits_for.get(&holder)?;
        }
    }

    /// Records `tx` as holding `id`.
    fn record_grant(&mut self, tx: TxId, id: ObjectId) {
        self.held_by.entry(tx).or_default().insert(id);
    }

    /// Hands the lock to the next surviving waiter, or frees it.
    ///
    /// Marked victims are skipped; they fail their acquisition when they
    /// wake. Returns `true` if the lock record should be dropped.
    fn grant_next(&mut self, id: ObjectId) -> bool {
        let Some(state) = self.locks.get_mut(&id) else {
            return false;
        };
        state.holder = None;

        while let Some(next) = state.queue.pop_front() {
            if self.victims.contains(&next) {
                continue;
            }
            state.holder = Some(next);
            self.waits_for.remove(&next);
            self.held_by.entry(next).or_default().insert(id);
            return false;
        }
        true
    }

    /// Removes a failed waiter's bookkeeping.
    fn remove_waiter(&mut self, tx: TxId, id: ObjectId) {
        if let Some(state) = self.locks.get_mut(&id) {
            state.queue.retain(|waiter| *waiter != tx);
            if state.holder.is_none() && state.queue.is_empty() {
                self.locks.remove(&id);
            }
        }
        self.waits_for.remove(&tx);
    }
}

/// Mediates exclusive access to object IDs across transactions.
///
/// Responsibilities:
/// - block a requester until it holds the lock, in FIFO order per object
/// - detect wait-for cycles *before* the requester queues, and fail a
///   victim so every cycle dissolves
/// - honor an optional acquisition deadline, surfacing expiry as the same
///   deadlock error
///
/// The manager never calls out (in particular, never into the shared
/// cache) while holding its internal mutex.
#[derive(Debug)]
pub struct LockManager {
    policy: DeadlockPolicy,
    timeout: Duration,
    table: Mutex<LockTable>,
    changed: Condvar,
}

impl LockManager {
    /// Creates a lock manager.
    ///
    /// `timeout` bounds each acquisition; `Duration::ZERO` waits forever.
    #[must_use]
    pub fn new(policy: DeadlockPolicy, timeout: Duration) -> Self {
        Self {
            policy,
            timeout,
            table: Mutex::new(LockTable::default()),
            changed: Condvar::new(),
        }
    }

    /// Blocks until `tx` holds the lock on `id`.
    ///
    /// Already-held locks are granted again immediately. If granting would
    /// close a wait-for cycle, a victim is chosen by the configured policy;
    /// a victimized requester fails without ever queuing.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Deadlock`] if `tx` is victimized by cycle
    /// detection or by deadline expiry.
    pub fn acquire(&self, tx: TxId, id: ObjectId) -> CoreResult<()> {
        let mut table = self.table.lock();

        let state = table.locks.entry(id).or_default();
        match state.holder {
            None => {
                debug_assert!(state.queue.is_empty(), "free lock has no waiters");
                state.holder = Some(tx);
                table.record_grant(tx, id);
                return Ok(());
            }
            Some(holder) if holder == tx => return Ok(()),
            Some(_) => {}
        }

        // The acquisition would block: check for a cycle first.
        if let Some(participants) = table.find_cycle(tx, id) {
            let victim = match self.policy {
                DeadlockPolicy::RequesterVictim => tx,
                DeadlockPolicy::DeterministicVictim => {
                    participants.iter().max().copied().unwrap_or(tx)
                }
            };
            tracing::debug!(%victim, requester = %tx, %id, "deadlock cycle broken");
            if victim == tx {
                return Err(CoreError::deadlock(tx, id));
            }
            table.victims.insert(victim);
            self.changed.notify_all();
        }

        table.locks.entry(id).or_default().queue.push_back(tx);
        table.waits_for.insert(tx, id);

        let deadline = (self.timeout > Duration::ZERO).then(|| Instant::now() + self.timeout);

        loop {
            let timed_out = match deadline {
                Some(deadline) => self.changed.wait_until(&mut table, deadline).timed_out(),
                None => {
                    self.changed.wait(&mut table);
                    false
                }
            };

            if table.victims.remove(&tx) {
                table.remove_waiter(tx, id);
                return Err(CoreError::deadlock(tx, id));
            }
            let granted = table
                .locks
                .get(&id)
                .is_some_and(|state| state.holder == Some(tx));
            if granted {
                return Ok(());
            }
            if timed_out {
                tracing::debug!(%tx, %id, "lock acquisition timed out");
                table.remove_waiter(tx, id);
                return Err(CoreError::deadlock(tx, id));
            }
        }
    }

    /// Releases every lock held by `tx`, waking successors in FIFO order.
    ///
    /// Safe to call for a transaction holding nothing.
    pub fn release_all(&self, tx: TxId) {
        let mut table = self.table.lock();
        let Some(held) = table.held_by.remove(&tx) else {
            return;
        };

        for id in held {
            if table
                .locks
                .get(&id)
                .is_some_and(|state| state.holder == Some(tx))
                && table.grant_next(id)
            {
                table.locks.remove(&id);
            }
        }
        drop(table);
        self.changed.notify_all();
    }

    /// Returns `true` if `tx` currently holds the lock on `id`.
    #[must_use]
    pub fn holds(&self, tx: TxId, id: ObjectId) -> bool {
        self.table
            .lock()
            .held_by
            .get(&tx)
            .is_some_and(|ids| ids.contains(&id))
    }

    /// Returns the number of locks currently held by `tx`.
    #[must_use]
    pub fn held_count(&self, tx: TxId) -> usize {
        self.table.lock().held_by.get(&tx).map_or(0, HashSet::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn manager(policy: DeadlockPolicy) -> LockManager {
        LockManager::new(policy, Duration::ZERO)
    }

    #[test]
    fn acquire_free_lock() {
        let lm = manager(DeadlockPolicy::RequesterVictim);
        lm.acquire(TxId::new(1), ObjectId::new(7)).unwrap();
        assert!(lm.holds(TxId::new(1), ObjectId::new(7)));
    }

    #[test]
    fn reacquire_is_idempotent() {
        let lm = manager(DeadlockPolicy::RequesterVictim);
        lm.acquire(TxId::new(1), ObjectId::new(7)).unwrap();
        lm.acquire(TxId::new(1), ObjectId::new(7)).unwrap();
        assert_eq!(lm.held_count(TxId::new(1)), 1);
    }

    #[test]
    fn release_all_frees_everything() {
        let lm = manager(DeadlockPolicy::RequesterVictim);
        lm.acquire(TxId::new(1), ObjectId::new(1)).unwrap();
        lm.acquire(TxId::new(1), ObjectId::new(2)).unwrap();

        lm.release_all(TxId::new(1));
        assert_eq!(lm.held_count(TxId::new(1)), 0);
        assert!(!lm.holds(TxId::new(1), ObjectId::new(1)));
    }

    #[test]
    fn release_all_without_locks_is_noop() {
        let lm = manager(DeadlockPolicy::RequesterVictim);
        lm.release_all(TxId::new(9));
    }

    #[test]
    fn blocked_acquire_waits_for_release() {
        let lm = Arc::new(manager(DeadlockPolicy::RequesterVictim));
        let id = ObjectId::new(7);
        lm.acquire(TxId::new(1), id).unwrap();

        let lm2 = Arc::clone(&lm);
        let handle = thread::spawn(move || lm2.acquire(TxId::new(2), id));

        // Give the second transaction time to queue, then release.
        thread::sleep(Duration::from_millis(50));
        lm.release_all(TxId::new(1));

        handle.join().unwrap().unwrap();
        assert!(lm.holds(TxId::new(2), id));
    }

    #[test]
    fn waiters_are_granted_in_fifo_order() {
        let lm = Arc::new(manager(DeadlockPolicy::RequesterVictim));
        let id = ObjectId::new(7);
        lm.acquire(TxId::new(1), id).unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();

        for n in 2..=4u64 {
            let lm = Arc::clone(&lm);
            let order = Arc::clone(&order);
            handles.push(thread::spawn(move || {
                let tx = TxId::new(n);
                lm.acquire(tx, id).unwrap();
                order.lock().push(tx);
                lm.release_all(tx);
            }));
            // Stagger arrivals so the queue order is deterministic.
            thread::sleep(Duration::from_millis(50));
        }

        lm.release_all(TxId::new(1));
        for h in handles {
            h.join().unwrap();
        }

        let order = order.lock();
        assert_eq!(order.as_slice(), &[TxId::new(2), TxId::new(3), TxId::new(4)]);
    }

    #[test]
    fn two_party_deadlock_fails_requester() {
        let lm = Arc::new(manager(DeadlockPolicy::RequesterVictim));
        let (a, b) = (ObjectId::new(1), ObjectId::new(2));
        lm.acquire(TxId::new(1), a).unwrap();
        lm.acquire(TxId::new(2), b).unwrap();

        let lm2 = Arc::clone(&lm);
        let blocked = thread::spawn(move || lm2.acquire(TxId::new(2), a));
        thread::sleep(Duration::from_millis(50));

        // Closing the cycle fails immediately, without queuing.
        let result = lm.acquire(TxId::new(1), b);
        assert!(matches!(result, Err(CoreError::Deadlock { .. })));

        // The victim's release lets the survivor proceed.
        lm.release_all(TxId::new(1));
        blocked.join().unwrap().unwrap();
        assert!(lm.holds(TxId::new(2), a));
    }

    #[test]
    fn three_party_cycle_is_detected() {
        let lm = Arc::new(manager(DeadlockPolicy::RequesterVictim));
        let ids = [ObjectId::new(1), ObjectId::new(2), ObjectId::new(3)];
        for (n, id) in ids.iter().enumerate() {
            lm.acquire(TxId::new(n as u64 + 1), *id).unwrap();
        }

        // 2 waits on 1's lock, 3 waits on 2's lock.
        let lm2 = Arc::clone(&lm);
        let h2 = thread::spawn(move || lm2.acquire(TxId::new(2), ObjectId::new(1)));
        let lm3 = Arc::clone(&lm);
        let h3 = thread::spawn(move || lm3.acquire(TxId::new(3), ObjectId::new(2)));
        thread::sleep(Duration::from_millis(50));

        // 1 -> 3 closes the three-party cycle.
        let result = lm.acquire(TxId::new(1), ids[2]);
        assert!(matches!(result, Err(CoreError::Deadlock { .. })));

        // Unwinding the chain in order lets both waiters through.
        lm.release_all(TxId::new(1));
        h2.join().unwrap().unwrap();
        lm.release_all(TxId::new(2));
        h3.join().unwrap().unwrap();
        lm.release_all(TxId::new(3));
    }

    #[test]
    fn waiting_without_cycle_is_not_deadlock() {
        let lm = Arc::new(manager(DeadlockPolicy::RequesterVictim));
        let (a, b) = (ObjectId::new(1), ObjectId::new(2));
        lm.acquire(TxId::new(1), a).unwrap();
        lm.acquire(TxId::new(2), b).unwrap();

        // 2 waits on a: a chain, not a cycle.
        let lm2 = Arc::clone(&lm);
        let chain = thread::spawn(move || lm2.acquire(TxId::new(2), a));
        thread::sleep(Duration::from_millis(50));

        lm.release_all(TxId::new(1));
        chain.join().unwrap().unwrap();
    }

    #[test]
    fn deterministic_policy_victimizes_youngest() {
        let lm = Arc::new(manager(DeadlockPolicy::DeterministicVictim));
        let (a, b) = (ObjectId::new(1), ObjectId::new(2));
        // The older transaction (1) holds a; the younger (2) holds b.
        lm.acquire(TxId::new(1), a).unwrap();
        lm.acquire(TxId::new(2), b).unwrap();

        let lm2 = Arc::clone(&lm);
        let young = thread::spawn(move || lm2.acquire(TxId::new(2), a));
        thread::sleep(Duration::from_millis(50));

        // The old transaction closes the cycle; the youngest participant
        // (2) is the victim, so 1 queues and eventually wins.
        let lm3 = Arc::clone(&lm);
        let old = thread::spawn(move || lm3.acquire(TxId::new(1), b));

        let result = young.join().unwrap();
        assert!(matches!(result, Err(CoreError::Deadlock { .. })));

        lm.release_all(TxId::new(2));
        old.join().unwrap().unwrap();
        assert!(lm.holds(TxId::new(1), b));
    }

    #[test]
    fn timeout_surfaces_as_deadlock() {
        let lm = Arc::new(LockManager::new(
            DeadlockPolicy::RequesterVictim,
            Duration::from_millis(50),
        ));
        let id = ObjectId::new(7);
        lm.acquire(TxId::new(1), id).unwrap();

        let lm2 = Arc::clone(&lm);
        let handle = thread::spawn(move || lm2.acquire(TxId::new(2), id));
        let result = handle.join().unwrap();
        assert!(matches!(result, Err(CoreError::Deadlock { .. })));

        // The expired waiter left the queue: release grants nobody and a
        // fresh acquire succeeds at once.
        lm.release_all(TxId::new(1));
        lm.acquire(TxId::new(3), id).unwrap();
    }

    #[test]
    fn contended_lock_changes_hands_many_times() {
        let lm = Arc::new(manager(DeadlockPolicy::RequesterVictim));
        let id = ObjectId::new(7);
        let counter = Arc::new(AtomicUsize::new(0));

        let barrier = Arc::new(Barrier::new(8));
        let mut handles = Vec::new();
        for n in 0..8u64 {
            let lm = Arc::clone(&lm);
            let counter = Arc::clone(&counter);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                for round in 0..50 {
                    let tx = TxId::new(1 + n + round * 8);
                    lm.acquire(tx, id).unwrap();
                    counter.fetch_add(1, Ordering::SeqCst);
                    lm.release_all(tx);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 400);
    }
}
