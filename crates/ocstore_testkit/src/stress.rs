//! Multi-threaded lock-contention stress harness.

use crate::generators::seeded_rng;
use ocstore_core::{CachingStore, ObjectId};
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

/// Totals from one stress run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressOutcome {
    /// Transactions that committed.
    pub commits: u64,
    /// Transactions victimized and retried.
    pub deadlocks: u64,
}

/// Seeds `count` objects into the store, one committed transaction.
///
/// Returns the created IDs. Panics on failure; this is test scaffolding.
pub fn seed_objects(store: &CachingStore, count: usize) -> Vec<ObjectId> {
    let mut txn = store.transaction().expect("begin seed");
    let ids = (0..count)
        .map(|i| {
            txn.create(format!("seed-{i}").into_bytes(), &format!("stress-{i}"))
                .expect("seed create")
        })
        .collect();
    txn.commit().expect("seed commit");
    ids
}

/// Drives `threads` workers, each running `rounds` transactions that lock
/// two random objects in random order and rewrite one of them.
///
/// Random lock order makes deadlocks likely; victims abort and the round
/// retries with a fresh transaction, so every round eventually commits.
/// The harness asserts that no locks leak: after the run a single
/// transaction can still lock every object.
pub fn run_lock_stress(
    store: &CachingStore,
    ids: &[ObjectId],
    threads: usize,
    rounds: usize,
    seed: u64,
) -> StressOutcome {
    assert!(ids.len() >= 2, "stress needs at least two objects");

    let commits = AtomicU64::new(0);
    let deadlocks = AtomicU64::new(0);

    thread::scope(|scope| {
        for worker in 0..threads {
            let commits = &commits;
            let deadlocks = &deadlocks;
            scope.spawn(move || {
                let mut rng = seeded_rng(seed.wrapping_add(worker as u64));
                for round in 0..rounds {
                    loop {
                        let mut picks = ids
                            .choose_multiple(&mut rng, 2)
                            .copied()
                            .collect::<Vec<_>>();
                        picks.shuffle(&mut rng);

                        let mut txn = store.transaction().expect("begin");
                        let result = (|| {
                            txn.lock(picks[0])?;
                            txn.lock(picks[1])?;
                            let value: u32 = rng.gen();
                            txn.update(picks[0], value.to_be_bytes().to_vec())?;
                            txn.commit()
                        })();

                        match result {
                            Ok(()) => {
                                commits.fetch_add(1, Ordering::Relaxed);
                                break;
                            }
                            Err(e) if e.is_deadlock() => {
                                deadlocks.fetch_add(1, Ordering::Relaxed);
                                txn.abort().expect("abort victim");
                            }
                            Err(e) => panic!("worker {worker} round {round}: {e}"),
                        }
                    }
                }
            });
        }
    });

    // No leaked locks: one transaction can still lock everything.
    let mut sweeper = store.transaction().expect("begin sweep");
    for &id in ids {
        sweeper.lock(id).expect("sweep lock");
    }
    sweeper.abort().expect("sweep abort");

    StressOutcome {
        commits: commits.load(Ordering::Relaxed),
        deadlocks: deadlocks.load(Ordering::Relaxed),
    }
}
