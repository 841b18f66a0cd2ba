//! Execution contexts: how partitions of a problem agree on shared quantities.
//!
//! A problem runs on a single control thread per partition. Everything that must be consistent
//! across partitions (the success of an integration, assembled residuals and Jacobians) goes
//! through the collective operations of an [`ExecutionContext`]. These are rendezvous points:
//! every partition must call the same sequence of collective operations.
//!
//! A partition that panics poisons its group: collective operations of the other partitions
//! then panic instead of waiting for it.
use crate::runtime;
use parking_lot::{Condvar, Mutex};
use std::fmt::Debug;
use std::sync::Arc;

pub trait ExecutionContext: Debug + Send + Sync {
    /// Index of the calling partition.
    fn rank(&self) -> usize;

    /// Number of partitions.
    fn size(&self) -> usize;

    /// Logical AND of `value` over all partitions.
    fn all_reduce_and(&self, value: bool) -> bool;

    /// Replaces `values` with their element-wise sum over all partitions.
    ///
    /// All partitions obtain bit-identical results.
    fn all_reduce_sum(&self, values: &mut [f64]);

    fn barrier(&self);
}

/// Context of a problem that is not partitioned. Reductions are identities.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct LocalContext;

impl ExecutionContext for LocalContext {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_reduce_and(&self, value: bool) -> bool {
        value
    }

    fn all_reduce_sum(&self, _values: &mut [f64]) {}

    fn barrier(&self) {}
}

#[derive(Debug)]
struct Rendezvous {
    arrived: usize,
    generation: u64,
    poisoned: bool,
}

#[derive(Debug)]
struct SharedState {
    size: usize,
    slots: Mutex<Vec<Vec<f64>>>,
    rendezvous: Mutex<Rendezvous>,
    released: Condvar,
}

impl SharedState {
    /// Blocks until all partitions of the group have arrived.
    ///
    /// Panics if the group is poisoned before that happens.
    fn wait(&self) {
        let mut rendezvous = self.rendezvous.lock();
        if rendezvous.poisoned {
            treat_poisoned_group();
        }
        let generation = rendezvous.generation;
        rendezvous.arrived += 1;
        if rendezvous.arrived == self.size {
            rendezvous.arrived = 0;
            rendezvous.generation += 1;
            self.released.notify_all();
            return;
        }
        while rendezvous.generation == generation && !rendezvous.poisoned {
            self.released.wait(&mut rendezvous);
        }
        if rendezvous.generation == generation {
            treat_poisoned_group();
        }
    }

    fn poison(&self) {
        self.rendezvous.lock().poisoned = true;
        self.released.notify_all();
    }
}

#[cold]
#[inline(never)]
fn treat_poisoned_group() -> ! {
    panic!("collective operation aborted: another partition of the group panicked")
}

/// Context of one partition among a group of partitions running on separate threads.
#[derive(Debug, Clone)]
pub struct CollectiveContext {
    rank: usize,
    size: usize,
    shared: Arc<SharedState>,
}

impl CollectiveContext {
    /// Creates the contexts of a group of `size` partitions, ordered by rank.
    pub fn create(size: usize) -> Vec<CollectiveContext> {
        assert!(size > 0, "a group needs at least one partition");
        let shared = Arc::new(SharedState {
            size,
            slots: Mutex::new(vec![Vec::new(); size]),
            rendezvous: Mutex::new(Rendezvous {
                arrived: 0,
                generation: 0,
                poisoned: false,
            }),
            released: Condvar::new(),
        });
        (0..size)
            .map(|rank| CollectiveContext {
                rank,
                size,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl Drop for CollectiveContext {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.shared.poison();
        }
    }
}

impl ExecutionContext for CollectiveContext {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_reduce_and(&self, value: bool) -> bool {
        let mut failures = [if value { 0.0 } else { 1.0 }];
        self.all_reduce_sum(&mut failures);
        failures[0] == 0.0
    }

    fn all_reduce_sum(&self, values: &mut [f64]) {
        self.shared.slots.lock()[self.rank] = values.to_vec();
        self.shared.wait();
        {
            let slots = self.shared.slots.lock();
            for (rank, contribution) in slots.iter().enumerate() {
                assert_eq!(
                    contribution.len(),
                    values.len(),
                    "partition {} contributed a reduction of different length",
                    rank
                );
            }
            // Summing in rank order makes the result independent of the calling partition
            for (i, value) in values.iter_mut().enumerate() {
                *value = slots.iter().map(|contribution| contribution[i]).sum();
            }
        }
        // Nobody may overwrite its slot before everyone has read all slots
        self.shared.wait();
    }

    fn barrier(&self) {
        self.shared.wait();
    }
}

/// Runs `f` on `size` partitions, each on its own scoped thread, and returns the results
/// ordered by rank.
///
/// The runtime is initialized first. If `f` panics on one partition, the other partitions panic
/// at their next collective operation and `run_partitioned` panics in turn.
pub fn run_partitioned<F, R>(size: usize, f: F) -> Vec<R>
where
    F: Fn(CollectiveContext) -> R + Sync,
    R: Send,
{
    runtime::initialize();
    let contexts = CollectiveContext::create(size);
    let f = &f;
    std::thread::scope(|scope| {
        let handles: Vec<_> = contexts
            .into_iter()
            .map(|context| scope.spawn(move || f(context)))
            .collect();
        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(result) => result,
                Err(payload) => std::panic::resume_unwind(payload),
            })
            .collect()
    })
}
