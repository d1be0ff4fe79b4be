//! A tiny work-stealing pool over `crossbeam-deque`: one `Worker` per
//! background thread, a shared `Injector` for fan-out, and stealing from
//! sibling workers when a thread's own queue runs dry. [`Pool::run_all`]
//! is the one entry point the tree builder needs: push a batch of sibling
//! subtree jobs and block until every one of them has produced a result,
//! helping drain the shared queue while waiting rather than just parking.

use crossbeam_deque::{Injector, Steal, Stealer, Worker};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

type Job = Box<dyn FnOnce() + Send>;

/// Pops a task for a thread that owns `local`, preferring its own queue,
/// then the shared injector, then stealing from siblings. Mirrors the
/// canonical `find_task` loop from `crossbeam-deque`'s own docs.
fn find_task(local: &Worker<Job>, injector: &Injector<Job>, stealers: &[Stealer<Job>]) -> Option<Job> {
    local.pop().or_else(|| {
        std::iter::repeat_with(|| {
            injector
                .steal_batch_and_pop(local)
                .or_else(|| stealers.iter().map(Stealer::steal).collect())
        })
        .find(|s| !s.is_retry())
        .and_then(Steal::success)
    })
}

/// Steals directly from the injector or siblings, for a caller (e.g. the
/// thread that kicked off a build) that has no local queue of its own.
fn steal_any(injector: &Injector<Job>, stealers: &[Stealer<Job>]) -> Option<Job> {
    std::iter::repeat_with(|| injector.steal().or_else(|| stealers.iter().map(Stealer::steal).collect()))
        .find(|s| !s.is_retry())
        .and_then(Steal::success)
}

/// A countdown latch that whoever is waiting on it helps drain, rather
/// than blocking uninvolved.
struct Latch {
    remaining: Mutex<usize>,
    done: Condvar,
}

impl Latch {
    fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            done: Condvar::new(),
        }
    }

    fn count_down(&self) {
        let mut remaining = self.remaining.lock().unwrap();
        *remaining -= 1;
        if *remaining == 0 {
            self.done.notify_all();
        }
    }

    fn is_done(&self) -> bool {
        *self.remaining.lock().unwrap() == 0
    }
}

pub struct Pool {
    injector: Arc<Injector<Job>>,
    stealers: Arc<Vec<Stealer<Job>>>,
    shutdown: Arc<AtomicBool>,
    handles: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl Pool {
    /// Spawns `threads.max(1)` background worker threads sharing one
    /// injector queue.
    #[must_use]
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(1);
        let injector = Arc::new(Injector::new());
        let workers: Vec<Worker<Job>> = (0..threads).map(|_| Worker::new_fifo()).collect();
        let stealers: Arc<Vec<Stealer<Job>>> = Arc::new(workers.iter().map(Worker::stealer).collect());
        let shutdown = Arc::new(AtomicBool::new(false));

        let handles = workers
            .into_iter()
            .map(|local| {
                let injector = Arc::clone(&injector);
                let stealers = Arc::clone(&stealers);
                let shutdown = Arc::clone(&shutdown);
                thread::spawn(move || {
                    while !shutdown.load(Ordering::Relaxed) {
                        match find_task(&local, &injector, &stealers) {
                            Some(job) => job(),
                            None => thread::yield_now(),
                        }
                    }
                })
            })
            .collect();

        Self {
            injector,
            stealers,
            shutdown,
            handles: Mutex::new(handles),
        }
    }

    /// Runs every job in `jobs` to completion, possibly in parallel
    /// across worker threads, and returns their results in input order.
    /// The calling thread helps drain the shared queue while it waits.
    pub fn run_all<T: Send + 'static>(&self, jobs: Vec<Box<dyn FnOnce() -> T + Send>>) -> Vec<T> {
        let n = jobs.len();
        if n == 0 {
            return Vec::new();
        }

        let slots: Arc<Mutex<Vec<Option<T>>>> = Arc::new(Mutex::new((0..n).map(|_| None).collect()));
        let latch = Arc::new(Latch::new(n));

        for (index, job) in jobs.into_iter().enumerate() {
            let slots = Arc::clone(&slots);
            let latch = Arc::clone(&latch);
            let wrapped: Job = Box::new(move || {
                let result = job();
                slots.lock().unwrap()[index] = Some(result);
                latch.count_down();
            });
            self.injector.push(wrapped);
        }

        while !latch.is_done() {
            match steal_any(&self.injector, &self.stealers) {
                Some(job) => job(),
                None => thread::yield_now(),
            }
        }

        let mut slots = slots.lock().unwrap();
        (0..n).map(|i| slots[i].take().expect("every slot filled before latch release")).collect()
    }

    /// Signals every worker thread to stop and joins them. Idempotent:
    /// a second call finds an already-drained handle list and returns
    /// immediately.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let mut handles = self.handles.lock().unwrap();
        for handle in handles.drain(..) {
            let _ = handle.join();
        }
    }
}
