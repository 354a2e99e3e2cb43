use std::iter;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_deque::{Injector, Steal, Stealer, Worker};
use parking_lot::{Condvar, Mutex};

use crate::errors::*;

use super::latch::{Latch, LockLatch};
use super::unwind;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed set of worker threads that pull jobs from a shared injector, and
/// steal from each other when they run dry.
pub struct JobQueue {
    shared: Arc<Shared>,
    threads: Vec<thread::JoinHandle<()>>,
}

struct Shared {
    injector: Injector<Job>,
    stealers: Vec<Stealer<Job>>,
    pending: AtomicUsize,
    terminated: AtomicBool,
    watcher: Watcher,
    idle: Watcher,
}

impl JobQueue {
    /// Spawns `num` workers, at least one, and blocks until all of them are
    /// running.
    pub fn new(num: usize) -> Result<Self> {
        let num = num.max(1);

        let workers: Vec<_> = (0..num).map(|_| Worker::new_fifo()).collect();
        let shared = Arc::new(Shared {
            injector: Injector::new(),
            stealers: workers.iter().map(|v| v.stealer()).collect(),
            pending: AtomicUsize::new(0),
            terminated: AtomicBool::new(false),
            watcher: Watcher::default(),
            idle: Watcher::default(),
        });

        let mut queue = JobQueue {
            shared: shared.clone(),
            threads: Vec::with_capacity(num),
        };

        let mut primes = Vec::with_capacity(num);
        for (i, w) in workers.into_iter().enumerate() {
            let primed = Arc::new(LockLatch::new());
            primes.push(primed.clone());

            let shared = shared.clone();
            let handle = thread::Builder::new()
                .name(format!("ensemble-worker-{}", i))
                .spawn(move || JobQueue::main_loop(&shared, i, &w, &primed))
                .map_err(|err| Error::WorkerSpawn(err.to_string()))?;

            // Dropping the queue on error terminates the spawned ones.
            queue.threads.push(handle);
        }

        for v in &primes {
            v.wait();
        }

        info!("[JobQueue] spawns {} workers.", num);
        Ok(queue)
    }

    /// Pushes a job into the queue, it will be taken by whatever worker has
    /// nothing to do.
    pub fn submit<F>(&self, func: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        self.shared.injector.push(Box::new(func));
        self.shared.watcher.notify_one();
    }

    /// Blocks the current thread until every submitted job has completed.
    pub fn wait(&self) {
        let mut ms = 1;
        while self.shared.pending.load(Ordering::SeqCst) > 0 {
            self.shared.idle.wait_timeout(ms);
            ms = (ms * 2).min(48);
        }
    }

    /// Returns the number of jobs submitted but not completed yet.
    #[inline]
    pub fn len(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn workers(&self) -> usize {
        self.shared.stealers.len()
    }

    fn main_loop(shared: &Shared, index: usize, local: &Worker<Job>, primed: &LockLatch) {
        primed.set();
        trace!("[JobQueue] worker {} is running.", index);

        let mut ms = 1;
        loop {
            match shared.find(index, local) {
                Some(job) => {
                    shared.execute(job);
                    ms = 1;
                }
                None => {
                    if shared.terminated.load(Ordering::SeqCst) {
                        break;
                    }

                    shared.watcher.wait_timeout(ms);
                    ms = (ms * 2).min(48);
                }
            }
        }

        trace!("[JobQueue] worker {} terminates.", index);
    }
}

impl Drop for JobQueue {
    fn drop(&mut self) {
        self.shared.terminated.store(true, Ordering::SeqCst);
        self.shared.watcher.notify_all();

        let current = thread::current().id();
        for v in self.threads.drain(..) {
            // The last handle to the queue might be released by one of its own
            // jobs.
            if v.thread().id() == current {
                continue;
            }

            if v.join().is_err() {
                warn!("[JobQueue] failed to join worker.");
            }
        }

        info!("[JobQueue] terminated.");
    }
}

impl Shared {
    fn find(&self, index: usize, local: &Worker<Job>) -> Option<Job> {
        local.pop().or_else(|| {
            iter::repeat_with(|| {
                self.injector.steal_batch_and_pop(local).or_else(|| {
                    self.stealers
                        .iter()
                        .enumerate()
                        .filter(|&(i, _)| i != index)
                        .map(|(_, v)| v.steal())
                        .collect::<Steal<Job>>()
                })
            })
            .find(|v| !v.is_retry())
            .and_then(|v| v.success())
        })
    }

    fn execute(&self, job: Job) {
        if let Err(err) = unwind::halt_unwinding(job) {
            warn!("[JobQueue] job panicked. {}", unwind::describe(&*err));
        }

        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_all();
        }
    }
}

#[derive(Default)]
struct Watcher(Mutex<()>, Condvar);

impl Watcher {
    #[inline]
    fn wait_timeout(&self, ms: u64) {
        let duration = Duration::from_millis(ms);
        let mut v = self.0.lock();
        let _ = self.1.wait_for(&mut v, duration);
    }

    #[inline]
    fn notify_one(&self) {
        self.1.notify_one();
    }

    #[inline]
    fn notify_all(&self) {
        self.1.notify_all();
    }
}
