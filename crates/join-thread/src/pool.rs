//! Fixed-size worker pool with a FIFO job queue, plus `distribute`/
//! `parallel_for_each` static-partitioning helpers built on top of
//! [`crate::Thread`] directly (they do not go through the pool).

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

use crate::error::ThreadError;
use crate::thread::Thread;

type Job = Box<dyn FnOnce() + Send>;

struct Shared {
    jobs: Mutex<VecDeque<Job>>,
    condvar: Condvar,
    stopping: Mutex<bool>,
}

/// A pool worker. Construction is restricted to [`ThreadPool`] (mirroring
/// the source's friend-restricted `WorkerThread`): a worker always wires
/// itself back to its owning pool's job queue, so there is no way to create
/// one disconnected from a pool.
struct WorkerThread {
    _thread: Thread,
}

impl WorkerThread {
    fn spawn(shared: Arc<Shared>) -> Result<Self, ThreadError> {
        let thread = Thread::spawn(move || worker_loop(&shared))?;
        Ok(Self { _thread: thread })
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let mut jobs = shared.jobs.lock().unwrap();
        while jobs.is_empty() && !*shared.stopping.lock().unwrap() {
            jobs = shared.condvar.wait(jobs).unwrap();
        }
        let job = jobs.pop_front();
        drop(jobs);
        match job {
            Some(job) => job(),
            None => {
                if *shared.stopping.lock().unwrap() {
                    return;
                }
            }
        }
    }
}

/// A fixed-size pool of worker threads draining a shared FIFO job queue.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<WorkerThread>,
}

impl ThreadPool {
    /// Creates a pool with `workers` threads.
    pub fn new(workers: usize) -> Result<Self, ThreadError> {
        let shared = Arc::new(Shared {
            jobs: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            stopping: Mutex::new(false),
        });
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            handles.push(WorkerThread::spawn(shared.clone())?);
        }
        Ok(Self { shared, workers: handles })
    }

    /// Creates a pool sized to the number of physical cores detected by
    /// [`join_topo::CpuTopology`].
    pub fn with_default_size() -> Result<Self, ThreadError> {
        Self::new(join_topo::CpuTopology::instance().cores().len().max(1))
    }

    /// Enqueues a job and wakes one worker.
    pub fn push(&self, job: impl FnOnce() + Send + 'static) {
        self.shared.jobs.lock().unwrap().push_back(Box::new(job));
        self.shared.condvar.notify_one();
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        tracing::debug!(workers = self.workers.len(), "thread pool shutting down");
        *self.shared.stopping.lock().unwrap() = true;
        self.shared.condvar.notify_all();
        // Workers drop here, joining as each `Thread` is dropped.
        self.workers.clear();
    }
}

/// Splits `[0, count)` into up to `concurrency` contiguous, near-equal
/// ranges; any remainder is distributed one-by-one to the first ranges.
fn partition_ranges(count: usize, concurrency: usize) -> Vec<(usize, usize)> {
    let chunk = count / concurrency;
    let rest = count % concurrency;
    let mut ranges = Vec::with_capacity(concurrency);
    let mut start = 0;
    for i in 0..concurrency {
        let len = chunk + usize::from(i < rest);
        ranges.push((start, start + len));
        start += len;
    }
    ranges
}

/// Statically partitions `[0, count)` across `min(available_parallelism,
/// count)` threads and runs `func` on each `(begin, end)` slice; the
/// calling thread processes the last slice itself rather than spawning an
/// extra thread for it.
pub fn distribute(count: usize, func: impl Fn(usize, usize) + Sync) {
    if count == 0 {
        return;
    }
    let concurrency = join_topo::CpuTopology::instance().cores().len().max(1).min(count);
    let ranges = partition_ranges(count, concurrency);

    std::thread::scope(|scope| {
        let func = &func;
        let mut handles = Vec::with_capacity(concurrency - 1);
        for &(begin, end) in &ranges[..concurrency - 1] {
            handles.push(scope.spawn(move || func(begin, end)));
        }
        let (begin, end) = ranges[concurrency - 1];
        func(begin, end);
        for h in handles {
            h.join().unwrap();
        }
    });
}

/// Runs `func` on every index in `[0, count)`, parallelized via
/// [`distribute`].
pub fn parallel_for_each(count: usize, func: impl Fn(usize) + Sync) {
    distribute(count, |begin, end| {
        for i in begin..end {
            func(i);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn pool_runs_every_job() {
        let pool = ThreadPool::new(4).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let counter = counter.clone();
            pool.push(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        drop(pool);
        assert_eq!(counter.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn partition_ranges_cover_every_index_exactly_once() {
        let ranges = partition_ranges(17, 4);
        let mut seen = vec![false; 17];
        for (begin, end) in ranges {
            for i in begin..end {
                assert!(!seen[i]);
                seen[i] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn parallel_for_each_visits_every_index() {
        let visited = Arc::new(Mutex::new(vec![false; 1000]));
        parallel_for_each(1000, |i| {
            visited.lock().unwrap()[i] = true;
        });
        assert!(visited.lock().unwrap().iter().all(|&v| v));
    }
}
