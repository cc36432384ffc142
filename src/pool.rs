use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use tracing::{debug, error, trace};

use crate::config::FairPoolConfig;
use crate::error::PoolError;
use crate::future::{Future, Waitable};
use crate::queue::{FairQueue, Tag};

/// A unit of work accepted by the pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Source of default pool names; the only process-wide datum in the crate.
static POOL_ID: AtomicUsize = AtomicUsize::new(0);

/// Mutable pool state, guarded by the single pool mutex.
struct PoolState {
    /// Pending jobs in tag-fair order.
    queue: FairQueue<Job>,
    /// Worker count requested via `set_threads`.
    wanted: usize,
    /// Worker threads currently alive.
    live: usize,
    /// Set once by `dispose`; workers drain out when they see it.
    disposing: bool,
    /// Join handles for live workers, keyed by worker id. Workers remove
    /// their own entry on exit.
    workers: HashMap<usize, JoinHandle<()>>,
    /// Source of worker ids for thread naming.
    next_worker: usize,
}

struct Shared {
    state: Mutex<PoolState>,
    cond: Condvar,
    /// Jobs currently executing. Atomic so observers skip the pool lock.
    running: AtomicUsize,
    name: String,
    join_timeout: Duration,
}

/// A worker pool that executes submitted jobs in tag-fair order.
///
/// The pool owns a group of worker threads and a `FairQueue<Job>` guarded by
/// one mutex and its condition variable. Jobs sharing a tag run in submission
/// order; distinct tags are served round-robin, so a burst under one tag
/// cannot starve the others.
///
/// # Thread Safety
/// - All queue access goes through the single pool mutex
/// - `running` is an atomic counter so snapshots never contend with workers
/// - Worker panics are caught at the job boundary; workers never die to an
///   in-job failure
///
/// # Lifecycle
/// - `set_threads` resizes the pool: growing spawns the deficit as workers
///   finish jobs, shrinking retires excess workers one at a time
/// - `dispose` lets running jobs finish, discards pending jobs, and joins
///   workers within a bounded timeout; it is idempotent and also runs on drop
pub struct FairPool {
    shared: Arc<Shared>,
}

impl fmt::Debug for FairPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FairPool")
            .field("name", &self.shared.name)
            .field("running", &self.running())
            .finish()
    }
}

impl FairPool {
    /// Creates a pool with `threads` workers and a generated name.
    pub fn new(threads: usize) -> Result<Self, PoolError> {
        Self::with_config(FairPoolConfig {
            threads,
            ..FairPoolConfig::default()
        })
    }

    /// Creates a pool from an explicit configuration.
    pub fn with_config(config: FairPoolConfig) -> Result<Self, PoolError> {
        if config.threads == 0 {
            return Err(PoolError::InvalidThreadCount(0));
        }
        let name = config
            .name
            .unwrap_or_else(|| format!("fair-pool-{}", POOL_ID.fetch_add(1, Ordering::Relaxed)));

        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState {
                queue: FairQueue::new(),
                wanted: config.threads,
                live: 0,
                disposing: false,
                workers: HashMap::new(),
                next_worker: 0,
            }),
            cond: Condvar::new(),
            running: AtomicUsize::new(0),
            name,
            join_timeout: config.join_timeout,
        });

        {
            let mut state = shared.state.lock().unwrap();
            for _ in 0..config.threads {
                spawn_worker(&shared, &mut state)?;
            }
        }
        debug!(pool = %shared.name, threads = config.threads, "pool started");
        Ok(Self { shared })
    }

    /// Enqueues a job under the default tag.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_job(0, Box::new(job));
    }

    /// Enqueues a job under `tag`.
    pub fn submit_tagged<F>(&self, tag: Tag, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_job(tag, Box::new(job));
    }

    /// Enqueues an already boxed job under `tag`.
    ///
    /// Submissions arriving during or after `dispose` are dropped.
    pub fn submit_job(&self, tag: Tag, job: Job) {
        let mut state = self.shared.state.lock().unwrap();
        if state.disposing {
            debug!(pool = %self.shared.name, "submission after dispose dropped");
            return;
        }
        state.queue.enqueue(tag, job);
        drop(state);
        self.shared.cond.notify_one();
    }

    /// Enqueues a job and returns a handle that completes when it has run.
    pub fn submit_waitable<F>(&self, tag: Tag, job: F) -> Waitable
    where
        F: FnOnce() + Send + 'static,
    {
        let done = Future::new();
        let publish = done.clone();
        self.submit_tagged(tag, move || match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(()) => {
                let _ = publish.set_value(true);
            }
            Err(payload) => {
                let _ = publish.set_error(anyhow!("{}", panic_message(payload.as_ref())));
            }
        });
        Waitable::new(done)
    }

    /// Enqueues a value-producing job and returns the future carrying its
    /// result. A failing or panicking producer publishes an error that
    /// surfaces at `get_value`.
    pub fn submit_future<T, F>(&self, tag: Tag, producer: F) -> Future<T>
    where
        T: Send + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let future = Future::new();
        let publish = future.clone();
        self.submit_tagged(
            tag,
            move || match panic::catch_unwind(AssertUnwindSafe(producer)) {
                Ok(Ok(value)) => {
                    let _ = publish.set_value(value);
                }
                Ok(Err(error)) => {
                    let _ = publish.set_error(error);
                }
                Err(payload) => {
                    let _ = publish.set_error(anyhow!("{}", panic_message(payload.as_ref())));
                }
            },
        );
        future
    }

    /// Number of jobs waiting in the queue.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().unwrap().queue.count()
    }

    /// Number of jobs currently executing.
    pub fn running(&self) -> usize {
        self.shared.running.load(Ordering::Relaxed)
    }

    /// Requested worker count.
    pub fn threads(&self) -> usize {
        self.shared.state.lock().unwrap().wanted
    }

    /// Workers currently alive. Trails `threads` while a resize settles.
    pub fn live_threads(&self) -> usize {
        self.shared.state.lock().unwrap().live
    }

    /// The pool's name, as used in worker thread names and logs.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Requests a new worker count.
    ///
    /// Growing takes effect as workers finish jobs and spawn the deficit.
    /// Shrinking retires excess workers one at a time, including workers
    /// parked on an empty queue.
    pub fn set_threads(&self, threads: usize) -> Result<(), PoolError> {
        if threads == 0 {
            return Err(PoolError::InvalidThreadCount(0));
        }
        let mut state = self.shared.state.lock().unwrap();
        if state.disposing {
            return Ok(());
        }
        let shrinking = threads < state.wanted;
        state.wanted = threads;
        drop(state);
        if shrinking {
            // Unpark idle workers so they notice the lower target.
            self.shared.cond.notify_all();
        }
        Ok(())
    }

    /// Requests shutdown: running jobs finish, pending jobs are discarded
    /// without running, and workers are joined within the configured bound.
    /// Safe to call more than once.
    pub fn dispose(&self) {
        let handles = {
            let mut state = self.shared.state.lock().unwrap();
            if state.disposing {
                return;
            }
            state.disposing = true;

            let dropped = state.queue.count();
            while state.queue.dequeue().is_ok() {}
            if dropped > 0 {
                debug!(pool = %self.shared.name, dropped, "pending jobs discarded on dispose");
            }
            state
                .workers
                .drain()
                .map(|(_, handle)| handle)
                .collect::<Vec<_>>()
        };
        self.shared.cond.notify_all();

        let deadline = Instant::now() + self.shared.join_timeout;
        let mut state = self.shared.state.lock().unwrap();
        while state.live > 0 {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, _) = self
                .shared
                .cond
                .wait_timeout(state, deadline - now)
                .unwrap();
            state = guard;
        }
        let drained = state.live == 0;
        drop(state);

        if drained {
            for handle in handles {
                let _ = handle.join();
            }
        }
        // Stragglers still inside a job are detached; their in-flight work
        // runs to completion on its own.
        debug!(pool = %self.shared.name, drained, "pool disposed");
    }
}

impl Drop for FairPool {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Spawns one worker under the pool mutex.
fn spawn_worker(shared: &Arc<Shared>, state: &mut PoolState) -> Result<(), PoolError> {
    let id = state.next_worker;
    state.next_worker += 1;
    let shared2 = Arc::clone(shared);
    let handle = thread::Builder::new()
        .name(format!("{}-worker-{}", shared.name, id))
        .spawn(move || worker_loop(shared2, id))?;
    state.live += 1;
    state.workers.insert(id, handle);
    Ok(())
}

/// Body of every worker thread.
///
/// Workers park on the pool condition while the queue is empty, run jobs in
/// tag-fair order with panic isolation, and reconcile the live thread count
/// against the wanted count after every job.
fn worker_loop(shared: Arc<Shared>, id: usize) {
    trace!(pool = %shared.name, worker = id, "worker started");
    loop {
        // Pull one job, or learn that this worker should exit.
        let job = {
            let mut state = shared.state.lock().unwrap();
            loop {
                if state.disposing || state.live > state.wanted {
                    break None;
                }
                match state.queue.dequeue() {
                    Ok((job, _tag)) => break Some(job),
                    Err(_) => state = shared.cond.wait(state).unwrap(),
                }
            }
        };
        let Some(job) = job else { break };

        shared.running.fetch_add(1, Ordering::Relaxed);
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            // The job owns its failure; the worker carries on.
            error!(pool = %shared.name, worker = id, "job panicked");
        }
        shared.running.fetch_sub(1, Ordering::Relaxed);

        // Thread-count reconciliation: retire when over target, spawn the
        // deficit when under.
        let exit = {
            let mut state = shared.state.lock().unwrap();
            if state.disposing || state.live > state.wanted {
                true
            } else {
                while state.live < state.wanted {
                    if let Err(e) = spawn_worker(&shared, &mut state) {
                        error!(pool = %shared.name, error = %e, "failed to grow pool");
                        break;
                    }
                }
                false
            }
        };
        if exit {
            break;
        }
    }

    // Exit path: leave the thread set and wake anyone waiting on the count.
    let mut state = shared.state.lock().unwrap();
    state.live -= 1;
    state.workers.remove(&id);
    drop(state);
    shared.cond.notify_all();
    trace!(pool = %shared.name, worker = id, "worker exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "job panicked".to_string()
    }
}
