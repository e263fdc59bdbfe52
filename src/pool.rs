use crate::errors::{PoolError, TaskError};
use crate::handle::JoinHandle;
use crate::model::PoolStatus;
use crate::queue::{Dequeue, WorkQueue};
use crate::result::TaskResult;
use log::{debug, trace};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

/// Life budget for workers spawned on the growth path. Deliberately short
/// and independent of the configured lifetime so over-cap growth is
/// self-limiting: growth workers drain the burst and retire quickly.
/// The seeded item counts against this budget.
const GROWTH_LIFETIME: usize = 10;

/// Tight-spin iterations before the shutdown drain falls back to 1 ms
/// sleeps. Workers normally observe the stop flag within microseconds.
const SHUTDOWN_SPINS: usize = 10_000;

/// Pool sizing parameters.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Workers spawned at construction, each with the full `lifetime` budget.
    /// Zero is legal: the pool then grows purely on demand.
    pub initial_workers: usize,
    /// Soft cap on proactive growth: a submission spawns a fresh worker only
    /// while the live count is below this and nobody is idle.
    pub max_workers: usize,
    /// Items a worker executes before retiring.
    pub lifetime: usize,
}

impl Default for Config {
    fn default() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            initial_workers: num_cpus,
            max_workers: num_cpus * 2,
            lifetime: 1024,
        }
    }
}

impl Config {
    fn validate(&self) -> Result<(), PoolError> {
        if self.max_workers == 0 {
            return Err(PoolError::InvalidConfig(
                "max_workers must be positive".into(),
            ));
        }
        if self.lifetime == 0 {
            return Err(PoolError::InvalidConfig("lifetime must be positive".into()));
        }
        if self.initial_workers > self.max_workers {
            return Err(PoolError::InvalidConfig(format!(
                "initial_workers ({}) exceeds max_workers ({})",
                self.initial_workers, self.max_workers
            )));
        }
        Ok(())
    }
}

/// The concurrency engine shared by both pool variants: the work queue, the
/// worker lifecycle, the growth decision, the status counters, and the
/// shutdown protocol. `T` is whatever a variant queues per submission (the
/// bare item for fire-and-forget, item + result slot for the typed pool);
/// `exec` is the variant's execution wrapper around the user handler.
struct PoolCore<T> {
    queue: WorkQueue<T>,
    exec: Box<dyn Fn(T) + Send + Sync>,
    n_worker: AtomicUsize,
    n_waiting: AtomicUsize,
    n_working: AtomicUsize,
    completed: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    stop: AtomicBool,
    next_worker_id: AtomicUsize,
    config: Config,
}

impl<T: Send + 'static> PoolCore<T> {
    fn start(
        config: Config,
        exec: Box<dyn Fn(T) + Send + Sync>,
        completed: Arc<AtomicUsize>,
        failed: Arc<AtomicUsize>,
    ) -> Result<Arc<Self>, PoolError> {
        config.validate()?;

        let core = Arc::new(Self {
            queue: WorkQueue::new(),
            exec,
            n_worker: AtomicUsize::new(0),
            n_waiting: AtomicUsize::new(0),
            n_working: AtomicUsize::new(0),
            completed,
            failed,
            stop: AtomicBool::new(false),
            next_worker_id: AtomicUsize::new(0),
            config,
        });

        for _ in 0..config.initial_workers {
            core.spawn_worker(config.lifetime)?;
        }

        debug!(
            "pool started: initial={} max={} lifetime={}",
            config.initial_workers, config.max_workers, config.lifetime
        );
        Ok(core)
    }

    /// Routes one submission: grow, or enqueue and wake.
    ///
    /// Growth fires iff the live count is below the cap *and* no worker is
    /// idle; the new worker is seeded with this item and bypasses the shared
    /// queue, so it may execute before earlier queued items. Otherwise the
    /// item joins the FIFO and exactly one waiting worker (if any) is woken.
    fn dispatch(self: &Arc<Self>, entry: T) -> Result<(), PoolError> {
        if self.stop.load(Ordering::SeqCst) {
            return Err(PoolError::Closed);
        }

        if self.n_waiting.load(Ordering::Relaxed) == 0
            && self.n_worker.load(Ordering::Relaxed) < self.config.max_workers
        {
            match self.spawn_seeded(GROWTH_LIFETIME, entry) {
                Ok(()) => Ok(()),
                // Spawn failure is not a lost item; fall through to the queue.
                Err(entry) => self.enqueue(entry),
            }
        } else {
            self.enqueue(entry)
        }
    }

    /// The stop flag is re-checked under the queue lock: the entry check in
    /// `dispatch` can race shutdown, and an item pushed after the drain has
    /// cleared the queue would leave its handle pending forever.
    fn enqueue(&self, entry: T) -> Result<(), PoolError> {
        self.queue
            .push_unless_stopped(entry, &self.stop)
            .map_err(|_| PoolError::Closed)?;
        if self.n_waiting.load(Ordering::Relaxed) > 0 {
            self.queue.wake_one();
        }
        Ok(())
    }

    /// Spawns an idle worker with the given life budget. The live count is
    /// raised before the thread exists so a concurrent shutdown's drain poll
    /// cannot return while this worker is still starting.
    fn spawn_worker(self: &Arc<Self>, life: usize) -> Result<(), PoolError> {
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        self.n_worker.fetch_add(1, Ordering::SeqCst);

        let core = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("dynpool-worker-{id}"))
            .spawn(move || core.worker_loop(id, life, None));

        if let Err(e) = spawned {
            self.n_worker.fetch_sub(1, Ordering::SeqCst);
            return Err(PoolError::Spawn(e));
        }
        Ok(())
    }

    /// Growth-path spawn: the new worker executes `entry` before entering
    /// the shared queue loop. On spawn failure the item is handed back.
    fn spawn_seeded(self: &Arc<Self>, life: usize, entry: T) -> Result<(), T> {
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        self.n_worker.fetch_add(1, Ordering::SeqCst);

        // Raced with shutdown: back out before the thread exists, otherwise
        // the seeded item could execute after the drain poll has returned.
        // SeqCst makes this exhaustive: either this load sees the stop flag,
        // or the drain poll sees the increment above and waits.
        if self.stop.load(Ordering::SeqCst) {
            self.n_worker.fetch_sub(1, Ordering::SeqCst);
            return Err(entry);
        }
        trace!("growth: spawning seeded worker {id}");

        // The seed rides in a shared slot so it can be recovered if the OS
        // refuses the thread; Builder::spawn drops the closure on failure.
        let seed = Arc::new(Mutex::new(Some(entry)));
        let slot = Arc::clone(&seed);
        let core = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("dynpool-worker-{id}"))
            .spawn(move || {
                let first = slot.lock().unwrap_or_else(|e| e.into_inner()).take();
                core.worker_loop(id, life, first);
            });

        match spawned {
            Ok(_) => Ok(()),
            Err(e) => {
                self.n_worker.fetch_sub(1, Ordering::SeqCst);
                debug!("growth: spawn of worker {id} failed: {e}");
                match seed.lock().unwrap_or_else(|e| e.into_inner()).take() {
                    Some(entry) => Err(entry),
                    None => Ok(()),
                }
            }
        }
    }

    /// A worker's whole life: optional seeded item, then dequeue-and-execute
    /// until the life budget is spent or the stop flag is observed. Only
    /// executed items consume budget; empty wakeups re-enter the wait.
    fn worker_loop(self: &Arc<Self>, id: usize, life: usize, seed: Option<T>) {
        trace!("worker {id}: starting, life budget {life}");
        let mut life = life;

        if let Some(item) = seed {
            self.execute(item);
            life = life.saturating_sub(1);
        }

        while life > 0 && !self.stop.load(Ordering::SeqCst) {
            match self.queue.pop_or_wait(&self.n_waiting, &self.stop) {
                Dequeue::Item(item) => {
                    self.execute(item);
                    life -= 1;
                }
                Dequeue::Retry => continue,
                Dequeue::Stopped => break,
            }
        }

        // Life exhausted with work still pending and nobody idle to take it:
        // hand off to a successor, since growth otherwise only happens on
        // submission and a quiet producer would strand the queue.
        if life == 0
            && !self.stop.load(Ordering::SeqCst)
            && self.n_waiting.load(Ordering::Relaxed) == 0
            && !self.queue.is_empty()
        {
            if let Err(e) = self.spawn_worker(self.config.lifetime) {
                debug!("worker {id}: successor spawn failed: {e}");
            }
        }

        self.n_worker.fetch_sub(1, Ordering::SeqCst);
        trace!("worker {id}: retiring");
    }

    fn execute(&self, item: T) {
        self.n_working.fetch_add(1, Ordering::Release);
        // The variant wrappers run the handler and the completion hook
        // inside catch_unwind, so this call cannot unwind and the
        // working/worker counters stay balanced.
        (self.exec)(item);
        self.n_working.fetch_sub(1, Ordering::Release);
    }
}

impl<T> PoolCore<T> {
    fn status(&self) -> PoolStatus {
        PoolStatus {
            waiting: self.n_waiting.load(Ordering::Relaxed),
            working: self.n_working.load(Ordering::Relaxed),
            workers: self.n_worker.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    /// Stops the pool and blocks until every worker has retired.
    ///
    /// The stop flag is raised under the queue lock (so no parked or parking
    /// worker can miss the wake-all), then the live-worker counter is polled
    /// to zero: a bounded tight spin for the common fast-exit case, 1 ms
    /// sleeps after that. Worker threads are never joined individually.
    /// Entries still queued afterwards are dropped, which resolves their
    /// pending handles as closed. Safe to call more than once.
    fn shutdown(&self) {
        let first = !self.stop.load(Ordering::SeqCst);
        self.queue.close(&self.stop);
        self.queue.wake_all();
        if first {
            debug!("shutdown: draining {} workers", self.n_worker.load(Ordering::Relaxed));
        }

        let mut spins = SHUTDOWN_SPINS;
        while self.n_worker.load(Ordering::Acquire) > 0 {
            if spins > 0 {
                spins -= 1;
                std::hint::spin_loop();
            } else {
                thread::sleep(Duration::from_millis(1));
            }
        }

        let dropped = self.queue.clear();
        if dropped > 0 {
            debug!("shutdown: dropped {dropped} unexecuted items");
        }
    }
}

/// One submission in the typed pool: the caller's item plus the
/// single-fulfillment slot its handle is watching.
struct WorkPair<In, Out> {
    item: In,
    slot: oneshot::Sender<TaskResult<Out>>,
}

/// Worker pool whose handler maps `In` to `Out`, with each submission's
/// result delivered through a [`JoinHandle`].
///
/// ```no_run
/// use dynpool::{Config, DynamicPool};
///
/// let pool = DynamicPool::new(Config::default(), |n: u64| n * 2).unwrap();
/// let handle = pool.submit(21).unwrap();
/// assert_eq!(handle.wait(), Ok(42));
/// ```
pub struct DynamicPool<In, Out> {
    core: Arc<PoolCore<WorkPair<In, Out>>>,
}

impl<In, Out> DynamicPool<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    /// Builds the pool and spawns the initial workers. The handler runs
    /// concurrently on multiple worker threads; a panicking handler fails
    /// only its own item, not the worker.
    pub fn new<F>(config: Config, handler: F) -> Result<Self, PoolError>
    where
        F: Fn(In) -> Out + Send + Sync + 'static,
    {
        let completed = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));
        let (done, bad) = (Arc::clone(&completed), Arc::clone(&failed));

        let exec = Box::new(move |pair: WorkPair<In, Out>| {
            let WorkPair { item, slot } = pair;
            match catch_unwind(AssertUnwindSafe(|| handler(item))) {
                Ok(out) => {
                    done.fetch_add(1, Ordering::Relaxed);
                    let _ = slot.send(Ok(out));
                }
                Err(payload) => {
                    bad.fetch_add(1, Ordering::Relaxed);
                    let _ = slot.send(Err(TaskError::Panic(panic_message(payload))));
                }
            }
        });

        let core = PoolCore::start(config, exec, completed, failed)?;
        Ok(Self { core })
    }

    /// Submits one item. Never blocks and applies no backpressure; the slot
    /// behind the returned handle exists before the item is handed anywhere,
    /// so the handle is valid even if the item already ran.
    pub fn submit(&self, item: In) -> Result<JoinHandle<Out>, PoolError> {
        let (tx, rx) = oneshot::channel();
        self.core.dispatch(WorkPair { item, slot: tx })?;
        Ok(JoinHandle::new(rx))
    }

    /// Approximate counter snapshot; see [`PoolStatus`].
    pub fn status(&self) -> PoolStatus {
        self.core.status()
    }

    /// Items currently sitting in the shared queue.
    pub fn pending(&self) -> usize {
        self.core.queue.len()
    }

    /// Stops the pool and blocks until all workers have retired. Items still
    /// queued are dropped; their handles resolve to
    /// [`TaskError::ChannelClosed`].
    pub fn shutdown(&self) {
        self.core.shutdown();
    }
}

impl<In, Out> Drop for DynamicPool<In, Out> {
    fn drop(&mut self) {
        self.core.shutdown();
    }
}

/// Fire-and-forget variant: the handler reports success as a `bool` and the
/// pool discards it by design. Install a hook via [`FirePool::with_hook`]
/// when success/failure visibility is needed.
pub struct FirePool<In> {
    core: Arc<PoolCore<In>>,
}

impl<In: Send + 'static> FirePool<In> {
    pub fn new<F>(config: Config, handler: F) -> Result<Self, PoolError>
    where
        F: Fn(In) -> bool + Send + Sync + 'static,
    {
        Self::build(config, handler, None)
    }

    /// Like [`FirePool::new`], but `hook` observes each item's outcome
    /// (handler panics count as `false`).
    pub fn with_hook<F, H>(config: Config, handler: F, hook: H) -> Result<Self, PoolError>
    where
        F: Fn(In) -> bool + Send + Sync + 'static,
        H: Fn(bool) + Send + Sync + 'static,
    {
        Self::build(config, handler, Some(Box::new(hook)))
    }

    fn build<F>(
        config: Config,
        handler: F,
        hook: Option<Box<dyn Fn(bool) + Send + Sync>>,
    ) -> Result<Self, PoolError>
    where
        F: Fn(In) -> bool + Send + Sync + 'static,
    {
        let completed = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));
        let (done, bad) = (Arc::clone(&completed), Arc::clone(&failed));

        let exec = Box::new(move |item: In| {
            let ok = catch_unwind(AssertUnwindSafe(|| handler(item))).unwrap_or(false);
            if ok {
                done.fetch_add(1, Ordering::Relaxed);
            } else {
                bad.fetch_add(1, Ordering::Relaxed);
            }
            // The hook is caller-supplied code too: a panic in it must fail
            // neither the worker nor the item, whose outcome is already
            // recorded above.
            if let Some(hook) = &hook {
                if catch_unwind(AssertUnwindSafe(|| hook(ok))).is_err() {
                    debug!("completion hook panicked");
                }
            }
        });

        let core = PoolCore::start(config, exec, completed, failed)?;
        Ok(Self { core })
    }

    /// Submits one item; the outcome is discarded (or fed to the hook).
    pub fn submit(&self, item: In) -> Result<(), PoolError> {
        self.core.dispatch(item)
    }

    pub fn status(&self) -> PoolStatus {
        self.core.status()
    }

    pub fn pending(&self) -> usize {
        self.core.queue.len()
    }

    pub fn shutdown(&self) {
        self.core.shutdown();
    }
}

impl<In> Drop for FirePool<In> {
    fn drop(&mut self) {
        self.core.shutdown();
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
