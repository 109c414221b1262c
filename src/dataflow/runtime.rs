//! Task scheduler: one task per component, each looping `process()` forever.
//!
//! Components are registered with [`Runtime::add_component`], then
//! [`Runtime::start`] hands each one to a [`Spawner`] together with its
//! [`TaskConfig`]. The task body calls `process()` in a loop. There is no
//! start-up ordering between tasks; a component that depends on another's
//! output blocks on its input port until that output arrives.
//!
//! `process()` is expected never to return. When it does, the loop logs it
//! and calls it again:
//!
//! | outcome      | log level | action  |
//! |--------------|-----------|---------|
//! | `Ok(())`     | warn      | restart |
//! | `Err(e)`     | error     | restart |
//! | panic        | error     | restart |
//!
//! [`RuntimeHandle::cancel`] stops restarts. A task notices cancellation when
//! `process()` returns, or inside [`TaskContext::suspend`] and
//! [`TaskContext::sleep`]. A task blocked on a port receive is not woken.

use crate::config::{RuntimeConfig, TaskConfig};
use crate::dataflow::component::Component;
use crate::dataflow::id::TaskId;
use crate::error::{DataflowError, Result, ResultExt};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// A task body ready to run.
pub type TaskBody = Box<dyn FnOnce() + Send + 'static>;

/// Platform seam for creating concurrent tasks.
pub trait Spawner: Send + Sync {
    /// Start `body` as a new task named `name` with the given parameters.
    fn spawn(&self, name: &str, config: &TaskConfig, body: TaskBody) -> Result<()>;
}

/// Runs every task on a dedicated OS thread.
///
/// Stack size is applied. Priority and core affinity have no portable
/// equivalent on std threads and are logged as unapplied hints.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSpawner;

impl Spawner for ThreadSpawner {
    fn spawn(&self, name: &str, config: &TaskConfig, body: TaskBody) -> Result<()> {
        if let Some(core) = config.core {
            tracing::debug!(
                "Task '{}': priority {} / core {} requested, not applied on std threads",
                name,
                config.priority,
                core
            );
        }

        thread::Builder::new()
            .name(name.to_string())
            .stack_size(config.stack_size)
            .spawn(body)
            .map(|_| ())
            .map_err(DataflowError::Io)
            .with_context(|| format!("Failed to spawn task '{}'", name))
    }
}

/// Cancellation shared by every task of one runtime.
struct Cancellation {
    cancelled: AtomicBool,
    /// Dropping the only sender wakes every waiter on `signal`.
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
}

impl Cancellation {
    fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            cancelled: AtomicBool::new(false),
            trigger: Mutex::new(Some(tx)),
            signal: rx,
        }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        let mut trigger = self.trigger.lock().unwrap_or_else(|p| p.into_inner());
        trigger.take();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Per-task counters, readable from the handle while tasks run.
#[derive(Debug, Default)]
struct TaskStats {
    invocations: AtomicU64,
    restarts: AtomicU64,
}

/// What a running component can see of its own task.
pub struct TaskContext {
    id: TaskId,
    name: String,
    cancellation: Arc<Cancellation>,
}

impl TaskContext {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Park this task until the runtime is cancelled.
    ///
    /// Used by components that do their work once and must then stay alive
    /// without being restarted. Consumes no CPU while parked.
    pub fn suspend(&self) {
        tracing::debug!("Task '{}' suspended", self.name);
        // Only ever returns once the trigger is dropped
        let _ = self.cancellation.signal.recv();
    }

    /// Sleep for `duration`. Returns true if cancellation cut the sleep short.
    pub fn sleep(&self, duration: Duration) -> bool {
        match self.cancellation.signal.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => false,
            _ => true,
        }
    }
}

struct Task {
    component: Box<dyn Component>,
    config: TaskConfig,
}

/// Registry of components, started all at once.
pub struct Runtime {
    config: RuntimeConfig,
    spawner: Box<dyn Spawner>,
    tasks: Vec<Task>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            config,
            spawner: Box::new(ThreadSpawner),
            tasks: Vec::new(),
        }
    }

    /// Replace the platform spawner.
    pub fn with_spawner(mut self, spawner: impl Spawner + 'static) -> Self {
        self.spawner = Box::new(spawner);
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Register a component with the default task parameters.
    pub fn add_component(&mut self, component: impl Component + 'static) -> TaskId {
        let config = self.config.task.clone();
        self.add_component_with(component, config)
    }

    /// Register a component with its own task parameters.
    pub fn add_component_with(
        &mut self,
        component: impl Component + 'static,
        config: TaskConfig,
    ) -> TaskId {
        self.add_boxed(Box::new(component), config)
    }

    pub fn add_boxed(&mut self, component: Box<dyn Component>, config: TaskConfig) -> TaskId {
        let id = TaskId(self.tasks.len() as u32);
        tracing::debug!("Registered component '{}' as {:?}", component.name(), id);
        self.tasks.push(Task { component, config });
        id
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Spawn one task per registered component.
    ///
    /// If a spawn fails, the tasks already started are cancelled and the
    /// error is returned.
    pub fn start(self) -> Result<RuntimeHandle> {
        let cancellation = Arc::new(Cancellation::new());
        let (exit_tx, exit_rx) = unbounded();
        let restart_delay = self.config.runtime.restart_delay();
        let mut infos = Vec::with_capacity(self.tasks.len());

        for (index, task) in self.tasks.into_iter().enumerate() {
            let id = TaskId(index as u32);
            let name = task.component.name().to_string();
            let stats = Arc::new(TaskStats::default());
            let ctx = TaskContext {
                id,
                name: name.clone(),
                cancellation: Arc::clone(&cancellation),
            };

            let body: TaskBody = {
                let stats = Arc::clone(&stats);
                let exit_tx = exit_tx.clone();
                let component = task.component;
                Box::new(move || {
                    run_task(component, &ctx, &stats, restart_delay);
                    let _ = exit_tx.send(ctx.id);
                })
            };

            if let Err(e) = self.spawner.spawn(&name, &task.config, body) {
                tracing::error!("{}", e);
                cancellation.cancel();
                return Err(e);
            }
            tracing::info!(
                "Started task '{}' (stack {} bytes, priority {})",
                name,
                task.config.stack_size,
                task.config.priority
            );
            infos.push(TaskInfo { id, name, stats });
        }

        Ok(RuntimeHandle {
            tasks: infos,
            cancellation,
            exits: exit_rx,
            exited: AtomicUsize::new(0),
        })
    }
}

/// The loop each component task runs.
fn run_task(
    mut component: Box<dyn Component>,
    ctx: &TaskContext,
    stats: &TaskStats,
    restart_delay: Duration,
) {
    loop {
        stats.invocations.fetch_add(1, Ordering::Relaxed);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| component.process(ctx)));

        if ctx.is_cancelled() {
            break;
        }

        match outcome {
            Ok(Ok(())) => tracing::warn!("Task '{}': process() returned, restarting", ctx.name),
            Ok(Err(e)) => tracing::error!("Task '{}': process() failed: {}, restarting", ctx.name, e),
            Err(payload) => tracing::error!(
                "Task '{}': process() panicked: {}, restarting",
                ctx.name,
                panic_message(payload.as_ref())
            ),
        }
        stats.restarts.fetch_add(1, Ordering::Relaxed);

        if !restart_delay.is_zero() && ctx.sleep(restart_delay) {
            break;
        }
    }
    tracing::info!("Task '{}' stopped", ctx.name);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

struct TaskInfo {
    id: TaskId,
    name: String,
    stats: Arc<TaskStats>,
}

/// Observes and cancels the tasks of a started runtime.
///
/// Dropping the handle leaves the tasks running.
pub struct RuntimeHandle {
    tasks: Vec<TaskInfo>,
    cancellation: Arc<Cancellation>,
    exits: Receiver<TaskId>,
    exited: AtomicUsize,
}

impl RuntimeHandle {
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.name.as_str())
    }

    fn find(&self, name: &str) -> Option<&TaskInfo> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// How many times `process()` has been entered for the named task.
    pub fn invocations(&self, name: &str) -> Option<u64> {
        self.find(name)
            .map(|t| t.stats.invocations.load(Ordering::Relaxed))
    }

    /// How many times the named task was restarted after `process()` returned.
    pub fn restarts(&self, name: &str) -> Option<u64> {
        self.find(name).map(|t| t.stats.restarts.load(Ordering::Relaxed))
    }

    /// Stop restarting tasks and wake every suspended one.
    pub fn cancel(&self) {
        tracing::info!("Cancelling {} task(s)", self.tasks.len());
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Wait until every task has stopped or `timeout` elapses.
    ///
    /// Returns true if all tasks stopped.
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.exited.load(Ordering::Acquire) < self.tasks.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.exits.recv_timeout(remaining) {
                Ok(id) => {
                    let name = self
                        .tasks
                        .iter()
                        .find(|t| t.id == id)
                        .map_or("?", |t| t.name.as_str());
                    tracing::debug!("Task '{}' ({:?}) exited", name, id);
                    self.exited.fetch_add(1, Ordering::AcqRel);
                }
                Err(_) => return false,
            }
        }
        true
    }
}
