//! Single-worker background queue for mutating cache operations.
//!
//! Every task runs on one dedicated thread, one at a time, ordered by
//! eligibility time (submission time plus delay). Tasks with equal
//! eligibility run in submission order. Submitting never blocks.
//!
//! The worker thread is spawned on the first submission and drives a
//! current-thread tokio runtime that owns the schedule. It exits once the
//! queue is dropped and every submitted task has run.

use crate::Error;
use crate::Result;
use crate::diagnostics::Diagnostics;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};

/// Cap on how far in the future a delayed task can be scheduled
const MAX_DELAY: Duration = Duration::from_secs(60 * 60 * 24 * 365);

type Job = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

enum Command {
    Run(QueuedTask),
    Drain(oneshot::Sender<()>),
}

struct QueuedTask {
    label: &'static str,
    eligible_at: Instant,
    job: Job,
}

struct Scheduled {
    eligible_at: Instant,
    seq: u64,
    task: QueuedTask,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.eligible_at, self.seq).cmp(&(other.eligible_at, other.seq))
    }
}

/// Waiter released once every task received before it has run
struct Barrier {
    bound: u64,
    ack: oneshot::Sender<()>,
}

/// Serialized, delay-aware task queue backed by one worker thread.
#[derive(Debug)]
pub struct TaskQueue {
    name: String,
    diagnostics: Arc<dyn Diagnostics>,
    worker: OnceLock<Option<mpsc::UnboundedSender<Command>>>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Run(task) => f.debug_tuple("Run").field(&task.label).finish(),
            Self::Drain(_) => f.write_str("Drain"),
        }
    }
}

impl TaskQueue {
    /// Create a queue whose worker thread will be named `{name}-worker`.
    ///
    /// No thread is started until the first submission.
    #[must_use]
    pub fn new(name: impl Into<String>, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            name: name.into(),
            diagnostics,
            worker: OnceLock::new(),
        }
    }

    /// Whether the worker thread has been started
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.worker.get().is_some()
    }

    /// Queue `job` to run no earlier than `delay` from now.
    ///
    /// Returns immediately. Errors and panics raised by `job` are reported
    /// through diagnostics on the worker and do not affect later tasks.
    pub fn submit<F>(&self, label: &'static str, delay: Duration, job: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let task = QueuedTask {
            label,
            eligible_at: Instant::now() + delay.min(MAX_DELAY),
            job: Box::new(job),
        };
        let Some(sender) = self.sender() else {
            self.diagnostics.report(&Error::worker_unavailable(format!(
                "dropping task '{label}': worker failed to start"
            )));
            return;
        };
        if sender.send(Command::Run(task)).is_err() {
            self.diagnostics.report(&Error::worker_unavailable(format!(
                "dropping task '{label}': worker has stopped"
            )));
        }
    }

    /// Wait until every task submitted before this call has run.
    ///
    /// Delayed tasks are waited for. Returns immediately if nothing was ever
    /// submitted.
    pub async fn drain(&self) {
        if let Some(done) = self.request_drain() {
            let _ = done.await;
        }
    }

    /// Blocking variant of [`drain`](Self::drain).
    ///
    /// Must not be called from within an async runtime.
    pub fn drain_blocking(&self) {
        if let Some(done) = self.request_drain() {
            let _ = done.blocking_recv();
        }
    }

    fn request_drain(&self) -> Option<oneshot::Receiver<()>> {
        let sender = self.worker.get()?.as_ref()?;
        let (ack, done) = oneshot::channel();
        sender.send(Command::Drain(ack)).ok()?;
        Some(done)
    }

    fn sender(&self) -> Option<&mpsc::UnboundedSender<Command>> {
        self.worker.get_or_init(|| self.spawn_worker()).as_ref()
    }

    fn spawn_worker(&self) -> Option<mpsc::UnboundedSender<Command>> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let diagnostics = Arc::clone(&self.diagnostics);
        let spawned = std::thread::Builder::new()
            .name(format!("{}-worker", self.name))
            .spawn(move || worker_main(receiver, diagnostics));
        match spawned {
            Ok(_) => Some(sender),
            Err(e) => {
                self.diagnostics
                    .report(&Error::io_no_path(e, "spawn cache worker"));
                None
            }
        }
    }
}

fn worker_main(receiver: mpsc::UnboundedReceiver<Command>, diagnostics: Arc<dyn Diagnostics>) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            diagnostics.report(&Error::io_no_path(e, "build cache worker runtime"));
            return;
        }
    };
    runtime.block_on(run_worker(receiver, diagnostics.as_ref()));
}

async fn run_worker(mut receiver: mpsc::UnboundedReceiver<Command>, diagnostics: &dyn Diagnostics) {
    let mut schedule = Schedule::default();
    let mut open = true;

    loop {
        // Schedule everything already sent before picking the next task
        while open {
            match receiver.try_recv() {
                Ok(command) => schedule.accept(command),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => open = false,
            }
        }

        if let Some(task) = pop_due(&mut schedule.pending) {
            run_task(task, diagnostics);
            schedule.release_barriers();
            continue;
        }
        schedule.release_barriers();

        if !open && schedule.pending.is_empty() {
            break;
        }

        let deadline = schedule
            .pending
            .peek()
            .map(|Reverse(next)| next.eligible_at);
        tokio::select! {
            command = receiver.recv(), if open => match command {
                Some(command) => schedule.accept(command),
                None => open = false,
            },
            () = sleep_until(deadline) => {}
        }
    }
    diagnostics.debug("cache worker stopped");
}

/// Worker-side state: pending tasks and outstanding drain requests
#[derive(Default)]
struct Schedule {
    pending: BinaryHeap<Reverse<Scheduled>>,
    barriers: Vec<Barrier>,
    next_seq: u64,
}

impl Schedule {
    fn accept(&mut self, command: Command) {
        match command {
            Command::Run(task) => {
                self.pending.push(Reverse(Scheduled {
                    eligible_at: task.eligible_at,
                    seq: self.next_seq,
                    task,
                }));
                self.next_seq += 1;
            }
            Command::Drain(ack) => self.barriers.push(Barrier {
                bound: self.next_seq,
                ack,
            }),
        }
    }

    fn release_barriers(&mut self) {
        if self.barriers.is_empty() {
            return;
        }
        let oldest_pending = self.pending.iter().map(|Reverse(s)| s.seq).min();
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.barriers)
            .into_iter()
            .partition(|barrier| oldest_pending.is_none_or(|seq| seq >= barrier.bound));
        self.barriers = waiting;
        for barrier in ready {
            let _ = barrier.ack.send(());
        }
    }
}

fn pop_due(pending: &mut BinaryHeap<Reverse<Scheduled>>) -> Option<QueuedTask> {
    let due = pending
        .peek()
        .is_some_and(|Reverse(next)| next.eligible_at <= Instant::now());
    if due {
        pending.pop().map(|Reverse(scheduled)| scheduled.task)
    } else {
        None
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

fn run_task(task: QueuedTask, diagnostics: &dyn Diagnostics) {
    let QueuedTask { label, job, .. } = task;
    let started = Instant::now();
    match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => diagnostics.report(&e),
        Err(payload) => {
            diagnostics.report(&Error::task_failed(label, panic_message(payload.as_ref())));
        }
    }
    diagnostics.debug(&format!(
        "task '{label}' finished in {}ms",
        started.elapsed().as_millis()
    ));
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}
