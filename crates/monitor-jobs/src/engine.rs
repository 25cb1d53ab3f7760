//! Dispatcher managing a pool of persistent worker processes, each
//! driven by one OS thread. The queue is a shared priority heap; every
//! pool slot re-spawns its worker process on timeout, preemption, or
//! unexpected death, giving the "the worker process is not left alive"
//! and "one transparent retry" guarantees without sharing state across
//! slots.

use std::collections::{BinaryHeap, HashMap, HashSet};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use monitor_core::path::RepoPath;
use monitor_core::snapshot::SnapshotKey;
use monitor_core::status::Status;
use monitor_core::styled_text::StyledText;

use crate::priority::{Priority, QueuedJob};
use crate::wire;
use crate::worker::{WireJobSpec, WireOutcome, WireResult};

/// A worker slot may be preempted at most this often, so a burst of
/// cursor movement can't thrash the whole pool.
const PREEMPTION_COOLDOWN: Duration = Duration::from_millis(200);
/// Grace period between SIGTERM and SIGKILL, both on timeout and preemption.
const KILL_GRACE: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_TIMEOUT_S: u64 = 60;

pub type JobSpec = WireJobSpec;

#[derive(Debug, Clone)]
pub enum Outcome {
    Completed { status: Status, body: StyledText },
    TimedOut,
    /// Worker could not be spawned, or died and the one transparent
    /// retry also failed.
    Error(String),
    /// Killed to free a slot for higher-priority work; the engine has
    /// already requeued the same spec at its prior priority.
    Preempted,
}

#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub path: RepoPath,
    pub tool_name: String,
    pub snapshot_key: SnapshotKey,
    pub outcome: Outcome,
    pub started_at_ms: u64,
    pub finished_at_ms: u64,
}

struct RunningJob {
    priority: Priority,
    preempt_requested: Arc<AtomicBool>,
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

fn snapshot_key_hash(key: &SnapshotKey) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

type Queue = Arc<(Mutex<BinaryHeap<QueuedJob<JobSpec>>>, Condvar)>;
type InFlight = Arc<Mutex<HashMap<u64, RunningJob>>>;

pub struct JobEngine {
    queue: Queue,
    seq: AtomicU64,
    outcome_rx: Receiver<JobOutcome>,
    paused: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    in_flight: InFlight,
    last_preemption: Arc<Mutex<Instant>>,
    dedupe: Arc<Mutex<HashSet<(RepoPath, String, u64)>>>,
    workers: Vec<JoinHandle<()>>,
}

impl JobEngine {
    /// `worker_exe`/`worker_args` spawn one persistent worker process per
    /// pool slot — normally `std::env::current_exe()` plus `--worker-loop`.
    pub fn new(worker_count: usize, worker_exe: PathBuf, worker_args: Vec<String>) -> Self {
        let queue: Queue = Arc::new((Mutex::new(BinaryHeap::new()), Condvar::new()));
        let (outcome_tx, outcome_rx) = unbounded();
        let paused = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(AtomicBool::new(false));
        let in_flight: InFlight = Arc::new(Mutex::new(HashMap::new()));
        let last_preemption = Arc::new(Mutex::new(Instant::now() - PREEMPTION_COOLDOWN));

        let slot_count = worker_count.max(1);
        let mut workers = Vec::with_capacity(slot_count);
        for slot_id in 0..slot_count as u64 {
            let queue = queue.clone();
            let outcome_tx = outcome_tx.clone();
            let paused = paused.clone();
            let shutdown = shutdown.clone();
            let in_flight = in_flight.clone();
            let worker_exe = worker_exe.clone();
            let worker_args = worker_args.clone();
            workers.push(
                thread::Builder::new()
                    .name(format!("job-worker-{slot_id}"))
                    .spawn(move || worker_slot_loop(worker_exe, worker_args, queue, outcome_tx, paused, shutdown, in_flight, slot_id))
                    .expect("failed to spawn job worker thread"),
            );
        }

        Self {
            queue,
            seq: AtomicU64::new(0),
            outcome_rx,
            paused,
            shutdown,
            in_flight,
            last_preemption,
            dedupe: Arc::new(Mutex::new(HashSet::new())),
            workers,
        }
    }

    pub fn outcomes(&self) -> &Receiver<JobOutcome> {
        &self.outcome_rx
    }

    /// Enqueue a job unless an identical `(path, tool, snapshot_key)` job
    /// is already queued or running (duplicate suppression).
    pub fn submit(&self, spec: JobSpec, priority: Priority) {
        let dedupe_key = (spec.path.clone(), spec.descriptor.name.clone(), snapshot_key_hash(&spec.snapshot_key));
        {
            let mut seen = self.dedupe.lock().unwrap_or_else(|e| e.into_inner());
            if !seen.insert(dedupe_key) {
                return;
            }
        }
        let seq = self.seq.fetch_add(1, AtomicOrdering::Relaxed);
        let (lock, cvar) = &*self.queue;
        lock.lock().unwrap_or_else(|e| e.into_inner()).push(QueuedJob { priority, seq, payload: spec });
        cvar.notify_one();
    }

    /// Re-priority every queued job for a freshly focused path: anything
    /// for that path becomes `Focus`, same-tool jobs elsewhere become
    /// `SameToolAsFocus`, and everything else whose grid position is
    /// known (`position_of`) is scored into the `Proximity` tier by its
    /// Manhattan distance from `focused_pos`. A job whose position is
    /// unknown (its row left the grid between enqueue and refresh) keeps
    /// whatever tier it already had.
    pub fn refresh_priority(
        &self,
        focused_path: &RepoPath,
        focused_tool: Option<&str>,
        focused_pos: (usize, usize),
        position_of: impl Fn(&RepoPath, &str) -> Option<(usize, usize)>,
    ) {
        let (lock, _) = &*self.queue;
        let mut heap = lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut rescored: Vec<QueuedJob<JobSpec>> = std::mem::take(&mut *heap).into_vec();
        for job in &mut rescored {
            if &job.payload.path == focused_path {
                job.priority = Priority::Focus;
            } else if focused_tool == Some(job.payload.descriptor.name.as_str()) {
                job.priority = Priority::SameToolAsFocus;
            } else if let Some(pos) = position_of(&job.payload.path, &job.payload.descriptor.name) {
                let distance = pos.0.abs_diff(focused_pos.0) as u32 + pos.1.abs_diff(focused_pos.1) as u32;
                job.priority = Priority::Proximity(distance);
            }
        }
        *heap = rescored.into_iter().collect();
    }

    pub fn pause(&self) {
        self.paused.store(true, AtomicOrdering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, AtomicOrdering::SeqCst);
        let (_, cvar) = &*self.queue;
        cvar.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(AtomicOrdering::SeqCst)
    }

    /// Ask the engine to kill the lowest-priority running job strictly
    /// worse than `wanted`, freeing a slot. Rate-limited to one
    /// preemption per `PREEMPTION_COOLDOWN`. Returns whether a kill was
    /// requested.
    pub fn preempt_for(&self, wanted: Priority) -> bool {
        let mut last = self.last_preemption.lock().unwrap_or_else(|e| e.into_inner());
        if last.elapsed() < PREEMPTION_COOLDOWN {
            return false;
        }
        let in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        let victim = in_flight.values().filter(|j| j.priority > wanted && !j.preempt_requested.load(AtomicOrdering::SeqCst)).max_by_key(|j| j.priority);
        let Some(victim) = victim else { return false };
        victim.preempt_requested.store(true, AtomicOrdering::SeqCst);
        *last = Instant::now();
        true
    }

    pub fn clear_dedupe(&self, path: &RepoPath, tool_name: &str, snapshot_key: &SnapshotKey) {
        let key = (path.clone(), tool_name.to_string(), snapshot_key_hash(snapshot_key));
        self.dedupe.lock().unwrap_or_else(|e| e.into_inner()).remove(&key);
    }
}

impl Drop for JobEngine {
    fn drop(&mut self) {
        self.shutdown.store(true, AtomicOrdering::SeqCst);
        let (_, cvar) = &*self.queue;
        cvar.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

struct WorkerSlot {
    child: Child,
    stdin: ChildStdin,
    stdout: Arc<Mutex<ChildStdout>>,
    pgid: i32,
}

fn spawn_worker(worker_exe: &std::path::Path, worker_args: &[String]) -> std::io::Result<WorkerSlot> {
    let mut cmd = Command::new(worker_exe);
    cmd.args(worker_args);
    cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::null());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    let mut child = cmd.spawn()?;
    let stdin = child.stdin.take().expect("worker spawned with piped stdin");
    let stdout = child.stdout.take().expect("worker spawned with piped stdout");
    let pgid = child.id() as i32;
    Ok(WorkerSlot { child, stdin, stdout: Arc::new(Mutex::new(stdout)), pgid })
}

fn respawn_or_retry(worker_exe: &std::path::Path, worker_args: &[String]) -> WorkerSlot {
    loop {
        match spawn_worker(worker_exe, worker_args) {
            Ok(slot) => return slot,
            Err(e) => {
                tracing::error!("failed to respawn worker process: {e}; retrying");
                thread::sleep(Duration::from_millis(500));
            }
        }
    }
}

#[cfg(unix)]
fn terminate_worker(slot: &mut WorkerSlot) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let _ = killpg(Pid::from_raw(slot.pgid), Signal::SIGTERM);
    let deadline = Instant::now() + KILL_GRACE;
    loop {
        if matches!(slot.child.try_wait(), Ok(Some(_))) {
            return;
        }
        if Instant::now() >= deadline {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }
    let _ = killpg(Pid::from_raw(slot.pgid), Signal::SIGKILL);
    let _ = slot.child.wait();
}

#[cfg(not(unix))]
fn terminate_worker(slot: &mut WorkerSlot) {
    let _ = slot.child.kill();
    let _ = slot.child.wait();
}

enum DispatchResult {
    Completed(WireResult),
    TimedOut,
    Preempted,
    WorkerDied,
}

/// Send one job to `worker` and wait for its response, honoring the
/// descriptor's timeout and any preemption request raised through
/// `in_flight`. The caller is responsible for killing/respawning
/// `worker` when the result isn't `Completed`.
fn dispatch_one(worker: &mut WorkerSlot, spec: &JobSpec, priority: Priority, in_flight: &InFlight, slot_id: u64) -> DispatchResult {
    if wire::write_message(&mut worker.stdin, spec).is_err() {
        return DispatchResult::WorkerDied;
    }

    let preempt_requested = Arc::new(AtomicBool::new(false));
    in_flight.lock().unwrap_or_else(|e| e.into_inner()).insert(slot_id, RunningJob { priority, preempt_requested: preempt_requested.clone() });

    let (tx, rx) = crossbeam_channel::bounded(1);
    let stdout = worker.stdout.clone();
    thread::spawn(move || {
        let mut guard = stdout.lock().unwrap_or_else(|e| e.into_inner());
        let result = wire::read_message::<WireResult>(&mut *guard);
        let _ = tx.send(result);
    });

    let timeout_s = if spec.descriptor.timeout_s == 0 { DEFAULT_TIMEOUT_S } else { spec.descriptor.timeout_s };
    let deadline = Instant::now() + Duration::from_secs(timeout_s);
    let result = loop {
        if preempt_requested.load(AtomicOrdering::SeqCst) {
            break DispatchResult::Preempted;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break DispatchResult::TimedOut;
        }
        match rx.recv_timeout(remaining.min(POLL_INTERVAL)) {
            Ok(Ok(Some(wire_result))) => break DispatchResult::Completed(wire_result),
            Ok(Ok(None)) | Ok(Err(_)) => break DispatchResult::WorkerDied,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break DispatchResult::WorkerDied,
        }
    };

    in_flight.lock().unwrap_or_else(|e| e.into_inner()).remove(&slot_id);
    result
}

fn pop_next_job(queue: &Queue, paused: &Arc<AtomicBool>, shutdown: &Arc<AtomicBool>) -> Option<(Priority, JobSpec)> {
    let (lock, cvar) = &**queue;
    let mut heap = lock.lock().unwrap_or_else(|e| e.into_inner());
    loop {
        if shutdown.load(AtomicOrdering::SeqCst) {
            return None;
        }
        if !paused.load(AtomicOrdering::SeqCst) {
            if let Some(job) = heap.pop() {
                return Some((job.priority, job.payload));
            }
        }
        let (guard, _) = cvar.wait_timeout(heap, Duration::from_millis(200)).unwrap_or_else(|e| e.into_inner());
        heap = guard;
    }
}

/// Requeue a preempted job at the priority it was running under; a
/// later `refresh_priority` will rescore it against the cursor if it
/// falls in the `Proximity` tier.
fn requeue(queue: &Queue, spec: JobSpec, priority: Priority) {
    let (lock, cvar) = &**queue;
    lock.lock().unwrap_or_else(|e| e.into_inner()).push(QueuedJob { priority, seq: 0, payload: spec });
    cvar.notify_one();
}

fn send_outcome(outcome_tx: &Sender<JobOutcome>, spec: &JobSpec, outcome: Outcome, started_at_ms: u64, finished_at_ms: u64) {
    let _ = outcome_tx.send(JobOutcome {
        path: spec.path.clone(),
        tool_name: spec.descriptor.name.clone(),
        snapshot_key: spec.snapshot_key.clone(),
        outcome,
        started_at_ms,
        finished_at_ms,
    });
}

fn wire_outcome_to_outcome(wire: WireOutcome) -> Outcome {
    match wire {
        WireOutcome::Completed { status, body } => Outcome::Completed { status, body },
        WireOutcome::Error(e) => Outcome::Error(e),
    }
}

#[allow(clippy::too_many_arguments)]
fn worker_slot_loop(
    worker_exe: PathBuf,
    worker_args: Vec<String>,
    queue: Queue,
    outcome_tx: Sender<JobOutcome>,
    paused: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    in_flight: InFlight,
    slot_id: u64,
) {
    let mut worker = match spawn_worker(&worker_exe, &worker_args) {
        Ok(w) => w,
        Err(e) => {
            tracing::error!("job worker {slot_id} failed to start: {e}");
            return;
        }
    };

    loop {
        let Some((priority, spec)) = pop_next_job(&queue, &paused, &shutdown) else {
            terminate_worker(&mut worker);
            return;
        };

        match dispatch_one(&mut worker, &spec, priority, &in_flight, slot_id) {
            DispatchResult::Completed(result) => {
                send_outcome(&outcome_tx, &spec, wire_outcome_to_outcome(result.outcome), result.started_at_ms, result.finished_at_ms);
            }
            DispatchResult::TimedOut => {
                terminate_worker(&mut worker);
                worker = respawn_or_retry(&worker_exe, &worker_args);
                send_outcome(&outcome_tx, &spec, Outcome::TimedOut, now_ms(), now_ms());
            }
            DispatchResult::Preempted => {
                terminate_worker(&mut worker);
                worker = respawn_or_retry(&worker_exe, &worker_args);
                requeue(&queue, spec.clone(), priority);
                send_outcome(&outcome_tx, &spec, Outcome::Preempted, now_ms(), now_ms());
            }
            DispatchResult::WorkerDied => {
                terminate_worker(&mut worker);
                worker = respawn_or_retry(&worker_exe, &worker_args);
                match dispatch_one(&mut worker, &spec, priority, &in_flight, slot_id) {
                    DispatchResult::Completed(result) => {
                        send_outcome(&outcome_tx, &spec, wire_outcome_to_outcome(result.outcome), result.started_at_ms, result.finished_at_ms);
                    }
                    _ => {
                        terminate_worker(&mut worker);
                        worker = respawn_or_retry(&worker_exe, &worker_args);
                        send_outcome(&outcome_tx, &spec, Outcome::Error("worker died twice".to_string()), now_ms(), now_ms());
                    }
                }
            }
        }
        if shutdown.load(AtomicOrdering::SeqCst) {
            terminate_worker(&mut worker);
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_core::model::{ExitClassifier, ToolDescriptor};
    use monitor_core::snapshot::FileSnapshot;
    use monitor_core::styled_text::Color;
    use std::sync::Arc as StdArc;
    use std::time::Duration as StdDuration;

    fn test_worker_exe() -> PathBuf {
        PathBuf::from(env!("CARGO_BIN_EXE_test-worker"))
    }

    fn descriptor(name: &str, argv: &[&str], timeout_s: u64) -> StdArc<ToolDescriptor> {
        StdArc::new(ToolDescriptor {
            name: name.to_string(),
            color: Color::Default,
            argv_template: argv.iter().map(|s| s.to_string()).collect(),
            timeout_s,
            version_tag: 1,
            classifier: ExitClassifier::ZeroIsOk,
            universal: true,
        })
    }

    fn snapshot_key() -> SnapshotKey {
        let s = FileSnapshot { size: 1, mtime_ns: 1, mode: 0o644, ino: 1, mountdev: 1, content_digest: None };
        SnapshotKey::from_snapshot(&s, 1)
    }

    fn spec(descriptor: StdArc<ToolDescriptor>) -> JobSpec {
        JobSpec {
            path: RepoPath::new("a.txt").unwrap(),
            absolute_path: PathBuf::from("/dev/null"),
            descriptor: (*descriptor).clone(),
            snapshot_key: snapshot_key(),
        }
    }

    #[test]
    fn runs_a_trivial_job_to_completion() {
        let engine = JobEngine::new(1, test_worker_exe(), Vec::new());
        engine.submit(spec(descriptor("true_tool", &["true"], 5)), Priority::Focus);
        let outcome = engine.outcomes().recv_timeout(StdDuration::from_secs(10)).unwrap();
        assert!(matches!(outcome.outcome, Outcome::Completed { status: Status::Ok, .. }));
    }

    #[test]
    fn duplicate_submission_is_suppressed() {
        let engine = JobEngine::new(1, test_worker_exe(), Vec::new());
        engine.pause();
        let s = spec(descriptor("noop", &["true"], 5));
        engine.submit(s.clone(), Priority::Background);
        engine.submit(s, Priority::Focus);
        let (lock, _) = &*engine.queue;
        assert_eq!(lock.lock().unwrap().len(), 1);
    }

    #[test]
    fn missing_executable_reports_error_outcome() {
        let engine = JobEngine::new(1, test_worker_exe(), Vec::new());
        engine.submit(spec(descriptor("nonexistent_tool_xyz", &["nonexistent_tool_xyz"], 5)), Priority::Focus);
        let outcome = engine.outcomes().recv_timeout(StdDuration::from_secs(10)).unwrap();
        assert!(matches!(outcome.outcome, Outcome::Error(_)));
    }
}
