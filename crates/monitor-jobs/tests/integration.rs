//! Exercises `JobEngine` against the real `test-worker` process, the
//! same binary convention the root crate's `--worker-loop` mode follows.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use monitor_core::model::{ExitClassifier, ToolDescriptor};
use monitor_core::path::RepoPath;
use monitor_core::snapshot::{FileSnapshot, SnapshotKey};
use monitor_core::status::Status;
use monitor_core::styled_text::Color;
use monitor_jobs::engine::{JobEngine, JobSpec, Outcome};
use monitor_jobs::priority::Priority;

fn test_worker_exe() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_test-worker"))
}

fn snapshot_key() -> SnapshotKey {
    let s = FileSnapshot { size: 1, mtime_ns: 1, mode: 0o644, ino: 1, mountdev: 1, content_digest: None };
    SnapshotKey::from_snapshot(&s, 1)
}

fn spec(name: &str, argv: &[&str], timeout_s: u64) -> JobSpec {
    JobSpec {
        path: RepoPath::new(format!("{name}.txt")).unwrap(),
        absolute_path: PathBuf::from("/dev/null"),
        descriptor: ToolDescriptor {
            name: name.to_string(),
            color: Color::Default,
            argv_template: argv.iter().map(|s| s.to_string()).collect(),
            timeout_s,
            version_tag: 1,
            classifier: ExitClassifier::ZeroIsOk,
            universal: true,
        },
        snapshot_key: snapshot_key(),
    }
}

#[test]
fn completes_several_jobs_across_a_small_pool() {
    let engine = JobEngine::new(2, test_worker_exe(), Vec::new());
    for i in 0..6 {
        engine.submit(spec(&format!("ok{i}"), &["true"], 5), Priority::Background);
    }
    let mut completed = 0;
    for _ in 0..6 {
        let outcome = engine.outcomes().recv_timeout(Duration::from_secs(15)).expect("job outcome");
        if matches!(outcome.outcome, Outcome::Completed { status: Status::Ok, .. }) {
            completed += 1;
        }
    }
    assert_eq!(completed, 6);
}

#[test]
fn timeout_reports_timed_out_and_the_slot_keeps_serving() {
    let engine = JobEngine::new(1, test_worker_exe(), Vec::new());
    engine.submit(spec("slow", &["sleep", "30"], 1), Priority::Focus);
    let first = engine.outcomes().recv_timeout(Duration::from_secs(10)).expect("timeout outcome");
    assert!(matches!(first.outcome, Outcome::TimedOut));

    engine.submit(spec("after-timeout", &["true"], 5), Priority::Focus);
    let second = engine.outcomes().recv_timeout(Duration::from_secs(10)).expect("job after respawn");
    assert!(matches!(second.outcome, Outcome::Completed { status: Status::Ok, .. }));
}

#[test]
fn preempt_for_kills_a_lower_priority_running_job() {
    let engine = Arc::new(JobEngine::new(1, test_worker_exe(), Vec::new()));
    engine.submit(spec("background-sleep", &["sleep", "30"], 60), Priority::Background);

    // Give the slot time to actually start running it before preempting.
    std::thread::sleep(Duration::from_millis(300));
    let preempted = engine.preempt_for(Priority::Focus);
    assert!(preempted);

    let outcome = engine.outcomes().recv_timeout(Duration::from_secs(10)).expect("preempted outcome");
    assert!(matches!(outcome.outcome, Outcome::Preempted));

    // The requeued job should still complete once resubmitted behavior settles.
    engine.submit(spec("after-preempt", &["true"], 5), Priority::Focus);
    let follow_up = engine.outcomes().recv_timeout(Duration::from_secs(10)).expect("job after preempt");
    assert!(matches!(follow_up.outcome, Outcome::Completed { .. } | Outcome::Preempted));
}

#[test]
fn duplicate_submissions_collapse_to_one_outcome() {
    let engine = JobEngine::new(1, test_worker_exe(), Vec::new());
    let s = spec("dup", &["true"], 5);
    engine.submit(s.clone(), Priority::Background);
    engine.submit(s, Priority::Focus);
    let first = engine.outcomes().recv_timeout(Duration::from_secs(10)).expect("first outcome");
    assert!(matches!(first.outcome, Outcome::Completed { status: Status::Ok, .. }));
    assert!(engine.outcomes().recv_timeout(Duration::from_millis(500)).is_err());
}
