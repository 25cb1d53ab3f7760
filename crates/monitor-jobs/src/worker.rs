//! The worker side of the IPC channel: a long-lived process that reads
//! `WireJobSpec` messages from stdin, runs the tool, and writes back a
//! `WireResult` (spec.md §5: "each worker is a long-lived child that
//! reads job messages over a pipe/socket, executes the tool, captures
//! stdout+stderr, classifies the exit, bundles the Result").
//!
//! Both the `monitor` binary's hidden `--worker-loop` mode and the
//! `test-worker` fixture binary call [`run_worker_loop`] directly.

use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use monitor_core::model::ToolDescriptor;
use monitor_core::path::RepoPath;
use monitor_core::snapshot::SnapshotKey;
use monitor_core::status::Status;
use monitor_core::styled_text::StyledText;

use crate::wire;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireJobSpec {
    pub path: RepoPath,
    pub absolute_path: PathBuf,
    pub descriptor: ToolDescriptor,
    pub snapshot_key: SnapshotKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WireOutcome {
    Completed { status: Status, body: StyledText },
    Error(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireResult {
    pub outcome: WireOutcome,
    pub started_at_ms: u64,
    pub finished_at_ms: u64,
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

fn execute(spec: &WireJobSpec) -> WireResult {
    let started_at_ms = now_ms();
    let argv = spec.descriptor.argv_for(&spec.absolute_path);
    let outcome = match argv.split_first() {
        None => WireOutcome::Error("empty argv template".to_string()),
        Some((program, args)) => {
            match Command::new(program).args(args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped()).output() {
                Ok(output) => {
                    let status =
                        spec.descriptor.classifier.classify(output.status.code(), output.stdout.is_empty(), output.stderr.is_empty());
                    // Prefer stdout for the body; fall back to stderr so a
                    // tool that only reports on stderr (several linters do)
                    // still gets a readable body instead of an empty one.
                    let raw = if output.stdout.is_empty() { &output.stderr } else { &output.stdout };
                    let body = StyledText::from_ansi(&String::from_utf8_lossy(raw));
                    WireOutcome::Completed { status, body }
                }
                Err(e) => WireOutcome::Error(format!("failed to spawn {program}: {e}")),
            }
        }
    };
    WireResult { outcome, started_at_ms, finished_at_ms: now_ms() }
}

/// Blocks forever, servicing one job at a time from stdin/stdout. Exits
/// the process when stdin closes (the engine dropped our handle) or on
/// an unrecoverable framing error.
pub fn run_worker_loop() -> ! {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut reader = stdin.lock();
    let mut writer = stdout.lock();
    loop {
        match wire::read_message::<WireJobSpec>(&mut reader) {
            Ok(Some(spec)) => {
                let result = execute(&spec);
                if wire::write_message(&mut writer, &result).is_err() {
                    std::process::exit(1);
                }
            }
            Ok(None) => std::process::exit(0),
            Err(_) => std::process::exit(1),
        }
    }
}

/// Used only by tests that want `execute` without the process-loop
/// wrapper (keeps `run_worker_loop`'s infinite loop out of unit tests).
#[cfg(test)]
pub(crate) fn execute_for_test(spec: &WireJobSpec) -> WireResult {
    execute(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_core::model::ExitClassifier;
    use monitor_core::snapshot::FileSnapshot;
    use monitor_core::styled_text::Color;

    fn snapshot_key() -> SnapshotKey {
        let s = FileSnapshot { size: 1, mtime_ns: 1, mode: 0o644, ino: 1, mountdev: 1, content_digest: None };
        SnapshotKey::from_snapshot(&s, 1)
    }

    #[test]
    fn executes_a_trivial_tool() {
        let spec = WireJobSpec {
            path: RepoPath::new("a.txt").unwrap(),
            absolute_path: PathBuf::from("/dev/null"),
            descriptor: ToolDescriptor {
                name: "true".to_string(),
                color: Color::Default,
                argv_template: vec!["true".to_string()],
                timeout_s: 5,
                version_tag: 1,
                classifier: ExitClassifier::ZeroIsOk,
                universal: true,
            },
            snapshot_key: snapshot_key(),
        };
        let result = execute_for_test(&spec);
        assert!(matches!(result.outcome, WireOutcome::Completed { status: Status::Ok, .. }));
    }

    #[test]
    fn stderr_only_output_is_classified_and_kept_as_the_body() {
        let spec = WireJobSpec {
            path: RepoPath::new("a.txt").unwrap(),
            absolute_path: PathBuf::from("/dev/null"),
            descriptor: ToolDescriptor {
                name: "stderr_tool".to_string(),
                color: Color::Default,
                argv_template: vec!["sh".to_string(), "-c".to_string(), "echo oops 1>&2; exit 1".to_string()],
                timeout_s: 5,
                version_tag: 1,
                classifier: ExitClassifier::ZeroOkStdoutProblem,
                universal: true,
            },
            snapshot_key: snapshot_key(),
        };
        let result = execute_for_test(&spec);
        match result.outcome {
            WireOutcome::Completed { status, body } => {
                assert_eq!(status, Status::Problem);
                let text: String = body.runs().iter().map(|r| r.text.as_str()).collect();
                assert!(text.contains("oops"));
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[test]
    fn missing_executable_yields_error_outcome() {
        let spec = WireJobSpec {
            path: RepoPath::new("a.txt").unwrap(),
            absolute_path: PathBuf::from("/dev/null"),
            descriptor: ToolDescriptor {
                name: "nonexistent_tool_xyz".to_string(),
                color: Color::Default,
                argv_template: vec!["nonexistent_tool_xyz".to_string()],
                timeout_s: 5,
                version_tag: 1,
                classifier: ExitClassifier::ZeroIsOk,
                universal: true,
            },
            snapshot_key: snapshot_key(),
        };
        let result = execute_for_test(&spec);
        assert!(matches!(result.outcome, WireOutcome::Error(_)));
    }
}
