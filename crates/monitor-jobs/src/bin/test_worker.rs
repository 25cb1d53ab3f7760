//! Standalone worker process used by integration tests, which can't
//! reasonably spawn the full `monitor` binary just to exercise the
//! worker protocol.

fn main() {
    monitor_jobs::worker::run_worker_loop();
}
