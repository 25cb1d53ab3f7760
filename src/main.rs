mod app;
mod cli;
mod config;
mod error;
mod keymap;
mod presenter;
mod terminal;

use clap::Parser;

use app::{App, APPNAME};
use cli::CliArgs;
use config::MonitorConfig;
use error::AppError;
use terminal::TerminalGuard;

fn init_logging(root: &std::path::Path) -> tracing_appender::non_blocking::WorkerGuard {
    let log_dir = root.join(format!(".{APPNAME}")).join("logs");
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(log_dir, "monitor.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = tracing_subscriber::EnvFilter::try_from_env("MONITOR_LOG").unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(non_blocking).with_ansi(false).init();
    guard
}

fn print_info(root: &std::path::Path) {
    let registry = monitor_tools::ToolRegistry::with_builtins();
    println!("monitor — continuous multi-tool analysis grid");
    println!("codebase root: {}", root.display());
    println!();
    println!("{:<16} {:<10} {}", "tool", "universal", "argv template");
    for descriptor in registry.all_descriptors() {
        let available = registry.is_available(descriptor);
        let marker = if available { " " } else { " (unavailable) " };
        println!("{:<16} {:<10} {}{}", descriptor.name, descriptor.universal, descriptor.argv_template.join(" "), marker);
    }
}

fn run() -> Result<(), AppError> {
    let cli = CliArgs::parse();

    if cli.worker_loop {
        monitor_jobs::worker::run_worker_loop();
    }

    let root = app::codebase_root(cli.directory.as_deref())?;

    if cli.info {
        print_info(&root);
        return Ok(());
    }

    let _log_guard = init_logging(&root);
    tracing::info!("starting monitor over {}", root.display());

    let config = MonitorConfig::load(&root, &cli);
    let mut app = App::new(root, config)?;

    let mut terminal = TerminalGuard::enter()?;
    let result = app.run(&mut terminal);
    drop(terminal);
    result
}

fn main() {
    if let Err(e) = run() {
        eprintln!("monitor: {e}");
        std::process::exit(e.exit_code());
    }
}
