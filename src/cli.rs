//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "monitor", about = "Continuous multi-tool analysis grid over a source-code directory")]
pub struct CliArgs {
    /// Codebase root to monitor. Defaults to the current directory.
    pub directory: Option<PathBuf>,

    /// Print the classification/tool matrix and exit without entering the alt-screen.
    #[arg(short = 'i', long)]
    pub info: bool,

    /// Override the default worker-process pool size.
    #[arg(short = 'w', long, value_name = "N")]
    pub workers: Option<usize>,

    /// Override `$EDITOR`/`$VISUAL`.
    #[arg(short = 'e', long, value_name = "CMD")]
    pub editor: Option<String>,

    /// Syntax highlight theme name.
    #[arg(short = 't', long, value_name = "NAME")]
    pub theme: Option<String>,

    /// Cache blob compression level, 0..9.
    #[arg(short = 'c', long, value_name = "LEVEL")]
    pub compression: Option<u32>,

    /// Hidden entry point: run as a persistent worker process reading
    /// `JobSpec` messages from stdin, never entering the alt-screen.
    #[arg(long, hide = true)]
    pub worker_loop: bool,
}
