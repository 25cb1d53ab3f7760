//! Layered configuration: built-in defaults, an optional `monitor.toml`
//! at the codebase root, environment variables, then CLI flags —
//! each layer overriding the previous one.

use std::path::Path;

use serde::Deserialize;

use crate::cli::CliArgs;

const DEFAULT_WORKERS: usize = 4;
const DEFAULT_THEME: &str = "default";
const DEFAULT_COMPRESSION: u32 = 6;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub workers: usize,
    pub editor: Option<String>,
    pub theme: String,
    pub compression: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { workers: DEFAULT_WORKERS, editor: None, theme: DEFAULT_THEME.to_string(), compression: DEFAULT_COMPRESSION }
    }
}

/// Shape of an optional `monitor.toml` at the codebase root. Every field
/// is optional; an absent or unreadable file simply means this layer
/// contributes nothing.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    workers: Option<usize>,
    editor: Option<String>,
    theme: Option<String>,
    compression: Option<u32>,
}

fn load_file_config(root: &Path) -> FileConfig {
    let path = root.join("monitor.toml");
    let Ok(raw) = std::fs::read_to_string(&path) else { return FileConfig::default() };
    match toml::from_str(&raw) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("ignoring malformed monitor.toml: {e}");
            FileConfig::default()
        }
    }
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok()?.parse().ok()
}

fn env_u32(name: &str) -> Option<u32> {
    std::env::var(name).ok()?.parse().ok()
}

impl MonitorConfig {
    /// Build the effective configuration: defaults, then `monitor.toml`,
    /// then `MONITOR_*` environment variables, then CLI flags.
    pub fn load(root: &Path, cli: &CliArgs) -> Self {
        let mut cfg = Self::default();
        let file = load_file_config(root);

        if let Some(w) = file.workers {
            cfg.workers = w;
        }
        if let Some(e) = file.editor {
            cfg.editor = Some(e);
        }
        if let Some(t) = file.theme {
            cfg.theme = t;
        }
        if let Some(c) = file.compression {
            cfg.compression = c;
        }

        if let Some(w) = env_usize("MONITOR_WORKERS") {
            cfg.workers = w;
        }
        if let Ok(e) = std::env::var("MONITOR_EDITOR") {
            cfg.editor = Some(e);
        }
        if let Ok(t) = std::env::var("MONITOR_THEME") {
            cfg.theme = t;
        }
        if let Some(c) = env_u32("MONITOR_COMPRESSION") {
            cfg.compression = c;
        }

        if let Some(w) = cli.workers {
            cfg.workers = w;
        }
        if let Some(e) = &cli.editor {
            cfg.editor = Some(e.clone());
        }
        if let Some(t) = &cli.theme {
            cfg.theme = t.clone();
        }
        if let Some(c) = cli.compression {
            cfg.compression = c;
        }

        cfg.compression = cfg.compression.min(9);
        cfg.workers = cfg.workers.max(1);
        cfg
    }

    /// `$EDITOR`/`$VISUAL`, with the config override taking precedence.
    pub fn editor_command(&self) -> String {
        self.editor
            .clone()
            .or_else(|| std::env::var("EDITOR").ok())
            .or_else(|| std::env::var("VISUAL").ok())
            .unwrap_or_else(|| "vi".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cli() -> CliArgs {
        CliArgs { directory: None, info: false, workers: None, editor: None, theme: None, compression: None, worker_loop: false }
    }

    #[test]
    fn defaults_apply_with_no_overrides() {
        let dir = tempdir().unwrap();
        let cfg = MonitorConfig::load(dir.path(), &cli());
        assert_eq!(cfg.workers, DEFAULT_WORKERS);
        assert_eq!(cfg.theme, DEFAULT_THEME);
    }

    #[test]
    fn file_config_overrides_defaults() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("monitor.toml"), "workers = 8\ntheme = \"solarized\"\n").unwrap();
        let cfg = MonitorConfig::load(dir.path(), &cli());
        assert_eq!(cfg.workers, 8);
        assert_eq!(cfg.theme, "solarized");
    }

    #[test]
    fn cli_flags_override_everything() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("monitor.toml"), "workers = 8\n").unwrap();
        let mut args = cli();
        args.workers = Some(2);
        let cfg = MonitorConfig::load(dir.path(), &args);
        assert_eq!(cfg.workers, 2);
    }

    #[test]
    fn compression_is_clamped_to_nine() {
        let dir = tempdir().unwrap();
        let mut args = cli();
        args.compression = Some(20);
        let cfg = MonitorConfig::load(dir.path(), &args);
        assert_eq!(cfg.compression, 9);
    }
}
