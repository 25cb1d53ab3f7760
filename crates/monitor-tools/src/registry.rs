//! Availability-checked registry of analyzer tools.

use std::collections::HashSet;

use monitor_core::model::ToolDescriptor;

use crate::builtin::{RegisteredTool, seed_tools};

/// The executable a tool's argv template invokes — the first token that
/// isn't itself a path placeholder.
fn executable_of(tool: &ToolDescriptor) -> Option<&str> {
    tool.argv_template.first().map(|s| s.as_str())
}

pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    available: HashSet<String>,
}

impl ToolRegistry {
    /// Build the registry from the built-in seed data, probing each
    /// distinct executable with `which` once at startup. Tools whose
    /// executable is missing are kept (so they still show up in any
    /// listing) but marked unavailable; `applicable_tools` elides them
    /// with a single warning rather than failing per file.
    pub fn with_builtins() -> Self {
        let tools = seed_tools();
        let mut available = HashSet::new();
        let mut probed = HashSet::new();
        for tool in &tools {
            let Some(exe) = executable_of(&tool.descriptor) else { continue };
            if !probed.insert(exe.to_string()) {
                continue;
            }
            match which::which(exe) {
                Ok(_) => {
                    available.insert(exe.to_string());
                }
                Err(_) => {
                    tracing::warn!("tool executable not found on PATH, disabling: {exe}");
                }
            }
        }
        Self { tools, available }
    }

    pub fn is_available(&self, descriptor: &ToolDescriptor) -> bool {
        executable_of(descriptor).map(|exe| self.available.contains(exe)).unwrap_or(false)
    }

    /// Tools that apply to a file classified as `language`, plus every
    /// universal tool, filtered to those whose executable was found.
    pub fn applicable_tools(&self, language: &str) -> Vec<&ToolDescriptor> {
        self.tools
            .iter()
            .filter(|t| t.descriptor.universal || t.languages.contains(&language))
            .map(|t| &t.descriptor)
            .filter(|d| self.is_available(d))
            .collect()
    }

    pub fn all_descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter().map(|t| &t.descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn universal_tools_apply_to_every_language() {
        let registry = ToolRegistry::with_builtins();
        let python_tools = registry.applicable_tools("python");
        let rust_tools = registry.applicable_tools("rust");
        let python_universal: HashSet<&str> =
            python_tools.iter().filter(|d| d.universal).map(|d| d.name.as_str()).collect();
        let rust_universal: HashSet<&str> = rust_tools.iter().filter(|d| d.universal).map(|d| d.name.as_str()).collect();
        assert_eq!(python_universal, rust_universal);
    }

    #[test]
    fn language_specific_tools_do_not_leak_across_languages() {
        let registry = ToolRegistry::with_builtins();
        let python_tools: HashSet<&str> = registry.applicable_tools("python").iter().map(|d| d.name.as_str()).collect();
        assert!(!python_tools.contains("rustfmt_check"));
    }

    #[test]
    fn missing_executable_is_elided_not_erroring() {
        // `with_builtins` must never panic even when most tools below
        // are missing from a minimal test sandbox's PATH.
        let registry = ToolRegistry::with_builtins();
        let _ = registry.applicable_tools("python");
    }
}
