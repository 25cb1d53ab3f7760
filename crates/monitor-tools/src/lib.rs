//! File classification and the built-in analyzer tool registry.

pub mod builtin;
pub mod classify;
pub mod registry;

pub use builtin::{RegisteredTool, seed_tools};
pub use classify::classify;
pub use registry::ToolRegistry;
