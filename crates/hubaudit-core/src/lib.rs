pub mod audit;
pub mod cancel;
pub mod client;
pub mod config;
pub mod project;
pub mod report;
pub mod rules;
pub mod session;
pub mod snapshot;

pub const TOOL_NAME: &str = "hubaudit";

/// Version stamped into every report as `tool_version`.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");
