//! Configuration types for output, sessions and the bundled export runtime

/// Environment variable naming the directory local volumes are exported from.
pub const EXPORT_DIR_ENV: &str = "GFCAT_EXPORT_DIR";

pub const DEFAULT_EXPORT_DIR: &str = "/var/lib/gfcat/exports";

/// Where the session's own diagnostics go when debugging is enabled.
pub const DEBUG_LOG_SINK: &str = "/dev/stderr";

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Log at DEBUG instead of ERROR
    pub debug: bool,
}

impl OutputConfig {
    pub fn level(&self) -> tracing::Level {
        if self.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::ERROR
        }
    }
}

/// Defaults supplied by a long-lived caller (e.g. an interactive shell) invoking the command.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallerDefaults {
    pub debug: bool,
}

/// Settings of the local export runtime
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Volume `V` is served from `<root>/V`
    pub root: std::path::PathBuf,
}

impl ExportConfig {
    pub fn from_env() -> Self {
        let root = std::env::var_os(EXPORT_DIR_ENV)
            .filter(|value| !value.is_empty())
            .map_or_else(|| DEFAULT_EXPORT_DIR.into(), std::path::PathBuf::from);
        Self { root }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            root: DEFAULT_EXPORT_DIR.into(),
        }
    }
}
