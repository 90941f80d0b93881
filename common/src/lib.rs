//! Common building blocks of `gfcat`: read one file from a Gluster-style volume and stream it
//! out while holding an exclusive lock on it.
//!
//! - [`url`] parses `glfs://host[:port]/volume/path` locators
//! - [`xlator`] parses and accumulates `xlator.key=value` translator options
//! - [`session`] connects to a volume, configures it and tears it down
//! - [`cat`] copies a file to a sink under an exclusive, non-blocking lock
//! - [`volume`] is the interface to the storage runtime, [`export`] a runtime serving volumes
//!   from a local directory
//!
//! # Logging
//!
//! All diagnostics go through `tracing`; [`init_tracing`] installs a stderr subscriber whose
//! level comes from `RUST_LOG` or, when unset, from [`config::OutputConfig`].

pub mod cat;
pub mod config;
pub mod error;
pub mod export;
pub mod session;
pub mod url;
pub mod version;
pub mod volume;
pub mod xlator;

#[cfg(any(test, feature = "testutils"))]
pub mod testutils;

pub use cat::cat_locked;
pub use config::{CallerDefaults, ExportConfig, OutputConfig};
pub use error::{Error, ErrorKind, Result, Stage};
pub use session::Session;
pub use url::{GLUSTER_DEFAULT_PORT, GlusterUrl, VolumePath};
pub use xlator::{XlatorOption, XlatorOptions};

/// Installs the stderr subscriber, a no-op if the process already has one.
pub fn init_tracing(output: &OutputConfig) {
    let default_level = tracing_subscriber::filter::LevelFilter::from(output.level());
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Sets up logging and runs `func` to completion on a single-threaded runtime.
pub fn run<Func, Fut, T>(output: OutputConfig, func: Func) -> anyhow::Result<T>
where
    Func: FnOnce() -> Fut,
    Fut: std::future::Future<Output = T>,
{
    init_tracing(&output);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| anyhow::anyhow!("failed to start runtime: {:#}", err))?;
    Ok(runtime.block_on(func()))
}
