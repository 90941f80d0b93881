//! Interface to the storage runtime providing volume sessions.
//!
//! gfcat treats the runtime as an opaque capability provider: it connects to a volume,
//! configures translators, opens files and takes locks, and only ever looks at the returned
//! results. All traits are object-safe, so a caller that already holds a session can hand it
//! over as `&dyn Volume`.

use async_trait::async_trait;

use crate::url::GlusterUrl;
use crate::xlator::XlatorOption;

/// Advisory lock mode, mirrors `F_RDLCK` / `F_WRLCK`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LockKind {
    Read,
    Write,
}

/// Builds sessions for a host/volume/port triple.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &GlusterUrl) -> anyhow::Result<Box<dyn Volume>>;
}

/// An established session to one volume.
#[async_trait]
pub trait Volume: Send + Sync + std::fmt::Debug {
    /// Sets one translator option, must happen before any file is opened.
    async fn set_xlator_option(&mut self, option: &XlatorOption) -> anyhow::Result<()>;

    /// Redirects the runtime's own diagnostics to `sink`.
    async fn set_logging(&mut self, sink: &std::path::Path, level: tracing::Level)
    -> anyhow::Result<()>;

    /// Opens `path` read-only.
    async fn open(&self, path: &str) -> std::io::Result<Box<dyn VolumeFile>>;

    /// Tears the session down, the session must not be used afterwards.
    async fn fini(self: Box<Self>) -> anyhow::Result<()>;
}

/// An open file on a volume.
#[async_trait]
pub trait VolumeFile: tokio::io::AsyncRead + Send + Unpin + std::fmt::Debug {
    /// Takes a whole-file lock without waiting, fails if another holder conflicts.
    fn try_lock(&mut self, kind: LockKind) -> std::io::Result<()>;

    /// Closes the handle, releasing any lock held through it.
    async fn close(self: Box<Self>) -> std::io::Result<()>;
}
