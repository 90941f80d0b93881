//! Runtime serving volumes from a local export directory.
//!
//! Volume `V` is the directory `<root>/V`. Only hosts that resolve to this machine are
//! accepted. Locks are open file description locks (`F_OFD_SETLK`): they belong to the open
//! handle, conflict with every other handle on the same file (including ones opened by this
//! process) and go away when the handle is closed.
//!
//! The kernel only grants `F_WRLCK` on a descriptor open for writing, so backing files are
//! opened read-write even though the volume interface never writes. Exported files must be
//! writable by the serving user.

use std::io::Write;
use std::os::fd::IntoRawFd;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use tracing::instrument;

use crate::config::ExportConfig;
use crate::url::GlusterUrl;
use crate::volume::{Connector, LockKind, Volume, VolumeFile};
use crate::xlator::XlatorOption;

/// Runtime diagnostics, written only once `set_logging` pointed them somewhere.
#[derive(Debug, Default)]
struct DiagnosticLog {
    sink: std::sync::Mutex<Option<(std::fs::File, tracing::Level)>>,
}

impl DiagnosticLog {
    fn log(&self, level: tracing::Level, message: std::fmt::Arguments<'_>) {
        let Ok(mut guard) = self.sink.lock() else {
            return;
        };
        // without a sink the lines are only visible through tracing
        let Some((file, max_level)) = guard.as_mut() else {
            tracing::debug!(target: "gfcat::export", "{}", message);
            return;
        };
        if level > *max_level {
            return;
        }
        // diagnostics are best effort
        let _ = writeln!(
            file,
            "[{}] {} [export] {}",
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.6f"),
            level,
            message
        );
    }
}

#[derive(Debug)]
pub struct ExportConnector {
    config: ExportConfig,
}

impl ExportConnector {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    #[instrument(skip(self))]
    pub async fn open_volume(&self, url: &GlusterUrl) -> anyhow::Result<ExportVolume> {
        ensure_local_host(url).await?;
        if url.volume == "." || url.volume == ".." {
            return Err(anyhow!("invalid volume name '{}'", url.volume));
        }
        let brick = self.config.root.join(&url.volume);
        let metadata = tokio::fs::metadata(&brick)
            .await
            .with_context(|| format!("volume '{}' does not exist", url.volume))?;
        if !metadata.is_dir() {
            return Err(anyhow!("volume '{}' does not exist", url.volume));
        }
        tracing::debug!("serving volume {} from {:?}", url.volume, brick);
        Ok(ExportVolume {
            brick,
            options: Vec::new(),
            log: std::sync::Arc::new(DiagnosticLog::default()),
        })
    }
}

#[async_trait]
impl Connector for ExportConnector {
    async fn connect(&self, url: &GlusterUrl) -> anyhow::Result<Box<dyn Volume>> {
        Ok(Box::new(self.open_volume(url).await?))
    }
}

/// Fails unless `url.host` resolves to a loopback or local interface address.
async fn ensure_local_host(url: &GlusterUrl) -> anyhow::Result<()> {
    let resolved: Vec<std::net::SocketAddr> =
        tokio::net::lookup_host((url.host_for_lookup(), url.port))
            .await
            .with_context(|| format!("failed to resolve host {}", url.host))?
            .collect();
    let local = if_addrs::get_if_addrs().context("failed to list local interfaces")?;
    let is_local = resolved.iter().any(|addr| {
        addr.ip().is_loopback() || local.iter().any(|iface| iface.ip() == addr.ip())
    });
    if !is_local {
        return Err(anyhow!(
            "host {} is unreachable: no volumes are exported to it from this machine",
            url.host
        ));
    }
    Ok(())
}

#[derive(Debug)]
pub struct ExportVolume {
    brick: std::path::PathBuf,
    // effective translator options, in the order keys were first set
    options: Vec<(String, String)>,
    log: std::sync::Arc<DiagnosticLog>,
}

impl ExportVolume {
    /// Effective value of a translator option.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn options(&self) -> &[(String, String)] {
        &self.options
    }

    fn resolve(&self, path: &str) -> std::io::Result<std::path::PathBuf> {
        let mut resolved = self.brick.clone();
        for component in std::path::Path::new(path).components() {
            match component {
                std::path::Component::RootDir | std::path::Component::CurDir => {}
                std::path::Component::Normal(name) => resolved.push(name),
                _ => {
                    return Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied));
                }
            }
        }
        Ok(resolved)
    }
}

#[async_trait]
impl Volume for ExportVolume {
    async fn set_xlator_option(&mut self, option: &XlatorOption) -> anyhow::Result<()> {
        self.log.log(
            tracing::Level::DEBUG,
            format_args!("setting translator option {}", option),
        );
        if let Some(previous) = self.option(option.key()) {
            self.log.log(
                tracing::Level::DEBUG,
                format_args!("{} overrides earlier value '{}'", option.key(), previous),
            );
        }
        match self.options.iter_mut().find(|(k, _)| k == option.key()) {
            Some((_, value)) => *value = option.value().to_string(),
            None => self
                .options
                .push((option.key().to_string(), option.value().to_string())),
        }
        Ok(())
    }

    async fn set_logging(
        &mut self,
        sink: &std::path::Path,
        level: tracing::Level,
    ) -> anyhow::Result<()> {
        let file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(sink)
            .await
            .with_context(|| format!("cannot open log file {sink:?}"))?
            .into_std()
            .await;
        let mut guard = self
            .log
            .sink
            .lock()
            .map_err(|_| anyhow!("diagnostic log is poisoned"))?;
        *guard = Some((file, level));
        Ok(())
    }

    async fn open(&self, path: &str) -> std::io::Result<Box<dyn VolumeFile>> {
        let resolved = self.resolve(path)?;
        self.log
            .log(tracing::Level::DEBUG, format_args!("open {path} -> {resolved:?}"));
        if tokio::fs::metadata(&resolved).await?.is_dir() {
            return Err(std::io::Error::from_raw_os_error(libc::EISDIR));
        }
        // write access is what F_WRLCK requires, nothing is ever written through it
        let file = tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(&resolved)
            .await?;
        Ok(Box::new(ExportFile {
            file,
            path: path.to_string(),
            log: self.log.clone(),
        }))
    }

    async fn fini(self: Box<Self>) -> anyhow::Result<()> {
        self.log.log(
            tracing::Level::DEBUG,
            format_args!(
                "finalizing {:?} with {} translator option(s)",
                self.brick,
                self.options().len()
            ),
        );
        Ok(())
    }
}

#[derive(Debug)]
struct ExportFile {
    file: tokio::fs::File,
    path: String,
    log: std::sync::Arc<DiagnosticLog>,
}

impl tokio::io::AsyncRead for ExportFile {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        tokio::io::AsyncRead::poll_read(std::pin::Pin::new(&mut self.get_mut().file), cx, buf)
    }
}

#[async_trait]
impl VolumeFile for ExportFile {
    fn try_lock(&mut self, kind: LockKind) -> std::io::Result<()> {
        let lock_type = match kind {
            LockKind::Read => libc::F_RDLCK,
            LockKind::Write => libc::F_WRLCK,
        };
        // whole file, l_pid must be zero for OFD locks
        let lock = libc::flock {
            l_type: lock_type as libc::c_short,
            l_whence: libc::SEEK_SET as libc::c_short,
            l_start: 0,
            l_len: 0,
            l_pid: 0,
        };
        nix::fcntl::fcntl(&self.file, nix::fcntl::FcntlArg::F_OFD_SETLK(&lock))?;
        self.log.log(
            tracing::Level::DEBUG,
            format_args!("{:?} lock acquired on {}", kind, self.path),
        );
        Ok(())
    }

    async fn close(self: Box<Self>) -> std::io::Result<()> {
        let ExportFile { file, path, log } = *self;
        // closing the last descriptor of the description releases its lock
        close_descriptor(file.into_std().await)?;
        log.log(tracing::Level::DEBUG, format_args!("closed {path}"));
        Ok(())
    }
}

/// Closes `fd` and reports what `close(2)` said, unlike dropping it.
fn close_descriptor(fd: impl IntoRawFd) -> std::io::Result<()> {
    nix::unistd::close(fd).map_err(std::io::Error::from)
}
