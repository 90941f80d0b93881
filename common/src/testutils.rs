//! In-memory volume for tests.
//!
//! `MemVolume` keeps its state behind a shared handle, so a test can hand a clone to the code
//! under test (directly or through `MemConnector`) and inspect open-handle accounting, lock
//! requests and applied options afterwards.

use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;

use crate::url::GlusterUrl;
use crate::volume::{Connector, LockKind, Volume, VolumeFile};
use crate::xlator::XlatorOption;

#[derive(Debug, Default)]
struct State {
    files: std::collections::HashMap<String, Vec<u8>>,
    // paths some other client holds a conflicting lock on
    foreign_locks: std::collections::HashSet<String>,
    reject_option: Option<String>,
    fail_read_after: Option<usize>,
    fail_close: bool,
    applied_options: Vec<String>,
    logging: Option<(std::path::PathBuf, tracing::Level)>,
    locks_taken: Vec<LockKind>,
    open_handles: usize,
    close_count: usize,
    read_calls: usize,
    max_read_len: usize,
    fini_count: usize,
}

#[derive(Debug, Default, Clone)]
pub struct MemVolume {
    state: Arc<Mutex<State>>,
}

impl MemVolume {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn with_file(self, path: &str, contents: &[u8]) -> Self {
        self.state().files.insert(path.to_string(), contents.to_vec());
        self
    }

    pub fn locked_by_other(self, path: &str) -> Self {
        self.state().foreign_locks.insert(path.to_string());
        self
    }

    pub fn reject_option(self, key: &str) -> Self {
        self.state().reject_option = Some(key.to_string());
        self
    }

    /// Reads fail with EIO once `offset` bytes of a file have been returned.
    pub fn fail_read_after(self, offset: usize) -> Self {
        self.state().fail_read_after = Some(offset);
        self
    }

    pub fn fail_close(self) -> Self {
        self.state().fail_close = true;
        self
    }

    pub fn applied_options(&self) -> Vec<String> {
        self.state().applied_options.clone()
    }

    pub fn logging(&self) -> Option<(std::path::PathBuf, tracing::Level)> {
        self.state().logging.clone()
    }

    pub fn locks_taken(&self) -> Vec<LockKind> {
        self.state().locks_taken.clone()
    }

    pub fn open_handles(&self) -> usize {
        self.state().open_handles
    }

    pub fn close_count(&self) -> usize {
        self.state().close_count
    }

    pub fn read_calls(&self) -> usize {
        self.state().read_calls
    }

    /// Largest buffer any read was issued with.
    pub fn max_read_len(&self) -> usize {
        self.state().max_read_len
    }

    pub fn fini_count(&self) -> usize {
        self.state().fini_count
    }
}

#[async_trait]
impl Volume for MemVolume {
    async fn set_xlator_option(&mut self, option: &XlatorOption) -> anyhow::Result<()> {
        let mut state = self.state();
        if state.fini_count > 0 {
            return Err(anyhow!("session already finalized"));
        }
        if state.reject_option.as_deref() == Some(option.key()) {
            return Err(anyhow!("Invalid argument"));
        }
        state.applied_options.push(option.to_string());
        Ok(())
    }

    async fn set_logging(
        &mut self,
        sink: &std::path::Path,
        level: tracing::Level,
    ) -> anyhow::Result<()> {
        self.state().logging = Some((sink.to_path_buf(), level));
        Ok(())
    }

    async fn open(&self, path: &str) -> std::io::Result<Box<dyn VolumeFile>> {
        let mut state = self.state();
        if state.fini_count > 0 {
            return Err(std::io::Error::from_raw_os_error(libc::ENOTCONN));
        }
        let data = state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| std::io::Error::from_raw_os_error(libc::ENOENT))?;
        state.open_handles += 1;
        Ok(Box::new(MemFile {
            state: self.state.clone(),
            path: path.to_string(),
            data,
            pos: 0,
            locked: false,
        }))
    }

    async fn fini(self: Box<Self>) -> anyhow::Result<()> {
        self.state().fini_count += 1;
        Ok(())
    }
}

#[derive(Debug)]
struct MemFile {
    state: Arc<Mutex<State>>,
    path: String,
    data: Vec<u8>,
    pos: usize,
    locked: bool,
}

impl tokio::io::AsyncRead for MemFile {
    fn poll_read(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let mut state = this.state.lock().unwrap();
        state.read_calls += 1;
        state.max_read_len = state.max_read_len.max(buf.remaining());
        if !this.locked {
            return std::task::Poll::Ready(Err(std::io::Error::other("read issued before lock")));
        }
        let mut end = (this.pos + buf.remaining()).min(this.data.len());
        if let Some(limit) = state.fail_read_after {
            if this.pos >= limit {
                return std::task::Poll::Ready(Err(std::io::Error::from_raw_os_error(libc::EIO)));
            }
            end = end.min(limit);
        }
        buf.put_slice(&this.data[this.pos..end]);
        this.pos = end;
        std::task::Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl VolumeFile for MemFile {
    fn try_lock(&mut self, kind: LockKind) -> std::io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.locks_taken.push(kind);
        if state.foreign_locks.contains(&self.path) {
            return Err(std::io::Error::from_raw_os_error(libc::EAGAIN));
        }
        self.locked = true;
        Ok(())
    }

    async fn close(self: Box<Self>) -> std::io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.open_handles -= 1;
        state.close_count += 1;
        if state.fail_close {
            return Err(std::io::Error::from_raw_os_error(libc::EIO));
        }
        Ok(())
    }
}

/// Connector handing out clones of one `MemVolume`, or refusing every connection.
#[derive(Debug, Default)]
pub struct MemConnector {
    volume: Option<MemVolume>,
    connected_to: Mutex<Vec<GlusterUrl>>,
}

impl MemConnector {
    pub fn new(volume: MemVolume) -> Self {
        Self {
            volume: Some(volume),
            connected_to: Mutex::default(),
        }
    }

    pub fn unreachable() -> Self {
        Self::default()
    }

    /// Every URL a connection was attempted to, in order.
    pub fn connected_to(&self) -> Vec<GlusterUrl> {
        self.connected_to.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MemConnector {
    async fn connect(&self, url: &GlusterUrl) -> anyhow::Result<Box<dyn Volume>> {
        self.connected_to.lock().unwrap().push(url.clone());
        match &self.volume {
            Some(volume) => Ok(Box::new(volume.clone())),
            None => Err(anyhow!("Transport endpoint is not connected")),
        }
    }
}
