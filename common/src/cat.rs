use anyhow::{Context, anyhow};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::instrument;

use crate::error::{Error, Result, Stage};
use crate::session::Session;
use crate::volume::{LockKind, VolumeFile};

/// Default amount of file data held in memory at once.
pub const DEFAULT_CHUNK_SIZE: usize = 128 * 1024;

#[derive(Debug, Copy, Clone)]
pub struct Settings {
    pub chunk_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub bytes_copied: u64,
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "bytes copied: {}", bytesize::ByteSize(self.bytes_copied))
    }
}

/// Streams `path` from the session to `sink` while holding an exclusive lock on it.
///
/// The lock is taken in write mode so the read excludes writers, and also any other reader
/// doing the same. It is never released explicitly: closing the handle drops it, so the
/// locking window is exactly the read window. The handle is closed on every path once the
/// open succeeded; a failing close replaces whatever result came before it, though data
/// already written to `sink` stays written. `target` is the operand as given by the user and
/// is what errors are reported against.
#[instrument(skip(session, sink))]
pub async fn cat_locked<W>(
    session: &Session<'_>,
    path: &str,
    target: &str,
    sink: &mut W,
    settings: &Settings,
) -> Result<Summary>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    tracing::debug!("opening {:?} for reading", path);
    let mut file = session
        .volume()
        .open(path)
        .await
        .with_context(|| format!("cannot open {path} for reading"))
        .map_err(|err| Error::copy(Stage::Open, target, err))?;
    let result = lock_and_transfer(file.as_mut(), path, target, sink, settings).await;
    tracing::debug!("closing {:?}", path);
    match (result, file.close().await) {
        (result, Ok(())) => result,
        (Ok(_), Err(error)) => Err(Error::copy(
            Stage::Close,
            target,
            anyhow!(error).context(format!("cannot close file {path}")),
        )),
        (Err(prior), Err(error)) => Err(Error::copy(
            Stage::Close,
            target,
            anyhow!(error).context(format!(
                "cannot close file {path} after {} failure ({:#})",
                prior.stage().unwrap_or(Stage::Open),
                prior
            )),
        )),
    }
}

async fn lock_and_transfer<W>(
    file: &mut dyn VolumeFile,
    path: &str,
    target: &str,
    sink: &mut W,
    settings: &Settings,
) -> Result<Summary>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    // don't allow concurrent reads and writes
    file.try_lock(LockKind::Write)
        .with_context(|| format!("cannot lock {path}"))
        .map_err(|err| Error::copy(Stage::Lock, target, err))?;
    tracing::debug!("lock acquired, copying data");
    let mut buffer = vec![0u8; settings.chunk_size.max(1)];
    let mut summary = Summary::default();
    loop {
        let n = match file.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(error) => {
                return Err(Error::copy(
                    Stage::Transfer,
                    target,
                    anyhow!(error).context(format!(
                        "read error after {} bytes",
                        summary.bytes_copied
                    )),
                ));
            }
        };
        sink.write_all(&buffer[..n])
            .await
            .context("write error")
            .map_err(|err| Error::copy(Stage::Transfer, target, err))?;
        summary.bytes_copied += n as u64;
    }
    sink.flush()
        .await
        .context("write error")
        .map_err(|err| Error::copy(Stage::Transfer, target, err))?;
    tracing::debug!("{}", &summary);
    Ok(summary)
}
