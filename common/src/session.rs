use anyhow::Context;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::url::GlusterUrl;
use crate::volume::{Connector, Volume};
use crate::xlator::XlatorOptions;

/// A volume session together with who is responsible for tearing it down.
#[derive(Debug)]
pub enum Session<'a> {
    /// Created by this invocation, finalized by [`Session::close`].
    Owned(Box<dyn Volume>),
    /// Supplied by the caller (e.g. an interactive shell), never finalized here.
    Borrowed(&'a dyn Volume),
}

impl<'a> Session<'a> {
    pub fn borrowed(volume: &'a dyn Volume) -> Self {
        Session::Borrowed(volume)
    }

    pub fn owns_handle(&self) -> bool {
        matches!(self, Session::Owned(_))
    }

    pub fn volume(&self) -> &dyn Volume {
        match self {
            Session::Owned(volume) => volume.as_ref(),
            Session::Borrowed(volume) => *volume,
        }
    }

    /// Mutable access for configuration, only granted on sessions this invocation owns.
    pub fn volume_mut(&mut self) -> Option<&mut (dyn Volume + 'static)> {
        match self {
            Session::Owned(volume) => Some(volume.as_mut()),
            Session::Borrowed(_) => None,
        }
    }

    /// Finalizes the session if it is owned, borrowed sessions are left untouched.
    ///
    /// Consumes the session so it cannot be used after teardown.
    #[instrument(skip(self), fields(owned = self.owns_handle()))]
    pub async fn close(self) {
        match self {
            Session::Owned(volume) => {
                tracing::debug!("finalizing session");
                if let Err(error) = volume.fini().await {
                    tracing::warn!("failed to finalize session: {:#}", error);
                }
            }
            Session::Borrowed(_) => tracing::debug!("session is borrowed, leaving it open"),
        }
    }
}

/// Connects to the volume named by `url`.
#[instrument(skip(connector))]
pub async fn connect(connector: &dyn Connector, url: &GlusterUrl) -> Result<Session<'static>> {
    tracing::debug!("connecting to volume {} on {}:{}", url.volume, url.host, url.port);
    let volume = connector
        .connect(url)
        .await
        .map_err(|err| Error::connect(url.to_string(), err))?;
    Ok(Session::Owned(volume))
}

/// Applies translator options in order, stopping at the first one the session rejects.
///
/// Options applied before the failing one stay in effect.
#[instrument(skip(volume))]
pub async fn apply_xlator_options(volume: &mut dyn Volume, options: XlatorOptions) -> Result<()> {
    for option in options {
        tracing::debug!(
            "setting {} of translator {} to '{}'",
            option.setting(),
            option.xlator(),
            option.value()
        );
        volume
            .set_xlator_option(&option)
            .await
            .with_context(|| {
                format!("failed to apply translator option with value '{}'", option.value())
            })
            .map_err(|err| Error::config(option.key(), err))?;
    }
    Ok(())
}

/// Sends the session's own diagnostics to `sink` at `level`.
#[instrument(skip(volume))]
pub async fn set_debug_logging(
    volume: &mut dyn Volume,
    sink: &std::path::Path,
    level: tracing::Level,
) -> Result<()> {
    volume
        .set_logging(sink, level)
        .await
        .map_err(|err| {
            Error::config(
                sink.display().to_string(),
                err.context("failed to set logging level"),
            )
        })
}
