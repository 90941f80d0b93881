use anyhow::anyhow;

use crate::error::{Error, Result};

/// Port glusterd listens on for volfile requests.
pub const GLUSTER_DEFAULT_PORT: u16 = 24007;

/// Parsed `glfs://host[:port]/volume/path` locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlusterUrl {
    pub host: String,
    pub volume: String,
    /// Absolute path inside the volume, always starts with '/'.
    pub path: String,
    pub port: u16,
}

static URL_RE: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
    regex::Regex::new(
        r"^(?P<scheme>glfs|gluster)://(?P<host>\[[^\]/]+\]|[^:/\[\]]+)(?::(?P<port>[^/]*))?/(?P<volume>[^/]+)(?P<path>/.*)?$",
    )
    .expect("gluster url regex must compile")
});

/// Parses a port number, zero is rejected.
pub fn parse_port(value: &str) -> anyhow::Result<u16> {
    match value.parse::<u16>() {
        Ok(0) | Err(_) => Err(anyhow!("invalid port '{}'", value)),
        Ok(port) => Ok(port),
    }
}

/// Absolute and naming more than the volume root.
fn has_file_component(path: &str) -> bool {
    path.starts_with('/') && path.chars().any(|c| c != '/')
}

impl GlusterUrl {
    /// Parses a full locator.
    ///
    /// A port given inside the URL takes precedence over `default_port`, which is what
    /// `--port` overrides.
    pub fn parse(raw: &str, default_port: u16) -> Result<Self> {
        let captures = URL_RE.captures(raw).ok_or_else(|| {
            Error::parse(
                raw,
                anyhow!("expected glfs://HOST[:PORT]/VOLUME/PATH"),
            )
        })?;
        let host = captures["host"].to_string();
        let volume = captures["volume"].to_string();
        let path = captures.name("path").map_or("", |m| m.as_str());
        if !has_file_component(path) {
            return Err(Error::parse(raw, anyhow!("missing path inside volume '{}'", volume)));
        }
        let port = match captures.name("port") {
            Some(port) => parse_port(port.as_str()).map_err(|err| Error::parse(raw, err))?,
            None => default_port,
        };
        Ok(Self {
            host,
            volume,
            path: path.to_string(),
            port,
        })
    }

    /// Address glusterd is contacted on, IPv6 brackets removed.
    pub fn host_for_lookup(&self) -> &str {
        self.host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(&self.host)
    }
}

impl std::fmt::Display for GlusterUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "glfs://{}:{}/{}{}",
            self.host, self.port, self.volume, self.path
        )
    }
}

/// Bare path used when a session to the volume is already established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumePath(String);

impl VolumePath {
    pub fn parse(raw: &str) -> Result<Self> {
        if !has_file_component(raw) {
            return Err(Error::parse(
                raw,
                anyhow!("expected an absolute path inside the connected volume"),
            ));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
