// build identification printed by --version

/// Build identification
///
/// The semantic version comes from Cargo.toml, git information is captured by build.rs and
/// may be absent when building outside of a git checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildVersion {
    /// Semantic version from Cargo.toml (e.g., "0.1.0")
    pub semantic: String,
    /// Git describe output (e.g., "v0.1.0-7-g644da27")
    pub git_describe: Option<String>,
    /// Full git commit hash
    pub git_hash: Option<String>,
}

pub const LICENSE: &str = "License GPLv3+: GNU GPL version 3 or later <https://gnu.org/licenses/gpl.html>.\n\
This is free software: you are free to change and redistribute it.\n\
There is NO WARRANTY, to the extent permitted by law.";

pub const AUTHORS: &str = "Written by Craig Cabrey.";

impl BuildVersion {
    pub fn current() -> Self {
        Self {
            semantic: env!("CARGO_PKG_VERSION").to_string(),
            git_describe: option_env!("GFCAT_GIT_DESCRIBE").map(String::from),
            git_hash: option_env!("GFCAT_GIT_HASH").map(String::from),
        }
    }

    /// Returns the semantic version, followed by git describe information if available.
    ///
    /// # Examples
    ///
    /// ```
    /// use common::version::BuildVersion;
    ///
    /// let v = BuildVersion {
    ///     semantic: "0.1.0".to_string(),
    ///     git_describe: Some("v0.1.0-7-g644da27".to_string()),
    ///     git_hash: None,
    /// };
    ///
    /// assert_eq!(v.display(), "0.1.0 (v0.1.0-7-g644da27)");
    /// ```
    pub fn display(&self) -> String {
        if let Some(ref git_describe) = self.git_describe {
            format!("{} ({})", self.semantic, git_describe)
        } else {
            self.semantic.clone()
        }
    }
}

impl std::fmt::Display for BuildVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl BuildVersion {
    /// Version line, the commit line when the hash is known, then license and authors.
    pub fn long_display(&self) -> String {
        match self.git_hash {
            Some(ref hash) => format!("{}\ncommit {}\n{}\n{}", self, hash, LICENSE, AUTHORS),
            None => format!("{}\n{}\n{}", self, LICENSE, AUTHORS),
        }
    }
}

static LONG_VERSION: std::sync::LazyLock<String> =
    std::sync::LazyLock::new(|| BuildVersion::current().long_display());

/// Full identification block for `--version`: version, license and authors.
pub fn long_version() -> &'static str {
    LONG_VERSION.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_version() {
        let version = BuildVersion::current();
        assert_eq!(version.semantic, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_display() {
        let v1 = BuildVersion {
            semantic: "0.1.0".to_string(),
            git_describe: None,
            git_hash: None,
        };
        assert_eq!(v1.display(), "0.1.0");
        let v2 = BuildVersion {
            semantic: "0.1.0".to_string(),
            git_describe: Some("v0.1.0-7-g644da27".to_string()),
            git_hash: Some("644da27abc".to_string()),
        };
        assert_eq!(v2.to_string(), "0.1.0 (v0.1.0-7-g644da27)");
    }

    #[test]
    fn test_long_display_shows_commit() {
        let with_hash = BuildVersion {
            semantic: "0.1.0".to_string(),
            git_describe: Some("v0.1.0-7-g644da27".to_string()),
            git_hash: Some("644da27abc".to_string()),
        };
        let text = with_hash.long_display();
        assert!(text.starts_with("0.1.0 (v0.1.0-7-g644da27)\ncommit 644da27abc\n"));
        assert!(text.ends_with(AUTHORS));
        let without_hash = BuildVersion {
            git_hash: None,
            ..with_hash
        };
        assert!(!without_hash.long_display().contains("commit"));
    }

    #[test]
    fn test_long_version_identifies_authors_and_license() {
        let text = long_version();
        assert!(text.starts_with(env!("CARGO_PKG_VERSION")));
        assert!(text.contains("GPLv3+"));
        assert!(text.ends_with(AUTHORS));
    }
}
