//! Build metadata, constructed once in `main` and handed to whoever needs it.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: String,
    pub arch: String,
    pub os: String,
    pub rust_version: String,
    pub profile: String,
}

impl BuildInfo {
    /// Metadata of the running binary.
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            arch: std::env::consts::ARCH.to_string(),
            os: std::env::consts::OS.to_string(),
            rust_version: match option_env!("CARGO_PKG_RUST_VERSION") {
                Some(v) if !v.is_empty() => format!("rust{}", v),
                _ => "unknown".to_string(),
            },
            profile: (if cfg!(debug_assertions) { "debug" } else { "release" }).to_string(),
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<15}: {}", "Version", self.version)?;
        writeln!(f, "{:<15}: {}/{}", "Target", self.os, self.arch)?;
        writeln!(f, "{:<15}: {}", "Rust Version", self.rust_version)?;
        writeln!(f, "{:<15}: {}", "Profile", self.profile)
    }
}
