//! Server configuration as plain data.
//!
//! Parsed once by the binary from CLI flags and handed to the listener set;
//! nothing here is mutated after startup.

use std::path::PathBuf;

/// Bind address used when none is configured.
pub const DEFAULT_BIND: &str = "127.0.0.1:6121";

/// How every binding in the process serves connections. Chosen once
/// globally; bindings never mix modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Encrypted byte-stream serving (rustls over the accepted connection).
    Tls,
    /// Cleartext TCP fallback, for tests and fronted deployments.
    Tcp,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen addresses; empty means `DEFAULT_BIND`.
    pub binds: Vec<String>,
    /// Root directory for the static file fallback.
    pub www_root: PathBuf,
    pub mode: TransportMode,
    /// Address for the diagnostics listener; disabled when `None`.
    pub diagnostics: Option<String>,
}

impl ServerConfig {
    /// Effective bind list, substituting the default for an empty set.
    pub fn effective_binds(&self) -> Vec<String> {
        if self.binds.is_empty() {
            vec![DEFAULT_BIND.to_string()]
        } else {
            self.binds.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bind_list_falls_back_to_default() {
        let config = ServerConfig {
            binds: Vec::new(),
            www_root: PathBuf::from("/var/www"),
            mode: TransportMode::Tcp,
            diagnostics: None,
        };
        assert_eq!(config.effective_binds(), vec![DEFAULT_BIND.to_string()]);
    }

    #[test]
    fn configured_binds_are_kept_verbatim() {
        let config = ServerConfig {
            binds: vec!["127.0.0.1:6121".into(), "127.0.0.1:6122".into()],
            www_root: PathBuf::from("/var/www"),
            mode: TransportMode::Tcp,
            diagnostics: None,
        };
        assert_eq!(config.effective_binds().len(), 2);
    }
}
