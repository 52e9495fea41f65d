use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

pub const DEFAULT_PORT: u16 = 8080;

/// HTTP boundary settings. Ledger settings live in `LedgerConfig`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Bearer token for `GET /audit`, `GET /audit/{key}` and `POST /audit/verify`.
    pub read_token: Option<String>,
    /// Bearer token for `POST /audit` and `DELETE /audit/{key}`.
    pub write_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            read_token: None,
            write_token: None,
        }
    }
}

impl ServerConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml(text: &str) -> ServerResult<Self> {
        toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml(&text)
    }

    /// Override fields from `AUDIT_BIND_ADDR`, `AUDIT_READ_TOKEN` and
    /// `AUDIT_WRITE_TOKEN` as returned by `lookup`.
    pub fn apply_env<F>(mut self, lookup: F) -> ServerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(addr) = var("AUDIT_BIND_ADDR") {
            self.bind_addr = addr
                .trim()
                .parse()
                .map_err(|e| ServerError::Config(format!("AUDIT_BIND_ADDR {addr:?}: {e}")))?;
        }
        if let Some(token) = var("AUDIT_READ_TOKEN") {
            self.read_token = Some(token);
        }
        if let Some(token) = var("AUDIT_WRITE_TOKEN") {
            self.write_token = Some(token);
        }
        Ok(self)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> ServerResult<Self> {
        Self::default().apply_env(|name| std::env::var(name).ok())
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("read_token", &self.read_token.as_ref().map(|_| "<redacted>"))
            .field("write_token", &self.write_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert!(c.read_token.is_none());
        assert!(c.write_token.is_none());
    }

    #[test]
    fn toml_keeps_defaults_for_missing_keys() {
        let c = ServerConfig::from_toml("read_token = \"r\"\n").unwrap();
        assert_eq!(c.read_token.as_deref(), Some("r"));
        assert_eq!(c.bind_addr.port(), DEFAULT_PORT);

        let c = ServerConfig::from_toml("bind_addr = \"0.0.0.0:9000\"\nwrite_token = \"w\"").unwrap();
        assert_eq!(c.bind_addr, "0.0.0.0:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(c.write_token.as_deref(), Some("w"));
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        assert!(matches!(
            ServerConfig::from_toml("bind_addr = 12"),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn env_overrides_file() {
        let base = ServerConfig::from_toml("read_token = \"file\"").unwrap();
        let c = base
            .apply_env(|name| match name {
                "AUDIT_READ_TOKEN" => Some("env".into()),
                "AUDIT_BIND_ADDR" => Some("127.0.0.1:7000".into()),
                "AUDIT_WRITE_TOKEN" => Some("  ".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(c.read_token.as_deref(), Some("env"));
        assert_eq!(c.bind_addr.port(), 7000);
        assert!(c.write_token.is_none());
    }

    #[test]
    fn invalid_bind_addr_is_rejected() {
        let err = ServerConfig::default()
            .apply_env(|name| (name == "AUDIT_BIND_ADDR").then(|| "nowhere".to_string()))
            .unwrap_err();
        assert!(matches!(err, ServerError::Config(ref m) if m.contains("AUDIT_BIND_ADDR")));
    }

    #[test]
    fn debug_redacts_tokens() {
        let c = ServerConfig::from_toml("write_token = \"hunter2\"").unwrap();
        assert!(!format!("{c:?}").contains("hunter2"));
    }
}
