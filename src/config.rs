//! Runtime configuration for the A2A server.
//!
//! A plain struct with a `Default` impl, constructed from environment
//! variables by the caller (typically `src/bin/a2a_server.rs`). No
//! TOML/YAML parsing dependency is introduced; the only "file formats" this
//! crate reads are the JSON stores under `~/.xactions/` (see
//! [`crate::storage`]).

use std::path::PathBuf;

/// Global configuration for the A2A runtime.
#[derive(Debug, Clone)]
pub struct Config {
    /// `A2A_PORT` — port the HTTP surface binds to. Default 3100.
    pub port: u16,
    /// `A2A_BASE_URL` — the base URL advertised in the Agent Card.
    pub base_url: String,
    /// `XACTIONS_API_URL` — upstream API the bridge talks to (out of scope
    /// for this crate's implementation, but threaded through for the CLI).
    pub xactions_api_url: Option<String>,
    /// `X_SESSION_COOKIE` — session credential forwarded to the bridge.
    pub x_session_cookie: Option<String>,
    /// Directory under the user's home holding on-disk stores
    /// (`~/.xactions` by default).
    pub data_dir: PathBuf,
    /// Maximum number of tasks retained in the store.
    pub max_tasks: usize,
    /// Per-IP requests-per-window for the rate limiter.
    pub rate_limit_per_minute: u32,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".xactions");
        Self {
            port: 3100,
            base_url: "http://localhost:3100".to_string(),
            xactions_api_url: None,
            x_session_cookie: None,
            data_dir,
            max_tasks: 10_000,
            rate_limit_per_minute: 100,
        }
    }
}

impl Config {
    /// Build a [`Config`] from the environment, falling back to defaults
    /// for anything unset.
    pub fn from_env() -> Self {
        let mut cfg = Config::default();
        if let Ok(port) = std::env::var("A2A_PORT") {
            if let Ok(p) = port.parse() {
                cfg.port = p;
            }
        }
        if let Ok(base_url) = std::env::var("A2A_BASE_URL") {
            cfg.base_url = base_url;
        } else {
            cfg.base_url = format!("http://localhost:{}", cfg.port);
        }
        cfg.xactions_api_url = std::env::var("XACTIONS_API_URL").ok();
        cfg.x_session_cookie = std::env::var("X_SESSION_COOKIE").ok();
        cfg
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.data_dir.join("agents")
    }

    pub fn a2a_dir(&self) -> PathBuf {
        self.data_dir.join("a2a")
    }

    pub fn keys_path(&self) -> PathBuf {
        self.a2a_dir().join("a2a-keys.json")
    }

    pub fn secret_path(&self) -> PathBuf {
        self.a2a_dir().join("a2a-secret.key")
    }

    pub fn outbound_auth_path(&self) -> PathBuf {
        self.a2a_dir().join("outbound-auth.json")
    }

    pub fn registry_path(&self) -> PathBuf {
        self.agents_dir().join("registry.json")
    }

    pub fn trust_path(&self) -> PathBuf {
        self.agents_dir().join("trust.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_port() {
        let cfg = Config::default();
        assert_eq!(cfg.port, 3100);
        assert_eq!(cfg.max_tasks, 10_000);
    }
}
