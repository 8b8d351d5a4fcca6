// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Configuration for the swarmlink API and bridge processes.
//!
//! Configuration is YAML (never TOML).  Layers are **deep-merged** — you can
//! override only the fields you care about in each file.
//!
//! Search order (later overrides earlier):
//! 1. `/etc/swarmlink/config.yaml`
//! 2. `~/.config/swarmlink/config.yaml`
//! 3. `.swarmlink/config.yaml` (workspace-local)
//! 4. Path given to [`load`] explicitly.
//!
//! A final environment layer overrides the files:
//! `SWARMLINK_DATABASE_URL`, `SWARMLINK_WS_SECRET`, `SWARMLINK_DEV_MODE`.
//!
//! **All defaults are production-safe.** Running `load(None)` with no config
//! file binds both listeners to loopback, leaves dev mode off, and uses the
//! local Postgres instance.
//!
//! # Example full config
//! ```yaml
//! database:
//!   url: "postgres://swarmlink@localhost/swarmlink"
//!   max_connections: 10
//!   max_retries: 3
//!
//! http:
//!   bind: "127.0.0.1:3847"
//!
//! ws:
//!   bind: "127.0.0.1:3849"
//!
//! auth:
//!   # HMAC-SHA256 secret for WebSocket tokens. Prefer SWARMLINK_WS_SECRET.
//!   secret: "change-me"
//!   token_ttl_secs: 3600
//!
//! messaging:
//!   default_ttl_secs: 3600
//!
//! # Accept unsigned auth frames. Local development only.
//! dev_mode: false
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

fn default_database_url() -> String {
    "postgres://localhost/swarmlink".to_string()
}
fn default_max_connections() -> u32 {
    10
}
fn default_max_retries() -> u32 {
    3
}
fn default_http_bind() -> String {
    "127.0.0.1:3847".to_string()
}
fn default_ws_bind() -> String {
    "127.0.0.1:3849".to_string()
}
fn default_max_body() -> usize {
    4 * 1024 * 1024
}
fn default_token_ttl() -> u64 {
    3600
}
fn default_message_ttl() -> u64 {
    3600
}

/// Top-level configuration shared by both server processes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub ws: WsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub messaging: MessagingConfig,

    /// Accept unsigned `{agent_id}` auth frames on the bridge.
    /// Local development only — never enable this on a shared host.
    #[serde(default)]
    pub dev_mode: bool,
}

/// Postgres connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL. Overridden by `SWARMLINK_DATABASE_URL`.
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Connection pool size. Request handlers check a connection out per
    /// request, so this bounds handler concurrency.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Internal retry budget for idempotent work on transient errors.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            max_retries: default_max_retries(),
        }
    }
}

/// REST listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// `host:port` to listen on. Default: `127.0.0.1:3847` (loopback only —
    /// the REST surface is intentionally unauthenticated).
    #[serde(default = "default_http_bind")]
    pub bind: String,

    /// Maximum request body size in bytes (default: 4 MiB).
    #[serde(default = "default_max_body")]
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_http_bind(),
            max_body_bytes: default_max_body(),
        }
    }
}

/// WebSocket bridge listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsConfig {
    /// `host:port` the bridge listens on. Default: `127.0.0.1:3849`.
    #[serde(default = "default_ws_bind")]
    pub bind: String,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            bind: default_ws_bind(),
        }
    }
}

/// WebSocket token signing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC-SHA256 secret. Prefer setting `SWARMLINK_WS_SECRET` over putting
    /// the secret in a file. Required unless `dev_mode` is on.
    pub secret: Option<String>,

    /// Token lifetime in seconds (default: 3600).
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: None,
            token_ttl_secs: default_token_ttl(),
        }
    }
}

/// Agent messaging defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Default message TTL when the publisher does not supply one.
    #[serde(default = "default_message_ttl")]
    pub default_ttl_secs: u64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_message_ttl(),
        }
    }
}

impl Config {
    /// The signing secret as bytes, or an error naming the fix.
    ///
    /// In dev mode a missing secret is tolerated (unsigned frames are
    /// accepted), so callers that only need *verification* should check
    /// `dev_mode` before treating this as fatal.
    pub fn secret_bytes(&self) -> anyhow::Result<Vec<u8>> {
        self.auth
            .secret
            .as_deref()
            .map(|s| s.as_bytes().to_vec())
            .context("no WS auth secret configured — set SWARMLINK_WS_SECRET or auth.secret")
    }
}

// ── Loader ────────────────────────────────────────────────────────────────────

fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    paths.push(PathBuf::from("/etc/swarmlink/config.yaml"));
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/swarmlink/config.yaml"));
    }
    paths.push(PathBuf::from(".swarmlink/config.yaml"));
    paths
}

/// Load configuration from the default search paths plus an optional explicit
/// file, then apply environment overrides.
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let layer: serde_yaml::Value = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            merge_yaml(&mut merged, layer);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        let text =
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
        let layer: serde_yaml::Value =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", p.display()))?;
        merge_yaml(&mut merged, layer);
    }

    let mut config: Config = if matches!(&merged, serde_yaml::Value::Mapping(m) if m.is_empty()) {
        Config::default()
    } else {
        serde_yaml::from_value(merged).context("invalid configuration")?
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(url) = std::env::var("SWARMLINK_DATABASE_URL") {
        if !url.is_empty() {
            config.database.url = url;
        }
    }
    if let Ok(secret) = std::env::var("SWARMLINK_WS_SECRET") {
        if !secret.is_empty() {
            config.auth.secret = Some(secret);
        }
    }
    if let Ok(v) = std::env::var("SWARMLINK_DEV_MODE") {
        config.dev_mode = matches!(v.as_str(), "1" | "true" | "yes");
    }
}

fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d
                    .entry(k)
                    .or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_binds_are_loopback() {
        let c = Config::default();
        assert!(
            c.http.bind.starts_with("127.0.0.1"),
            "REST default must be loopback-only"
        );
        assert!(
            c.ws.bind.starts_with("127.0.0.1"),
            "bridge default must be loopback-only"
        );
    }

    #[test]
    fn default_ports_match_contract() {
        let c = Config::default();
        assert_eq!(c.http.bind, "127.0.0.1:3847");
        assert_eq!(c.ws.bind, "127.0.0.1:3849");
    }

    #[test]
    fn default_dev_mode_is_off() {
        let c = Config::default();
        assert!(!c.dev_mode, "dev mode must be opt-in");
    }

    #[test]
    fn default_pool_size_is_ten() {
        let c = Config::default();
        assert_eq!(c.database.max_connections, 10);
    }

    #[test]
    fn default_token_ttl_is_an_hour() {
        let c = Config::default();
        assert_eq!(c.auth.token_ttl_secs, 3600);
    }

    #[test]
    fn secret_bytes_errors_when_unset() {
        let c = Config::default();
        assert!(c.secret_bytes().is_err());
    }

    #[test]
    fn secret_bytes_returns_configured_secret() {
        let mut c = Config::default();
        c.auth.secret = Some("s3cret".into());
        assert_eq!(c.secret_bytes().unwrap(), b"s3cret".to_vec());
    }

    #[test]
    fn config_yaml_round_trip() {
        let c = Config::default();
        let yaml = serde_yaml::to_string(&c).unwrap();
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.http.bind, c.http.bind);
        assert_eq!(back.database.url, c.database.url);
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = "ws:\n  bind: \"0.0.0.0:4000\"\n";
        let c: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(c.ws.bind, "0.0.0.0:4000");
        assert_eq!(c.http.bind, "127.0.0.1:3847", "http must keep its default");
    }

    #[test]
    fn merge_yaml_overrides_scalar_keeps_siblings() {
        let mut base: serde_yaml::Value =
            serde_yaml::from_str("database:\n  url: a\n  max_retries: 7\n").unwrap();
        let layer: serde_yaml::Value = serde_yaml::from_str("database:\n  url: b\n").unwrap();
        merge_yaml(&mut base, layer);
        let merged: Config = serde_yaml::from_value(base).unwrap();
        assert_eq!(merged.database.url, "b");
        assert_eq!(merged.database.max_retries, 7, "sibling must survive merge");
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "dev_mode: true\nhttp:\n  bind: \"127.0.0.1:9999\"\n").unwrap();
        let c = load(Some(&path)).unwrap();
        assert!(c.dev_mode);
        assert_eq!(c.http.bind, "127.0.0.1:9999");
    }
}
