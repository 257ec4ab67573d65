// src/config.rs

//! Manages server configuration: loading, resolving dynamic values, and validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

/// A simple wrapper to allow cloning the config while it's behind a mutex for the `from_file` helper.
pub trait IntoMutex: Sized {
    fn into_mutex(self) -> Arc<Mutex<Self>>;
}

impl IntoMutex for Config {
    fn into_mutex(self) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(self))
    }
}

/// Configuration for Access Control List enforcement (spec.md §4.2).
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AclConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Bootstrap secret accepted as the `Management` identity regardless of
    /// the token table. Empty disables the bypass.
    #[serde(default)]
    pub management_secret: String,
    /// Path to a PEM or JWKS file used to verify workload identity claims.
    pub workload_claim_verifier_path: Option<String>,
}

/// Token-bucket parameters for one rate-limited subject (spec.md §5).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RateLimitRule {
    pub max_events: u32,
    pub per_seconds: u64,
    #[serde(default = "default_burst")]
    pub burst: u32,
}

fn default_burst() -> u32 {
    1
}

/// Rate limits for every subject spec.md §5 names: mark-node-bad, Vault
/// token lookups and child-token creation, cross-region replication fetches.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_mark_node_bad")]
    pub mark_node_bad: RateLimitRule,
    #[serde(default = "default_vault_lookup")]
    pub vault_lookup: RateLimitRule,
    #[serde(default = "default_vault_child_token")]
    pub vault_child_token: RateLimitRule,
    #[serde(default = "default_replication_fetch")]
    pub replication_fetch: RateLimitRule,
}

fn default_mark_node_bad() -> RateLimitRule {
    RateLimitRule {
        max_events: 5,
        per_seconds: 1800,
        burst: 10,
    }
}
fn default_vault_lookup() -> RateLimitRule {
    RateLimitRule {
        max_events: 100,
        per_seconds: 60,
        burst: 20,
    }
}
fn default_vault_child_token() -> RateLimitRule {
    RateLimitRule {
        max_events: 20,
        per_seconds: 60,
        burst: 5,
    }
}
fn default_replication_fetch() -> RateLimitRule {
    RateLimitRule {
        max_events: 30,
        per_seconds: 60,
        burst: 10,
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            mark_node_bad: default_mark_node_bad(),
            vault_lookup: default_vault_lookup(),
            vault_child_token: default_vault_child_token(),
            replication_fetch: default_replication_fetch(),
        }
    }
}

/// Parameters the Raft apply wrapper needs; the library implementing Raft
/// itself is external (spec.md §1) and configures the rest on its own.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RaftConfig {
    #[serde(default)]
    pub peers: Vec<String>,
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
    #[serde(default = "default_election_timeout_ms")]
    pub election_timeout_min_ms: u64,
    #[serde(default = "default_election_timeout_max_ms")]
    pub election_timeout_max_ms: u64,
}

fn default_heartbeat_ms() -> u64 {
    500
}
fn default_election_timeout_ms() -> u64 {
    1500
}
fn default_election_timeout_max_ms() -> u64 {
    3000
}

impl Default for RaftConfig {
    fn default() -> Self {
        Self {
            peers: vec![],
            heartbeat_ms: default_heartbeat_ms(),
            election_timeout_min_ms: default_election_timeout_ms(),
            election_timeout_max_ms: default_election_timeout_max_ms(),
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    8878
}

/// Configuration for TLS encryption on the RPC listener.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cert_path")]
    pub cert_path: String,
    #[serde(default = "default_key_path")]
    pub key_path: String,
}

fn default_cert_path() -> String {
    "orchcore.crt".to_string()
}
fn default_key_path() -> String {
    "orchcore.key".to_string()
}

/// A raw representation of the config file before validation and resolution.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    region: String,
    node_id: String,
    #[serde(default = "default_authoritative_region")]
    authoritative_region: Option<String>,
    #[serde(default = "default_data_dir")]
    data_dir: String,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    acl: AclConfig,
    #[serde(default)]
    rate_limit: RateLimitConfig,
    #[serde(default)]
    raft: RaftConfig,
    #[serde(default)]
    metrics: MetricsConfig,
    #[serde(default)]
    tls: TlsConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    4647
}
fn default_data_dir() -> String {
    "orchcore_data".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_authoritative_region() -> Option<String> {
    None
}

/// Represents the final, validated, and resolved server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// This server's own region (spec.md §3 Region).
    pub region: String,
    pub node_id: String,
    /// The region that owns ACL policies/roles/namespaces. Defaults to
    /// `region` — a single-region deployment is its own authority.
    pub authoritative_region: String,
    pub data_dir: String,
    pub log_level: String,
    #[serde(default)]
    pub acl: AclConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub raft: RaftConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub tls: TlsConfig,
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let raw_config: RawConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from '{path}'"))?;

        let config = Config {
            host: raw_config.host,
            port: raw_config.port,
            authoritative_region: raw_config
                .authoritative_region
                .unwrap_or_else(|| raw_config.region.clone()),
            region: raw_config.region,
            node_id: raw_config.node_id,
            data_dir: raw_config.data_dir,
            log_level: raw_config.log_level,
            acl: raw_config.acl,
            rate_limit: raw_config.rate_limit,
            raft: raw_config.raft,
            metrics: raw_config.metrics,
            tls: raw_config.tls,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the resolved configuration to ensure logical consistency.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.region.trim().is_empty() {
            return Err(anyhow!("region cannot be empty"));
        }
        if self.node_id.trim().is_empty() {
            return Err(anyhow!("node_id cannot be empty"));
        }
        if self.data_dir.trim().is_empty() {
            return Err(anyhow!("data_dir cannot be empty"));
        }

        if self.acl.enabled && self.acl.management_secret.trim().is_empty() {
            warn!("acl.enabled is true but acl.management_secret is empty: bootstrap will require an existing management token");
        }

        if self.raft.election_timeout_min_ms >= self.raft.election_timeout_max_ms {
            return Err(anyhow!(
                "raft.election_timeout_min_ms must be less than raft.election_timeout_max_ms"
            ));
        }
        if self.raft.heartbeat_ms >= self.raft.election_timeout_min_ms {
            return Err(anyhow!(
                "raft.heartbeat_ms must be less than raft.election_timeout_min_ms"
            ));
        }

        if self.tls.enabled {
            if self.tls.cert_path.trim().is_empty() {
                return Err(anyhow!("tls.cert_path cannot be empty when TLS is enabled"));
            }
            if self.tls.key_path.trim().is_empty() {
                return Err(anyhow!("tls.key_path cannot be empty when TLS is enabled"));
            }
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(anyhow!("metrics.port cannot be 0"));
            }
            if self.metrics.port == self.port {
                return Err(anyhow!(
                    "metrics.port cannot be the same as the main server port"
                ));
            }
        }

        for (label, rule) in [
            ("rate_limit.mark_node_bad", &self.rate_limit.mark_node_bad),
            ("rate_limit.vault_lookup", &self.rate_limit.vault_lookup),
            ("rate_limit.vault_child_token", &self.rate_limit.vault_child_token),
            ("rate_limit.replication_fetch", &self.rate_limit.replication_fetch),
        ] {
            if rule.max_events == 0 {
                return Err(anyhow!("{label}.max_events cannot be 0"));
            }
            if rule.per_seconds == 0 {
                return Err(anyhow!("{label}.per_seconds cannot be 0"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn minimal_config_loads_with_defaults() {
        let file = write_temp_config(
            r#"
            region = "us-east"
            node_id = "node-1"
            "#,
        );
        let cfg = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.port, 4647);
        assert_eq!(cfg.authoritative_region, "us-east");
        assert!(!cfg.acl.enabled);
    }

    #[test]
    fn authoritative_region_can_differ_from_local_region() {
        let file = write_temp_config(
            r#"
            region = "eu-west"
            node_id = "node-2"
            authoritative_region = "us-east"
            "#,
        );
        let cfg = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.region, "eu-west");
        assert_eq!(cfg.authoritative_region, "us-east");
    }

    #[test]
    fn empty_region_fails_validation() {
        let file = write_temp_config(
            r#"
            region = ""
            node_id = "node-1"
            "#,
        );
        assert!(Config::from_file(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn raft_timing_ordering_is_enforced() {
        let file = write_temp_config(
            r#"
            region = "us-east"
            node_id = "node-1"
            [raft]
            heartbeat_ms = 2000
            election_timeout_min_ms = 1500
            election_timeout_max_ms = 3000
            "#,
        );
        assert!(Config::from_file(file.path().to_str().unwrap()).is_err());
    }
}
