//! Configuration types for the DDNS updater
//!
//! The configuration is read once from a JSON file, adjusted by a few
//! `DDNS_*` environment overrides, validated, and then passed by reference
//! into every stage. Nothing reads settings from global state.
//!
//! ```json
//! {
//!   "unifi": { "username": "admin", "password": "...", "host": "192.168.1.1" },
//!   "cloudflare": {
//!     "authEmail": "ops@example.com",
//!     "authKey": "...",
//!     "zoneName": "example.com",
//!     "dnsName": "home.example.com"
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Default config file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Environment variable naming an alternative config file
pub const CONFIG_PATH_ENV: &str = "DDNS_CONFIG";

/// Main DDNS configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// Router (UniFi controller) settings
    #[serde(default)]
    pub unifi: UnifiConfig,

    /// Cloudflare settings
    #[serde(default)]
    pub cloudflare: CloudflareConfig,

    /// What to do when the zone or hostname is not found
    #[serde(default)]
    pub policy: PolicyConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

impl DdnsConfig {
    /// Read and parse a config file without validating it
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config(format!("unable to read {}: {}", path.display(), e))
        })?;

        Self::from_json_str(&raw).map_err(|e| match e {
            crate::Error::Config(msg) => {
                crate::Error::config(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Parse a JSON config document without validating it
    pub fn from_json_str(raw: &str) -> Result<Self, crate::Error> {
        serde_json::from_str(raw)
            .map_err(|e| crate::Error::config(format!("malformed config file: {}", e)))
    }

    /// Apply `DDNS_*` overrides
    ///
    /// - `DDNS_LOG_LEVEL`: replaces `log.level`
    /// - `DDNS_MODE=dry-run`: forces `cloudflare.dryRun`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("DDNS_LOG_LEVEL").filter(|l| !l.trim().is_empty()) {
            self.log.level = level.trim().to_string();
        }

        if lookup("DDNS_MODE").is_some_and(|m| m.trim().eq_ignore_ascii_case("dry-run")) {
            self.cloudflare.dry_run = true;
        }
    }

    /// Validate the configuration
    ///
    /// Every problem is collected, so a single error lists all missing
    /// keys and invalid values at once.
    pub fn validate(&self) -> Result<(), crate::Error> {
        let required = [
            ("unifi.username", &self.unifi.username),
            ("unifi.password", &self.unifi.password),
            ("unifi.host", &self.unifi.host),
            ("cloudflare.authEmail", &self.cloudflare.auth_email),
            ("cloudflare.authKey", &self.cloudflare.auth_key),
            ("cloudflare.zoneName", &self.cloudflare.zone_name),
            ("cloudflare.dnsName", &self.cloudflare.dns_name),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| *key)
            .collect();

        let mut problems = Vec::new();
        if !missing.is_empty() {
            problems.push(format!("missing keys: {}", missing.join(", ")));
        }

        let zone_name = self.cloudflare.zone_name.trim();
        let dns_name = self.cloudflare.dns_name.trim();

        if !zone_name.is_empty() {
            if let Err(e) = validate_domain_name(zone_name) {
                problems.push(format!("cloudflare.zoneName: {}", e));
            }
        }

        if !dns_name.is_empty() {
            if let Err(e) = validate_domain_name(dns_name) {
                problems.push(format!("cloudflare.dnsName: {}", e));
            } else if !zone_name.is_empty() && !is_within_zone(dns_name, zone_name) {
                problems.push(format!(
                    "cloudflare.dnsName '{}' is not inside zone '{}'",
                    dns_name, zone_name
                ));
            }
        }

        if !self.unifi.host.trim().is_empty() && self.unifi.host.trim().contains(char::is_whitespace) {
            problems.push(format!(
                "unifi.host '{}' contains whitespace",
                self.unifi.host.trim()
            ));
        }

        if let Some(ref api_base) = self.cloudflare.api_base {
            if !api_base.starts_with("https://") && !api_base.starts_with("http://") {
                problems.push(format!(
                    "cloudflare.apiBase must use HTTP or HTTPS scheme. Got: {}",
                    api_base
                ));
            }
        }

        if !(1..=300).contains(&self.http.timeout_secs) {
            problems.push(format!(
                "http.timeoutSecs must be between 1 and 300 seconds. Got: {}",
                self.http.timeout_secs
            ));
        }

        match self.log.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => problems.push(format!(
                "log.level '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                self.log.level
            )),
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(crate::Error::config(problems.join("; ")))
        }
    }
}

/// Router (UniFi controller) settings
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct UnifiConfig {
    /// Controller login name
    #[serde(default)]
    pub username: String,

    /// Controller password
    /// ⚠️ NEVER log this value
    #[serde(default)]
    pub password: String,

    /// Controller host, optionally with port or scheme (`192.168.1.1:8443`)
    #[serde(default)]
    pub host: String,
}

impl UnifiConfig {
    /// Base URL of the controller
    ///
    /// A bare host is reached over HTTPS. A host that already carries a
    /// scheme is used as given.
    pub fn base_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if host.contains("://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        }
    }
}

// Custom Debug implementation that hides the password
impl fmt::Debug for UnifiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnifiConfig")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("host", &self.host)
            .finish()
    }
}

/// Cloudflare settings
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudflareConfig {
    /// Account email sent as `X-Auth-Email`
    #[serde(default)]
    pub auth_email: String,

    /// Global API key sent as `X-Auth-Key`
    /// ⚠️ NEVER log this value
    #[serde(default)]
    pub auth_key: String,

    /// Zone that holds the record (e.g. "example.com")
    #[serde(default)]
    pub zone_name: String,

    /// Record to keep pointed at the gateway (e.g. "home.example.com")
    #[serde(default)]
    pub dns_name: String,

    /// Perform all lookups but skip the PUT
    #[serde(default)]
    pub dry_run: bool,

    /// API base URL override, defaults to `https://api.cloudflare.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl fmt::Debug for CloudflareConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudflareConfig")
            .field("auth_email", &self.auth_email)
            .field("auth_key", &"<REDACTED>")
            .field("zone_name", &self.zone_name)
            .field("dns_name", &self.dns_name)
            .field("dry_run", &self.dry_run)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Behavior when the configured zone or hostname does not exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotFoundPolicy {
    /// Report a notice and finish the run successfully
    #[default]
    Continue,
    /// Fail the run with a not-found error
    Abort,
}

/// Pipeline policy settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfig {
    /// What to do when the zone or hostname is not found
    #[serde(default)]
    pub not_found: NotFoundPolicy,
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl HttpConfig {
    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// One of trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Whether `name` is the zone apex or a name below it
pub fn is_within_zone(name: &str, zone: &str) -> bool {
    let name = name.trim_end_matches('.').to_ascii_lowercase();
    let zone = zone.trim_end_matches('.').to_ascii_lowercase();
    name == zone || name.ends_with(&format!(".{}", zone))
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 checks: total length, label length, characters, and
/// hyphen placement. A single trailing dot is accepted.
pub fn validate_domain_name(domain: &str) -> Result<(), String> {
    let domain = domain.strip_suffix('.').unwrap_or(domain);

    if domain.is_empty() {
        return Err("Domain name cannot be empty".to_string());
    }

    if domain.len() > 253 {
        return Err(format!(
            "Domain name too long: {} chars (max 253)",
            domain.len()
        ));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(format!("Domain name has empty label: '{}'", domain));
        }

        if label.len() > 63 {
            return Err(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            ));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(format!(
                "Domain label contains invalid characters. Label: '{}'",
                label
            ));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            ));
        }
    }

    Ok(())
}
