// # Cloudflare DNS Provider
//
// This crate provides the Cloudflare DNS provider for the DDNS updater.
//
// ## Behavior
//
// - Authenticates with the account email and global API key
//   (`X-Auth-Email` / `X-Auth-Key`)
// - Zone lookup lists zones and matches the configured name exactly
// - Record listing returns every record of the zone, all pages, API order
// - Updates replace a record with `{type, name, content}` via PUT
// - A rejected PUT (non-2xx) is returned as `UpdateResult::Rejected`;
//   transport failures are errors
// - Dry-run mode performs every GET and logs the PUT it would send
// - HTTP timeout on every request
// - NO retry logic, NO caching between calls
//
// ## Security Requirements
//
// - The API key NEVER appears in logs or Debug output
// - Provider MUST fail fast if the email or key is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/client/v4/zones`
// - List DNS Records: GET `/client/v4/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/client/v4/zones/:zone_id/dns_records/:record_id`

pub mod envelope;

use async_trait::async_trait;
use ddns_core::config::{CloudflareConfig, HttpConfig};
use ddns_core::record::{DnsRecord, ZoneRecord, select_zone};
use ddns_core::traits::{DnsProvider, HttpStatus, UpdateResult};
use ddns_core::{Error, Result};
use envelope::{ApiEnvelope, error_summary};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com";

/// Upper bound on pages followed for one listing
const MAX_PAGES: u32 = 100;

/// Cloudflare DNS provider
///
/// Stateless and single-shot. Every call issues its own requests; nothing
/// is cached between the zone lookup, the record listing and the updates.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (zone lookup, record listing)
/// - Log the intended PUT payload
/// - **NOT** modify any DNS record
pub struct CloudflareProvider {
    /// Account email, sent as `X-Auth-Email`
    auth_email: String,

    /// Global API key, sent as `X-Auth-Key`
    /// ⚠️ NEVER log this value
    auth_key: String,

    /// API base URL without trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip PUT updates
    dry_run: bool,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("auth_email", &self.auth_email)
            .field("auth_key", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `auth_email`: Cloudflare account email
    /// - `auth_key`: Global API key for that account
    /// - `dry_run`: If true, perform GET requests but skip PUT updates
    /// - `timeout`: Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the email or key is empty.
    pub fn new(
        auth_email: impl Into<String>,
        auth_key: impl Into<String>,
        dry_run: bool,
        timeout: Duration,
    ) -> Result<Self> {
        let auth_email = auth_email.into();
        let auth_key = auth_key.into();

        if auth_email.trim().is_empty() {
            return Err(Error::config("Cloudflare auth email cannot be empty"));
        }
        if auth_key.trim().is_empty() {
            return Err(Error::config("Cloudflare auth key cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            auth_email,
            auth_key,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Create a provider from the validated configuration
    pub fn from_config(cloudflare: &CloudflareConfig, http: &HttpConfig) -> Result<Self> {
        if cloudflare.dry_run {
            tracing::warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
        }

        let provider = Self::new(
            cloudflare.auth_email.clone(),
            cloudflare.auth_key.clone(),
            cloudflare.dry_run,
            http.timeout(),
        )?;

        Ok(match cloudflare.api_base {
            Some(ref base) => provider.with_base_url(base.clone()),
            None => provider,
        })
    }

    /// Point the provider at another API base URL (proxies, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Attach the static auth headers
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("X-Auth-Email", &self.auth_email)
            .header("X-Auth-Key", &self.auth_key)
            .header("Content-Type", "application/json")
    }

    /// GET every page of a list endpoint
    ///
    /// # Parameters
    ///
    /// - `path`: Endpoint path below the base URL
    /// - `what`: Description used in error messages ("zone list", ...)
    async fn get_all<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<Vec<T>> {
        let url = format!("{}{}", self.base_url, path);
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            let mut request = self.authorized(self.client.get(&url));
            if page > 1 {
                request = request.query(&[("page", page)]);
            }

            let envelope: ApiEnvelope<T> = self.fetch_envelope(request, what).await?;
            let more = envelope.has_next_page();
            items.extend(envelope.result);

            if !more {
                break;
            }
            if page >= MAX_PAGES {
                tracing::warn!("Stopped {} pagination after {} pages", what, MAX_PAGES);
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    /// Send one GET and decode its envelope
    async fn fetch_envelope<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<ApiEnvelope<T>> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("{} request failed: {}", what, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read {} response: {}", what, e)))?;

        if !status.is_success() {
            return Err(status_error(status, &body, what));
        }

        let envelope: ApiEnvelope<T> = serde_json::from_str(&body)
            .map_err(|e| Error::decode(format!("Failed to parse {} response: {}", what, e)))?;

        envelope.ensure_success()
    }
}

/// Map a non-success status of a GET to an error
fn status_error(status: StatusCode, body: &str, what: &str) -> Error {
    let detail = error_summary(body);

    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid auth email/key or insufficient permissions. Status: {} - {}",
            status, detail
        )),
        // An endpoint 404 is an upstream failure, not a missing zone or record.
        404 => Error::provider(
            "cloudflare",
            format!("{} endpoint returned {} - {}", what, status, detail),
        ),
        429 => Error::rate_limited(format!(
            "Rate limit exceeded. Please retry later. Status: {}",
            status
        )),
        500..=599 => Error::provider(
            "cloudflare",
            format!("Cloudflare server error (transient): {} - {}", status, detail),
        ),
        _ => Error::provider(
            "cloudflare",
            format!("{} failed: {} - {}", what, status, detail),
        ),
    }
}

fn http_status(status: StatusCode) -> HttpStatus {
    HttpStatus::new(status.as_u16(), status.canonical_reason().unwrap_or_default())
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// Find a zone by exact name
    ///
    /// ```http
    /// GET /client/v4/zones
    /// X-Auth-Email: <email>
    /// X-Auth-Key: <key>
    /// ```
    async fn find_zone(&self, zone_name: &str) -> Result<Option<ZoneRecord>> {
        tracing::debug!("Looking up zone: {}", zone_name);

        let zones: Vec<ZoneRecord> = self.get_all("/client/v4/zones", "zone list").await?;
        tracing::debug!("Account has {} zone(s)", zones.len());

        Ok(select_zone(zones, zone_name))
    }

    /// List every record of a zone
    ///
    /// ```http
    /// GET /client/v4/zones/:zone_id/dns_records
    /// ```
    async fn list_records(&self, zone: &ZoneRecord) -> Result<Vec<DnsRecord>> {
        if zone.id.is_empty() {
            return Err(Error::invalid_input(format!(
                "zone {} has no ID",
                zone.name
            )));
        }

        let path = format!("/client/v4/zones/{}/dns_records", zone.id);
        self.get_all(&path, "record list").await
    }

    /// Replace a record
    ///
    /// ```http
    /// PUT /client/v4/zones/:zone_id/dns_records/:record_id
    /// {
    ///   "type": "A",
    ///   "name": "home.example.com",
    ///   "content": "203.0.113.7"
    /// }
    /// ```
    async fn update_record(
        &self,
        zone: &ZoneRecord,
        record: &DnsRecord,
        replacement: &DnsRecord,
    ) -> Result<UpdateResult> {
        let url = format!(
            "{}/client/v4/zones/{}/dns_records/{}",
            self.base_url, zone.id, record.id
        );

        tracing::info!(
            "{} DNS record: {} -> {} (was: {}) [mode: {}]",
            if self.dry_run { "Would update" } else { "Updating" },
            record.name,
            replacement.content,
            record.content,
            if self.dry_run { "DRY-RUN" } else { "LIVE" }
        );

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PUT request to {} with payload: {}",
                url,
                serde_json::to_string(replacement)?
            );
            return Ok(UpdateResult::DryRun);
        }

        let response = self
            .authorized(self.client.put(&url))
            .json(replacement)
            .send()
            .await
            .map_err(|e| Error::http(format!("Record update request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            tracing::info!("DNS record updated successfully: {} -> {}", record.name, replacement.content);
            return Ok(UpdateResult::Updated {
                status: http_status(status),
            });
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        let message = match status.as_u16() {
            401 | 403 => format!(
                "Authentication failed: invalid auth email/key or insufficient permissions - {}",
                error_summary(&body)
            ),
            409 => format!(
                "Conflict: record is being updated by another process - {}",
                error_summary(&body)
            ),
            429 => "Rate limit exceeded. Please retry later".to_string(),
            _ => error_summary(&body),
        };

        Ok(UpdateResult::Rejected {
            status: http_status(status),
            message,
        })
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(auth_email: &str, auth_key: &str) -> Result<CloudflareProvider> {
        CloudflareProvider::new(auth_email, auth_key, false, HttpConfig::default().timeout())
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let err = live("", "key").unwrap_err();
        assert!(err.is_config());

        let err = live("ops@example.com", "  ").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_from_config_honors_dry_run_and_base() {
        let config = CloudflareConfig {
            auth_email: "ops@example.com".to_string(),
            auth_key: "key".to_string(),
            zone_name: "example.com".to_string(),
            dns_name: "home.example.com".to_string(),
            dry_run: true,
            api_base: Some("http://127.0.0.1:9999/".to_string()),
        };

        let provider = CloudflareProvider::from_config(&config, &HttpConfig::default()).unwrap();
        assert!(provider.dry_run, "dryRun in config should reach the provider");
        assert_eq!(provider.base_url, "http://127.0.0.1:9999");
    }

    #[test]
    fn test_provider_name() {
        let provider = live("ops@example.com", "key").unwrap();
        assert_eq!(provider.provider_name(), "cloudflare");
    }

    #[test]
    fn test_api_key_not_exposed_in_debug() {
        let provider = live("ops@example.com", "secret_key_12345").unwrap();

        let debug_str = format!("{:?}", provider);
        assert!(!debug_str.contains("secret_key_12345"));
        assert!(debug_str.contains("CloudflareProvider"));
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "", "zone list"),
            Error::Authentication(_)
        ));
        let missing_endpoint = status_error(StatusCode::NOT_FOUND, "", "record list");
        assert!(matches!(missing_endpoint, Error::Provider { .. }));
        assert!(!missing_endpoint.is_not_found());
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "", "zone list"),
            Error::RateLimited(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "", "zone list"),
            Error::Provider { .. }
        ));
    }

    #[test]
    fn test_http_status_text() {
        assert_eq!(http_status(StatusCode::OK).to_string(), "200 OK");
        assert_eq!(
            http_status(StatusCode::BAD_REQUEST).to_string(),
            "400 Bad Request"
        );
    }
}
