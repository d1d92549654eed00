// # DNS Provider Trait
//
// Defines the interface for reading and updating DNS records via a provider
// API.
//
// ## Implementations
//
// - Cloudflare: `ddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::{DnsProvider, DnsRecord};
//
// let zone = provider.find_zone("example.com").await?.expect("zone exists");
// let records = provider.list_records(&zone).await?;
// for record in records.iter().filter(|r| r.name == "home.example.com") {
//     let payload = DnsRecord::a_record("home.example.com", wan_ip);
//     provider.update_record(&zone, record, &payload).await?;
// }
// ```

use crate::record::{DnsRecord, ZoneRecord};
use async_trait::async_trait;
use std::fmt;

/// HTTP status returned by the provider for an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpStatus {
    /// Numeric status code
    pub code: u16,
    /// Canonical reason phrase, empty if unknown
    pub reason: String,
}

impl HttpStatus {
    /// Create a status from a code and reason phrase
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.reason)
        }
    }
}

/// Result of a single record update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateResult {
    /// The provider accepted the update
    Updated {
        /// Response status
        status: HttpStatus,
    },
    /// The provider answered with a non-2xx status
    Rejected {
        /// Response status
        status: HttpStatus,
        /// Error details from the response body
        message: String,
    },
    /// Dry-run mode: the update was logged, not sent
    DryRun,
}

impl UpdateResult {
    /// Whether the provider rejected the update
    pub fn is_rejected(&self) -> bool {
        matches!(self, UpdateResult::Rejected { .. })
    }
}

/// Trait for DNS provider implementations
///
/// Providers are stateless and single-shot: each method performs the API
/// calls for one step and returns. No retries, no caching between calls.
///
/// A transport or decode failure is an `Err`. A rejected update is not: it
/// comes back as [`UpdateResult::Rejected`] so the pipeline can still
/// attempt the remaining records and report every outcome.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Find the zone named `zone_name`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(zone))`: The first zone with that exact name
    /// - `Ok(None)`: No zone has that name
    /// - `Err(Error)`: The lookup failed
    async fn find_zone(&self, zone_name: &str) -> Result<Option<ZoneRecord>, crate::Error>;

    /// List every record in `zone`, in the order the API returns them
    async fn list_records(&self, zone: &ZoneRecord) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Replace `record` with `replacement`
    ///
    /// # Parameters
    ///
    /// - `zone`: The zone holding the record
    /// - `record`: The existing record (its `id` addresses the update)
    /// - `replacement`: The payload to write
    async fn update_record(
        &self,
        zone: &ZoneRecord,
        record: &DnsRecord,
        replacement: &DnsRecord,
    ) -> Result<UpdateResult, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(HttpStatus::new(200, "OK").to_string(), "200 OK");
        assert_eq!(HttpStatus::new(599, "").to_string(), "599");
    }}
