//! Zone and DNS record types
//!
//! These mirror the provider's JSON shapes. Unknown fields in responses are
//! ignored, so only the fields the updater touches are modeled.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Record type written by the updater
pub const A_RECORD: &str = "A";

/// A DNS provider zone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRecord {
    /// Provider zone ID
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Zone name (e.g. "example.com")
    pub name: String,
}

impl ZoneRecord {
    /// Create a zone descriptor
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A DNS record belonging to a zone
///
/// The same shape doubles as the update payload: with an empty `id` it
/// serializes to `{"type", "name", "content"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Provider record ID
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Record type ("A", "AAAA", "CNAME", ...)
    #[serde(rename = "type", default)]
    pub record_type: String,

    /// Fully qualified record name
    pub name: String,

    /// Record value; the IP for A records
    #[serde(default)]
    pub content: String,
}

impl DnsRecord {
    /// Create a record
    pub fn new(
        id: impl Into<String>,
        record_type: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            record_type: record_type.into(),
            name: name.into(),
            content: content.into(),
        }
    }

    /// Replacement payload pointing `name` at `ip`
    pub fn a_record(name: impl Into<String>, ip: Ipv4Addr) -> Self {
        Self::new(String::new(), A_RECORD, name, ip.to_string())
    }
}

/// First zone whose name equals `zone_name`
pub fn select_zone(zones: Vec<ZoneRecord>, zone_name: &str) -> Option<ZoneRecord> {
    zones.into_iter().find(|zone| zone.name == zone_name)
}

/// Records whose name equals `dns_name`, in the order given
pub fn matching_records<'a>(
    records: &'a [DnsRecord],
    dns_name: &'a str,
) -> impl Iterator<Item = &'a DnsRecord> + 'a {
    records.iter().filter(move |record| record.name == dns_name)
}
