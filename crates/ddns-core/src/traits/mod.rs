//! Core traits for the DDNS updater
//!
//! This module defines the seams between the pipeline and its integrations.
//!
//! - [`IpSource`]: Discover the gateway's public IPv4 address
//! - [`DnsProvider`]: Look up zones and records, and update records

pub mod ip_source;
pub mod dns_provider;

pub use ip_source::IpSource;
pub use dns_provider::{DnsProvider, HttpStatus, UpdateResult};
