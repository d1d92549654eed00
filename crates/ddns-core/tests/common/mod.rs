//! Test doubles and common utilities for pipeline contract tests
//!
//! The doubles record every call so tests can assert on what the pipeline
//! asked of its integrations, and in which order.

#![allow(dead_code)]

use ddns_core::config::{CloudflareConfig, DdnsConfig, UnifiConfig};
use ddns_core::error::{Error, Result};
use ddns_core::record::{DnsRecord, ZoneRecord};
use ddns_core::traits::{DnsProvider, HttpStatus, IpSource, UpdateResult};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// An IpSource that always reports the same address
pub struct FixedIpSource {
    ip: Ipv4Addr,
    call_count: Arc<AtomicUsize>,
}

impl FixedIpSource {
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter shared with this source
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.call_count)
    }
}

#[async_trait::async_trait]
impl IpSource for FixedIpSource {
    async fn current(&self) -> Result<Ipv4Addr> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.ip)
    }

    fn source_name(&self) -> &'static str {
        "fixed"
    }
}

/// An IpSource whose status payload never contains a WAN IP
pub struct FailingIpSource;

#[async_trait::async_trait]
impl IpSource for FailingIpSource {
    async fn current(&self) -> Result<Ipv4Addr> {
        Err(Error::extraction("no wan_ip field in status response"))
    }

    fn source_name(&self) -> &'static str {
        "failing"
    }
}

/// One update request as seen by the mock provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCall {
    pub zone_id: String,
    pub record_id: String,
    pub payload: DnsRecord,
}

/// Shared view of what a [`MockDnsProvider`] was asked to do
#[derive(Clone, Default)]
pub struct ProviderLog {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub updates: Arc<Mutex<Vec<UpdateCall>>>,
}

impl ProviderLog {
    /// Method names in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Update requests in call order
    pub fn updates(&self) -> Vec<UpdateCall> {
        self.updates.lock().unwrap().clone()
    }
}

/// A DnsProvider backed by in-memory zones and records
pub struct MockDnsProvider {
    zones: Vec<ZoneRecord>,
    records: Vec<DnsRecord>,
    reject_with: Option<HttpStatus>,
    fail_listing: bool,
    log: ProviderLog,
}

impl MockDnsProvider {
    pub fn new(zones: Vec<ZoneRecord>, records: Vec<DnsRecord>) -> Self {
        Self {
            zones,
            records,
            reject_with: None,
            fail_listing: false,
            log: ProviderLog::default(),
        }
    }

    /// Answer every update with this non-2xx status
    pub fn rejecting(mut self, status: HttpStatus) -> Self {
        self.reject_with = Some(status);
        self
    }

    /// Fail the record listing with a transport error
    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    /// Log shared with this provider
    pub fn log(&self) -> ProviderLog {
        self.log.clone()
    }

    fn record_call(&self, name: &str) {
        self.log.calls.lock().unwrap().push(name.to_string());
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn find_zone(&self, zone_name: &str) -> Result<Option<ZoneRecord>> {
        self.record_call("find_zone");
        Ok(ddns_core::record::select_zone(self.zones.clone(), zone_name))
    }

    async fn list_records(&self, _zone: &ZoneRecord) -> Result<Vec<DnsRecord>> {
        self.record_call("list_records");
        if self.fail_listing {
            return Err(Error::http("connection reset by peer"));
        }
        Ok(self.records.clone())
    }

    async fn update_record(
        &self,
        zone: &ZoneRecord,
        record: &DnsRecord,
        replacement: &DnsRecord,
    ) -> Result<UpdateResult> {
        self.record_call("update_record");
        self.log.updates.lock().unwrap().push(UpdateCall {
            zone_id: zone.id.clone(),
            record_id: record.id.clone(),
            payload: replacement.clone(),
        });

        match self.reject_with {
            Some(ref status) => Ok(UpdateResult::Rejected {
                status: status.clone(),
                message: "Content for A record is invalid".to_string(),
            }),
            None => Ok(UpdateResult::Updated {
                status: HttpStatus::new(200, "OK"),
            }),
        }
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Helper to create a minimal valid DdnsConfig for testing
pub fn minimal_config(zone_name: &str, dns_name: &str) -> DdnsConfig {
    DdnsConfig {
        unifi: UnifiConfig {
            username: "admin".to_string(),
            password: "secret".to_string(),
            host: "192.168.1.1".to_string(),
        },
        cloudflare: CloudflareConfig {
            auth_email: "ops@example.com".to_string(),
            auth_key: "test-key".to_string(),
            zone_name: zone_name.to_string(),
            dns_name: dns_name.to_string(),
            dry_run: false,
            api_base: None,
        },
        ..Default::default()
    }
}

/// Drain every event currently queued on the receiver
pub fn drain<T>(rx: &mut tokio::sync::mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
