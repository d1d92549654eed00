// # ddns-core
//
// Core library for the UniFi → Cloudflare dynamic-DNS updater.
//
// ## Architecture Overview
//
// - **IpSource**: Trait for discovering the gateway's public IPv4 address
// - **DnsProvider**: Trait for zone lookup, record listing and record updates
// - **UpdatePipeline**: Runs gateway → zone → records → update once
// - **DdnsConfig**: Typed configuration, validated once at startup
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Pipeline logic is separate from integrations
// 2. **One pass per run**: No scheduler, no state, no retries
// 3. **Explicit configuration**: Settings are passed in, never read globally
// 4. **Observable outcomes**: Not-found and rejected updates are reported, not swallowed

pub mod traits;
pub mod pipeline;
pub mod record;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{IpSource, DnsProvider, HttpStatus, UpdateResult};
pub use pipeline::{Notice, PipelineEvent, RecordOutcome, RunReport, UpdatePipeline};
pub use record::{DnsRecord, ZoneRecord};
pub use config::{DdnsConfig, NotFoundPolicy};
pub use error::{Error, Result, Stage};
