// # IP Source Trait
//
// Defines the interface for discovering the gateway's public IP address.
//
// ## Implementations
//
// - UniFi controller: `ddns-ip-unifi` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::IpSource;
//
// #[tokio::main(flavor = "current_thread")]
// async fn main() -> anyhow::Result<()> {
//     let source = /* IpSource implementation */;
//
//     let wan_ip = source.current().await?;
//     println!("gateway is at {}", wan_ip);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for IP source implementations
///
/// A source answers one question per call: what is the public IPv4 address
/// right now. It keeps no state between calls; every call performs a fresh
/// discovery (login, status fetch, extraction).
///
/// Sources never retry. A failure is returned to the pipeline, which ends
/// the run.
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Get the current public IPv4 address
    ///
    /// # Returns
    ///
    /// - `Ok(Ipv4Addr)`: The current address
    /// - `Err(Error)`: If the address could not be determined
    async fn current(&self) -> Result<Ipv4Addr, crate::Error>;

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}
