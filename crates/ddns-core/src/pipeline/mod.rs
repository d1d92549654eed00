//! The update pipeline
//!
//! One run is one linear pass through four stages:
//!
//! ```text
//! ┌─────────────┐   Ipv4Addr   ┌──────────────┐  ZoneRecord  ┌──────────────┐  Vec<DnsRecord>  ┌──────────────┐
//! │  IpSource   │─────────────▶│ Zone lookup  │─────────────▶│ Record fetch │─────────────────▶│ Record update│
//! │  (gateway)  │              │ (provider)   │              │ (provider)   │                  │ (provider)   │
//! └─────────────┘              └──────────────┘              └──────────────┘                  └──────────────┘
//! ```
//!
//! A failing stage ends the run with an error tagged by [`Stage`]. A missing
//! zone or hostname is handled per [`NotFoundPolicy`]: either reported as a
//! [`Notice`] on a successful run, or turned into a not-found error.
//!
//! Progress is published as [`PipelineEvent`]s on a channel so the caller can
//! print it while the run is in flight.

use crate::config::{DdnsConfig, NotFoundPolicy};
use crate::error::{Result, Stage};
use crate::record::{DnsRecord, ZoneRecord, matching_records};
use crate::traits::{DnsProvider, HttpStatus, IpSource, UpdateResult};
use std::fmt;
use std::net::Ipv4Addr;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Events emitted while the pipeline runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A stage is starting
    StageStarted { stage: Stage },

    /// The gateway reported its public address
    IpResolved { ip: Ipv4Addr },

    /// The configured zone was found
    ZoneLocated { zone: ZoneRecord },

    /// Records were listed for the zone
    RecordsFetched { count: usize },

    /// The provider accepted an update
    RecordUpdated { name: String, status: HttpStatus },

    /// The provider rejected an update
    RecordRejected {
        name: String,
        status: HttpStatus,
        message: String,
    },

    /// Dry-run mode: an update was skipped
    RecordSkipped { name: String, content: String },

    /// The zone or hostname does not exist
    NotFound { notice: Notice },
}

/// A not-found condition observed during the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// No zone has the configured name
    ZoneNotFound { zone_name: String },

    /// No record in the zone has the configured hostname
    RecordNotFound { dns_name: String, zone_name: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::ZoneNotFound { zone_name } => write!(f, "zone {} not found", zone_name),
            Notice::RecordNotFound {
                dns_name,
                zone_name,
            } => write!(f, "record {} not found in zone {}", dns_name, zone_name),
        }
    }
}

/// Outcome for one matched record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Provider record ID
    pub record_id: String,
    /// Record name
    pub name: String,
    /// What the provider did with the update
    pub result: UpdateResult,
}

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Public address reported by the gateway
    pub ip: Ipv4Addr,
    /// The located zone, if any
    pub zone: Option<ZoneRecord>,
    /// Number of records listed in the zone
    pub records_seen: usize,
    /// One entry per matched record, in API order
    pub outcomes: Vec<RecordOutcome>,
    /// Not-found conditions reported under [`NotFoundPolicy::Continue`]
    pub notices: Vec<Notice>,
}

impl RunReport {
    fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            zone: None,
            records_seen: 0,
            outcomes: Vec::new(),
            notices: Vec::new(),
        }
    }

    /// Outcomes the provider rejected
    pub fn rejected(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_rejected())
    }

    /// Whether any update was rejected
    pub fn has_rejections(&self) -> bool {
        self.rejected().next().is_some()
    }

    /// Number of updates the provider accepted
    pub fn updated_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, UpdateResult::Updated { .. }))
            .count()
    }
}

/// The update pipeline
///
/// Built once per run from the validated configuration, then consumed by
/// [`UpdatePipeline::run`]. Stages run strictly in sequence; no request is
/// issued before the previous one has completed.
pub struct UpdatePipeline {
    /// Where the public address comes from
    ip_source: Box<dyn IpSource>,

    /// Where the records live
    provider: Box<dyn DnsProvider>,

    /// Zone holding the record
    zone_name: String,

    /// Record to point at the gateway
    dns_name: String,

    /// Handling of missing zone or record
    not_found: NotFoundPolicy,

    /// Event sender for progress reporting
    event_tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl UpdatePipeline {
    /// Create a new pipeline
    ///
    /// # Returns
    ///
    /// A tuple of (pipeline, event_receiver). The receiver yields progress
    /// events and closes once the pipeline is dropped.
    pub fn new(
        ip_source: Box<dyn IpSource>,
        provider: Box<dyn DnsProvider>,
        config: &DdnsConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<PipelineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();

        let pipeline = Self {
            ip_source,
            provider,
            zone_name: provider_name_form(&config.cloudflare.zone_name),
            dns_name: provider_name_form(&config.cloudflare.dns_name),
            not_found: config.policy.not_found,
            event_tx: tx,
        };

        Ok((pipeline, rx))
    }

    /// Run all four stages once
    ///
    /// # Returns
    ///
    /// - `Ok(RunReport)`: Every stage completed, or stopped at a not-found
    ///   condition under [`NotFoundPolicy::Continue`]
    /// - `Err(Error)`: A stage failed; the error carries the stage tag
    pub async fn run(&self) -> Result<RunReport> {
        // Stage 1: gateway address
        self.emit(PipelineEvent::StageStarted {
            stage: Stage::Gateway,
        });
        let ip = self
            .ip_source
            .current()
            .await
            .map_err(|e| e.in_stage(Stage::Gateway))?;
        info!("Gateway {} reports WAN IP {}", self.ip_source.source_name(), ip);
        self.emit(PipelineEvent::IpResolved { ip });

        let mut report = RunReport::new(ip);

        // Stage 2: zone
        self.emit(PipelineEvent::StageStarted {
            stage: Stage::ZoneLookup,
        });
        let zone = self
            .provider
            .find_zone(&self.zone_name)
            .await
            .map_err(|e| e.in_stage(Stage::ZoneLookup))?;

        let Some(zone) = zone else {
            let notice = Notice::ZoneNotFound {
                zone_name: self.zone_name.clone(),
            };
            return self.not_found(report, notice, Stage::ZoneLookup);
        };
        debug!("Found zone {} ({})", zone.name, zone.id);
        self.emit(PipelineEvent::ZoneLocated { zone: zone.clone() });
        report.zone = Some(zone.clone());

        // Stage 3: records
        self.emit(PipelineEvent::StageStarted {
            stage: Stage::RecordFetch,
        });
        let records = self
            .provider
            .list_records(&zone)
            .await
            .map_err(|e| e.in_stage(Stage::RecordFetch))?;
        debug!("Zone {} has {} record(s)", zone.name, records.len());
        report.records_seen = records.len();
        self.emit(PipelineEvent::RecordsFetched {
            count: records.len(),
        });

        // Stage 4: update every exact name match
        self.emit(PipelineEvent::StageStarted {
            stage: Stage::RecordUpdate,
        });
        let targets: Vec<&DnsRecord> = matching_records(&records, &self.dns_name).collect();
        if targets.is_empty() {
            let notice = Notice::RecordNotFound {
                dns_name: self.dns_name.clone(),
                zone_name: zone.name.clone(),
            };
            return self.not_found(report, notice, Stage::RecordUpdate);
        }

        if targets.len() > 1 {
            warn!(
                "{} records named {}, updating all of them",
                targets.len(),
                self.dns_name
            );
        }

        let replacement = DnsRecord::a_record(self.dns_name.clone(), ip);
        for record in targets {
            let result = self
                .provider
                .update_record(&zone, record, &replacement)
                .await
                .map_err(|e| e.in_stage(Stage::RecordUpdate))?;

            self.report_update(record, &replacement, &result);
            report.outcomes.push(RecordOutcome {
                record_id: record.id.clone(),
                name: record.name.clone(),
                result,
            });
        }

        info!(
            "Run complete: {} updated, {} rejected",
            report.updated_count(),
            report.rejected().count()
        );
        Ok(report)
    }

    /// Log and publish one update outcome
    fn report_update(&self, record: &DnsRecord, replacement: &DnsRecord, result: &UpdateResult) {
        match result {
            UpdateResult::Updated { status } => {
                info!("Updated {} -> {} ({})", record.name, replacement.content, status);
                self.emit(PipelineEvent::RecordUpdated {
                    name: record.name.clone(),
                    status: status.clone(),
                });
            }
            UpdateResult::Rejected { status, message } => {
                warn!("Update of {} rejected: {} {}", record.name, status, message);
                self.emit(PipelineEvent::RecordRejected {
                    name: record.name.clone(),
                    status: status.clone(),
                    message: message.clone(),
                });
            }
            UpdateResult::DryRun => {
                info!("[DRY-RUN] Skipped update of {} -> {}", record.name, replacement.content);
                self.emit(PipelineEvent::RecordSkipped {
                    name: record.name.clone(),
                    content: replacement.content.clone(),
                });
            }
        }
    }

    /// Apply the not-found policy
    fn not_found(&self, mut report: RunReport, notice: Notice, stage: Stage) -> Result<RunReport> {
        warn!("{}", notice);
        self.emit(PipelineEvent::NotFound {
            notice: notice.clone(),
        });

        match self.not_found {
            NotFoundPolicy::Continue => {
                report.notices.push(notice);
                Ok(report)
            }
            NotFoundPolicy::Abort => {
                Err(crate::Error::not_found(notice.to_string()).in_stage(stage))
            }
        }
    }

    /// Emit a pipeline event
    fn emit(&self, event: PipelineEvent) {
        if self.event_tx.send(event).is_err() {
            // Nobody is listening; progress still goes to the log.
            debug!("Event receiver dropped, event discarded");
        }
    }
}

/// A configured name as the provider lists it: no surrounding whitespace,
/// no trailing root dot
fn provider_name_form(name: &str) -> String {
    let name = name.trim();
    name.strip_suffix('.').unwrap_or(name).to_string()
}
