//! CLI command implementations.

pub mod check;
pub mod config;
pub mod sidecar;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fleetgate_authz::{
    AuditEmitter, AuditRecord, ChannelAuditSink, Clock, DecisionEngine, FixedClock,
    MemoryAuditSink, SystemClock, TracingAuditSink,
};
use fleetgate_config::{AuditSinkKind, FleetgateConfig};
use fleetgate_graph::GraphSnapshot;
use tokio::sync::mpsc;

/// An engine wired from configuration, plus handles to the sinks that
/// buffer records for the command to report.
pub struct Wiring {
    pub engine: DecisionEngine,
    pub memory: Option<Arc<MemoryAuditSink>>,
    pub channel: Option<mpsc::Receiver<AuditRecord>>,
}

/// Loads `snapshot` and builds an engine according to `config`.
pub fn wire(config: &FleetgateConfig, snapshot: &Path, at: Option<&str>) -> Result<Wiring> {
    let graph = GraphSnapshot::load(snapshot)
        .with_context(|| format!("Failed to load snapshot {}", snapshot.display()))?
        .into_graph();

    let clock: Arc<dyn Clock> = match at {
        Some(at) => Arc::new(FixedClock(parse_instant(at)?)),
        None => Arc::new(SystemClock),
    };

    let mut audit = AuditEmitter::disabled();
    let mut memory = None;
    let mut channel = None;
    if config.audit.enabled {
        for kind in &config.audit.sinks {
            match kind {
                AuditSinkKind::Tracing => {
                    audit = audit.with_sink(Arc::new(TracingAuditSink));
                }
                AuditSinkKind::Memory => {
                    let sink = Arc::new(MemoryAuditSink::new());
                    audit = audit.with_sink(sink.clone());
                    memory = Some(sink);
                }
                AuditSinkKind::Channel => {
                    let (sink, receiver) = ChannelAuditSink::new(config.audit.channel_capacity);
                    audit = audit.with_sink(Arc::new(sink));
                    channel = Some(receiver);
                }
            }
        }
    }

    let engine = DecisionEngine::builder(Arc::new(graph))
        .store_timeout(config.engine.store_timeout())
        .cache_decisions(config.engine.cache_decisions)
        .policy(config.policy.to_policy())
        .audit(audit)
        .clock(clock)
        .build();

    Ok(Wiring {
        engine,
        memory,
        channel,
    })
}

fn parse_instant(at: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(at)
        .map(|instant| instant.with_timezone(&Utc))
        .with_context(|| format!("Invalid --at instant '{at}', expected RFC 3339"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_instant() {
        let instant = parse_instant("2025-03-14T09:00:00+02:00").unwrap();
        assert_eq!(instant.to_rfc3339(), "2025-03-14T07:00:00+00:00");
        assert!(parse_instant("yesterday").is_err());
    }
}
