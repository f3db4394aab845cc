use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::engine::ScanExecutor;
use crate::error::RegistryError;
use crate::registry::RegistryClient;
use crate::types::{CycleSummary, DomainReport, RecordId};

/// One pass over every active domain: fetch, then scan-and-update each in registry order.
///
/// - Only the initial fetch can fail the cycle.
/// - Each domain's scan-then-update runs as one isolated task; a failed update or
///   a panicking task never stops the remaining domains.
/// - A `Semaphore` bounds tasks in flight. Permits are taken in registry order
///   before spawning, so a concurrency of 1 is strictly sequential.
#[derive(Debug, Clone)]
pub struct Cycle {
    registry: Arc<RegistryClient>,
    executor: Arc<ScanExecutor>,
    concurrency: usize,
}

impl Cycle {
    pub fn new(config: &Config, registry: RegistryClient, executor: ScanExecutor) -> Self {
        Self {
            registry: Arc::new(registry),
            executor: Arc::new(executor),
            concurrency: config.concurrency.max(1),
        }
    }

    pub async fn run(&self) -> Result<CycleSummary, RegistryError> {
        let records = self.registry.fetch_active_domains().await?;
        let mut summary = CycleSummary {
            fetched_active: records.len() as u64,
            ..CycleSummary::default()
        };

        let sem = Arc::new(Semaphore::new(self.concurrency));
        let mut set = JoinSet::new();

        for (idx, record) in records.into_iter().enumerate() {
            let Some(domain) = record.domain_name else {
                debug!(record = ?record.id, "Skipping record without domain");
                summary.skipped += 1;
                continue;
            };
            let Some(id) = record.id else {
                warn!(domain = %domain, "Skipping record without Id; it cannot be updated");
                summary.skipped += 1;
                continue;
            };

            let permit = sem
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore in scope");
            let registry = self.registry.clone();
            let executor = self.executor.clone();

            set.spawn(async move {
                let _permit = permit; // held until this domain is persisted
                let (degraded, report) = scan_and_record(&registry, &executor, id, domain).await;
                (idx, degraded, report)
            });
        }

        let mut finished = Vec::new();
        while let Some(res) = set.join_next().await {
            match res {
                Ok(done) => finished.push(done),
                Err(e) => {
                    error!(error = %e, "Domain task crashed");
                    summary.crashed += 1;
                }
            }
        }
        finished.sort_by_key(|(idx, _, _)| *idx);

        for (_, degraded, report) in finished {
            summary.scanned += 1;
            if degraded {
                summary.degraded += 1;
            }
            if report.updated {
                summary.updated += 1;
            } else {
                summary.update_failed += 1;
            }
            summary.domains.push(report);
        }

        info!(
            active = summary.fetched_active,
            scanned = summary.scanned,
            updated = summary.updated,
            update_failed = summary.update_failed,
            skipped = summary.skipped,
            "Cycle finished"
        );
        Ok(summary)
    }
}

async fn scan_and_record(
    registry: &RegistryClient,
    executor: &ScanExecutor,
    id: RecordId,
    domain: String,
) -> (bool, DomainReport) {
    let outcome = executor.scan(&domain).await;

    // Degraded outcomes are written too, so the registry shows the last attempt.
    let updated = match registry.update_result(&id, &outcome).await {
        Ok(()) => true,
        Err(e) => {
            error!(domain = %domain, error = %e, "Failed to update registry");
            false
        }
    };

    let report = DomainReport {
        record_id: id.to_string(),
        domain,
        scanned_at: outcome.scanned_at_rfc3339(),
        grade: outcome.grade.clone(),
        findings_summary: outcome.findings_summary.clone(),
        updated,
    };
    (outcome.is_degraded(), report)
}
