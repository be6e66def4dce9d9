use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{ApiVariant, ImportSource};
use crate::db::{ReservationStore, StoredReservation};
use crate::fetcher::TimetableFetcher;
use crate::services::resolver;
use crate::wtt3::normalizer::{
    extract_external_id, is_reservation_entry, normalize, CanonicalReservation,
};
use crate::wtt3::{dedup, planner};

/// Errors that abort an import run before any network call. Everything else
/// (failed day fetches, malformed records, unresolvable references, single
/// upsert failures) is recovered and recorded in the [`ImportReport`].
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("An API key is required for the day-feed API variant")]
    MissingApiKey,
}

/// One record that was dropped, with whatever identifier was recoverable.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRecord {
    pub external_id: Option<String>,
    pub reason: String,
}

/// One fetch unit that failed; the rest of the run proceeds without it.
#[derive(Debug, Clone, Serialize)]
pub struct FetchFailure {
    pub unit: String,
    pub error: String,
}

/// Structured outcome of one import run.
#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    pub created: usize,
    pub updated: usize,
    pub skipped: Vec<SkippedRecord>,
    pub fetch_failures: Vec<FetchFailure>,
}

/// Orchestrates one full import pass: plan days, fetch, deduplicate,
/// normalize, resolve references, upsert. The sole entry point callers use.
///
/// Every invocation is a complete, idempotent-by-identifier pass over the
/// requested range; no state is retained between runs.
pub struct ReservationImporter<S: ReservationStore> {
    fetcher: TimetableFetcher,
    store: S,
    fetch_concurrency: usize,
}

impl<S: ReservationStore> ReservationImporter<S> {
    pub fn new(source: &ImportSource, store: S) -> Self {
        Self {
            fetcher: TimetableFetcher::new(source),
            store,
            fetch_concurrency: source.fetch_concurrency,
        }
    }

    #[instrument(skip(self))]
    pub async fn import(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<ImportReport, ImportError> {
        // The day feed rejects unauthenticated calls outright; fail before
        // planning rather than once per day.
        if self.fetcher.variant() == ApiVariant::DayFeed && !self.fetcher.has_api_key() {
            return Err(ImportError::MissingApiKey);
        }

        let mut report = ImportReport::default();

        let raw_records = match self.fetcher.variant() {
            ApiVariant::Rest => self.fetch_ranged(start, end, &mut report).await,
            ApiVariant::DayFeed => self.fetch_days(start, end, &mut report).await,
        };

        let records = dedup::latest_by_external_id(raw_records);
        info!("Processing {} records after deduplication", records.len());

        for record in &records {
            if self.fetcher.variant() == ApiVariant::DayFeed {
                if let Some(id) = extract_external_id(record) {
                    if !is_reservation_entry(&id) {
                        debug!("Ignoring non-reservation entry {}", id);
                        continue;
                    }
                }
            }

            match normalize(record) {
                Ok(reservation) => self.apply(&reservation, &mut report).await,
                Err(skip) => {
                    warn!("Skipping record: {}", skip);
                    report.skipped.push(SkippedRecord {
                        external_id: skip.external_id().map(str::to_string),
                        reason: skip.to_string(),
                    });
                }
            }
        }

        info!(
            "Import complete: {} created, {} updated, {} skipped, {} failed fetch units",
            report.created,
            report.updated,
            report.skipped.len(),
            report.fetch_failures.len()
        );
        Ok(report)
    }

    /// Ranged REST variant: the whole window is one fetch unit.
    async fn fetch_ranged(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        report: &mut ImportReport,
    ) -> Vec<Value> {
        match self.fetcher.fetch_range(start, end).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Ranged fetch failed: {}", e);
                report.fetch_failures.push(FetchFailure {
                    unit: "range".to_string(),
                    error: e.to_string(),
                });
                Vec::new()
            }
        }
    }

    /// Day-feed variant: one fetch unit per planned day. Fetches run
    /// concurrently but `buffered` yields them in planned-day order, which
    /// keeps the deduplicator's last-wins tie-break deterministic. A failed
    /// day contributes nothing and never aborts the run.
    async fn fetch_days(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        report: &mut ImportReport,
    ) -> Vec<Value> {
        let days = planner::plan_days(
            start.map(|dt| dt.date_naive()),
            end.map(|dt| dt.date_naive()),
        );
        info!("Fetching {} day slices", days.len());

        let outcomes: Vec<_> = stream::iter(days.into_iter().map(|day| {
            let fetcher = self.fetcher.clone();
            async move { (day, fetcher.fetch_day(day).await) }
        }))
        .buffered(self.fetch_concurrency)
        .collect()
        .await;

        let mut records = Vec::new();
        for (day, outcome) in outcomes {
            match outcome {
                Ok(day_records) => {
                    debug!("Day {} returned {} records", day, day_records.len());
                    records.extend(day_records);
                }
                Err(e) => {
                    warn!("Fetch failed for day {}: {}", day, e);
                    report.fetch_failures.push(FetchFailure {
                        unit: day.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
        records
    }

    /// Upsert one reservation and attach its links. A persistence failure
    /// drops this record only.
    async fn apply(&self, reservation: &CanonicalReservation, report: &mut ImportReport) {
        match self.store.upsert_reservation(reservation).await {
            Ok((stored, created)) => {
                if created {
                    report.created += 1;
                } else {
                    report.updated += 1;
                }
                self.attach_links(&stored, reservation).await;
            }
            Err(e) => {
                error!(
                    external_id = %reservation.external_id,
                    "Failed to upsert reservation: {}", e
                );
                report.skipped.push(SkippedRecord {
                    external_id: Some(reservation.external_id.clone()),
                    reason: format!("persistence error: {e}"),
                });
            }
        }
    }

    /// Additively link resolved reservables and owners. Unresolvable
    /// references are omitted; the reservation itself stands either way.
    async fn attach_links(&self, stored: &StoredReservation, reservation: &CanonicalReservation) {
        for reference in &reservation.reservable_refs {
            match resolver::resolve_reservable(&self.store, reference).await {
                Ok(Some(reservable)) => {
                    if let Err(e) = self.store.link_reservable(stored.id, reservable.id).await {
                        error!("Failed to link reservable '{}': {}", reference, e);
                    }
                }
                Ok(None) => debug!("Reservable '{}' not found, skipping link", reference),
                Err(e) => error!("Lookup failed for reservable '{}': {}", reference, e),
            }
        }

        for email in &reservation.owner_refs {
            match resolver::resolve_owner(&self.store, email).await {
                Ok(Some(owner)) => {
                    if let Err(e) = self.store.link_owner(stored.id, owner.id).await {
                        error!("Failed to link owner '{}': {}", email, e);
                    }
                }
                Ok(None) => debug!("Owner '{}' not found, skipping link", email),
                Err(e) => error!("Lookup failed for owner '{}': {}", email, e),
            }
        }
    }
}
