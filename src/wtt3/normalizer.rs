use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde_json::Value;
use tracing::debug;

/// Longest reason text the store keeps; longer values are truncated, not rejected.
pub const MAX_REASON_LEN: usize = 255;

/// Reason used when every reason alias is absent or empty.
pub const DEFAULT_REASON: &str = "Imported from WTT3";

/// Identifier prefix marking reservation entries in the day feed, which mixes
/// several schedule-entry kinds in one list.
const RESERVATION_ID_PREFIX: char = 'R';

/// A reservation in canonical form, ready for the upsert engine.
///
/// Constructed per fetched record and discarded after the merge; the
/// `start < end` invariant is enforced at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalReservation {
    pub external_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub reason: String,
    /// External room names/slugs to link; may be empty.
    pub reservable_refs: Vec<String>,
    /// External owner emails to link; may be empty.
    pub owner_refs: Vec<String>,
}

impl CanonicalReservation {
    pub fn new(
        external_id: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        reason: String,
        reservable_refs: Vec<String>,
        owner_refs: Vec<String>,
    ) -> Result<Self, SkipReason> {
        if start >= end {
            return Err(SkipReason::StartNotBeforeEnd { external_id });
        }
        Ok(Self {
            external_id,
            start,
            end,
            reason: truncate_reason(&reason),
            reservable_refs,
            owner_refs,
        })
    }
}

/// Why a wire record was dropped instead of normalized.
///
/// None of these abort a batch; the importer logs them and carries the
/// reason (with whatever identifier was recoverable) in its run report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("record has no external id")]
    MissingExternalId,

    #[error("reservation {external_id}: missing start/end times")]
    MissingTimes { external_id: String },

    #[error("reservation {external_id}: invalid date/time format")]
    InvalidDateTime { external_id: String },

    #[error("reservation {external_id}: start is not before end")]
    StartNotBeforeEnd { external_id: String },
}

impl SkipReason {
    pub fn external_id(&self) -> Option<&str> {
        match self {
            SkipReason::MissingExternalId => None,
            SkipReason::MissingTimes { external_id }
            | SkipReason::InvalidDateTime { external_id }
            | SkipReason::StartNotBeforeEnd { external_id } => Some(external_id),
        }
    }
}

/// The two wire conventions WTT3 has shipped, tried in this order.
enum WireShape {
    /// Combined ISO-8601 date-times under `start`/`start_time`/`start_datetime`.
    IsoDateTimes,
    /// Separate `date` (dd.mm.yyyy) and `timeFrom`/`timeTo` (HH:MM) fields,
    /// interpreted as local wall-clock time.
    DayFragments,
}

const START_KEYS: [&str; 3] = ["start", "start_time", "start_datetime"];
const END_KEYS: [&str; 3] = ["end", "end_time", "end_datetime"];
const ISO_REASON_KEYS: [&str; 3] = ["reason", "description", "title"];
const FRAGMENT_REASON_KEYS: [&str; 3] = ["note", "courseName", "course_name"];
const RESERVABLE_KEYS: [&str; 2] = ["reservables", "rooms"];
const OWNER_KEYS: [&str; 2] = ["owners", "user_emails"];

/// Extract the upstream identifier from a raw record, coercing numeric ids
/// to strings. Also used as the deduplication key before normalization.
pub fn extract_external_id(record: &Value) -> Option<String> {
    ["id", "reservation_id"]
        .iter()
        .find_map(|key| record.get(key).and_then(value_to_id))
}

/// Whether a day-feed identifier names a reservation entry (as opposed to
/// the other schedule-entry kinds sharing the feed).
pub fn is_reservation_entry(external_id: &str) -> bool {
    external_id.starts_with(RESERVATION_ID_PREFIX)
}

/// Convert one wire record into canonical form, or say why it cannot be.
pub fn normalize(record: &Value) -> Result<CanonicalReservation, SkipReason> {
    let external_id = extract_external_id(record).ok_or(SkipReason::MissingExternalId)?;

    let reservable_refs = string_list(record, &RESERVABLE_KEYS);
    let owner_refs = string_list(record, &OWNER_KEYS);

    let (start, end, reason) = match classify(record) {
        Some(WireShape::IsoDateTimes) => {
            let start_str = first_string(record, &START_KEYS);
            let end_str = first_string(record, &END_KEYS);
            let (start_str, end_str) = match (start_str, end_str) {
                (Some(s), Some(e)) => (s, e),
                _ => return Err(SkipReason::MissingTimes { external_id }),
            };
            let start = parse_iso_datetime(&start_str);
            let end = parse_iso_datetime(&end_str);
            let (start, end) = match (start, end) {
                (Some(s), Some(e)) => (s, e),
                _ => return Err(SkipReason::InvalidDateTime { external_id }),
            };
            let reason =
                first_string(record, &ISO_REASON_KEYS).unwrap_or_else(|| DEFAULT_REASON.to_string());
            (start, end, reason)
        }
        Some(WireShape::DayFragments) => {
            let date_str = first_string(record, &["date"]);
            let from_str = first_string(record, &["timeFrom", "time_from"]);
            let to_str = first_string(record, &["timeTo", "time_to"]);
            let (date_str, from_str, to_str) = match (date_str, from_str, to_str) {
                (Some(d), Some(f), Some(t)) => (d, f, t),
                _ => return Err(SkipReason::MissingTimes { external_id }),
            };
            let start = parse_day_fragment(&date_str, &from_str);
            let end = parse_day_fragment(&date_str, &to_str);
            let (start, end) = match (start, end) {
                (Some(s), Some(e)) => (s, e),
                _ => return Err(SkipReason::InvalidDateTime { external_id }),
            };
            let reason = first_string(record, &FRAGMENT_REASON_KEYS)
                .unwrap_or_else(|| DEFAULT_REASON.to_string());
            (start, end, reason)
        }
        None => return Err(SkipReason::MissingTimes { external_id }),
    };

    CanonicalReservation::new(external_id, start, end, reason, reservable_refs, owner_refs)
}

fn classify(record: &Value) -> Option<WireShape> {
    if START_KEYS.iter().any(|k| record.get(k).is_some())
        || END_KEYS.iter().any(|k| record.get(k).is_some())
    {
        return Some(WireShape::IsoDateTimes);
    }
    if record.get("date").is_some() {
        return Some(WireShape::DayFragments);
    }
    None
}

fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First non-empty string value under any of the aliased keys.
fn first_string(record: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        record
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// String entries of the first list found under any of the aliased keys.
/// Absent keys and non-string entries yield nothing, never an error.
fn string_list(record: &Value, keys: &[&str]) -> Vec<String> {
    for key in keys {
        if let Some(Value::Array(items)) = record.get(*key) {
            return items
                .iter()
                .filter_map(|item| {
                    let s = item.as_str();
                    if s.is_none() {
                        debug!("Ignoring non-string entry under '{}': {}", key, item);
                    }
                    s
                })
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
    }
    Vec::new()
}

fn truncate_reason(reason: &str) -> String {
    reason.chars().take(MAX_REASON_LEN).collect()
}

/// Parse an ISO-8601 combined date-time. A trailing `Z` or explicit offset
/// fixes the zone; a naive value is taken as UTC.
fn parse_iso_datetime(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Combine a `dd.mm.yyyy` date and an `HH:MM` time-of-day into a timestamp,
/// interpreted in the host's local zone (the day feed carries wall-clock
/// times with no offset).
fn parse_day_fragment(date: &str, time: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date, "%d.%m.%Y").ok()?;
    let time = NaiveTime::parse_from_str(time, "%H:%M").ok()?;
    Local
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}
