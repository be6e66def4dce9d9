use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// A persisted reservation row.
///
/// `external_id` is NULL for manually created reservations, which never
/// participate in import matching; at most one row exists per non-null id.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StoredReservation {
    pub id: i64,
    pub external_id: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub reason: String,
}

/// A bookable entity (room, equipment). Pre-existing inventory; the importer
/// only ever looks these up, it never creates them.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Reservable {
    pub id: i64,
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Owner {
    pub id: i64,
    pub email: String,
}
