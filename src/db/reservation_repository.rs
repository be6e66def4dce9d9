use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use crate::db::error::StoreError;
use crate::db::models::{Owner, Reservable, StoredReservation};
use crate::db::store::ReservationStore;
use crate::wtt3::normalizer::CanonicalReservation;

/// Postgres-backed reservation store.
///
/// Queries are runtime-checked (`sqlx::query`) so the crate builds without a
/// live database; the schema lives in `migrations/`.
#[derive(Clone)]
pub struct ReservationRepository {
    pool: PgPool,
}

impl ReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ReservationStore for ReservationRepository {
    #[instrument(skip(self, reservation), fields(external_id = %reservation.external_id))]
    async fn upsert_reservation(
        &self,
        reservation: &CanonicalReservation,
    ) -> Result<(StoredReservation, bool), StoreError> {
        // xmax = 0 distinguishes a fresh insert from a conflict update.
        let row = sqlx::query(
            r#"
            INSERT INTO reservations (external_id, start_ts, end_ts, reason, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (external_id) DO UPDATE SET
                start_ts = EXCLUDED.start_ts,
                end_ts = EXCLUDED.end_ts,
                reason = EXCLUDED.reason,
                updated_at = NOW()
            RETURNING id, external_id, start_ts, end_ts, reason, (xmax = 0) AS inserted
            "#,
        )
        .bind(&reservation.external_id)
        .bind(reservation.start)
        .bind(reservation.end)
        .bind(&reservation.reason)
        .fetch_one(&self.pool)
        .await?;

        let stored = StoredReservation {
            id: row.try_get("id")?,
            external_id: row.try_get("external_id")?,
            start: row.try_get("start_ts")?,
            end: row.try_get("end_ts")?,
            reason: row.try_get("reason")?,
        };
        let created: bool = row.try_get("inserted")?;

        debug!(
            "{} reservation {}",
            if created { "Created" } else { "Updated" },
            stored.id
        );
        Ok((stored, created))
    }

    #[instrument(skip(self))]
    async fn find_reservable_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Reservable>, StoreError> {
        let reservable = sqlx::query_as::<_, Reservable>(
            "SELECT id, slug, name FROM reservables WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reservable)
    }

    #[instrument(skip(self))]
    async fn find_reservable_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Reservable>, StoreError> {
        let reservable = sqlx::query_as::<_, Reservable>(
            "SELECT id, slug, name FROM reservables WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reservable)
    }

    #[instrument(skip(self))]
    async fn find_owner_by_email(&self, email: &str) -> Result<Option<Owner>, StoreError> {
        let owner =
            sqlx::query_as::<_, Owner>("SELECT id, email FROM owners WHERE email = $1")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;

        Ok(owner)
    }

    #[instrument(skip(self))]
    async fn link_reservable(
        &self,
        reservation_id: i64,
        reservable_id: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO reservation_reservables (reservation_id, reservable_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(reservation_id)
        .bind(reservable_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn link_owner(&self, reservation_id: i64, owner_id: i64) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO reservation_owners (reservation_id, owner_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(reservation_id)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
