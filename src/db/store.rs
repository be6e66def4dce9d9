use crate::db::error::StoreError;
use crate::db::models::{Owner, Reservable, StoredReservation};
use crate::wtt3::normalizer::CanonicalReservation;

/// The persistence surface the import engine needs.
///
/// The Postgres repository is the production implementation; tests use an
/// in-memory one. Link attachment is additive and idempotent so a retried
/// run converges on the same stored state.
#[allow(async_fn_in_trait)]
pub trait ReservationStore {
    /// Create-or-update keyed solely on `external_id`; core fields are
    /// overwritten wholesale on update. Returns the stored row and whether
    /// it was newly created.
    async fn upsert_reservation(
        &self,
        reservation: &CanonicalReservation,
    ) -> Result<(StoredReservation, bool), StoreError>;

    async fn find_reservable_by_name(&self, name: &str)
        -> Result<Option<Reservable>, StoreError>;

    async fn find_reservable_by_slug(&self, slug: &str)
        -> Result<Option<Reservable>, StoreError>;

    async fn find_owner_by_email(&self, email: &str) -> Result<Option<Owner>, StoreError>;

    async fn link_reservable(
        &self,
        reservation_id: i64,
        reservable_id: i64,
    ) -> Result<(), StoreError>;

    async fn link_owner(&self, reservation_id: i64, owner_id: i64) -> Result<(), StoreError>;
}
