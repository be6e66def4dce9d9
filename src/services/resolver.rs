use crate::db::{Owner, Reservable, ReservationStore, StoreError};

/// Derive a slug from an external reference: lowercased, whitespace runs
/// replaced with single hyphens.
///
/// # Examples
///
/// ```
/// use reservation_sync_service::services::resolver::slugify;
///
/// assert_eq!(slugify("Room 101"), "room-101");
/// assert_eq!(slugify("  Lab  B  "), "lab-b");
/// assert_eq!(slugify("p-22"), "p-22");
/// ```
pub fn slugify(reference: &str) -> String {
    reference
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Look up a reservable by external reference: exact name match first, then
/// the slug derived from the reference. `None` is not an error; the caller
/// omits the link and moves on.
pub async fn resolve_reservable<S: ReservationStore>(
    store: &S,
    reference: &str,
) -> Result<Option<Reservable>, StoreError> {
    if let Some(reservable) = store.find_reservable_by_name(reference).await? {
        return Ok(Some(reservable));
    }
    store.find_reservable_by_slug(&slugify(reference)).await
}

/// Look up an owner by exact email match.
pub async fn resolve_owner<S: ReservationStore>(
    store: &S,
    email: &str,
) -> Result<Option<Owner>, StoreError> {
    store.find_owner_by_email(email).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_lowercases() {
        assert_eq!(slugify("ROOM-101"), "room-101");
    }

    #[test]
    fn test_slugify_replaces_whitespace() {
        assert_eq!(slugify("Big Lecture Hall"), "big-lecture-hall");
    }

    #[test]
    fn test_slugify_collapses_runs_and_trims() {
        assert_eq!(slugify("  Room \t 101 "), "room-101");
    }

    #[test]
    fn test_slugify_leaves_slugs_alone() {
        assert_eq!(slugify("room-101"), "room-101");
    }
}
