// End-to-end importer tests: mock HTTP feeds on one side, an in-memory
// store on the other, assertions on the structured run report.

mod common;

use chrono::{TimeZone, Utc};
use common::MemoryStore;
use mockito::{Matcher, Server};
use serde_json::json;

use reservation_sync_service::config::{ApiVariant, ImportSource};
use reservation_sync_service::services::{ImportError, ReservationImporter};

fn rest_source(base_url: String) -> ImportSource {
    ImportSource::new(base_url, Some("test-key".to_string()), ApiVariant::Rest)
}

fn day_feed_source(base_url: String) -> ImportSource {
    ImportSource::new(base_url, Some("test-key".to_string()), ApiVariant::DayFeed)
}

#[tokio::test]
async fn test_new_reservation_is_created() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/reservations")
        .with_status(200)
        .with_body(
            json!([{
                "id": "12345",
                "start": "2025-01-10T10:00:00Z",
                "end": "2025-01-10T12:00:00Z",
                "reason": "Test"
            }])
            .to_string(),
        )
        .create_async()
        .await;

    let store = MemoryStore::new();
    let importer = ReservationImporter::new(&rest_source(server.url()), store.clone());
    let report = importer.import(None, None).await.unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.updated, 0);
    assert!(report.skipped.is_empty());

    let stored = store.get_by_external_id("12345").expect("reservation stored");
    assert_eq!(stored.reason, "Test");
    assert_eq!(stored.start, Utc.with_ymd_and_hms(2025, 1, 10, 10, 0, 0).unwrap());
    assert_eq!(stored.end, Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap());
}

#[tokio::test]
async fn test_existing_reservation_is_updated() {
    let store = MemoryStore::new();

    let mut first = Server::new_async().await;
    first
        .mock("GET", "/reservations")
        .with_status(200)
        .with_body(
            json!([{
                "id": "12345",
                "start": "2025-01-10T10:00:00Z",
                "end": "2025-01-10T12:00:00Z",
                "reason": "Old"
            }])
            .to_string(),
        )
        .create_async()
        .await;
    let report = ReservationImporter::new(&rest_source(first.url()), store.clone())
        .import(None, None)
        .await
        .unwrap();
    assert_eq!((report.created, report.updated), (1, 0));

    let mut second = Server::new_async().await;
    second
        .mock("GET", "/reservations")
        .with_status(200)
        .with_body(
            json!([{
                "id": "12345",
                "start": "2025-01-10T10:00:00Z",
                "end": "2025-01-10T12:00:00Z",
                "reason": "Updated"
            }])
            .to_string(),
        )
        .create_async()
        .await;
    let report = ReservationImporter::new(&rest_source(second.url()), store.clone())
        .import(None, None)
        .await
        .unwrap();

    assert_eq!((report.created, report.updated), (0, 1));
    assert_eq!(store.reservation_count(), 1);
    assert_eq!(store.get_by_external_id("12345").unwrap().reason, "Updated");
}

#[tokio::test]
async fn test_reimport_is_idempotent() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/reservations")
        .with_status(200)
        .with_body(
            json!([
                {"id": "a", "start": "2025-01-10T08:00:00Z", "end": "2025-01-10T09:00:00Z", "reason": "A"},
                {"id": "b", "start": "2025-01-10T10:00:00Z", "end": "2025-01-10T11:00:00Z", "reason": "B"}
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let store = MemoryStore::new();
    let importer = ReservationImporter::new(&rest_source(server.url()), store.clone());

    let first = importer.import(None, None).await.unwrap();
    assert_eq!((first.created, first.updated), (2, 0));
    let after_first = store.get_by_external_id("a").unwrap();

    let second = importer.import(None, None).await.unwrap();
    assert_eq!((second.created, second.updated), (0, 2));
    let after_second = store.get_by_external_id("a").unwrap();

    assert_eq!(store.reservation_count(), 2);
    assert_eq!(after_first.reason, after_second.reason);
    assert_eq!(after_first.start, after_second.start);
    assert_eq!(after_first.end, after_second.end);
}

#[tokio::test]
async fn test_record_without_times_is_skipped() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/reservations")
        .with_status(200)
        .with_body(json!([{"id": "12345", "reason": "no times"}]).to_string())
        .create_async()
        .await;

    let store = MemoryStore::new();
    let importer = ReservationImporter::new(&rest_source(server.url()), store.clone());
    let report = importer.import(None, None).await.unwrap();

    assert_eq!((report.created, report.updated), (0, 0));
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].external_id.as_deref(), Some("12345"));
    assert!(store.get_by_external_id("12345").is_none());
}

#[tokio::test]
async fn test_malformed_record_does_not_abort_batch() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/reservations")
        .with_status(200)
        .with_body(
            json!([
                {"id": "bad", "start": "garbage", "end": "2025-01-10T12:00:00Z"},
                {"id": "good", "start": "2025-01-10T10:00:00Z", "end": "2025-01-10T12:00:00Z"}
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let store = MemoryStore::new();
    let importer = ReservationImporter::new(&rest_source(server.url()), store.clone());
    let report = importer.import(None, None).await.unwrap();

    assert_eq!((report.created, report.updated), (1, 0));
    assert_eq!(report.skipped.len(), 1);
    assert!(store.get_by_external_id("good").is_some());
}

#[tokio::test]
async fn test_day_feed_filters_non_reservation_entries() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/scheduleDateDetail")
        .match_query(Matcher::UrlEncoded("date".into(), "10_01_2025".into()))
        .with_status(200)
        .with_body(
            json!([
                {"id": "S9", "date": "10.01.2025", "timeFrom": "08:00", "timeTo": "09:00", "courseName": "Lecture"},
                {"id": "R5", "date": "10.01.2025", "timeFrom": "10:00", "timeTo": "12:00", "note": "Lab booking"}
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let store = MemoryStore::new();
    let importer = ReservationImporter::new(&day_feed_source(server.url()), store.clone());
    let day = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
    let report = importer.import(Some(day), Some(day)).await.unwrap();

    assert_eq!((report.created, report.updated), (1, 0));
    assert!(store.get_by_external_id("R5").is_some());
    assert!(store.get_by_external_id("S9").is_none());
}

#[tokio::test]
async fn test_day_feed_last_day_wins_for_duplicates() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/scheduleDateDetail")
        .match_query(Matcher::UrlEncoded("date".into(), "10_01_2025".into()))
        .with_status(200)
        .with_body(
            json!([{"id": "R1", "date": "10.01.2025", "timeFrom": "10:00", "timeTo": "12:00", "note": "first"}])
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/scheduleDateDetail")
        .match_query(Matcher::UrlEncoded("date".into(), "11_01_2025".into()))
        .with_status(200)
        .with_body(
            json!([{"id": "R1", "date": "10.01.2025", "timeFrom": "10:00", "timeTo": "12:00", "note": "second"}])
            .to_string(),
        )
        .create_async()
        .await;

    let store = MemoryStore::new();
    let importer = ReservationImporter::new(&day_feed_source(server.url()), store.clone());
    let start = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2025, 1, 11, 0, 0, 0).unwrap();
    let report = importer.import(Some(start), Some(end)).await.unwrap();

    assert_eq!((report.created, report.updated), (1, 0));
    assert_eq!(store.get_by_external_id("R1").unwrap().reason, "second");
}

#[tokio::test]
async fn test_failed_day_does_not_abort_run() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/scheduleDateDetail")
        .match_query(Matcher::UrlEncoded("date".into(), "10_01_2025".into()))
        .with_status(500)
        .create_async()
        .await;
    server
        .mock("GET", "/scheduleDateDetail")
        .match_query(Matcher::UrlEncoded("date".into(), "11_01_2025".into()))
        .with_status(200)
        .with_body(
            json!([{"id": "R7", "date": "11.01.2025", "timeFrom": "09:00", "timeTo": "10:00"}])
            .to_string(),
        )
        .create_async()
        .await;

    let store = MemoryStore::new();
    let importer = ReservationImporter::new(&day_feed_source(server.url()), store.clone());
    let start = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2025, 1, 11, 0, 0, 0).unwrap();
    let report = importer.import(Some(start), Some(end)).await.unwrap();

    assert_eq!((report.created, report.updated), (1, 0));
    assert_eq!(report.fetch_failures.len(), 1);
    assert_eq!(report.fetch_failures[0].unit, "2025-01-10");
    assert!(store.get_by_external_id("R7").is_some());
}

#[tokio::test]
async fn test_inverted_range_fetches_nothing() {
    // No mocks registered: any request would surface as a fetch failure.
    let server = Server::new_async().await;

    let store = MemoryStore::new();
    let importer = ReservationImporter::new(&day_feed_source(server.url()), store.clone());
    let start = Utc.with_ymd_and_hms(2025, 1, 11, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
    let report = importer.import(Some(start), Some(end)).await.unwrap();

    assert_eq!((report.created, report.updated), (0, 0));
    assert!(report.fetch_failures.is_empty());
}

#[tokio::test]
async fn test_day_feed_requires_api_key() {
    let server = Server::new_async().await;
    let source = ImportSource::new(server.url(), None, ApiVariant::DayFeed);
    let importer = ReservationImporter::new(&source, MemoryStore::new());

    assert!(matches!(
        importer.import(None, None).await,
        Err(ImportError::MissingApiKey)
    ));
}

#[tokio::test]
async fn test_unknown_reservable_is_non_fatal() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/reservations")
        .with_status(200)
        .with_body(
            json!([{
                "id": "12345",
                "start": "2025-01-10T10:00:00Z",
                "end": "2025-01-10T12:00:00Z",
                "reservables": ["missing-room"]
            }])
            .to_string(),
        )
        .create_async()
        .await;

    let store = MemoryStore::new();
    let importer = ReservationImporter::new(&rest_source(server.url()), store.clone());
    let report = importer.import(None, None).await.unwrap();

    assert_eq!((report.created, report.updated), (1, 0));
    let stored = store.get_by_external_id("12345").unwrap();
    assert!(store.linked_reservables(stored.id).is_empty());
}

#[tokio::test]
async fn test_known_references_are_linked() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/reservations")
        .with_status(200)
        .with_body(
            json!([{
                "id": "12345",
                "start": "2025-01-10T10:00:00Z",
                "end": "2025-01-10T12:00:00Z",
                "reservables": ["Room 101", "missing-room"],
                "owners": ["user1@example.com", "ghost@example.com"]
            }])
            .to_string(),
        )
        .create_async()
        .await;

    let store = MemoryStore::new();
    // "Room 101" resolves via the derived slug, not the exact name.
    let reservable_id = store.add_reservable("room-101", "Lecture room 101");
    let owner_id = store.add_owner("user1@example.com");

    let importer = ReservationImporter::new(&rest_source(server.url()), store.clone());
    let report = importer.import(None, None).await.unwrap();

    assert_eq!((report.created, report.updated), (1, 0));
    let stored = store.get_by_external_id("12345").unwrap();
    assert_eq!(store.linked_reservables(stored.id), vec![reservable_id]);
    assert_eq!(store.linked_owners(stored.id), vec![owner_id]);

    // Second run re-attaches idempotently.
    let report = importer.import(None, None).await.unwrap();
    assert_eq!((report.created, report.updated), (0, 1));
    assert_eq!(store.linked_reservables(stored.id), vec![reservable_id]);
}

#[tokio::test]
async fn test_ranged_fetch_failure_yields_empty_run() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/reservations")
        .with_status(502)
        .create_async()
        .await;

    let store = MemoryStore::new();
    let importer = ReservationImporter::new(&rest_source(server.url()), store.clone());
    let report = importer.import(None, None).await.unwrap();

    assert_eq!((report.created, report.updated), (0, 0));
    assert_eq!(report.fetch_failures.len(), 1);
    assert_eq!(report.fetch_failures[0].unit, "range");
}
