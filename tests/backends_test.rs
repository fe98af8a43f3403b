/// End-to-end checks against live backends.
///
/// Requires MongoDB on localhost:27017 and Kafka on localhost:9092:
/// `cargo test -- --ignored`
use mongodb::bson::doc;
use service_bootstrap::config::{Cli, Sources};
use service_bootstrap::document_store::{DocumentStoreConnector, Phase};
use service_bootstrap::error::StoreError;
use service_bootstrap::producer::ProducerInitializer;
use std::collections::HashMap;

fn sources_cli() -> Cli {
    Cli {
        mongo_db_addr: Some("mongodb://localhost:27017".to_string()),
        mongo_db_database: Some("testdb".to_string()),
        brokers_addr: Some("localhost:9092".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
#[ignore = "requires MongoDB on localhost:27017"]
async fn test_connected_lookup_is_found_or_not_found() {
    let cli = sources_cli();
    let env: HashMap<&str, &str> = HashMap::new();
    let connector = DocumentStoreConnector::open(&Sources::new(&cli, &env))
        .await
        .unwrap();
    assert_eq!(connector.phase(), Phase::Connected);

    match connector.find_one("users", doc! { "_id": 1 }).await {
        Ok(document) => assert_eq!(document.get_i32("_id").ok(), Some(1)),
        Err(StoreError::NotFound { collection }) => assert_eq!(collection, "users"),
        Err(e) => panic!("unexpected error: {}", e),
    }

    connector.close().await;
}

#[tokio::test]
#[ignore = "requires MongoDB on localhost:27017"]
async fn test_missing_document_is_not_found() {
    let cli = sources_cli();
    let env: HashMap<&str, &str> = HashMap::new();
    let connector = DocumentStoreConnector::open(&Sources::new(&cli, &env))
        .await
        .unwrap();

    let err = connector
        .find_one("users", doc! { "_id": "no-such-document" })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
    connector.close().await;
}

#[test]
#[ignore = "requires Kafka on localhost:9092"]
fn test_producer_sends_with_confirmation() {
    let cli = sources_cli();
    let env: HashMap<&str, &str> = HashMap::new();
    let mut producer = ProducerInitializer::new()
        .init(&Sources::new(&cli, &env))
        .unwrap();
    assert_eq!(producer.hosts(), ["localhost:9092".to_string()]);
    assert_eq!(producer.policy().max_retries, 5);

    let deliveries = producer
        .send("bootstrap-test", Some(&b"key"[..]), b"hello")
        .unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].topic, "bootstrap-test");

    producer.close();
}
