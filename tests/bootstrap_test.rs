use clap::Parser;
use mongodb::bson::doc;
use service_bootstrap::config::{
    Cli, ServiceConfig, Source, Sources, BROKERS_ADDR, DEBUG_ADDR, MONGO_DB_ADDR,
    MONGO_DB_DATABASE,
};
use service_bootstrap::document_store::{DocumentStoreConnector, Phase};
use service_bootstrap::error::{ConfigError, StoreError};
use service_bootstrap::logging::LogFormat;
use service_bootstrap::observability::ServiceManager;
use std::collections::HashMap;

fn parse(args: &[&str]) -> Cli {
    let mut argv = vec!["service_bootstrap"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

#[test]
fn test_three_tier_precedence() {
    let env = HashMap::from([
        ("MONGO_DB_ADDR", "mongodb://env:27017"),
        ("BROKER_SERVER_ADDR", "env-broker:9092"),
    ]);
    let cli = parse(&["--brokers.addr", "flag-broker:9092"]);
    let sources = Sources::new(&cli, &env);

    // Flag supplied: flag wins over env
    let brokers = sources.resolve(&BROKERS_ADDR);
    assert_eq!(brokers.value, "flag-broker:9092");
    assert_eq!(brokers.source, Source::CommandLine);

    // No flag: env wins over default
    let mongo = sources.resolve(&MONGO_DB_ADDR);
    assert_eq!(mongo.value, "mongodb://env:27017");
    assert_eq!(mongo.source, Source::Environment);

    // Neither: default
    let debug = sources.resolve(&DEBUG_ADDR);
    assert_eq!(debug.value, ":5060");
    assert_eq!(debug.source, Source::Default);
}

#[test]
fn test_backend_resolution_requires_both_fields() {
    let env: HashMap<&str, &str> = HashMap::new();

    let cli = parse(&["--mongo.db.addr", "", "--mongo.db.database", "x"]);
    let err = Sources::new(&cli, &env)
        .resolve_backend(&MONGO_DB_ADDR, &MONGO_DB_DATABASE)
        .unwrap_err();
    assert!(matches!(err, ConfigError::MissingField { flag: "mongo.db.addr", .. }));

    let cli = parse(&["--mongo.db.addr", "a", "--mongo.db.database", "b"]);
    let config = Sources::new(&cli, &env)
        .resolve_backend(&MONGO_DB_ADDR, &MONGO_DB_DATABASE)
        .unwrap();
    assert_eq!(config.address, "a");
    assert_eq!(config.resource_name, "b");
}

#[tokio::test]
async fn test_guarded_lookup_is_an_explicit_error() {
    let env: HashMap<&str, &str> = HashMap::new();
    let cli = parse(&["--mongo.db.database", "testdb"]);

    let mut connector = DocumentStoreConnector::new();
    let err = connector.find_one("users", doc! { "_id": 1 }).await.unwrap_err();
    assert!(matches!(err, StoreError::NotConnected));

    connector.init(&Sources::new(&cli, &env)).unwrap();
    assert_eq!(connector.phase(), Phase::Initialized);
    let err = connector.find_one("users", doc! { "_id": 1 }).await.unwrap_err();
    assert!(matches!(err, StoreError::NotConnected));
}

#[tokio::test]
async fn test_open_fails_fast_on_config_error() {
    let env: HashMap<&str, &str> = HashMap::new();
    let cli = Cli::default();
    let err = DocumentStoreConnector::open(&Sources::new(&cli, &env))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, StoreError::Config(_)));
}

#[tokio::test]
async fn test_observability_falls_back_without_collector() {
    let manager = ServiceManager::init(ServiceConfig::new("adder"), LogFormat::Compact)
        .await
        .unwrap();
    assert!(!manager.tracer().is_configured());

    let text = manager.metrics().render().unwrap();
    assert!(text.contains("example_adder_integers_summed"));
}

#[tokio::test]
async fn test_observability_fails_with_unreachable_collector() {
    let config = ServiceConfig::new("adder").with_collector_url("http://bad-host");
    let result = ServiceManager::init(config, LogFormat::Compact).await;
    assert!(matches!(result, Err(e) if e.is_tracer()));
}
