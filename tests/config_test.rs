// Config discovery and building services from configuration.

mod common;

use common::FakeRuntime;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use testservices::{Config, Error, Parser, ServiceFactory, VarSource};

const POSTGRES_LOG: &str = "PostgreSQL init process complete; ready for start up.\n\
                            database system is ready to accept connections\n";

fn parse(yaml: &str) -> Config {
    Parser::new().parse_config(yaml).unwrap()
}

#[test]
fn test_config_found_in_parent_directory() {
    let root = TempDir::new().unwrap();
    let nested = root.path().join("crates").join("api");
    fs::create_dir_all(&nested).unwrap();
    fs::write(root.path().join("testservices.yaml"), "needs: {}\n").unwrap();

    let found = Parser::find_config_in_dir(&nested).unwrap();
    assert_eq!(found, root.path().join("testservices.yaml"));
}

#[test]
fn test_yml_extension_is_accepted() {
    let root = TempDir::new().unwrap();
    fs::write(root.path().join("testservices.yml"), "needs: {}\n").unwrap();

    let found = Parser::find_config_in_dir(root.path()).unwrap();
    assert_eq!(found, root.path().join("testservices.yml"));
}

#[test]
fn test_load_config_reports_unreadable_file() {
    let root = TempDir::new().unwrap();
    let missing = root.path().join("testservices.yaml");
    assert!(matches!(
        Parser::new().load_config(&missing),
        Err(Error::Config(message)) if message.contains("Failed to read")
    ));
}

#[tokio::test]
async fn test_factory_falls_back_to_container() {
    let config = parse(
        r#"
needs:
  postgres:
    - env:
        name: ci-postgres
        preset: postgres
    - container:
        name: pg-test
        preset: postgres
"#,
    );
    let runtime = Arc::new(FakeRuntime::new().with_log(POSTGRES_LOG));
    let factory = ServiceFactory::new(runtime.clone(), VarSource::fixed(Vec::<(String, String)>::new()));

    let collection = factory.collection(&config).unwrap();
    let resolution = collection.resolve("postgres").await.unwrap();

    assert_eq!(resolution.need, "postgres");
    assert_eq!(resolution.service, "pg-test");
    assert_eq!(resolution.kind, "container");
    assert!(resolution.created);
    assert_eq!(resolution.handle.user(), Some("postgres"));
    assert_eq!(resolution.handle.database(), Some("postgresdb"));
    assert_eq!(
        Some(resolution.handle.port),
        runtime.host_port("pg-test", 5432)
    );

    collection.down().await.unwrap();
    assert_eq!(runtime.running_count(), 0);
}

#[tokio::test]
async fn test_factory_applies_credential_overrides() {
    let config = parse(
        r#"
needs:
  postgres:
    - container:
        name: pg-orders
        preset: postgres
        user: orders
        database: orders_test
        ports: ["5432"]
"#,
    );
    let runtime = Arc::new(FakeRuntime::new().with_log(POSTGRES_LOG));
    let factory = ServiceFactory::new(runtime.clone(), VarSource::default());

    let handle = factory.collection(&config).unwrap().get("postgres").await.unwrap();
    assert_eq!(handle.user(), Some("orders"));
    assert_eq!(handle.password(), Some("testservices"));
    assert_eq!(handle.database(), Some("orders_test"));
}

#[tokio::test]
async fn test_factory_prefers_configured_environment() {
    let config = parse(
        r#"
needs:
  cache:
    - env:
        name: ci-redis
        host: CACHE_HOST
        default_port: 6379
        scheme: redis
    - container:
        name: redis-test
        image: "redis:7"
        ready_port: 6379
"#,
    );
    let runtime = Arc::new(FakeRuntime::new());
    let factory = ServiceFactory::new(
        runtime.clone(),
        VarSource::fixed([("CACHE_HOST", "cache.internal")]),
    );

    let collection = factory.collection(&config).unwrap();
    let handle = collection.get("cache").await.unwrap();

    assert_eq!(handle.url().as_deref(), Some("redis://cache.internal:6379"));
    assert_eq!(runtime.starts(), 0);
}

#[test]
fn test_factory_rejects_invalid_config() {
    let config = parse(
        r#"
needs:
  postgres:
    - container:
        name: pg-test
        preset: postgres
    - container:
        name: pg-test
        image: "postgres:15"
        ready_port: 5432
"#,
    );
    let factory = ServiceFactory::new(Arc::new(FakeRuntime::new()), VarSource::default());

    match factory.collection(&config) {
        Err(Error::Validation(message)) => assert!(message.contains("pg-test"), "{}", message),
        other => panic!("expected Validation error, got {:?}", other.map(|c| c.len())),
    }
}

#[tokio::test]
async fn test_unknown_need_is_an_error() {
    let config = parse("needs: {}\n");
    let factory = ServiceFactory::new(Arc::new(FakeRuntime::new()), VarSource::default());
    let collection = factory.collection(&config).unwrap();

    assert!(collection.is_empty());
    assert!(matches!(
        collection.get("postgres").await,
        Err(Error::NeedNotFound(need)) if need == "postgres"
    ));
}
