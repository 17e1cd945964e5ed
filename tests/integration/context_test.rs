//! Query context integration tests.
//!
//! Drives the context through the public API with the test doubles, then
//! against a live server reached directly and through the relay.

use std::sync::Arc;

use mysql_probe::config::{GatewayMode, MysqlOverrides, ServerConfig};
use mysql_probe::db::{ConnectParams, MySqlDriver, QueryResult, RecordingDriver, Value};
use mysql_probe::gateway::{ConfiguredServer, StaticServer};
use mysql_probe::{MysqlQuery, MysqlQueryContext, ProbeError};

use super::get_test_url;

#[tokio::test]
async fn test_stubbed_gateway_and_driver() {
    let server = StaticServer::new("127.0.0.1", 13306);
    let driver = RecordingDriver::new();

    let context = MysqlQueryContext::new(
        Arc::new(server.clone()),
        MysqlQuery::new("SELECT 1"),
        Arc::new(driver.clone()),
    );
    context.results().await.unwrap();

    assert_eq!(
        driver.connects(),
        vec![ConnectParams {
            host: "127.0.0.1".to_string(),
            port: 13306,
            username: "root".to_string(),
            password: String::new(),
        }]
    );
    assert_eq!(driver.queries(), vec!["SELECT 1".to_string()]);
    assert_eq!(server.released(), 1);
}

#[tokio::test]
async fn test_concurrent_contexts_are_independent() {
    let server = Arc::new(StaticServer::new("127.0.0.1", 13306));
    let driver = RecordingDriver::new();

    let first = MysqlQueryContext::new(
        server.clone(),
        MysqlQuery::new("SELECT 1"),
        Arc::new(driver.clone()),
    );
    let second = MysqlQueryContext::new(
        server.clone(),
        MysqlQuery::new("SELECT 2"),
        Arc::new(driver.clone()),
    );

    let (a, b) = tokio::join!(first.results(), second.results());
    assert!(a.is_ok() && b.is_ok());

    let mut queries = driver.queries();
    queries.sort();
    assert_eq!(queries, vec!["SELECT 1".to_string(), "SELECT 2".to_string()]);
    assert_eq!(driver.connects().len(), 2);
    assert_eq!(server.released(), 2);
}

#[tokio::test]
async fn test_refused_connection_through_relay() {
    let closed = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = closed.local_addr().unwrap().port();
    drop(closed);

    let config = ServerConfig::new("127.0.0.1")
        .with_gateway(GatewayMode::Relay)
        .with_mysql(MysqlOverrides {
            port: Some(port),
            ..Default::default()
        });

    let context = MysqlQueryContext::new(
        Arc::new(ConfiguredServer::new("db", config)),
        MysqlQuery::new("SELECT 1"),
        Arc::new(MySqlDriver::new()),
    );

    let result = context.results().await;
    assert!(matches!(result, Err(ProbeError::Connection(_))));
}

async fn run_live(gateway: GatewayMode, sql: &str) -> Option<QueryResult> {
    let url = get_test_url()?;
    let config = ServerConfig::from_url(&url).ok()?.with_gateway(gateway);

    let context = MysqlQueryContext::new(
        Arc::new(ConfiguredServer::new("live", config)),
        MysqlQuery::new(sql),
        Arc::new(MySqlDriver::new()),
    );
    Some(context.results().await.unwrap())
}

#[tokio::test]
async fn test_live_query_direct() {
    let Some(result) = run_live(GatewayMode::Direct, "SELECT 1 AS one").await else {
        eprintln!("Skipping test: MYSQL_TEST_URL not set");
        return;
    };

    assert_eq!(result.columns[0].name, "one");
    assert_eq!(result.scalar(), Some(&Value::Int(1)));
}

#[tokio::test]
async fn test_live_query_through_relay() {
    let Some(result) = run_live(GatewayMode::Relay, "SELECT 'relayed' AS via").await else {
        eprintln!("Skipping test: MYSQL_TEST_URL not set");
        return;
    };

    assert_eq!(result.row_count, 1);
    assert_eq!(result.scalar(), Some(&Value::from("relayed")));
}
