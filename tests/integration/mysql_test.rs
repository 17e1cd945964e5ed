//! MySQL driver integration tests.
//!
//! Tests connectivity, value conversion and error formatting against a live
//! server.

use mysql_probe::config::{MysqlOptions, ServerConfig};
use mysql_probe::db::{ConnectParams, DatabaseClient, Driver, MySqlDriver, Value};
use mysql_probe::ProbeError;

use super::get_test_url;

/// Helper to build connect params from the test URL.
fn get_test_params() -> Option<ConnectParams> {
    let server = ServerConfig::from_url(&get_test_url()?).ok()?;
    let options = MysqlOptions::resolve(server.options.mysql.as_ref());
    Some(ConnectParams {
        host: server.address,
        port: options.port,
        username: options.user,
        password: options.password,
    })
}

/// Helper to create a test client.
async fn get_test_client() -> Option<Box<dyn DatabaseClient>> {
    let params = get_test_params()?;
    MySqlDriver::new().connect(&params).await.ok()
}

#[tokio::test]
async fn test_connect_and_close() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: MYSQL_TEST_URL not set");
        return;
    };

    client.close().await.unwrap();

    // Closed clients refuse further queries
    let err = client.execute_query("SELECT 1").await.unwrap_err();
    assert!(matches!(err, ProbeError::Connection(_)));
}

#[tokio::test]
async fn test_value_conversion() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: MYSQL_TEST_URL not set");
        return;
    };

    let result = client
        .execute_query(
            "SELECT 42 AS n, CAST(18446744073709551615 AS UNSIGNED) AS big, \
             1.5e0 AS f, 'text' AS s, NULL AS nothing",
        )
        .await
        .unwrap();

    let row = &result.rows[0];
    assert_eq!(row[0], Value::Int(42));
    assert_eq!(row[1], Value::String("18446744073709551615".to_string()));
    assert_eq!(row[2], Value::Float(1.5));
    assert_eq!(row[3], Value::String("text".to_string()));
    assert_eq!(row[4], Value::Null);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_query_error_format() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: MYSQL_TEST_URL not set");
        return;
    };

    let err = client
        .execute_query("SELECT * FROM nonexistent_table_xyz")
        .await
        .unwrap_err();

    let message = err.to_string();
    assert!(matches!(err, ProbeError::Query(_)));
    assert!(message.contains("ERROR 1"), "unexpected message: {message}");
    assert!(message.contains("nonexistent_table_xyz"));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_multi_statement_returns_first_result_set() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: MYSQL_TEST_URL not set");
        return;
    };

    let result = client
        .execute_query("SELECT 1 AS one; SELECT 'a' AS a, 'b' AS b")
        .await
        .unwrap();

    let names: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["one"]);
    assert_eq!(result.rows, vec![vec![Value::Int(1)]]);
    assert_eq!(result.row_count, 1);

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_empty_result_keeps_columns() {
    let Some(client) = get_test_client().await else {
        eprintln!("Skipping test: MYSQL_TEST_URL not set");
        return;
    };

    let result = client
        .execute_query("SELECT 1 AS one, 'x' AS label FROM DUAL WHERE 1 = 0")
        .await
        .unwrap();

    let names: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["one", "label"]);
    assert!(result.is_empty());

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_wrong_password_is_connection_error() {
    let Some(mut params) = get_test_params() else {
        eprintln!("Skipping test: MYSQL_TEST_URL not set");
        return;
    };
    params.password = "definitely-not-the-password".to_string();

    let result = MySqlDriver::new().connect(&params).await;
    let Err(err) = result else {
        panic!("expected authentication to fail");
    };
    assert!(matches!(err, ProbeError::Connection(_)));
}
