//! Query gate integration tests against a real MySQL server.
//!
//! These create the `practica_joins` example database if it is missing.

use glance_runner::config::{ConnectionConfig, QueryConfig};
use glance_runner::db::{Connector, MySqlConnector};
use glance_runner::gate::{GateErrorKind, GateOutcome, QueryGate, RenderValue};
use glance_runner::seed::{Seeder, EXAMPLE_DATABASE};
use std::sync::Arc;

/// Helper to build a gate on a seeded server.
async fn get_test_gate() -> Option<QueryGate> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let config = ConnectionConfig::from_connection_string(&url).ok()?;
    let connector: Arc<dyn Connector> = Arc::new(MySqlConnector::new(config));

    Seeder::new(Arc::clone(&connector))
        .ensure_example_database()
        .await
        .ok()?;

    Some(QueryGate::new(connector, &QueryConfig::default()))
}

#[tokio::test]
async fn test_select_from_example_database() {
    let Some(gate) = get_test_gate().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let execution = gate
        .run(EXAMPLE_DATABASE, "SELECT * FROM productos")
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(
        execution.result.columns,
        vec!["id", "nombre", "precio", "categoria_id"]
    );
    assert_eq!(execution.result.row_count, 5);
    assert_eq!(
        execution.result.rows[0].get("precio"),
        Some(&RenderValue::Text("1200.00".to_string()))
    );
}

#[tokio::test]
async fn test_join_with_duplicate_column_names() {
    let Some(gate) = get_test_gate().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let execution = gate
        .run(
            EXAMPLE_DATABASE,
            "SELECT p.nombre, c.nombre FROM productos p JOIN categorias c ON p.categoria_id = c.id",
        )
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(execution.result.columns, vec!["nombre", "nombre"]);
    assert_eq!(execution.result.rows[0].len(), 1);
}

#[tokio::test]
async fn test_value_shapes() {
    let Some(gate) = get_test_gate().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let execution = gate
        .run(
            EXAMPLE_DATABASE,
            "SELECT CAST('abc' AS BINARY) AS b, NULL AS n, '' AS e, 7 AS i FROM DUAL",
        )
        .await
        .unwrap()
        .into_result()
        .unwrap();

    let row = &execution.result.rows[0];
    assert_eq!(row.get("b"), Some(&RenderValue::Blob));
    assert_eq!(row.get("n"), Some(&RenderValue::Null));
    assert_eq!(row.get("e"), Some(&RenderValue::Text(String::new())));
    assert_eq!(row.get("i"), Some(&RenderValue::Int(7)));
}

#[tokio::test]
async fn test_empty_result_keeps_column_names() {
    let Some(gate) = get_test_gate().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let execution = gate
        .run(EXAMPLE_DATABASE, "SELECT id, nombre FROM productos WHERE id < 0")
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert!(execution.result.is_empty());
    assert_eq!(execution.result.columns, vec!["id", "nombre"]);
}

#[tokio::test]
async fn test_engine_error_is_reported_verbatim() {
    let Some(gate) = get_test_gate().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let outcome = gate
        .run(EXAMPLE_DATABASE, "SELECT * FROM no_such_table")
        .await
        .unwrap();

    assert!(matches!(outcome, GateOutcome::Failed(_)));
    assert!(outcome
        .error()
        .unwrap()
        .message()
        .contains("no_such_table"));
}

#[tokio::test]
async fn test_system_catalog_is_rejected() {
    let Some(gate) = get_test_gate().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let outcome = gate
        .run("information_schema", "SELECT * FROM TABLES")
        .await
        .unwrap();

    assert_eq!(
        outcome.error().unwrap().kind(),
        GateErrorKind::InvalidDatabase
    );
}

#[tokio::test]
async fn test_stacked_delete_is_not_executed() {
    let Some(gate) = get_test_gate().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let outcome = gate
        .run(EXAMPLE_DATABASE, "SELECT 1; DELETE FROM productos")
        .await
        .unwrap();
    assert!(matches!(outcome, GateOutcome::Failed(_)));

    let outcome = gate
        .run(EXAMPLE_DATABASE, "SELECT 1 LIMIT 1; DROP TABLE productos")
        .await
        .unwrap();
    assert!(matches!(outcome, GateOutcome::Failed(_)));

    let execution = gate
        .run(EXAMPLE_DATABASE, "SELECT COUNT(*) AS n FROM productos")
        .await
        .unwrap()
        .into_result()
        .unwrap();
    assert_eq!(execution.result.rows[0].get("n"), Some(&RenderValue::Int(5)));
}

#[tokio::test]
async fn test_float_column_keeps_short_form() {
    let Some(gate) = get_test_gate().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let execution = gate
        .run(EXAMPLE_DATABASE, "SELECT CAST(1.1 AS FLOAT) AS f FROM DUAL")
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(execution.result.rows[0].get("f"), Some(&RenderValue::Float(1.1)));
}
