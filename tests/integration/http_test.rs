//! HTTP integration tests against the mock server.

use glance_runner::config::QueryConfig;
use glance_runner::db::{MockServer, MockTable, Value};
use glance_runner::seed::Seeder;
use glance_runner::service::QueryService;
use glance_runner::web::{router, AppState};
use serde_json::{json, Value as Json};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Starts the app on an ephemeral port and returns its base URL.
async fn spawn_app(server: MockServer) -> String {
    let service = QueryService::new(Arc::new(server), &QueryConfig::default());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router(AppState::new(service)))
            .await
            .unwrap();
    });

    format!("http://{addr}")
}

async fn seeded_server() -> MockServer {
    let server = MockServer::new()
        .with_table(
            "media",
            "archivos",
            MockTable::new(&["id", "contenido", "nota"])
                .row(vec![Value::Int(1), Value::Bytes(vec![0xff, 0x00]), Value::Null]),
        )
        .with_database("privada")
        .deny_access("privada");
    Seeder::new(Arc::new(server.clone()))
        .ensure_example_database()
        .await
        .unwrap();
    server
}

#[tokio::test]
async fn test_index_lists_accessible_databases() {
    let base = spawn_app(seeded_server().await).await;

    let response = reqwest::get(format!("{base}/")).await.unwrap();
    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();

    assert!(body.contains("<option value=\"practica_joins\""));
    assert!(body.contains("<option value=\"media\""));
    assert!(!body.contains("privada"));
    assert!(!body.contains("information_schema"));
}

#[tokio::test]
async fn test_form_submission_renders_rows() {
    let base = spawn_app(seeded_server().await).await;

    let body = reqwest::Client::new()
        .post(format!("{base}/"))
        .form(&[("database", "practica_joins"), ("query", "SELECT * FROM productos")])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(body.contains("<p class=\"meta\">5 row(s)</p>"));
    assert!(body.contains("<td>Laptop</td>"));
    assert!(body.contains("<option value=\"practica_joins\" selected>"));
    assert!(body.contains("SELECT * FROM productos</textarea>"));
}

#[tokio::test]
async fn test_form_rejection_is_shown_with_status_ok() {
    let server = seeded_server().await;
    let base = spawn_app(server.clone()).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/"))
        .form(&[("database", "practica_joins"), ("query", "DELETE FROM productos")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("<div class=\"error\">only SELECT allowed</div>"));
    assert_eq!(
        server.table("practica_joins", "productos").unwrap().rows().len(),
        5
    );
}

#[tokio::test]
async fn test_form_without_fields() {
    let base = spawn_app(seeded_server().await).await;

    let body = reqwest::Client::new()
        .post(format!("{base}/"))
        .form(&[("query", "SELECT * FROM productos")])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert!(body.contains("invalid database"));
}

#[tokio::test]
async fn test_api_databases() {
    let base = spawn_app(seeded_server().await).await;

    let body: Json = reqwest::get(format!("{base}/api/databases"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body, json!({"databases": ["media", "practica_joins"]}));
}

#[tokio::test]
async fn test_api_query_success() {
    let base = spawn_app(seeded_server().await).await;

    let body: Json = reqwest::Client::new()
        .post(format!("{base}/api/query"))
        .json(&json!({"database": "media", "query": "select * from archivos;"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["error"], Json::Null);
    assert_eq!(body["selected_database"], "media");
    assert_eq!(body["result"]["columns"], json!(["id", "contenido", "nota"]));
    assert_eq!(
        body["result"]["rows"],
        json!([{"id": 1, "contenido": "[BLOB]", "nota": null}])
    );
}

#[tokio::test]
async fn test_api_query_execution_failure() {
    let base = spawn_app(seeded_server().await).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/api/query"))
        .json(&json!({"database": "practica_joins", "query": "SELECT * FROM clientes"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Json = response.json().await.unwrap();
    assert_eq!(body["error"], "Table 'practica_joins.clientes' doesn't exist");
    assert_eq!(body["result"], Json::Null);
}

#[tokio::test]
async fn test_unreachable_server_is_internal_error() {
    let server = MockServer::new().fail_connect("Cannot connect to localhost:3306");
    let base = spawn_app(server).await;

    let response = reqwest::get(format!("{base}/api/databases")).await.unwrap();
    assert_eq!(response.status(), 500);

    let response = reqwest::Client::new()
        .post(format!("{base}/api/query"))
        .json(&json!({"database": "practica_joins", "query": "SELECT 1"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
}
