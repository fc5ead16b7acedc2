//! Example database bootstrap.
//!
//! Creates the `practica_joins` practice database once, before the server
//! starts accepting requests. It is never part of request handling.

use crate::db::{Connector, Session};
use crate::error::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Name of the example database.
pub const EXAMPLE_DATABASE: &str = "practica_joins";

const CREATE_DATABASE: &str =
    "CREATE DATABASE practica_joins CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci";

const SCHEMA: &[&str] = &[
    "CREATE TABLE categorias (
        id INT PRIMARY KEY AUTO_INCREMENT,
        nombre VARCHAR(100) NOT NULL
    )",
    "INSERT INTO categorias (nombre) VALUES
        ('Electrónica'),
        ('Accesorios'),
        ('Hogar')",
    "CREATE TABLE productos (
        id INT PRIMARY KEY AUTO_INCREMENT,
        nombre VARCHAR(100) NOT NULL,
        precio DECIMAL(10,2),
        categoria_id INT,
        FOREIGN KEY (categoria_id) REFERENCES categorias(id)
    )",
    "INSERT INTO productos (nombre, precio, categoria_id) VALUES
        ('Laptop', 1200.00, 1),
        ('Mouse', 25.50, 2),
        ('Teclado', 45.00, 2),
        ('Licuadora', 80.00, 3),
        ('Auriculares', 60.00, 1)",
];

/// What the seeder did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// The example database was already there.
    AlreadyPresent,
    /// The example database was created and filled.
    Created,
}

/// Creates the example database if it is missing.
pub struct Seeder {
    connector: Arc<dyn Connector>,
}

impl Seeder {
    /// Creates a seeder that connects through `connector`.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    /// Ensures the example database exists.
    pub async fn ensure_example_database(&self) -> Result<SeedOutcome> {
        let mut session = self.connector.connect().await?;
        let result = seed(session.as_mut()).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close seeding connection: {}", e);
        }

        result
    }

    /// Runs seeding and logs the outcome. Failures never stop startup.
    pub async fn bootstrap(&self) {
        info!("Initializing example database '{}'", EXAMPLE_DATABASE);
        match self.ensure_example_database().await {
            Ok(SeedOutcome::AlreadyPresent) => info!("'{}' already exists", EXAMPLE_DATABASE),
            Ok(SeedOutcome::Created) => {
                info!("Created '{}' with productos and categorias", EXAMPLE_DATABASE)
            }
            Err(e) => warn!("Could not create example database: {}", e),
        }
    }
}

async fn seed(session: &mut dyn Session) -> Result<SeedOutcome> {
    let databases = session.list_databases().await?;
    if databases.iter().any(|d| d == EXAMPLE_DATABASE) {
        return Ok(SeedOutcome::AlreadyPresent);
    }

    session.execute(CREATE_DATABASE).await?;
    session.use_database(EXAMPLE_DATABASE).await?;
    for statement in SCHEMA {
        session.execute(statement).await?;
    }

    Ok(SeedOutcome::Created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MockServer, Value};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_creates_example_database() {
        let server = MockServer::new();
        let seeder = Seeder::new(Arc::new(server.clone()));

        let outcome = seeder.ensure_example_database().await.unwrap();

        assert_eq!(outcome, SeedOutcome::Created);
        let productos = server.table(EXAMPLE_DATABASE, "productos").unwrap();
        assert_eq!(productos.columns(), &["id", "nombre", "precio", "categoria_id"]);
        assert_eq!(productos.rows().len(), 5);
        assert_eq!(
            productos.rows()[0],
            vec![Value::Int(1), Value::from("Laptop"), Value::from("1200.00"), Value::Int(1)]
        );

        let categorias = server.table(EXAMPLE_DATABASE, "categorias").unwrap();
        assert_eq!(categorias.rows()[0], vec![Value::Int(1), Value::from("Electrónica")]);
    }

    #[tokio::test]
    async fn test_is_idempotent() {
        let server = MockServer::new();
        let seeder = Seeder::new(Arc::new(server.clone()));

        seeder.ensure_example_database().await.unwrap();
        let statements = server.executed_statements().len();
        let outcome = seeder.ensure_example_database().await.unwrap();

        assert_eq!(outcome, SeedOutcome::AlreadyPresent);
        assert_eq!(server.executed_statements().len(), statements);
        assert_eq!(server.connections_opened(), 2);
        assert_eq!(server.connections_closed(), 2);
    }

    #[tokio::test]
    async fn test_bootstrap_swallows_failures() {
        let server = MockServer::new().fail_connect("Cannot connect to localhost:3306");
        Seeder::new(Arc::new(server.clone())).bootstrap().await;
        assert!(!server.database_names().iter().any(|d| d == EXAMPLE_DATABASE));
    }
}
