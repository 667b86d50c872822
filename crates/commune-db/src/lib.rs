//! # commune-db
//!
//! Database layer for Commune. Manages connections to:
//! - **PostgreSQL** — users, rooms, messages, subscriptions, uploads, and the
//!   federation bridge mapping tables (relational data)
//! - **S3-compatible object storage** — uploaded file bytes

pub mod postgres;
pub mod repository;
pub mod storage;

use anyhow::Result;
use sqlx::PgPool;

/// Shared database handle passed to the services.
#[derive(Clone)]
pub struct Database {
    pub pg: PgPool,
}

impl Database {
    /// Connect to PostgreSQL.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        tracing::info!("Connecting to PostgreSQL...");
        let pg = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        tracing::info!("Connected to PostgreSQL");

        Ok(Self { pg })
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pg).await?;
        tracing::info!("Migrations complete");
        Ok(())
    }
}
