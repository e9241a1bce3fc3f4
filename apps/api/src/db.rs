use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Schema for the JSONB document store. Each statement is idempotent.
const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS documents (
        collection TEXT NOT NULL,
        id TEXT NOT NULL,
        data JSONB NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (collection, id)
    )"#,
    // Smart-search lookups: prefix ranges and keyword membership.
    r#"CREATE INDEX IF NOT EXISTS documents_company_lower_idx
        ON documents (collection, (data ->> 'company_lower') COLLATE "C")"#,
    r#"CREATE INDEX IF NOT EXISTS documents_location_lower_idx
        ON documents (collection, (data ->> 'location_lower') COLLATE "C")"#,
    r#"CREATE INDEX IF NOT EXISTS documents_title_keywords_idx
        ON documents USING GIN ((data -> 'title_keywords'))"#,
];

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Creates the `documents` table and its lookup indexes if missing.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Document store schema ready");
    Ok(())
}
