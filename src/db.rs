use anyhow::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

/// Schema DDL embedded at compile time; every statement is idempotent
/// (`CREATE TABLE IF NOT EXISTS`), so the runner is safe to call on every start.
const MIGRATIONS: &[&str] = &[include_str!("../migrations/0001_init.sql")];

/// Create a SeaORM connection.
pub async fn create_orm_conn(database_url: &str) -> Result<DatabaseConnection> {
    let conn = Database::connect(database_url).await?;
    Ok(conn)
}

/// Apply the embedded migrations in order.
pub async fn run_migrations(conn: &DatabaseConnection) -> Result<()> {
    let backend = conn.get_database_backend();
    for sql in MIGRATIONS {
        // Postgres prepared statements cannot contain multiple commands,
        // so split each migration and run its statements individually.
        for stmt in sql.split(';') {
            let stmt = stmt.trim();
            if stmt.is_empty() {
                continue;
            }
            let statement = format!("{stmt};");
            conn.execute(Statement::from_string(backend, statement))
                .await?;
        }
    }

    Ok(())
}
