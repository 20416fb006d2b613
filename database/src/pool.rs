use std::time::Duration;

use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use anyhow::{Context, Result};

pub type PgPool = Pool<ConnectionManager<PgConnection>>;
pub type PgPooled = PooledConnection<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Bounds every statement a pooled connection runs, so a stalled query
/// can't hold a worker slot or an HTTP request handler hostage. Applied
/// once per connection on checkout from the pool rather than per query.
#[derive(Debug)]
struct StatementTimeout(Duration);

impl CustomizeConnection<PgConnection, diesel::r2d2::Error> for StatementTimeout {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), diesel::r2d2::Error> {
        use diesel::RunQueryDsl;
        diesel::sql_query(format!("SET statement_timeout = {}", self.0.as_millis()))
            .execute(conn)
            .map_err(diesel::r2d2::Error::QueryError)?;
        Ok(())
    }
}

/// Thin wrapper around a connection pool, handed down through the
/// component struct the way the teacher threads its sqlite `Database`
/// handle. Holding the pool rather than a single connection lets the
/// worker pool's `concurrency` slots and the HTTP server's request
/// handlers use the database concurrently without contending on one
/// connection.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn connect(database_url: &str, statement_timeout: Duration) -> Result<Database> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder()
            .connection_customizer(Box::new(StatementTimeout(statement_timeout)))
            .build(manager)
            .context("failed to build database connection pool")?;

        let mut conn = pool.get().context("failed to check out a database connection")?;
        conn.run_pending_migrations(&MIGRATIONS)
            .map_err(|e| anyhow::anyhow!("failed to run pending migrations: {e}"))?;

        Ok(Database { pool })
    }

    pub fn get(&self) -> Result<PgPooled> {
        self.pool.get().context("failed to check out a database connection")
    }
}
