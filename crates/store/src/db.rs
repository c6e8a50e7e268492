//! Database connection and pool management.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::{Path, PathBuf};
use tracing::instrument;

use crate::Transaction;
use crate::error::{ErrorKind, Result};

/// Embedded schema migrations.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
// One writer per library; the extra connections only serve reads.
const MAX_CONNECTIONS: u32 = 4;

/// Connection pool for a library database.
///
/// A library database is created exactly once ([`Database::create`]) and then
/// opened as many times as needed ([`Database::open`]). Mixing the two up is
/// an error rather than a silent migration or an empty library.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    path: Option<PathBuf>,
}

impl Database {
    async fn connect(options: SqliteConnectOptions, max: u32, path: Option<PathBuf>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // Query-based PRAGMAs must be applied to every pooled connection,
            // not only the first one handed out.
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(max)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(Self { pool, path })
    }

    /// Create a new library database at `path` and apply the schema.
    ///
    /// # Errors
    /// [`AlreadyInitialized`](ErrorKind::AlreadyInitialized) if the file
    /// already contains a library schema.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let options = Self::base_options().filename(path).create_if_missing(true);
        let db = Self::connect(options, MAX_CONNECTIONS, Some(path.to_path_buf())).await?;
        if db.schema_exists().await? {
            db.close().await;
            exn::bail!(ErrorKind::AlreadyInitialized);
        }
        db.migrate().await?;
        tracing::info!("library database created");
        Ok(db)
    }

    /// Open an existing library database.
    ///
    /// Migrations newer than the database are applied.
    ///
    /// # Errors
    /// [`NotInitialized`](ErrorKind::NotInitialized) if the file does not
    /// exist or has never been through [`create`](Self::create).
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            exn::bail!(ErrorKind::NotInitialized);
        }
        let options = Self::base_options().filename(path).create_if_missing(false);
        let db = Self::connect(options, MAX_CONNECTIONS, Some(path.to_path_buf())).await?;
        if !db.schema_exists().await? {
            db.close().await;
            exn::bail!(ErrorKind::NotInitialized);
        }
        db.migrate().await?;
        Ok(db)
    }

    /// Create a library in an in-memory database.
    ///
    /// Not behind `#[cfg(test)]` so other crates can use it in their tests.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = Self::base_options().filename(":memory:");
        // Every connection to ":memory:" is its own database; keep it to one.
        let db = Self::connect(options, 1, None).await?;
        db.migrate().await?;
        Ok(db)
    }

    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true)
            // PRAGMA synchronous = OFF. A crash (of the OS, not the process)
            // between commits can lose transactions that reported success.
            .synchronous(SqliteSynchronous::Off)
            .busy_timeout(std::time::Duration::from_millis(1500))
    }

    /// Apply additional PRAGMA settings that aren't exposed via SqliteConnectOptions.
    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        sqlx::query(
            r#"
                PRAGMA cache_size = -8192;
                PRAGMA temp_store = MEMORY;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn schema_exists(&self) -> Result<bool> {
        sqlx::query_scalar(include_str!("../queries/schema_exists.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    #[instrument("performing database migrations", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    /// Start a transaction. Dropping it without [`Transaction::commit`] rolls back.
    pub async fn begin(&self) -> Result<Transaction> {
        let tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        Ok(Transaction::new(tx))
    }

    /// Location of the database file; `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool, waiting for checked-out connections to come back.
    pub async fn close(&self) {
        // Let SQLite update query planner statistics
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}
