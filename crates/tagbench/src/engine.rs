//! Storage engine connections.
//!
//! [`Engines`] owns one connection per engine for the whole run. Models get
//! cheap clones of the handles and never close them; only
//! [`Engines::close`] does.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;
use serde::Serialize;

#[cfg(feature = "duckdb")]
use duckdb::Connection as DuckDbConnection;

#[cfg(feature = "postgres")]
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};

/// Storage engines a model can run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Row-oriented relational server.
    Postgres,
    /// Embedded analytical engine.
    DuckDb,
    /// Embedded row store.
    Sqlite,
}

impl EngineKind {
    /// Every known engine, in run order.
    pub const ALL: [EngineKind; 3] = [
        EngineKind::Postgres,
        EngineKind::DuckDb,
        EngineKind::Sqlite,
    ];

    /// Lowercase engine name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Postgres => "postgresql",
            EngineKind::DuckDb => "duckdb",
            EngineKind::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(EngineKind::Postgres),
            "duckdb" => Ok(EngineKind::DuckDb),
            "sqlite" => Ok(EngineKind::Sqlite),
            other => Err(Error::Config(format!("unknown database: {}", other))),
        }
    }
}

/// Shared SQLite connection.
///
/// The lock is only taken inside [`SqliteHandle::with_conn`], which runs
/// synchronously, so it is never held across an await point.
#[derive(Clone)]
pub struct SqliteHandle {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteHandle {
    /// Open an in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Run `f` against the connection.
    pub fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.conn.lock();
        let conn = guard
            .as_mut()
            .ok_or(Error::EngineNotInitialized(EngineKind::Sqlite))?;
        f(conn)
    }

    /// Whether the connection is still open.
    pub fn is_open(&self) -> bool {
        self.conn.lock().is_some()
    }

    /// Drop the connection. Every clone of this handle observes the close.
    pub fn close(&self) {
        if let Some(conn) = self.conn.lock().take() {
            if let Err((_, e)) = conn.close() {
                tracing::warn!(error = %e, "sqlite close failed");
            }
        }
    }
}

impl fmt::Debug for SqliteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteHandle")
            .field("open", &self.is_open())
            .finish()
    }
}

/// Shared DuckDB connection.
///
/// Same locking rules as [`SqliteHandle`].
#[cfg(feature = "duckdb")]
#[derive(Clone)]
pub struct DuckDbHandle {
    conn: Arc<Mutex<Option<DuckDbConnection>>>,
}

#[cfg(feature = "duckdb")]
impl DuckDbHandle {
    /// Open an in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(DuckDbConnection::open_in_memory()?))
    }

    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_connection(DuckDbConnection::open(path)?))
    }

    fn from_connection(conn: DuckDbConnection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        }
    }

    /// Run `f` against the connection.
    pub fn with_conn<T>(&self, f: impl FnOnce(&mut DuckDbConnection) -> Result<T>) -> Result<T> {
        let mut guard = self.conn.lock();
        let conn = guard
            .as_mut()
            .ok_or(Error::EngineNotInitialized(EngineKind::DuckDb))?;
        f(conn)
    }

    /// Whether the connection is still open.
    pub fn is_open(&self) -> bool {
        self.conn.lock().is_some()
    }

    /// Drop the connection. Every clone of this handle observes the close.
    pub fn close(&self) {
        if let Some(conn) = self.conn.lock().take() {
            if let Err((_, e)) = conn.close() {
                tracing::warn!(error = %e, "duckdb close failed");
            }
        }
    }
}

#[cfg(feature = "duckdb")]
impl fmt::Debug for DuckDbHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuckDbHandle")
            .field("open", &self.is_open())
            .finish()
    }
}

/// Process-wide engine connections for one run.
pub struct Engines {
    config: ConnectionConfig,
    #[cfg(feature = "postgres")]
    postgres: Option<PgPool>,
    #[cfg(feature = "duckdb")]
    duckdb: Option<DuckDbHandle>,
    sqlite: Option<SqliteHandle>,
}

impl Engines {
    /// Create an empty set of connections; nothing is opened yet.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            #[cfg(feature = "postgres")]
            postgres: None,
            #[cfg(feature = "duckdb")]
            duckdb: None,
            sqlite: None,
        }
    }

    /// Use an already opened SQLite handle.
    pub fn with_sqlite(mut self, handle: SqliteHandle) -> Self {
        self.sqlite = Some(handle);
        self
    }

    /// Use an already opened PostgreSQL pool.
    #[cfg(feature = "postgres")]
    pub fn with_postgres(mut self, pool: PgPool) -> Self {
        self.postgres = Some(pool);
        self
    }

    /// Use an already opened DuckDB handle.
    #[cfg(feature = "duckdb")]
    pub fn with_duckdb(mut self, handle: DuckDbHandle) -> Self {
        self.duckdb = Some(handle);
        self
    }

    /// Open the connection for `engine` unless it is already open.
    pub async fn connect(&mut self, engine: EngineKind) -> Result<()> {
        if self.is_connected(engine) {
            return Ok(());
        }

        match engine {
            EngineKind::Postgres => self.connect_postgres().await,
            EngineKind::DuckDb => self.connect_duckdb(),
            EngineKind::Sqlite => {
                let handle = match &self.config.sqlite_path {
                    Some(path) => SqliteHandle::open(path)?,
                    None => SqliteHandle::open_in_memory()?,
                };
                tracing::info!(
                    path = ?self.config.sqlite_path,
                    "sqlite connection opened"
                );
                self.sqlite = Some(handle);
                Ok(())
            }
        }
    }

    #[cfg(feature = "postgres")]
    async fn connect_postgres(&mut self) -> Result<()> {
        let url = self.config.database_url.as_deref().ok_or_else(|| {
            Error::Config("DATABASE_URL is required for postgresql".to_string())
        })?;

        let pool = PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .connect(url)
            .await?;

        tracing::info!(
            max_connections = self.config.max_connections,
            "postgresql pool connected"
        );
        self.postgres = Some(pool);
        Ok(())
    }

    #[cfg(not(feature = "postgres"))]
    async fn connect_postgres(&mut self) -> Result<()> {
        Err(Error::Config("built without postgres support".to_string()))
    }

    #[cfg(feature = "duckdb")]
    fn connect_duckdb(&mut self) -> Result<()> {
        let handle = match &self.config.duckdb_path {
            Some(path) => DuckDbHandle::open(path)?,
            None => DuckDbHandle::open_in_memory()?,
        };
        tracing::info!(path = ?self.config.duckdb_path, "duckdb connection opened");
        self.duckdb = Some(handle);
        Ok(())
    }

    #[cfg(not(feature = "duckdb"))]
    fn connect_duckdb(&mut self) -> Result<()> {
        Err(Error::Config("built without duckdb support".to_string()))
    }

    /// Whether `engine` currently has an open connection.
    pub fn is_connected(&self, engine: EngineKind) -> bool {
        match engine {
            #[cfg(feature = "postgres")]
            EngineKind::Postgres => self.postgres.as_ref().is_some_and(|p| !p.is_closed()),
            #[cfg(not(feature = "postgres"))]
            EngineKind::Postgres => false,
            #[cfg(feature = "duckdb")]
            EngineKind::DuckDb => self.duckdb.as_ref().is_some_and(DuckDbHandle::is_open),
            #[cfg(not(feature = "duckdb"))]
            EngineKind::DuckDb => false,
            EngineKind::Sqlite => self.sqlite.as_ref().is_some_and(SqliteHandle::is_open),
        }
    }

    /// The PostgreSQL pool.
    #[cfg(feature = "postgres")]
    pub fn postgres(&self) -> Result<&PgPool> {
        self.postgres
            .as_ref()
            .ok_or(Error::EngineNotInitialized(EngineKind::Postgres))
    }

    /// The DuckDB handle.
    #[cfg(feature = "duckdb")]
    pub fn duckdb(&self) -> Result<&DuckDbHandle> {
        self.duckdb
            .as_ref()
            .ok_or(Error::EngineNotInitialized(EngineKind::DuckDb))
    }

    /// The SQLite handle.
    pub fn sqlite(&self) -> Result<&SqliteHandle> {
        self.sqlite
            .as_ref()
            .ok_or(Error::EngineNotInitialized(EngineKind::Sqlite))
    }

    /// Release every open connection. Calling it again is a no-op.
    pub async fn close(&mut self) {
        #[cfg(feature = "postgres")]
        if let Some(pool) = self.postgres.take() {
            pool.close().await;
            tracing::info!("postgresql pool closed");
        }

        #[cfg(feature = "duckdb")]
        if let Some(handle) = self.duckdb.take() {
            handle.close();
            tracing::info!("duckdb connection closed");
        }

        if let Some(handle) = self.sqlite.take() {
            handle.close();
            tracing::info!("sqlite connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_names() {
        assert_eq!("postgresql".parse::<EngineKind>().unwrap(), EngineKind::Postgres);
        assert_eq!("PG".parse::<EngineKind>().unwrap(), EngineKind::Postgres);
        assert_eq!("sqlite".parse::<EngineKind>().unwrap(), EngineKind::Sqlite);
        assert_eq!("DuckDB".parse::<EngineKind>().unwrap(), EngineKind::DuckDb);
        assert!("oracle".parse::<EngineKind>().unwrap_err().is_config());
        assert_eq!(EngineKind::Postgres.to_string(), "postgresql");
        assert_eq!(EngineKind::DuckDb.to_string(), "duckdb");
    }

    #[test]
    fn test_sqlite_handle_close_is_shared() {
        let handle = SqliteHandle::open_in_memory().unwrap();
        let borrowed = handle.clone();

        let one: i64 = borrowed
            .with_conn(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(one, 1);

        handle.close();
        assert!(!borrowed.is_open());
        let err = borrowed.with_conn(|_| Ok(())).unwrap_err();
        assert!(matches!(err, Error::EngineNotInitialized(EngineKind::Sqlite)));
    }

    #[test]
    fn test_sqlite_file_handle() {
        let dir = tempfile::tempdir().unwrap();
        let handle = SqliteHandle::open(dir.path().join("bench.db")).unwrap();
        let mode: String = handle
            .with_conn(|conn| Ok(conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[tokio::test]
    async fn test_engines_lazy_connect_and_close() {
        let mut engines = Engines::new(ConnectionConfig::default());
        assert!(!engines.is_connected(EngineKind::Sqlite));
        assert!(matches!(
            engines.sqlite().unwrap_err(),
            Error::EngineNotInitialized(EngineKind::Sqlite)
        ));

        engines.connect(EngineKind::Sqlite).await.unwrap();
        assert!(engines.is_connected(EngineKind::Sqlite));
        let handle = engines.sqlite().unwrap().clone();

        // Connecting again keeps the same connection.
        engines.connect(EngineKind::Sqlite).await.unwrap();
        assert!(handle.is_open());

        engines.close().await;
        engines.close().await;
        assert!(!handle.is_open());
        assert!(!engines.is_connected(EngineKind::Sqlite));
    }

    #[cfg(feature = "duckdb")]
    #[tokio::test]
    async fn test_duckdb_connect_and_close() {
        let mut engines = Engines::new(ConnectionConfig::default());
        engines.connect(EngineKind::DuckDb).await.unwrap();
        let handle = engines.duckdb().unwrap().clone();

        let one: i64 = handle
            .with_conn(|conn| Ok(conn.query_row("SELECT 1::BIGINT", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(one, 1);

        engines.close().await;
        assert!(!handle.is_open());
        let err = handle.with_conn(|_| Ok(())).unwrap_err();
        assert!(matches!(err, Error::EngineNotInitialized(EngineKind::DuckDb)));
    }

    #[cfg(not(feature = "duckdb"))]
    #[tokio::test]
    async fn test_duckdb_requires_feature() {
        let mut engines = Engines::new(ConnectionConfig::default());
        let err = engines.connect(EngineKind::DuckDb).await.unwrap_err();
        assert!(err.is_config());
    }

    #[cfg(feature = "postgres")]
    #[tokio::test]
    async fn test_postgres_requires_url() {
        let mut engines = Engines::new(ConnectionConfig::default());
        let err = engines.connect(EngineKind::Postgres).await.unwrap_err();
        assert!(err.is_config());
    }
}
