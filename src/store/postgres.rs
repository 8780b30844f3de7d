//! PostgreSQL graph store for production use.
//!
//! Each session is one transaction. Read sessions run it `READ ONLY`.
//! Dropping a session without committing rolls the transaction back.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::time::Duration;
use uuid::Uuid;

use crate::types::{PaginationDetails, PeopleList, Person, PersonId, Relation, RelationType};
use super::{GraphSession, GraphStore, PersonRemoval, PoolStats, SessionMode};

/// Schema bootstrap, one statement per entry.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS people (
        id   UUID PRIMARY KEY,
        name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS relations (
        from_id       UUID NOT NULL REFERENCES people (id) ON DELETE RESTRICT,
        to_id         UUID NOT NULL REFERENCES people (id) ON DELETE RESTRICT,
        relation_type TEXT NOT NULL CHECK (relation_type IN ('PARENT', 'SPOUSE')),
        PRIMARY KEY (from_id, to_id, relation_type)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS relations_to_idx ON relations (to_id, relation_type)
    "#,
];

/// SQLSTATE for foreign_key_violation.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Configuration for PostgreSQL connection pool.
///
/// Production defaults favour failing fast over queueing:
/// - Pool size balances concurrency with connection limits
/// - Idle timeout releases unused connections
/// - Max lifetime forces periodic reconnection
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

impl PostgresConfig {
    /// Load configuration from environment variables with production defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/kinship".to_string()),
            max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            min_connections: env_or("DB_MIN_CONNECTIONS", 2),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT_SECS", 10),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT_SECS", 300),
            max_lifetime_secs: env_or("DB_MAX_LIFETIME_SECS", 1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// PostgreSQL graph store.
///
/// People live in `people`, edges in `relations`. A SPOUSE edge is one row
/// and is matched from either endpoint. Uses connection pooling.
pub struct PostgresGraphStore {
    pool: PgPool,
}

impl PostgresGraphStore {
    /// Create a new store with the given configuration.
    pub async fn new(config: PostgresConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            idle_timeout_secs = config.idle_timeout_secs,
            max_lifetime_secs = config.max_lifetime_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a store from environment variables.
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        Self::new(PostgresConfig::from_env()).await
    }

    /// Create the tables and index if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Kinship schema ready");
        Ok(())
    }
}

/// Error type for PostgreSQL store.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A mutation was attempted through a read session.
    #[error("write attempted in a read-only session")]
    ReadOnlySession,
}

#[async_trait]
impl GraphStore for PostgresGraphStore {
    type Session = PostgresSession;

    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn open_session(&self, mode: SessionMode) -> Result<PostgresSession, PostgresError> {
        let mut tx = self.pool.begin().await?;
        if mode == SessionMode::Read {
            sqlx::query("SET TRANSACTION READ ONLY")
                .execute(&mut *tx)
                .await?;
        }
        Ok(PostgresSession { tx, mode })
    }

    async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    fn pool_stats(&self) -> Option<PoolStats> {
        Some(PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max: self.pool.options().get_max_connections(),
        })
    }
}

/// Session over a [`PostgresGraphStore`]: one open transaction.
pub struct PostgresSession {
    tx: Transaction<'static, Postgres>,
    mode: SessionMode,
}

impl PostgresSession {
    fn ensure_writable(&self) -> Result<(), PostgresError> {
        match self.mode {
            SessionMode::Write => Ok(()),
            SessionMode::Read => Err(PostgresError::ReadOnlySession),
        }
    }

    async fn fetch_ids(&mut self, sql: &str, id: PersonId) -> Result<Vec<PersonId>, PostgresError> {
        let rows = sqlx::query(sql)
            .bind(id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await?;

        rows.iter()
            .map(|row| -> Result<PersonId, PostgresError> {
                Ok(PersonId::new(row.try_get::<Uuid, _>(0)?))
            })
            .collect()
    }
}

fn parse_person_row(row: &PgRow) -> Result<Person, sqlx::Error> {
    let id: Uuid = row.try_get("id")?;
    let name: String = row.try_get("name")?;
    Ok(Person::new(PersonId::new(id), name))
}

/// `LIMIT` and `OFFSET` for a page. Both saturate at `i64::MAX`; a page past
/// the end of the table is simply empty.
fn page_bounds(pagination: PaginationDetails) -> (i64, i64) {
    (
        i64::try_from(pagination.page_size()).unwrap_or(i64::MAX),
        i64::try_from(pagination.offset()).unwrap_or(i64::MAX),
    )
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION),
        _ => false,
    }
}

#[async_trait]
impl GraphSession for PostgresSession {
    type Error = PostgresError;

    fn mode(&self) -> SessionMode {
        self.mode
    }

    async fn save_person(&mut self, name: &str) -> Result<Person, Self::Error> {
        self.ensure_writable()?;
        let person = Person::new(PersonId::generate(), name);
        sqlx::query("INSERT INTO people (id, name) VALUES ($1, $2)")
            .bind(person.id.as_uuid())
            .bind(&person.name)
            .execute(&mut *self.tx)
            .await?;
        Ok(person)
    }

    async fn get_person(&mut self, id: PersonId) -> Result<Option<Person>, Self::Error> {
        let row = sqlx::query("SELECT id, name FROM people WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;

        match row {
            Some(ref r) => Ok(Some(parse_person_row(r)?)),
            None => Ok(None),
        }
    }

    async fn get_persons(&mut self, ids: &[PersonId]) -> Result<Vec<Person>, Self::Error> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| id.as_uuid()).collect();
        let rows = sqlx::query("SELECT id, name FROM people WHERE id = ANY($1) ORDER BY id")
            .bind(&uuids)
            .fetch_all(&mut *self.tx)
            .await?;

        rows.iter()
            .map(parse_person_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(PostgresError::from)
    }

    async fn get_people(&mut self, pagination: PaginationDetails) -> Result<PeopleList, Self::Error> {
        let (limit, offset) = page_bounds(pagination);
        let rows = sqlx::query("SELECT id, name FROM people ORDER BY id LIMIT $1 OFFSET $2")
            .bind(limit)
            .bind(offset)
            .fetch_all(&mut *self.tx)
            .await?;
        let total: i64 = sqlx::query("SELECT COUNT(*) FROM people")
            .fetch_one(&mut *self.tx)
            .await?
            .try_get(0)?;

        Ok(PeopleList {
            content: rows
                .iter()
                .map(parse_person_row)
                .collect::<Result<Vec<_>, _>>()?,
            page: pagination.page(),
            total_items: usize::try_from(total).unwrap_or_default(),
        })
    }

    async fn save_relation(&mut self, relation: Relation) -> Result<(), Self::Error> {
        self.ensure_writable()?;
        sqlx::query("INSERT INTO relations (from_id, to_id, relation_type) VALUES ($1, $2, $3)")
            .bind(relation.from.as_uuid())
            .bind(relation.to.as_uuid())
            .bind(relation.relation_type.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn get_parents(&mut self, child: PersonId) -> Result<Vec<PersonId>, Self::Error> {
        self.fetch_ids(
            r#"
            SELECT from_id
            FROM relations
            WHERE to_id = $1 AND relation_type = 'PARENT'
            ORDER BY from_id
            "#,
            child,
        )
        .await
    }

    async fn get_children(&mut self, parent: PersonId) -> Result<Vec<PersonId>, Self::Error> {
        self.fetch_ids(
            r#"
            SELECT to_id
            FROM relations
            WHERE from_id = $1 AND relation_type = 'PARENT'
            ORDER BY to_id
            "#,
            parent,
        )
        .await
    }

    async fn get_spouse(&mut self, id: PersonId) -> Result<Option<PersonId>, Self::Error> {
        let spouses = self
            .fetch_ids(
                r#"
                SELECT CASE WHEN from_id = $1 THEN to_id ELSE from_id END
                FROM relations
                WHERE relation_type = 'SPOUSE' AND (from_id = $1 OR to_id = $1)
                ORDER BY 1
                LIMIT 1
                "#,
                id,
            )
            .await?;
        Ok(spouses.into_iter().next())
    }

    async fn delete_relation(&mut self, relation: Relation) -> Result<usize, Self::Error> {
        self.ensure_writable()?;
        let sql = match relation.relation_type {
            RelationType::Parent => {
                "DELETE FROM relations WHERE from_id = $1 AND to_id = $2 AND relation_type = 'PARENT'"
            }
            RelationType::Spouse => {
                r#"
                DELETE FROM relations
                WHERE relation_type = 'SPOUSE'
                  AND ((from_id = $1 AND to_id = $2) OR (from_id = $2 AND to_id = $1))
                "#
            }
        };
        let result = sqlx::query(sql)
            .bind(relation.from.as_uuid())
            .bind(relation.to.as_uuid())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn delete_person(&mut self, id: PersonId) -> Result<PersonRemoval, Self::Error> {
        self.ensure_writable()?;
        let related: bool = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM relations WHERE from_id = $1 OR to_id = $1)",
        )
        .bind(id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await?
        .try_get(0)?;
        if related {
            return Ok(PersonRemoval::StillRelated);
        }

        // The foreign keys catch a relation added after the check above.
        match sqlx::query("DELETE FROM people WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *self.tx)
            .await
        {
            Ok(_) => Ok(PersonRemoval::Removed),
            Err(e) if is_foreign_key_violation(&e) => Ok(PersonRemoval::StillRelated),
            Err(e) => Err(e.into()),
        }
    }

    async fn has_common_ancestor(&mut self, a: PersonId, b: PersonId) -> Result<bool, Self::Error> {
        // UNION (not UNION ALL) deduplicates, so the recursion stops on
        // re-convergent lines.
        let shared: bool = sqlx::query(
            r#"
            WITH RECURSIVE
                up_a (id) AS (
                    SELECT $1::uuid
                    UNION
                    SELECT r.from_id FROM relations r
                    JOIN up_a ON r.to_id = up_a.id
                    WHERE r.relation_type = 'PARENT'
                ),
                up_b (id) AS (
                    SELECT $2::uuid
                    UNION
                    SELECT r.from_id FROM relations r
                    JOIN up_b ON r.to_id = up_b.id
                    WHERE r.relation_type = 'PARENT'
                )
            SELECT EXISTS (SELECT 1 FROM up_a JOIN up_b USING (id))
            "#,
        )
        .bind(a.as_uuid())
        .bind(b.as_uuid())
        .fetch_one(&mut *self.tx)
        .await?
        .try_get(0)?;
        Ok(shared)
    }

    async fn has_common_child(&mut self, a: PersonId, b: PersonId) -> Result<bool, Self::Error> {
        let shared: bool = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM relations x
                JOIN relations y ON y.to_id = x.to_id
                WHERE x.relation_type = 'PARENT' AND x.from_id = $1
                  AND y.relation_type = 'PARENT' AND y.from_id = $2
            )
            "#,
        )
        .bind(a.as_uuid())
        .bind(b.as_uuid())
        .fetch_one(&mut *self.tx)
        .await?
        .try_get(0)?;
        Ok(shared)
    }

    async fn marital_sibling_count(&mut self, child: PersonId) -> Result<usize, Self::Error> {
        let count: i64 = sqlx::query(
            r#"
            WITH parents AS (
                SELECT from_id AS id FROM relations
                WHERE to_id = $1 AND relation_type = 'PARENT'
            ),
            couple AS (
                SELECT p1.id AS a, p2.id AS b
                FROM parents p1 JOIN parents p2 ON p1.id < p2.id
                WHERE (SELECT COUNT(*) FROM parents) = 2
                  AND EXISTS (
                      SELECT 1 FROM relations s
                      WHERE s.relation_type = 'SPOUSE'
                        AND ((s.from_id = p1.id AND s.to_id = p2.id)
                          OR (s.from_id = p2.id AND s.to_id = p1.id))
                  )
            )
            SELECT COUNT(*)
            FROM couple
            JOIN relations ca ON ca.from_id = couple.a AND ca.relation_type = 'PARENT'
            JOIN relations cb ON cb.from_id = couple.b AND cb.relation_type = 'PARENT'
                             AND cb.to_id = ca.to_id
            "#,
        )
        .bind(child.as_uuid())
        .fetch_one(&mut *self.tx)
        .await?
        .try_get(0)?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn commit(self) -> Result<(), Self::Error> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn close(self) {
        if let Err(e) = self.tx.rollback().await {
            tracing::warn!(error = %e, "Rollback failed");
        }
    }
}
