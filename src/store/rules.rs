use std::time::Duration;

use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};
use tracing::{info, warn};

use crate::domain::{Rule, RuleKind, RuleMode};

/// Owner of the PostgreSQL connection pool for the `rules` relation.
///
/// Batch mutations live as free functions parametrized by a connection so
/// the service layer can scope several of them inside one transaction.
pub struct RuleStore {
    pool: PgPool,
}

impl RuleStore {
    /// Connect with a bounded pool.
    pub async fn connect(
        database_url: &str,
        min_connections: u32,
        max_connections: u32,
    ) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .min_connections(min_connections)
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Connect without touching the server until first use.
    pub fn connect_lazy(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new().connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    /// Connect, retrying a fixed number of times before giving up.
    pub async fn connect_with_retry(
        database_url: &str,
        min_connections: u32,
        max_connections: u32,
        max_attempts: u32,
        retry_interval: Duration,
    ) -> Result<Self, sqlx::Error> {
        for attempt in 1..=max_attempts {
            match Self::connect(database_url, min_connections, max_connections).await {
                Ok(store) => {
                    info!("Database connection established");
                    return Ok(store);
                }
                Err(e) if attempt == max_attempts => {
                    warn!(error = %e, "Failed to connect to database after retries");
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts,
                        error = %e,
                        "Database connect failed, retrying"
                    );
                    tokio::time::sleep(retry_interval).await;
                }
            }
        }

        unreachable!("loop returns on last attempt")
    }

    /// Run database migrations.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Open a transaction for a batch of mutations.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    /// All rules, optionally filtered by kind.
    pub async fn list(&self, filter: Option<RuleKind>) -> Result<Vec<Rule>, sqlx::Error> {
        let rows = match filter {
            Some(kind) => {
                sqlx::query(
                    r#"
                    SELECT id, type, value, mode, active
                    FROM rules
                    WHERE type = $1
                    ORDER BY id
                    "#,
                )
                .bind(kind.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, type, value, mode, active
                    FROM rules
                    ORDER BY id
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(rule_from_row).collect()
    }

    /// Values of currently enforced blacklist rules of one kind,
    /// for reconciliation.
    pub async fn active_blacklist_values(
        &self,
        kind: RuleKind,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT value
            FROM rules
            WHERE type = $1 AND mode = 'blacklist' AND active = TRUE
            ORDER BY id
            "#,
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
    }
}

/// Insert one row per value, skipping exact value collisions.
///
/// Returns only the rows actually inserted; callers treat a shortfall
/// against the requested values as a full-batch conflict.
pub async fn add_batch(
    conn: &mut PgConnection,
    kind: RuleKind,
    mode: RuleMode,
    values: &[String],
) -> Result<Vec<Rule>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        INSERT INTO rules (type, value, mode)
        SELECT $1, v.value, $2
        FROM UNNEST($3::text[]) AS v(value)
        ON CONFLICT (value) DO NOTHING
        RETURNING id, type, value, mode, active
        "#,
    )
    .bind(kind.as_str())
    .bind(mode.as_str())
    .bind(values)
    .fetch_all(conn)
    .await?;

    rows.iter().map(rule_from_row).collect()
}

/// Delete rows exactly matching `(kind, mode, value)` for each value.
///
/// Returns only the rows actually deleted.
pub async fn delete_batch(
    conn: &mut PgConnection,
    kind: RuleKind,
    mode: RuleMode,
    values: &[String],
) -> Result<Vec<Rule>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        DELETE FROM rules
        WHERE type = $1 AND mode = $2 AND value = ANY($3)
        RETURNING id, type, value, mode, active
        "#,
    )
    .bind(kind.as_str())
    .bind(mode.as_str())
    .bind(values)
    .fetch_all(conn)
    .await?;

    rows.iter().map(rule_from_row).collect()
}

/// Set `active` on rows matching both the id set and the mode.
///
/// Returns only the rows actually updated.
pub async fn toggle_batch(
    conn: &mut PgConnection,
    mode: RuleMode,
    ids: &[i64],
    active: bool,
) -> Result<Vec<Rule>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        UPDATE rules
        SET active = $1
        WHERE mode = $2 AND id = ANY($3)
        RETURNING id, type, value, mode, active
        "#,
    )
    .bind(active)
    .bind(mode.as_str())
    .bind(ids)
    .fetch_all(conn)
    .await?;

    rows.iter().map(rule_from_row).collect()
}

fn rule_from_row(row: &PgRow) -> Result<Rule, sqlx::Error> {
    let kind: String = row.get("type");
    let mode: String = row.get("mode");

    Ok(Rule {
        id: row.get("id"),
        kind: RuleKind::from_str(&kind)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown rule kind: {kind}").into()))?,
        value: row.get("value"),
        mode: RuleMode::from_str(&mode)
            .ok_or_else(|| sqlx::Error::Decode(format!("unknown rule mode: {mode}").into()))?,
        active: row.get("active"),
    })
}
