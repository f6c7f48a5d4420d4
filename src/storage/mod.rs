//! Persistence layer.
//!
//! Stores every emitted signal in SQLite. The table carries a uniqueness
//! key on (game, market, pick, odds) so the same price for the same pick is
//! recorded, and alerted, only once no matter how often the board is
//! polled. A line move alone does not count as a new signal; a price move
//! does.

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

use crate::types::{Decision, MarketKind};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS signals (
    id      INTEGER PRIMARY KEY AUTOINCREMENT,
    ts      INTEGER NOT NULL,
    game_id TEXT    NOT NULL,
    market  TEXT    NOT NULL,
    pick    TEXT    NOT NULL,
    line    REAL,
    odds    INTEGER NOT NULL,
    p_win   REAL    NOT NULL,
    p_push  REAL    NOT NULL,
    edge    REAL    NOT NULL,
    kelly   REAL    NOT NULL,
    stake   TEXT    NOT NULL,
    risk    TEXT    NOT NULL,
    status  TEXT    NOT NULL DEFAULT 'NEW',
    UNIQUE (game_id, market, pick, odds)
)
"#;

/// A persisted signal row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSignal {
    pub id: i64,
    pub ts: DateTime<Utc>,
    pub game_id: String,
    pub market: MarketKind,
    pub pick: String,
    pub line: Option<f64>,
    pub odds: i32,
    pub p_win: f64,
    pub p_push: f64,
    pub edge: f64,
    pub kelly: f64,
    pub stake: Decimal,
    pub risk: String,
    pub status: String,
}

/// SQLite-backed signal log.
#[derive(Clone)]
pub struct SignalStore {
    pool: SqlitePool,
}

impl SignalStore {
    /// Open (creating if needed) the database at `url` and ensure the schema.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database URL: {url}"))?
            .create_if_missing(true);

        // One connection: each in-memory connection would be its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open signal store at {url}"))?;

        let store = Self { pool };
        store.migrate().await?;
        info!(url, "Signal store ready");
        Ok(store)
    }

    /// Fresh in-memory store (tests, dry runs).
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .context("Failed to create signals table")?;
        Ok(())
    }

    /// Record a decision. Returns `true` when the row is new, `false` when
    /// an identical (game, market, pick, odds) signal was already stored.
    pub async fn save(&self, decision: &Decision) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO signals (
                ts, game_id, market, pick, line, odds, p_win, p_push, edge, kelly, stake, risk, status
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'NEW')
            "#,
        )
        .bind(Utc::now().timestamp())
        .bind(&decision.game_id)
        .bind(decision.market.to_string())
        .bind(&decision.pick)
        .bind(decision.line)
        .bind(decision.odds)
        .bind(decision.win_probability)
        .bind(decision.push_probability)
        .bind(decision.ev)
        .bind(decision.kelly_fraction)
        .bind(decision.stake.to_string())
        .bind(decision.risk.to_string())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to store signal for {}", decision.game_id))?;

        let inserted = result.rows_affected() > 0;
        debug!(
            game_id = %decision.game_id,
            market = %decision.market,
            pick = %decision.pick_label(),
            odds = decision.odds,
            inserted,
            "Signal saved"
        );
        Ok(inserted)
    }

    /// Most recent signals, newest first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<StoredSignal>> {
        let rows = sqlx::query(
            r#"
            SELECT id, ts, game_id, market, pick, line, odds, p_win, p_push,
                   edge, kelly, stake, risk, status
            FROM signals
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query signals")?;

        rows.iter().map(Self::from_row).collect()
    }

    /// Number of stored signals.
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM signals")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count signals")?;
        Ok(row.try_get("n")?)
    }

    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<StoredSignal> {
        let ts: i64 = row.try_get("ts")?;
        let market: String = row.try_get("market")?;
        let stake: String = row.try_get("stake")?;

        Ok(StoredSignal {
            id: row.try_get("id")?,
            ts: Utc
                .timestamp_opt(ts, 0)
                .single()
                .with_context(|| format!("Invalid signal timestamp {ts}"))?,
            game_id: row.try_get("game_id")?,
            market: market.parse()?,
            pick: row.try_get("pick")?,
            line: row.try_get("line")?,
            odds: row.try_get("odds")?,
            p_win: row.try_get("p_win")?,
            p_push: row.try_get("p_push")?,
            edge: row.try_get("edge")?,
            kelly: row.try_get("kelly")?,
            stake: Decimal::from_str(&stake).with_context(|| format!("Invalid stored stake {stake}"))?,
            risk: row.try_get("risk")?,
            status: row.try_get("status")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
