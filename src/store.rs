//! SQLite persistence for cached analyses, PDF sessions, M&A searches and
//! analytics events.
//!
//! Every table is append-mostly. Reads take the most recently written row
//! for a key: newest timestamp first, higher row id on ties.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::agents::AnalysisKind;
use crate::documents::ChunkRef;
use crate::error::ResearchError;
use crate::Result;

pub const TABLES: [&str; 4] = ["market_analysis", "pdf_history", "ma_history", "analytics"];

const SCHEMA: [&str; 6] = [
    r#"
    CREATE TABLE IF NOT EXISTS market_analysis (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      market TEXT NOT NULL,
      analysis_type TEXT NOT NULL,
      data TEXT NOT NULL,
      created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_market_analysis_market ON market_analysis (market, analysis_type)",
    r#"
    CREATE TABLE IF NOT EXISTS pdf_history (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      pdf_id TEXT NOT NULL UNIQUE,
      filename TEXT NOT NULL,
      chunks TEXT NOT NULL,
      processed_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ma_history (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      market TEXT NOT NULL,
      timeframe TEXT NOT NULL,
      result TEXT NOT NULL,
      timestamp TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_ma_history_market ON ma_history (market)",
    r#"
    CREATE TABLE IF NOT EXISTS analytics (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      event_type TEXT NOT NULL,
      data TEXT NOT NULL,
      timestamp TEXT NOT NULL
    )
    "#,
];

//
// ================= Rows =================
//

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CachedAnalysis {
    pub id: i64,
    pub market: String,
    pub analysis_type: String,
    pub data: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfRecord {
    pub pdf_id: String,
    pub filename: String,
    pub chunks: Vec<ChunkRef>,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MaSearch {
    pub id: i64,
    pub market: String,
    pub timeframe: String,
    pub result: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketHistoryEntry {
    pub id: i64,
    pub market_name: String,
    pub query_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopularMarket {
    pub market_name: String,
    pub query_count: i64,
    pub last_queried: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total_events: i64,
    pub event_breakdown: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub market_cache_count: i64,
    pub pdf_history_count: i64,
    pub ma_searches_count: i64,
    pub usage_analytics_count: i64,
    pub db_size_mb: f64,
    pub tables: Vec<String>,
}

//
// ================= Store =================
//

#[derive(Clone)]
pub struct ResearchStore {
    pool: SqlitePool,
}

impl ResearchStore {
    /// Open (creating if needed) the database at `url` and apply the schema.
    pub async fn connect(url: &str) -> Result<Self> {
        let in_memory = url.contains(":memory:");

        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        // Each in-memory connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!("Research store ready at {}", url);
        Ok(store)
    }

    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    // =============================
    // Market analysis cache
    // =============================

    pub async fn latest_analysis(
        &self,
        market: &str,
        kind: AnalysisKind,
    ) -> Result<Option<CachedAnalysis>> {
        let row = sqlx::query_as::<_, CachedAnalysis>(
            r#"
            SELECT id, market, analysis_type, data, created_at
            FROM market_analysis
            WHERE market = ? AND analysis_type = ?
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(market)
        .bind(kind.tag())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn insert_analysis(&self, market: &str, kind: AnalysisKind, data: &str) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO market_analysis (market, analysis_type, data, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(market)
        .bind(kind.tag())
        .bind(data)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Latest stored result per analysis type for one market.
    pub async fn restore_market(&self, market: &str) -> Result<BTreeMap<String, String>> {
        let rows = sqlx::query(
            r#"
            SELECT analysis_type, data
            FROM market_analysis
            WHERE market = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(market)
        .fetch_all(&self.pool)
        .await?;

        let mut restored = BTreeMap::new();
        for row in rows {
            restored.insert(row.try_get("analysis_type")?, row.try_get("data")?);
        }
        Ok(restored)
    }

    pub async fn delete_analysis(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM market_analysis WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn market_history(
        &self,
        search_term: Option<&str>,
        kind: Option<AnalysisKind>,
        limit: i64,
    ) -> Result<Vec<MarketHistoryEntry>> {
        let search = search_term.filter(|term| !term.trim().is_empty());
        let tag = kind.map(|k| k.tag());

        let rows = sqlx::query(
            r#"
            SELECT id, market, analysis_type, created_at
            FROM market_analysis
            WHERE (? IS NULL OR market LIKE '%' || ? || '%')
              AND (? IS NULL OR analysis_type = ?)
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(search)
        .bind(search)
        .bind(tag)
        .bind(tag)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(MarketHistoryEntry {
                    id: row.try_get("id")?,
                    market_name: row.try_get("market")?,
                    query_type: row.try_get("analysis_type")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    pub async fn popular_markets(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PopularMarket>> {
        let rows = sqlx::query(
            r#"
            SELECT market, COUNT(id) AS query_count, MAX(created_at) AS last_queried
            FROM market_analysis
            WHERE created_at >= ?
            GROUP BY market
            ORDER BY query_count DESC, last_queried DESC
            LIMIT ?
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let last: String = row.try_get("last_queried")?;
                Ok(PopularMarket {
                    market_name: row.try_get("market")?,
                    query_count: row.try_get("query_count")?,
                    last_queried: parse_timestamp(&last)?,
                })
            })
            .collect()
    }

    // =============================
    // PDF sessions
    // =============================

    pub async fn find_pdf(&self, pdf_id: &str) -> Result<Option<PdfRecord>> {
        let row = sqlx::query(
            "SELECT pdf_id, filename, chunks, processed_at FROM pdf_history WHERE pdf_id = ?",
        )
        .bind(pdf_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(pdf_from_row).transpose()
    }

    /// Record a processed PDF. A second insert of the same hash is ignored.
    pub async fn insert_pdf(&self, pdf_id: &str, filename: &str, chunks: &[ChunkRef]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pdf_history (pdf_id, filename, chunks, processed_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(pdf_id) DO NOTHING
            "#,
        )
        .bind(pdf_id)
        .bind(filename)
        .bind(serde_json::to_string(chunks)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn pdf_history(&self, search_term: Option<&str>, limit: i64) -> Result<Vec<PdfRecord>> {
        let search = search_term.filter(|term| !term.trim().is_empty());

        let rows = sqlx::query(
            r#"
            SELECT pdf_id, filename, chunks, processed_at
            FROM pdf_history
            WHERE (? IS NULL OR filename LIKE '%' || ? || '%')
            ORDER BY processed_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(search)
        .bind(search)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(pdf_from_row).collect()
    }

    pub async fn delete_pdf(&self, pdf_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pdf_history WHERE pdf_id = ?")
            .bind(pdf_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =============================
    // M&A searches
    // =============================

    pub async fn insert_ma_search(&self, market: &str, timeframe: &str, result: &str) -> Result<i64> {
        let inserted = sqlx::query(
            "INSERT INTO ma_history (market, timeframe, result, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(market)
        .bind(timeframe)
        .bind(result)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(inserted.last_insert_rowid())
    }

    pub async fn recent_ma_searches(&self, limit: i64) -> Result<Vec<MaSearch>> {
        let rows = sqlx::query_as::<_, MaSearch>(
            r#"
            SELECT id, market, timeframe, result, timestamp
            FROM ma_history
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // =============================
    // Analytics
    // =============================

    pub async fn log_event(&self, event_type: &str, data: &serde_json::Value) -> Result<()> {
        sqlx::query("INSERT INTO analytics (event_type, data, timestamp) VALUES (?, ?, ?)")
            .bind(event_type)
            .bind(serde_json::to_string(data)?)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn analytics_summary(&self, since: DateTime<Utc>) -> Result<AnalyticsSummary> {
        let rows = sqlx::query(
            r#"
            SELECT event_type, COUNT(*) AS events
            FROM analytics
            WHERE timestamp >= ?
            GROUP BY event_type
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let mut summary = AnalyticsSummary::default();
        for row in rows {
            let events: i64 = row.try_get("events")?;
            summary.total_events += events;
            summary.event_breakdown.insert(row.try_get("event_type")?, events);
        }
        Ok(summary)
    }

    // =============================
    // Admin
    // =============================

    pub async fn stats(&self) -> Result<DatabaseStats> {
        let mut counts = Vec::with_capacity(TABLES.len());
        for table in TABLES {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
                .fetch_one(&self.pool)
                .await?;
            counts.push(count);
        }

        let size_bytes: i64 = sqlx::query_scalar(
            "SELECT page_count * page_size FROM pragma_page_count(), pragma_page_size()",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DatabaseStats {
            market_cache_count: counts[0],
            pdf_history_count: counts[1],
            ma_searches_count: counts[2],
            usage_analytics_count: counts[3],
            db_size_mb: size_bytes as f64 / (1024.0 * 1024.0),
            tables: TABLES.iter().map(|t| t.to_string()).collect(),
        })
    }
}

fn pdf_from_row(row: sqlx::sqlite::SqliteRow) -> Result<PdfRecord> {
    let chunks: String = row.try_get("chunks")?;
    Ok(PdfRecord {
        pdf_id: row.try_get("pdf_id")?,
        filename: row.try_get("filename")?,
        chunks: serde_json::from_str(&chunks)?,
        processed_at: row.try_get("processed_at")?,
    })
}

/// Aggregates come back as plain text rather than typed timestamps.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| ResearchError::DatabaseError(format!("bad timestamp '{}': {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use tokio_test::assert_ok;

    fn chunk(file_id: &str, start: u32, end: u32) -> ChunkRef {
        ChunkRef {
            file_id: file_id.to_string(),
            start,
            end,
        }
    }

    #[tokio::test]
    async fn test_latest_row_wins() {
        let store = ResearchStore::in_memory().await.unwrap();

        assert!(store
            .latest_analysis("EV", AnalysisKind::Vertical)
            .await
            .unwrap()
            .is_none());

        assert_ok!(store.insert_analysis("EV", AnalysisKind::Vertical, "old").await);
        assert_ok!(store.insert_analysis("EV", AnalysisKind::Vertical, "new").await);
        assert_ok!(store.insert_analysis("EV", AnalysisKind::Global, "global").await);

        let cached = store
            .latest_analysis("EV", AnalysisKind::Vertical)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.data, "new");
        assert_eq!(cached.analysis_type, "vertical");
    }

    #[tokio::test]
    async fn test_restore_and_delete_market() {
        let store = ResearchStore::in_memory().await.unwrap();
        store.insert_analysis("EV", AnalysisKind::Vertical, "v1").await.unwrap();
        let id = store.insert_analysis("EV", AnalysisKind::Vertical, "v2").await.unwrap();
        store.insert_analysis("EV", AnalysisKind::Regional, "r1").await.unwrap();
        store.insert_analysis("Plastics", AnalysisKind::Global, "g").await.unwrap();

        let restored = store.restore_market("EV").await.unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored["vertical"], "v2");
        assert_eq!(restored["regional"], "r1");

        assert!(store.delete_analysis(id).await.unwrap());
        assert!(!store.delete_analysis(id).await.unwrap());
        assert_eq!(store.restore_market("EV").await.unwrap()["vertical"], "v1");
    }

    #[tokio::test]
    async fn test_market_history_search() {
        let store = ResearchStore::in_memory().await.unwrap();
        store.insert_analysis("Electric Vehicles", AnalysisKind::Vertical, "a").await.unwrap();
        store.insert_analysis("Plastics", AnalysisKind::Global, "b").await.unwrap();
        store.insert_analysis("electric boats", AnalysisKind::Global, "c").await.unwrap();

        let all = store.market_history(None, None, 20).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].market_name, "electric boats");

        let electric = store.market_history(Some("ELECTRIC"), None, 20).await.unwrap();
        assert_eq!(electric.len(), 2);

        let global = store
            .market_history(Some("electric"), Some(AnalysisKind::Global), 20)
            .await
            .unwrap();
        assert_eq!(global.len(), 1);

        assert_eq!(store.market_history(Some(""), None, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_popular_markets() {
        let store = ResearchStore::in_memory().await.unwrap();
        for kind in [AnalysisKind::Global, AnalysisKind::Vertical, AnalysisKind::Regional] {
            store.insert_analysis("EV", kind, "x").await.unwrap();
        }
        store.insert_analysis("Plastics", AnalysisKind::Global, "x").await.unwrap();

        let since = Utc::now() - ChronoDuration::days(7);
        let popular = store.popular_markets(since, 10).await.unwrap();
        assert_eq!(popular.len(), 2);
        assert_eq!(popular[0].market_name, "EV");
        assert_eq!(popular[0].query_count, 3);

        let future = Utc::now() + ChronoDuration::days(1);
        assert!(store.popular_markets(future, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_popular_markets_reports_last_write() {
        let store = ResearchStore::in_memory().await.unwrap();
        store.insert_analysis("EV", AnalysisKind::Global, "x").await.unwrap();
        store.insert_analysis("EV", AnalysisKind::Vertical, "y").await.unwrap();
        let latest = store
            .latest_analysis("EV", AnalysisKind::Vertical)
            .await
            .unwrap()
            .unwrap();

        let since = Utc::now() - ChronoDuration::days(7);
        let popular = store.popular_markets(since, 10).await.unwrap();
        assert_eq!(popular[0].last_queried, latest.created_at);
    }

    #[tokio::test]
    async fn test_popular_markets_rejects_corrupt_timestamp() {
        let store = ResearchStore::in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO market_analysis (market, analysis_type, data, created_at) VALUES ('EV', 'global', 'x', 'not-a-date')",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let since = Utc::now() - ChronoDuration::days(7);
        let result = store.popular_markets(since, 10).await;
        assert!(matches!(result, Err(ResearchError::DatabaseError(_))));
    }

    #[tokio::test]
    async fn test_pdf_history_unique_hash() {
        let store = ResearchStore::in_memory().await.unwrap();
        let chunks = vec![chunk("file-1", 1, 50), chunk("file-2", 51, 60)];

        store.insert_pdf("abc", "Annual Report.pdf", &chunks).await.unwrap();
        store.insert_pdf("abc", "duplicate.pdf", &[]).await.unwrap();

        let record = store.find_pdf("abc").await.unwrap().unwrap();
        assert_eq!(record.filename, "Annual Report.pdf");
        assert_eq!(record.chunks, chunks);

        let history = store.pdf_history(Some("annual"), 20).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(store.pdf_history(Some("missing"), 20).await.unwrap().is_empty());

        assert!(store.delete_pdf("abc").await.unwrap());
        assert!(store.find_pdf("abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ma_searches_newest_first() {
        let store = ResearchStore::in_memory().await.unwrap();
        store.insert_ma_search("EV", "last 5 years", "t1").await.unwrap();
        store.insert_ma_search("Batteries", "2020-2024", "t2").await.unwrap();

        let recent = store.recent_ma_searches(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].market, "Batteries");
    }

    #[tokio::test]
    async fn test_analytics_and_stats() {
        let store = ResearchStore::in_memory().await.unwrap();
        store.log_event("market_analysis", &json!({"market": "EV"})).await.unwrap();
        store.log_event("market_analysis", &json!({"market": "Plastics"})).await.unwrap();
        store.log_event("web_research", &json!({"query": "q"})).await.unwrap();
        store.insert_analysis("EV", AnalysisKind::Global, "x").await.unwrap();

        let summary = store
            .analytics_summary(Utc::now() - ChronoDuration::days(7))
            .await
            .unwrap();
        assert_eq!(summary.total_events, 3);
        assert_eq!(summary.event_breakdown["market_analysis"], 2);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.market_cache_count, 1);
        assert_eq!(stats.usage_analytics_count, 3);
        assert_eq!(stats.pdf_history_count, 0);
        assert_eq!(stats.tables.len(), 4);
        assert!(stats.db_size_mb > 0.0);
    }
}
