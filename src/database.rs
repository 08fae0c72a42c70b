use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tokio::sync::Mutex;
use tracing::error;

use crate::error::StoreError;
use crate::models::{NewReport, Report, SaveOutcome};

pub const DEFAULT_REPORT_LIMIT: i64 = 20;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.create_tables()?;
        Ok(db)
    }

    fn create_tables(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                file_count INTEGER NOT NULL,
                revenue REAL NOT NULL,
                expenses REAL NOT NULL,
                net_profit REAL NOT NULL,
                margin REAL NOT NULL,
                health_status VARCHAR(50) NOT NULL,
                ai_analysis TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_reports_created_at ON reports (created_at)",
            [],
        )?;

        Ok(())
    }

    pub fn insert_report(&self, report: &NewReport) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO reports (
                created_at, file_count, revenue, expenses,
                net_profit, margin, health_status, ai_analysis
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                Utc::now(),
                report.file_count,
                report.revenue,
                report.expenses,
                report.net_profit,
                report.margin,
                report.health_status.as_str(),
                report.ai_analysis,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn list_reports(&self, limit: i64) -> Result<Vec<Report>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, created_at, file_count, revenue, expenses, net_profit, margin, health_status, ai_analysis
             FROM reports
             ORDER BY created_at DESC, id DESC
             LIMIT ?1",
        )?;
        let reports = stmt
            .query_map(params![limit.max(0)], report_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reports)
    }

    pub fn get_report(&self, id: i64) -> Result<Option<Report>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, created_at, file_count, revenue, expenses, net_profit, margin, health_status, ai_analysis
             FROM reports WHERE id = ?1",
        )?;
        let report = stmt.query_row(params![id], report_from_row).optional()?;
        Ok(report)
    }
}

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<Report> {
    Ok(Report {
        id: row.get(0)?,
        created_at: row.get(1)?,
        file_count: row.get(2)?,
        revenue: row.get(3)?,
        expenses: row.get(4)?,
        net_profit: row.get(5)?,
        margin: row.get(6)?,
        health_status: row.get(7)?,
        ai_analysis: row.get(8)?,
    })
}

/// Persistence seam for analysis reports.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Never fails outright; storage errors come back as `SaveOutcome::Failed`.
    async fn save(&self, report: NewReport) -> SaveOutcome;
    async fn list(&self, limit: i64) -> Result<Vec<Report>, StoreError>;
    async fn get(&self, id: i64) -> Result<Report, StoreError>;
}

#[async_trait]
impl ReportStore for Mutex<Database> {
    async fn save(&self, report: NewReport) -> SaveOutcome {
        let db = self.lock().await;
        match db.insert_report(&report) {
            Ok(id) => SaveOutcome::Saved(id),
            Err(e) => {
                error!("DB Error: {}", e);
                SaveOutcome::Failed(e.to_string())
            }
        }
    }

    async fn list(&self, limit: i64) -> Result<Vec<Report>, StoreError> {
        let db = self.lock().await;
        Ok(db.list_reports(limit)?)
    }

    async fn get(&self, id: i64) -> Result<Report, StoreError> {
        let db = self.lock().await;
        db.get_report(id)?.ok_or(StoreError::NotFound(id))
    }
}
