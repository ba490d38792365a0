use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, MySql, MySqlPool, Transaction};

use crate::core::{AppError, Result};
use crate::modules::audit::models::{AuditEvent, AuditRecord};

/// Read side of the audit log. There is no update or delete.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Rows of one run in the order they were recorded
    async fn for_run(&self, run_id: &str) -> Result<Vec<AuditRecord>>;

    async fn for_entry(&self, entry_id: &str) -> Result<Vec<AuditRecord>>;
}

pub struct MySqlAuditRepository {
    pool: MySqlPool,
}

impl MySqlAuditRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, column: &str, value: &str) -> Result<Vec<AuditRecord>> {
        let sql = format!(
            r#"
            SELECT id, run_id, entry_id, employee_id, event, tax_year_id, tax_year_version,
                   inputs, intermediates, checksum, recorded_at
            FROM payroll_audit_log
            WHERE {} = ?
            ORDER BY recorded_at ASC, seq ASC
            "#,
            column
        );

        let rows = sqlx::query_as::<_, AuditRow>(&sql)
            .bind(value)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to fetch audit log: {}", e)))?;

        rows.into_iter().map(AuditRecord::try_from).collect()
    }
}

#[async_trait]
impl AuditRepository for MySqlAuditRepository {
    async fn for_run(&self, run_id: &str) -> Result<Vec<AuditRecord>> {
        self.fetch("run_id", run_id).await
    }

    async fn for_entry(&self, entry_id: &str) -> Result<Vec<AuditRecord>> {
        self.fetch("entry_id", entry_id).await
    }
}

/// Append audit rows inside the transaction of the change they justify
pub(crate) async fn insert_with_tx(
    tx: &mut Transaction<'_, MySql>,
    records: &[AuditRecord],
) -> Result<()> {
    for record in records {
        sqlx::query(
            r#"
            INSERT INTO payroll_audit_log (
                id, run_id, entry_id, employee_id, event, tax_year_id, tax_year_version,
                inputs, intermediates, checksum, recorded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.run_id)
        .bind(&record.entry_id)
        .bind(&record.employee_id)
        .bind(record.event.as_str())
        .bind(&record.tax_year_id)
        .bind(&record.tax_year_version)
        .bind(serde_json::to_string(&record.inputs)?)
        .bind(serde_json::to_string(&record.intermediates)?)
        .bind(&record.checksum)
        .bind(record.recorded_at)
        .execute(tx.as_mut())
        .await
        .map_err(|e| AppError::transient(format!("Failed to append audit record: {}", e)))?;
    }

    Ok(())
}

#[derive(Debug, FromRow)]
struct AuditRow {
    id: String,
    run_id: String,
    entry_id: String,
    employee_id: String,
    event: String,
    tax_year_id: String,
    tax_year_version: String,
    inputs: String,
    intermediates: String,
    checksum: String,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditRecord {
    type Error = AppError;

    fn try_from(row: AuditRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            run_id: row.run_id,
            entry_id: row.entry_id,
            employee_id: row.employee_id,
            event: AuditEvent::try_from(row.event).map_err(AppError::Internal)?,
            tax_year_id: row.tax_year_id,
            tax_year_version: row.tax_year_version,
            inputs: serde_json::from_str(&row.inputs)?,
            intermediates: serde_json::from_str(&row.intermediates)?,
            checksum: row.checksum,
            recorded_at: row.recorded_at,
        })
    }
}
