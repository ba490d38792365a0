use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, MySql, MySqlPool, Transaction};

use crate::core::{AppError, Result};
use crate::modules::advances::models::{AdvanceStatus, PayAdvance};

/// Storage for pay advances.
///
/// Changes that accompany a run transition (attach, detach, deducted) are
/// written by the payroll repository in the run's transaction; this trait
/// covers the request/decision side.
#[async_trait]
pub trait AdvanceRepository: Send + Sync {
    async fn insert(&self, advance: &PayAdvance) -> Result<()>;

    async fn find(&self, id: &str) -> Result<Option<PayAdvance>>;

    /// Record the decision on an advance that is still pending.
    /// `Conflict` if it was decided in the meantime.
    async fn update(&self, advance: &PayAdvance) -> Result<()>;

    /// Approved advances of a practice that are free or already held by `run_id`
    async fn eligible_for_run(&self, practice_id: &str, run_id: &str) -> Result<Vec<PayAdvance>>;

    /// Advances held by a run, whatever their status
    async fn for_run(&self, run_id: &str) -> Result<Vec<PayAdvance>>;

    async fn for_employee(&self, employee_id: &str) -> Result<Vec<PayAdvance>>;
}

pub struct MySqlAdvanceRepository {
    pool: MySqlPool,
}

impl MySqlAdvanceRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, filter: &str, binds: &[&str]) -> Result<Vec<PayAdvance>> {
        let sql = format!(
            r#"
            SELECT id, practice_id, employee_id, amount, status, reason, run_id,
                   requested_at, decided_at, deducted_at
            FROM pay_advances
            WHERE {}
            ORDER BY employee_id, requested_at, id
            "#,
            filter
        );

        let mut query = sqlx::query_as::<_, PayAdvanceRow>(&sql);
        for value in binds {
            query = query.bind(*value);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to fetch pay advances: {}", e)))?;

        rows.into_iter().map(PayAdvance::try_from).collect()
    }
}

#[async_trait]
impl AdvanceRepository for MySqlAdvanceRepository {
    async fn insert(&self, advance: &PayAdvance) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO pay_advances (
                id, practice_id, employee_id, amount, status, reason, run_id,
                requested_at, decided_at, deducted_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&advance.id)
        .bind(&advance.practice_id)
        .bind(&advance.employee_id)
        .bind(advance.amount)
        .bind(advance.status.as_str())
        .bind(&advance.reason)
        .bind(&advance.run_id)
        .bind(advance.requested_at)
        .bind(advance.decided_at)
        .bind(advance.deducted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to insert pay advance: {}", e)))?;

        Ok(())
    }

    async fn find(&self, id: &str) -> Result<Option<PayAdvance>> {
        Ok(self.fetch("id = ?", &[id]).await?.pop())
    }

    async fn update(&self, advance: &PayAdvance) -> Result<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE pay_advances
            SET status = ?, decided_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(advance.status.as_str())
        .bind(advance.decided_at)
        .bind(&advance.id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::transient(format!("Failed to update pay advance: {}", e)))?
        .rows_affected();

        if rows_affected == 0 {
            return match self.find(&advance.id).await? {
                Some(stored) => Err(AppError::conflict(format!(
                    "Pay advance {} was already decided ({})",
                    advance.id, stored.status
                ))),
                None => Err(AppError::not_found(format!("Pay advance {}", advance.id))),
            };
        }

        Ok(())
    }

    async fn eligible_for_run(&self, practice_id: &str, run_id: &str) -> Result<Vec<PayAdvance>> {
        self.fetch(
            "practice_id = ? AND status = 'approved' AND (run_id IS NULL OR run_id = ?)",
            &[practice_id, run_id],
        )
        .await
    }

    async fn for_run(&self, run_id: &str) -> Result<Vec<PayAdvance>> {
        self.fetch("run_id = ?", &[run_id]).await
    }

    async fn for_employee(&self, employee_id: &str) -> Result<Vec<PayAdvance>> {
        self.fetch("employee_id = ?", &[employee_id]).await
    }
}

/// Persist advance hand-offs inside the transaction of `run_id`.
///
/// A row is only touched while it is approved and free or already held by
/// that run, so an advance taken by another run in the meantime fails the
/// whole transaction with a conflict instead of being recovered twice.
pub(crate) async fn update_with_tx(
    tx: &mut Transaction<'_, MySql>,
    run_id: &str,
    advances: &[PayAdvance],
) -> Result<()> {
    for advance in advances {
        let rows_affected = sqlx::query(
            r#"
            UPDATE pay_advances
            SET status = ?, run_id = ?, deducted_at = ?
            WHERE id = ? AND status = 'approved' AND (run_id IS NULL OR run_id = ?)
            "#,
        )
        .bind(advance.status.as_str())
        .bind(&advance.run_id)
        .bind(advance.deducted_at)
        .bind(&advance.id)
        .bind(run_id)
        .execute(tx.as_mut())
        .await
        .map_err(|e| AppError::transient(format!("Failed to update pay advance: {}", e)))?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::conflict(format!(
                "Pay advance {} is no longer available to run {}",
                advance.id, run_id
            )));
        }
    }

    Ok(())
}

#[derive(Debug, FromRow)]
struct PayAdvanceRow {
    id: String,
    practice_id: String,
    employee_id: String,
    amount: Decimal,
    status: String,
    reason: Option<String>,
    run_id: Option<String>,
    requested_at: DateTime<Utc>,
    decided_at: Option<DateTime<Utc>>,
    deducted_at: Option<DateTime<Utc>>,
}

impl TryFrom<PayAdvanceRow> for PayAdvance {
    type Error = AppError;

    fn try_from(row: PayAdvanceRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            practice_id: row.practice_id,
            employee_id: row.employee_id,
            amount: row.amount,
            status: AdvanceStatus::try_from(row.status).map_err(AppError::Internal)?,
            reason: row.reason,
            run_id: row.run_id,
            requested_at: row.requested_at,
            decided_at: row.decided_at,
            deducted_at: row.deducted_at,
        })
    }
}
