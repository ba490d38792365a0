use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, MySql, MySqlPool, Transaction};

use crate::core::{AppError, Result};
use crate::modules::ytd::models::YtdFigures;

/// Read access to cached YTD rows.
///
/// Rows are only written by the payroll repository, inside the transaction
/// that moves a run out of draft.
#[async_trait]
pub trait YtdRepository: Send + Sync {
    async fn find(&self, employee_id: &str, tax_year_id: &str) -> Result<Option<YtdFigures>>;

    /// Rows for the given employees; missing employees are simply absent
    async fn find_many(&self, tax_year_id: &str, employee_ids: &[String]) -> Result<Vec<YtdFigures>>;

    /// Every row of a practice for a tax year, ordered by employee id
    async fn for_practice(&self, practice_id: &str, tax_year_id: &str) -> Result<Vec<YtdFigures>>;
}

pub struct MySqlYtdRepository {
    pool: MySqlPool,
}

impl MySqlYtdRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

const YTD_COLUMNS: &str = r#"
    employee_id, practice_id, tax_year_id, gross, additions, paye, uif, pension,
    medical_aid, other_deductions, pay_advances, total_deductions, net,
    employer_uif, employer_sdl, runs_applied, last_run_id, updated_at
"#;

#[async_trait]
impl YtdRepository for MySqlYtdRepository {
    async fn find(&self, employee_id: &str, tax_year_id: &str) -> Result<Option<YtdFigures>> {
        let sql = format!(
            "SELECT {} FROM ytd_figures WHERE employee_id = ? AND tax_year_id = ?",
            YTD_COLUMNS
        );
        let row = sqlx::query_as::<_, YtdRow>(&sql)
            .bind(employee_id)
            .bind(tax_year_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to fetch YTD figures: {}", e)))?;

        Ok(row.map(YtdFigures::from))
    }

    async fn find_many(&self, tax_year_id: &str, employee_ids: &[String]) -> Result<Vec<YtdFigures>> {
        if employee_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; employee_ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM ytd_figures WHERE tax_year_id = ? AND employee_id IN ({}) \
             ORDER BY employee_id",
            YTD_COLUMNS, placeholders
        );

        let mut query = sqlx::query_as::<_, YtdRow>(&sql).bind(tax_year_id);
        for id in employee_ids {
            query = query.bind(id);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to fetch YTD figures: {}", e)))?;

        Ok(rows.into_iter().map(YtdFigures::from).collect())
    }

    async fn for_practice(&self, practice_id: &str, tax_year_id: &str) -> Result<Vec<YtdFigures>> {
        let sql = format!(
            "SELECT {} FROM ytd_figures WHERE practice_id = ? AND tax_year_id = ? \
             ORDER BY employee_id",
            YTD_COLUMNS
        );
        let rows = sqlx::query_as::<_, YtdRow>(&sql)
            .bind(practice_id)
            .bind(tax_year_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to fetch practice YTD figures: {}", e)))?;

        Ok(rows.into_iter().map(YtdFigures::from).collect())
    }
}

/// Write one absorbed YTD row within the processing transaction.
///
/// A row carrying its first run is inserted; any other row only replaces
/// the stored one if that still has `runs_applied - 1`. Both miss cases
/// mean another run was absorbed since the row was read.
pub(crate) async fn write_with_tx(
    tx: &mut Transaction<'_, MySql>,
    figures: &YtdFigures,
) -> Result<()> {
    if figures.runs_applied <= 1 {
        insert_with_tx(tx, figures).await
    } else {
        update_with_tx(tx, figures).await
    }
}

async fn insert_with_tx(tx: &mut Transaction<'_, MySql>, figures: &YtdFigures) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO ytd_figures (
            employee_id, practice_id, tax_year_id, gross, additions, paye, uif, pension,
            medical_aid, other_deductions, pay_advances, total_deductions, net,
            employer_uif, employer_sdl, runs_applied, last_run_id, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&figures.employee_id)
    .bind(&figures.practice_id)
    .bind(&figures.tax_year_id)
    .bind(figures.gross)
    .bind(figures.additions)
    .bind(figures.paye)
    .bind(figures.uif)
    .bind(figures.pension)
    .bind(figures.medical_aid)
    .bind(figures.other_deductions)
    .bind(figures.pay_advances)
    .bind(figures.total_deductions)
    .bind(figures.net)
    .bind(figures.employer_uif)
    .bind(figures.employer_sdl)
    .bind(figures.runs_applied)
    .bind(&figures.last_run_id)
    .bind(figures.updated_at)
    .execute(tx.as_mut())
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::conflict(format!(
            "YTD figures for {} in {} were written by another run",
            figures.employee_id, figures.tax_year_id
        )),
        e => AppError::transient(format!("Failed to write YTD figures: {}", e)),
    })?;

    Ok(())
}

async fn update_with_tx(tx: &mut Transaction<'_, MySql>, figures: &YtdFigures) -> Result<()> {
    let rows_affected = sqlx::query(
        r#"
        UPDATE ytd_figures
        SET gross = ?, additions = ?, paye = ?, uif = ?, pension = ?, medical_aid = ?,
            other_deductions = ?, pay_advances = ?, total_deductions = ?, net = ?,
            employer_uif = ?, employer_sdl = ?, runs_applied = ?, last_run_id = ?,
            updated_at = ?
        WHERE employee_id = ? AND tax_year_id = ? AND runs_applied = ?
        "#,
    )
    .bind(figures.gross)
    .bind(figures.additions)
    .bind(figures.paye)
    .bind(figures.uif)
    .bind(figures.pension)
    .bind(figures.medical_aid)
    .bind(figures.other_deductions)
    .bind(figures.pay_advances)
    .bind(figures.total_deductions)
    .bind(figures.net)
    .bind(figures.employer_uif)
    .bind(figures.employer_sdl)
    .bind(figures.runs_applied)
    .bind(&figures.last_run_id)
    .bind(figures.updated_at)
    .bind(&figures.employee_id)
    .bind(&figures.tax_year_id)
    .bind(figures.runs_applied - 1)
    .execute(tx.as_mut())
    .await
    .map_err(|e| AppError::transient(format!("Failed to write YTD figures: {}", e)))?
    .rows_affected();

    if rows_affected == 0 {
        return Err(AppError::conflict(format!(
            "YTD figures for {} in {} changed since they were read",
            figures.employee_id, figures.tax_year_id
        )));
    }

    Ok(())
}

#[derive(Debug, FromRow)]
struct YtdRow {
    employee_id: String,
    practice_id: String,
    tax_year_id: String,
    gross: Decimal,
    additions: Decimal,
    paye: Decimal,
    uif: Decimal,
    pension: Decimal,
    medical_aid: Decimal,
    other_deductions: Decimal,
    pay_advances: Decimal,
    total_deductions: Decimal,
    net: Decimal,
    employer_uif: Decimal,
    employer_sdl: Decimal,
    runs_applied: u32,
    last_run_id: Option<String>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<YtdRow> for YtdFigures {
    fn from(row: YtdRow) -> Self {
        Self {
            employee_id: row.employee_id,
            practice_id: row.practice_id,
            tax_year_id: row.tax_year_id,
            gross: row.gross,
            additions: row.additions,
            paye: row.paye,
            uif: row.uif,
            pension: row.pension,
            medical_aid: row.medical_aid,
            other_deductions: row.other_deductions,
            pay_advances: row.pay_advances,
            total_deductions: row.total_deductions,
            net: row.net,
            employer_uif: row.employer_uif,
            employer_sdl: row.employer_sdl,
            runs_applied: row.runs_applied,
            last_run_id: row.last_run_id,
            updated_at: row.updated_at,
        }
    }
}
