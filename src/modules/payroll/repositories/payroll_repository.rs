use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, MySql, MySqlPool, Transaction};

use crate::core::{AppError, PayPeriod, Result};
use crate::modules::advances::models::PayAdvance;
use crate::modules::advances::repositories::advance_repository;
use crate::modules::audit::models::AuditRecord;
use crate::modules::audit::repositories::audit_repository;
use crate::modules::payroll::models::{
    AdditionKind, PayrollAddition, PayrollEntry, PayrollRun, RunStatus, RunTotals,
};
use crate::modules::ytd::models::YtdFigures;
use crate::modules::ytd::repositories::ytd_repository;

/// Draft (re)generation: run header, full entry set, advance holds and
/// `calculated` audit rows. Replaces any previous draft entries.
#[derive(Debug, Clone)]
pub struct DraftWrite {
    pub run: PayrollRun,
    /// Version the stored run must still have; 0 inserts a new run
    pub expected_version: i64,
    pub entries: Vec<PayrollEntry>,
    /// Advances this run takes or releases; each must still be approved and
    /// free or held by the run, else the write fails with a conflict
    pub advances: Vec<PayAdvance>,
    pub audit: Vec<AuditRecord>,
}

/// One recomputed entry of a draft run plus the new run totals
#[derive(Debug, Clone)]
pub struct EntryWrite {
    pub run: PayrollRun,
    pub expected_version: i64,
    pub entry: PayrollEntry,
    pub audit: Vec<AuditRecord>,
}

/// DRAFT -> PROCESSED: status, YTD rows and `processed` audit rows
#[derive(Debug, Clone)]
pub struct ProcessingWrite {
    pub run: PayrollRun,
    pub expected_version: i64,
    /// Each row replaces a stored one with `runs_applied - 1`, or is the
    /// first row for its employee and tax year
    pub ytd: Vec<YtdFigures>,
    pub audit: Vec<AuditRecord>,
}

/// PROCESSED -> PAID: status and recovered advances
#[derive(Debug, Clone)]
pub struct PaidWrite {
    pub run: PayrollRun,
    pub expected_version: i64,
    pub advances: Vec<PayAdvance>,
}

/// Storage for payroll runs and entries.
///
/// Every write method is one transaction: it either applies completely or
/// leaves storage untouched. A run whose stored `version` differs from
/// `expected_version` was changed by someone else and the write fails with
/// [`AppError::Conflict`].
#[async_trait]
pub trait PayrollRepository: Send + Sync {
    async fn find_run(&self, practice_id: &str, period: PayPeriod) -> Result<Option<PayrollRun>>;

    async fn find_run_by_id(&self, run_id: &str) -> Result<Option<PayrollRun>>;

    /// Entries with their additions, ordered by employee id
    async fn entries_for_run(&self, run_id: &str) -> Result<Vec<PayrollEntry>>;

    /// Runs of a practice in a tax year, ordered by period
    async fn runs_for_tax_year(&self, practice_id: &str, tax_year_id: &str) -> Result<Vec<PayrollRun>>;

    async fn save_draft(&self, write: &DraftWrite) -> Result<()>;

    async fn save_entry(&self, write: &EntryWrite) -> Result<()>;

    async fn commit_processing(&self, write: &ProcessingWrite) -> Result<()>;

    async fn commit_paid(&self, write: &PaidWrite) -> Result<()>;

    /// Remove a draft run and its entries, releasing its advances
    async fn delete_draft(&self, run: &PayrollRun, advances: &[PayAdvance]) -> Result<()>;
}

pub struct MySqlPayrollRepository {
    pool: MySqlPool,
}

impl MySqlPayrollRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> Result<Transaction<'static, MySql>> {
        self.pool
            .begin()
            .await
            .map_err(|e| AppError::transient(format!("Failed to start transaction: {}", e)))
    }

    async fn commit(tx: Transaction<'static, MySql>) -> Result<()> {
        tx.commit()
            .await
            .map_err(|e| AppError::transient(format!("Failed to commit transaction: {}", e)))
    }

    async fn fetch_runs(&self, filter: &str, binds: Vec<String>) -> Result<Vec<PayrollRun>> {
        let sql = format!(
            "SELECT {} FROM payroll_runs WHERE {} ORDER BY period_year, period_month",
            RUN_COLUMNS, filter
        );
        let mut query = sqlx::query_as::<_, PayrollRunRow>(&sql);
        for value in binds {
            query = query.bind(value);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to fetch payroll runs: {}", e)))?;

        rows.into_iter().map(PayrollRun::try_from).collect()
    }
}

const RUN_COLUMNS: &str = r#"
    id, practice_id, period_year, period_month, tax_year_id, tax_year_version, status,
    employee_count, total_gross, total_additions, total_paye, total_employee_uif,
    total_pension, total_medical_aid, total_other_deductions, total_pay_advances,
    total_deductions, total_net, total_employer_uif, total_employer_sdl,
    version, generated_at, processed_at, paid_at, updated_at
"#;

#[async_trait]
impl PayrollRepository for MySqlPayrollRepository {
    async fn find_run(&self, practice_id: &str, period: PayPeriod) -> Result<Option<PayrollRun>> {
        let runs = self
            .fetch_runs(
                "practice_id = ? AND period_year = ? AND period_month = ?",
                vec![
                    practice_id.to_string(),
                    period.year.to_string(),
                    period.month.to_string(),
                ],
            )
            .await?;
        Ok(runs.into_iter().next())
    }

    async fn find_run_by_id(&self, run_id: &str) -> Result<Option<PayrollRun>> {
        let runs = self.fetch_runs("id = ?", vec![run_id.to_string()]).await?;
        Ok(runs.into_iter().next())
    }

    async fn entries_for_run(&self, run_id: &str) -> Result<Vec<PayrollEntry>> {
        let rows = sqlx::query_as::<_, PayrollEntryRow>(
            r#"
            SELECT id, run_id, employee_id, gross_salary, paye_amount, uif_amount,
                   pension_amount, medical_aid_amount, other_deductions, pay_advance_amount,
                   total_deductions, net_salary, employer_uif, employer_sdl,
                   snapshot, trace, warnings
            FROM payroll_entries
            WHERE run_id = ?
            ORDER BY employee_id
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch payroll entries: {}", e)))?;

        let additions = sqlx::query_as::<_, PayrollAdditionRow>(
            r#"
            SELECT id, entry_id, kind, description, amount, created_at
            FROM payroll_additions
            WHERE run_id = ?
            ORDER BY created_at, id
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch payroll additions: {}", e)))?;

        let additions: Vec<PayrollAddition> = additions
            .into_iter()
            .map(PayrollAddition::try_from)
            .collect::<Result<_>>()?;

        rows.into_iter()
            .map(|row| {
                let own = additions
                    .iter()
                    .filter(|a| a.entry_id == row.id)
                    .cloned()
                    .collect();
                row.into_entry(own)
            })
            .collect()
    }

    async fn runs_for_tax_year(&self, practice_id: &str, tax_year_id: &str) -> Result<Vec<PayrollRun>> {
        self.fetch_runs(
            "practice_id = ? AND tax_year_id = ?",
            vec![practice_id.to_string(), tax_year_id.to_string()],
        )
        .await
    }

    async fn save_draft(&self, write: &DraftWrite) -> Result<()> {
        let mut tx = self.begin().await?;

        if write.expected_version == 0 {
            insert_run_with_tx(&mut tx, &write.run).await?;
        } else {
            update_run_with_tx(&mut tx, &write.run, write.expected_version, RunStatus::Draft).await?;
        }

        sqlx::query("DELETE FROM payroll_additions WHERE run_id = ?")
            .bind(&write.run.id)
            .execute(tx.as_mut())
            .await
            .map_err(|e| AppError::transient(format!("Failed to clear draft additions: {}", e)))?;
        sqlx::query("DELETE FROM payroll_entries WHERE run_id = ?")
            .bind(&write.run.id)
            .execute(tx.as_mut())
            .await
            .map_err(|e| AppError::transient(format!("Failed to clear draft entries: {}", e)))?;

        for entry in &write.entries {
            insert_entry_with_tx(&mut tx, entry).await?;
        }
        advance_repository::update_with_tx(&mut tx, &write.run.id, &write.advances).await?;
        audit_repository::insert_with_tx(&mut tx, &write.audit).await?;

        Self::commit(tx).await
    }

    async fn save_entry(&self, write: &EntryWrite) -> Result<()> {
        let mut tx = self.begin().await?;

        update_run_with_tx(&mut tx, &write.run, write.expected_version, RunStatus::Draft).await?;

        let entry = &write.entry;
        sqlx::query("DELETE FROM payroll_additions WHERE entry_id = ?")
            .bind(&entry.id)
            .execute(tx.as_mut())
            .await
            .map_err(|e| AppError::transient(format!("Failed to clear entry additions: {}", e)))?;
        sqlx::query("DELETE FROM payroll_entries WHERE id = ?")
            .bind(&entry.id)
            .execute(tx.as_mut())
            .await
            .map_err(|e| AppError::transient(format!("Failed to replace payroll entry: {}", e)))?;
        insert_entry_with_tx(&mut tx, entry).await?;
        audit_repository::insert_with_tx(&mut tx, &write.audit).await?;

        Self::commit(tx).await
    }

    async fn commit_processing(&self, write: &ProcessingWrite) -> Result<()> {
        let mut tx = self.begin().await?;

        update_run_with_tx(&mut tx, &write.run, write.expected_version, RunStatus::Draft).await?;
        for figures in &write.ytd {
            ytd_repository::write_with_tx(&mut tx, figures).await?;
        }
        audit_repository::insert_with_tx(&mut tx, &write.audit).await?;

        Self::commit(tx).await
    }

    async fn commit_paid(&self, write: &PaidWrite) -> Result<()> {
        let mut tx = self.begin().await?;

        update_run_with_tx(&mut tx, &write.run, write.expected_version, RunStatus::Processed)
            .await?;
        advance_repository::update_with_tx(&mut tx, &write.run.id, &write.advances).await?;

        Self::commit(tx).await
    }

    async fn delete_draft(&self, run: &PayrollRun, advances: &[PayAdvance]) -> Result<()> {
        let mut tx = self.begin().await?;

        advance_repository::update_with_tx(&mut tx, &run.id, advances).await?;
        sqlx::query("DELETE FROM payroll_additions WHERE run_id = ?")
            .bind(&run.id)
            .execute(tx.as_mut())
            .await
            .map_err(|e| AppError::transient(format!("Failed to delete draft additions: {}", e)))?;
        sqlx::query("DELETE FROM payroll_entries WHERE run_id = ?")
            .bind(&run.id)
            .execute(tx.as_mut())
            .await
            .map_err(|e| AppError::transient(format!("Failed to delete draft entries: {}", e)))?;

        let rows_affected =
            sqlx::query("DELETE FROM payroll_runs WHERE id = ? AND version = ? AND status = ?")
                .bind(&run.id)
                .bind(run.version)
                .bind(RunStatus::Draft.as_str())
                .execute(tx.as_mut())
                .await
                .map_err(|e| AppError::transient(format!("Failed to delete draft run: {}", e)))?
                .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::conflict(format!(
                "Payroll run {} changed before it could be deleted",
                run.id
            )));
        }

        Self::commit(tx).await
    }
}

async fn insert_run_with_tx(tx: &mut Transaction<'_, MySql>, run: &PayrollRun) -> Result<()> {
    let totals = &run.totals;
    sqlx::query(
        r#"
        INSERT INTO payroll_runs (
            id, practice_id, period_year, period_month, tax_year_id, tax_year_version, status,
            employee_count, total_gross, total_additions, total_paye, total_employee_uif,
            total_pension, total_medical_aid, total_other_deductions, total_pay_advances,
            total_deductions, total_net, total_employer_uif, total_employer_sdl,
            version, generated_at, processed_at, paid_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&run.id)
    .bind(&run.practice_id)
    .bind(run.period.year)
    .bind(run.period.month)
    .bind(&run.tax_year_id)
    .bind(&run.tax_year_version)
    .bind(run.status.as_str())
    .bind(totals.employee_count)
    .bind(totals.gross)
    .bind(totals.additions)
    .bind(totals.paye)
    .bind(totals.employee_uif)
    .bind(totals.pension)
    .bind(totals.medical_aid)
    .bind(totals.other_deductions)
    .bind(totals.pay_advances)
    .bind(totals.total_deductions)
    .bind(totals.net)
    .bind(totals.employer_uif)
    .bind(totals.employer_sdl)
    .bind(run.version)
    .bind(run.generated_at)
    .bind(run.processed_at)
    .bind(run.paid_at)
    .bind(run.updated_at)
    .execute(tx.as_mut())
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::conflict(format!(
            "A payroll run for {} already exists",
            run.key()
        )),
        e => AppError::transient(format!("Failed to insert payroll run: {}", e)),
    })?;

    Ok(())
}

/// Single-row guarded update: succeeds only if the stored run still has
/// `expected_version` and `from_status`
async fn update_run_with_tx(
    tx: &mut Transaction<'_, MySql>,
    run: &PayrollRun,
    expected_version: i64,
    from_status: RunStatus,
) -> Result<()> {
    let totals = &run.totals;
    let rows_affected = sqlx::query(
        r#"
        UPDATE payroll_runs
        SET status = ?, tax_year_version = ?,
            employee_count = ?, total_gross = ?, total_additions = ?, total_paye = ?,
            total_employee_uif = ?, total_pension = ?, total_medical_aid = ?,
            total_other_deductions = ?, total_pay_advances = ?, total_deductions = ?,
            total_net = ?, total_employer_uif = ?, total_employer_sdl = ?,
            version = ?, generated_at = ?, processed_at = ?, paid_at = ?, updated_at = ?
        WHERE id = ? AND version = ? AND status = ?
        "#,
    )
    .bind(run.status.as_str())
    .bind(&run.tax_year_version)
    .bind(totals.employee_count)
    .bind(totals.gross)
    .bind(totals.additions)
    .bind(totals.paye)
    .bind(totals.employee_uif)
    .bind(totals.pension)
    .bind(totals.medical_aid)
    .bind(totals.other_deductions)
    .bind(totals.pay_advances)
    .bind(totals.total_deductions)
    .bind(totals.net)
    .bind(totals.employer_uif)
    .bind(totals.employer_sdl)
    .bind(run.version)
    .bind(run.generated_at)
    .bind(run.processed_at)
    .bind(run.paid_at)
    .bind(run.updated_at)
    .bind(&run.id)
    .bind(expected_version)
    .bind(from_status.as_str())
    .execute(tx.as_mut())
    .await
    .map_err(|e| AppError::transient(format!("Failed to update payroll run: {}", e)))?
    .rows_affected();

    if rows_affected == 0 {
        return Err(AppError::conflict(format!(
            "Payroll run {} is no longer {} at version {}",
            run.id, from_status, expected_version
        )));
    }

    Ok(())
}

async fn insert_entry_with_tx(tx: &mut Transaction<'_, MySql>, entry: &PayrollEntry) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO payroll_entries (
            id, run_id, employee_id, gross_salary, paye_amount, uif_amount,
            pension_amount, medical_aid_amount, other_deductions, pay_advance_amount,
            total_deductions, net_salary, employer_uif, employer_sdl,
            snapshot, trace, warnings
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.run_id)
    .bind(&entry.employee_id)
    .bind(entry.gross_salary)
    .bind(entry.paye_amount)
    .bind(entry.uif_amount)
    .bind(entry.pension_amount)
    .bind(entry.medical_aid_amount)
    .bind(entry.other_deductions)
    .bind(entry.pay_advance_amount)
    .bind(entry.total_deductions)
    .bind(entry.net_salary)
    .bind(entry.employer_uif)
    .bind(entry.employer_sdl)
    .bind(serde_json::to_string(&entry.snapshot)?)
    .bind(serde_json::to_string(&entry.trace)?)
    .bind(serde_json::to_string(&entry.warnings)?)
    .execute(tx.as_mut())
    .await
    .map_err(|e| AppError::transient(format!("Failed to insert payroll entry: {}", e)))?;

    for addition in &entry.additions {
        sqlx::query(
            r#"
            INSERT INTO payroll_additions (id, entry_id, run_id, kind, description, amount, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&addition.id)
        .bind(&addition.entry_id)
        .bind(&entry.run_id)
        .bind(addition.kind.as_str())
        .bind(&addition.description)
        .bind(addition.amount)
        .bind(addition.created_at)
        .execute(tx.as_mut())
        .await
        .map_err(|e| AppError::transient(format!("Failed to insert payroll addition: {}", e)))?;
    }

    Ok(())
}

#[derive(Debug, FromRow)]
struct PayrollRunRow {
    id: String,
    practice_id: String,
    period_year: i32,
    period_month: u32,
    tax_year_id: String,
    tax_year_version: String,
    status: String,
    employee_count: u32,
    total_gross: Decimal,
    total_additions: Decimal,
    total_paye: Decimal,
    total_employee_uif: Decimal,
    total_pension: Decimal,
    total_medical_aid: Decimal,
    total_other_deductions: Decimal,
    total_pay_advances: Decimal,
    total_deductions: Decimal,
    total_net: Decimal,
    total_employer_uif: Decimal,
    total_employer_sdl: Decimal,
    version: i64,
    generated_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PayrollRunRow> for PayrollRun {
    type Error = AppError;

    fn try_from(row: PayrollRunRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            practice_id: row.practice_id,
            period: PayPeriod::new(row.period_year, row.period_month)?,
            tax_year_id: row.tax_year_id,
            tax_year_version: row.tax_year_version,
            status: RunStatus::try_from(row.status).map_err(AppError::Internal)?,
            totals: RunTotals {
                employee_count: row.employee_count,
                gross: row.total_gross,
                additions: row.total_additions,
                paye: row.total_paye,
                employee_uif: row.total_employee_uif,
                pension: row.total_pension,
                medical_aid: row.total_medical_aid,
                other_deductions: row.total_other_deductions,
                pay_advances: row.total_pay_advances,
                total_deductions: row.total_deductions,
                net: row.total_net,
                employer_uif: row.total_employer_uif,
                employer_sdl: row.total_employer_sdl,
            },
            version: row.version,
            generated_at: row.generated_at,
            processed_at: row.processed_at,
            paid_at: row.paid_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct PayrollEntryRow {
    id: String,
    run_id: String,
    employee_id: String,
    gross_salary: Decimal,
    paye_amount: Decimal,
    uif_amount: Decimal,
    pension_amount: Decimal,
    medical_aid_amount: Decimal,
    other_deductions: Decimal,
    pay_advance_amount: Decimal,
    total_deductions: Decimal,
    net_salary: Decimal,
    employer_uif: Decimal,
    employer_sdl: Decimal,
    snapshot: String,
    trace: String,
    warnings: String,
}

impl PayrollEntryRow {
    fn into_entry(self, additions: Vec<PayrollAddition>) -> Result<PayrollEntry> {
        Ok(PayrollEntry {
            id: self.id,
            run_id: self.run_id,
            employee_id: self.employee_id,
            gross_salary: self.gross_salary,
            additions,
            paye_amount: self.paye_amount,
            uif_amount: self.uif_amount,
            pension_amount: self.pension_amount,
            medical_aid_amount: self.medical_aid_amount,
            other_deductions: self.other_deductions,
            pay_advance_amount: self.pay_advance_amount,
            total_deductions: self.total_deductions,
            net_salary: self.net_salary,
            employer_uif: self.employer_uif,
            employer_sdl: self.employer_sdl,
            snapshot: serde_json::from_str(&self.snapshot)?,
            trace: serde_json::from_str(&self.trace)?,
            warnings: serde_json::from_str(&self.warnings)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct PayrollAdditionRow {
    id: String,
    entry_id: String,
    kind: String,
    description: String,
    amount: Decimal,
    created_at: DateTime<Utc>,
}

impl TryFrom<PayrollAdditionRow> for PayrollAddition {
    type Error = AppError;

    fn try_from(row: PayrollAdditionRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            entry_id: row.entry_id,
            kind: AdditionKind::try_from(row.kind).map_err(AppError::Internal)?,
            description: row.description,
            amount: row.amount,
            created_at: row.created_at,
        })
    }
}
