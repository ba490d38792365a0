use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{FromRow, MySqlPool};

use crate::core::{AppError, Result};
use crate::modules::employees::models::{
    BankingDetails, Compensation, EmployeeRecord, Employer, PayFrequency, RecurringDeduction,
    UifExemption,
};

/// Read access to HR master data
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    /// All active employees of a practice, ordered by id
    async fn active_employees(&self, practice_id: &str) -> Result<Vec<EmployeeRecord>>;

    async fn find_employee(&self, employee_id: &str) -> Result<Option<EmployeeRecord>>;

    /// Employer registration for a practice
    async fn employer(&self, practice_id: &str) -> Result<Employer>;
}

pub struct MySqlEmployeeDirectory {
    pool: MySqlPool,
}

impl MySqlEmployeeDirectory {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn load_deductions(&self, employee_ids: &[String]) -> Result<Vec<DeductionRow>> {
        if employee_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; employee_ids.len()].join(", ");
        let sql = format!(
            "SELECT employee_id, label, amount FROM employee_recurring_deductions \
             WHERE employee_id IN ({}) ORDER BY employee_id, label",
            placeholders
        );

        let mut query = sqlx::query_as::<_, DeductionRow>(&sql);
        for id in employee_ids {
            query = query.bind(id);
        }

        query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to fetch recurring deductions: {}", e)))
    }

    fn assemble(rows: Vec<EmployeeRow>, deductions: Vec<DeductionRow>) -> Result<Vec<EmployeeRecord>> {
        rows.into_iter()
            .map(|row| {
                let own: Vec<RecurringDeduction> = deductions
                    .iter()
                    .filter(|d| d.employee_id == row.id)
                    .map(|d| RecurringDeduction {
                        label: d.label.clone(),
                        amount: d.amount,
                    })
                    .collect();
                row.into_record(own)
            })
            .collect()
    }
}

const EMPLOYEE_COLUMNS: &str = r#"
    id, practice_id, full_name, id_number, tax_reference, date_of_birth, is_active,
    gross_salary, pay_frequency, uif_exemption, pension_rate, medical_aid_amount,
    bank_name, account_holder, account_number, branch_code
"#;

#[async_trait]
impl EmployeeDirectory for MySqlEmployeeDirectory {
    async fn active_employees(&self, practice_id: &str) -> Result<Vec<EmployeeRecord>> {
        let sql = format!(
            "SELECT {} FROM employees WHERE practice_id = ? AND is_active = TRUE ORDER BY id",
            EMPLOYEE_COLUMNS
        );
        let rows = sqlx::query_as::<_, EmployeeRow>(&sql)
            .bind(practice_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to fetch employees: {}", e)))?;

        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let deductions = self.load_deductions(&ids).await?;
        Self::assemble(rows, deductions)
    }

    async fn find_employee(&self, employee_id: &str) -> Result<Option<EmployeeRecord>> {
        let sql = format!("SELECT {} FROM employees WHERE id = ?", EMPLOYEE_COLUMNS);
        let row = sqlx::query_as::<_, EmployeeRow>(&sql)
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to fetch employee: {}", e)))?;

        match row {
            Some(row) => {
                let deductions = self.load_deductions(&[row.id.clone()]).await?;
                Ok(Self::assemble(vec![row], deductions)?.pop())
            }
            None => Ok(None),
        }
    }

    async fn employer(&self, practice_id: &str) -> Result<Employer> {
        let row = sqlx::query_as::<_, EmployerRow>(
            r#"
            SELECT practice_id, trading_name, paye_reference, uif_reference,
                   sdl_reference, sdl_exempt
            FROM employers
            WHERE practice_id = ?
            "#,
        )
        .bind(practice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to fetch employer: {}", e)))?;

        row.map(Employer::from).ok_or_else(|| {
            AppError::configuration(format!("No employer registration for practice {}", practice_id))
        })
    }
}

#[derive(Debug, FromRow)]
struct EmployeeRow {
    id: String,
    practice_id: String,
    full_name: String,
    id_number: Option<String>,
    tax_reference: Option<String>,
    date_of_birth: Option<NaiveDate>,
    is_active: bool,
    gross_salary: Option<Decimal>,
    pay_frequency: String,
    uif_exemption: Option<String>,
    pension_rate: Decimal,
    medical_aid_amount: Decimal,
    bank_name: Option<String>,
    account_holder: Option<String>,
    account_number: Option<String>,
    branch_code: Option<String>,
}

impl EmployeeRow {
    fn into_record(self, other_deductions: Vec<RecurringDeduction>) -> Result<EmployeeRecord> {
        let pay_frequency = PayFrequency::try_from(self.pay_frequency).map_err(AppError::Internal)?;
        let uif_exemption = self
            .uif_exemption
            .map(UifExemption::try_from)
            .transpose()
            .map_err(AppError::Internal)?;

        // Any banking column present means HR started capturing details;
        // incomplete details are reported as warnings at run time.
        let banking = match (
            self.bank_name,
            self.account_holder,
            self.account_number,
            self.branch_code,
        ) {
            (None, None, None, None) => None,
            (bank_name, account_holder, account_number, branch_code) => Some(BankingDetails {
                bank_name: bank_name.unwrap_or_default(),
                account_holder: account_holder.unwrap_or_default(),
                account_number: account_number.unwrap_or_default(),
                branch_code: branch_code.unwrap_or_default(),
            }),
        };

        Ok(EmployeeRecord {
            id: self.id,
            practice_id: self.practice_id,
            full_name: self.full_name,
            id_number: self.id_number,
            tax_reference: self.tax_reference,
            date_of_birth: self.date_of_birth,
            active: self.is_active,
            compensation: Compensation {
                gross_salary: self.gross_salary,
                pay_frequency,
                uif_exemption,
                pension_rate: self.pension_rate,
                medical_aid: self.medical_aid_amount,
                other_deductions,
            },
            banking,
        })
    }
}

#[derive(Debug, FromRow)]
struct DeductionRow {
    employee_id: String,
    label: String,
    amount: Decimal,
}

#[derive(Debug, FromRow)]
struct EmployerRow {
    practice_id: String,
    trading_name: String,
    paye_reference: Option<String>,
    uif_reference: Option<String>,
    sdl_reference: Option<String>,
    sdl_exempt: bool,
}

impl From<EmployerRow> for Employer {
    fn from(row: EmployerRow) -> Self {
        Self {
            practice_id: row.practice_id,
            trading_name: row.trading_name,
            paye_reference: row.paye_reference,
            uif_reference: row.uif_reference,
            sdl_reference: row.sdl_reference,
            sdl_exempt: row.sdl_exempt,
        }
    }
}
