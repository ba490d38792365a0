use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Employee tax certificate (IRP5) for one tax year.
///
/// Built from the cached YTD figures; the schema is fixed so collaborators
/// can render or file it without interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxCertificate {
    pub certificate_number: String,
    pub tax_year_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,

    pub employer_name: String,
    pub paye_reference: Option<String>,

    pub employee_id: String,
    pub full_name: String,
    pub id_number: Option<String>,
    pub tax_reference: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub bank_name: Option<String>,
    /// Only the last four digits are shown
    pub masked_account_number: Option<String>,

    pub gross_remuneration: Decimal,
    pub irregular_payments: Decimal,
    pub total_income: Decimal,
    pub retirement_contributions: Decimal,
    pub paye: Decimal,
    pub uif: Decimal,
    pub total_deductions: Decimal,
    pub net: Decimal,
    pub employer_uif: Decimal,
    pub employer_sdl: Decimal,
    /// Number of pay periods included
    pub periods: u32,
    pub issued_at: DateTime<Utc>,
}
