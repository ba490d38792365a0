use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::PayPeriod;
use crate::modules::payroll::models::{PayrollEntry, RunStatus};
use crate::modules::ytd::models::YtdFigures;

/// One employee's line on the monthly employer declaration (EMP201)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationRow {
    pub employee_id: String,
    pub full_name: String,
    pub tax_reference: Option<String>,
    pub gross: Decimal,
    pub additions: Decimal,
    pub paye: Decimal,
    pub employee_uif: Decimal,
    pub employer_uif: Decimal,
    pub sdl: Decimal,
}

impl DeclarationRow {
    /// Amount payable to the revenue service for this employee
    pub fn liability(&self) -> Decimal {
        self.paye + self.employee_uif + self.employer_uif + self.sdl
    }
}

impl From<&PayrollEntry> for DeclarationRow {
    fn from(entry: &PayrollEntry) -> Self {
        Self {
            employee_id: entry.employee_id.clone(),
            full_name: entry.snapshot.full_name.clone(),
            tax_reference: entry.snapshot.tax_reference.clone(),
            gross: entry.gross_salary,
            additions: entry.additions_total(),
            paye: entry.paye_amount,
            employee_uif: entry.uif_amount,
            employer_uif: entry.employer_uif,
            sdl: entry.employer_sdl,
        }
    }
}

/// Summed statutory figures; used for declarations and reconciliations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatutoryTotals {
    pub employee_count: u32,
    pub gross: Decimal,
    pub additions: Decimal,
    pub paye: Decimal,
    pub employee_uif: Decimal,
    pub employer_uif: Decimal,
    pub sdl: Decimal,
}

impl StatutoryTotals {
    pub fn from_rows(rows: &[DeclarationRow]) -> Self {
        rows.iter().fold(Self::default(), |mut totals, row| {
            totals.employee_count += 1;
            totals.gross += row.gross;
            totals.additions += row.additions;
            totals.paye += row.paye;
            totals.employee_uif += row.employee_uif;
            totals.employer_uif += row.employer_uif;
            totals.sdl += row.sdl;
            totals
        })
    }

    pub fn from_ytd(rows: &[YtdFigures]) -> Self {
        rows.iter().fold(Self::default(), |mut totals, row| {
            totals.employee_count += 1;
            totals.gross += row.gross;
            totals.additions += row.additions;
            totals.paye += row.paye;
            totals.employee_uif += row.uif;
            totals.employer_uif += row.employer_uif;
            totals.sdl += row.employer_sdl;
            totals
        })
    }

    /// Add money figures; `employee_count` is left to the caller
    pub fn add_figures(&mut self, other: &StatutoryTotals) {
        self.gross += other.gross;
        self.additions += other.additions;
        self.paye += other.paye;
        self.employee_uif += other.employee_uif;
        self.employer_uif += other.employer_uif;
        self.sdl += other.sdl;
    }

    pub fn liability(&self) -> Decimal {
        self.paye + self.employee_uif + self.employer_uif + self.sdl
    }

    /// Named money figures in export order
    pub fn figures(&self) -> [(&'static str, Decimal); 6] {
        [
            ("gross", self.gross),
            ("additions", self.additions),
            ("paye", self.paye),
            ("employee_uif", self.employee_uif),
            ("employer_uif", self.employer_uif),
            ("sdl", self.sdl),
        ]
    }
}

/// Monthly employer declaration over the finalized run of one period.
///
/// A period without a processed or paid run declares nothing; `run_status`
/// tells which case applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyDeclaration {
    pub practice_id: String,
    pub employer_name: String,
    pub paye_reference: Option<String>,
    pub period: PayPeriod,
    pub tax_year_id: String,
    pub run_id: Option<String>,
    pub run_status: Option<RunStatus>,
    pub rows: Vec<DeclarationRow>,
    pub totals: StatutoryTotals,
    pub generated_at: DateTime<Utc>,
}

impl MonthlyDeclaration {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total_liability(&self) -> Decimal {
        self.totals.liability()
    }
}
