use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::declaration::StatutoryTotals;
use crate::core::PayPeriod;
use crate::modules::payroll::models::RunStatus;

/// One month of the reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthSummary {
    pub period: PayPeriod,
    /// `None` when the month has no run at all
    pub run_status: Option<RunStatus>,
    pub totals: StatutoryTotals,
}

/// A figure whose declared and YTD values disagree beyond tolerance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    /// `None` for the practice-wide comparison
    pub employee_id: Option<String>,
    pub figure: String,
    pub declared: Decimal,
    pub ytd: Decimal,
}

impl Discrepancy {
    pub fn difference(&self) -> Decimal {
        self.declared - self.ytd
    }
}

/// Annual employer reconciliation (EMP501): the twelve monthly declarations
/// against the YTD figures of the same tax year
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnualReconciliation {
    pub practice_id: String,
    pub employer_name: String,
    pub tax_year_id: String,
    pub months: Vec<MonthSummary>,
    /// Sum of the monthly declarations
    pub declared: StatutoryTotals,
    /// Sum of the employees' YTD rows
    pub ytd: StatutoryTotals,
    /// Distinct employees appearing in either source
    pub employee_count: u32,
    /// Allowed practice-wide difference per figure: one cent per employee
    pub tolerance: Decimal,
    pub discrepancies: Vec<Discrepancy>,
    pub generated_at: DateTime<Utc>,
}

impl AnnualReconciliation {
    pub fn is_reconciled(&self) -> bool {
        self.discrepancies.is_empty()
    }

    /// Months whose run has not been finalized yet
    pub fn open_months(&self) -> Vec<PayPeriod> {
        self.months
            .iter()
            .filter(|m| matches!(m.run_status, Some(RunStatus::Draft)))
            .map(|m| m.period)
            .collect()
    }
}
