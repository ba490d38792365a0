use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::PayPeriod;
use crate::modules::payroll::models::{EntryWarning, LineItem, PayrollEntry, RunStatus};
use crate::modules::ytd::models::YtdFigures;

/// A printable payslip line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayslipLine {
    pub label: String,
    pub amount: Decimal,
}

impl From<&LineItem> for PayslipLine {
    fn from(item: &LineItem) -> Self {
        Self {
            label: item.label(),
            amount: item.amount(),
        }
    }
}

/// Everything a payslip renderer needs for one employee and run.
///
/// Rendering (PDF, e-mail) happens elsewhere; this is the data contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayslipData {
    pub run_id: String,
    pub entry_id: String,
    pub period: PayPeriod,
    pub tax_year_id: String,
    pub run_status: RunStatus,

    pub employer_name: String,
    pub employee_id: String,
    pub full_name: String,
    pub tax_reference: Option<String>,
    pub masked_account_number: Option<String>,

    pub basic_salary: Decimal,
    pub earnings: Vec<PayslipLine>,
    pub deductions: Vec<PayslipLine>,
    pub employer_contributions: Vec<PayslipLine>,
    pub total_income: Decimal,
    pub total_deductions: Decimal,
    pub net_pay: Decimal,

    /// Year-to-date figures including this run once it is processed
    pub ytd: Option<YtdFigures>,

    /// Whether the payslip may be sent to the employee
    pub deliverable: bool,
    pub blocked_reasons: Vec<String>,
    pub warnings: Vec<EntryWarning>,
}

impl PayslipData {
    pub fn from_entry(
        entry: &PayrollEntry,
        period: PayPeriod,
        tax_year_id: &str,
        run_status: RunStatus,
        employer_name: &str,
        ytd: Option<YtdFigures>,
    ) -> Self {
        let items = entry.line_items();
        let earnings = items
            .iter()
            .filter(|i| matches!(i, LineItem::Addition { .. }))
            .map(PayslipLine::from)
            .collect();
        let deductions = items
            .iter()
            .filter(|i| i.is_deduction())
            .map(PayslipLine::from)
            .collect();
        let employer_contributions = items
            .iter()
            .filter(|i| i.is_employer_contribution())
            .map(PayslipLine::from)
            .collect();

        let mut blocked_reasons: Vec<String> = entry
            .warnings
            .iter()
            .filter(|w| w.blocks_payslip())
            .map(EntryWarning::message)
            .collect();
        if !run_status.is_finalized() {
            blocked_reasons.push(format!("Payroll run is still {}", run_status));
        }

        Self {
            run_id: entry.run_id.clone(),
            entry_id: entry.id.clone(),
            period,
            tax_year_id: tax_year_id.to_string(),
            run_status,
            employer_name: employer_name.to_string(),
            employee_id: entry.employee_id.clone(),
            full_name: entry.snapshot.full_name.clone(),
            tax_reference: entry.snapshot.tax_reference.clone(),
            masked_account_number: entry
                .snapshot
                .banking
                .as_ref()
                .map(|b| b.masked_account_number()),
            basic_salary: entry.gross_salary,
            earnings,
            deductions,
            employer_contributions,
            total_income: entry.total_income(),
            total_deductions: entry.total_deductions,
            net_pay: entry.net_salary,
            ytd,
            deliverable: blocked_reasons.is_empty(),
            blocked_reasons,
            warnings: entry.warnings.clone(),
        }
    }
}
