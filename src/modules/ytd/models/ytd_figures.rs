use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::modules::payroll::models::PayrollEntry;

/// Running year-to-date totals for one employee and tax year
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YtdFigures {
    pub employee_id: String,
    pub practice_id: String,
    pub tax_year_id: String,
    pub gross: Decimal,
    pub additions: Decimal,
    pub paye: Decimal,
    pub uif: Decimal,
    pub pension: Decimal,
    pub medical_aid: Decimal,
    pub other_deductions: Decimal,
    pub pay_advances: Decimal,
    pub total_deductions: Decimal,
    pub net: Decimal,
    pub employer_uif: Decimal,
    pub employer_sdl: Decimal,
    pub runs_applied: u32,
    /// Last run folded into these figures; guards against applying a run twice
    pub last_run_id: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// One figure that differs between two sets of YTD totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureDrift {
    pub employee_id: String,
    pub figure: String,
    pub cached: Decimal,
    pub reconstructed: Decimal,
}

impl FigureDrift {
    pub fn difference(&self) -> Decimal {
        self.cached - self.reconstructed
    }
}

impl YtdFigures {
    /// Zeroed row for an employee's first run of the year
    pub fn empty(employee_id: &str, practice_id: &str, tax_year_id: &str) -> Self {
        Self {
            employee_id: employee_id.to_string(),
            practice_id: practice_id.to_string(),
            tax_year_id: tax_year_id.to_string(),
            gross: Decimal::ZERO,
            additions: Decimal::ZERO,
            paye: Decimal::ZERO,
            uif: Decimal::ZERO,
            pension: Decimal::ZERO,
            medical_aid: Decimal::ZERO,
            other_deductions: Decimal::ZERO,
            pay_advances: Decimal::ZERO,
            total_deductions: Decimal::ZERO,
            net: Decimal::ZERO,
            employer_uif: Decimal::ZERO,
            employer_sdl: Decimal::ZERO,
            runs_applied: 0,
            last_run_id: None,
            updated_at: None,
        }
    }

    /// Fold one entry into the totals
    pub fn absorb(&mut self, entry: &PayrollEntry) {
        self.gross += entry.gross_salary;
        self.additions += entry.additions_total();
        self.paye += entry.paye_amount;
        self.uif += entry.uif_amount;
        self.pension += entry.pension_amount;
        self.medical_aid += entry.medical_aid_amount;
        self.other_deductions += entry.other_deductions;
        self.pay_advances += entry.pay_advance_amount;
        self.total_deductions += entry.total_deductions;
        self.net += entry.net_salary;
        self.employer_uif += entry.employer_uif;
        self.employer_sdl += entry.employer_sdl;
        self.runs_applied += 1;
        self.last_run_id = Some(entry.run_id.clone());
    }

    /// Gross remuneration including irregular payments
    pub fn total_income(&self) -> Decimal {
        self.gross + self.additions
    }

    fn figures(&self) -> [(&'static str, Decimal); 13] {
        [
            ("gross", self.gross),
            ("additions", self.additions),
            ("paye", self.paye),
            ("uif", self.uif),
            ("pension", self.pension),
            ("medical_aid", self.medical_aid),
            ("other_deductions", self.other_deductions),
            ("pay_advances", self.pay_advances),
            ("total_deductions", self.total_deductions),
            ("net", self.net),
            ("employer_uif", self.employer_uif),
            ("employer_sdl", self.employer_sdl),
            ("runs_applied", Decimal::from(self.runs_applied)),
        ]
    }

    /// Figures where `self` (cached) differs from `reconstructed`
    ///
    /// `last_run_id` and timestamps are bookkeeping and are not compared.
    pub fn diff(&self, reconstructed: &YtdFigures) -> Vec<FigureDrift> {
        self.figures()
            .into_iter()
            .zip(reconstructed.figures())
            .filter(|((_, cached), (_, rebuilt))| cached != rebuilt)
            .map(|((figure, cached), (_, rebuilt))| FigureDrift {
                employee_id: self.employee_id.clone(),
                figure: figure.to_string(),
                cached,
                reconstructed: rebuilt,
            })
            .collect()
    }
}

/// Result of checking every employee of a practice for one tax year
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YtdDriftReport {
    pub practice_id: String,
    pub tax_year_id: String,
    pub employees_checked: usize,
    pub drifts: Vec<FigureDrift>,
}

impl YtdDriftReport {
    pub fn is_clean(&self) -> bool {
        self.drifts.is_empty()
    }

    /// Employees with at least one drifting figure, ascending
    pub fn drifting_employees(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.drifts.iter().map(|d| d.employee_id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}
