use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::payroll_entry::PayrollEntry;
use crate::core::{AppError, PayPeriod, Result};
use crate::modules::taxes::models::TaxYear;

/// Payroll run lifecycle: DRAFT -> PROCESSED -> PAID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Entries may be regenerated and irregular payments added
    Draft,
    /// Entries locked, YTD updated, audit written
    Processed,
    /// Salaries paid; terminal for the cycle
    Paid,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Processed => "processed",
            Self::Paid => "paid",
        }
    }

    /// Counted in YTD figures and statutory reports
    pub fn is_finalized(&self) -> bool {
        matches!(self, Self::Processed | Self::Paid)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for RunStatus {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "draft" => Ok(Self::Draft),
            "processed" => Ok(Self::Processed),
            "paid" => Ok(Self::Paid),
            _ => Err(format!("Invalid payroll run status: {}", value)),
        }
    }
}

/// Identity of a run: one per practice and month
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunKey {
    pub practice_id: String,
    pub period: PayPeriod,
}

impl std::fmt::Display for RunKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.practice_id, self.period)
    }
}

/// Run-level aggregates, always the sum of the run's entries
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunTotals {
    pub employee_count: u32,
    pub gross: Decimal,
    pub additions: Decimal,
    pub paye: Decimal,
    pub employee_uif: Decimal,
    pub pension: Decimal,
    pub medical_aid: Decimal,
    pub other_deductions: Decimal,
    pub pay_advances: Decimal,
    pub total_deductions: Decimal,
    pub net: Decimal,
    pub employer_uif: Decimal,
    pub employer_sdl: Decimal,
}

impl RunTotals {
    pub fn from_entries(entries: &[PayrollEntry]) -> Self {
        entries.iter().fold(
            RunTotals::default(),
            |mut totals, entry| {
                totals.employee_count += 1;
                totals.gross += entry.gross_salary;
                totals.additions += entry.additions_total();
                totals.paye += entry.paye_amount;
                totals.employee_uif += entry.uif_amount;
                totals.pension += entry.pension_amount;
                totals.medical_aid += entry.medical_aid_amount;
                totals.other_deductions += entry.other_deductions;
                totals.pay_advances += entry.pay_advance_amount;
                totals.total_deductions += entry.total_deductions;
                totals.net += entry.net_salary;
                totals.employer_uif += entry.employer_uif;
                totals.employer_sdl += entry.employer_sdl;
                totals
            },
        )
    }
}

/// The payroll for one practice and month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollRun {
    pub id: String,
    pub practice_id: String,
    pub period: PayPeriod,
    pub tax_year_id: String,
    /// Version of the tax table the entries were computed with
    pub tax_year_version: String,
    pub status: RunStatus,
    pub totals: RunTotals,
    /// Incremented on every write; used as the single-row update guard
    pub version: i64,
    pub generated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl PayrollRun {
    /// A fresh draft for a period; not yet persisted (version 0)
    pub fn new_draft(practice_id: String, period: PayPeriod, tax_year: &TaxYear) -> Result<Self> {
        if practice_id.trim().is_empty() {
            return Err(AppError::validation("Practice id is required"));
        }
        if !tax_year.contains(period) {
            return Err(AppError::configuration(format!(
                "Tax year {} does not cover period {}",
                tax_year.id, period
            )));
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            practice_id,
            period,
            tax_year_id: tax_year.id.clone(),
            tax_year_version: tax_year.version.clone(),
            status: RunStatus::Draft,
            totals: RunTotals::default(),
            version: 0,
            generated_at: now,
            processed_at: None,
            paid_at: None,
            updated_at: now,
        })
    }

    pub fn key(&self) -> RunKey {
        RunKey {
            practice_id: self.practice_id.clone(),
            period: self.period,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.version > 0
    }

    /// Fail unless the run is still a draft
    pub fn ensure_draft(&self, action: &str) -> Result<()> {
        if self.status != RunStatus::Draft {
            return Err(AppError::invalid_state(format!(
                "Cannot {} payroll run {} for {}: run is {}",
                action,
                self.id,
                self.key(),
                self.status
            )));
        }
        Ok(())
    }

    /// Recompute aggregates from the entries (draft only)
    pub fn recompute_totals(&mut self, entries: &[PayrollEntry]) -> Result<()> {
        self.ensure_draft("recompute totals of")?;
        self.totals = RunTotals::from_entries(entries);
        Ok(())
    }

    /// Compare stored aggregates with the entries without correcting them
    pub fn verify_totals(&self, entries: &[PayrollEntry]) -> Result<()> {
        let actual = RunTotals::from_entries(entries);
        if actual != self.totals {
            return Err(AppError::consistency(format!(
                "Payroll run {} totals do not match its {} entries (stored net {}, entries net {})",
                self.id,
                entries.len(),
                self.totals.net,
                actual.net
            )));
        }
        Ok(())
    }

    /// Prepare the next persisted version; returns the version the write must replace
    pub fn bump_version(&mut self, at: DateTime<Utc>) -> i64 {
        let expected = self.version;
        self.version += 1;
        self.updated_at = at;
        expected
    }

    pub fn mark_processed(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.ensure_draft("process")?;
        self.status = RunStatus::Processed;
        self.processed_at = Some(at);
        Ok(())
    }

    pub fn mark_paid(&mut self, at: DateTime<Utc>) -> Result<()> {
        if self.status != RunStatus::Processed {
            return Err(AppError::invalid_state(format!(
                "Cannot mark payroll run {} paid: run is {}",
                self.id, self.status
            )));
        }
        self.status = RunStatus::Paid;
        self.paid_at = Some(at);
        Ok(())
    }
}
