use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::core::Result;
use crate::modules::payroll::models::PayrollEntry;
use crate::modules::payroll::repositories::PayrollRepository;
use crate::modules::ytd::models::{YtdDriftReport, YtdFigures};
use crate::modules::ytd::repositories::YtdRepository;
use crate::modules::ytd::services::YtdAggregator;

/// Drift detection between cached YTD rows and finalized entries
pub struct YtdService {
    payroll: Arc<dyn PayrollRepository>,
    ytd: Arc<dyn YtdRepository>,
}

impl YtdService {
    pub fn new(payroll: Arc<dyn PayrollRepository>, ytd: Arc<dyn YtdRepository>) -> Self {
        Self { payroll, ytd }
    }

    pub async fn figures(&self, employee_id: &str, tax_year_id: &str) -> Result<Option<YtdFigures>> {
        self.ytd.find(employee_id, tax_year_id).await
    }

    /// Entries of every processed or paid run of the practice in the tax year
    async fn finalized_entries(&self, practice_id: &str, tax_year_id: &str) -> Result<Vec<PayrollEntry>> {
        let runs = self.payroll.runs_for_tax_year(practice_id, tax_year_id).await?;

        let mut entries = Vec::new();
        for run in runs.iter().filter(|r| r.status.is_finalized()) {
            entries.extend(self.payroll.entries_for_run(&run.id).await?);
        }
        Ok(entries)
    }

    /// Recompute an employee's YTD figures from finalized entries only
    pub async fn reconstruct(
        &self,
        practice_id: &str,
        employee_id: &str,
        tax_year_id: &str,
    ) -> Result<YtdFigures> {
        let entries = self.finalized_entries(practice_id, tax_year_id).await?;
        Ok(YtdAggregator::reconstruct(employee_id, practice_id, tax_year_id, &entries))
    }

    /// Fail with a consistency error when the cached row has drifted
    pub async fn verify(&self, practice_id: &str, employee_id: &str, tax_year_id: &str) -> Result<()> {
        let reconstructed = self.reconstruct(practice_id, employee_id, tax_year_id).await?;
        let cached = self.ytd.find(employee_id, tax_year_id).await?;
        YtdAggregator::verify(cached.as_ref(), &reconstructed)
    }

    /// Check every employee with either a cached row or a finalized entry
    pub async fn verify_practice(&self, practice_id: &str, tax_year_id: &str) -> Result<YtdDriftReport> {
        let entries = self.finalized_entries(practice_id, tax_year_id).await?;
        let cached = self.ytd.for_practice(practice_id, tax_year_id).await?;

        let employees: BTreeSet<&str> = entries
            .iter()
            .map(|e| e.employee_id.as_str())
            .chain(cached.iter().map(|row| row.employee_id.as_str()))
            .collect();

        let mut drifts = Vec::new();
        for employee_id in &employees {
            let reconstructed =
                YtdAggregator::reconstruct(employee_id, practice_id, tax_year_id, &entries);
            let row = cached
                .iter()
                .find(|row| row.employee_id == *employee_id)
                .cloned()
                .unwrap_or_else(|| YtdFigures::empty(employee_id, practice_id, tax_year_id));
            drifts.extend(row.diff(&reconstructed));
        }

        let report = YtdDriftReport {
            practice_id: practice_id.to_string(),
            tax_year_id: tax_year_id.to_string(),
            employees_checked: employees.len(),
            drifts,
        };

        if report.is_clean() {
            info!(
                practice_id = practice_id,
                tax_year = tax_year_id,
                employees = report.employees_checked,
                "YTD figures match finalized entries"
            );
        } else {
            warn!(
                practice_id = practice_id,
                tax_year = tax_year_id,
                employees = report.employees_checked,
                drifting = report.drifting_employees().len(),
                "YTD figures drifted from finalized entries"
            );
        }

        Ok(report)
    }
}
