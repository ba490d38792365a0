use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::core::{AppError, Result};
use crate::modules::payroll::models::{PayrollEntry, PayrollRun, RunStatus};
use crate::modules::ytd::models::YtdFigures;

/// Pure YTD arithmetic; persistence happens in the repositories
pub struct YtdAggregator;

impl YtdAggregator {
    /// Fold a run that is about to be processed into the existing YTD rows.
    ///
    /// Returns one row per employee in the run, creating rows that do not
    /// exist yet. A row whose `last_run_id` is this run already holds its
    /// figures, so applying again is refused.
    pub fn apply_run(
        run: &PayrollRun,
        entries: &[PayrollEntry],
        existing: Vec<YtdFigures>,
        at: DateTime<Utc>,
    ) -> Result<Vec<YtdFigures>> {
        if run.status != RunStatus::Draft {
            return Err(AppError::invalid_state(format!(
                "YTD figures are applied once, when run {} leaves draft; run is {}",
                run.id, run.status
            )));
        }

        let mut rows: BTreeMap<String, YtdFigures> = existing
            .into_iter()
            .filter(|row| row.tax_year_id == run.tax_year_id)
            .map(|row| (row.employee_id.clone(), row))
            .collect();

        let mut updated = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.run_id != run.id {
                return Err(AppError::consistency(format!(
                    "Entry {} belongs to run {}, not {}",
                    entry.id, entry.run_id, run.id
                )));
            }

            let mut row = rows.remove(&entry.employee_id).unwrap_or_else(|| {
                YtdFigures::empty(&entry.employee_id, &run.practice_id, &run.tax_year_id)
            });
            if row.last_run_id.as_deref() == Some(run.id.as_str()) {
                return Err(AppError::invalid_state(format!(
                    "Run {} was already applied to YTD figures of employee {}",
                    run.id, entry.employee_id
                )));
            }

            row.absorb(entry);
            row.updated_at = Some(at);
            updated.push(row);
        }

        Ok(updated)
    }

    /// Rebuild one employee's figures from finalized entries only
    pub fn reconstruct<'a>(
        employee_id: &str,
        practice_id: &str,
        tax_year_id: &str,
        finalized: impl IntoIterator<Item = &'a PayrollEntry>,
    ) -> YtdFigures {
        let mut figures = YtdFigures::empty(employee_id, practice_id, tax_year_id);
        for entry in finalized.into_iter().filter(|e| e.employee_id == employee_id) {
            figures.absorb(entry);
        }
        figures
    }

    /// Compare a cached row with its reconstruction; never corrects either
    pub fn verify(cached: Option<&YtdFigures>, reconstructed: &YtdFigures) -> Result<()> {
        let empty;
        let cached = match cached {
            Some(row) => row,
            None => {
                empty = YtdFigures::empty(
                    &reconstructed.employee_id,
                    &reconstructed.practice_id,
                    &reconstructed.tax_year_id,
                );
                &empty
            }
        };

        let drift = cached.diff(reconstructed);
        if drift.is_empty() {
            return Ok(());
        }

        let detail: Vec<String> = drift
            .iter()
            .map(|d| format!("{} cached {} vs entries {}", d.figure, d.cached, d.reconstructed))
            .collect();
        Err(AppError::consistency(format!(
            "YTD figures of employee {} for {} drifted: {}",
            reconstructed.employee_id,
            reconstructed.tax_year_id,
            detail.join("; ")
        )))
    }
}
