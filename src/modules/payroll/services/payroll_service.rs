// Payroll run lifecycle: generate, irregular payments, process, pay, delete.
//
// Every state change for one (practice, period) is serialized by an
// in-process lock and, across processes, by the run's version guard in
// the repository. Processing also holds a (practice, tax year) lock since
// it folds into YTD rows shared by every month of the year; the guarded
// YTD and advance writes catch what the in-process locks cannot. Each
// operation ends in exactly one repository write.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};

use crate::core::{AppError, PayPeriod, Result};
use crate::modules::advances::models::PayAdvance;
use crate::modules::advances::repositories::AdvanceRepository;
use crate::modules::audit::models::AuditEvent;
use crate::modules::audit::services::AuditWriter;
use crate::modules::employees::repositories::EmployeeDirectory;
use crate::modules::payroll::models::{
    AdditionKind, AdvanceRecovery, EntryWarning, PayrollAddition, PayrollEntry, PayrollRun,
    RunKey,
};
use crate::modules::payroll::repositories::{
    DraftWrite, EntryWrite, PaidWrite, PayrollRepository, ProcessingWrite,
};
use crate::modules::payroll::services::{EntryCalculator, EntryInput, SkippedEmployee};
use crate::modules::taxes::repositories::TaxTableRegistry;
use crate::modules::ytd::repositories::YtdRepository;
use crate::modules::ytd::services::YtdAggregator;

/// Result of generating (or regenerating) a draft run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub run: PayrollRun,
    pub entries: Vec<PayrollEntry>,
    /// Employees left out, with the reason
    pub skipped: Vec<SkippedEmployee>,
}

impl GenerationOutcome {
    pub fn warning_count(&self) -> usize {
        self.entries.iter().map(|e| e.warnings.len()).sum()
    }
}

/// Validation warnings of one employee in a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeWarnings {
    pub employee_id: String,
    pub full_name: String,
    pub warnings: Vec<EntryWarning>,
    pub blocks_payslip: bool,
}

/// Orchestrates payroll runs
pub struct PayrollService {
    repository: Arc<dyn PayrollRepository>,
    directory: Arc<dyn EmployeeDirectory>,
    advances: Arc<dyn AdvanceRepository>,
    ytd: Arc<dyn YtdRepository>,
    tax_tables: Arc<TaxTableRegistry>,
    locks: Mutex<HashMap<RunKey, Arc<Mutex<()>>>>,
    /// Keyed by (practice id, tax year id)
    tax_year_locks: Mutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

impl PayrollService {
    pub fn new(
        repository: Arc<dyn PayrollRepository>,
        directory: Arc<dyn EmployeeDirectory>,
        advances: Arc<dyn AdvanceRepository>,
        ytd: Arc<dyn YtdRepository>,
        tax_tables: Arc<TaxTableRegistry>,
    ) -> Self {
        Self {
            repository,
            directory,
            advances,
            ytd,
            tax_tables,
            locks: Mutex::new(HashMap::new()),
            tax_year_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock(&self, key: &RunKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(key.clone()).or_default())
        };
        lock.lock_owned().await
    }

    async fn lock_tax_year(&self, practice_id: &str, tax_year_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.tax_year_locks.lock().await;
            let key = (practice_id.to_string(), tax_year_id.to_string());
            Arc::clone(locks.entry(key).or_default())
        };
        lock.lock_owned().await
    }

    /// Load a run by id and take its key lock, re-reading the run under the lock
    async fn lock_run(&self, run_id: &str) -> Result<(OwnedMutexGuard<()>, PayrollRun)> {
        let run = self.get_run(run_id).await?;
        let guard = self.lock(&run.key()).await;
        let run = self.get_run(run_id).await?;
        Ok((guard, run))
    }

    pub async fn get_run(&self, run_id: &str) -> Result<PayrollRun> {
        self.repository
            .find_run_by_id(run_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Payroll run {}", run_id)))
    }

    pub async fn find_run(&self, practice_id: &str, period: PayPeriod) -> Result<Option<PayrollRun>> {
        self.repository.find_run(practice_id, period).await
    }

    pub async fn entries(&self, run_id: &str) -> Result<Vec<PayrollEntry>> {
        self.repository.entries_for_run(run_id).await
    }

    /// Generate the draft run for a practice and month.
    ///
    /// Creates the run if absent, or replaces every entry of an existing
    /// draft. Irregular payments already captured on the draft are kept.
    /// Regenerating with unchanged inputs reproduces identical entries.
    ///
    /// # Errors
    /// * `Configuration` - no tax table covers the period, or no employer
    ///   registration; nothing is written
    /// * `InvalidState` - the run for the period is no longer a draft
    /// * `Conflict` - another writer changed the run concurrently
    pub async fn generate_run(&self, practice_id: &str, period: PayPeriod) -> Result<GenerationOutcome> {
        let key = RunKey {
            practice_id: practice_id.to_string(),
            period,
        };
        let _guard = self.lock(&key).await;

        let tax_year = self.tax_tables.for_period(period)?;
        let employer = self.directory.employer(practice_id).await?;

        let (mut run, previous) = match self.repository.find_run(practice_id, period).await? {
            Some(run) => {
                run.ensure_draft("regenerate")?;
                let previous = self.repository.entries_for_run(&run.id).await?;
                (run, previous)
            }
            None => (
                PayrollRun::new_draft(practice_id.to_string(), period, &tax_year)?,
                Vec::new(),
            ),
        };
        run.tax_year_id = tax_year.id.clone();
        run.tax_year_version = tax_year.version.clone();

        let mut carried: HashMap<String, Vec<PayrollAddition>> = previous
            .into_iter()
            .map(|entry| (entry.employee_id, entry.additions))
            .collect();

        let mut skipped = Vec::new();
        let mut inputs = Vec::new();
        for employee in self.directory.active_employees(practice_id).await? {
            if !employee.is_payable() {
                skipped.push(SkippedEmployee {
                    employee_id: employee.id.clone(),
                    reason: "No gross salary configured".to_string(),
                });
                continue;
            }
            let mut input = EntryInput::for_employee(&employee);
            input.additions = carried.remove(&employee.id).unwrap_or_default();
            inputs.push(input);
        }

        // Advances of employees in this run are recovered; holds by anyone else are released
        let advances = self.advances.eligible_for_run(practice_id, &run.id).await?;
        let mut recoveries: BTreeMap<String, Vec<AdvanceRecovery>> = BTreeMap::new();
        for advance in &advances {
            recoveries
                .entry(advance.employee_id.clone())
                .or_default()
                .push(AdvanceRecovery {
                    advance_id: advance.id.clone(),
                    amount: advance.amount,
                });
        }
        for input in &mut inputs {
            input.advances = recoveries.remove(&input.employee_id).unwrap_or_default();
        }

        let (entries, computation_skips) = {
            let run = run.clone();
            let tax_year = Arc::clone(&tax_year);
            tokio::task::spawn_blocking(move || {
                EntryCalculator::calculate_all(&run, &tax_year, &employer, inputs)
            })
            .await
            .map_err(|e| AppError::internal(format!("Entry computation panicked: {}", e)))??
        };
        skipped.extend(computation_skips);
        skipped.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));

        // Only advances whose holder changes are written; the write fails if
        // another run took one of them in the meantime
        let recovered: Vec<&str> = entries
            .iter()
            .flat_map(|e| e.trace.advances.iter().map(|a| a.advance_id.as_str()))
            .collect();
        let mut handed_over = Vec::new();
        for mut advance in advances {
            let held_by = advance.run_id.clone();
            if recovered.contains(&advance.id.as_str()) {
                advance.attach(&run.id)?;
            } else {
                advance.detach(&run.id);
            }
            if advance.run_id != held_by {
                handed_over.push(advance);
            }
        }

        let now = Utc::now();
        run.generated_at = now;
        run.recompute_totals(&entries)?;
        let audit = entries
            .iter()
            .map(|entry| AuditWriter::record(entry, AuditEvent::Calculated, now))
            .collect::<Result<Vec<_>>>()?;
        let expected_version = run.bump_version(now);

        self.repository
            .save_draft(&DraftWrite {
                run: run.clone(),
                expected_version,
                entries: entries.clone(),
                advances: handed_over,
                audit,
            })
            .await?;

        let outcome = GenerationOutcome {
            run,
            entries,
            skipped,
        };

        info!(
            run_id = outcome.run.id.as_str(),
            practice_id = practice_id,
            period = %period,
            tax_year = outcome.run.tax_year_id.as_str(),
            employees = outcome.entries.len(),
            skipped = outcome.skipped.len(),
            warnings = outcome.warning_count(),
            net = %outcome.run.totals.net,
            "Payroll run generated"
        );
        for skip in &outcome.skipped {
            warn!(
                run_id = outcome.run.id.as_str(),
                employee_id = skip.employee_id.as_str(),
                reason = skip.reason.as_str(),
                "Employee skipped from payroll run"
            );
        }

        Ok(outcome)
    }

    /// Add a bonus or other irregular payment to one entry of a draft run
    pub async fn add_irregular_payment(
        &self,
        run_id: &str,
        employee_id: &str,
        kind: AdditionKind,
        description: String,
        amount: Decimal,
    ) -> Result<PayrollEntry> {
        let (_guard, run) = self.lock_run(run_id).await?;
        run.ensure_draft("add an irregular payment to")?;

        let entries = self.repository.entries_for_run(run_id).await?;
        let entry = entries
            .iter()
            .find(|e| e.employee_id == employee_id)
            .ok_or_else(|| {
                AppError::not_found(format!("Employee {} in payroll run {}", employee_id, run_id))
            })?;

        let addition = PayrollAddition::new(entry.id.clone(), kind, description, amount)?;
        let mut additions = entry.additions.clone();
        additions.push(addition);

        let entry = self
            .replace_entry(run, entries, employee_id, additions)
            .await?;

        info!(
            run_id = run_id,
            employee_id = employee_id,
            kind = kind.as_str(),
            amount = %amount,
            "Irregular payment added"
        );
        Ok(entry)
    }

    /// Remove an irregular payment from a draft run
    pub async fn remove_irregular_payment(&self, run_id: &str, addition_id: &str) -> Result<PayrollEntry> {
        let (_guard, run) = self.lock_run(run_id).await?;
        run.ensure_draft("remove an irregular payment from")?;

        let entries = self.repository.entries_for_run(run_id).await?;
        let entry = entries
            .iter()
            .find(|e| e.additions.iter().any(|a| a.id == addition_id))
            .ok_or_else(|| {
                AppError::not_found(format!("Irregular payment {} in payroll run {}", addition_id, run_id))
            })?;

        let employee_id = entry.employee_id.clone();
        let additions = entry
            .additions
            .iter()
            .filter(|a| a.id != addition_id)
            .cloned()
            .collect();

        let entry = self
            .replace_entry(run, entries, &employee_id, additions)
            .await?;

        info!(
            run_id = run_id,
            employee_id = employee_id.as_str(),
            addition_id = addition_id,
            "Irregular payment removed"
        );
        Ok(entry)
    }

    /// Recompute one entry with a new set of additions and persist it with the run totals
    async fn replace_entry(
        &self,
        mut run: PayrollRun,
        mut entries: Vec<PayrollEntry>,
        employee_id: &str,
        additions: Vec<PayrollAddition>,
    ) -> Result<PayrollEntry> {
        let tax_year = self.tax_tables.get(&run.tax_year_id)?;
        let employer = self.directory.employer(&run.practice_id).await?;

        let position = entries
            .iter()
            .position(|e| e.employee_id == employee_id)
            .ok_or_else(|| AppError::not_found(format!("Employee {} in payroll run {}", employee_id, run.id)))?;
        let entry = EntryCalculator::recalculate(&run, &tax_year, &employer, &entries[position], additions)?;
        entries[position] = entry.clone();

        let now = Utc::now();
        run.recompute_totals(&entries)?;
        let audit = vec![AuditWriter::record(&entry, AuditEvent::Recalculated, now)?];
        let expected_version = run.bump_version(now);

        self.repository
            .save_entry(&EntryWrite {
                run,
                expected_version,
                entry: entry.clone(),
                audit,
            })
            .await?;

        Ok(entry)
    }

    /// Lock a draft run: verify totals, then update YTD and write audit rows
    /// in one transaction. On any failure the run stays a draft.
    pub async fn process_run(&self, run_id: &str) -> Result<PayrollRun> {
        let (_guard, mut run) = self.lock_run(run_id).await?;
        run.ensure_draft("process")?;

        let entries = self.repository.entries_for_run(run_id).await?;
        if entries.is_empty() {
            return Err(AppError::validation(format!(
                "Payroll run {} has no entries to process",
                run_id
            )));
        }
        for entry in &entries {
            entry.check_invariants()?;
        }
        if let Err(e) = run.verify_totals(&entries) {
            warn!(run_id = run_id, error = %e, "Payroll run totals do not match entries");
            return Err(e);
        }

        // Held until the commit: the YTD rows are read here and replaced there
        let _tax_year_guard = self.lock_tax_year(&run.practice_id, &run.tax_year_id).await;
        let employee_ids: Vec<String> = entries.iter().map(|e| e.employee_id.clone()).collect();
        let existing = self.ytd.find_many(&run.tax_year_id, &employee_ids).await?;

        let now = Utc::now();
        let ytd = YtdAggregator::apply_run(&run, &entries, existing, now)?;
        let audit = entries
            .iter()
            .map(|entry| AuditWriter::record(entry, AuditEvent::Processed, now))
            .collect::<Result<Vec<_>>>()?;

        run.mark_processed(now)?;
        let expected_version = run.bump_version(now);

        self.repository
            .commit_processing(&ProcessingWrite {
                run: run.clone(),
                expected_version,
                ytd,
                audit,
            })
            .await?;

        info!(
            run_id = run_id,
            practice_id = run.practice_id.as_str(),
            period = %run.period,
            employees = entries.len(),
            paye = %run.totals.paye,
            net = %run.totals.net,
            "Payroll run processed"
        );

        Ok(run)
    }

    /// Mark a processed run paid and its held advances deducted
    pub async fn mark_paid(&self, run_id: &str) -> Result<PayrollRun> {
        let (_guard, mut run) = self.lock_run(run_id).await?;

        let now = Utc::now();
        run.mark_paid(now)?;

        let entries = self.repository.entries_for_run(run_id).await?;
        let recovered: Vec<&str> = entries
            .iter()
            .flat_map(|e| e.trace.advances.iter().map(|a| a.advance_id.as_str()))
            .collect();

        let mut advances = self.advances.for_run(run_id).await?;
        for advance in &mut advances {
            if !recovered.contains(&advance.id.as_str()) {
                return Err(AppError::consistency(format!(
                    "Pay advance {} is held by run {} but no entry recovers it",
                    advance.id, run_id
                )));
            }
            advance.mark_deducted(run_id, now)?;
        }

        let expected_version = run.bump_version(now);
        self.repository
            .commit_paid(&PaidWrite {
                run: run.clone(),
                expected_version,
                advances: advances.clone(),
            })
            .await?;

        info!(
            run_id = run_id,
            practice_id = run.practice_id.as_str(),
            advances_deducted = advances.len(),
            "Payroll run marked paid"
        );

        Ok(run)
    }

    /// Delete a draft run and release the advances it held
    pub async fn delete_draft(&self, run_id: &str) -> Result<()> {
        let (_guard, run) = self.lock_run(run_id).await?;
        run.ensure_draft("delete")?;

        let mut advances: Vec<PayAdvance> = self.advances.for_run(run_id).await?;
        for advance in &mut advances {
            advance.detach(run_id);
        }

        self.repository.delete_draft(&run, &advances).await?;

        info!(
            run_id = run_id,
            practice_id = run.practice_id.as_str(),
            period = %run.period,
            advances_released = advances.len(),
            "Draft payroll run deleted"
        );
        Ok(())
    }

    /// Per-employee validation warnings, for correction before processing
    pub async fn run_warnings(&self, run_id: &str) -> Result<Vec<EmployeeWarnings>> {
        let entries = self.repository.entries_for_run(run_id).await?;
        Ok(entries
            .into_iter()
            .filter(|e| !e.warnings.is_empty())
            .map(|e| EmployeeWarnings {
                blocks_payslip: e.blocks_payslip(),
                employee_id: e.employee_id,
                full_name: e.snapshot.full_name,
                warnings: e.warnings,
            })
            .collect())
    }
}
