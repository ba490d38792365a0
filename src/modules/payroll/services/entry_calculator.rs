use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::money::round_cents;
use crate::core::{AppError, Result};
use crate::modules::employees::models::{EmployeeRecord, Employer};
use crate::modules::payroll::models::{
    AdvanceRecovery, CalculationTrace, EmployeeSnapshot, EntryWarning, PayrollAddition,
    PayrollEntry, PayrollRun,
};
use crate::modules::taxes::models::{AgeBand, TaxYear};
use crate::modules::taxes::services::tax_calculator::PERIODS_PER_YEAR;
use crate::modules::taxes::services::{StatutoryCalculator, TaxCalculator};

/// Everything needed to compute one employee's entry
#[derive(Debug, Clone)]
pub struct EntryInput {
    pub employee_id: String,
    pub snapshot: EmployeeSnapshot,
    pub additions: Vec<PayrollAddition>,
    pub advances: Vec<AdvanceRecovery>,
}

impl EntryInput {
    pub fn for_employee(employee: &EmployeeRecord) -> Self {
        Self {
            employee_id: employee.id.clone(),
            snapshot: EmployeeSnapshot::from(employee),
            additions: Vec::new(),
            advances: Vec::new(),
        }
    }

    /// Rebuild the input an existing entry was computed from
    pub fn from_entry(entry: &PayrollEntry) -> Self {
        Self {
            employee_id: entry.employee_id.clone(),
            snapshot: entry.snapshot.clone(),
            additions: entry.additions.clone(),
            advances: entry.trace.advances.clone(),
        }
    }
}

/// Employee left out of a run, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEmployee {
    pub employee_id: String,
    pub reason: String,
}

/// Computes payroll entries.
///
/// Pure and deterministic: the same run, table, employer and input always
/// produce an identical entry, including its id.
pub struct EntryCalculator;

impl EntryCalculator {
    /// Compute one entry
    pub fn calculate(
        run: &PayrollRun,
        tax_year: &TaxYear,
        employer: &Employer,
        input: EntryInput,
    ) -> Result<PayrollEntry> {
        Self::ensure_table(run, tax_year)?;

        let compensation = &input.snapshot.compensation;
        compensation.validate()?;
        let monthly_gross = compensation.monthly_gross().ok_or_else(|| {
            AppError::validation(format!("Employee {} has no gross salary", input.employee_id))
        })?;

        let mut warnings = Vec::new();

        let age_band = match input.snapshot.date_of_birth {
            Some(dob) => AgeBand::for_tax_year(dob, tax_year),
            None => {
                warnings.push(EntryWarning::MissingDateOfBirth);
                AgeBand::Under65
            }
        };

        // Regular remuneration, annualised for the bracket table
        let periods = Decimal::from(PERIODS_PER_YEAR);
        let pension_amount = round_cents(monthly_gross * compensation.pension_rate);
        let annual_remuneration = monthly_gross * periods;
        let annual_pension_contribution = pension_amount * periods;
        let deductible_retirement = TaxCalculator::retirement_deduction(
            annual_pension_contribution,
            annual_remuneration,
            tax_year,
        );
        let annual_taxable_income = annual_remuneration - deductible_retirement;
        let annual_paye =
            TaxCalculator::compute_annual_paye(annual_taxable_income, age_band, tax_year);
        let tax_period = run.period.tax_year_period();
        let regular_paye = TaxCalculator::monthly_paye(annual_paye, tax_period);

        // Irregular payments are taxed in full in the period they are paid
        let irregular_income: Decimal = input.additions.iter().map(|a| a.amount).sum();
        let irregular_paye = TaxCalculator::irregular_paye(
            annual_taxable_income,
            irregular_income,
            age_band,
            tax_year,
        );
        let paye_amount = regular_paye + irregular_paye;

        let statutory_remuneration = monthly_gross + irregular_income;
        let uif = StatutoryCalculator::compute_uif(
            statutory_remuneration,
            compensation.is_uif_exempt(),
            &tax_year.uif,
        );
        let employer_sdl =
            StatutoryCalculator::compute_sdl(statutory_remuneration, &tax_year.sdl, employer.sdl_exempt);

        let medical_aid_amount = compensation.medical_aid;
        let other_deductions = compensation.other_deductions_total();
        let pay_advance_amount: Decimal = input.advances.iter().map(|a| a.amount).sum();

        let total_deductions = paye_amount
            + uif.employee
            + pension_amount
            + medical_aid_amount
            + other_deductions
            + pay_advance_amount;
        let net_salary = monthly_gross + irregular_income - total_deductions;

        match &input.snapshot.banking {
            None => warnings.push(EntryWarning::MissingBankingDetails),
            Some(banking) => {
                let problems = banking.problems();
                if !problems.is_empty() {
                    warnings.push(EntryWarning::InvalidBankingDetails { problems });
                }
            }
        }
        if input.snapshot.tax_reference.as_deref().map_or(true, |r| r.trim().is_empty()) {
            warnings.push(EntryWarning::MissingTaxReference);
        }
        if net_salary <= Decimal::ZERO {
            warnings.push(EntryWarning::NonPositiveNet { net: net_salary });
        }

        let id = PayrollEntry::id_for(&run.id, &input.employee_id);
        let additions = input
            .additions
            .into_iter()
            .map(|mut a| {
                a.entry_id = id.clone();
                a
            })
            .collect();

        let entry = PayrollEntry {
            id,
            run_id: run.id.clone(),
            employee_id: input.employee_id,
            gross_salary: monthly_gross,
            additions,
            paye_amount,
            uif_amount: uif.employee,
            pension_amount,
            medical_aid_amount,
            other_deductions,
            pay_advance_amount,
            total_deductions,
            net_salary,
            employer_uif: uif.employer,
            employer_sdl,
            snapshot: input.snapshot,
            trace: CalculationTrace {
                tax_year_id: tax_year.id.clone(),
                tax_year_version: tax_year.version.clone(),
                age_band,
                tax_period,
                monthly_gross,
                annual_remuneration,
                annual_pension_contribution,
                deductible_retirement,
                annual_taxable_income,
                annual_paye,
                regular_paye,
                irregular_income,
                irregular_paye,
                statutory_remuneration,
                advances: input.advances,
            },
            warnings,
        };

        entry.check_invariants()?;

        debug!(
            entry_id = entry.id.as_str(),
            employee_id = entry.employee_id.as_str(),
            gross = %entry.gross_salary,
            paye = %entry.paye_amount,
            net = %entry.net_salary,
            "Computed payroll entry"
        );

        Ok(entry)
    }

    /// The run must be computed with the exact table it was opened on
    pub fn ensure_table(run: &PayrollRun, tax_year: &TaxYear) -> Result<()> {
        if run.tax_year_id != tax_year.id || run.tax_year_version != tax_year.version {
            return Err(AppError::configuration(format!(
                "Run {} was opened on tax table {} ({}) but {} ({}) was supplied",
                run.id, run.tax_year_id, run.tax_year_version, tax_year.id, tax_year.version
            )));
        }
        Ok(())
    }

    /// Recompute an entry from its own snapshot with a new set of additions
    pub fn recalculate(
        run: &PayrollRun,
        tax_year: &TaxYear,
        employer: &Employer,
        entry: &PayrollEntry,
        additions: Vec<PayrollAddition>,
    ) -> Result<PayrollEntry> {
        let mut input = EntryInput::from_entry(entry);
        input.additions = additions;
        Self::calculate(run, tax_year, employer, input)
    }

    /// Compute entries for many employees in parallel.
    ///
    /// Employees are independent: one failing employee is skipped and
    /// reported without affecting the others. Output is ordered by
    /// employee id. A table mismatch fails the whole call.
    pub fn calculate_all(
        run: &PayrollRun,
        tax_year: &TaxYear,
        employer: &Employer,
        inputs: Vec<EntryInput>,
    ) -> Result<(Vec<PayrollEntry>, Vec<SkippedEmployee>)> {
        Self::ensure_table(run, tax_year)?;

        let results: Vec<(String, Result<PayrollEntry>)> = inputs
            .into_par_iter()
            .map(|input| {
                let employee_id = input.employee_id.clone();
                (employee_id, Self::calculate(run, tax_year, employer, input))
            })
            .collect();

        let mut entries = Vec::with_capacity(results.len());
        let mut skipped = Vec::new();
        for (employee_id, result) in results {
            match result {
                Ok(entry) => entries.push(entry),
                Err(e) => skipped.push(SkippedEmployee {
                    employee_id,
                    reason: e.to_string(),
                }),
            }
        }

        entries.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));
        skipped.sort_by(|a, b| a.employee_id.cmp(&b.employee_id));
        Ok((entries, skipped))
    }
}
