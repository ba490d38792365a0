use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::money::{one_cent, within_tolerance};
use crate::core::{AppError, PayPeriod, Result};
use crate::modules::employees::repositories::EmployeeDirectory;
use crate::modules::payroll::models::PayrollRun;
use crate::modules::payroll::repositories::PayrollRepository;
use crate::modules::reports::models::{
    AnnualReconciliation, DeclarationRow, Discrepancy, MonthSummary, MonthlyDeclaration,
    PayslipData, StatutoryTotals, TaxCertificate,
};
use crate::modules::ytd::repositories::YtdRepository;

/// Read-only projections of finalized payroll data into statutory reports
pub struct ReportService {
    payroll: Arc<dyn PayrollRepository>,
    ytd: Arc<dyn YtdRepository>,
    directory: Arc<dyn EmployeeDirectory>,
}

impl ReportService {
    pub fn new(
        payroll: Arc<dyn PayrollRepository>,
        ytd: Arc<dyn YtdRepository>,
        directory: Arc<dyn EmployeeDirectory>,
    ) -> Self {
        Self {
            payroll,
            ytd,
            directory,
        }
    }

    /// Declaration rows of a run, empty unless the run is processed or paid
    async fn declared_rows(&self, run: Option<&PayrollRun>) -> Result<Vec<DeclarationRow>> {
        match run {
            Some(run) if run.status.is_finalized() => {
                let entries = self.payroll.entries_for_run(&run.id).await?;
                Ok(entries.iter().map(DeclarationRow::from).collect())
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Generate the monthly employer declaration (EMP201)
    ///
    /// # Arguments
    /// * `practice_id` - Declaring practice
    /// * `period` - Month being declared
    ///
    /// # Returns
    /// One row per employee of the finalized run plus totals; empty when
    /// the month has no processed or paid run
    pub async fn monthly_declaration(&self, practice_id: &str, period: PayPeriod) -> Result<MonthlyDeclaration> {
        let employer = self.directory.employer(practice_id).await?;
        let run = self.payroll.find_run(practice_id, period).await?;
        let rows = self.declared_rows(run.as_ref()).await?;

        let declaration = MonthlyDeclaration {
            practice_id: practice_id.to_string(),
            employer_name: employer.trading_name,
            paye_reference: employer.paye_reference,
            period,
            tax_year_id: period.tax_year_id(),
            run_id: run.as_ref().map(|r| r.id.clone()),
            run_status: run.as_ref().map(|r| r.status),
            totals: StatutoryTotals::from_rows(&rows),
            rows,
            generated_at: Utc::now(),
        };

        if declaration.is_empty() {
            warn!(
                practice_id = practice_id,
                period = %period,
                run_status = ?declaration.run_status,
                "Monthly declaration has no finalized entries"
            );
        } else {
            info!(
                practice_id = practice_id,
                period = %period,
                employees = declaration.rows.len(),
                liability = %declaration.total_liability(),
                "Monthly declaration generated"
            );
        }

        Ok(declaration)
    }

    /// Reconcile the twelve monthly declarations of a tax year against the
    /// YTD figures (EMP501).
    ///
    /// Differences are reported per figure, both practice-wide (tolerance
    /// one cent per employee) and per employee (tolerance one cent).
    pub async fn annual_reconciliation(&self, practice_id: &str, tax_year_id: &str) -> Result<AnnualReconciliation> {
        let periods = PayPeriod::periods_of_tax_year(tax_year_id)?;
        let employer = self.directory.employer(practice_id).await?;
        let runs = self.payroll.runs_for_tax_year(practice_id, tax_year_id).await?;

        let mut months = Vec::with_capacity(periods.len());
        let mut declared = StatutoryTotals::default();
        let mut per_employee: BTreeMap<String, StatutoryTotals> = BTreeMap::new();
        for period in periods {
            let run = runs.iter().find(|r| r.period == period);
            let rows = self.declared_rows(run).await?;
            for row in &rows {
                per_employee
                    .entry(row.employee_id.clone())
                    .or_default()
                    .add_figures(&StatutoryTotals::from_rows(std::slice::from_ref(row)));
            }

            let totals = StatutoryTotals::from_rows(&rows);
            declared.add_figures(&totals);
            months.push(MonthSummary {
                period,
                run_status: run.map(|r| r.status),
                totals,
            });
        }
        declared.employee_count = per_employee.len() as u32;

        let ytd_rows = self.ytd.for_practice(practice_id, tax_year_id).await?;
        let ytd = StatutoryTotals::from_ytd(&ytd_rows);

        let employees: BTreeSet<&str> = per_employee
            .keys()
            .map(String::as_str)
            .chain(ytd_rows.iter().map(|r| r.employee_id.as_str()))
            .collect();
        let employee_count = employees.len() as u32;
        let tolerance = one_cent() * Decimal::from(employee_count);

        let mut discrepancies = compare(None, &declared, &ytd, tolerance);
        for employee_id in &employees {
            let declared_for = per_employee.get(*employee_id).copied().unwrap_or_default();
            let ytd_for = ytd_rows
                .iter()
                .find(|r| r.employee_id == *employee_id)
                .map(|r| StatutoryTotals::from_ytd(std::slice::from_ref(r)))
                .unwrap_or_default();
            discrepancies.extend(compare(Some(*employee_id), &declared_for, &ytd_for, one_cent()));
        }

        let reconciliation = AnnualReconciliation {
            practice_id: practice_id.to_string(),
            employer_name: employer.trading_name,
            tax_year_id: tax_year_id.to_string(),
            months,
            declared,
            ytd,
            employee_count,
            tolerance,
            discrepancies,
            generated_at: Utc::now(),
        };

        if reconciliation.is_reconciled() {
            info!(
                practice_id = practice_id,
                tax_year = tax_year_id,
                employees = employee_count,
                "Annual reconciliation balanced"
            );
        } else {
            warn!(
                practice_id = practice_id,
                tax_year = tax_year_id,
                discrepancies = reconciliation.discrepancies.len(),
                "Annual reconciliation has discrepancies"
            );
        }

        Ok(reconciliation)
    }

    /// Employee tax certificate (IRP5) built from the YTD figures
    pub async fn tax_certificate(
        &self,
        practice_id: &str,
        employee_id: &str,
        tax_year_id: &str,
    ) -> Result<TaxCertificate> {
        let periods = PayPeriod::periods_of_tax_year(tax_year_id)?;
        let (first, last) = match (periods.first(), periods.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(AppError::validation(format!("Invalid tax year id: {}", tax_year_id))),
        };

        let ytd = self
            .ytd
            .find(employee_id, tax_year_id)
            .await?
            .filter(|row| row.practice_id == practice_id)
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "YTD figures for employee {} in {}",
                    employee_id, tax_year_id
                ))
            })?;
        let employee = self
            .directory
            .find_employee(employee_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Employee {}", employee_id)))?;
        let employer = self.directory.employer(practice_id).await?;

        let name = format!("irp5:{}:{}:{}", practice_id, employee_id, tax_year_id);
        let certificate_number = Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string();

        let certificate = TaxCertificate {
            certificate_number,
            tax_year_id: tax_year_id.to_string(),
            period_start: first.first_day(),
            period_end: last.last_day(),
            employer_name: employer.trading_name,
            paye_reference: employer.paye_reference,
            employee_id: employee.id.clone(),
            full_name: employee.full_name.clone(),
            id_number: employee.id_number.clone(),
            tax_reference: employee.tax_reference.clone(),
            date_of_birth: employee.date_of_birth,
            bank_name: employee.banking.as_ref().map(|b| b.bank_name.clone()),
            masked_account_number: employee.banking.as_ref().map(|b| b.masked_account_number()),
            gross_remuneration: ytd.gross,
            irregular_payments: ytd.additions,
            total_income: ytd.total_income(),
            retirement_contributions: ytd.pension,
            paye: ytd.paye,
            uif: ytd.uif,
            total_deductions: ytd.total_deductions,
            net: ytd.net,
            employer_uif: ytd.employer_uif,
            employer_sdl: ytd.employer_sdl,
            periods: ytd.runs_applied,
            issued_at: Utc::now(),
        };

        info!(
            employee_id = employee_id,
            tax_year = tax_year_id,
            certificate = certificate.certificate_number.as_str(),
            "Tax certificate issued"
        );

        Ok(certificate)
    }

    /// Payslip data for one employee of a run
    pub async fn payslip(&self, run_id: &str, employee_id: &str) -> Result<PayslipData> {
        let run = self
            .payroll
            .find_run_by_id(run_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Payroll run {}", run_id)))?;
        let entry = self
            .payroll
            .entries_for_run(run_id)
            .await?
            .into_iter()
            .find(|e| e.employee_id == employee_id)
            .ok_or_else(|| {
                AppError::not_found(format!("Employee {} in payroll run {}", employee_id, run_id))
            })?;
        let employer = self.directory.employer(&run.practice_id).await?;
        let ytd = self.ytd.find(employee_id, &run.tax_year_id).await?;

        Ok(PayslipData::from_entry(
            &entry,
            run.period,
            &run.tax_year_id,
            run.status,
            &employer.trading_name,
            ytd,
        ))
    }
}

fn compare(
    employee_id: Option<&str>,
    declared: &StatutoryTotals,
    ytd: &StatutoryTotals,
    tolerance: Decimal,
) -> Vec<Discrepancy> {
    declared
        .figures()
        .into_iter()
        .zip(ytd.figures())
        .filter(|((_, d), (_, y))| !within_tolerance(*d, *y, tolerance))
        .map(|((figure, d), (_, y))| Discrepancy {
            employee_id: employee_id.map(str::to_string),
            figure: figure.to_string(),
            declared: d,
            ytd: y,
        })
        .collect()
}
