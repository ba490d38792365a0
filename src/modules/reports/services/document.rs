//! Plain-text renderings of the statutory reports, for printing or e-mail
//! bodies.
//!
//! Each report has a borrowing [`fmt::Display`] view so it can be written to
//! any formatter; the `render_*` functions collect that into a `String`.

use std::fmt;

use crate::core::money::format_amount;
use crate::core::period::format_iso_date;
use crate::modules::reports::models::{
    AnnualReconciliation, MonthlyDeclaration, PayslipData, TaxCertificate,
};

const RULE: &str = "------------------------------------------------------------";

fn line(f: &mut fmt::Formatter<'_>, label: &str, value: impl AsRef<str>) -> fmt::Result {
    writeln!(f, "{:<32}{:>28}", label, value.as_ref())
}

fn rule(f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "{}", RULE)
}

pub struct DeclarationDocument<'a>(pub &'a MonthlyDeclaration);

impl fmt::Display for DeclarationDocument<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let declaration = self.0;
        writeln!(f, "MONTHLY EMPLOYER DECLARATION (EMP201)")?;
        rule(f)?;
        line(f, "Employer", &declaration.employer_name)?;
        line(
            f,
            "PAYE reference",
            declaration.paye_reference.as_deref().unwrap_or("-"),
        )?;
        line(f, "Period", declaration.period.to_string())?;
        line(f, "Tax year", &declaration.tax_year_id)?;
        line(
            f,
            "Run status",
            declaration.run_status.map(|s| s.as_str()).unwrap_or("no run"),
        )?;
        rule(f)?;

        for row in &declaration.rows {
            writeln!(f, "{} ({})", row.full_name, row.employee_id)?;
            line(f, "  PAYE", format_amount(row.paye))?;
            line(f, "  UIF (employee)", format_amount(row.employee_uif))?;
            line(f, "  UIF (employer)", format_amount(row.employer_uif))?;
            line(f, "  SDL", format_amount(row.sdl))?;
        }

        let totals = &declaration.totals;
        rule(f)?;
        line(f, "Employees", totals.employee_count.to_string())?;
        line(f, "Total PAYE", format_amount(totals.paye))?;
        line(f, "Total UIF", format_amount(totals.employee_uif + totals.employer_uif))?;
        line(f, "Total SDL", format_amount(totals.sdl))?;
        line(f, "Amount payable", format_amount(totals.liability()))
    }
}

pub struct ReconciliationDocument<'a>(pub &'a AnnualReconciliation);

impl fmt::Display for ReconciliationDocument<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reconciliation = self.0;
        writeln!(f, "ANNUAL EMPLOYER RECONCILIATION (EMP501)")?;
        rule(f)?;
        line(f, "Employer", &reconciliation.employer_name)?;
        line(f, "Tax year", &reconciliation.tax_year_id)?;
        line(f, "Employees", reconciliation.employee_count.to_string())?;
        rule(f)?;

        for month in &reconciliation.months {
            line(
                f,
                &format!(
                    "{} [{}]",
                    month.period,
                    month.run_status.map(|s| s.as_str()).unwrap_or("none")
                ),
                format_amount(month.totals.liability()),
            )?;
        }

        rule(f)?;
        line(f, "Declared liability", format_amount(reconciliation.declared.liability()))?;
        line(f, "YTD liability", format_amount(reconciliation.ytd.liability()))?;

        if reconciliation.is_reconciled() {
            return writeln!(f, "Reconciled within {}", format_amount(reconciliation.tolerance));
        }
        writeln!(f, "DISCREPANCIES")?;
        for d in &reconciliation.discrepancies {
            let scope = d.employee_id.as_deref().unwrap_or("practice");
            line(f, &format!("  {} {}", scope, d.figure), format_amount(d.difference()))?;
        }
        Ok(())
    }
}

pub struct CertificateDocument<'a>(pub &'a TaxCertificate);

impl fmt::Display for CertificateDocument<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let certificate = self.0;
        writeln!(f, "EMPLOYEE TAX CERTIFICATE (IRP5)")?;
        rule(f)?;
        line(f, "Certificate", &certificate.certificate_number)?;
        line(f, "Tax year", &certificate.tax_year_id)?;
        line(
            f,
            "Period",
            format!(
                "{} to {}",
                format_iso_date(certificate.period_start),
                format_iso_date(certificate.period_end)
            ),
        )?;
        line(f, "Employer", &certificate.employer_name)?;
        line(
            f,
            "PAYE reference",
            certificate.paye_reference.as_deref().unwrap_or("-"),
        )?;
        rule(f)?;
        line(f, "Employee", &certificate.full_name)?;
        line(f, "ID number", certificate.id_number.as_deref().unwrap_or("-"))?;
        line(f, "Tax reference", certificate.tax_reference.as_deref().unwrap_or("-"))?;
        line(
            f,
            "Bank account",
            certificate.masked_account_number.as_deref().unwrap_or("-"),
        )?;
        rule(f)?;
        line(f, "Gross remuneration", format_amount(certificate.gross_remuneration))?;
        line(f, "Irregular payments", format_amount(certificate.irregular_payments))?;
        line(f, "Total income", format_amount(certificate.total_income))?;
        line(
            f,
            "Retirement contributions",
            format_amount(certificate.retirement_contributions),
        )?;
        line(f, "PAYE", format_amount(certificate.paye))?;
        line(f, "UIF", format_amount(certificate.uif))?;
        line(f, "Total deductions", format_amount(certificate.total_deductions))?;
        line(f, "Net pay", format_amount(certificate.net))?;
        line(f, "Pay periods", certificate.periods.to_string())
    }
}

pub struct PayslipDocument<'a>(pub &'a PayslipData);

impl fmt::Display for PayslipDocument<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let payslip = self.0;
        writeln!(f, "PAYSLIP {}", payslip.period)?;
        rule(f)?;
        line(f, "Employer", &payslip.employer_name)?;
        line(f, "Employee", &payslip.full_name)?;
        line(f, "Tax reference", payslip.tax_reference.as_deref().unwrap_or("-"))?;
        rule(f)?;
        line(f, "Basic salary", format_amount(payslip.basic_salary))?;
        for earning in &payslip.earnings {
            line(f, &earning.label, format_amount(earning.amount))?;
        }
        line(f, "Total income", format_amount(payslip.total_income))?;
        rule(f)?;
        for deduction in &payslip.deductions {
            line(f, &deduction.label, format_amount(deduction.amount))?;
        }
        line(f, "Total deductions", format_amount(payslip.total_deductions))?;
        rule(f)?;
        line(f, "NET PAY", format_amount(payslip.net_pay))?;

        if let Some(ytd) = &payslip.ytd {
            rule(f)?;
            line(f, "YTD income", format_amount(ytd.total_income()))?;
            line(f, "YTD PAYE", format_amount(ytd.paye))?;
            line(f, "YTD UIF", format_amount(ytd.uif))?;
            line(f, "YTD net", format_amount(ytd.net))?;
        }
        Ok(())
    }
}

pub fn render_declaration(declaration: &MonthlyDeclaration) -> String {
    DeclarationDocument(declaration).to_string()
}

pub fn render_reconciliation(reconciliation: &AnnualReconciliation) -> String {
    ReconciliationDocument(reconciliation).to_string()
}

pub fn render_certificate(certificate: &TaxCertificate) -> String {
    CertificateDocument(certificate).to_string()
}

pub fn render_payslip(payslip: &PayslipData) -> String {
    PayslipDocument(payslip).to_string()
}
