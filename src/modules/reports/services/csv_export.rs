//! Flat-file exports of the statutory reports.
//!
//! Column order is fixed. Amounts carry exactly two fraction digits and
//! dates are ISO 8601.

use std::io::Write;

use csv::Writer;

use crate::core::money::format_decimal;
use crate::core::period::{format_iso8601, format_iso_date};
use crate::core::{AppError, Result};
use crate::modules::reports::models::{
    AnnualReconciliation, MonthlyDeclaration, StatutoryTotals, TaxCertificate,
};

pub const DECLARATION_HEADER: [&str; 11] = [
    "period",
    "employee_id",
    "full_name",
    "tax_reference",
    "gross",
    "additions",
    "paye",
    "employee_uif",
    "employer_uif",
    "sdl",
    "liability",
];

pub const RECONCILIATION_HEADER: [&str; 10] = [
    "row",
    "status",
    "employees",
    "gross",
    "additions",
    "paye",
    "employee_uif",
    "employer_uif",
    "sdl",
    "liability",
];

pub const CERTIFICATE_HEADER: [&str; 24] = [
    "certificate_number",
    "tax_year",
    "period_start",
    "period_end",
    "employer_name",
    "paye_reference",
    "employee_id",
    "full_name",
    "id_number",
    "tax_reference",
    "date_of_birth",
    "gross_remuneration",
    "irregular_payments",
    "total_income",
    "retirement_contributions",
    "paye",
    "uif",
    "total_deductions",
    "net",
    "employer_uif",
    "employer_sdl",
    "periods",
    "masked_account_number",
    "issued_at",
];

pub fn write_declaration<W: Write>(writer: W, declaration: &MonthlyDeclaration) -> Result<()> {
    let mut csv = Writer::from_writer(writer);
    csv.write_record(DECLARATION_HEADER)?;

    let period = declaration.period.to_string();
    for row in &declaration.rows {
        csv.write_record([
            period.clone(),
            row.employee_id.clone(),
            row.full_name.clone(),
            row.tax_reference.clone().unwrap_or_default(),
            format_decimal(row.gross),
            format_decimal(row.additions),
            format_decimal(row.paye),
            format_decimal(row.employee_uif),
            format_decimal(row.employer_uif),
            format_decimal(row.sdl),
            format_decimal(row.liability()),
        ])?;
    }

    let totals = &declaration.totals;
    csv.write_record([
        period,
        "TOTAL".to_string(),
        String::new(),
        String::new(),
        format_decimal(totals.gross),
        format_decimal(totals.additions),
        format_decimal(totals.paye),
        format_decimal(totals.employee_uif),
        format_decimal(totals.employer_uif),
        format_decimal(totals.sdl),
        format_decimal(totals.liability()),
    ])?;

    csv.flush()?;
    Ok(())
}

fn totals_record(label: String, status: &str, totals: &StatutoryTotals) -> [String; 10] {
    [
        label,
        status.to_string(),
        totals.employee_count.to_string(),
        format_decimal(totals.gross),
        format_decimal(totals.additions),
        format_decimal(totals.paye),
        format_decimal(totals.employee_uif),
        format_decimal(totals.employer_uif),
        format_decimal(totals.sdl),
        format_decimal(totals.liability()),
    ]
}

/// One row per month, then the declared and YTD totals
pub fn write_reconciliation<W: Write>(writer: W, reconciliation: &AnnualReconciliation) -> Result<()> {
    let mut csv = Writer::from_writer(writer);
    csv.write_record(RECONCILIATION_HEADER)?;

    for month in &reconciliation.months {
        let status = month.run_status.map(|s| s.as_str()).unwrap_or("none");
        csv.write_record(totals_record(month.period.to_string(), status, &month.totals))?;
    }
    csv.write_record(totals_record("DECLARED".to_string(), "", &reconciliation.declared))?;
    csv.write_record(totals_record("YTD".to_string(), "", &reconciliation.ytd))?;

    csv.flush()?;
    Ok(())
}

pub fn write_certificate<W: Write>(writer: W, certificate: &TaxCertificate) -> Result<()> {
    let mut csv = Writer::from_writer(writer);
    csv.write_record(CERTIFICATE_HEADER)?;

    csv.write_record([
        certificate.certificate_number.clone(),
        certificate.tax_year_id.clone(),
        format_iso_date(certificate.period_start),
        format_iso_date(certificate.period_end),
        certificate.employer_name.clone(),
        certificate.paye_reference.clone().unwrap_or_default(),
        certificate.employee_id.clone(),
        certificate.full_name.clone(),
        certificate.id_number.clone().unwrap_or_default(),
        certificate.tax_reference.clone().unwrap_or_default(),
        certificate.date_of_birth.map(format_iso_date).unwrap_or_default(),
        format_decimal(certificate.gross_remuneration),
        format_decimal(certificate.irregular_payments),
        format_decimal(certificate.total_income),
        format_decimal(certificate.retirement_contributions),
        format_decimal(certificate.paye),
        format_decimal(certificate.uif),
        format_decimal(certificate.total_deductions),
        format_decimal(certificate.net),
        format_decimal(certificate.employer_uif),
        format_decimal(certificate.employer_sdl),
        certificate.periods.to_string(),
        certificate.masked_account_number.clone().unwrap_or_default(),
        format_iso8601(certificate.issued_at),
    ])?;

    csv.flush()?;
    Ok(())
}

fn into_string(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| AppError::internal(format!("CSV output is not UTF-8: {}", e)))
}

pub fn declaration_to_string(declaration: &MonthlyDeclaration) -> Result<String> {
    let mut buffer = Vec::new();
    write_declaration(&mut buffer, declaration)?;
    into_string(buffer)
}

pub fn reconciliation_to_string(reconciliation: &AnnualReconciliation) -> Result<String> {
    let mut buffer = Vec::new();
    write_reconciliation(&mut buffer, reconciliation)?;
    into_string(buffer)
}

pub fn certificate_to_string(certificate: &TaxCertificate) -> Result<String> {
    let mut buffer = Vec::new();
    write_certificate(&mut buffer, certificate)?;
    into_string(buffer)
}
