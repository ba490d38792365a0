use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::core::{AppError, Result};
use crate::modules::audit::models::{AuditEvent, AuditRecord};
use crate::modules::payroll::models::{
    AdvanceRecovery, CalculationTrace, EmployeeSnapshot, EntryWarning, PayrollAddition,
    PayrollEntry,
};

#[derive(Serialize)]
struct AuditInputs<'a> {
    snapshot: &'a EmployeeSnapshot,
    additions: &'a [PayrollAddition],
    advances: &'a [AdvanceRecovery],
}

#[derive(Serialize)]
struct AuditOutputs {
    gross_salary: Decimal,
    additions: Decimal,
    paye_amount: Decimal,
    uif_amount: Decimal,
    pension_amount: Decimal,
    medical_aid_amount: Decimal,
    other_deductions: Decimal,
    pay_advance_amount: Decimal,
    total_deductions: Decimal,
    net_salary: Decimal,
    employer_uif: Decimal,
    employer_sdl: Decimal,
}

#[derive(Serialize)]
struct AuditIntermediates<'a> {
    trace: &'a CalculationTrace,
    outputs: AuditOutputs,
    warnings: &'a [EntryWarning],
}

/// Builds tamper-evident audit rows for computed entries
pub struct AuditWriter;

impl AuditWriter {
    /// Build the audit row for an entry.
    ///
    /// The row is not persisted here; it travels with the state change it
    /// justifies and is written in the same transaction.
    pub fn record(entry: &PayrollEntry, event: AuditEvent, at: DateTime<Utc>) -> Result<AuditRecord> {
        let inputs = serde_json::to_value(AuditInputs {
            snapshot: &entry.snapshot,
            additions: &entry.additions,
            advances: &entry.trace.advances,
        })?;
        let intermediates = serde_json::to_value(AuditIntermediates {
            trace: &entry.trace,
            outputs: AuditOutputs {
                gross_salary: entry.gross_salary,
                additions: entry.additions_total(),
                paye_amount: entry.paye_amount,
                uif_amount: entry.uif_amount,
                pension_amount: entry.pension_amount,
                medical_aid_amount: entry.medical_aid_amount,
                other_deductions: entry.other_deductions,
                pay_advance_amount: entry.pay_advance_amount,
                total_deductions: entry.total_deductions,
                net_salary: entry.net_salary,
                employer_uif: entry.employer_uif,
                employer_sdl: entry.employer_sdl,
            },
            warnings: &entry.warnings,
        })?;

        let mut record = AuditRecord {
            id: Uuid::new_v4().to_string(),
            run_id: entry.run_id.clone(),
            entry_id: entry.id.clone(),
            employee_id: entry.employee_id.clone(),
            event,
            tax_year_id: entry.trace.tax_year_id.clone(),
            tax_year_version: entry.trace.tax_year_version.clone(),
            inputs,
            intermediates,
            checksum: String::new(),
            // Stored with microsecond precision
            recorded_at: at.trunc_subsecs(6),
        };
        record.checksum = Self::checksum(&record)?;
        Ok(record)
    }

    /// Hex SHA-256 over every field except the checksum itself
    pub fn checksum(record: &AuditRecord) -> Result<String> {
        let inputs = serde_json::to_string(&record.inputs)?;
        let intermediates = serde_json::to_string(&record.intermediates)?;

        let mut hasher = Sha256::new();
        for part in [
            record.id.as_str(),
            record.run_id.as_str(),
            record.entry_id.as_str(),
            record.employee_id.as_str(),
            record.event.as_str(),
            record.tax_year_id.as_str(),
            record.tax_year_version.as_str(),
            inputs.as_str(),
            intermediates.as_str(),
            record
                .recorded_at
                .to_rfc3339_opts(SecondsFormat::Micros, true)
                .as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        Ok(hex::encode(hasher.finalize()))
    }

    /// Re-derive the checksum; a mismatch means the row was altered
    pub fn verify_checksum(record: &AuditRecord) -> Result<()> {
        let expected = Self::checksum(record)?;
        if expected != record.checksum {
            return Err(AppError::consistency(format!(
                "Audit record {} for entry {} failed checksum verification",
                record.id, record.entry_id
            )));
        }
        Ok(())
    }
}
