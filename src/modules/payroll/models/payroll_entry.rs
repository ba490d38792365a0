use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::line_item::{Contributor, LineItem};
use crate::core::money::validate_amount;
use crate::core::{AppError, Result};
use crate::modules::employees::models::{BankingDetails, Compensation, EmployeeRecord};
use crate::modules::taxes::models::AgeBand;

/// Category of an ad hoc payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdditionKind {
    Bonus,
    Overtime,
    Commission,
    Other,
}

impl AdditionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bonus => "bonus",
            Self::Overtime => "overtime",
            Self::Commission => "commission",
            Self::Other => "other",
        }
    }
}

impl TryFrom<String> for AdditionKind {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "bonus" => Ok(Self::Bonus),
            "overtime" => Ok(Self::Overtime),
            "commission" => Ok(Self::Commission),
            "other" => Ok(Self::Other),
            _ => Err(format!("Invalid addition kind: {}", value)),
        }
    }
}

/// An irregular payment (bonus, overtime) added to one entry of a draft run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollAddition {
    pub id: String,
    pub entry_id: String,
    pub kind: AdditionKind,
    pub description: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl PayrollAddition {
    pub fn new(
        entry_id: String,
        kind: AdditionKind,
        description: String,
        amount: Decimal,
    ) -> Result<Self> {
        validate_amount("Irregular payment", amount)?;
        if amount == Decimal::ZERO {
            return Err(AppError::validation("Irregular payment must be positive"));
        }
        if description.trim().is_empty() {
            return Err(AppError::validation("Irregular payment needs a description"));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            entry_id,
            kind,
            description,
            amount,
            created_at: Utc::now(),
        })
    }
}

/// Per-employee problem that does not stop the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum EntryWarning {
    MissingBankingDetails,
    InvalidBankingDetails { problems: Vec<String> },
    NonPositiveNet { net: Decimal },
    /// Rebates fall back to the under-65 band
    MissingDateOfBirth,
    MissingTaxReference,
}

impl EntryWarning {
    /// Whether the payslip cannot be delivered until the warning is fixed
    pub fn blocks_payslip(&self) -> bool {
        matches!(
            self,
            EntryWarning::MissingBankingDetails | EntryWarning::InvalidBankingDetails { .. }
        )
    }

    pub fn message(&self) -> String {
        match self {
            EntryWarning::MissingBankingDetails => "No banking details captured".to_string(),
            EntryWarning::InvalidBankingDetails { problems } => {
                format!("Banking details incomplete: {}", problems.join(", "))
            }
            EntryWarning::NonPositiveNet { net } => format!("Net pay is {}", net),
            EntryWarning::MissingDateOfBirth => {
                "No date of birth; under-65 rebates applied".to_string()
            }
            EntryWarning::MissingTaxReference => "No income tax reference number".to_string(),
        }
    }
}

/// Employee data as used for one calculation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeSnapshot {
    pub full_name: String,
    pub id_number: Option<String>,
    pub tax_reference: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub compensation: Compensation,
    pub banking: Option<BankingDetails>,
}

impl From<&EmployeeRecord> for EmployeeSnapshot {
    fn from(employee: &EmployeeRecord) -> Self {
        Self {
            full_name: employee.full_name.clone(),
            id_number: employee.id_number.clone(),
            tax_reference: employee.tax_reference.clone(),
            date_of_birth: employee.date_of_birth,
            compensation: employee.compensation.clone(),
            banking: employee.banking.clone(),
        }
    }
}

/// Pay advance pulled into an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceRecovery {
    pub advance_id: String,
    pub amount: Decimal,
}

/// Every intermediate value behind an entry's figures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalculationTrace {
    pub tax_year_id: String,
    pub tax_year_version: String,
    pub age_band: AgeBand,
    /// Position within the tax year (March = 1)
    pub tax_period: u32,
    pub monthly_gross: Decimal,
    pub annual_remuneration: Decimal,
    pub annual_pension_contribution: Decimal,
    pub deductible_retirement: Decimal,
    pub annual_taxable_income: Decimal,
    pub annual_paye: Decimal,
    pub regular_paye: Decimal,
    pub irregular_income: Decimal,
    pub irregular_paye: Decimal,
    /// Remuneration UIF and SDL were levied on
    pub statutory_remuneration: Decimal,
    pub advances: Vec<AdvanceRecovery>,
}

/// One employee's computed pay for a run
///
/// `net_salary = gross_salary + additions - total_deductions` and
/// `total_deductions = paye + uif + pension + medical aid + other + pay advance`
/// hold for every entry the engine produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayrollEntry {
    pub id: String,
    pub run_id: String,
    pub employee_id: String,
    pub gross_salary: Decimal,
    pub additions: Vec<PayrollAddition>,
    pub paye_amount: Decimal,
    pub uif_amount: Decimal,
    pub pension_amount: Decimal,
    pub medical_aid_amount: Decimal,
    pub other_deductions: Decimal,
    pub pay_advance_amount: Decimal,
    pub total_deductions: Decimal,
    pub net_salary: Decimal,
    pub employer_uif: Decimal,
    pub employer_sdl: Decimal,
    pub snapshot: EmployeeSnapshot,
    pub trace: CalculationTrace,
    pub warnings: Vec<EntryWarning>,
}

impl PayrollEntry {
    /// Stable id for the (run, employee) pair, so regeneration reproduces it
    pub fn id_for(run_id: &str, employee_id: &str) -> String {
        let name = format!("payroll-entry:{}:{}", run_id, employee_id);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }

    pub fn additions_total(&self) -> Decimal {
        self.additions.iter().map(|a| a.amount).sum()
    }

    /// Gross salary plus irregular payments
    pub fn total_income(&self) -> Decimal {
        self.gross_salary + self.additions_total()
    }

    pub fn employer_contributions(&self) -> Decimal {
        self.employer_uif + self.employer_sdl
    }

    pub fn blocks_payslip(&self) -> bool {
        self.warnings.iter().any(EntryWarning::blocks_payslip)
    }

    /// Itemised view of the entry
    pub fn line_items(&self) -> Vec<LineItem> {
        let mut items: Vec<LineItem> = self
            .additions
            .iter()
            .map(|a| LineItem::Addition {
                addition_kind: a.kind,
                description: a.description.clone(),
                amount: a.amount,
            })
            .collect();

        items.push(LineItem::Paye {
            amount: self.paye_amount,
        });
        items.push(LineItem::Uif {
            amount: self.uif_amount,
            contributor: Contributor::Employee,
        });
        if self.pension_amount > Decimal::ZERO {
            items.push(LineItem::Pension {
                amount: self.pension_amount,
            });
        }
        if self.medical_aid_amount > Decimal::ZERO {
            items.push(LineItem::MedicalAid {
                amount: self.medical_aid_amount,
            });
        }
        items.extend(
            self.snapshot
                .compensation
                .other_deductions
                .iter()
                .map(|d| LineItem::Other {
                    label: d.label.clone(),
                    amount: d.amount,
                }),
        );
        items.extend(self.trace.advances.iter().map(|a| LineItem::PayAdvance {
            advance_id: a.advance_id.clone(),
            amount: a.amount,
        }));
        items.push(LineItem::Uif {
            amount: self.employer_uif,
            contributor: Contributor::Employer,
        });
        items.push(LineItem::Sdl {
            amount: self.employer_sdl,
        });
        items
    }

    /// Check the arithmetic identities of the entry
    pub fn check_invariants(&self) -> Result<()> {
        let deductions = self.paye_amount
            + self.uif_amount
            + self.pension_amount
            + self.medical_aid_amount
            + self.other_deductions
            + self.pay_advance_amount;
        if deductions != self.total_deductions {
            return Err(AppError::consistency(format!(
                "Entry {} total deductions {} != sum of deductions {}",
                self.id, self.total_deductions, deductions
            )));
        }

        let net = self.total_income() - self.total_deductions;
        if net != self.net_salary {
            return Err(AppError::consistency(format!(
                "Entry {} net {} != gross + additions - deductions {}",
                self.id, self.net_salary, net
            )));
        }

        let itemised: Decimal = self
            .line_items()
            .iter()
            .filter(|item| item.is_deduction())
            .map(LineItem::amount)
            .sum();
        if itemised != self.total_deductions {
            return Err(AppError::consistency(format!(
                "Entry {} itemised deductions {} != total {}",
                self.id, itemised, self.total_deductions
            )));
        }

        Ok(())
    }
}
