// Employee master data consumed by the payroll engine.
//
// These records are owned and mutated by the HR side of the application.
// Payroll only reads them and snapshots what it used into each entry.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::money::{round_cents, validate_amount};
use crate::core::{AppError, Result};

/// How often the contracted salary is paid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayFrequency {
    #[default]
    Monthly,
    Fortnightly,
    Weekly,
}

impl PayFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Fortnightly => "fortnightly",
            Self::Weekly => "weekly",
        }
    }

    /// Convert a per-period amount to its monthly equivalent
    pub fn monthly_equivalent(&self, amount: Decimal) -> Decimal {
        match self {
            Self::Monthly => amount,
            Self::Fortnightly => round_cents(amount * Decimal::from(26) / Decimal::from(12)),
            Self::Weekly => round_cents(amount * Decimal::from(52) / Decimal::from(12)),
        }
    }
}

impl std::fmt::Display for PayFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for PayFrequency {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "monthly" => Ok(Self::Monthly),
            "fortnightly" => Ok(Self::Fortnightly),
            "weekly" => Ok(Self::Weekly),
            _ => Err(format!("Invalid pay frequency: {}", value)),
        }
    }
}

/// Reason an employee is exempt from UIF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UifExemption {
    /// Works fewer than 24 hours a month
    UnderTwentyFourHours,
    /// Learner under a registered learnership
    Learnership,
    /// Foreign national leaving at the end of the contract
    ForeignContract,
    PublicServant,
}

impl UifExemption {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnderTwentyFourHours => "under_24_hours",
            Self::Learnership => "learnership",
            Self::ForeignContract => "foreign_contract",
            Self::PublicServant => "public_servant",
        }
    }
}

impl TryFrom<String> for UifExemption {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "under_24_hours" => Ok(Self::UnderTwentyFourHours),
            "learnership" => Ok(Self::Learnership),
            "foreign_contract" => Ok(Self::ForeignContract),
            "public_servant" => Ok(Self::PublicServant),
            _ => Err(format!("Invalid UIF exemption: {}", value)),
        }
    }
}

/// A fixed amount withheld every period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringDeduction {
    pub label: String,
    pub amount: Decimal,
}

/// Compensation terms as configured by HR
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Compensation {
    /// Contracted gross per pay period; `None` keeps the employee out of runs
    pub gross_salary: Option<Decimal>,
    pub pay_frequency: PayFrequency,
    pub uif_exemption: Option<UifExemption>,
    /// Retirement fund contribution as a fraction of gross (e.g. 0.075)
    pub pension_rate: Decimal,
    /// Fixed monthly medical aid contribution
    pub medical_aid: Decimal,
    pub other_deductions: Vec<RecurringDeduction>,
}

impl Compensation {
    /// Monthly gross after frequency conversion
    pub fn monthly_gross(&self) -> Option<Decimal> {
        self.gross_salary
            .map(|gross| self.pay_frequency.monthly_equivalent(gross))
    }

    pub fn is_uif_exempt(&self) -> bool {
        self.uif_exemption.is_some()
    }

    pub fn other_deductions_total(&self) -> Decimal {
        self.other_deductions.iter().map(|d| d.amount).sum()
    }

    /// Reject configurations the engine cannot compute from: negative or
    /// sub-cent amounts, and pension rates outside 0..=1
    pub fn validate(&self) -> Result<()> {
        if let Some(gross) = self.gross_salary {
            validate_amount("Gross salary", gross)?;
        }
        if self.pension_rate < Decimal::ZERO || self.pension_rate > Decimal::ONE {
            return Err(AppError::validation(format!(
                "Pension rate must be between 0 and 1, got {}",
                self.pension_rate
            )));
        }
        validate_amount("Medical aid amount", self.medical_aid)?;
        for deduction in &self.other_deductions {
            validate_amount(&format!("Deduction '{}'", deduction.label), deduction.amount)?;
        }
        Ok(())
    }
}

/// Bank account for salary payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankingDetails {
    pub bank_name: String,
    pub account_holder: String,
    pub account_number: String,
    pub branch_code: String,
}

impl BankingDetails {
    /// Problems that would block payment, empty when the details are usable
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.bank_name.trim().is_empty() {
            problems.push("bank name is missing".to_string());
        }
        if self.account_holder.trim().is_empty() {
            problems.push("account holder is missing".to_string());
        }
        let number = self.account_number.trim();
        if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
            problems.push("account number must be digits".to_string());
        }
        let branch = self.branch_code.trim();
        if branch.len() != 6 || !branch.chars().all(|c| c.is_ascii_digit()) {
            problems.push("branch code must be 6 digits".to_string());
        }
        problems
    }

    pub fn is_valid(&self) -> bool {
        self.problems().is_empty()
    }

    /// Account number with all but the last four digits hidden
    pub fn masked_account_number(&self) -> String {
        let digits: Vec<char> = self.account_number.trim().chars().collect();
        let hidden = digits.len().saturating_sub(4);
        digits
            .iter()
            .enumerate()
            .map(|(i, c)| if i < hidden { '*' } else { *c })
            .collect()
    }
}

/// Employee as read from the HR directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub id: String,
    pub practice_id: String,
    pub full_name: String,
    /// National identity number
    pub id_number: Option<String>,
    /// Income tax reference number
    pub tax_reference: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub active: bool,
    pub compensation: Compensation,
    pub banking: Option<BankingDetails>,
}

impl EmployeeRecord {
    /// Active with a configured salary
    pub fn is_payable(&self) -> bool {
        self.active && self.compensation.gross_salary.is_some()
    }
}

/// Employer registration details for statutory filings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employer {
    pub practice_id: String,
    pub trading_name: String,
    pub paye_reference: Option<String>,
    pub uif_reference: Option<String>,
    pub sdl_reference: Option<String>,
    /// Employers below the SDL payroll threshold do not pay the levy
    pub sdl_exempt: bool,
}
