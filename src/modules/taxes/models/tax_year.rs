use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::period::parse_tax_year_start;
use crate::core::{AppError, PayPeriod, Result};

/// One band of the progressive income tax table
///
/// The band starts at `lower_bound` (annual taxable income) and runs up to
/// the next band's lower bound. Income inside the band is taxed at `rate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    pub lower_bound: Decimal,
    pub rate: Decimal,
}

/// Annual rebates deducted from the bracket tax
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rebates {
    /// All taxpayers
    pub primary: Decimal,
    /// Additional rebate from age 65
    pub secondary: Decimal,
    /// Additional rebate from age 75
    pub tertiary: Decimal,
}

/// Annual income below which no tax is payable, per age band
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxThresholds {
    pub under_65: Decimal,
    pub from_65: Decimal,
    pub from_75: Decimal,
}

/// Limits on the retirement fund contribution deductible from taxable income
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetirementDeduction {
    /// Share of remuneration that may be deducted (e.g. 0.275)
    pub rate: Decimal,
    /// Absolute annual limit
    pub annual_cap: Decimal,
}

/// Unemployment Insurance Fund rates effective for the tax year
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UifRates {
    pub employee_rate: Decimal,
    pub employer_rate: Decimal,
    /// Maximum monthly contribution per party
    pub monthly_cap: Decimal,
}

/// Skills Development Levy rate effective for the tax year
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdlRates {
    pub rate: Decimal,
}

/// A published tax year: bracket table, rebates and statutory rates bound to
/// a fixed twelve-month period.
///
/// Tables are immutable once published. `version` is a fingerprint of the
/// table contents and is recorded with every computed figure so historical
/// payroll can be reproduced against the exact table in force.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxYear {
    /// Identifier such as `2024/2025`
    pub id: String,
    pub starts_on: NaiveDate,
    pub ends_on: NaiveDate,
    pub brackets: Vec<TaxBracket>,
    pub rebates: Rebates,
    pub thresholds: TaxThresholds,
    pub retirement: RetirementDeduction,
    pub uif: UifRates,
    pub sdl: SdlRates,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

/// Age band used for rebate and threshold eligibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBand {
    Under65,
    From65,
    From75,
}

impl AgeBand {
    /// Age band for a person born on `date_of_birth`, measured on the last
    /// day of the tax year so eligibility is fixed for the whole year
    pub fn for_tax_year(date_of_birth: NaiveDate, tax_year: &TaxYear) -> Self {
        let age = age_on(date_of_birth, tax_year.ends_on);
        match age {
            a if a >= 75 => AgeBand::From75,
            a if a >= 65 => AgeBand::From65,
            _ => AgeBand::Under65,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgeBand::Under65 => "under_65",
            AgeBand::From65 => "from_65",
            AgeBand::From75 => "from_75",
        }
    }
}

fn age_on(date_of_birth: NaiveDate, on: NaiveDate) -> i32 {
    let mut age = on.year() - date_of_birth.year();
    if (on.month(), on.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age
}

impl TaxYear {
    /// Parse a tax table from YAML, validate it and stamp its version
    pub fn from_yaml(source: &str) -> Result<Self> {
        let tax_year: TaxYear = serde_yaml::from_str(source)?;
        tax_year.sealed()
    }

    /// Validate and stamp the content fingerprint
    pub fn sealed(mut self) -> Result<Self> {
        self.validate()?;
        self.version = self.fingerprint()?;
        Ok(self)
    }

    /// Check the table's structural rules
    pub fn validate(&self) -> Result<()> {
        let start = parse_tax_year_start(&self.id)
            .map_err(|e| AppError::configuration(e.to_string()))?;

        if self.starts_on.year() != start || self.ends_on.year() != start + 1 {
            return Err(AppError::configuration(format!(
                "Tax year {} dates {}..{} do not match its id",
                self.id, self.starts_on, self.ends_on
            )));
        }

        if self.starts_on >= self.ends_on {
            return Err(AppError::configuration(format!(
                "Tax year {} must start before it ends",
                self.id
            )));
        }

        let first = self.brackets.first().ok_or_else(|| {
            AppError::configuration(format!("Tax year {} has no brackets", self.id))
        })?;
        if first.lower_bound != Decimal::ZERO {
            return Err(AppError::configuration(format!(
                "Tax year {} first bracket must start at 0",
                self.id
            )));
        }

        for pair in self.brackets.windows(2) {
            if pair[1].lower_bound <= pair[0].lower_bound {
                return Err(AppError::configuration(format!(
                    "Tax year {} brackets must be strictly increasing ({} after {})",
                    self.id, pair[1].lower_bound, pair[0].lower_bound
                )));
            }
        }

        let rates = self
            .brackets
            .iter()
            .map(|b| b.rate)
            .chain([
                self.retirement.rate,
                self.uif.employee_rate,
                self.uif.employer_rate,
                self.sdl.rate,
            ]);
        for rate in rates {
            if rate < Decimal::ZERO || rate > Decimal::ONE {
                return Err(AppError::configuration(format!(
                    "Tax year {} has a rate outside 0..1: {}",
                    self.id, rate
                )));
            }
        }

        let amounts = [
            self.rebates.primary,
            self.rebates.secondary,
            self.rebates.tertiary,
            self.thresholds.under_65,
            self.thresholds.from_65,
            self.thresholds.from_75,
            self.retirement.annual_cap,
            self.uif.monthly_cap,
        ];
        if amounts.iter().any(|a| *a < Decimal::ZERO) {
            return Err(AppError::configuration(format!(
                "Tax year {} has a negative rebate, threshold or cap",
                self.id
            )));
        }

        Ok(())
    }

    /// SHA-256 over the canonical JSON form, excluding the version itself
    pub fn fingerprint(&self) -> Result<String> {
        let mut unversioned = self.clone();
        unversioned.version.clear();
        let canonical = serde_json::to_vec(&unversioned)?;
        let digest = Sha256::digest(&canonical);
        Ok(hex::encode(&digest[..8]))
    }

    /// Whether the pay period falls inside this tax year
    pub fn contains(&self, period: PayPeriod) -> bool {
        let day = period.first_day();
        day >= self.starts_on && day <= self.ends_on
    }

    /// Total rebate for the given age band
    pub fn rebate_for(&self, band: AgeBand) -> Decimal {
        match band {
            AgeBand::Under65 => self.rebates.primary,
            AgeBand::From65 => self.rebates.primary + self.rebates.secondary,
            AgeBand::From75 => {
                self.rebates.primary + self.rebates.secondary + self.rebates.tertiary
            }
        }
    }

    /// Tax threshold for the given age band
    pub fn threshold_for(&self, band: AgeBand) -> Decimal {
        match band {
            AgeBand::Under65 => self.thresholds.under_65,
            AgeBand::From65 => self.thresholds.from_65,
            AgeBand::From75 => self.thresholds.from_75,
        }
    }
}
