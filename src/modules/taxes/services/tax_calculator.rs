use rust_decimal::Decimal;

use crate::core::money::round_cents;
use crate::modules::taxes::models::{AgeBand, TaxYear};

/// Months in a tax year
pub const PERIODS_PER_YEAR: u32 = 12;

/// Computes PAYE (employees' tax) from a published tax table.
///
/// Every function is a pure function of its arguments. The tax year is
/// always passed in explicitly; nothing here reads the clock.
pub struct TaxCalculator;

impl TaxCalculator {
    /// Tax on annual taxable income before rebates, summed band by band
    pub fn bracket_tax(annual_taxable_income: Decimal, tax_year: &TaxYear) -> Decimal {
        if annual_taxable_income <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let mut tax = Decimal::ZERO;
        for (i, bracket) in tax_year.brackets.iter().enumerate() {
            if annual_taxable_income <= bracket.lower_bound {
                break;
            }
            let upper = tax_year
                .brackets
                .get(i + 1)
                .map(|next| next.lower_bound.min(annual_taxable_income))
                .unwrap_or(annual_taxable_income);
            tax += (upper - bracket.lower_bound) * bracket.rate;
        }
        tax
    }

    /// Annual PAYE liability after rebates, rounded to the cent.
    ///
    /// Zero below the age band's tax threshold and never negative.
    pub fn compute_annual_paye(
        annual_taxable_income: Decimal,
        age_band: AgeBand,
        tax_year: &TaxYear,
    ) -> Decimal {
        if annual_taxable_income < tax_year.threshold_for(age_band) {
            return Decimal::ZERO;
        }

        let liability =
            Self::bracket_tax(annual_taxable_income, tax_year) - tax_year.rebate_for(age_band);
        round_cents(liability.max(Decimal::ZERO))
    }

    /// The monthly share of an annual liability for period `k` (1..=12).
    ///
    /// Each period receives `round(annual * k / 12) - round(annual * (k-1) / 12)`
    /// with round-half-up to the cent, so a period differs from
    /// `annual / 12` by at most one cent and twelve periods sum exactly to
    /// the annual figure.
    pub fn monthly_paye(annual_paye: Decimal, period: u32) -> Decimal {
        let k = period.clamp(1, PERIODS_PER_YEAR);
        let cumulative = |n: u32| {
            round_cents(annual_paye * Decimal::from(n) / Decimal::from(PERIODS_PER_YEAR))
        };
        cumulative(k) - cumulative(k - 1)
    }

    /// PAYE on an irregular payment using the annualised-difference method:
    /// tax on (regular + irregular) less tax on regular income alone.
    pub fn irregular_paye(
        annual_regular_taxable: Decimal,
        irregular_amount: Decimal,
        age_band: AgeBand,
        tax_year: &TaxYear,
    ) -> Decimal {
        if irregular_amount <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let with = Self::compute_annual_paye(
            annual_regular_taxable + irregular_amount,
            age_band,
            tax_year,
        );
        let without = Self::compute_annual_paye(annual_regular_taxable, age_band, tax_year);
        (with - without).max(Decimal::ZERO)
    }

    /// Deductible part of an annual retirement fund contribution
    pub fn retirement_deduction(
        annual_contribution: Decimal,
        annual_remuneration: Decimal,
        tax_year: &TaxYear,
    ) -> Decimal {
        let limit = (annual_remuneration * tax_year.retirement.rate)
            .min(tax_year.retirement.annual_cap)
            .max(Decimal::ZERO);
        round_cents(annual_contribution.max(Decimal::ZERO).min(limit))
    }
}
