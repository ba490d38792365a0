use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::money::round_cents;
use crate::modules::taxes::models::{SdlRates, UifRates};

/// UIF contribution for one employee and period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UifContribution {
    /// Withheld from the employee's pay
    pub employee: Decimal,
    /// Paid by the employer on top of remuneration
    pub employer: Decimal,
}

impl UifContribution {
    pub fn total(&self) -> Decimal {
        self.employee + self.employer
    }
}

/// Computes the statutory contributions that sit beside PAYE.
///
/// Rates and caps come from the tax year configuration so a rate change is
/// a new table, not a code change.
pub struct StatutoryCalculator;

impl StatutoryCalculator {
    /// UIF for a month of remuneration.
    ///
    /// Exempt employees contribute nothing on either side. Otherwise each
    /// party pays `min(gross * rate, monthly_cap)`; employer and employee
    /// amounts use the same capped formula.
    pub fn compute_uif(gross_monthly: Decimal, is_exempt: bool, rates: &UifRates) -> UifContribution {
        if is_exempt || gross_monthly <= Decimal::ZERO {
            return UifContribution::default();
        }

        let capped = |rate: Decimal| round_cents(gross_monthly * rate).min(rates.monthly_cap);

        UifContribution {
            employee: capped(rates.employee_rate),
            employer: capped(rates.employer_rate),
        }
    }

    /// Skills Development Levy: employer-only, uncapped
    pub fn compute_sdl(gross_monthly: Decimal, rates: &SdlRates, employer_exempt: bool) -> Decimal {
        if employer_exempt || gross_monthly <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        round_cents(gross_monthly * rates.rate)
    }
}
