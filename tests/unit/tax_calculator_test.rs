// Property-based tests for PAYE calculation
//
// - Annual liability is never negative and never decreases with income
// - Monthly allocation sums exactly to the annual liability
// - Irregular payments are taxed by the annualised-difference method
//
// Uses proptest with the built-in 2024/2025 table

use std::sync::Arc;

use practice_payroll::modules::taxes::{AgeBand, TaxCalculator, TaxTableRegistry, TaxYear};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn table() -> Arc<TaxYear> {
    TaxTableRegistry::with_builtin()
        .unwrap()
        .get("2024/2025")
        .unwrap()
}

fn band() -> impl Strategy<Value = AgeBand> {
    prop_oneof![
        Just(AgeBand::Under65),
        Just(AgeBand::From65),
        Just(AgeBand::From75),
    ]
}

#[test]
fn test_known_annual_liability() {
    let tax_year = table();

    // 237 100 * 18% + (360 000 - 237 100) * 26% - 17 235
    assert_eq!(
        TaxCalculator::compute_annual_paye(dec!(360000), AgeBand::Under65, &tax_year),
        dec!(57397.00)
    );
    assert_eq!(
        TaxCalculator::compute_annual_paye(dec!(360000), AgeBand::From65, &tax_year),
        dec!(47953.00)
    );
    assert_eq!(
        TaxCalculator::compute_annual_paye(dec!(360000), AgeBand::From75, &tax_year),
        dec!(44808.00)
    );
}

#[test]
fn test_below_threshold_is_zero() {
    let tax_year = table();
    assert_eq!(
        TaxCalculator::compute_annual_paye(dec!(95749.99), AgeBand::Under65, &tax_year),
        Decimal::ZERO
    );
    assert_eq!(
        TaxCalculator::compute_annual_paye(dec!(148000), AgeBand::From65, &tax_year),
        Decimal::ZERO
    );
    assert_eq!(
        TaxCalculator::compute_annual_paye(dec!(-1000), AgeBand::Under65, &tax_year),
        Decimal::ZERO
    );
}

#[test]
fn test_monthly_allocation_of_known_liability() {
    let months: Vec<Decimal> = (1..=12).map(|k| TaxCalculator::monthly_paye(dec!(57397), k)).collect();

    assert_eq!(months[0], dec!(4783.08));
    assert_eq!(months[1], dec!(4783.09));
    assert_eq!(months.iter().copied().sum::<Decimal>(), dec!(57397.00));
}

#[test]
fn test_top_bracket() {
    let tax_year = table();
    let tax = TaxCalculator::bracket_tax(dec!(2000000), &tax_year);
    let below = TaxCalculator::bracket_tax(dec!(1817000), &tax_year);
    assert_eq!(tax - below, dec!(183000) * dec!(0.45));
}

#[test]
fn test_retirement_deduction_limits() {
    let tax_year = table();

    // 27.5% of remuneration
    assert_eq!(
        TaxCalculator::retirement_deduction(dec!(200000), dec!(400000), &tax_year),
        dec!(110000.00)
    );
    // Annual cap
    assert_eq!(
        TaxCalculator::retirement_deduction(dec!(500000), dec!(2000000), &tax_year),
        dec!(350000.00)
    );
    // Contribution below both limits is fully deductible
    assert_eq!(
        TaxCalculator::retirement_deduction(dec!(27000), dec!(360000), &tax_year),
        dec!(27000.00)
    );
}

proptest! {
    #[test]
    fn test_annual_paye_is_non_negative(income in 0u64..5_000_000u64, age_band in band()) {
        let tax_year = table();
        let paye = TaxCalculator::compute_annual_paye(Decimal::from(income), age_band, &tax_year);
        prop_assert!(paye >= Decimal::ZERO);
        prop_assert_eq!(paye, paye.round_dp(2));
    }

    #[test]
    fn test_annual_paye_is_monotonic(
        income in 0u64..3_000_000u64,
        raise in 1u64..500_000u64,
        age_band in band(),
    ) {
        let tax_year = table();
        let lower = TaxCalculator::compute_annual_paye(Decimal::from(income), age_band, &tax_year);
        let higher =
            TaxCalculator::compute_annual_paye(Decimal::from(income + raise), age_band, &tax_year);
        prop_assert!(higher >= lower, "{} -> {} vs {} -> {}", income, lower, income + raise, higher);
    }

    #[test]
    fn test_older_bands_never_pay_more(income in 0u64..3_000_000u64) {
        let tax_year = table();
        let income = Decimal::from(income);
        let under_65 = TaxCalculator::compute_annual_paye(income, AgeBand::Under65, &tax_year);
        let from_65 = TaxCalculator::compute_annual_paye(income, AgeBand::From65, &tax_year);
        let from_75 = TaxCalculator::compute_annual_paye(income, AgeBand::From75, &tax_year);
        prop_assert!(from_65 <= under_65);
        prop_assert!(from_75 <= from_65);
    }

    #[test]
    fn test_monthly_paye_sums_to_annual(cents in 0i64..100_000_000i64) {
        let annual = Decimal::new(cents, 2);
        let months: Vec<Decimal> = (1..=12).map(|k| TaxCalculator::monthly_paye(annual, k)).collect();

        prop_assert_eq!(months.iter().copied().sum::<Decimal>(), annual);
        let even = annual / Decimal::from(12);
        for month in months {
            prop_assert!((month - even).abs() <= dec!(0.01), "{} vs {}", month, even);
        }
    }

    #[test]
    fn test_irregular_paye_is_the_difference(
        regular in 0u64..2_000_000u64,
        bonus in 1u64..500_000u64,
        age_band in band(),
    ) {
        let tax_year = table();
        let regular = Decimal::from(regular);
        let bonus = Decimal::from(bonus);

        let irregular = TaxCalculator::irregular_paye(regular, bonus, age_band, &tax_year);
        let with = TaxCalculator::compute_annual_paye(regular + bonus, age_band, &tax_year);
        let without = TaxCalculator::compute_annual_paye(regular, age_band, &tax_year);

        prop_assert!(irregular >= Decimal::ZERO);
        prop_assert_eq!(irregular, with - without);
        // Never more than the top marginal rate
        prop_assert!(irregular <= bonus * dec!(0.45));
    }
}
