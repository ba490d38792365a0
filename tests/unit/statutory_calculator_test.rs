// Property-based tests for UIF and SDL
//
// - UIF is 1% per party, capped at the monthly ceiling
// - Exempt employees contribute nothing on either side
// - SDL is 1% of remuneration, employer only, uncapped

use practice_payroll::core::money::round_cents;
use practice_payroll::modules::taxes::{StatutoryCalculator, TaxTableRegistry, TaxYear};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn table() -> std::sync::Arc<TaxYear> {
    TaxTableRegistry::with_builtin()
        .unwrap()
        .get("2024/2025")
        .unwrap()
}

#[test]
fn test_uif_below_ceiling() {
    let tax_year = table();
    let uif = StatutoryCalculator::compute_uif(dec!(15000), false, &tax_year.uif);
    assert_eq!(uif.employee, dec!(150.00));
    assert_eq!(uif.employer, dec!(150.00));
    assert_eq!(uif.total(), dec!(300.00));
}

#[test]
fn test_uif_at_ceiling() {
    let tax_year = table();
    let uif = StatutoryCalculator::compute_uif(dec!(30000), false, &tax_year.uif);
    assert_eq!(uif.employee, dec!(177.12));
    assert_eq!(uif.employer, dec!(177.12));

    let exact = StatutoryCalculator::compute_uif(dec!(17712), false, &tax_year.uif);
    assert_eq!(exact.employee, dec!(177.12));
}

#[test]
fn test_uif_exempt() {
    let tax_year = table();
    let uif = StatutoryCalculator::compute_uif(dec!(30000), true, &tax_year.uif);
    assert_eq!(uif.employee, Decimal::ZERO);
    assert_eq!(uif.employer, Decimal::ZERO);
}

#[test]
fn test_sdl() {
    let tax_year = table();
    assert_eq!(StatutoryCalculator::compute_sdl(dec!(30000), &tax_year.sdl, false), dec!(300.00));
    assert_eq!(StatutoryCalculator::compute_sdl(dec!(30000), &tax_year.sdl, true), Decimal::ZERO);
    assert_eq!(StatutoryCalculator::compute_sdl(Decimal::ZERO, &tax_year.sdl, false), Decimal::ZERO);
}

proptest! {
    #[test]
    fn test_uif_never_exceeds_ceiling(cents in 0i64..10_000_000i64) {
        let tax_year = table();
        let gross = Decimal::new(cents, 2);
        let uif = StatutoryCalculator::compute_uif(gross, false, &tax_year.uif);

        prop_assert!(uif.employee <= dec!(177.12));
        prop_assert!(uif.employee >= Decimal::ZERO);
        prop_assert_eq!(uif.employee, uif.employer);
        prop_assert_eq!(uif.employee, round_cents(gross * dec!(0.01)).min(dec!(177.12)));
    }

    #[test]
    fn test_sdl_is_uncapped(cents in 0i64..100_000_000i64) {
        let tax_year = table();
        let gross = Decimal::new(cents, 2);
        let sdl = StatutoryCalculator::compute_sdl(gross, &tax_year.sdl, false);

        prop_assert_eq!(sdl, round_cents(gross * dec!(0.01)));
    }
}
