pub mod statutory_calculator;
pub mod tax_calculator;

pub use statutory_calculator::{StatutoryCalculator, UifContribution};
pub use tax_calculator::TaxCalculator;
