pub mod models;
pub mod repositories;
pub mod services;

pub use models::{AgeBand, TaxBracket, TaxYear};
pub use repositories::TaxTableRegistry;
pub use services::{StatutoryCalculator, TaxCalculator, UifContribution};
