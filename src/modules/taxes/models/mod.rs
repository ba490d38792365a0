pub mod tax_year;

pub use tax_year::{
    AgeBand, Rebates, RetirementDeduction, SdlRates, TaxBracket, TaxThresholds, TaxYear, UifRates,
};
