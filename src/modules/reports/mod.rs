pub mod models;
pub mod services;

pub use models::{AnnualReconciliation, MonthlyDeclaration, PayslipData, TaxCertificate};
pub use services::ReportService;
