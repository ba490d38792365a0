pub mod certificate;
pub mod declaration;
pub mod payslip;
pub mod reconciliation;

pub use certificate::TaxCertificate;
pub use declaration::{DeclarationRow, MonthlyDeclaration, StatutoryTotals};
pub use payslip::{PayslipData, PayslipLine};
pub use reconciliation::{AnnualReconciliation, Discrepancy, MonthSummary};
