pub mod models;
pub mod repositories;

pub use models::{BankingDetails, Compensation, EmployeeRecord, Employer, PayFrequency, UifExemption};
pub use repositories::{EmployeeDirectory, MySqlEmployeeDirectory};
