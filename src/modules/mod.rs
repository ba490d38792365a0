pub mod advances;
pub mod audit;
pub mod employees;
pub mod payroll;
pub mod reports;
pub mod taxes;
pub mod ytd;
