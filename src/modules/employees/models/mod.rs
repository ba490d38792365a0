pub mod employee;

pub use employee::{
    BankingDetails, Compensation, EmployeeRecord, Employer, PayFrequency, RecurringDeduction,
    UifExemption,
};
