pub mod payroll_repository;

pub use payroll_repository::{
    DraftWrite, EntryWrite, MySqlPayrollRepository, PaidWrite, PayrollRepository, ProcessingWrite,
};
