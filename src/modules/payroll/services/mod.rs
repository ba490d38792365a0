pub mod entry_calculator;
pub mod payroll_service;

pub use entry_calculator::{EntryCalculator, EntryInput, SkippedEmployee};
pub use payroll_service::{EmployeeWarnings, GenerationOutcome, PayrollService};
