pub mod line_item;
pub mod payroll_entry;
pub mod payroll_run;

pub use line_item::{Contributor, LineItem};
pub use payroll_entry::{
    AdditionKind, AdvanceRecovery, CalculationTrace, EmployeeSnapshot, EntryWarning,
    PayrollAddition, PayrollEntry,
};
pub use payroll_run::{PayrollRun, RunKey, RunStatus, RunTotals};
