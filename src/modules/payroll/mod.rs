pub mod models;
pub mod repositories;
pub mod services;

pub use models::{
    AdditionKind, Contributor, EntryWarning, LineItem, PayrollAddition, PayrollEntry, PayrollRun,
    RunKey, RunStatus, RunTotals,
};
pub use repositories::{MySqlPayrollRepository, PayrollRepository};
pub use services::{EntryCalculator, GenerationOutcome, PayrollService};
