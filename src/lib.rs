//! Practice payroll compliance core
//!
//! Monthly payroll runs for South African practices: PAYE, UIF and SDL
//! calculation, year-to-date aggregation with an audit trail, and the
//! EMP201, EMP501 and IRP5 compliance reports.

pub mod config;
pub mod core;
pub mod modules;

// Re-export commonly used types
pub use modules::payroll;
pub use modules::reports;
pub use modules::taxes;
pub use modules::ytd;
