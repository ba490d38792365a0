pub mod advance_repository;

pub use advance_repository::{AdvanceRepository, MySqlAdvanceRepository};
