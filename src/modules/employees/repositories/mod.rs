pub mod employee_repository;

pub use employee_repository::{EmployeeDirectory, MySqlEmployeeDirectory};
