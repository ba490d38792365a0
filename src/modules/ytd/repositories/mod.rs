pub mod ytd_repository;

pub use ytd_repository::{MySqlYtdRepository, YtdRepository};
