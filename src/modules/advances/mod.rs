pub mod models;
pub mod repositories;
pub mod services;

pub use models::{AdvanceStatus, PayAdvance};
pub use repositories::{AdvanceRepository, MySqlAdvanceRepository};
pub use services::AdvanceService;
