pub mod models;
pub mod repositories;
pub mod services;

pub use models::{AuditEvent, AuditRecord};
pub use repositories::{AuditRepository, MySqlAuditRepository};
pub use services::AuditWriter;
