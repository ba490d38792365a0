pub mod advance_service;

pub use advance_service::AdvanceService;
