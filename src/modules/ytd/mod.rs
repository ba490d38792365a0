pub mod models;
pub mod repositories;
pub mod services;

pub use models::{FigureDrift, YtdDriftReport, YtdFigures};
pub use repositories::{MySqlYtdRepository, YtdRepository};
pub use services::{YtdAggregator, YtdService};
