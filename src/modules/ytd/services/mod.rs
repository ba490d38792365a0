pub mod ytd_aggregator;
pub mod ytd_service;

pub use ytd_aggregator::YtdAggregator;
pub use ytd_service::YtdService;
