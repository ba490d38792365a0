pub mod ytd_figures;

pub use ytd_figures::{FigureDrift, YtdDriftReport, YtdFigures};
