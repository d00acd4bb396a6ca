//! Choropleth figures for exported density surface results.

pub mod model;
pub mod palette;
pub mod render;

pub use model::{
    ModelReport, PlatformReport, ReportCell, ResultsReport, UncertaintyLayer, RESULTS_FILE,
};
pub use palette::ColourScale;
pub use render::{render_report, RenderOptions};
