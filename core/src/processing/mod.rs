pub mod cv_bins;
pub mod posterior;
pub mod reshape;
pub mod summary;
pub mod surface;

pub use cv_bins::CvBins;
pub use posterior::{
    summarise_uncertainty, PredictionDraws, SubsetBlock, UncertaintyCell, UncertaintySurfaces,
};
pub use reshape::{duplicate_by_platform, single_platform, ReshapedSurvey};
pub use summary::{observed_vs_expected, render_table, CountComparison};
pub use surface::{
    combine, combined_and_difference, CellSurface, CellValue, SurfaceOp, UncertaintyMethod,
};
