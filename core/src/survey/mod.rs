pub mod bundle;
pub mod grid;
pub mod observation;
pub mod segment;
pub mod track;

pub use bundle::SurveyBundle;
pub use grid::{density, AreaUnit, CellGeometry, GridCell, GridGeometryFile, PredictionGrid};
pub use observation::{Distance, Observation, PlatformObservation};
pub use segment::{PlatformSegment, Segment};
pub use track::{EqualAreaProjection, SurveyTrack, TrackCrs};
