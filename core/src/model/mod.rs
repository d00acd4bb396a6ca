//! Spatial count models: basis, nested model specs, P-IRLS fitting, variance
//! propagation, prediction and posterior sampling.

pub mod basis;
pub mod data;
pub mod family;
pub mod fit;
pub mod formula;
pub mod mcmc;
pub mod predict;
pub mod varprop;

pub use basis::{BSplineAxis, SpatialBasis};
pub use data::ModelData;
pub use family::Family;
pub use fit::{FitOptions, FittedModel, LambdaChoice, PenalizedIrls, SpatialModelFitter};
pub use formula::ModelSpec;
pub use mcmc::{CoefficientDraws, MetropolisHastings, PosteriorSampler, SamplerConfig};
pub use predict::{abundance_from, density_surface, predict_abundance, prediction_matrix};
pub use varprop::propagate_detection_variance;
