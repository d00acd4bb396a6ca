pub mod matrix;
pub mod optim;
pub mod stats;

pub use matrix::MatrixHelper;
pub use optim::{nelder_mead, numerical_hessian, Minimum, NelderMeadOptions};
pub use stats::StatsHelper;
