//
// symreg-gp - genetic programming for symbolic regression
//
// File description:
//   Library root: genetic programming for symbolic regression and
//   symbolic feature construction over a linearized (pointer-free)
//   prefix-order expression tree.
//

pub mod config;
pub mod dataset;
pub mod error;
pub mod evolution;
pub mod fitness;
pub mod function;
pub mod operators;
pub mod program;
pub mod regressor;
pub mod rng;
pub mod token;
pub mod transformer;

pub use config::{EstimatorKind, ParsimonyCoefficient, SymbolicConfig};
pub use error::{GpError, GpResult};
pub use program::{InitMethod, Program};
pub use regressor::{FittedRegressor, SymbolicRegressor};
pub use transformer::{FittedTransformer, SymbolicTransformer};
