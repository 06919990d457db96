//
// symreg-gp - genetic programming for symbolic regression
//
// File description:
//   Module: shared regressor/transformer configuration and validation.
//

use crate::error::{GpError, GpResult};
use crate::fitness::Metric;
use crate::function::FunctionSet;
use crate::program::InitMethod;

/// Parsimony coefficient: either a fixed scalar or the per-generation
/// covariance-based `'auto'` scheme of Poli & McPhee.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ParsimonyCoefficient {
    Fixed(f64),
    Auto,
}

/// Full configuration shared by `SymbolicRegressor` and `SymbolicTransformer`.
/// Construction never fails — `validate()` performs every configuration
/// check, called explicitly by `fit` (mirroring sklearn's "validate at fit
/// time" convention rather than failing eagerly in a constructor).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SymbolicConfig {
    pub population_size: usize,
    pub generations: usize,
    pub tournament_size: usize,

    pub p_crossover: f64,
    pub p_subtree_mutation: f64,
    pub p_hoist_mutation: f64,
    pub p_point_mutation: f64,
    pub p_point_replace: f64,

    pub init_depth: (usize, usize),
    pub init_method: String,
    pub function_set: Vec<String>,
    pub trigonometric: bool,
    pub const_range: (f64, f64),
    pub metric: String,
    pub parsimony_coefficient: ParsimonyCoefficient,

    pub bootstrap: bool,
    pub max_samples: f64,
    pub hall_of_fame: usize,
    pub n_components: usize,

    pub n_jobs: usize,
    pub random_state: u64,
    pub verbose: u8,
}

impl Default for SymbolicConfig {
    fn default() -> Self {
        SymbolicConfig {
            population_size: 1000,
            generations: 20,
            tournament_size: 20,
            p_crossover: 0.9,
            p_subtree_mutation: 0.01,
            p_hoist_mutation: 0.01,
            p_point_mutation: 0.01,
            p_point_replace: 0.05,
            init_depth: (2, 6),
            init_method: "half and half".to_string(),
            function_set: FunctionSet::default_set(),
            trigonometric: false,
            const_range: (-1.0, 1.0),
            metric: "mean absolute error".to_string(),
            parsimony_coefficient: ParsimonyCoefficient::Fixed(0.001),
            bootstrap: false,
            max_samples: 1.0,
            hall_of_fame: 100,
            n_components: 10,
            n_jobs: 1,
            random_state: 0,
            verbose: 0,
        }
    }
}

/// Which family of metric names is acceptable for a given estimator flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorKind {
    Regressor,
    Transformer,
}

impl SymbolicConfig {
    pub fn validate(&self, kind: EstimatorKind) -> GpResult<()> {
        let (min_d, max_d) = self.init_depth;
        if min_d > max_d {
            return Err(GpError::Configuration(format!(
                "init_depth min ({}) must be <= max ({})",
                min_d, max_d
            )));
        }

        let (c_lo, c_hi) = self.const_range;
        if c_lo > c_hi {
            return Err(GpError::Configuration(format!(
                "const_range min ({}) must be <= max ({})",
                c_lo, c_hi
            )));
        }

        let prob_sum =
            self.p_crossover + self.p_subtree_mutation + self.p_hoist_mutation + self.p_point_mutation;
        if prob_sum > 1.0 + 1e-9 {
            return Err(GpError::Configuration(format!(
                "sum of operator probabilities ({:.6}) exceeds 1.0",
                prob_sum
            )));
        }
        if [
            self.p_crossover,
            self.p_subtree_mutation,
            self.p_hoist_mutation,
            self.p_point_mutation,
            self.p_point_replace,
        ]
        .iter()
        .any(|p| !(0.0..=1.0).contains(p))
        {
            return Err(GpError::Configuration(
                "operator probabilities must lie in [0, 1]".to_string(),
            ));
        }

        InitMethod::parse(&self.init_method)?;

        let metric = Metric::parse(&self.metric)?;
        match kind {
            EstimatorKind::Regressor if metric.greater_is_better() => {
                return Err(GpError::Configuration(format!(
                    "metric '{}' is not valid for a regressor",
                    self.metric
                )))
            }
            EstimatorKind::Transformer if !metric.greater_is_better() => {
                return Err(GpError::Configuration(format!(
                    "metric '{}' is not valid for a transformer",
                    self.metric
                )))
            }
            _ => {}
        }

        if self.population_size == 0 {
            return Err(GpError::Configuration(
                "population_size must be > 0".to_string(),
            ));
        }
        if self.tournament_size == 0 || self.tournament_size > self.population_size {
            return Err(GpError::Configuration(
                "tournament_size must be in [1, population_size]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.max_samples) || self.max_samples <= 0.0 {
            return Err(GpError::Configuration(
                "max_samples must be in (0, 1]".to_string(),
            ));
        }

        if kind == EstimatorKind::Transformer {
            if self.hall_of_fame > self.population_size {
                return Err(GpError::Configuration(
                    "hall_of_fame must be <= population_size".to_string(),
                ));
            }
            if self.n_components > self.hall_of_fame {
                return Err(GpError::Configuration(
                    "n_components must be <= hall_of_fame".to_string(),
                ));
            }
        }

        FunctionSet::new(&self.function_set, self.trigonometric)?;

        Ok(())
    }

    pub fn function_set(&self) -> GpResult<FunctionSet> {
        FunctionSet::new(&self.function_set, self.trigonometric)
    }

    pub fn init_method(&self) -> InitMethod {
        InitMethod::parse(&self.init_method).expect("validated by SymbolicConfig::validate")
    }

    pub fn metric(&self) -> Metric {
        Metric::parse(&self.metric).expect("validated by SymbolicConfig::validate")
    }
}
