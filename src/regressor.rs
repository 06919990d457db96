//
// symreg-gp - genetic programming for symbolic regression
//
// File description:
//   Module: `SymbolicRegressor`. Evolves a population toward the single
//   program with the best parsimony-adjusted fitness and predicts with it.
//

use log::info;

use crate::config::{EstimatorKind, SymbolicConfig};
use crate::dataset::{check_sample_weight, check_target, Dataset};
use crate::error::{GpError, GpResult};
use crate::evolution::{self, EvaluatedProgram, GenerationStats};
use crate::program::Program;

/// An unfitted regressor: holds configuration only.
#[derive(Debug, Clone)]
pub struct SymbolicRegressor {
    pub config: SymbolicConfig,
}

impl Default for SymbolicRegressor {
    fn default() -> Self {
        SymbolicRegressor {
            config: SymbolicConfig::default(),
        }
    }
}

impl SymbolicRegressor {
    pub fn new(config: SymbolicConfig) -> Self {
        SymbolicRegressor { config }
    }

    /// Runs the evolutionary search and returns the fitted model.
    pub fn fit(
        &self,
        x: &[Vec<f64>],
        y: &[f64],
        sample_weight: Option<&[f64]>,
    ) -> GpResult<FittedRegressor> {
        self.config.validate(EstimatorKind::Regressor)?;
        let data = Dataset::from_rows(x)?;
        check_target(data.n_samples(), y)?;
        let weight = match sample_weight {
            Some(w) => {
                check_sample_weight(data.n_samples(), w)?;
                w.to_vec()
            }
            None => vec![1.0; data.n_samples()],
        };

        let result = evolution::run(&self.config, EstimatorKind::Regressor, data.n_features(), &data, y, &weight)?;
        let greater_is_better = self.config.metric().greater_is_better();

        let last_gen = result.history.last().expect("at least one generation");
        let best = last_gen
            .iter()
            .max_by(|a, b| {
                let ord = a.fitness.partial_cmp(&b.fitness).unwrap();
                if greater_is_better {
                    ord
                } else {
                    ord.reverse()
                }
            })
            .expect("population is non-empty")
            .clone();

        info!(
            "fit complete: best program length={} raw_fitness={:.6}",
            best.program.length(),
            best.raw_fitness
        );

        Ok(FittedRegressor {
            config: self.config.clone(),
            best,
            stats: result.stats,
            n_features: data.n_features(),
        })
    }
}

/// A regressor after `fit`: the single best program plus run history.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FittedRegressor {
    config: SymbolicConfig,
    best: EvaluatedProgram,
    stats: Vec<GenerationStats>,
    n_features: usize,
}

impl FittedRegressor {
    pub fn program(&self) -> &Program {
        &self.best.program
    }

    pub fn raw_fitness(&self) -> f64 {
        self.best.raw_fitness
    }

    pub fn stats(&self) -> &[GenerationStats] {
        &self.stats
    }

    /// Evaluates the fitted program over `x`.
    pub fn predict(&self, x: &[Vec<f64>]) -> GpResult<Vec<f64>> {
        let data = Dataset::from_rows(x)?;
        if data.n_features() != self.n_features {
            return Err(GpError::Shape {
                expected: self.n_features,
                found: data.n_features(),
            });
        }
        Ok(self.best.program.execute(&data))
    }

    /// Negative mean absolute error by default, mirroring sklearn's
    /// `score()` convention of "higher is better".
    pub fn score(&self, x: &[Vec<f64>], y: &[f64]) -> GpResult<f64> {
        let pred = self.predict(x)?;
        check_target(pred.len(), y)?;
        let weight = vec![1.0; y.len()];
        let mae = crate::fitness::weighted_mae(&pred, y, &weight);
        Ok(-mae)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_dataset(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut x = Vec::with_capacity(n);
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let a = (i as f64) * 0.05 - 1.0;
            let b = ((i * 3) % 7) as f64 * 0.1;
            x.push(vec![a, b]);
            y.push(3.0 * a - b + 0.5);
        }
        (x, y)
    }

    fn small_regressor() -> SymbolicRegressor {
        let mut cfg = SymbolicConfig::default();
        cfg.population_size = 40;
        cfg.generations = 4;
        cfg.tournament_size = 5;
        SymbolicRegressor::new(cfg)
    }

    #[test]
    fn fit_then_predict_roundtrips_on_training_shape() {
        let (x, y) = linear_dataset(50);
        let reg = small_regressor();
        let fitted = reg.fit(&x, &y, None).unwrap();
        let preds = fitted.predict(&x).unwrap();
        assert_eq!(preds.len(), x.len());
        assert!(preds.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn predict_rejects_mismatched_feature_count() {
        let (x, y) = linear_dataset(30);
        let reg = small_regressor();
        let fitted = reg.fit(&x, &y, None).unwrap();
        let bad_x = vec![vec![1.0, 2.0, 3.0]];
        assert!(matches!(fitted.predict(&bad_x), Err(GpError::Shape { .. })));
    }

    #[test]
    fn score_is_nonpositive_negative_mae() {
        let (x, y) = linear_dataset(40);
        let reg = small_regressor();
        let fitted = reg.fit(&x, &y, None).unwrap();
        let score = fitted.score(&x, &y).unwrap();
        assert!(score <= 0.0);
    }

    #[test]
    fn sample_weight_must_match_sample_count() {
        let (x, y) = linear_dataset(10);
        let reg = small_regressor();
        let bad_weight = vec![1.0; 3];
        assert!(reg.fit(&x, &y, Some(&bad_weight)).is_err());
    }

    #[test]
    fn fitted_regressor_roundtrips_through_json() {
        let (x, y) = linear_dataset(30);
        let reg = small_regressor();
        let fitted = reg.fit(&x, &y, None).unwrap();

        let json = serde_json::to_string(&fitted).unwrap();
        let restored: FittedRegressor = serde_json::from_str(&json).unwrap();

        assert_eq!(fitted.program().tokens(), restored.program().tokens());
        assert_eq!(restored.predict(&x).unwrap(), fitted.predict(&x).unwrap());
    }

    #[test]
    fn fit_is_deterministic_for_a_fixed_seed() {
        let (x, y) = linear_dataset(40);
        let mut cfg = SymbolicConfig::default();
        cfg.population_size = 30;
        cfg.generations = 3;
        cfg.tournament_size = 5;
        cfg.random_state = 99;

        let reg_a = SymbolicRegressor::new(cfg.clone());
        let reg_b = SymbolicRegressor::new(cfg);
        let fitted_a = reg_a.fit(&x, &y, None).unwrap();
        let fitted_b = reg_b.fit(&x, &y, None).unwrap();
        assert_eq!(fitted_a.program().tokens(), fitted_b.program().tokens());
    }
}
