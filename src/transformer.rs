//
// symreg-gp - genetic programming for symbolic regression
//
// File description:
//   Module: `SymbolicTransformer`. Evolves a population, keeps a
//   hall-of-fame of the fittest programs, then greedily selects
//   `n_components` of them that correlate with the target but not with
//   each other.
//

use log::info;

use crate::config::{EstimatorKind, SymbolicConfig};
use crate::dataset::{check_sample_weight, check_target, Dataset};
use crate::error::{GpError, GpResult};
use crate::evolution::{self, GenerationStats};
use crate::fitness::weighted_pearson;
use crate::program::Program;

#[derive(Debug, Clone)]
pub struct SymbolicTransformer {
    pub config: SymbolicConfig,
}

impl Default for SymbolicTransformer {
    fn default() -> Self {
        let mut config = SymbolicConfig::default();
        config.metric = "pearson".to_string();
        SymbolicTransformer { config }
    }
}

impl SymbolicTransformer {
    pub fn new(config: SymbolicConfig) -> Self {
        SymbolicTransformer { config }
    }

    pub fn fit(
        &self,
        x: &[Vec<f64>],
        y: &[f64],
        sample_weight: Option<&[f64]>,
    ) -> GpResult<FittedTransformer> {
        self.config.validate(EstimatorKind::Transformer)?;
        let data = Dataset::from_rows(x)?;
        check_target(data.n_samples(), y)?;
        let weight = match sample_weight {
            Some(w) => {
                check_sample_weight(data.n_samples(), w)?;
                w.to_vec()
            }
            None => vec![1.0; data.n_samples()],
        };

        let result = evolution::run(
            &self.config,
            EstimatorKind::Transformer,
            data.n_features(),
            &data,
            y,
            &weight,
        )?;

        let last_gen = result.history.last().expect("at least one generation");
        let mut hall_of_fame: Vec<&evolution::EvaluatedProgram> = last_gen.iter().collect();
        hall_of_fame.sort_by(|a, b| b.fitness.partial_cmp(&a.fitness).unwrap());
        hall_of_fame.truncate(self.config.hall_of_fame.min(hall_of_fame.len()));

        let outputs: Vec<Vec<f64>> = hall_of_fame
            .iter()
            .map(|p| p.program.execute(&data))
            .collect();

        let selected = greedy_decorrelated_selection(&outputs, &weight, self.config.n_components);

        let programs: Vec<Program> = selected
            .iter()
            .map(|&i| hall_of_fame[i].program.clone())
            .collect();

        info!(
            "fit complete: selected {} of {} hall-of-fame programs",
            programs.len(),
            hall_of_fame.len()
        );

        Ok(FittedTransformer {
            programs,
            n_features: data.n_features(),
            stats: result.stats,
        })
    }
}

/// Starts with the fittest program (index 0, since `outputs` is already
/// sorted by descending fitness) and repeatedly adds whichever remaining
/// candidate has the smallest maximum absolute correlation with the
/// programs already selected — gplearn's hall-of-fame diversity rule.
fn greedy_decorrelated_selection(outputs: &[Vec<f64>], weight: &[f64], n_components: usize) -> Vec<usize> {
    if outputs.is_empty() {
        return Vec::new();
    }
    let n_components = n_components.min(outputs.len());
    let mut selected = vec![0usize];
    let mut remaining: Vec<usize> = (1..outputs.len()).collect();

    while selected.len() < n_components && !remaining.is_empty() {
        let mut best_candidate = remaining[0];
        let mut best_max_corr = f64::INFINITY;
        for &candidate in &remaining {
            let max_corr = selected
                .iter()
                .map(|&s| weighted_pearson(&outputs[candidate], &outputs[s], weight).abs())
                .fold(0.0, f64::max);
            if max_corr < best_max_corr {
                best_max_corr = max_corr;
                best_candidate = candidate;
            }
        }
        selected.push(best_candidate);
        remaining.retain(|&c| c != best_candidate);
    }

    selected
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FittedTransformer {
    programs: Vec<Program>,
    n_features: usize,
    stats: Vec<GenerationStats>,
}

impl FittedTransformer {
    pub fn programs(&self) -> &[Program] {
        &self.programs
    }

    pub fn stats(&self) -> &[GenerationStats] {
        &self.stats
    }

    /// Produces one output column per selected program, row-major.
    pub fn transform(&self, x: &[Vec<f64>]) -> GpResult<Vec<Vec<f64>>> {
        let data = Dataset::from_rows(x)?;
        if data.n_features() != self.n_features {
            return Err(GpError::Shape {
                expected: self.n_features,
                found: data.n_features(),
            });
        }
        let columns: Vec<Vec<f64>> = self.programs.iter().map(|p| p.execute(&data)).collect();
        let n_samples = data.n_samples();
        let mut rows = vec![Vec::with_capacity(self.programs.len()); n_samples];
        for col in &columns {
            for (row, &v) in rows.iter_mut().zip(col) {
                row.push(v);
            }
        }
        Ok(rows)
    }
}
