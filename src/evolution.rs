//
// symreg-gp - genetic programming for symbolic regression
//
// File description:
//   Module: tournament selection and the generational evolution loop.
//   Each generation is a data-parallel bulk-synchronous barrier: child
//   production within a generation is embarrassingly parallel across
//   slots, fitness aggregation happens in slot order, and the next
//   generation never starts until the current one is fully evaluated.
//

use log::{debug, info};
use rand::Rng;
use rayon::prelude::*;

use crate::config::{EstimatorKind, ParsimonyCoefficient, SymbolicConfig};
use crate::dataset::Dataset;
use crate::error::GpResult;
use crate::fitness::Metric;
use crate::function::FunctionSet;
use crate::operators::{self, Parentage};
use crate::program::Program;
use crate::rng::slot_rng;

/// A program together with its fitness attributes.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EvaluatedProgram {
    pub program: Program,
    pub raw_fitness: f64,
    pub fitness: f64,
    pub oob_fitness: Option<f64>,
    pub parents: Parentage,
}

/// Per-generation summary row for the verbose table.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GenerationStats {
    pub generation: usize,
    pub avg_length: f64,
    pub avg_fitness: f64,
    pub best_length: usize,
    pub best_fitness: f64,
    pub best_raw_fitness: f64,
    pub best_oob_fitness: Option<f64>,
}

fn is_better(a: f64, b: f64, greater_is_better: bool) -> bool {
    if greater_is_better {
        a > b
    } else {
        a < b
    }
}

fn best_index(pop: &[EvaluatedProgram], greater_is_better: bool) -> usize {
    let mut best = 0;
    for i in 1..pop.len() {
        if is_better(pop[i].fitness, pop[best].fitness, greater_is_better) {
            best = i;
        }
    }
    best
}

fn tournament_select(
    pop: &[EvaluatedProgram],
    tournament_size: usize,
    greater_is_better: bool,
    rng: &mut impl Rng,
) -> usize {
    let mut best = rng.gen_range(0..pop.len());
    for _ in 1..tournament_size {
        let candidate = rng.gen_range(0..pop.len());
        if is_better(pop[candidate].fitness, pop[best].fitness, greater_is_better) {
            best = candidate;
        }
    }
    best
}

fn combine_fitness(raw_fitness: f64, length: usize, parsimony: f64, greater_is_better: bool) -> f64 {
    let penalty = parsimony * length as f64;
    if greater_is_better {
        raw_fitness - penalty
    } else {
        raw_fitness + penalty
    }
}

/// Poli & McPhee's covariance-parsimony: cov(length, raw_fitness) / var(length).
fn auto_parsimony(pop: &[EvaluatedProgram]) -> f64 {
    let n = pop.len() as f64;
    if n < 2.0 {
        return 0.0;
    }
    let lengths: Vec<f64> = pop.iter().map(|p| p.program.length() as f64).collect();
    let raws: Vec<f64> = pop.iter().map(|p| p.raw_fitness).collect();
    let mean_l = lengths.iter().sum::<f64>() / n;
    let mean_r = raws.iter().sum::<f64>() / n;
    let cov: f64 = lengths
        .iter()
        .zip(&raws)
        .map(|(l, r)| (l - mean_l) * (r - mean_r))
        .sum::<f64>()
        / n;
    let var_l: f64 = lengths.iter().map(|l| (l - mean_l).powi(2)).sum::<f64>() / n;
    if var_l.abs() < 1e-300 {
        0.0
    } else {
        cov / var_l
    }
}

/// Draws row indices for bootstrap/subsampling, returning (training rows,
/// out-of-bag rows). `oob` is empty when neither bootstrap nor subsampling
/// is configured.
fn sample_rows(
    n_samples: usize,
    bootstrap: bool,
    max_samples: f64,
    rng: &mut impl Rng,
) -> (Vec<usize>, Vec<usize>) {
    if bootstrap {
        let train: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
        let drawn: std::collections::HashSet<usize> = train.iter().copied().collect();
        let oob: Vec<usize> = (0..n_samples).filter(|i| !drawn.contains(i)).collect();
        (train, oob)
    } else if max_samples < 1.0 {
        let n_train = ((n_samples as f64) * max_samples).floor().max(1.0) as usize;
        let mut idx: Vec<usize> = (0..n_samples).collect();
        // Fisher-Yates partial shuffle using the slot's own RNG.
        for i in 0..n_train.min(n_samples) {
            let j = rng.gen_range(i..n_samples);
            idx.swap(i, j);
        }
        let train: Vec<usize> = idx[..n_train].to_vec();
        let oob: Vec<usize> = idx[n_train..].to_vec();
        (train, oob)
    } else {
        ((0..n_samples).collect(), Vec::new())
    }
}

fn gather(data: &Dataset, rows: &[usize]) -> Dataset {
    let cols: Vec<Vec<f64>> = rows
        .iter()
        .map(|&r| (0..data.n_features()).map(|j| data.column(j)[r]).collect())
        .collect();
    Dataset::from_rows(&cols).expect("row subset of a validated dataset stays finite")
}

fn gather_1d(values: &[f64], rows: &[usize]) -> Vec<f64> {
    rows.iter().map(|&r| values[r]).collect()
}

#[allow(clippy::too_many_arguments)]
fn evaluate_raw(
    program: &Program,
    data: &Dataset,
    y: &[f64],
    weight: &[f64],
    rows: &[usize],
    metric: Metric,
) -> f64 {
    if rows.len() == data.n_samples() {
        let pred = program.execute(data);
        metric.compute(&pred, y, weight)
    } else {
        let sub = gather(data, rows);
        let pred = program.execute(&sub);
        let y_sub = gather_1d(y, rows);
        let w_sub = gather_1d(weight, rows);
        metric.compute(&pred, &y_sub, &w_sub)
    }
}

fn worst_fitness(greater_is_better: bool) -> f64 {
    if greater_is_better {
        f64::NEG_INFINITY
    } else {
        f64::INFINITY
    }
}

/// Builds and evaluates the generation-0 (random) population.
#[allow(clippy::too_many_arguments)]
fn initial_population(
    config: &SymbolicConfig,
    function_set: &FunctionSet,
    n_features: usize,
    data: &Dataset,
    y: &[f64],
    weight: &[f64],
    metric: Metric,
    master_seed: u64,
) -> Vec<EvaluatedProgram> {
    let greater_is_better = metric.greater_is_better();
    let parsimony = match config.parsimony_coefficient {
        ParsimonyCoefficient::Fixed(p) => p,
        ParsimonyCoefficient::Auto => 0.0,
    };
    (0..config.population_size)
        .into_par_iter()
        .map(|slot| {
            let mut rng = slot_rng(master_seed, 0, slot as u64);
            let program = Program::new_random(
                &mut rng,
                function_set,
                n_features,
                config.const_range,
                config.init_depth,
                config.init_method(),
            );
            let (train_rows, oob_rows) =
                sample_rows(data.n_samples(), config.bootstrap, config.max_samples, &mut rng);
            let raw_fitness = evaluate_raw(&program, data, y, weight, &train_rows, metric);
            let oob_fitness = if oob_rows.is_empty() {
                None
            } else {
                Some(evaluate_raw(&program, data, y, weight, &oob_rows, metric))
            };
            let fitness = combine_fitness(raw_fitness, program.length(), parsimony, greater_is_better);
            EvaluatedProgram {
                program,
                raw_fitness,
                fitness,
                oob_fitness,
                parents: Parentage::Reproduced { parent: slot },
            }
        })
        .collect()
}

/// Produces one evolved generation from `prev`.
#[allow(clippy::too_many_arguments)]
fn next_generation(
    prev: &[EvaluatedProgram],
    config: &SymbolicConfig,
    function_set: &FunctionSet,
    n_features: usize,
    data: &Dataset,
    y: &[f64],
    weight: &[f64],
    metric: Metric,
    master_seed: u64,
    generation: u64,
    parsimony: f64,
) -> Vec<EvaluatedProgram> {
    let greater_is_better = metric.greater_is_better();

    (0..config.population_size)
        .into_par_iter()
        .map(|slot| {
            let mut rng = slot_rng(master_seed, generation, slot as u64);

            let op_draw: f64 = rng.gen();
            let parent_idx = tournament_select(prev, config.tournament_size, greater_is_better, &mut rng);
            let parent_tokens = prev[parent_idx].program.tokens();

            let (tokens, parents) = if op_draw < config.p_crossover {
                let donor_idx =
                    tournament_select(prev, config.tournament_size, greater_is_better, &mut rng);
                let donor_tokens = prev[donor_idx].program.tokens();
                let (tokens, self_range, donor_range) =
                    operators::crossover(&prev[parent_idx].program, parent_tokens, donor_tokens, &mut rng);
                (
                    tokens,
                    Parentage::Crossover {
                        parent: parent_idx,
                        parent_idx: self_range,
                        donor: donor_idx,
                        donor_idx: donor_range,
                    },
                )
            } else if op_draw < config.p_crossover + config.p_subtree_mutation {
                let (tokens, removed) = operators::subtree_mutation(
                    &prev[parent_idx].program,
                    parent_tokens,
                    &mut rng,
                    function_set,
                    n_features,
                    config.const_range,
                    config.init_depth,
                    config.init_method(),
                );
                (
                    tokens,
                    Parentage::SubtreeMutation {
                        parent: parent_idx,
                        parent_idx: removed,
                    },
                )
            } else if op_draw < config.p_crossover + config.p_subtree_mutation + config.p_hoist_mutation {
                let (tokens, removed) =
                    operators::hoist_mutation(&prev[parent_idx].program, parent_tokens, &mut rng);
                (
                    tokens,
                    Parentage::HoistMutation {
                        parent: parent_idx,
                        parent_idx: removed,
                    },
                )
            } else if op_draw
                < config.p_crossover
                    + config.p_subtree_mutation
                    + config.p_hoist_mutation
                    + config.p_point_mutation
            {
                let (tokens, mutated) = operators::point_mutation(
                    parent_tokens,
                    &mut rng,
                    function_set,
                    n_features,
                    config.const_range,
                    config.p_point_replace,
                );
                (
                    tokens,
                    Parentage::PointMutation {
                        parent: parent_idx,
                        mutated_indices: mutated,
                    },
                )
            } else {
                (
                    operators::reproduce(parent_tokens),
                    Parentage::Reproduced { parent: parent_idx },
                )
            };

            let program = match Program::from_tokens(
                tokens,
                n_features,
                config.const_range,
                function_set,
            ) {
                Ok(p) => p,
                Err(_) => {
                    // An operator produced a malformed sequence (should not
                    // happen by construction); fall back to reproducing the
                    // parent so one bad slot cannot abort the generation.
                    prev[parent_idx].program.clone()
                }
            };

            let (train_rows, oob_rows) =
                sample_rows(data.n_samples(), config.bootstrap, config.max_samples, &mut rng);
            let raw_fitness_computed = evaluate_raw(&program, data, y, weight, &train_rows, metric);
            let oob_fitness = if oob_rows.is_empty() {
                None
            } else {
                Some(evaluate_raw(&program, data, y, weight, &oob_rows, metric))
            };
            let raw_fitness = if raw_fitness_computed.is_finite() {
                raw_fitness_computed
            } else {
                worst_fitness(greater_is_better)
            };
            let fitness = combine_fitness(raw_fitness, program.length(), parsimony, greater_is_better);

            if config.verbose >= 2 {
                debug!(
                    "gen {} slot {}: length={} fitness={:.6}",
                    generation,
                    slot,
                    program.length(),
                    fitness
                );
            }

            EvaluatedProgram {
                program,
                raw_fitness,
                fitness,
                oob_fitness,
                parents,
            }
        })
        .collect()
}

/// Result of running the full generational loop.
pub struct EvolutionResult {
    pub history: Vec<Vec<EvaluatedProgram>>,
    pub stats: Vec<GenerationStats>,
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    config: &SymbolicConfig,
    kind: EstimatorKind,
    n_features: usize,
    data: &Dataset,
    y: &[f64],
    weight: &[f64],
) -> GpResult<EvolutionResult> {
    config.validate(kind)?;
    let function_set = config.function_set()?;
    let metric = config.metric();
    let greater_is_better = metric.greater_is_better();
    let master_seed = config.random_state;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.n_jobs.max(1))
        .build()
        .map_err(|e| {
            crate::error::GpError::Configuration(format!("could not build thread pool: {}", e))
        })?;

    let mut history = Vec::with_capacity(config.generations + 1);
    let mut stats = Vec::with_capacity(config.generations + 1);

    if config.verbose >= 1 {
        print_verbose_header();
    }

    let gen0 = pool.install(|| {
        initial_population(
            config,
            &function_set,
            n_features,
            data,
            y,
            weight,
            metric,
            master_seed,
        )
    });
    stats.push(summarize(0, &gen0, greater_is_better));
    info!(
        "generation 0: best length={} best fitness={:.6}",
        stats[0].best_length, stats[0].best_fitness
    );
    if config.verbose >= 1 {
        print_verbose_row(&stats[0]);
    }
    history.push(gen0);

    let mut parsimony = match config.parsimony_coefficient {
        ParsimonyCoefficient::Fixed(p) => p,
        ParsimonyCoefficient::Auto => auto_parsimony(&history[0]),
    };

    for gen in 1..=config.generations {
        let prev = history.last().unwrap();
        let next = pool.install(|| {
            next_generation(
                prev,
                config,
                &function_set,
                n_features,
                data,
                y,
                weight,
                metric,
                master_seed,
                gen as u64,
                parsimony,
            )
        });

        stats.push(summarize(gen, &next, greater_is_better));
        let row = stats.last().unwrap();
        info!(
            "generation {}: best length={} best fitness={:.6}",
            gen, row.best_length, row.best_fitness
        );
        if config.verbose >= 1 {
            print_verbose_row(row);
        }

        parsimony = match config.parsimony_coefficient {
            ParsimonyCoefficient::Fixed(p) => p,
            ParsimonyCoefficient::Auto => auto_parsimony(&next),
        };

        history.push(next);
    }

    Ok(EvolutionResult { history, stats })
}

fn summarize(generation: usize, pop: &[EvaluatedProgram], greater_is_better: bool) -> GenerationStats {
    let n = pop.len() as f64;
    let avg_length = pop.iter().map(|p| p.program.length() as f64).sum::<f64>() / n;
    let avg_fitness = pop.iter().map(|p| p.fitness).sum::<f64>() / n;
    let best = &pop[best_index(pop, greater_is_better)];
    GenerationStats {
        generation,
        avg_length,
        avg_fitness,
        best_length: best.program.length(),
        best_fitness: best.fitness,
        best_raw_fitness: best.raw_fitness,
        best_oob_fitness: best.oob_fitness,
    }
}

/// Emits the two-line verbose header (column names, then a rule). One
/// data row per generation follows, for a total line count of
/// `generations + 3`.
pub fn print_verbose_header() {
    println!(
        "{:>4} {:>8} {:>16} {:>8} {:>16} {:>16} {:>16} {:>10}",
        "Gen",
        "Length",
        "Fitness",
        "Length",
        "Fitness",
        "Raw Fitness",
        "OOB Fitness",
        "Time Left"
    );
    println!(
        "{:->4} {:->8} {:->16} {:->8} {:->16} {:->16} {:->16} {:->10}",
        "", "", "", "", "", "", "", ""
    );
}

fn print_verbose_row(stats: &GenerationStats) {
    let oob = stats
        .best_oob_fitness
        .map(|v| format!("{:.6}", v))
        .unwrap_or_else(|| "N/A".to_string());
    println!(
        "{:>4} {:>8.2} {:>16.6} {:>8} {:>16.6} {:>16.6} {:>16} {:>10}",
        stats.generation,
        stats.avg_length,
        stats.avg_fitness,
        stats.best_length,
        stats.best_fitness,
        stats.best_raw_fitness,
        oob,
        "--"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_dataset() -> (Dataset, Vec<f64>, Vec<f64>) {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            let x0 = (i as f64) * 0.1;
            let x1 = ((i * 7) % 11) as f64 * 0.05;
            rows.push(vec![x0, x1]);
            y.push(2.0 * x0 - x1);
        }
        let data = Dataset::from_rows(&rows).unwrap();
        let w = vec![1.0; rows.len()];
        (data, y, w)
    }

    fn small_config() -> SymbolicConfig {
        let mut cfg = SymbolicConfig::default();
        cfg.population_size = 30;
        cfg.generations = 3;
        cfg.tournament_size = 5;
        cfg
    }

    #[test]
    fn run_produces_generations_plus_one_history_entries() {
        let (data, y, w) = toy_dataset();
        let cfg = small_config();
        let result = run(&cfg, EstimatorKind::Regressor, 2, &data, &y, &w).unwrap();
        assert_eq!(result.history.len(), cfg.generations + 1);
        assert_eq!(result.stats.len(), cfg.generations + 1);
        for gen in &result.history {
            assert_eq!(gen.len(), cfg.population_size);
        }
    }

    #[test]
    fn parallel_determinism_across_n_jobs() {
        let (data, y, w) = toy_dataset();
        let mut lengths_by_njobs = Vec::new();
        for n_jobs in [1, 2, 3, 8] {
            let mut cfg = small_config();
            cfg.n_jobs = n_jobs;
            let result = run(&cfg, EstimatorKind::Regressor, 2, &data, &y, &w).unwrap();
            let last = result.history.last().unwrap();
            let lengths: Vec<usize> = last.iter().map(|p| p.program.length()).collect();
            lengths_by_njobs.push(lengths);
        }
        for pair in lengths_by_njobs.windows(2) {
            assert_eq!(pair[0], pair[1]);
        }
    }

    #[test]
    fn bootstrap_and_subsample_produce_different_fitness() {
        let (data, y, w) = toy_dataset();
        let variants: Vec<(bool, f64)> = vec![(false, 1.0), (true, 1.0), (false, 0.7), (true, 0.7)];
        let mut bests = Vec::new();
        for (bootstrap, max_samples) in variants {
            let mut cfg = small_config();
            cfg.bootstrap = bootstrap;
            cfg.max_samples = max_samples;
            let result = run(&cfg, EstimatorKind::Regressor, 2, &data, &y, &w).unwrap();
            bests.push(result.stats.last().unwrap().best_raw_fitness);
        }
        for i in 0..bests.len() {
            for j in (i + 1)..bests.len() {
                assert!((bests[i] - bests[j]).abs() > 1e-9);
            }
        }
    }

    #[test]
    fn parsimony_coefficient_changes_best_program_length() {
        let (data, y, w) = toy_dataset();
        let mut low = small_config();
        low.parsimony_coefficient = ParsimonyCoefficient::Fixed(0.0001);
        low.generations = 6;
        let mut high = small_config();
        high.parsimony_coefficient = ParsimonyCoefficient::Fixed(1.0);
        high.generations = 6;

        let low_result = run(&low, EstimatorKind::Regressor, 2, &data, &y, &w).unwrap();
        let high_result = run(&high, EstimatorKind::Regressor, 2, &data, &y, &w).unwrap();

        let low_len = low_result.stats.last().unwrap().best_length;
        let high_len = high_result.stats.last().unwrap().best_length;
        assert!(high_len <= low_len);
    }
}
