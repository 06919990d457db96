//
// symreg-gp - genetic programming for symbolic regression
//
// File description:
//   Demo binary: fits a `SymbolicRegressor` on a synthetically generated
//   dataset and reports the evolved program and its held-out error.
//

use clap::Parser;

use symreg_gp::{SymbolicConfig, SymbolicRegressor};

#[derive(Parser)]
#[command(author, version, about = "Fit a symbolic regressor on a synthetic dataset", long_about = None)]
struct Cli {
    /// Number of generations to evolve.
    #[arg(long, default_value_t = 20)]
    generations: usize,

    /// Number of programs per generation.
    #[arg(long, default_value_t = 500)]
    population_size: usize,

    /// Number of synthetic samples to generate.
    #[arg(long, default_value_t = 200)]
    n_samples: usize,

    /// Master RNG seed.
    #[arg(long, default_value_t = 0)]
    random_state: u64,

    /// Enable evolution progress logging (repeat for more detail, e.g. -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Generates `n` rows of two features and a noiseless target
/// `y = 2*x0 - x1^2`, split 80/20 into train/test.
fn synthetic_dataset(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    let mut x = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    let mut seed: u64 = 415;
    let mut next = || {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        ((seed >> 11) as f64) / ((1u64 << 53) as f64) * 2.0 - 1.0
    };
    for _ in 0..n {
        let x0 = next();
        let x1 = next();
        x.push(vec![x0, x1]);
        y.push(2.0 * x0 - x1 * x1);
    }
    (x, y)
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose >= 2 {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    let (x, y) = synthetic_dataset(cli.n_samples);
    let split = (x.len() * 4) / 5;
    let (x_train, x_test) = x.split_at(split);
    let (y_train, y_test) = y.split_at(split);

    let mut config = SymbolicConfig::default();
    config.generations = cli.generations;
    config.population_size = cli.population_size;
    config.random_state = cli.random_state;
    config.verbose = cli.verbose;

    let regressor = SymbolicRegressor::new(config);
    let fitted = match regressor.fit(x_train, y_train, None) {
        Ok(fitted) => fitted,
        Err(e) => {
            eprintln!("fit failed: {}", e);
            std::process::exit(1);
        }
    };

    println!("best program: {}", fitted.program().pretty_print());
    println!(
        "length={} depth={} training raw_fitness={:.6}",
        fitted.program().length(),
        fitted.program().depth(),
        fitted.raw_fitness()
    );

    match fitted.score(x_test, y_test) {
        Ok(score) => println!("held-out score (negative MAE): {:.6}", score),
        Err(e) => eprintln!("scoring failed: {}", e),
    }
}
