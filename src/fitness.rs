//
// symreg-gp - genetic programming for symbolic regression
//
// File description:
//   Module: fitness metrics. Six sample-weighted metrics plus the
//   parsimony-adjusted fitness combinator.
//

use crate::error::{GpError, GpResult};

/// A supported fitness metric, with its `greater_is_better` orientation
/// baked in so tournament selection and the parsimony sign never have to
/// special-case individual metric names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Metric {
    MeanAbsoluteError,
    Mse,
    Rmse,
    Rmsle,
    Pearson,
    Spearman,
}

impl Metric {
    pub fn parse(name: &str) -> GpResult<Metric> {
        match name {
            "mean absolute error" => Ok(Metric::MeanAbsoluteError),
            "mse" => Ok(Metric::Mse),
            "rmse" => Ok(Metric::Rmse),
            "rmsle" => Ok(Metric::Rmsle),
            "pearson" => Ok(Metric::Pearson),
            "spearman" => Ok(Metric::Spearman),
            other => Err(GpError::UnknownMetric(other.to_string())),
        }
    }

    /// Regression metrics are minimized; correlation metrics are maximized
    /// (in absolute value).
    pub fn greater_is_better(self) -> bool {
        matches!(self, Metric::Pearson | Metric::Spearman)
    }

    pub fn compute(self, y_pred: &[f64], y: &[f64], weight: &[f64]) -> f64 {
        match self {
            Metric::MeanAbsoluteError => weighted_mae(y_pred, y, weight),
            Metric::Mse => weighted_mse(y_pred, y, weight),
            Metric::Rmse => weighted_mse(y_pred, y, weight).sqrt(),
            Metric::Rmsle => weighted_rmsle(y_pred, y, weight),
            Metric::Pearson => weighted_pearson(y_pred, y, weight).abs(),
            Metric::Spearman => weighted_spearman(y_pred, y, weight).abs(),
        }
    }
}

fn weighted_mean(x: &[f64], w: &[f64]) -> f64 {
    let wsum: f64 = w.iter().sum();
    x.iter().zip(w).map(|(xi, wi)| xi * wi).sum::<f64>() / wsum
}

pub fn weighted_mae(y_pred: &[f64], y: &[f64], w: &[f64]) -> f64 {
    let wsum: f64 = w.iter().sum();
    y_pred
        .iter()
        .zip(y)
        .zip(w)
        .map(|((p, t), wi)| wi * (p - t).abs())
        .sum::<f64>()
        / wsum
}

pub fn weighted_mse(y_pred: &[f64], y: &[f64], w: &[f64]) -> f64 {
    let wsum: f64 = w.iter().sum();
    y_pred
        .iter()
        .zip(y)
        .zip(w)
        .map(|((p, t), wi)| wi * (p - t).powi(2))
        .sum::<f64>()
        / wsum
}

pub fn weighted_rmsle(y_pred: &[f64], y: &[f64], w: &[f64]) -> f64 {
    let wsum: f64 = w.iter().sum();
    let sum: f64 = y_pred
        .iter()
        .zip(y)
        .zip(w)
        .map(|((p, t), wi)| {
            let lp = (1.0 + p.max(0.0)).ln();
            let lt = (1.0 + t.max(0.0)).ln();
            wi * (lp - lt).powi(2)
        })
        .sum();
    (sum / wsum).sqrt()
}

/// Weighted Pearson correlation coefficient.
pub fn weighted_pearson(x: &[f64], y: &[f64], w: &[f64]) -> f64 {
    let mx = weighted_mean(x, w);
    let my = weighted_mean(y, w);
    let wsum: f64 = w.iter().sum();

    let cov: f64 = x
        .iter()
        .zip(y)
        .zip(w)
        .map(|((xi, yi), wi)| wi * (xi - mx) * (yi - my))
        .sum::<f64>()
        / wsum;
    let var_x: f64 = x
        .iter()
        .zip(w)
        .map(|(xi, wi)| wi * (xi - mx).powi(2))
        .sum::<f64>()
        / wsum;
    let var_y: f64 = y
        .iter()
        .zip(w)
        .map(|(yi, wi)| wi * (yi - my).powi(2))
        .sum::<f64>()
        / wsum;

    let denom = (var_x * var_y).sqrt();
    if denom.abs() < 1e-300 {
        0.0
    } else {
        cov / denom
    }
}

/// Average ranks (1-indexed), ties get the mean of their would-be ranks.
fn rank(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap());

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // positions i..=j (in sorted order) tie; assign the mean rank.
        let mean_rank = ((i + 1) + (j + 1)) as f64 / 2.0;
        for k in order.iter().take(j + 1).skip(i) {
            ranks[*k] = mean_rank;
        }
        i = j + 1;
    }
    ranks
}

/// Weighted Spearman correlation: rank both vectors, then weighted Pearson
/// on the ranks.
pub fn weighted_spearman(x: &[f64], y: &[f64], w: &[f64]) -> f64 {
    let rx = rank(x);
    let ry = rank(y);
    weighted_pearson(&rx, &ry, w)
}
