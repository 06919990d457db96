//
// symreg-gp - genetic programming for symbolic regression
//
// File description:
//   Module: input matrix storage. Accepts row-major data at the fit/predict
//   boundary and stores it column-major internally so
//   `Program::execute` can slice out a whole feature column cheaply,
//   mirroring numpy's `X[:, i]` fancy indexing that the original
//   implementation relies on.
//

use crate::error::{GpError, GpResult};

#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<Vec<f64>>,
    n_samples: usize,
}

impl Dataset {
    /// Builds a dataset from row-major data (`rows[i]` is the i-th sample).
    pub fn from_rows(rows: &[Vec<f64>]) -> GpResult<Dataset> {
        if rows.is_empty() {
            return Err(GpError::Configuration("X has zero rows".to_string()));
        }
        let n_features = rows[0].len();
        if n_features == 0 {
            return Err(GpError::Configuration("X has zero columns".to_string()));
        }
        let n_samples = rows.len();
        let mut columns = vec![Vec::with_capacity(n_samples); n_features];
        for row in rows {
            if row.len() != n_features {
                return Err(GpError::Configuration(
                    "all rows of X must have the same length".to_string(),
                ));
            }
            for (j, &v) in row.iter().enumerate() {
                if !v.is_finite() {
                    return Err(GpError::Configuration(format!(
                        "X contains a non-finite value ({})",
                        v
                    )));
                }
                columns[j].push(v);
            }
        }
        Ok(Dataset { columns, n_samples })
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, i: usize) -> &[f64] {
        &self.columns[i]
    }
}

/// Validates `y`/`sample_weight` against the dataset's sample count.
pub fn check_target(n_samples: usize, y: &[f64]) -> GpResult<()> {
    if y.len() != n_samples {
        return Err(GpError::Configuration(format!(
            "y has {} samples, X has {}",
            y.len(),
            n_samples
        )));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(GpError::Configuration(
            "y contains a non-finite value".to_string(),
        ));
    }
    Ok(())
}

pub fn check_sample_weight(n_samples: usize, w: &[f64]) -> GpResult<()> {
    if w.len() != n_samples {
        return Err(GpError::Configuration(format!(
            "sample_weight has {} entries, X has {} samples",
            w.len(),
            n_samples
        )));
    }
    if w.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(GpError::Configuration(
            "sample_weight must be finite and non-negative".to_string(),
        ));
    }
    Ok(())
}
