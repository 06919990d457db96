//
// symreg-gp - genetic programming for symbolic regression
//
// File description:
//   Module: function registry. Named arithmetic primitives with arity and
//   numerically protected, vectorized semantics.
//

use log::warn;

use crate::error::{GpError, GpResult};

/// Threshold below which protected operators fall back to their safe default.
const PROTECTED_EPS: f64 = 0.001;

/// Identity of a registered primitive. Kept as a plain enum (not a boxed
/// closure) so `FunctionSet` can be serialized by name and rebuilt on
/// deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FunctionId {
    Add2,
    Sub2,
    Mul2,
    Div2,
    Sqrt1,
    Log1,
    Abs1,
    Neg1,
    Inv1,
    Max2,
    Min2,
    Sin1,
    Cos1,
    Tan1,
}

impl FunctionId {
    pub fn name(self) -> &'static str {
        match self {
            FunctionId::Add2 => "add2",
            FunctionId::Sub2 => "sub2",
            FunctionId::Mul2 => "mul2",
            FunctionId::Div2 => "div2",
            FunctionId::Sqrt1 => "sqrt1",
            FunctionId::Log1 => "log1",
            FunctionId::Abs1 => "abs1",
            FunctionId::Neg1 => "neg1",
            FunctionId::Inv1 => "inv1",
            FunctionId::Max2 => "max2",
            FunctionId::Min2 => "min2",
            FunctionId::Sin1 => "sin1",
            FunctionId::Cos1 => "cos1",
            FunctionId::Tan1 => "tan1",
        }
    }

    pub fn from_name(name: &str) -> GpResult<FunctionId> {
        Ok(match name {
            "add2" => FunctionId::Add2,
            "sub2" => FunctionId::Sub2,
            "mul2" => FunctionId::Mul2,
            "div2" => FunctionId::Div2,
            "sqrt1" => FunctionId::Sqrt1,
            "log1" => FunctionId::Log1,
            "abs1" => FunctionId::Abs1,
            "neg1" => FunctionId::Neg1,
            "inv1" => FunctionId::Inv1,
            "max2" => FunctionId::Max2,
            "min2" => FunctionId::Min2,
            "sin1" => FunctionId::Sin1,
            "cos1" => FunctionId::Cos1,
            "tan1" => FunctionId::Tan1,
            other => {
                return Err(GpError::Configuration(format!(
                    "unknown function '{}'",
                    other
                )))
            }
        })
    }

    pub fn arity(self) -> usize {
        match self {
            FunctionId::Add2
            | FunctionId::Sub2
            | FunctionId::Mul2
            | FunctionId::Div2
            | FunctionId::Max2
            | FunctionId::Min2 => 2,
            _ => 1,
        }
    }

    pub fn is_trigonometric(self) -> bool {
        matches!(self, FunctionId::Sin1 | FunctionId::Cos1 | FunctionId::Tan1)
    }

    /// Applies protected scalar semantics: division/log/sqrt/inverse near
    /// zero fall back to a safe default instead of producing `inf`/`NaN`.
    /// Returns `(value, clamped)`; `clamped` is true when the raw result was
    /// non-finite and the safe default below was substituted.
    fn eval_scalar(self, args: &[f64]) -> (f64, bool) {
        let v = match self {
            FunctionId::Add2 => args[0] + args[1],
            FunctionId::Sub2 => args[0] - args[1],
            FunctionId::Mul2 => args[0] * args[1],
            FunctionId::Div2 => {
                if args[1].abs() > PROTECTED_EPS {
                    args[0] / args[1]
                } else {
                    1.0
                }
            }
            FunctionId::Sqrt1 => args[0].abs().sqrt(),
            FunctionId::Log1 => {
                if args[0].abs() > PROTECTED_EPS {
                    args[0].abs().ln()
                } else {
                    0.0
                }
            }
            FunctionId::Abs1 => args[0].abs(),
            FunctionId::Neg1 => -args[0],
            FunctionId::Inv1 => {
                if args[0].abs() > PROTECTED_EPS {
                    1.0 / args[0]
                } else {
                    0.0
                }
            }
            FunctionId::Max2 => args[0].max(args[1]),
            FunctionId::Min2 => args[0].min(args[1]),
            FunctionId::Sin1 => args[0].sin(),
            FunctionId::Cos1 => args[0].cos(),
            FunctionId::Tan1 => args[0].tan(),
        };
        if v.is_finite() {
            (v, false)
        } else {
            (0.0, true)
        }
    }

    /// Element-wise evaluation over one or two equal-length input columns.
    /// Logs one `warn!` per call if any row needed a protected-operator
    /// clamp, rather than one per row.
    pub fn eval_vec(self, args: &[&[f64]]) -> Vec<f64> {
        let n = args[0].len();
        let mut out = Vec::with_capacity(n);
        let mut scratch = vec![0.0; args.len()];
        let mut clamped_count = 0usize;
        for row in 0..n {
            for (k, col) in args.iter().enumerate() {
                scratch[k] = col[row];
            }
            let (v, clamped) = self.eval_scalar(&scratch);
            if clamped {
                clamped_count += 1;
            }
            out.push(v);
        }
        if clamped_count > 0 {
            warn!(
                "{}: protected clamp applied to {}/{} rows",
                self.name(),
                clamped_count,
                n
            );
        }
        out
    }
}

/// A named primitive usable in an evolved program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Function {
    pub id: FunctionId,
}

impl Function {
    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    pub fn arity(&self) -> usize {
        self.id.arity()
    }
}

/// The set of primitives active for a given fit call. Built from
/// configuration, never a global/process-wide singleton.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FunctionSet {
    functions: Vec<Function>,
}

impl FunctionSet {
    pub fn new(names: &[String], trigonometric: bool) -> GpResult<FunctionSet> {
        if names.is_empty() {
            return Err(GpError::Configuration(
                "function_set must not be empty".to_string(),
            ));
        }
        let mut ids: Vec<FunctionId> = Vec::with_capacity(names.len());
        for name in names {
            ids.push(FunctionId::from_name(name)?);
        }
        if trigonometric {
            for trig in [FunctionId::Sin1, FunctionId::Cos1, FunctionId::Tan1] {
                if !ids.contains(&trig) {
                    ids.push(trig);
                }
            }
        }
        Ok(FunctionSet {
            functions: ids.into_iter().map(|id| Function { id }).collect(),
        })
    }

    pub fn default_set() -> Vec<String> {
        ["add2", "sub2", "mul2", "div2"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.functions.iter().any(|f| f.name() == name)
    }

    pub fn find(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name() == name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn with_arity(&self, arity: usize) -> Vec<Function> {
        self.functions
            .iter()
            .copied()
            .filter(|f| f.arity() == arity)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protected_division_guards_small_denominator() {
        let f = FunctionId::Div2;
        assert_eq!(f.eval_vec(&[&[1.0], &[0.0001]]), vec![1.0]);
        assert!((f.eval_vec(&[&[4.0], &[2.0]])[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn protected_sqrt_uses_absolute_value() {
        assert_eq!(FunctionId::Sqrt1.eval_vec(&[&[-4.0]]), vec![2.0]);
    }

    #[test]
    fn protected_log_guards_near_zero() {
        assert_eq!(FunctionId::Log1.eval_vec(&[&[0.0005]]), vec![0.0]);
        assert!(FunctionId::Log1.eval_vec(&[&[1.0]])[0].abs() < 1e-12);
    }

    #[test]
    fn protected_inverse_guards_near_zero() {
        assert_eq!(FunctionId::Inv1.eval_vec(&[&[0.0]]), vec![0.0]);
        assert!((FunctionId::Inv1.eval_vec(&[&[2.0]])[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn trigonometric_functions_added_when_enabled() {
        let fs = FunctionSet::new(&FunctionSet::default_set(), true).unwrap();
        assert!(fs.contains_name("sin1"));
        assert!(fs.contains_name("cos1"));
        assert!(fs.contains_name("tan1"));
    }

    #[test]
    fn unknown_function_name_errors() {
        let names = vec!["not_a_function".to_string()];
        assert!(FunctionSet::new(&names, false).is_err());
    }
}
