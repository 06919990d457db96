//
// symreg-gp - genetic programming for symbolic regression
//
// File description:
//   Module: linearized prefix-order program (expression tree). Construction,
//   validation, execution, pretty printing, graphviz export and subtree
//   selection all operate as index arithmetic over the flat token sequence,
//   never a separate pointer tree.
//

use rand::Rng;

use crate::dataset::Dataset;
use crate::error::{GpError, GpResult};
use crate::function::FunctionSet;
use crate::token::Token;

/// Population-initialization strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum InitMethod {
    Full,
    Grow,
    HalfAndHalf,
}

impl InitMethod {
    pub fn parse(name: &str) -> GpResult<InitMethod> {
        match name {
            "full" => Ok(InitMethod::Full),
            "grow" => Ok(InitMethod::Grow),
            "half and half" => Ok(InitMethod::HalfAndHalf),
            other => Err(GpError::Configuration(format!(
                "unknown init_method '{}'",
                other
            ))),
        }
    }
}

/// A validated, immutable expression tree in prefix (Polish) order.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Program {
    tokens: Vec<Token>,
    n_features: usize,
    length_: usize,
    depth_: usize,
}

impl Program {
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn length(&self) -> usize {
        self.length_
    }

    pub fn depth(&self) -> usize {
        self.depth_
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Reconstructs a program from a caller-supplied token sequence,
    /// validating arity balance, feature indices, and constant ranges.
    pub fn from_tokens(
        tokens: Vec<Token>,
        n_features: usize,
        const_range: (f64, f64),
        function_set: &FunctionSet,
    ) -> GpResult<Program> {
        validate(&tokens, n_features, const_range, function_set)?;
        let depth_ = compute_depth(&tokens);
        let length_ = tokens.len();
        Ok(Program {
            tokens,
            n_features,
            length_,
            depth_,
        })
    }

    /// Draws a fresh random program via `full`/`grow`/`half and half`
    /// initialization, with a frozen draw order: depth target, then
    /// per-position node type, function-or-terminal choice, and terminal
    /// value.
    pub fn new_random(
        rng: &mut impl Rng,
        function_set: &FunctionSet,
        n_features: usize,
        const_range: (f64, f64),
        init_depth: (usize, usize),
        init_method: InitMethod,
    ) -> Program {
        let (min_d, max_d) = init_depth;
        let max_depth = if min_d == max_d {
            min_d
        } else {
            rng.gen_range(min_d..=max_d)
        };

        let method = match init_method {
            InitMethod::HalfAndHalf => {
                if rng.gen_bool(0.5) {
                    InitMethod::Full
                } else {
                    InitMethod::Grow
                }
            }
            other => other,
        };

        let functions = function_set.functions();
        let mut tokens = Vec::new();

        let root = functions[rng.gen_range(0..functions.len())];
        tokens.push(Token::Func(root.id));
        let mut terminal_stack = vec![root.arity()];

        loop {
            let depth = terminal_stack.len();
            let choice = rng.gen_range(0..(n_features + functions.len()));
            if depth < max_depth && (method == InitMethod::Full || choice <= functions.len()) {
                let f = functions[rng.gen_range(0..functions.len())];
                tokens.push(Token::Func(f.id));
                terminal_stack.push(f.arity());
            } else {
                let terminal_idx = rng.gen_range(0..=n_features);
                if terminal_idx == n_features {
                    let c = rng.gen_range(const_range.0..=const_range.1);
                    tokens.push(Token::Constant(c));
                } else {
                    tokens.push(Token::Feature(terminal_idx));
                }

                *terminal_stack.last_mut().unwrap() -= 1;
                while *terminal_stack.last().unwrap() == 0 {
                    terminal_stack.pop();
                    if terminal_stack.is_empty() {
                        let depth_ = compute_depth(&tokens);
                        let length_ = tokens.len();
                        return Program {
                            tokens,
                            n_features,
                            length_,
                            depth_,
                        };
                    }
                    *terminal_stack.last_mut().unwrap() -= 1;
                }
            }
        }
    }

    /// Evaluates the program over every row of `data`, returning one value
    /// per sample. A single-feature program returns that column verbatim; a
    /// single constant returns a broadcast vector.
    pub fn execute(&self, data: &Dataset) -> Vec<f64> {
        let mut pos = 0usize;
        eval(&self.tokens, &mut pos, data)
    }

    /// Weighted (0.9 function / 0.1 terminal) subtree selection, Koza's
    /// rule. Deterministic: consumes exactly one `f64` draw from `rng`.
    pub fn get_subtree(&self, rng: &mut impl Rng, tokens: &[Token]) -> (usize, usize) {
        let weights: Vec<f64> = tokens
            .iter()
            .map(|t| if t.is_function() { 0.9 } else { 0.1 })
            .collect();
        let total: f64 = weights.iter().sum();
        let mut cumulative = Vec::with_capacity(weights.len());
        let mut running = 0.0;
        for w in &weights {
            running += w / total;
            cumulative.push(running);
        }

        let u: f64 = rng.gen::<f64>();
        let start = cumulative
            .iter()
            .position(|&c| u <= c)
            .unwrap_or(tokens.len() - 1);

        let mut stack: i64 = 1;
        let mut end = start;
        while stack > (end as i64 - start as i64) {
            if tokens[end].is_function() {
                stack += tokens[end].arity() as i64;
            }
            end += 1;
        }
        (start, end)
    }

    /// Infix-like lispy pretty form.
    pub fn pretty_print(&self) -> String {
        let mut pos = 0usize;
        pretty(&self.tokens, &mut pos)
    }

    /// Graphviz `digraph` export: function nodes fill `#3499cd`, terminal
    /// nodes `#f89939`, edges to children emitted in reverse child order.
    pub fn export_graphviz(&self) -> String {
        let mut out = String::from("digraph program {\nnode [style=filled]");
        let mut pos = 0usize;
        let mut next_idx = 0usize;
        build_graphviz(&self.tokens, &mut pos, &mut next_idx, &mut out);
        out.push('}');
        out
    }
}

fn display_name(id: crate::function::FunctionId) -> String {
    id.name()
        .trim_end_matches(|c: char| c.is_ascii_digit())
        .to_string()
}

fn eval(tokens: &[Token], pos: &mut usize, data: &Dataset) -> Vec<f64> {
    let tok = tokens[*pos];
    *pos += 1;
    match tok {
        Token::Func(id) => {
            let arity = id.arity();
            let mut args: Vec<Vec<f64>> = Vec::with_capacity(arity);
            for _ in 0..arity {
                args.push(eval(tokens, pos, data));
            }
            let slices: Vec<&[f64]> = args.iter().map(|a| a.as_slice()).collect();
            id.eval_vec(&slices)
        }
        Token::Feature(i) => data.column(i).to_vec(),
        Token::Constant(c) => vec![c; data.n_samples()],
    }
}

fn pretty(tokens: &[Token], pos: &mut usize) -> String {
    let tok = tokens[*pos];
    *pos += 1;
    match tok {
        Token::Func(id) => {
            let mut args = Vec::with_capacity(id.arity());
            for _ in 0..id.arity() {
                args.push(pretty(tokens, pos));
            }
            format!("{}({})", display_name(id), args.join(", "))
        }
        Token::Feature(i) => format!("X{}", i),
        Token::Constant(c) => format!("{:.3}", c),
    }
}

fn build_graphviz(
    tokens: &[Token],
    pos: &mut usize,
    next_idx: &mut usize,
    out: &mut String,
) -> usize {
    let idx = *next_idx;
    *next_idx += 1;
    let tok = tokens[*pos];
    *pos += 1;
    match tok {
        Token::Func(id) => {
            out.push_str(&format!(
                "{} [label=\"{}\", fillcolor=\"#3499cd\"] ;\n",
                idx,
                display_name(id)
            ));
            let mut children = Vec::with_capacity(id.arity());
            for _ in 0..id.arity() {
                children.push(build_graphviz(tokens, pos, next_idx, out));
            }
            for &c in children.iter().rev() {
                out.push_str(&format!("{} -> {} ;\n", idx, c));
            }
        }
        Token::Feature(i) => {
            out.push_str(&format!(
                "{} [label=\"X{}\", fillcolor=\"#f89939\"] ;\n",
                idx, i
            ));
        }
        Token::Constant(c) => {
            out.push_str(&format!(
                "{} [label=\"{:.3}\", fillcolor=\"#f89939\"] ;\n",
                idx, c
            ));
        }
    }
    idx
}

/// Dijkstra-style arity-balance check: a running sum of `arity - 1` over
/// tokens reaches exactly -1 iff the sequence fully saturates the root's
/// demand, and must not reach it before the last token.
fn validate(
    tokens: &[Token],
    n_features: usize,
    const_range: (f64, f64),
    function_set: &FunctionSet,
) -> GpResult<()> {
    if tokens.is_empty() {
        return Err(GpError::ProgramValidation("program is empty".to_string()));
    }

    let (lo, hi) = (const_range.0.min(const_range.1), const_range.0.max(const_range.1));

    let mut balance: i64 = 0;
    let last = tokens.len() - 1;
    for (i, tok) in tokens.iter().enumerate() {
        match tok {
            Token::Func(id) => {
                if !function_set.contains_name(id.name()) {
                    return Err(GpError::ProgramValidation(format!(
                        "function '{}' is not in the active function set",
                        id.name()
                    )));
                }
                balance += id.arity() as i64 - 1;
            }
            Token::Feature(idx) => {
                if *idx >= n_features {
                    return Err(GpError::ProgramValidation(format!(
                        "feature index {} out of range (n_features={})",
                        idx, n_features
                    )));
                }
                balance -= 1;
            }
            Token::Constant(c) => {
                if *c < lo || *c > hi {
                    return Err(GpError::ProgramValidation(format!(
                        "constant {} out of const_range ({}, {})",
                        c, lo, hi
                    )));
                }
                balance -= 1;
            }
        }

        if balance == -1 && i != last {
            return Err(GpError::ProgramValidation(
                "extra tokens after the root's arity is already saturated".to_string(),
            ));
        }
    }

    if balance != -1 {
        return Err(GpError::ProgramValidation(
            "program does not fully saturate the root's arity demand".to_string(),
        ));
    }

    Ok(())
}

/// Maximum nesting depth, counted the same way the arity stack used during
/// construction tracks it (1-indexed: the root is depth 1).
pub(crate) fn compute_depth(tokens: &[Token]) -> usize {
    let mut stack: Vec<usize> = Vec::new();
    let mut max_depth = 0usize;
    for tok in tokens {
        let depth = stack.len() + 1;
        max_depth = max_depth.max(depth);
        match tok {
            Token::Func(id) => stack.push(id.arity()),
            _ => {
                if let Some(top) = stack.last_mut() {
                    *top -= 1;
                }
                while matches!(stack.last(), Some(0)) {
                    stack.pop();
                    if let Some(top) = stack.last_mut() {
                        *top -= 1;
                    }
                }
            }
        }
    }
    max_depth
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::function::FunctionId;

    fn fset(names: &[&str]) -> FunctionSet {
        FunctionSet::new(
            &names.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            false,
        )
        .unwrap()
    }

    fn scenario_program() -> Program {
        let fs = fset(&["add2", "sub2", "mul2", "div2"]);
        let tokens = vec![
            Token::Func(FunctionId::Mul2),
            Token::Func(FunctionId::Div2),
            Token::Feature(8),
            Token::Feature(1),
            Token::Func(FunctionId::Sub2),
            Token::Feature(9),
            Token::Constant(0.5),
        ];
        Program::from_tokens(tokens, 10, (-1.0, 1.0), &fs).unwrap()
    }

    #[test]
    fn execute_matches_scenario_1() {
        // X = reshape(uniform(50), (5, 10)) from a fixed RNG stream in the
        // original test suite; exercised here with an explicit matrix
        // instead, since reproducing numpy's RandomState bit-for-bit is out
        // of scope.
        let prog = scenario_program();
        let rows: Vec<Vec<f64>> = (0..5).map(|_| vec![0.3; 10]).collect();
        let data = Dataset::from_rows(&rows).unwrap();
        let result = prog.execute(&data);
        assert_eq!(result.len(), 5);
        assert!(result.iter().all(|v| v.is_finite()));
        // div(X8, X1) = 0.3/0.3 = 1.0; sub(X9, 0.5) = 0.3-0.5 = -0.2
        // mul(1.0, -0.2) = -0.2
        for v in result {
            assert_relative_eq!(v, -0.2, epsilon = 1e-9);
        }
    }

    #[test]
    fn pretty_print_matches_scenario_3() {
        let prog = scenario_program();
        assert_eq!(prog.pretty_print(), "mul(div(X8, X1), sub(X9, 0.500))");
    }

    #[test]
    fn export_graphviz_matches_scenario_4() {
        let prog = scenario_program();
        let expected = "digraph program {\n\
node [style=filled]0 [label=\"mul\", fillcolor=\"#3499cd\"] ;\n\
1 [label=\"div\", fillcolor=\"#3499cd\"] ;\n\
2 [label=\"X8\", fillcolor=\"#f89939\"] ;\n\
3 [label=\"X1\", fillcolor=\"#f89939\"] ;\n\
1 -> 3 ;\n1 -> 2 ;\n\
4 [label=\"sub\", fillcolor=\"#3499cd\"] ;\n\
5 [label=\"X9\", fillcolor=\"#f89939\"] ;\n\
6 [label=\"0.500\", fillcolor=\"#f89939\"] ;\n\
4 -> 6 ;\n4 -> 5 ;\n0 -> 4 ;\n0 -> 1 ;\n}";
        assert_eq!(prog.export_graphviz(), expected);
    }

    #[test]
    fn export_graphviz_degenerate_single_terminal() {
        let fs = fset(&["add2", "sub2", "mul2", "div2"]);
        let prog = Program::from_tokens(vec![Token::Feature(1)], 10, (-1.0, 1.0), &fs).unwrap();
        let expected =
            "digraph program {\nnode [style=filled]0 [label=\"X1\", fillcolor=\"#f89939\"] ;\n}";
        assert_eq!(prog.export_graphviz(), expected);
    }

    #[test]
    fn scenario_program_has_expected_length_and_depth() {
        let prog = scenario_program();
        assert_eq!(prog.length(), 7);
        assert_eq!(prog.depth(), 3);
    }

    #[test]
    fn validate_rejects_truncated_and_overextended_sequences() {
        let fs = fset(&["add2", "sub2", "mul2", "div2", "sqrt1", "log1", "abs1"]);
        let tokens = vec![
            Token::Func(FunctionId::Sub2),
            Token::Func(FunctionId::Abs1),
            Token::Func(FunctionId::Sqrt1),
            Token::Func(FunctionId::Log1),
            Token::Func(FunctionId::Log1),
            Token::Func(FunctionId::Sqrt1),
            Token::Feature(7),
            Token::Func(FunctionId::Abs1),
            Token::Func(FunctionId::Abs1),
            Token::Func(FunctionId::Abs1),
            Token::Func(FunctionId::Log1),
            Token::Func(FunctionId::Sqrt1),
            Token::Feature(2),
        ];

        assert!(Program::from_tokens(tokens.clone(), 10, (-1.0, 1.0), &fs).is_ok());

        let mut truncated = tokens.clone();
        truncated.pop();
        assert!(Program::from_tokens(truncated, 10, (-1.0, 1.0), &fs).is_err());

        let mut extended = tokens;
        extended.push(Token::Feature(1));
        assert!(Program::from_tokens(extended, 10, (-1.0, 1.0), &fs).is_err());
    }

    #[test]
    fn validate_rejects_unknown_function_and_out_of_range_terminal() {
        let fs = fset(&["add2", "sub2"]);
        let bad_function = vec![Token::Func(FunctionId::Mul2), Token::Feature(0), Token::Feature(1)];
        assert!(Program::from_tokens(bad_function, 5, (-1.0, 1.0), &fs).is_err());

        let fs2 = fset(&["add2"]);
        let bad_feature = vec![Token::Func(FunctionId::Add2), Token::Feature(10), Token::Feature(0)];
        assert!(Program::from_tokens(bad_feature, 5, (-1.0, 1.0), &fs2).is_err());

        let bad_const = vec![Token::Func(FunctionId::Add2), Token::Constant(5.0), Token::Feature(0)];
        assert!(Program::from_tokens(bad_const, 5, (-1.0, 1.0), &fs2).is_err());
    }

    #[test]
    fn from_tokens_roundtrip_is_structurally_equal() {
        let prog = scenario_program();
        let fs = fset(&["add2", "sub2", "mul2", "div2"]);
        let rebuilt =
            Program::from_tokens(prog.tokens().to_vec(), 10, (-1.0, 1.0), &fs).unwrap();
        assert_eq!(prog, rebuilt);
    }

    #[test]
    fn get_subtree_is_deterministic_for_self_and_external_program() {
        use rand::SeedableRng;
        let prog = scenario_program();
        let mut r1 = rand_xorshift::XorShiftRng::seed_from_u64(0);
        let mut r2 = rand_xorshift::XorShiftRng::seed_from_u64(0);
        let a = prog.get_subtree(&mut r1, prog.tokens());
        let b = prog.get_subtree(&mut r2, prog.tokens());
        assert_eq!(a, b);
    }

    #[test]
    fn new_random_produces_valid_programs() {
        use rand::SeedableRng;
        let fs = fset(&["add2", "sub2", "mul2", "div2", "sqrt1", "log1", "abs1"]);
        let mut rng = rand_xorshift::XorShiftRng::seed_from_u64(415);
        for _ in 0..20 {
            let p = Program::new_random(&mut rng, &fs, 10, (-1.0, 1.0), (2, 6), InitMethod::HalfAndHalf);
            assert!(Program::from_tokens(p.tokens().to_vec(), 10, (-1.0, 1.0), &fs).is_ok());
        }
    }

    #[test]
    fn init_method_full_produces_longer_and_deeper_programs_than_grow() {
        use rand::SeedableRng;
        let fs = fset(&["add2", "sub2", "mul2", "div2", "sqrt1", "log1", "abs1", "max2", "min2"]);
        let mut rng = rand_xorshift::XorShiftRng::seed_from_u64(415);

        let sample = |rng: &mut rand_xorshift::XorShiftRng, method: InitMethod| {
            let progs: Vec<Program> = (0..20)
                .map(|_| Program::new_random(rng, &fs, 10, (-1.0, 1.0), (2, 6), method))
                .collect();
            let mean_len =
                progs.iter().map(|p| p.length() as f64).sum::<f64>() / progs.len() as f64;
            let mean_depth =
                progs.iter().map(|p| p.depth() as f64).sum::<f64>() / progs.len() as f64;
            (mean_len, mean_depth)
        };

        let (full_len, full_depth) = sample(&mut rng, InitMethod::Full);
        let (hnh_len, hnh_depth) = sample(&mut rng, InitMethod::HalfAndHalf);
        let (grow_len, grow_depth) = sample(&mut rng, InitMethod::Grow);

        assert!(full_len > hnh_len);
        assert!(hnh_len > grow_len);
        assert!(full_depth > hnh_depth);
        assert!(hnh_depth > grow_depth);
    }

    #[test]
    fn init_depth_6_6_forces_full_depth_for_full_method_only() {
        use rand::SeedableRng;
        let fs = fset(&["add2", "sub2", "mul2", "div2", "sqrt1", "log1", "abs1", "max2", "min2"]);
        let mut rng = rand_xorshift::XorShiftRng::seed_from_u64(415);

        let full_depths: Vec<usize> = (0..20)
            .map(|_| Program::new_random(&mut rng, &fs, 10, (-1.0, 1.0), (6, 6), InitMethod::Full).depth())
            .collect();
        assert!(full_depths.iter().all(|&d| d == 6));

        let grow_depths: Vec<usize> = (0..20)
            .map(|_| Program::new_random(&mut rng, &fs, 10, (-1.0, 1.0), (6, 6), InitMethod::Grow).depth())
            .collect();
        assert!(!grow_depths.iter().all(|&d| d == 6));
    }
}
