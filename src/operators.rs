//
// symreg-gp - genetic programming for symbolic regression
//
// File description:
//   Module: genetic operators. Every operator is functional: it borrows
//   `self` and returns a brand new token sequence plus bookkeeping, never
//   mutating its receiver (verified by
//   `crate::operators::tests::operators_never_mutate_receiver`).
//

use rand::Rng;

use crate::function::FunctionSet;
use crate::program::{InitMethod, Program};
use crate::token::Token;

/// Origin metadata for a child program, mirroring gplearn's `parents` dict.
/// Consumed only for introspection/printing — never by fitness computation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Parentage {
    Reproduced { parent: usize },
    Crossover {
        parent: usize,
        parent_idx: (usize, usize),
        donor: usize,
        donor_idx: (usize, usize),
    },
    SubtreeMutation {
        parent: usize,
        parent_idx: (usize, usize),
    },
    HoistMutation {
        parent: usize,
        parent_idx: (usize, usize),
    },
    PointMutation {
        parent: usize,
        mutated_indices: Vec<usize>,
    },
}

/// Returns a copy of `self.program`.
pub fn reproduce(tokens: &[Token]) -> Vec<Token> {
    tokens.to_vec()
}

/// Splices a subtree of `donor` into a subtree position of `self`. The
/// self-subtree is drawn *before* the donor-subtree (frozen ordering).
pub fn crossover(
    program: &Program,
    self_tokens: &[Token],
    donor_tokens: &[Token],
    rng: &mut impl Rng,
) -> (Vec<Token>, (usize, usize), (usize, usize)) {
    let (start, end) = program.get_subtree(rng, self_tokens);
    let (d_start, d_end) = program.get_subtree(rng, donor_tokens);

    let mut new_tokens = Vec::with_capacity(start + (d_end - d_start) + (self_tokens.len() - end));
    new_tokens.extend_from_slice(&self_tokens[..start]);
    new_tokens.extend_from_slice(&donor_tokens[d_start..d_end]);
    new_tokens.extend_from_slice(&self_tokens[end..]);

    (new_tokens, (start, end), (d_start, d_end))
}

/// Crossover against a freshly generated random donor program.
#[allow(clippy::too_many_arguments)]
pub fn subtree_mutation(
    program: &Program,
    self_tokens: &[Token],
    rng: &mut impl Rng,
    function_set: &FunctionSet,
    n_features: usize,
    const_range: (f64, f64),
    init_depth: (usize, usize),
    init_method: InitMethod,
) -> (Vec<Token>, (usize, usize)) {
    let donor = Program::new_random(
        rng,
        function_set,
        n_features,
        const_range,
        init_depth,
        init_method,
    );
    let (tokens, self_range, _donor_range) = crossover(program, self_tokens, donor.tokens(), rng);
    (tokens, self_range)
}

/// Picks subtree `S`, then subtree `T` within `S`, and replaces `self` with
/// `T` — bloat-reducing, since the result is never larger than `S`.
pub fn hoist_mutation(
    program: &Program,
    self_tokens: &[Token],
    rng: &mut impl Rng,
) -> (Vec<Token>, (usize, usize)) {
    let (s_start, s_end) = program.get_subtree(rng, self_tokens);
    let sub = &self_tokens[s_start..s_end];
    let (t_start, t_end) = program.get_subtree(rng, sub);

    let mut new_tokens = Vec::with_capacity(s_start + (t_end - t_start) + (self_tokens.len() - s_end));
    new_tokens.extend_from_slice(&self_tokens[..s_start]);
    new_tokens.extend_from_slice(&sub[t_start..t_end]);
    new_tokens.extend_from_slice(&self_tokens[s_end..]);

    (new_tokens, (s_start, s_end))
}

/// For each token, with probability `p_point_replace`, substitutes a
/// same-arity function or a freshly drawn terminal.
#[allow(clippy::too_many_arguments)]
pub fn point_mutation(
    self_tokens: &[Token],
    rng: &mut impl Rng,
    function_set: &FunctionSet,
    n_features: usize,
    const_range: (f64, f64),
    p_point_replace: f64,
) -> (Vec<Token>, Vec<usize>) {
    let mut new_tokens = self_tokens.to_vec();
    let mut mutated = Vec::new();

    for (i, tok) in new_tokens.iter_mut().enumerate() {
        if rng.gen::<f64>() >= p_point_replace {
            continue;
        }
        mutated.push(i);
        match tok {
            Token::Func(id) => {
                let candidates = function_set.with_arity(id.arity());
                if !candidates.is_empty() {
                    let choice = candidates[rng.gen_range(0..candidates.len())];
                    *tok = Token::Func(choice.id);
                }
            }
            Token::Feature(_) | Token::Constant(_) => {
                let terminal_idx = rng.gen_range(0..=n_features);
                if terminal_idx == n_features {
                    *tok = Token::Constant(rng.gen_range(const_range.0..=const_range.1));
                } else {
                    *tok = Token::Feature(terminal_idx);
                }
            }
        }
    }

    (new_tokens, mutated)
}
