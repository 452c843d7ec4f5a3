//! Sequential counter encoding of at-most-k constraints.

use marco_core::engine::{Lit, Var};

/// Clauses forcing at most `k` of `lits` to be true.
///
/// Auxiliary register variables are drawn from `fresh`. No clauses are
/// produced when the bound is trivially satisfied.
pub fn at_most<F>(lits: &[Lit], k: usize, mut fresh: F) -> Vec<Vec<Lit>>
where
    F: FnMut() -> Var,
{
    let n = lits.len();
    if k >= n {
        return Vec::new();
    }
    if k == 0 {
        return lits.iter().map(|&lit| vec![!lit]).collect();
    }

    // regs[i][j] is true when at least j + 1 of lits[0..=i] are true.
    let regs: Vec<Vec<Lit>> = (0..n - 1)
        .map(|_| (0..k).map(|_| fresh().pos_lit()).collect())
        .collect();

    let mut clauses = Vec::new();
    clauses.push(vec![!lits[0], regs[0][0]]);
    for j in 1..k {
        clauses.push(vec![!regs[0][j]]);
    }
    for i in 1..n - 1 {
        clauses.push(vec![!lits[i], regs[i][0]]);
        clauses.push(vec![!regs[i - 1][0], regs[i][0]]);
        for j in 1..k {
            clauses.push(vec![!lits[i], !regs[i - 1][j - 1], regs[i][j]]);
            clauses.push(vec![!regs[i - 1][j], regs[i][j]]);
        }
        clauses.push(vec![!lits[i], !regs[i - 1][k - 1]]);
    }
    clauses.push(vec![!lits[n - 1], !regs[n - 2][k - 1]]);
    clauses
}
