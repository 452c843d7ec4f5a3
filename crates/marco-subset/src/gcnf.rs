//! Grouped CNF documents handed to external minimizers.

use std::io::{self, Write};

use marco_core::ConstraintStore;

/// Writes the shrink problem for `seed` as grouped CNF.
///
/// Hard clauses and the clauses of `hard` indices present in the seed go to
/// the don't-care group `{0}`; the clauses of the seed element at position
/// `p` are tagged `{p + 1}`.
pub fn write_gcnf<W: Write>(
    store: &ConstraintStore,
    seed: &[usize],
    hard: &[usize],
    out: &mut W,
) -> io::Result<()> {
    writeln!(out, "p gcnf {} {} {}", store.num_vars(), seed.len(), seed.len())?;
    for clause in store.hard_clauses() {
        writeln!(out, "{{0}} {}", clause.to_dimacs())?;
    }
    for &idx in seed.iter().filter(|idx| hard.contains(idx)) {
        for clause in store.group(idx) {
            writeln!(out, "{{0}} {}", clause.to_dimacs())?;
        }
    }
    for (pos, &idx) in seed.iter().enumerate() {
        if hard.contains(&idx) {
            continue;
        }
        for clause in store.group(idx) {
            writeln!(out, "{{{}}} {}", pos + 1, clause.to_dimacs())?;
        }
    }
    Ok(())
}
