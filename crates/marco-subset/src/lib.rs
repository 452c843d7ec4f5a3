//! Subset solvers answer three questions about a set of constraint indices:
//! is it satisfiable, what maximal satisfiable superset contains it, and what
//! minimal unsatisfiable subset does it contain.

#![deny(missing_docs)]

pub mod gcnf;
mod inprocess;
mod muser;

pub use inprocess::InProcessSolver;
pub use muser::{parse_minimizer_output, MuserSolver, V_LINE_PATTERN};

use marco_core::{MarcoError, Seed};

/// Feasibility and minimization engine over a fixed constraint store.
pub trait SubsetSolver {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Number of constraints.
    fn n(&self) -> usize;

    /// Returns true when the constraints in `seed` (plus hard clauses) are
    /// jointly satisfiable.
    fn check_subset(&mut self, seed: &[usize]) -> Result<bool, MarcoError>;

    /// Extends a satisfiable `seed` to an MSS.
    fn grow(&mut self, seed: &[usize]) -> Result<Seed, MarcoError>;

    /// Extends the seed of the last satisfiable check to an MSS.
    fn grow_current(&mut self) -> Result<Seed, MarcoError>;

    /// Reduces an unsatisfiable `seed` to a MUS that keeps every index of
    /// `hard` found in `seed`.
    fn shrink(&mut self, seed: &[usize], hard: &[usize]) -> Result<Seed, MarcoError>;

    /// Reduces the seed of the last unsatisfiable check to a MUS.
    fn shrink_current(&mut self, hard: &[usize]) -> Result<Seed, MarcoError>;
}
