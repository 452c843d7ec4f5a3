#![deny(missing_docs)]
#![doc = "Constraint store, SAT engine, error surface, timing and cancellation shared by the MUS/MSS enumeration crates."]

pub mod dimacs;
pub mod engine;
pub mod errors;
pub mod interrupt;
pub mod stats;
mod store;

pub use engine::{Answer, Engine};
pub use errors::{ErrorInfo, MarcoError, INTERRUPTED_EXIT_STATUS};
pub use interrupt::Interrupt;
pub use stats::{PhaseGuard, PhaseReport, SeriesReport, Stats, StatsReport};
pub use store::{Clause, ConstraintStore, HARD_GROUP};

/// A subset of constraint indices, 0-based.
pub type Seed = Vec<usize>;

/// Returns the indices in `0..n` that are not members of `seed`.
pub fn complement(seed: &[usize], n: usize) -> Seed {
    let mut member = vec![false; n];
    for &idx in seed {
        if idx < n {
            member[idx] = true;
        }
    }
    member
        .iter()
        .enumerate()
        .filter(|(_, &inside)| !inside)
        .map(|(idx, _)| idx)
        .collect()
}

impl ConstraintStore {
    /// Reads a DIMACS CNF or grouped CNF document.
    pub fn from_dimacs<R: std::io::BufRead>(reader: R) -> Result<Self, MarcoError> {
        dimacs::read_store(reader)
    }
}
