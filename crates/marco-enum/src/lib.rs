//! MARCO enumeration of minimal unsatisfiable and maximal satisfiable subsets.
//!
//! [`Enumerator`] alternates between a [`marco_map::MapSolver`], which proposes
//! unexplored seeds, and a [`marco_subset::SubsetSolver`], which classifies a
//! seed and grows or shrinks it to a result. Every result blocks its region of
//! the power set, so the loop ends after finitely many iterations with each
//! MUS and MSS reported exactly once.

#![deny(missing_docs)]

pub mod config;
mod driver;
pub mod plan;

pub use config::{Aim, EnumConfig, Maximize};
pub use driver::{Enumerator, Outcome, ResultKind};
pub use plan::{plan, SeedShape, Step};
