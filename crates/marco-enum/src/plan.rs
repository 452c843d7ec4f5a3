//! Decision table mapping a checked seed to the next step.

pub use marco_map::SeedShape;

/// What to do with a checked seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The seed is already an MSS.
    UseAsMss,
    /// Grow the seed to an MSS.
    Grow,
    /// The seed is already a MUS.
    UseAsMus,
    /// Shrink the seed to a MUS.
    Shrink,
}

/// Chooses the step for a seed with satisfiability `sat` and guarantee `shape`.
pub fn plan(sat: bool, shape: SeedShape) -> Step {
    match (sat, shape) {
        (true, SeedShape::Maximal) => Step::UseAsMss,
        (true, SeedShape::Minimal | SeedShape::Arbitrary) => Step::Grow,
        (false, SeedShape::Minimal) => Step::UseAsMus,
        (false, SeedShape::Maximal | SeedShape::Arbitrary) => Step::Shrink,
    }
}
