//! Incremental SAT engine shared by the map and subset solvers.
//!
//! Minisat through `rustsat`. A query runs in slices of [`CONFLICT_SLICE`]
//! conflicts and the [`Interrupt`] is polled between slices, so a stop
//! request lands while the engine is still searching.

use std::fmt;

use rustsat::solvers::{LimitConflicts, PhaseLit, Solve, SolveIncremental, SolverResult};
use rustsat::types::TernaryVal;
use rustsat_minisat::core::Minisat;
use tracing::trace;

use crate::errors::{ErrorInfo, MarcoError};
use crate::interrupt::Interrupt;

pub use rustsat::types::{Lit, Var};

/// Conflicts the engine may spend before the interrupt is polled again.
pub const CONFLICT_SLICE: u32 = 2_000;

/// Answer to an assumption query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Satisfiable; value of every engine variable, indexed by variable.
    Sat(Vec<bool>),
    /// Unsatisfiable; the assumptions that took part in the refutation.
    /// Empty when the clauses alone are contradictory.
    Unsat(Vec<Lit>),
}

/// Literal for a signed DIMACS integer. `lit` must be non-zero.
pub fn dimacs_lit(lit: i32) -> Lit {
    Lit::new(lit.unsigned_abs() - 1, lit < 0)
}

/// Signed DIMACS integer for `lit`.
pub fn to_dimacs(lit: Lit) -> i64 {
    let var = lit.var().idx() as i64 + 1;
    if lit.is_neg() {
        -var
    } else {
        var
    }
}

fn engine_error(operation: &str, err: impl fmt::Display) -> MarcoError {
    MarcoError::Solver(
        ErrorInfo::new("engine-failure", err.to_string()).with_context("operation", operation),
    )
}

/// One Minisat instance plus the variable counter handing out fresh variables.
pub struct Engine {
    solver: Minisat,
    num_vars: u32,
    reserved: u32,
    phases: Vec<Lit>,
    slices: u64,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("num_vars", &self.num_vars)
            .field("slices", &self.slices)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Engine over variables `0..num_vars` and no clauses.
    pub fn new(num_vars: u32) -> Self {
        Self {
            solver: Minisat::default(),
            num_vars,
            reserved: 0,
            phases: Vec::new(),
            slices: 0,
        }
    }

    /// Number of variables handed out so far.
    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    /// Conflict slices that ended without an answer, over the engine's life.
    pub fn slices(&self) -> u64 {
        self.slices
    }

    /// A variable no clause mentions yet.
    pub fn fresh_var(&mut self) -> Var {
        let var = Var::new(self.num_vars);
        self.num_vars += 1;
        var
    }

    fn cover(&mut self, lits: &[Lit]) {
        if let Some(top) = lits.iter().map(|lit| lit.var().idx() as u32 + 1).max() {
            self.num_vars = self.num_vars.max(top);
        }
    }

    fn reserve(&mut self) -> Result<(), MarcoError> {
        if self.num_vars > self.reserved {
            self.solver
                .reserve(Var::new(self.num_vars - 1))
                .map_err(|err| engine_error("reserve", err))?;
            self.reserved = self.num_vars;
        }
        Ok(())
    }

    /// Adds `lits` as a permanent clause.
    pub fn add_clause(&mut self, lits: Vec<Lit>) -> Result<(), MarcoError> {
        self.cover(&lits);
        self.reserve()?;
        self.solver
            .add_clause(lits.into_iter().collect())
            .map_err(|err| engine_error("add-clause", err))
    }

    /// Makes the engine try `lit` first when it branches on its variable.
    /// Takes effect from the next [`Engine::solve`].
    pub fn set_phase(&mut self, lit: Lit) {
        self.cover(&[lit]);
        self.phases.push(lit);
    }

    fn apply_phases(&mut self) -> Result<(), MarcoError> {
        for lit in std::mem::take(&mut self.phases) {
            self.solver
                .phase_lit(lit)
                .map_err(|err| engine_error("phase", err))?;
        }
        Ok(())
    }

    /// Solves under `assumptions`, polling `interrupt` between conflict slices.
    pub fn solve(&mut self, assumptions: &[Lit], interrupt: &Interrupt) -> Result<Answer, MarcoError> {
        self.cover(assumptions);
        self.reserve()?;
        self.apply_phases()?;
        loop {
            interrupt.check()?;
            self.solver
                .limit_conflicts(Some(CONFLICT_SLICE))
                .map_err(|err| engine_error("limit", err))?;
            let result = self
                .solver
                .solve_assumps(assumptions)
                .map_err(|err| engine_error("solve", err))?;
            match result {
                SolverResult::Sat => return Ok(Answer::Sat(self.model())),
                SolverResult::Unsat => {
                    // The engine reports the clause of negated assumptions.
                    let core = self.solver.core().map_err(|err| engine_error("core", err))?;
                    return Ok(Answer::Unsat(core.into_iter().map(|lit| !lit).collect()));
                }
                SolverResult::Interrupted => {
                    self.slices += 1;
                    trace!(slices = self.slices, "conflict slice spent");
                }
            }
        }
    }

    fn model(&self) -> Vec<bool> {
        (0..self.num_vars)
            .map(|idx| matches!(self.solver.lit_val(Lit::positive(idx)), Ok(TernaryVal::True)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lits(values: &[i32]) -> Vec<Lit> {
        values.iter().map(|&lit| dimacs_lit(lit)).collect()
    }

    #[test]
    fn dimacs_conversion_is_signed_and_one_based() {
        assert_eq!(dimacs_lit(3), Lit::positive(2));
        assert_eq!(dimacs_lit(-1), Lit::negative(0));
        assert_eq!(to_dimacs(Lit::negative(4)), -5);
        assert_eq!(to_dimacs(dimacs_lit(7)), 7);
    }

    #[test]
    fn models_satisfy_the_clauses() {
        let mut engine = Engine::new(3);
        engine.add_clause(lits(&[1, 2])).unwrap();
        engine.add_clause(lits(&[-1])).unwrap();
        engine.add_clause(lits(&[-2, 3])).unwrap();
        let Answer::Sat(model) = engine.solve(&[], &Interrupt::new()).unwrap() else {
            panic!("expected a model");
        };
        assert_eq!(model.len(), 3);
        assert!(!model[0] && model[1] && model[2]);
    }

    #[test]
    fn cores_name_the_conflicting_assumptions() {
        // (x1 | x2), (!x1 | !x2); x3 is irrelevant.
        let mut engine = Engine::new(3);
        engine.add_clause(lits(&[1, 2])).unwrap();
        engine.add_clause(lits(&[-1, -2])).unwrap();
        let Answer::Unsat(core) = engine.solve(&lits(&[1, 2, 3]), &Interrupt::new()).unwrap() else {
            panic!("expected a refutation");
        };
        assert!(!core.is_empty());
        assert!(core.iter().all(|lit| lits(&[1, 2]).contains(lit)), "{core:?}");
        assert!(matches!(engine.solve(&lits(&[1, 3]), &Interrupt::new()).unwrap(), Answer::Sat(_)));
    }

    #[test]
    fn contradictory_clauses_give_an_empty_core() {
        let mut engine = Engine::new(2);
        engine.add_clause(lits(&[1])).unwrap();
        engine.add_clause(lits(&[-1])).unwrap();
        assert_eq!(
            engine.solve(&lits(&[2]), &Interrupt::new()).unwrap(),
            Answer::Unsat(vec![])
        );
    }

    #[test]
    fn phase_hints_pick_the_first_model() {
        let mut engine = Engine::new(0);
        let vars: Vec<Var> = (0..4).map(|_| engine.fresh_var()).collect();
        for var in &vars {
            engine.set_phase(var.pos_lit());
        }
        let Answer::Sat(model) = engine.solve(&[], &Interrupt::new()).unwrap() else {
            panic!("expected a model");
        };
        assert_eq!(model, vec![true; 4]);
    }

    #[test]
    fn triggered_interrupt_stops_before_solving() {
        let mut engine = Engine::new(1);
        engine.add_clause(lits(&[1])).unwrap();
        let interrupt = Interrupt::new();
        interrupt.trigger();
        let err = engine.solve(&[], &interrupt).unwrap_err();
        assert!(err.is_interrupted());
        assert_eq!(err.info().code, "interrupted");
    }

    #[test]
    fn pigeonhole_refutation_completes() {
        // Seven pigeons, six holes.
        let (pigeons, holes) = (7u32, 6u32);
        let var = |p: u32, h: u32| Lit::positive(p * holes + h);
        let mut engine = Engine::new(pigeons * holes);
        for p in 0..pigeons {
            engine.add_clause((0..holes).map(|h| var(p, h)).collect()).unwrap();
        }
        for h in 0..holes {
            for p in 0..pigeons {
                for q in p + 1..pigeons {
                    engine.add_clause(vec![!var(p, h), !var(q, h)]).unwrap();
                }
            }
        }
        assert_eq!(engine.solve(&[], &Interrupt::new()).unwrap(), Answer::Unsat(vec![]));
    }
}
