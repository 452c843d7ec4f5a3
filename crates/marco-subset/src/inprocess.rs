use std::collections::BTreeSet;
use std::sync::Arc;

use marco_core::engine::{dimacs_lit, Answer, Engine, Lit};
use marco_core::{ConstraintStore, ErrorInfo, Interrupt, MarcoError, Seed};
use tracing::{debug, trace};

use crate::SubsetSolver;

#[derive(Debug, Clone)]
enum LastCheck {
    Sat { seed: Seed, model: Vec<bool> },
    Unsat { seed: Seed, core: Seed },
}

/// Subset solver backed by one incremental engine.
///
/// Constraint `i` is guarded by an indicator variable `a_i`: every clause `C`
/// of the constraint is loaded as `C | !a_i`, so assuming `a_i` switches the
/// constraint on.
#[derive(Debug)]
pub struct InProcessSolver {
    store: Arc<ConstraintStore>,
    engine: Engine,
    first_indicator: usize,
    interrupt: Interrupt,
    last: Option<LastCheck>,
}

impl InProcessSolver {
    /// Loads `store` into a fresh engine.
    ///
    /// Fails only when the engine cannot take the clauses.
    pub fn new(store: Arc<ConstraintStore>) -> Result<Self, MarcoError> {
        let first_indicator = store.num_vars() as usize;
        let mut engine = Engine::new((first_indicator + store.len()) as u32);
        for clause in store.hard_clauses() {
            engine.add_clause(clause.literals().iter().map(|&l| dimacs_lit(l)).collect())?;
        }
        for idx in 0..store.len() {
            let indicator = Lit::negative((first_indicator + idx) as u32);
            for clause in store.group(idx) {
                let mut lits: Vec<Lit> = clause.literals().iter().map(|&l| dimacs_lit(l)).collect();
                lits.push(indicator);
                engine.add_clause(lits)?;
            }
        }
        debug!(
            constraints = store.len(),
            vars = store.num_vars(),
            "in-process subset solver ready"
        );
        Ok(Self {
            store,
            engine,
            first_indicator,
            interrupt: Interrupt::new(),
            last: None,
        })
    }

    /// Polls `interrupt` inside engine calls and grow/shrink loops.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// The store this solver was built from.
    pub fn store(&self) -> &Arc<ConstraintStore> {
        &self.store
    }

    pub(crate) fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    /// Seed of the last check if it was unsatisfiable.
    pub(crate) fn last_unsat_seed(&self) -> Option<&[usize]> {
        match &self.last {
            Some(LastCheck::Unsat { seed, .. }) => Some(seed),
            _ => None,
        }
    }

    fn indicator(&self, idx: usize) -> Lit {
        Lit::positive((self.first_indicator + idx) as u32)
    }

    fn check(&mut self, seed: &[usize]) -> Result<bool, MarcoError> {
        let assumptions: Vec<Lit> = seed.iter().map(|&idx| self.indicator(idx)).collect();
        let result = match self.engine.solve(&assumptions, &self.interrupt) {
            Ok(result) => result,
            Err(err) => {
                self.last = None;
                return Err(err);
            }
        };
        let mut sorted = seed.to_vec();
        sorted.sort_unstable();
        match result {
            Answer::Sat(model) => {
                self.last = Some(LastCheck::Sat { seed: sorted, model });
                Ok(true)
            }
            Answer::Unsat(core) => {
                let n = self.store.len();
                let mut core: Seed = core
                    .into_iter()
                    .map(|lit| lit.var().idx())
                    .filter(|&var| var >= self.first_indicator && var - self.first_indicator < n)
                    .map(|var| var - self.first_indicator)
                    .collect();
                core.sort_unstable();
                core.dedup();
                self.last = Some(LastCheck::Unsat { seed: sorted, core });
                Ok(false)
            }
        }
    }

    /// Constraints satisfied by the first `num_vars` values of `model`.
    fn satisfied_by(&self, model: &[bool]) -> Vec<usize> {
        let limit = self.first_indicator.min(model.len());
        self.store.satisfied_groups(&model[..limit])
    }

    fn grow_from(&mut self, seed: Seed, model: Vec<bool>) -> Result<Seed, MarcoError> {
        let mut current: BTreeSet<usize> = seed.into_iter().collect();
        current.extend(self.satisfied_by(&model));
        for idx in 0..self.store.len() {
            if current.contains(&idx) {
                continue;
            }
            self.interrupt.check()?;
            let mut trial: Seed = current.iter().copied().collect();
            trial.push(idx);
            if self.check(&trial)? {
                if let Some(LastCheck::Sat { model, .. }) = &self.last {
                    let free = self.satisfied_by(model);
                    current.extend(free);
                }
                current.insert(idx);
            }
        }
        let mss: Seed = current.into_iter().collect();
        trace!(size = mss.len(), "grow finished");
        Ok(mss)
    }

    fn shrink_from(&mut self, seed: Seed, core: Seed, hard: &[usize]) -> Result<Seed, MarcoError> {
        let pinned: BTreeSet<usize> = seed.iter().copied().filter(|idx| hard.contains(idx)).collect();
        let mut current: BTreeSet<usize> = core.into_iter().chain(pinned.iter().copied()).collect();
        let mut necessary: BTreeSet<usize> = BTreeSet::new();

        loop {
            let candidate = current
                .iter()
                .copied()
                .find(|idx| !necessary.contains(idx) && !pinned.contains(idx));
            let Some(candidate) = candidate else {
                break;
            };
            self.interrupt.check()?;
            let trial: Seed = current.iter().copied().filter(|&idx| idx != candidate).collect();
            if self.check(&trial)? {
                necessary.insert(candidate);
                continue;
            }
            let refined: BTreeSet<usize> = match &self.last {
                Some(LastCheck::Unsat { core, .. }) => core.iter().copied().collect(),
                _ => trial.iter().copied().collect(),
            };
            current = refined.into_iter().chain(pinned.iter().copied()).collect();
        }
        let mus: Seed = current.into_iter().collect();
        trace!(size = mus.len(), "shrink finished");
        Ok(mus)
    }
}

fn misuse(code: &str, message: &str, seed: &[usize]) -> MarcoError {
    MarcoError::Solver(ErrorInfo::new(code, message).with_context("seed", format!("{seed:?}")))
}

impl SubsetSolver for InProcessSolver {
    fn name(&self) -> &'static str {
        "in-process"
    }

    fn n(&self) -> usize {
        self.store.len()
    }

    fn check_subset(&mut self, seed: &[usize]) -> Result<bool, MarcoError> {
        self.check(seed)
    }

    fn grow(&mut self, seed: &[usize]) -> Result<Seed, MarcoError> {
        if !self.check(seed)? {
            return Err(misuse("grow-unsat-seed", "cannot grow an unsatisfiable seed", seed));
        }
        self.grow_current()
    }

    fn grow_current(&mut self) -> Result<Seed, MarcoError> {
        match self.last.take() {
            Some(LastCheck::Sat { seed, model }) => self.grow_from(seed, model),
            other => {
                self.last = other;
                Err(MarcoError::Solver(ErrorInfo::new(
                    "no-satisfiable-check",
                    "grow_current needs a preceding satisfiable check",
                )))
            }
        }
    }

    fn shrink(&mut self, seed: &[usize], hard: &[usize]) -> Result<Seed, MarcoError> {
        if self.check(seed)? {
            return Err(misuse("shrink-sat-seed", "cannot shrink a satisfiable seed", seed));
        }
        self.shrink_current(hard)
    }

    fn shrink_current(&mut self, hard: &[usize]) -> Result<Seed, MarcoError> {
        match self.last.take() {
            Some(LastCheck::Unsat { seed, core }) => self.shrink_from(seed, core, hard),
            other => {
                self.last = other;
                Err(MarcoError::Solver(ErrorInfo::new(
                    "no-unsatisfiable-check",
                    "shrink_current needs a preceding unsatisfiable check",
                )))
            }
        }
    }
}
