//! Map solver: a propositional formula over one selector variable per
//! constraint whose models are exactly the subsets not yet explained by an
//! emitted MUS or MSS.

#![deny(missing_docs)]

pub mod card;

use std::io::Write;

use marco_core::engine::{to_dimacs, Answer, Engine, Lit};
use marco_core::{complement, Interrupt, MarcoError, Seed};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Preferred direction for seeds handed to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bias {
    /// Seeds are pushed towards larger subsets.
    High,
    /// Seeds are pushed towards smaller subsets.
    Low,
}

/// What the driver may assume about a seed's position in the unexplored region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeedShape {
    /// No unexplored strict superset exists.
    Maximal,
    /// No unexplored strict subset exists.
    Minimal,
    /// No guarantee.
    Arbitrary,
}

/// Construction options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapOptions {
    /// Direction seeds are extremized in, if any.
    pub bias: Option<Bias>,
    /// Extremize by cardinality instead of by inclusion.
    pub optimal: bool,
}

/// Formula over selectors `s_0..s_{n-1}` plus auxiliary counter variables.
pub struct MapSolver {
    n: usize,
    engine: Engine,
    options: MapOptions,
    exhausted: bool,
    bounded: bool,
    interrupt: Interrupt,
    dump: Option<Box<dyn Write>>,
}

impl std::fmt::Debug for MapSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapSolver")
            .field("n", &self.n)
            .field("options", &self.options)
            .field("exhausted", &self.exhausted)
            .field("bounded", &self.bounded)
            .finish()
    }
}

fn selected_lit(index: usize) -> Lit {
    Lit::positive(index as u32)
}

fn dropped_lit(index: usize) -> Lit {
    Lit::negative(index as u32)
}

impl MapSolver {
    /// Creates a map over `n` constraints with every subset unexplored.
    pub fn new(n: usize, options: MapOptions) -> Self {
        let mut engine = Engine::new(n as u32);
        if let Some(bias) = options.bias {
            for idx in 0..n {
                engine.set_phase(match bias {
                    Bias::High => selected_lit(idx),
                    Bias::Low => dropped_lit(idx),
                });
            }
        }
        Self {
            n,
            engine,
            options,
            exhausted: false,
            bounded: false,
            interrupt: Interrupt::new(),
            dump: None,
        }
    }

    /// Polls `interrupt` during every engine call.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Mirrors every permanent clause to `sink` in DIMACS form.
    pub fn with_dump(mut self, sink: Box<dyn Write>) -> Self {
        self.dump = Some(sink);
        self
    }

    /// Number of constraints.
    pub fn n(&self) -> usize {
        self.n
    }

    /// Options the map was built with.
    pub fn options(&self) -> MapOptions {
        self.options
    }

    /// True once no unexplored subset remains.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Guarantee carried by seeds returned from [`MapSolver::next_seed`].
    ///
    /// A size bound cuts off supersets that may still be unexplained, so high
    /// seeds are no longer maximal once one is in place.
    pub fn seed_shape(&self) -> SeedShape {
        match self.options.bias {
            Some(Bias::High) if !self.bounded => SeedShape::Maximal,
            Some(Bias::Low) => SeedShape::Minimal,
            _ => SeedShape::Arbitrary,
        }
    }

    /// Returns an unexplored subset, or `None` once the map is exhausted.
    pub fn next_seed(&mut self) -> Result<Option<Seed>, MarcoError> {
        if self.exhausted {
            return Ok(None);
        }
        let Some(model) = self.solve(&[])? else {
            self.exhausted = true;
            debug!("map exhausted");
            return Ok(None);
        };
        let seed = self.selected(&model);
        let seed = match self.options.bias {
            Some(bias) if self.options.optimal => self.optimize(seed, bias)?,
            Some(bias) => self.extend(seed, bias)?,
            None => seed,
        };
        trace!(size = seed.len(), "map seed");
        Ok(Some(seed))
    }

    /// Extends an unexplored `seed` to an inclusion-extremal unexplored subset
    /// in direction `bias`: a superset for [`Bias::High`], a subset for
    /// [`Bias::Low`].
    pub fn maximize_seed(&mut self, seed: &[usize], bias: Bias) -> Result<Seed, MarcoError> {
        let mut seed = seed.to_vec();
        seed.sort_unstable();
        self.extend(seed, bias)
    }

    /// Returns true when exactly `seed` is still unexplored.
    pub fn check_seed(&mut self, seed: &[usize]) -> Result<bool, MarcoError> {
        let mut inside = vec![false; self.n];
        for &idx in seed {
            inside[idx] = true;
        }
        let assumptions: Vec<Lit> = inside
            .iter()
            .enumerate()
            .map(|(idx, &value)| if value { selected_lit(idx) } else { dropped_lit(idx) })
            .collect();
        Ok(self.solve(&assumptions)?.is_some())
    }

    /// Indices of the constraints outside `seed`.
    pub fn complement(&self, seed: &[usize]) -> Seed {
        complement(seed, self.n)
    }

    /// Marks every subset of `mss` explored.
    pub fn block_down(&mut self, mss: &[usize]) -> Result<(), MarcoError> {
        let clause: Vec<Lit> = self.complement(mss).into_iter().map(selected_lit).collect();
        self.add_permanent(clause)
    }

    /// Marks every superset of `mus` explored.
    pub fn block_up(&mut self, mus: &[usize]) -> Result<(), MarcoError> {
        let clause: Vec<Lit> = mus.iter().map(|&idx| dropped_lit(idx)).collect();
        self.add_permanent(clause)
    }

    /// Permanently excludes every subset with more than `k` elements.
    pub fn block_above_size(&mut self, k: usize) -> Result<(), MarcoError> {
        let selectors: Vec<Lit> = (0..self.n).map(selected_lit).collect();
        let engine = &mut self.engine;
        let clauses = card::at_most(&selectors, k, || engine.fresh_var());
        self.bounded = true;
        debug!(k, clauses = clauses.len(), "size bound added");
        for clause in clauses {
            self.add_permanent(clause)?;
        }
        Ok(())
    }

    fn add_permanent(&mut self, clause: Vec<Lit>) -> Result<(), MarcoError> {
        if let Some(sink) = self.dump.as_mut() {
            let mut line = String::new();
            for &lit in &clause {
                line.push_str(&to_dimacs(lit).to_string());
                line.push(' ');
            }
            writeln!(sink, "{line}0")?;
        }
        if clause.is_empty() {
            self.exhausted = true;
            return Ok(());
        }
        self.engine.add_clause(clause)
    }

    fn solve(&mut self, assumptions: &[Lit]) -> Result<Option<Vec<bool>>, MarcoError> {
        match self.engine.solve(assumptions, &self.interrupt)? {
            Answer::Sat(model) => Ok(Some(model)),
            Answer::Unsat(_) => Ok(None),
        }
    }

    fn selected(&self, model: &[bool]) -> Seed {
        (0..self.n).filter(|&idx| model[idx]).collect()
    }

    /// Adds a clause that only binds while a fresh activation literal is
    /// assumed, then retires the literal.
    fn solve_guarded(
        &mut self,
        mut clause: Vec<Lit>,
        mut assumptions: Vec<Lit>,
    ) -> Result<Option<Vec<bool>>, MarcoError> {
        let guard = self.engine.fresh_var();
        clause.push(guard.neg_lit());
        self.engine.add_clause(clause)?;
        assumptions.push(guard.pos_lit());
        let result = self.solve(&assumptions);
        self.engine.add_clause(vec![guard.neg_lit()])?;
        result
    }

    fn extend(&mut self, mut seed: Seed, bias: Bias) -> Result<Seed, MarcoError> {
        loop {
            let outside = self.complement(&seed);
            let (clause, assumptions): (Vec<Lit>, Vec<Lit>) = match bias {
                Bias::High => {
                    if outside.is_empty() {
                        return Ok(seed);
                    }
                    (
                        outside.iter().map(|&i| selected_lit(i)).collect(),
                        seed.iter().map(|&i| selected_lit(i)).collect(),
                    )
                }
                Bias::Low => {
                    if seed.is_empty() {
                        return Ok(seed);
                    }
                    (
                        seed.iter().map(|&i| dropped_lit(i)).collect(),
                        outside.iter().map(|&i| dropped_lit(i)).collect(),
                    )
                }
            };
            match self.solve_guarded(clause, assumptions)? {
                Some(model) => seed = self.selected(&model),
                None => return Ok(seed),
            }
        }
    }

    fn optimize(&mut self, mut seed: Seed, bias: Bias) -> Result<Seed, MarcoError> {
        loop {
            let size = seed.len();
            let (lits, bound): (Vec<Lit>, usize) = match bias {
                Bias::High => {
                    if size == self.n {
                        return Ok(seed);
                    }
                    let negated = (0..self.n).map(dropped_lit).collect();
                    (negated, self.n - size - 1)
                }
                Bias::Low => {
                    if size == 0 {
                        return Ok(seed);
                    }
                    let positive = (0..self.n).map(selected_lit).collect();
                    (positive, size - 1)
                }
            };
            let guard = self.engine.fresh_var();
            let engine = &mut self.engine;
            let clauses = card::at_most(&lits, bound, || engine.fresh_var());
            for mut clause in clauses {
                clause.push(guard.neg_lit());
                self.engine.add_clause(clause)?;
            }
            let result = self.solve(&[guard.pos_lit()]);
            self.engine.add_clause(vec![guard.neg_lit()])?;
            match result? {
                Some(model) => seed = self.selected(&model),
                None => return Ok(seed),
            }
        }
    }
}
