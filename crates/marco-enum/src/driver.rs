use std::collections::VecDeque;
use std::fmt;
use std::io::Write;

use marco_core::{complement, Interrupt, MarcoError, Seed, Stats};
use marco_map::{Bias, MapSolver, SeedShape};
use marco_subset::SubsetSolver;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{Aim, EnumConfig, Maximize};
use crate::plan::{plan, Step};

/// Kind of an emitted result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultKind {
    /// Minimal unsatisfiable subset.
    Mus,
    /// Maximal satisfiable subset.
    Mss,
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultKind::Mus => f.write_str("MUS"),
            ResultKind::Mss => f.write_str("MSS"),
        }
    }
}

/// One enumeration result; `subset` holds 0-based indices in ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Result kind.
    pub kind: ResultKind,
    /// Constraint indices.
    pub subset: Seed,
}

fn shape_after_extend(bias: Bias) -> SeedShape {
    match bias {
        Bias::High => SeedShape::Maximal,
        Bias::Low => SeedShape::Minimal,
    }
}

/// Drives the map and subset solvers until every subset is explained.
///
/// Results are produced lazily through [`Iterator`]; an error ends the run.
pub struct Enumerator {
    config: EnumConfig,
    map: MapSolver,
    subs: Box<dyn SubsetSolver>,
    stats: Stats,
    interrupt: Interrupt,
    hard: Vec<usize>,
    pending: VecDeque<Outcome>,
    done: bool,
}

impl fmt::Debug for Enumerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Enumerator")
            .field("config", &self.config)
            .field("map", &self.map)
            .field("subset_solver", &self.subs.name())
            .field("hard", &self.hard)
            .field("done", &self.done)
            .finish()
    }
}

impl Enumerator {
    /// Builds the map solver for `subs` and validates `config`.
    pub fn new(config: EnumConfig, subs: Box<dyn SubsetSolver>) -> Result<Self, MarcoError> {
        config.validate()?;
        let map = MapSolver::new(subs.n(), config.map_options());
        info!(
            constraints = subs.n(),
            subset_solver = subs.name(),
            aim = ?config.aim,
            maximize = ?config.maximize,
            smus = config.smus,
            "enumeration configured"
        );
        Ok(Self {
            config,
            map,
            subs,
            stats: Stats::new(),
            interrupt: Interrupt::new(),
            hard: Vec::new(),
            pending: VecDeque::new(),
            done: false,
        })
    }

    /// Checks `interrupt` at every iteration and inside map queries.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.map = self.map.with_interrupt(interrupt.clone());
        self.interrupt = interrupt;
        self
    }

    /// Mirrors the map formula to `sink`.
    pub fn with_map_dump(mut self, sink: Box<dyn Write>) -> Self {
        self.map = self.map.with_dump(sink);
        self
    }

    /// Phase timings and result counters of the run so far.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Indices currently treated as hard during shrink.
    pub fn hard(&self) -> &[usize] {
        &self.hard
    }

    fn iterate(&mut self) -> Result<(), MarcoError> {
        self.interrupt.check()?;

        let seed = {
            let _phase = self.stats.time("seed");
            self.map.next_seed()?
        };
        let Some(mut seed) = seed else {
            debug!("no seed left");
            self.done = true;
            return Ok(());
        };
        self.stats.add_sample("seed_size", seed.len() as f64);
        let aim_bias = self.config.aim_bias();
        let mut shape = self.map.seed_shape();

        if self.config.maximize == Maximize::Always {
            let _phase = self.stats.time("maximize");
            seed = self.map.maximize_seed(&seed, aim_bias)?;
            shape = shape_after_extend(aim_bias);
        }

        let mut sat = {
            let _phase = self.stats.time("check");
            self.subs.check_subset(&seed)?
        };

        if self.config.maximize == Maximize::Half && sat == (self.config.aim == Aim::Muses) {
            {
                let _phase = self.stats.time("maximize");
                seed = self.map.maximize_seed(&seed, aim_bias)?;
            }
            shape = shape_after_extend(aim_bias);
            let _phase = self.stats.time("check");
            sat = self.subs.check_subset(&seed)?;
        }

        match plan(sat, shape) {
            Step::UseAsMss => self.record_mss(seed),
            Step::Grow => {
                let mss = {
                    let _phase = self.stats.time("grow");
                    self.subs.grow_current()?
                };
                self.record_mss(mss)
            }
            Step::UseAsMus => self.record_mus(seed),
            Step::Shrink => {
                let mus = {
                    let _phase = self.stats.time("shrink");
                    self.subs.shrink_current(&self.hard)?
                };
                self.record_mus(mus)
            }
        }
    }

    fn record_mss(&mut self, mut mss: Seed) -> Result<(), MarcoError> {
        mss.sort_unstable();
        {
            let _phase = self.stats.time("block");
            self.map.block_down(&mss)?;
        }
        let n = self.subs.n();
        if self.config.use_singletons && mss.len() + 1 == n {
            if let Some(&missing) = complement(&mss, n).first() {
                if !self.hard.contains(&missing) {
                    debug!(index = missing, "singleton MCS becomes hard");
                    self.hard.push(missing);
                }
            }
        }
        self.stats.increment("mss");
        self.stats.add_sample("mss_size", mss.len() as f64);
        self.pending.push_back(Outcome {
            kind: ResultKind::Mss,
            subset: mss.clone(),
        });
        if self.config.mssguided {
            self.explore_above(&mss)?;
        }
        Ok(())
    }

    /// Shrinks every unexplored immediate superset of `mss`.
    fn explore_above(&mut self, mss: &[usize]) -> Result<(), MarcoError> {
        for extra in complement(mss, self.subs.n()) {
            self.interrupt.check()?;
            let mut candidate = mss.to_vec();
            candidate.push(extra);
            candidate.sort_unstable();
            let unexplored = {
                let _phase = self.stats.time("mssguided");
                self.map.check_seed(&candidate)?
            };
            if !unexplored {
                continue;
            }
            let mus = {
                let _phase = self.stats.time("shrink");
                self.subs.shrink(&candidate, &self.hard)?
            };
            self.record_mus(mus)?;
        }
        Ok(())
    }

    fn record_mus(&mut self, mut mus: Seed) -> Result<(), MarcoError> {
        mus.sort_unstable();
        {
            let _phase = self.stats.time("block");
            self.map.block_up(&mus)?;
            if self.config.smus {
                self.map.block_down(&mus)?;
                self.map.block_above_size(mus.len().saturating_sub(1))?;
            }
        }
        self.stats.increment("mus");
        self.stats.add_sample("mus_size", mus.len() as f64);
        self.pending.push_back(Outcome {
            kind: ResultKind::Mus,
            subset: mus,
        });
        Ok(())
    }
}

impl Iterator for Enumerator {
    type Item = Result<Outcome, MarcoError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(outcome) = self.pending.pop_front() {
                return Some(Ok(outcome));
            }
            if self.done {
                return None;
            }
            if let Err(err) = self.iterate() {
                self.done = true;
                return Some(Err(err));
            }
        }
    }
}
