use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, MarcoError};

/// Tag of the hard ("don't care") group in grouped CNF.
pub const HARD_GROUP: usize = 0;

/// A primitive disjunction in DIMACS literal form (no terminating zero).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Clause {
    literals: Box<[i32]>,
}

impl fmt::Debug for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Clause").field(&self.literals).finish()
    }
}

impl Clause {
    /// Wraps a literal list; zero literals are rejected.
    pub fn new(literals: Vec<i32>) -> Result<Self, MarcoError> {
        if literals.contains(&0) {
            let info = ErrorInfo::new("zero-literal", "clause literals must be non-zero")
                .with_context("clause", format!("{literals:?}"));
            return Err(MarcoError::Input(info));
        }
        Ok(Self {
            literals: literals.into_boxed_slice(),
        })
    }

    /// Returns the literals of the clause.
    pub fn literals(&self) -> &[i32] {
        &self.literals
    }

    /// Largest variable mentioned by the clause (0 for the empty clause).
    pub fn max_var(&self) -> u32 {
        self.literals
            .iter()
            .map(|lit| lit.unsigned_abs())
            .max()
            .unwrap_or(0)
    }

    /// Evaluates the clause under a full assignment indexed by `var - 1`.
    pub fn is_satisfied_by(&self, model: &[bool]) -> bool {
        self.literals.iter().any(|&lit| {
            let idx = lit.unsigned_abs() as usize - 1;
            model.get(idx).is_some_and(|&value| value == (lit > 0))
        })
    }

    /// Writes the clause as a DIMACS line body (`l1 l2 ... 0`).
    pub fn to_dimacs(&self) -> String {
        let mut line = String::new();
        for lit in self.literals.iter() {
            line.push_str(&lit.to_string());
            line.push(' ');
        }
        line.push('0');
        line
    }
}

/// Immutable store of the grouped formula shared by both solvers.
///
/// Constraint `i` (0-based) corresponds to group tag `i + 1`; hard clauses
/// belong to group [`HARD_GROUP`] and are never constraint indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintStore {
    num_vars: u32,
    hard: Vec<Clause>,
    groups: Vec<Vec<Clause>>,
}

impl ConstraintStore {
    /// Builds a store, widening `num_vars` to cover every literal.
    pub fn new(num_vars: u32, hard: Vec<Clause>, groups: Vec<Vec<Clause>>) -> Self {
        let observed = hard
            .iter()
            .chain(groups.iter().flatten())
            .map(Clause::max_var)
            .max()
            .unwrap_or(0);
        Self {
            num_vars: num_vars.max(observed),
            hard,
            groups,
        }
    }

    /// Convenience constructor from raw literal lists, one group per entry.
    pub fn from_groups(groups: Vec<Vec<Vec<i32>>>) -> Result<Self, MarcoError> {
        let groups = groups
            .into_iter()
            .map(|group| group.into_iter().map(Clause::new).collect())
            .collect::<Result<Vec<Vec<Clause>>, _>>()?;
        Ok(Self::new(0, Vec::new(), groups))
    }

    /// Adds hard clauses given as raw literal lists.
    pub fn with_hard(mut self, hard: Vec<Vec<i32>>) -> Result<Self, MarcoError> {
        for literals in hard {
            let clause = Clause::new(literals)?;
            self.num_vars = self.num_vars.max(clause.max_var());
            self.hard.push(clause);
        }
        Ok(self)
    }

    /// Total number of boolean variables in the formula.
    pub fn num_vars(&self) -> u32 {
        self.num_vars
    }

    /// Number of constraints (soft groups).
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns true when the store holds no constraints.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Clauses of constraint `index`.
    pub fn group(&self, index: usize) -> &[Clause] {
        &self.groups[index]
    }

    /// Clauses that are active in every check.
    pub fn hard_clauses(&self) -> &[Clause] {
        &self.hard
    }

    /// Returns true when a grouped CNF tag names the hard group.
    pub fn is_hard_group(&self, tag: usize) -> bool {
        tag == HARD_GROUP
    }

    /// Constraints all of whose clauses hold under `model`.
    pub fn satisfied_groups(&self, model: &[bool]) -> Vec<usize> {
        self.groups
            .iter()
            .enumerate()
            .filter(|(_, clauses)| clauses.iter().all(|clause| clause.is_satisfied_by(model)))
            .map(|(idx, _)| idx)
            .collect()
    }
}
