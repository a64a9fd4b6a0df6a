// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
//! The contract the simplifier expects from a SAT solver.
use crate::{cnf::Literal, poly::Variable};

#[cfg(any(test, feature = "varisat"))]
mod backend;
#[cfg(any(test, feature = "varisat"))]
pub use backend::VarisatSolver;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
pub enum SolveOutcome {
    #[strum(serialize = "SAT")]
    Sat,
    #[strum(serialize = "UNSAT")]
    Unsat,
    /// The conflict budget ran out before the solver reached a verdict.
    #[strum(serialize = "UNKNOWN")]
    Undetermined,
}

#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("SAT backend failed: {0}")]
    Backend(String),
}

/// `vars[0] + ... + vars[n] = rhs`.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct XorRelation {
    pub vars: Vec<Variable>,
    pub rhs: bool,
}

/// An incremental SAT solver that can report what it derived during search.
///
/// Everything reported by [`zero_assigned_lits`](SatSolver::zero_assigned_lits),
/// [`binary_xors`](SatSolver::binary_xors) and [`recovered_xors`](SatSolver::recovered_xors)
/// must be implied by the clauses together with the assumptions of the last `solve` call,
/// whatever its outcome.
pub trait SatSolver {
    /// Allocates the next variable; variables are numbered densely from zero.
    fn new_var(&mut self) -> Variable;

    fn num_vars(&self) -> usize;

    fn add_clause(&mut self, lits: &[Literal]);

    fn set_max_conflicts(&mut self, max_conflicts: u64);

    fn set_verbosity(&mut self, verbosity: u32);

    fn solve(&mut self, assumptions: &[Literal]) -> Result<SolveOutcome, SolverError>;

    /// The satisfying assignment found by the last `solve`, indexed by variable.
    fn model(&self) -> Option<&[bool]>;

    /// Literals that hold in every model.
    fn zero_assigned_lits(&self) -> Vec<Literal>;

    /// Pairs of literals that are always equal.
    fn binary_xors(&self) -> Vec<(Literal, Literal)>;

    /// Linear relations found among the clauses. With `combined`, relations sharing a variable
    /// are also summed pairwise into longer ones.
    fn recovered_xors(&self, combined: bool) -> Vec<XorRelation>;
}
