// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
use super::{SatSolver, SolveOutcome, SolverError, XorRelation};
use crate::{
    cnf::{Clause, Literal},
    poly::Variable,
};
use itertools::Itertools;
use log::{debug, trace};
use std::collections::{btree_map::Entry, BTreeMap, BTreeSet, HashSet};
use varisat::{ExtendFormula, Lit, Solver, Var};

/// Longest clause considered when recovering XORs; a `k`-ary XOR needs `2^(k-1)` clauses.
const MAX_XOR_LEN: usize = 6;

/// [`SatSolver`] backed by varisat, a Rust SAT solver library.
///
/// Varisat neither limits conflicts nor exposes what it learnt, so the facts are derived after a
/// satisfiable `solve` by probing under assumptions: a literal is a unit if its negation is
/// unsatisfiable, two literals are equivalent if both ways of setting them apart are. Every probe
/// is a complete solver call and the conflict budget caps the number of probes; whatever was proved
/// before the budget ran out is still reported. XORs are recovered from the clause database.
pub struct VarisatSolver {
    solver: Solver<'static>,
    num_vars: usize,
    clauses: Vec<Clause>,
    max_probes: u64,
    verbosity: u32,
    model: Option<Vec<bool>>,
    units: Vec<Literal>,
    equivalences: Vec<(Literal, Literal)>,
}

impl Default for VarisatSolver {
    fn default() -> Self {
        Self::new()
    }
}

fn lit(var: usize, value: bool) -> Lit {
    let positive = Lit::positive(Var::from_index(var));
    if value {
        positive
    } else {
        !positive
    }
}

impl VarisatSolver {
    pub fn new() -> Self {
        Self {
            solver: Solver::new(),
            num_vars: 0,
            clauses: Vec::new(),
            max_probes: u64::MAX,
            verbosity: 0,
            model: None,
            units: Vec::new(),
            equivalences: Vec::new(),
        }
    }

    fn check(&mut self, assumptions: &[Lit]) -> Result<bool, SolverError> {
        self.solver.assume(assumptions);
        self.solver
            .solve()
            .map_err(|err| SolverError::Backend(err.to_string()))
    }

    fn current_model(&self) -> Vec<bool> {
        let mut values = vec![false; self.num_vars];
        for lit in self.solver.model().unwrap_or_default() {
            if let Some(value) = values.get_mut(lit.var().index()) {
                *value = lit.is_positive();
            }
        }
        values
    }

    /// Finds units and equivalences among the unassumed variables, starting from `first`.
    fn probe(&mut self, assumed: &[Literal], first: Vec<bool>) -> Result<(), SolverError> {
        let base: Vec<Lit> = (assumed.iter())
            .map(|l| lit(l.var().index(), l.sign()))
            .collect();
        let assumed_vars: HashSet<_> = assumed.iter().map(|l| l.var().index()).collect();
        let mut budget = self.max_probes;
        let mut models = vec![first];
        let mut probes = 0;

        let mut units = BTreeSet::new();
        for var in (0..self.num_vars).filter(|v| !assumed_vars.contains(v)) {
            let value = models[0][var];
            if models.iter().any(|m| m[var] != value) {
                continue;
            }
            if budget == 0 {
                break;
            }
            budget -= 1;
            probes += 1;
            let probe: Vec<_> = base.iter().copied().chain(Some(lit(var, !value))).collect();
            if self.check(&probe)? {
                models.push(self.current_model());
            } else {
                units.insert(var);
                self.units.push(Literal::new(Variable(var as u32), value));
            }
        }

        // Equivalent variables agree (or disagree) with each other in every model, so candidates
        // share a signature relative to the first model. Every refuting probe adds a model and
        // splits the classes further.
        let free: Vec<usize> = (0..self.num_vars)
            .filter(|v| !assumed_vars.contains(v) && !units.contains(v))
            .collect();
        let mut decided = HashSet::new();
        'refine: loop {
            let mut classes = BTreeMap::new();
            for &var in &free {
                let signature: Vec<bool> = models.iter().map(|m| m[var] ^ models[0][var]).collect();
                let rep = match classes.entry(signature) {
                    Entry::Vacant(entry) => {
                        entry.insert(var);
                        continue;
                    }
                    Entry::Occupied(entry) => *entry.get(),
                };
                if !decided.insert((rep, var)) {
                    continue;
                }
                let inverted = models[0][rep] ^ models[0][var];
                for &rep_value in &[false, true] {
                    if budget == 0 {
                        break 'refine;
                    }
                    budget -= 1;
                    probes += 1;
                    let apart = [lit(rep, rep_value), lit(var, !(rep_value ^ inverted))];
                    let probe: Vec<_> = base.iter().chain(&apart).copied().collect();
                    if self.check(&probe)? {
                        models.push(self.current_model());
                        continue 'refine;
                    }
                }
                self.equivalences.push((
                    Literal::t(Variable(rep as u32)),
                    Literal::new(Variable(var as u32), !inverted),
                ));
            }
            break;
        }

        if self.verbosity > 0 {
            debug!(
                "Probing took {} solver calls: {} units, {} equivalences",
                probes,
                self.units.len(),
                self.equivalences.len()
            );
        }
        Ok(())
    }

    /// Groups clauses by variable set; a group forbidding every assignment of one parity is a XOR.
    fn find_xors(&self) -> Vec<XorRelation> {
        let mut forbidden: BTreeMap<Vec<Variable>, HashSet<u64>> = BTreeMap::new();
        for clause in &self.clauses {
            if !(2..=MAX_XOR_LEN).contains(&clause.len()) {
                continue;
            }
            let lits: Vec<_> = clause.literals().iter().copied().sorted().collect();
            if lits.iter().tuple_windows().any(|(a, b)| a.var() == b.var()) {
                continue;
            }
            // The clause forbids exactly the assignment falsifying all of its literals
            let bits = (lits.iter().enumerate())
                .fold(0u64, |acc, (i, l)| acc | (u64::from(!l.sign()) << i));
            let vars = lits.iter().map(|l| l.var()).collect();
            forbidden.entry(vars).or_default().insert(bits);
        }

        let mut xors = Vec::new();
        for (vars, assignments) in forbidden {
            let needed = 1usize << (vars.len() - 1);
            for &odd in &[false, true] {
                let count = (assignments.iter())
                    .filter(|bits| (bits.count_ones() % 2 == 1) == odd)
                    .count();
                if count == needed {
                    // Every assignment of this parity is forbidden
                    xors.push(XorRelation {
                        vars: vars.clone(),
                        rhs: !odd,
                    });
                }
            }
        }
        xors
    }
}

impl SatSolver for VarisatSolver {
    fn new_var(&mut self) -> Variable {
        let var = self.solver.new_var();
        debug_assert_eq!(var.index(), self.num_vars);
        self.num_vars += 1;
        Variable(var.index() as u32)
    }

    fn num_vars(&self) -> usize {
        self.num_vars
    }

    fn add_clause(&mut self, lits: &[Literal]) {
        debug_assert!(lits.iter().all(|l| l.var().index() < self.num_vars));
        let clause: Vec<_> = lits.iter().map(|l| lit(l.var().index(), l.sign())).collect();
        self.solver.add_clause(&clause);
        self.clauses.push(lits.iter().copied().collect());
    }

    fn set_max_conflicts(&mut self, max_conflicts: u64) {
        self.max_probes = max_conflicts;
    }

    fn set_verbosity(&mut self, verbosity: u32) {
        self.verbosity = verbosity;
    }

    fn solve(&mut self, assumptions: &[Literal]) -> Result<SolveOutcome, SolverError> {
        self.model = None;
        self.units.clear();
        self.equivalences.clear();

        let assumed: Vec<_> = (assumptions.iter())
            .map(|l| lit(l.var().index(), l.sign()))
            .collect();
        if !self.check(&assumed)? {
            return Ok(SolveOutcome::Unsat);
        }
        let model = self.current_model();
        trace!(
            "varisat model: {}",
            model
                .iter()
                .enumerate()
                .format_with(" ", |(i, &v), f| f(&format_args!("{}{}", if v { "" } else { "-" }, i)))
        );
        self.model = Some(model.clone());
        self.probe(assumptions, model)?;
        Ok(SolveOutcome::Sat)
    }

    fn model(&self) -> Option<&[bool]> {
        self.model.as_deref()
    }

    fn zero_assigned_lits(&self) -> Vec<Literal> {
        self.units.clone()
    }

    fn binary_xors(&self) -> Vec<(Literal, Literal)> {
        self.equivalences.clone()
    }

    fn recovered_xors(&self, combined: bool) -> Vec<XorRelation> {
        let xors = self.find_xors();
        if !combined {
            return xors;
        }
        let mut sums = BTreeSet::new();
        for (a, b) in xors.iter().tuple_combinations() {
            if !a.vars.iter().any(|v| b.vars.contains(v)) {
                continue;
            }
            let vars: Vec<_> = (a.vars.iter().merge(&b.vars))
                .copied()
                .dedup_with_count()
                .filter(|&(count, _)| count == 1)
                .map(|(_, v)| v)
                .collect();
            if !vars.is_empty() {
                sums.insert(XorRelation {
                    vars,
                    rhs: a.rhs ^ b.rhs,
                });
            }
        }
        sums.into_iter().collect()
    }
}
