// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
//! A mutable system of ANF equations `p = 0` together with the facts derived from it.
use crate::poly::{Monomial, ParsePolyError, Polynomial, Variable};
use log::debug;
use std::{
    collections::BTreeMap,
    fmt,
    io::{self, BufRead},
};

/// A total assignment indexed by variable.
pub type Solution = Vec<bool>;

#[derive(Debug, thiserror::Error)]
pub enum AnfParseError {
    #[error("Unable to read ANF input")]
    Read(#[source] io::Error),
    #[error("Malformed polynomial on line {line}")]
    Poly {
        line: usize,
        #[source]
        source: ParsePolyError,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SolutionError {
    #[error("Solution violates equation {equation} = 0")]
    Violated { equation: Polynomial },
    #[error("Solution leaves variables of equation {equation} = 0 unassigned")]
    Unbound { equation: Polynomial },
}

/// A fact that can be recorded without keeping the polynomial around.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Fact {
    /// `var = value`
    Assign(Variable, bool),
    /// Every variable of the monomial is one.
    AllOne(Monomial),
    /// `var = rep + inverted`, with `rep < var`.
    Replace {
        var: Variable,
        rep: Variable,
        inverted: bool,
    },
}

impl Fact {
    fn recognize(poly: &Polynomial) -> Option<Self> {
        let c = poly.constant_term();
        let mut terms = poly.terms();
        match (terms.next(), terms.next(), terms.next()) {
            (Some(m), None, None) if m.degree() == 1 => Some(Fact::Assign(m.variables()[0], c)),
            (Some(m), None, None) if c => Some(Fact::AllOne(m.clone())),
            (Some(a), Some(b), None) if a.degree() == 1 && b.degree() == 1 => {
                let (x, y) = (a.variables()[0], b.variables()[0]);
                Some(Fact::Replace {
                    var: x.max(y),
                    rep: x.min(y),
                    inverted: c,
                })
            }
            _ => None,
        }
    }
}

/// An ANF equation system.
///
/// Besides the equations themselves, the system keeps variable assignments and replacements
/// `v = r + c`. Representatives are never assigned or replaced themselves, and equations are kept
/// rewritten in terms of free variables only.
#[derive(Clone, Debug)]
pub struct Anf {
    num_vars: u32,
    equations: Vec<Polynomial>,
    assignments: BTreeMap<Variable, bool>,
    replacements: BTreeMap<Variable, (Variable, bool)>,
    ok: bool,
}

impl Default for Anf {
    fn default() -> Self {
        Self::new()
    }
}

impl Anf {
    pub fn new() -> Self {
        Self {
            num_vars: 0,
            equations: Vec::new(),
            assignments: BTreeMap::new(),
            replacements: BTreeMap::new(),
            ok: true,
        }
    }

    /// Reads one polynomial per line. Blank lines and lines starting with `c` are skipped.
    pub fn parse(reader: impl BufRead) -> Result<Self, AnfParseError> {
        let mut anf = Self::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(AnfParseError::Read)?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('c') {
                continue;
            }
            let poly = line
                .parse()
                .map_err(|source| AnfParseError::Poly { line: i + 1, source })?;
            anf.add_polynomial(poly);
        }
        Ok(anf)
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars as usize
    }

    fn reserve_vars(&mut self, poly: &Polynomial) {
        if let Some(max) = poly.variables().into_iter().next_back() {
            self.num_vars = self.num_vars.max(max.0 + 1);
        }
    }

    /// `false` once the system has been proved inconsistent.
    pub fn ok(&self) -> bool {
        self.ok
    }

    pub fn equations(&self) -> &[Polynomial] {
        &self.equations
    }

    pub fn value(&self, var: Variable) -> Option<bool> {
        self.assignments.get(&var).copied()
    }

    pub fn assignments(&self) -> impl Iterator<Item = (Variable, bool)> + '_ {
        self.assignments.iter().map(|(&v, &value)| (v, value))
    }

    pub fn replacement(&self, var: Variable) -> Option<(Variable, bool)> {
        self.replacements.get(&var).copied()
    }

    /// Every equation and fact of the system as a polynomial that must be zero.
    pub fn polynomials(&self) -> impl Iterator<Item = Polynomial> + '_ {
        let assignments = (self.assignments.iter())
            .map(|(&v, &value)| Polynomial::from(v) + &Polynomial::constant(value));
        let replacements = self.replacements.iter().map(|(&v, &(rep, inverted))| {
            Polynomial::from(v) + &Polynomial::from(rep) + &Polynomial::constant(inverted)
        });
        self.equations.iter().cloned().chain(assignments).chain(replacements)
    }

    /// Rewrites `poly` with all known assignments and replacements.
    pub fn contextualize(&self, poly: &Polynomial) -> Polynomial {
        let mut out = poly.clone();
        for var in poly.variables() {
            if let Some(&value) = self.assignments.get(&var) {
                out = out.assign(var, value);
            } else if let Some(&(rep, inverted)) = self.replacements.get(&var) {
                let replacement = Polynomial::from(rep) + &Polynomial::constant(inverted);
                out = out.substitute(var, &replacement);
            }
        }
        out
    }

    fn mark_unsat(&mut self) {
        self.ok = false;
        let one = Polynomial::one();
        if !self.equations.contains(&one) {
            self.equations.push(one);
        }
    }

    fn assign(&mut self, var: Variable, value: bool) {
        debug_assert!(!self.assignments.contains_key(&var) && !self.replacements.contains_key(&var));
        self.assignments.insert(var, value);
        let dependents: Vec<_> = (self.replacements.iter())
            .filter(|&(_, &(rep, _))| rep == var)
            .map(|(&v, &(_, inverted))| (v, inverted))
            .collect();
        for (v, inverted) in dependents {
            self.replacements.remove(&v);
            self.assignments.insert(v, value ^ inverted);
        }
    }

    fn replace(&mut self, var: Variable, rep: Variable, inverted: bool) {
        debug_assert!(var != rep);
        for (old_rep, old_inverted) in self.replacements.values_mut() {
            if *old_rep == var {
                *old_rep = rep;
                *old_inverted ^= inverted;
            }
        }
        self.replacements.insert(var, (rep, inverted));
    }

    fn apply(&mut self, fact: Fact) {
        debug!("Recording fact {:?}", fact);
        match fact {
            Fact::Assign(var, value) => self.assign(var, value),
            Fact::AllOne(m) => {
                for &var in m.variables() {
                    self.assign(var, true);
                }
            }
            Fact::Replace { var, rep, inverted } => self.replace(var, rep, inverted),
        }
    }

    /// Rewrites every equation with the current facts until no new fact appears.
    fn propagate(&mut self) {
        loop {
            let mut changed = false;
            for eq in std::mem::take(&mut self.equations) {
                let eq = self.contextualize(&eq);
                if eq.is_zero() {
                    continue;
                }
                if eq.is_one() {
                    self.mark_unsat();
                } else if let Some(fact) = Fact::recognize(&eq) {
                    self.apply(fact);
                    changed = true;
                } else if !self.equations.contains(&eq) {
                    self.equations.push(eq);
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// Adds `poly = 0` to the system. Returns whether the system changed; adding the constant one
    /// marks the system UNSAT.
    pub fn add_polynomial(&mut self, poly: Polynomial) -> bool {
        self.reserve_vars(&poly);
        let poly = self.contextualize(&poly);
        if poly.is_zero() {
            return false;
        }
        if poly.is_one() {
            self.mark_unsat();
            return true;
        }
        if let Some(fact) = Fact::recognize(&poly) {
            self.apply(fact);
            self.propagate();
            return true;
        }
        if self.equations.contains(&poly) {
            return false;
        }
        self.equations.push(poly);
        true
    }

    /// Merges a learnt polynomial into the system if it tells us something new: a new assignment
    /// or replacement, a new linear equation, or a contradiction. Anything else is dropped.
    pub fn learn(&mut self, poly: Polynomial) -> bool {
        self.reserve_vars(&poly);
        let contextualized = self.contextualize(&poly);
        if contextualized.is_zero() {
            debug!("Learnt {} = 0 is already known", poly);
            return false;
        }
        if contextualized.is_one() {
            debug!("Learnt {} = 0 contradicts the system", poly);
            self.mark_unsat();
            return true;
        }
        if let Some(fact) = Fact::recognize(&contextualized) {
            self.apply(fact);
            self.propagate();
            return true;
        }
        if contextualized.degree() == 1 && !self.equations.contains(&contextualized) {
            self.equations.push(contextualized);
            return true;
        }
        debug!("Learnt {} = 0 adds nothing new", poly);
        false
    }

    /// Completes a partial solution over the system's variables: assigned and replaced variables
    /// are filled in from the recorded facts, any other unknown variable defaults to false.
    pub fn extend_solution(&self, partial: &[Option<bool>]) -> Solution {
        let mut solution: Solution = (0..self.num_vars())
            .map(|i| partial.get(i).copied().flatten().unwrap_or(false))
            .collect();
        for (&var, &value) in &self.assignments {
            solution[var.index()] = value;
        }
        for (&var, &(rep, inverted)) in &self.replacements {
            solution[var.index()] = solution[rep.index()] ^ inverted;
        }
        solution
    }

    /// Checks that `solution` satisfies every equation and fact of the system.
    pub fn check_solution(&self, solution: &[bool]) -> Result<(), SolutionError> {
        for equation in self.polynomials() {
            match equation.evaluate(|v| solution.get(v.index()).copied()) {
                Some(false) => {}
                Some(true) => return Err(SolutionError::Violated { equation }),
                None => return Err(SolutionError::Unbound { equation }),
            }
        }
        Ok(())
    }
}

impl fmt::Display for Anf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for poly in self.polynomials() {
            writeln!(f, "{}", poly)?;
        }
        Ok(())
    }
}
