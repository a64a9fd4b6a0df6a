// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
use crate::poly::Variable;
use smallvec::SmallVec;
use std::{
    fmt,
    io::{self, BufWriter, Write},
    iter::FromIterator,
};

macro_rules! clause {
    ($($x:expr),*) => {
        $crate::cnf::Clause::from_literals(smallvec::smallvec![$($x),*])
    };
}

/// A variable together with the truth value that satisfies it: `Literal::t(x)` is the positive
/// literal `x`, `Literal::f(x)` the negative literal `¬x`.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Literal {
    var: Variable,
    sign: bool,
}

impl Literal {
    pub fn new(var: Variable, sign: bool) -> Self {
        Self { var, sign }
    }

    pub fn t(var: Variable) -> Self {
        Self::new(var, true)
    }

    pub fn f(var: Variable) -> Self {
        Self::new(var, false)
    }

    pub fn var(self) -> Variable {
        self.var
    }

    /// The value the variable must take for the literal to hold.
    pub fn sign(self) -> bool {
        self.sign
    }

    pub fn is_satisfied_by(self, value: bool) -> bool {
        value == self.sign
    }
}

/// A disjunction of literals.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq)]
pub struct Clause(SmallVec<[Literal; 3]>);

impl Clause {
    pub fn from_literals(lits: SmallVec<[Literal; 3]>) -> Self {
        Self(lits)
    }

    pub fn literals(&self) -> &[Literal] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Evaluates the clause; `None` if no literal is satisfied and some variable is unbound.
    pub fn evaluate(&self, assignment: impl Fn(Variable) -> Option<bool>) -> Option<bool> {
        let mut undetermined = false;
        for lit in &self.0 {
            match assignment(lit.var) {
                Some(value) if lit.is_satisfied_by(value) => return Some(true),
                Some(_) => {}
                None => undetermined = true,
            }
        }
        if undetermined {
            None
        } else {
            Some(false)
        }
    }
}

impl FromIterator<Literal> for Clause {
    fn from_iter<T: IntoIterator<Item = Literal>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A conjunction of clauses.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq)]
pub struct CnfTerm(Vec<Clause>);

impl CnfTerm {
    #[cfg(test)]
    pub(crate) fn singleton(lit: Literal) -> CnfTerm {
        CnfTerm(vec![clause![lit]])
    }

    pub fn push(&mut self, clause: Clause) {
        self.0.push(clause);
    }

    pub fn and(mut self, mut other: Self) -> Self {
        if other.0.len() > self.0.len() {
            std::mem::swap(&mut self.0, &mut other.0);
        }
        self.0.extend(other.0);
        self
    }

    /// Produces the number of clauses in the formula.
    pub fn num_clauses(&self) -> usize {
        self.0.len()
    }

    /// One past the highest variable index used by any clause.
    pub fn num_vars(&self) -> usize {
        (self.0.iter())
            .flat_map(|clause| &clause.0)
            .map(|lit| lit.var.index() + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn evaluate(&self, assignment: impl Fn(Variable) -> Option<bool>) -> Option<bool> {
        let mut undetermined = false;
        for clause in &self.0 {
            match clause.evaluate(&assignment) {
                Some(false) => return Some(false),
                Some(true) => {}
                None => undetermined = true,
            }
        }
        if undetermined {
            None
        } else {
            Some(true)
        }
    }

    /// Writes a CNF SAT formula to a sink in the DIMACS format. Variable `xi` is written as
    /// DIMACS variable `i + 1`.
    pub fn write_dimacs(&self, num_vars: usize, f: impl Write) -> io::Result<()> {
        let mut f = BufWriter::new(f);
        writeln!(
            f,
            "p cnf {} {}",
            num_vars.max(self.num_vars()),
            self.num_clauses()
        )?;
        for clause in &self.0 {
            for literal in &clause.0 {
                let sign = if literal.sign { "" } else { "-" };
                write!(f, "{}{} ", sign, literal.var.index() + 1)?;
            }
            writeln!(f, "0")?;
        }
        Ok(())
    }

    /// Solves the formula using varisat and returns a model indexed by variable, if one exists.
    #[cfg(any(test, feature = "varisat"))]
    pub fn solve_with_varisat(&self) -> Result<Option<Vec<bool>>, crate::solver::SolverError> {
        use crate::solver::{SatSolver, SolveOutcome, VarisatSolver};
        let mut solver = VarisatSolver::new();
        solver.set_max_conflicts(0);
        for _ in 0..self.num_vars() {
            solver.new_var();
        }
        for clause in &self.0 {
            solver.add_clause(clause.literals());
        }
        match solver.solve(&[])? {
            SolveOutcome::Sat => Ok(solver.model().map(<[bool]>::to_vec)),
            _ => Ok(None),
        }
    }
}

impl FromIterator<Clause> for CnfTerm {
    fn from_iter<T: IntoIterator<Item = Clause>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Clause> for CnfTerm {
    fn extend<T: IntoIterator<Item = Clause>>(&mut self, iter: T) {
        self.0.extend(iter)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.sign { "" } else { "-" };
        write!(f, "{}{}", sign, self.var)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        let mut lits = self.0.iter();
        if let Some(lit) = lits.next() {
            write!(f, "{}", lit)?;
            for lit in lits {
                write!(f, " ∨ {}", lit)?;
            }
        }
        write!(f, ")")
    }
}

impl fmt::Display for CnfTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        let mut clauses = self.0.iter();
        if let Some(clause) = clauses.next() {
            write!(f, "{}", clause)?;
            for clause in clauses {
                write!(f, " ∧ {}", clause)?;
            }
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(x: u32) -> Variable {
        Variable(x)
    }

    #[test]
    fn trivially_unsat() {
        let formula = CnfTerm(vec![Clause::default()]);
        assert!(matches!(formula.solve_with_varisat(), Ok(None)));
    }

    #[test]
    fn trivially_sat() {
        let formula = CnfTerm(vec![]);
        assert_eq!(formula.solve_with_varisat().unwrap(), Some(vec![]));
    }

    #[test]
    fn sat() {
        let (x, y) = (var(0), var(1));
        let formula = CnfTerm::singleton(Literal::t(x));
        assert_eq!(formula.solve_with_varisat().unwrap(), Some(vec![true]));
        let formula = CnfTerm::singleton(Literal::t(x)).and(CnfTerm::singleton(Literal::f(y)));
        assert_eq!(formula.solve_with_varisat().unwrap(), Some(vec![true, false]));
    }

    #[test]
    fn evaluation() {
        let (x, y) = (var(0), var(1));
        let c = clause![Literal::t(x), Literal::f(y)];
        assert_eq!(c.evaluate(|_| Some(false)), Some(true));
        assert_eq!(c.evaluate(|v| Some(v == y)), Some(false));
        assert_eq!(c.evaluate(|v| if v == x { Some(false) } else { None }), None);
        assert_eq!(Clause::default().evaluate(|_| Some(true)), Some(false));
    }

    #[test]
    fn dimacs() {
        let (x, y) = (var(0), var(2));
        let formula: CnfTerm = vec![clause![Literal::t(x), Literal::f(y)], clause![Literal::t(y)]]
            .into_iter()
            .collect();
        let mut out = Vec::new();
        formula.write_dimacs(0, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "p cnf 3 2\n1 -3 0\n3 0\n"
        );
        assert_eq!(formula.to_string(), "((x0 ∨ -x2) ∧ (x2))");
    }
}
