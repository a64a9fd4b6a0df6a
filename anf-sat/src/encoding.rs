// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
//! Encoding of a whole ANF system into CNF.
//!
//! SAT variable `i < anf.num_vars()` is the ANF variable `xi` itself. Every monomial of degree
//! greater than one that has to be referenced gets its own SAT variable, tied to its factors by
//! AND clauses. Auxiliary variables introduced to cut long XORs stand for partial sums and don't
//! represent any monomial.
use crate::{
    anf::Anf,
    cnf::{Clause, CnfTerm, Literal},
    config::Config,
    karnaugh::{KarnaughConverter, KarnaughError},
    poly::{Monomial, Polynomial, Variable},
};
use log::debug;
use std::{collections::HashMap, iter};

/// What a SAT variable stands for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VarKind {
    Monomial(Monomial),
    /// A partial XOR sum.
    Auxiliary,
}

#[derive(Debug)]
pub struct CnfEncoding {
    karnaugh: KarnaughConverter,
    karnaugh_cutoff: usize,
    xor_cut_len: usize,
    num_orig_vars: usize,
    vars: Vec<VarKind>,
    monomial_vars: HashMap<Monomial, Variable>,
    definitions: Vec<Clause>,
    /// Clauses of each encoded equation.
    equations: Vec<Vec<Clause>>,
    assumptions: Vec<Literal>,
}

impl CnfEncoding {
    /// Sets up the variable mapping for `anf` without encoding any equation yet. Fails if the
    /// configured Karnaugh capacity is unsupported.
    pub fn new(anf: &Anf, config: &Config) -> Result<Self, KarnaughError> {
        let vars = (0..anf.num_vars() as u32)
            .map(|i| VarKind::Monomial(Variable(i).into()))
            .collect();
        let assumptions = anf
            .assignments()
            .map(|(var, value)| Literal::new(var, value))
            .collect();
        Ok(Self {
            karnaugh: KarnaughConverter::new(config.karnaugh_capacity)?,
            karnaugh_cutoff: config.karnaugh_cutoff,
            // Chunks of fewer than three literals would never shorten the XOR
            xor_cut_len: config.xor_cut_len.max(3),
            num_orig_vars: anf.num_vars(),
            vars,
            monomial_vars: HashMap::new(),
            definitions: Vec::new(),
            equations: Vec::new(),
            assumptions,
        })
    }

    /// Encodes every equation of `anf`.
    pub fn encode(anf: &Anf, config: &Config) -> Result<Self, KarnaughError> {
        let mut encoding = Self::new(anf, config)?;
        encoding.add_all_equations(anf)?;
        Ok(encoding)
    }

    pub fn add_all_equations(&mut self, anf: &Anf) -> Result<(), KarnaughError> {
        for poly in anf.equations() {
            self.add_equation(poly)?;
        }
        debug!(
            "Encoded {} equations into {} variables and {} clauses",
            self.equations.len(),
            self.num_vars(),
            self.num_clauses()
        );
        Ok(())
    }

    /// Adds clauses that hold exactly when `poly = 0`.
    pub fn add_equation(&mut self, poly: &Polynomial) -> Result<(), KarnaughError> {
        let clauses = if poly.degree() > 1 && poly.variables().len() <= self.karnaugh_cutoff {
            self.karnaugh.convert(poly)?
        } else {
            let lits: Vec<_> = poly.terms().map(|m| self.monomial_var(m)).collect();
            self.xor_chain(lits, poly.constant_term())
        };
        self.equations.push(clauses);
        Ok(())
    }

    fn new_var(&mut self, kind: VarKind) -> Variable {
        let var = Variable(self.vars.len() as u32);
        self.vars.push(kind);
        var
    }

    fn monomial_var(&mut self, m: &Monomial) -> Variable {
        debug_assert!(!m.is_one());
        if let [var] = m.variables() {
            assert!(var.index() < self.num_orig_vars, "{} is outside the ANF", var);
            return *var;
        }
        if let Some(&var) = self.monomial_vars.get(m) {
            return var;
        }
        let out = self.new_var(VarKind::Monomial(m.clone()));
        self.monomial_vars.insert(m.clone(), out);
        // out → x for every factor x, and all factors → out
        self.definitions
            .extend(m.variables().iter().map(|&x| clause![Literal::f(out), Literal::t(x)]));
        self.definitions.push(
            (m.variables().iter())
                .map(|&x| Literal::f(x))
                .chain(iter::once(Literal::t(out)))
                .collect(),
        );
        out
    }

    /// Clauses for `vars[0] + ... + vars[n] = rhs`, chunked through auxiliary variables.
    fn xor_chain(&mut self, mut vars: Vec<Variable>, rhs: bool) -> Vec<Clause> {
        let mut clauses = Vec::new();
        while vars.len() > self.xor_cut_len {
            let mut chunk: Vec<_> = vars.drain(..self.xor_cut_len - 1).collect();
            let aux = self.new_var(VarKind::Auxiliary);
            chunk.push(aux);
            clauses.extend(parity_clauses(&chunk, false));
            vars.push(aux);
        }
        clauses.extend(parity_clauses(&vars, rhs));
        clauses
    }

    pub fn clauses(&self) -> impl Iterator<Item = &Clause> + '_ {
        (self.definitions.iter()).chain(self.equations.iter().flatten())
    }

    pub fn to_cnf(&self) -> CnfTerm {
        self.clauses().cloned().collect()
    }

    pub fn assumptions(&self) -> &[Literal] {
        &self.assumptions
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn num_clauses(&self) -> usize {
        self.definitions.len() + self.equations.iter().map(Vec::len).sum::<usize>()
    }

    pub fn represents_monomial(&self, var: Variable) -> bool {
        matches!(self.vars.get(var.index()), Some(VarKind::Monomial(_)))
    }

    pub fn monomial_for(&self, var: Variable) -> Option<&Monomial> {
        match self.vars.get(var.index()) {
            Some(VarKind::Monomial(m)) => Some(m),
            _ => None,
        }
    }

    /// Restricts a model over SAT variables to the ANF variables.
    pub fn map_solution_to_orig(&self, model: &[bool]) -> Vec<Option<bool>> {
        (0..self.num_orig_vars).map(|i| model.get(i).copied()).collect()
    }
}

/// The `2^(n-1)` clauses forbidding every assignment of `vars` whose parity differs from `rhs`.
pub fn parity_clauses(vars: &[Variable], rhs: bool) -> Vec<Clause> {
    (0..1u64 << vars.len())
        .filter(|bits| (bits.count_ones() % 2 == 1) != rhs)
        .map(|bits| {
            (vars.iter().enumerate())
                .map(|(i, &var)| Literal::new(var, (bits >> i) & 1 == 0))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anf(s: &str) -> Anf {
        Anf::parse(s.as_bytes()).unwrap()
    }

    fn config(karnaugh_cutoff: usize, xor_cut_len: usize) -> Config {
        Config {
            karnaugh_cutoff,
            xor_cut_len,
            ..Config::default()
        }
    }

    #[test]
    fn models_satisfy_the_system() {
        let system = anf("x0*x1 + x2 + 1\nx1*x2*x3 + x0 + x4\nx0 + x1 + x2 + x3 + x4 + x5");
        for config in [config(8, 4), config(0, 3)].iter() {
            let encoding = CnfEncoding::encode(&system, config).unwrap();
            let model = encoding.to_cnf().solve_with_varisat().unwrap().unwrap();
            let solution = system.extend_solution(&encoding.map_solution_to_orig(&model));
            assert_eq!(system.check_solution(&solution), Ok(()));
        }
    }

    #[test]
    fn inconsistent_systems_stay_unsat() {
        let system = anf("x1*x2 + x3\nx1*x2 + x3 + 1");
        assert!(system.ok());
        for config in [config(8, 4), config(0, 4)].iter() {
            let encoding = CnfEncoding::encode(&system, config).unwrap();
            assert_eq!(encoding.to_cnf().solve_with_varisat().unwrap(), None);
        }
    }

    #[test]
    fn variable_mapping() {
        let system = anf("x0*x1 + x2 + x3 + x4 + x5");
        let encoding = CnfEncoding::encode(&system, &config(0, 4)).unwrap();
        // One monomial variable and one auxiliary for the 5-literal XOR
        assert_eq!(encoding.num_vars(), 8);
        let m = Variable(6);
        assert!(encoding.represents_monomial(m));
        let x0x1: Monomial = [Variable(0), Variable(1)].iter().copied().collect();
        assert_eq!(encoding.monomial_for(m), Some(&x0x1));
        assert!(!encoding.represents_monomial(Variable(7)));
        assert_eq!(encoding.monomial_for(Variable(7)), None);
        assert_eq!(encoding.monomial_for(Variable(2)), Some(&Monomial::from(Variable(2))));
        // 3 definition clauses, a 4-literal and a 3-literal parity chunk
        assert_eq!(encoding.num_clauses(), 3 + 8 + 4);

        let encoding = CnfEncoding::encode(&system, &config(8, 4)).unwrap();
        assert_eq!(encoding.num_vars(), 6);
    }

    #[test]
    fn xor_chain_is_exact() {
        let p: Polynomial = "x0 + x1 + x2 + x3 + x4 + x5 + 1".parse().unwrap();
        let mut system = Anf::new();
        system.add_polynomial(p.clone());
        let encoding = CnfEncoding::encode(&system, &config(0, 3)).unwrap();
        assert!(encoding.num_vars() > 6);
        for setting in 0..64u32 {
            let value = |v: Variable| Some((setting >> v.0) & 1 == 1);
            let fixed = (0..6)
                .map(|i| CnfTerm::singleton(Literal::new(Variable(i), value(Variable(i)).unwrap())))
                .fold(encoding.to_cnf(), CnfTerm::and);
            let sat = fixed.solve_with_varisat().unwrap().is_some();
            assert_eq!(sat, !p.evaluate(value).unwrap(), "setting {:#b}", setting);
        }
    }

    #[test]
    fn assignments_become_assumptions() {
        let system = anf("x0 + 1\nx1*x2 + x3");
        let encoding = CnfEncoding::encode(&system, &Config::default()).unwrap();
        assert_eq!(encoding.assumptions(), [Literal::t(Variable(0))]);
    }

    #[test]
    fn karnaugh_capacity_is_enforced() {
        let system = anf("x0*x1 + x2*x3 + x4");
        let config = Config {
            karnaugh_capacity: 4,
            karnaugh_cutoff: 8,
            ..Config::default()
        };
        assert!(matches!(
            CnfEncoding::encode(&system, &config),
            Err(KarnaughError::CapacityExceeded { vars: 5, capacity: 4, .. })
        ));
    }

    #[test]
    fn unsupported_karnaugh_capacity() {
        let system = anf("x0*x1 + x2");
        let config = Config {
            karnaugh_capacity: 30,
            ..Config::default()
        };
        assert!(matches!(
            CnfEncoding::encode(&system, &config),
            Err(KarnaughError::UnsupportedCapacity { capacity: 30, .. })
        ));
    }
}
