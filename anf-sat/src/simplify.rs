// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
//! SAT-driven simplification of an ANF system.
//!
//! The whole system is encoded into CNF and handed to a SAT solver. Whatever the solver derived
//! (forced literals, equivalences, XOR relations) is translated back into polynomials over the
//! monomials the SAT variables stand for and merged into the system.
use crate::{
    anf::{Anf, Solution, SolutionError},
    cnf::Literal,
    config::Config,
    encoding::CnfEncoding,
    karnaugh::KarnaughError,
    poly::{Monomial, Polynomial},
    solver::{SatSolver, SolveOutcome, SolverError, XorRelation},
};
use log::{debug, info, trace};

#[derive(Debug, thiserror::Error)]
pub enum SimplifyError {
    #[error(transparent)]
    Karnaugh(#[from] KarnaughError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    /// The model found by the solver does not solve the original system. This is a bug in the
    /// encoding or in the extraction.
    #[error("SAT model does not solve the original system")]
    Solution(#[from] SolutionError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimplifyOutcome {
    /// The system is consistent as far as the solver could tell.
    Learnt {
        /// Number of facts that changed the system.
        learnt: usize,
        /// A verified solution of the original system, if the solver found one.
        solution: Option<Solution>,
    },
    /// The system is inconsistent, either already or as proved by the solver.
    Unsat,
}

impl SimplifyOutcome {
    /// The number of learnt facts, or `-1` if the system is UNSAT.
    pub fn as_count(&self) -> i64 {
        match self {
            Self::Learnt { learnt, .. } => *learnt as i64,
            Self::Unsat => -1,
        }
    }
}

/// Kinds of derived facts, in the order they are merged back. Each stage benefits from the
/// assignments and replacements made by the stages before it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum ExtractionStage {
    #[strum(serialize = "units")]
    Units,
    #[strum(serialize = "binary XORs")]
    Binaries,
    #[strum(serialize = "linear relations")]
    Linear,
}

impl ExtractionStage {
    pub const PIPELINE: [ExtractionStage; 3] = [Self::Units, Self::Binaries, Self::Linear];
}

/// One simplification attempt of `anf` using `solver`.
pub struct SatSimplifier<'a, S: SatSolver> {
    anf: &'a mut Anf,
    orig: &'a Anf,
    config: &'a Config,
    solver: S,
}

impl<'a, S: SatSolver> SatSimplifier<'a, S> {
    /// `orig` is the system as it was given, against which SAT solutions are checked.
    pub fn new(anf: &'a mut Anf, orig: &'a Anf, config: &'a Config, solver: S) -> Self {
        Self {
            anf,
            orig,
            config,
            solver,
        }
    }

    pub fn simplify(mut self) -> Result<SimplifyOutcome, SimplifyError> {
        if !self.anf.ok() {
            debug!("System is already UNSAT, skipping SAT simplification");
            return Ok(SimplifyOutcome::Unsat);
        }

        let encoding = CnfEncoding::encode(self.anf, self.config)?;
        for _ in 0..encoding.num_vars() {
            self.solver.new_var();
        }
        for clause in encoding.clauses() {
            self.solver.add_clause(clause.literals());
        }
        self.solver.set_max_conflicts(self.config.max_conflicts);
        self.solver.set_verbosity(self.config.verbosity);
        info!(
            "Solving CNF with {} variables and {} clauses under {} assumptions",
            encoding.num_vars(),
            encoding.num_clauses(),
            encoding.assumptions().len()
        );

        let outcome = self.solver.solve(encoding.assumptions())?;
        info!("SAT solver returned {}", outcome);
        if outcome == SolveOutcome::Unsat {
            self.anf.add_polynomial(Polynomial::one());
            return Ok(SimplifyOutcome::Unsat);
        }

        let mut learnt = 0;
        for &stage in ExtractionStage::PIPELINE.iter() {
            let count = self.extract(stage, &encoding);
            info!("Learnt {} facts from {}", count, stage);
            learnt += count;
        }

        let solution = match outcome {
            SolveOutcome::Sat => {
                let model = (self.solver.model())
                    .expect("a satisfiable solver call provides a model")
                    .to_vec();
                let solution = self
                    .anf
                    .extend_solution(&encoding.map_solution_to_orig(&model));
                self.orig.check_solution(&solution)?;
                trace!("Verified solution {:?}", solution);
                Some(solution)
            }
            _ => None,
        };
        Ok(SimplifyOutcome::Learnt { learnt, solution })
    }

    fn extract(&mut self, stage: ExtractionStage, encoding: &CnfEncoding) -> usize {
        let candidates = match stage {
            ExtractionStage::Units => (self.solver.zero_assigned_lits().into_iter())
                .filter_map(|lit| unit_polynomial(encoding, lit))
                .collect::<Vec<_>>(),
            ExtractionStage::Binaries => (self.solver.binary_xors().into_iter())
                .filter_map(|(a, b)| binary_polynomial(encoding, a, b))
                .collect(),
            ExtractionStage::Linear => {
                let mut xors = self.solver.recovered_xors(false);
                xors.extend(self.solver.recovered_xors(true));
                xors.iter()
                    .filter_map(|xor| xor_polynomial(encoding, xor))
                    .filter(|poly| self.anf.contextualize(poly).degree() == 1)
                    .collect()
            }
        };
        let mut learnt = 0;
        for poly in candidates {
            if self.anf.learn(poly) {
                learnt += 1;
            }
        }
        learnt
    }
}

/// `m + value` for a unit over a monomial, unless the monomial is nonlinear and forced to zero.
fn unit_polynomial(encoding: &CnfEncoding, lit: Literal) -> Option<Polynomial> {
    let m = encoding.monomial_for(lit.var())?;
    if m.degree() > 1 && !lit.sign() {
        debug!("Skipping unit {} = 0", m);
        return None;
    }
    Some(Polynomial::from(m.clone()) + &Polynomial::constant(lit.sign()))
}

/// `a` holds iff `b` holds, as `x + y + c` over two variables.
fn binary_polynomial(encoding: &CnfEncoding, a: Literal, b: Literal) -> Option<Polynomial> {
    let (m1, m2) = (encoding.monomial_for(a.var())?, encoding.monomial_for(b.var())?);
    if m1.degree() > 1 || m2.degree() > 1 {
        debug!("Skipping nonlinear binary XOR {} + {}", m1, m2);
        return None;
    }
    Some(
        Polynomial::from(m1.clone())
            + &Polynomial::from(m2.clone())
            + &Polynomial::constant(a.sign() ^ b.sign()),
    )
}

fn xor_polynomial(encoding: &CnfEncoding, xor: &XorRelation) -> Option<Polynomial> {
    let monomials = (xor.vars.iter())
        .map(|&var| encoding.monomial_for(var).cloned())
        .collect::<Option<Vec<Monomial>>>();
    let monomials = match monomials {
        Some(monomials) => monomials,
        None => {
            debug!("Skipping XOR over auxiliary variables {:?}", xor.vars);
            return None;
        }
    };
    let mut poly = Polynomial::constant(xor.rhs);
    for m in &monomials {
        poly += m;
    }
    Some(poly)
}
