//! Conversion of GF(2) polynomial systems (ANF) to CNF, and SAT-driven simplification of such
//! systems.
//!
//! [`karnaugh::KarnaughConverter`] turns one small polynomial into a minimized clause set,
//! [`encoding::CnfEncoding`] encodes a whole [`Anf`] system, and [`SatSimplifier`] runs a
//! [`SatSolver`] on that encoding and merges what the solver derived back into the system.

#![warn(rustdoc::broken_intra_doc_links)]
// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#[macro_use]
pub mod cnf;
pub mod anf;
pub mod config;
pub mod encoding;
pub mod karnaugh;
pub mod poly;
pub mod simplify;
pub mod solver;

pub use anf::{Anf, Solution};
pub use config::Config;
pub use poly::{Monomial, Polynomial, Variable};
pub use simplify::{SatSimplifier, SimplifyError, SimplifyOutcome};
pub use solver::{SatSolver, SolveOutcome};
#[cfg(feature = "varisat")]
pub use solver::VarisatSolver;
