// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

/// Bounds and knobs shared by the encoder and the SAT simplifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of variables a Karnaugh table can hold. Converting a wider polynomial is an
    /// error.
    pub karnaugh_capacity: usize,
    /// Nonlinear equations over at most this many variables are encoded through Karnaugh
    /// minimization instead of monomial variables and XOR chains.
    pub karnaugh_cutoff: usize,
    /// Maximum number of literals per XOR chunk before an auxiliary variable is introduced.
    pub xor_cut_len: usize,
    /// Conflict budget handed to the SAT solver.
    pub max_conflicts: u64,
    pub verbosity: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            karnaugh_capacity: 16,
            karnaugh_cutoff: 8,
            xor_cut_len: 4,
            max_conflicts: 100_000,
            verbosity: 0,
        }
    }
}
