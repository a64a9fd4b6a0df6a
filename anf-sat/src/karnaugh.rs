// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
//! Truth-table based conversion of small polynomials into CNF.
//!
//! A polynomial `p` over `n` variables is evaluated on all `2^n` assignments. The assignments
//! where `p` is true violate the equation `p = 0`; they are merged into prime implicants
//! (Quine–McCluskey) and each implicant becomes one clause forbidding it. The resulting clause set
//! is satisfied by exactly the assignments with `p = 0`.
use crate::{
    cnf::{Clause, Literal},
    poly::{Polynomial, Variable},
};
use itertools::Itertools;
use log::debug;
use smallvec::SmallVec;
use std::{
    cmp::Reverse,
    collections::{BTreeSet, BinaryHeap, HashMap},
    fmt, iter,
};

/// Implicants are packed into `u32` value/mask pairs, which bounds the table width.
pub const MAX_TABLE_CAPACITY: usize = 24;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KarnaughError {
    #[error(
        "Polynomial {poly} uses {vars} variables but Karnaugh tables hold at most {capacity}; \
         raise the table capacity"
    )]
    CapacityExceeded {
        poly: Polynomial,
        vars: usize,
        capacity: usize,
    },
    #[error("Karnaugh table capacity {capacity} is above the supported maximum of {max}")]
    UnsupportedCapacity { capacity: usize, max: usize },
}

/// One cell of a truth-table row.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Cell {
    Zero,
    One,
    DontCare,
}

impl From<bool> for Cell {
    fn from(bit: bool) -> Self {
        if bit {
            Cell::One
        } else {
            Cell::Zero
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Zero => write!(f, "0"),
            Cell::One => write!(f, "1"),
            Cell::DontCare => write!(f, "-"),
        }
    }
}

pub type Row = SmallVec<[Cell; 16]>;

/// A truth table over at most `capacity` table variables.
///
/// Rows are kept in three groups: rows whose output is one (the on-set), rows whose output is zero
/// (the off-set) and don't-care rows. The off-set may stay empty when the table is total, i.e. when
/// every row not in the on-set is known to be zero.
#[derive(Clone, Debug)]
pub struct BooleanTable {
    capacity: usize,
    num_vars: usize,
    on: Vec<Row>,
    off: Vec<Row>,
    dont_care: Vec<Row>,
}

impl BooleanTable {
    pub fn new(capacity: usize) -> Result<Self, KarnaughError> {
        if capacity > MAX_TABLE_CAPACITY {
            return Err(KarnaughError::UnsupportedCapacity {
                capacity,
                max: MAX_TABLE_CAPACITY,
            });
        }
        Ok(Self {
            capacity,
            num_vars: 0,
            on: Vec::new(),
            off: Vec::new(),
            dont_care: Vec::new(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    /// Clears all rows and sets the table width.
    pub fn reset(&mut self, num_vars: usize) {
        assert!(
            num_vars <= self.capacity,
            "table width {} exceeds capacity {}",
            num_vars,
            self.capacity
        );
        self.num_vars = num_vars;
        self.on.clear();
        self.off.clear();
        self.dont_care.clear();
    }

    fn row_from_bits(&self, bits: u32) -> Row {
        (0..self.num_vars)
            .map(|i| Cell::from((bits >> i) & 1 == 1))
            .collect()
    }

    /// Adds the assignment `bits` (bit `i` is table variable `i`) with the given output.
    pub fn push(&mut self, bits: u32, output: bool) {
        let row = self.row_from_bits(bits);
        if output {
            self.on.push(row);
        } else {
            self.off.push(row);
        }
    }

    pub fn push_dont_care(&mut self, bits: u32) {
        let row = self.row_from_bits(bits);
        self.dont_care.push(row);
    }

    pub fn on_rows(&self) -> &[Row] {
        &self.on
    }

    pub fn num_off(&self) -> usize {
        self.off.len()
    }

    pub fn num_dont_care(&self) -> usize {
        self.dont_care.len()
    }

    /// Replaces the on-set by a cover of prime implicants. Don't-care rows may be absorbed into
    /// implicants but never need to be covered themselves.
    pub fn minimize(&mut self) {
        let on: Vec<Implicant> = self.on.iter().map(|row| Implicant::from_row(row)).collect();
        let dont_care = self.dont_care.iter().map(|row| Implicant::from_row(row));
        let primes = prime_implicants(self.num_vars, on.iter().copied().chain(dont_care));
        let cover = select_cover(&primes, &on);
        self.on = cover.into_iter().map(|imp| imp.to_row(self.num_vars)).collect();
    }
}

impl fmt::Display for BooleanTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let groups = [(&self.on, "1"), (&self.off, "0"), (&self.dont_care, "-")];
        for (rows, output) in groups.iter() {
            for row in rows.iter() {
                writeln!(f, "{} -- {}", row.iter().format(" "), output)?;
            }
        }
        write!(f, "--------------")
    }
}

/// A cube over the table variables: bits set in `mask` are don't-cares, `value` holds the fixed
/// bits and is zero wherever `mask` is set.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
struct Implicant {
    value: u32,
    mask: u32,
}

impl Implicant {
    fn from_row(row: &[Cell]) -> Self {
        let mut imp = Implicant { value: 0, mask: 0 };
        for (i, cell) in row.iter().enumerate() {
            match cell {
                Cell::Zero => {}
                Cell::One => imp.value |= 1 << i,
                Cell::DontCare => imp.mask |= 1 << i,
            }
        }
        imp
    }

    fn to_row(self, num_vars: usize) -> Row {
        (0..num_vars)
            .map(|i| {
                if (self.mask >> i) & 1 == 1 {
                    Cell::DontCare
                } else {
                    Cell::from((self.value >> i) & 1 == 1)
                }
            })
            .collect()
    }

    /// The assignments inside the cube, enumerated over the submasks of `mask`.
    fn minterms(self) -> impl Iterator<Item = u32> {
        let mut next = Some(0u32);
        iter::from_fn(move || {
            let sub = next?;
            next = if sub == self.mask {
                None
            } else {
                Some(sub.wrapping_sub(self.mask) & self.mask)
            };
            Some(self.value | sub)
        })
    }
}

/// Repeatedly merges cubes that differ in exactly one fixed position until no merge applies.
/// Cubes that never took part in a merge are prime.
fn prime_implicants(num_vars: usize, minterms: impl IntoIterator<Item = Implicant>) -> Vec<Implicant> {
    let mut current: BTreeSet<Implicant> = minterms.into_iter().collect();
    let mut primes = Vec::new();
    while !current.is_empty() {
        let mut merged = BTreeSet::new();
        let mut used = BTreeSet::new();
        for &imp in &current {
            for bit in (0..num_vars).map(|i| 1u32 << i) {
                if imp.mask & bit != 0 || imp.value & bit != 0 {
                    continue;
                }
                let partner = Implicant {
                    value: imp.value | bit,
                    mask: imp.mask,
                };
                if current.contains(&partner) {
                    merged.insert(Implicant {
                        value: imp.value,
                        mask: imp.mask | bit,
                    });
                    used.insert(imp);
                    used.insert(partner);
                }
            }
        }
        primes.extend(current.difference(&used).copied());
        current = merged;
    }
    primes
}

/// Picks essential primes first, then greedily the prime covering the most uncovered minterms.
///
/// Gains only shrink as minterms get covered, so stale heap entries are re-scored when popped
/// instead of rescanning every prime each round.
fn select_cover(primes: &[Implicant], on: &[Implicant]) -> Vec<Implicant> {
    let index: HashMap<u32, usize> = (on.iter().enumerate())
        .map(|(i, minterm)| {
            debug_assert_eq!(minterm.mask, 0);
            (minterm.value, i)
        })
        .collect();
    let covered_by: Vec<Vec<usize>> = (primes.iter())
        .map(|p| p.minterms().filter_map(|m| index.get(&m).copied()).collect())
        .collect();
    let mut coverers = vec![Vec::new(); on.len()];
    for (p, minterms) in covered_by.iter().enumerate() {
        for &m in minterms {
            coverers[m].push(p);
        }
    }

    let mut covered = vec![false; on.len()];
    let mut chosen = BTreeSet::new();
    for covering in &coverers {
        if let [essential] = covering[..] {
            chosen.insert(essential);
        }
    }
    for &p in &chosen {
        for &m in &covered_by[p] {
            covered[m] = true;
        }
    }

    let gain = |p: usize, covered: &[bool]| covered_by[p].iter().filter(|&&m| !covered[m]).count();
    // Max gain first, the smallest prime among equal gains
    let mut heap: BinaryHeap<_> = (0..primes.len())
        .filter(|p| !chosen.contains(p))
        .map(|p| (gain(p, &covered), Reverse(primes[p]), p))
        .filter(|&(gain, ..)| gain > 0)
        .collect();
    while let Some((stored, key, p)) = heap.pop() {
        let actual = gain(p, &covered);
        if actual == 0 {
            continue;
        }
        if actual < stored {
            heap.push((actual, key, p));
            continue;
        }
        chosen.insert(p);
        for &m in &covered_by[p] {
            covered[m] = true;
        }
    }
    debug_assert!(covered.iter().all(|&c| c));
    chosen.into_iter().map(|p| primes[p]).sorted().collect()
}

/// Converts polynomials over a bounded number of variables into minimal CNF.
#[derive(Clone, Debug)]
pub struct KarnaughConverter {
    table: BooleanTable,
    table_vars: Vec<Variable>,
}

impl KarnaughConverter {
    /// Fails if `capacity` exceeds [`MAX_TABLE_CAPACITY`].
    pub fn new(capacity: usize) -> Result<Self, KarnaughError> {
        Ok(Self {
            table: BooleanTable::new(capacity)?,
            table_vars: Vec::new(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn table(&self) -> &BooleanTable {
        &self.table
    }

    /// Whether `poly` fits into the table.
    pub fn can_convert(&self, poly: &Polynomial) -> bool {
        poly.variables().len() <= self.capacity()
    }

    /// Produces clauses over the variables of `poly` that hold exactly when `poly = 0`.
    ///
    /// A constant zero yields no clauses and a constant one a single empty clause, so callers
    /// usually handle constants before converting.
    pub fn convert(&mut self, poly: &Polynomial) -> Result<Vec<Clause>, KarnaughError> {
        self.evaluate_into_table(poly)?;
        self.table.minimize();
        debug!("Karnaugh table of {} after minimization:\n{}", poly, self.table);
        Ok(self.clauses())
    }

    fn evaluate_into_table(&mut self, poly: &Polynomial) -> Result<(), KarnaughError> {
        self.table_vars = poly.variables().into_iter().collect();
        if self.table_vars.len() > self.capacity() {
            return Err(KarnaughError::CapacityExceeded {
                poly: poly.clone(),
                vars: self.table_vars.len(),
                capacity: self.capacity(),
            });
        }

        self.table.reset(self.table_vars.len());
        let table_vars = &self.table_vars;
        for setting in 0..(1u32 << table_vars.len()) {
            let out = poly
                .evaluate(|var| {
                    let i = table_vars.binary_search(&var).ok()?;
                    Some((setting >> i) & 1 == 1)
                })
                .expect("all variables of the polynomial are bound by the table row");
            // The table is total, so only the on-set is materialized
            if out {
                self.table.push(setting, true);
            }
        }
        debug!("Karnaugh table of {} after evaluation:\n{}", poly, self.table);
        Ok(())
    }

    /// One clause per implicant, forbidding the assignments it covers.
    fn clauses(&self) -> Vec<Clause> {
        (self.table.on_rows().iter())
            .map(|row| {
                (self.table_vars.iter().zip(row))
                    .filter_map(|(&var, cell)| match cell {
                        Cell::Zero => Some(Literal::t(var)),
                        Cell::One => Some(Literal::f(var)),
                        Cell::DontCare => None,
                    })
                    .collect()
            })
            .collect()
    }

    /// Renders the conversion of `poly` for diagnostics.
    pub fn debug_conversion(&mut self, poly: &Polynomial) -> String {
        match self.convert(poly) {
            Ok(clauses) => format!(
                "Converting: \"{}\" to Karnaugh clauses:\n{}",
                poly,
                clauses.iter().join("\n")
            ),
            Err(err) => format!("Cannot convert \"{}\": {}", poly, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnf::Clause;
    use test_log::test;

    fn x(i: u32) -> Variable {
        Variable(i)
    }

    fn poly(s: &str) -> Polynomial {
        s.parse().unwrap()
    }

    fn clause(lits: &[Literal]) -> Clause {
        lits.iter().copied().collect()
    }

    /// The clauses must hold on exactly the assignments where the polynomial is zero.
    fn assert_equivalent(p: &Polynomial, clauses: &[Clause]) {
        let vars: Vec<_> = p.variables().into_iter().collect();
        for setting in 0..(1u32 << vars.len()) {
            let value = |var: Variable| {
                let i = vars.iter().position(|&v| v == var)?;
                Some((setting >> i) & 1 == 1)
            };
            let expected = !p.evaluate(value).unwrap();
            let actual = clauses.iter().all(|c| c.evaluate(value).unwrap());
            assert_eq!(expected, actual, "{} at setting {:#b}", p, setting);
        }
    }

    #[test]
    fn single_true_row() {
        let p = poly("x5 + x5*x6");
        let clauses = KarnaughConverter::new(8).unwrap().convert(&p).unwrap();
        // Forbids x5 = 1, x6 = 0
        assert_eq!(clauses, [clause(&[Literal::f(x(5)), Literal::t(x(6))])]);
        assert_equivalent(&p, &clauses);
    }

    #[test]
    fn unmergeable_rows() {
        let p = poly("x1*x5 + x5*x6");
        let clauses = KarnaughConverter::new(8).unwrap().convert(&p).unwrap();
        assert_eq!(clauses.len(), 2);
        assert!(clauses.iter().all(|c| c.len() == 3));
        assert!(clauses.contains(&clause(&[Literal::f(x(1)), Literal::f(x(5)), Literal::t(x(6))])));
        assert!(clauses.contains(&clause(&[Literal::t(x(1)), Literal::f(x(5)), Literal::f(x(6))])));
        assert_equivalent(&p, &clauses);
    }

    #[test]
    fn merges_adjacent_rows() {
        // x1 OR x2 = 0
        let p = poly("x1*x2 + x1 + x2");
        let clauses = KarnaughConverter::new(8).unwrap().convert(&p).unwrap();
        assert_eq!(
            clauses,
            [clause(&[Literal::f(x(1))]), clause(&[Literal::f(x(2))])]
        );
        assert_equivalent(&p, &clauses);

        let p = poly("x3 + 1");
        let clauses = KarnaughConverter::new(8).unwrap().convert(&p).unwrap();
        assert_eq!(clauses, [clause(&[Literal::t(x(3))])]);
    }

    #[test]
    fn parity_has_no_merges() {
        let p = poly("x1 + x2 + x3");
        let clauses = KarnaughConverter::new(8).unwrap().convert(&p).unwrap();
        assert_eq!(clauses.len(), 4);
        assert!(clauses.iter().all(|c| c.len() == 3));
        assert_equivalent(&p, &clauses);
    }

    #[test]
    fn round_trip() {
        let mut converter = KarnaughConverter::new(6).unwrap();
        for s in &[
            "x1*x2*x3 + x2*x4 + x1 + 1",
            "x0*x1 + x2*x3 + x4*x5",
            "x0*x1*x2*x3*x4*x5 + 1",
            "x0*x1*x2 + x0*x3 + x1*x3 + x2",
            "x7*x9 + x9 + x11*x7 + x11 + 1",
            "x2 + x3",
        ] {
            let p = poly(s);
            let clauses = converter.convert(&p).unwrap();
            assert_equivalent(&p, &clauses);
        }
    }

    #[test]
    fn constants() {
        let mut converter = KarnaughConverter::new(4).unwrap();
        assert!(converter.convert(&Polynomial::zero()).unwrap().is_empty());
        assert_eq!(
            converter.convert(&Polynomial::one()).unwrap(),
            [Clause::default()]
        );
    }

    #[test]
    fn capacity_boundary() {
        let mut converter = KarnaughConverter::new(2).unwrap();
        let fits = poly("x1*x2 + x1");
        let too_wide = poly("x1*x2 + x3");
        assert!(converter.can_convert(&fits));
        assert!(!converter.can_convert(&too_wide));
        assert_eq!(
            converter.convert(&too_wide),
            Err(KarnaughError::CapacityExceeded {
                poly: too_wide.clone(),
                vars: 3,
                capacity: 2
            })
        );
        assert!(converter.debug_conversion(&too_wide).starts_with("Cannot convert"));
    }

    #[test]
    fn capacity_above_maximum() {
        assert_eq!(
            KarnaughConverter::new(30).unwrap_err(),
            KarnaughError::UnsupportedCapacity {
                capacity: 30,
                max: MAX_TABLE_CAPACITY
            }
        );
        assert!(BooleanTable::new(MAX_TABLE_CAPACITY + 1).is_err());
        let converter = KarnaughConverter::new(MAX_TABLE_CAPACITY).unwrap();
        assert_eq!(converter.capacity(), MAX_TABLE_CAPACITY);
        let widest: Polynomial = (0..MAX_TABLE_CAPACITY as u32)
            .map(|i| crate::poly::Monomial::from(Variable(i)))
            .collect();
        assert!(converter.can_convert(&widest));
        assert!(!converter.can_convert(&(widest + &poly("x30"))));
    }

    #[test]
    fn wide_cover() {
        // Where x2 + ... + x13 is one, x0 = 0 and x1 = 0 are both needed; elsewhere only the single
        // row x0 = x1 = 1 is true and has no true neighbour.
        let terms = (2..14).map(|i| format!("x{}", i)).join(" + ");
        let p = poly(&format!("x0*x1 + {}", terms));
        let clauses = KarnaughConverter::new(16).unwrap().convert(&p).unwrap();
        assert_eq!(clauses.len(), 3 << 11);
        assert_eq!(clauses.iter().filter(|c| c.len() == 13).count(), 2 << 11);
        assert_eq!(clauses.iter().filter(|c| c.len() == 14).count(), 1 << 11);
    }

    #[test]
    fn dont_cares_widen_implicants() {
        let mut table = BooleanTable::new(4).unwrap();
        table.reset(2);
        table.push(0b11, true);
        table.push_dont_care(0b01);
        table.minimize();
        assert_eq!(table.on_rows(), [Row::from_slice(&[Cell::One, Cell::DontCare])]);
        assert_eq!(table.num_dont_care(), 1);
        assert_eq!(table.num_off(), 0);
    }

    #[test]
    fn table_display() {
        let mut converter = KarnaughConverter::new(4).unwrap();
        converter.convert(&poly("x1 + x2")).unwrap();
        assert_eq!(converter.table().to_string(), "1 0 -- 1\n0 1 -- 1\n--------------");
    }
}
