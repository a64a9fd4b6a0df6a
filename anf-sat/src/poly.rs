// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
//! Boolean polynomials over GF(2) in algebraic normal form.
use itertools::Itertools;
use smallvec::SmallVec;
use std::{
    cmp::Reverse,
    collections::BTreeSet,
    fmt,
    iter::FromIterator,
    num::ParseIntError,
    ops,
    str::FromStr,
};

/// A dense index into the variable space shared by the ANF system and its CNF encoding.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Variable(pub u32);

impl Variable {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// A product of distinct variables, kept sorted. The empty monomial is the constant one.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Monomial(SmallVec<[Variable; 4]>);

impl Monomial {
    pub fn one() -> Self {
        Self::default()
    }

    pub fn is_one(&self) -> bool {
        self.0.is_empty()
    }

    pub fn degree(&self) -> usize {
        self.0.len()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.0
    }

    pub fn contains(&self, var: Variable) -> bool {
        self.0.binary_search(&var).is_ok()
    }

    /// The monomial with `var` removed; `self` if `var` doesn't occur.
    pub fn without(&self, var: Variable) -> Self {
        Self(self.0.iter().copied().filter(|&v| v != var).collect())
    }

    /// Evaluates the product under `assignment`. Returns `None` only if a variable is unbound.
    pub fn evaluate(&self, assignment: impl Fn(Variable) -> Option<bool>) -> Option<bool> {
        let mut value = true;
        for &var in &self.0 {
            value &= assignment(var)?;
        }
        Some(value)
    }
}

impl From<Variable> for Monomial {
    fn from(var: Variable) -> Self {
        Self(smallvec::smallvec![var])
    }
}

impl FromIterator<Variable> for Monomial {
    fn from_iter<T: IntoIterator<Item = Variable>>(iter: T) -> Self {
        let mut vars: SmallVec<_> = iter.into_iter().collect();
        vars.sort_unstable();
        vars.dedup();
        Self(vars)
    }
}

impl ops::Mul for &Monomial {
    type Output = Monomial;

    fn mul(self, rhs: Self) -> Monomial {
        Monomial(self.0.iter().merge(&rhs.0).copied().dedup().collect())
    }
}

impl fmt::Display for Monomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_one() {
            write!(f, "1")
        } else {
            write!(f, "{}", self.0.iter().format("*"))
        }
    }
}

/// A XOR of monomials. Adding a monomial that is already present cancels it, so the set of
/// monomials is always canonical; the constant term is the presence of [`Monomial::one`].
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Polynomial(BTreeSet<Monomial>);

impl Polynomial {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn one() -> Self {
        Self::constant(true)
    }

    pub fn constant(value: bool) -> Self {
        let mut poly = Self::zero();
        if value {
            poly.0.insert(Monomial::one());
        }
        poly
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_one(&self) -> bool {
        self.0.len() == 1 && self.constant_term()
    }

    pub fn constant_term(&self) -> bool {
        self.0.contains(&Monomial::one())
    }

    /// Degree of the highest monomial; constants (including zero) have degree 0.
    pub fn degree(&self) -> usize {
        self.0.iter().map(Monomial::degree).max().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_zero()
    }

    /// Monomials other than the constant term.
    pub fn terms(&self) -> impl Iterator<Item = &Monomial> + '_ {
        self.0.iter().filter(|m| !m.is_one())
    }

    pub fn variables(&self) -> BTreeSet<Variable> {
        (self.0.iter())
            .flat_map(|m| m.variables().iter().copied())
            .collect()
    }

    fn toggle(&mut self, monomial: Monomial) {
        if !self.0.remove(&monomial) {
            self.0.insert(monomial);
        }
    }

    /// Evaluates the polynomial under `assignment`. Returns `None` only if a used variable is
    /// unbound.
    pub fn evaluate(&self, assignment: impl Fn(Variable) -> Option<bool>) -> Option<bool> {
        let mut value = false;
        for m in &self.0 {
            value ^= m.evaluate(&assignment)?;
        }
        Some(value)
    }

    /// Fixes `var` to `value`.
    pub fn assign(&self, var: Variable, value: bool) -> Self {
        let mut out = Self::zero();
        for m in &self.0 {
            if !m.contains(var) {
                out.toggle(m.clone());
            } else if value {
                out.toggle(m.without(var));
            }
        }
        out
    }

    /// Replaces every occurrence of `var` by `replacement`.
    pub fn substitute(&self, var: Variable, replacement: &Polynomial) -> Self {
        let mut out = Self::zero();
        for m in &self.0 {
            if m.contains(var) {
                let rest = m.without(var);
                for t in &replacement.0 {
                    out.toggle(&rest * t);
                }
            } else {
                out.toggle(m.clone());
            }
        }
        out
    }
}

impl From<Monomial> for Polynomial {
    fn from(monomial: Monomial) -> Self {
        let mut poly = Self::zero();
        poly.0.insert(monomial);
        poly
    }
}

impl From<Variable> for Polynomial {
    fn from(var: Variable) -> Self {
        Monomial::from(var).into()
    }
}

impl ops::AddAssign<Monomial> for Polynomial {
    fn add_assign(&mut self, rhs: Monomial) {
        self.toggle(rhs)
    }
}

impl ops::AddAssign<&Monomial> for Polynomial {
    fn add_assign(&mut self, rhs: &Monomial) {
        self.toggle(rhs.clone())
    }
}

impl ops::AddAssign<&Polynomial> for Polynomial {
    fn add_assign(&mut self, rhs: &Polynomial) {
        for m in &rhs.0 {
            self.toggle(m.clone());
        }
    }
}

impl ops::Add<&Polynomial> for Polynomial {
    type Output = Polynomial;

    fn add(mut self, rhs: &Polynomial) -> Polynomial {
        self += rhs;
        self
    }
}

impl ops::Mul<&Monomial> for &Polynomial {
    type Output = Polynomial;

    fn mul(self, rhs: &Monomial) -> Polynomial {
        let mut out = Polynomial::zero();
        for m in &self.0 {
            out.toggle(m * rhs);
        }
        out
    }
}

impl FromIterator<Monomial> for Polynomial {
    fn from_iter<T: IntoIterator<Item = Monomial>>(iter: T) -> Self {
        let mut poly = Self::zero();
        for m in iter {
            poly.toggle(m);
        }
        poly
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0");
        }
        // Highest degree first, constant last
        let terms = (self.0.iter()).sorted_by_key(|m| (Reverse(m.degree()), m.variables().to_vec()));
        write!(f, "{}", terms.format(" + "))
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParsePolyError {
    #[error("Empty term in polynomial")]
    EmptyTerm,
    #[error("Unexpected token '{0}' in polynomial")]
    UnexpectedToken(String),
    #[error("Malformed variable '{0}'")]
    BadVariable(String, #[source] ParseIntError),
}

impl FromStr for Polynomial {
    type Err = ParsePolyError;

    /// Parses text such as `x1*x2 + x3 + 1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut poly = Polynomial::zero();
        for term in s.split('+').map(str::trim) {
            if term.is_empty() {
                return Err(ParsePolyError::EmptyTerm);
            }
            let mut vars = Vec::new();
            let mut vanishes = false;
            for factor in term.split('*').map(str::trim) {
                match factor {
                    "0" => vanishes = true,
                    "1" => {}
                    _ => match factor.strip_prefix('x') {
                        Some(index) => {
                            let index = index
                                .trim_start_matches('(')
                                .trim_end_matches(')')
                                .parse()
                                .map_err(|err| ParsePolyError::BadVariable(factor.to_owned(), err))?;
                            vars.push(Variable(index));
                        }
                        None => return Err(ParsePolyError::UnexpectedToken(factor.to_owned())),
                    },
                }
            }
            if !vanishes {
                poly += vars.into_iter().collect::<Monomial>();
            }
        }
        Ok(poly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x(i: u32) -> Variable {
        Variable(i)
    }

    fn poly(s: &str) -> Polynomial {
        s.parse().unwrap()
    }

    #[test]
    fn parse_and_display() {
        assert_eq!(poly("x5 + x5*x6").to_string(), "x5*x6 + x5");
        assert_eq!(poly("1 + x1*x2 + x3").to_string(), "x1*x2 + x3 + 1");
        assert_eq!(poly("x(3) * x(1)").to_string(), "x1*x3");
        assert_eq!(poly("0").to_string(), "0");
        assert_eq!(poly("x1*0 + x2").to_string(), "x2");
    }

    #[test]
    fn parse_errors() {
        assert_eq!(
            "x1 + y2".parse::<Polynomial>(),
            Err(ParsePolyError::UnexpectedToken("y2".into()))
        );
        assert_eq!("x1 + ".parse::<Polynomial>(), Err(ParsePolyError::EmptyTerm));
        assert!(matches!(
            "xa".parse::<Polynomial>(),
            Err(ParsePolyError::BadVariable(..))
        ));
    }

    #[test]
    fn duplicates_cancel() {
        assert!(poly("x1*x2 + x2*x1").is_zero());
        assert_eq!(poly("x1*x1*x2"), poly("x1*x2"));
        assert!(poly("1 + 1 + 1").is_one());
    }

    #[test]
    fn degree_and_variables() {
        let p = poly("x1*x5 + x5*x6 + 1");
        assert_eq!(p.degree(), 2);
        assert_eq!(p.variables().into_iter().collect::<Vec<_>>(), [x(1), x(5), x(6)]);
        assert!(p.constant_term());
        assert_eq!(Polynomial::one().degree(), 0);
        assert_eq!(Polynomial::zero().degree(), 0);
    }

    #[test]
    fn evaluate() {
        let p = poly("x5 + x5*x6");
        let at = |x5, x6| {
            p.evaluate(|v| match v.0 {
                5 => Some(x5),
                6 => Some(x6),
                _ => None,
            })
        };
        assert_eq!(at(false, false), Some(false));
        assert_eq!(at(false, true), Some(false));
        assert_eq!(at(true, false), Some(true));
        assert_eq!(at(true, true), Some(false));
        assert_eq!(p.evaluate(|_| None), None);
    }

    #[test]
    fn assign_and_substitute() {
        let p = poly("x1*x2 + x2 + x3");
        assert_eq!(p.assign(x(2), true), poly("x1 + 1 + x3"));
        assert_eq!(p.assign(x(2), false), poly("x3"));
        // x2 := x1 + 1 gives x1*(x1 + 1) + x1 + 1 + x3 = x1 + 1 + x3
        assert_eq!(p.substitute(x(2), &poly("x1 + 1")), poly("x1 + 1 + x3"));
    }

    #[test]
    fn products() {
        let m = Monomial::from_iter([x(1), x(3)]);
        let n = Monomial::from_iter([x(3), x(2)]);
        assert_eq!(&m * &n, Monomial::from_iter([x(1), x(2), x(3)]));
        assert_eq!(&poly("x1 + 1") * &Monomial::from(x(1)), Polynomial::zero());
    }
}
