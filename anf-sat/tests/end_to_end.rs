// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
use anf_sat::{
    cnf::CnfTerm,
    encoding::CnfEncoding,
    karnaugh::KarnaughConverter,
    Anf, Config, Polynomial, SatSimplifier, SimplifyOutcome, Variable, VarisatSolver,
};
use paste::paste;

fn anf(s: &str) -> Anf {
    Anf::parse(s.as_bytes()).unwrap()
}

/// Every assignment of the polynomial's variables satisfies its clauses iff the polynomial is zero.
fn check_karnaugh(poly: &Polynomial) {
    let mut converter = KarnaughConverter::new(16).unwrap();
    let clauses: CnfTerm = converter.convert(poly).unwrap().into_iter().collect();
    let vars: Vec<_> = poly.variables().into_iter().collect();
    for bits in 0..1u32 << vars.len() {
        let value = |v: Variable| {
            let i = vars.iter().position(|&x| x == v)?;
            Some((bits >> i) & 1 == 1)
        };
        assert_eq!(
            clauses.evaluate(value),
            poly.evaluate(value).map(|p| !p),
            "{} under {:#b}",
            poly,
            bits
        );
    }
}

fn simplify(system: &mut Anf, config: &Config) -> SimplifyOutcome {
    let orig = system.clone();
    SatSimplifier::new(system, &orig, config, VarisatSolver::new())
        .simplify()
        .unwrap()
}

/// Runs the Karnaugh conversion on every equation of the system, then checks that SAT
/// simplification produces a verified solution under both encodings of nonlinear equations.
macro_rules! satisfiable {
    ($($name:ident: $system:expr,)*) => {
        paste! {
            $(
                #[test_log::test]
                fn [<karnaugh_ $name>]() {
                    for poly in anf($system).equations() {
                        check_karnaugh(poly);
                    }
                }

                #[test_log::test]
                fn [<simplify_ $name>]() {
                    for &karnaugh_cutoff in &[0, 8] {
                        let config = Config { karnaugh_cutoff, ..Config::default() };
                        let orig = anf($system);
                        let mut system = orig.clone();
                        match simplify(&mut system, &config) {
                            SimplifyOutcome::Learnt { solution: Some(solution), .. } => {
                                assert_eq!(orig.check_solution(&solution), Ok(()));
                            }
                            outcome => panic!("unexpected outcome {:?}", outcome),
                        }
                    }
                }
            )*
        }
    };
}

satisfiable! {
    single_row: "x5 + x5*x6",
    two_rows: "x1*x5 + x5*x6",
    mixed: "x0*x1 + x2 + 1\nx1*x2*x3 + x0 + x4\nx0 + x1 + x2 + x3 + x4 + x5",
    chained: "x0*x1 + x0 + x1 + 1\nx0*x1 + x1\nx2*x3 + x4\nx4 + x5 + x6 + x7 + x8 + 1",
    cubic: "x0*x1*x2 + x1*x2*x3 + x2*x3*x4 + x0 + 1\nx0*x4 + x1*x3 + x2",
}

#[test_log::test]
fn unsat_system() {
    let mut system = anf("x1*x2 + x3\nx1*x2 + x3 + 1");
    let outcome = simplify(&mut system, &Config::default());
    assert_eq!(outcome.as_count(), -1);
    assert!(!system.ok());
    // Further attempts don't touch the system
    let equations = system.equations().to_vec();
    assert_eq!(simplify(&mut system, &Config::default()), SimplifyOutcome::Unsat);
    assert_eq!(system.equations(), &equations[..]);
}

#[test_log::test]
fn learnt_facts_keep_every_solution() {
    let orig = anf("x0*x1 + x2\nx1*x2 + x0 + x3\nx0 + x1 + x3 + 1");
    let mut system = orig.clone();
    simplify(&mut system, &Config::default());
    for bits in 0..16u32 {
        let solution: Vec<bool> = (0..4).map(|i| (bits >> i) & 1 == 1).collect();
        if orig.check_solution(&solution).is_ok() {
            assert_eq!(system.check_solution(&solution), Ok(()), "{:?}", solution);
        }
    }
}

#[test_log::test]
fn dimacs_of_encoding() {
    let system = anf("x0*x1 + x2");
    let encoding = CnfEncoding::encode(&system, &Config::default()).unwrap();
    let mut out = Vec::new();
    encoding
        .to_cnf()
        .write_dimacs(encoding.num_vars(), &mut out)
        .unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.starts_with("p cnf 3 "));

    let cnf = encoding.to_cnf();
    for bits in 0..8u32 {
        let value = |v: Variable| Some((bits >> v.0) & 1 == 1);
        assert_eq!(
            cnf.evaluate(value),
            system.equations()[0].evaluate(value).map(|p| !p),
            "{:#b}",
            bits
        );
    }
}
