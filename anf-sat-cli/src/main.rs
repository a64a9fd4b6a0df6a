// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0
use anf_sat::{
    encoding::CnfEncoding, karnaugh::KarnaughConverter, Anf, Config, SatSimplifier,
    SimplifyOutcome, VarisatSolver,
};
use anyhow::Context;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
struct Opt {
    /// Log more; repeat for more detail.
    #[structopt(short, long, parse(from_occurrences))]
    verbose: u32,
    /// Maximum number of variables in a Karnaugh table.
    #[structopt(long, default_value = "16")]
    karnaugh_capacity: usize,
    /// Nonlinear equations over at most this many variables are converted through Karnaugh maps.
    #[structopt(long, default_value = "8")]
    karnaugh_cutoff: usize,
    /// Maximum number of literals in one XOR chunk.
    #[structopt(long, default_value = "4")]
    xor_cut_len: usize,
    /// Conflict budget for the SAT solver.
    #[structopt(long, default_value = "100000")]
    max_conflicts: u64,
    #[structopt(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, StructOpt)]
enum Cmd {
    /// Print the Karnaugh conversion of every equation.
    Karnaugh {
        /// ANF file, one polynomial per line.
        #[structopt(parse(from_os_str))]
        instance: PathBuf,
    },
    /// Encode the system into DIMACS CNF.
    Cnf {
        #[structopt(parse(from_os_str))]
        instance: PathBuf,
        /// Write generated CNF encoding to a file.
        #[structopt(parse(from_os_str))]
        cnf_outfile: PathBuf,
    },
    /// Simplify the system with a SAT solver.
    Simplify {
        #[structopt(parse(from_os_str))]
        instance: PathBuf,
    },
}

impl Opt {
    fn config(&self) -> Config {
        Config {
            karnaugh_capacity: self.karnaugh_capacity,
            karnaugh_cutoff: self.karnaugh_cutoff,
            xor_cut_len: self.xor_cut_len,
            max_conflicts: self.max_conflicts,
            verbosity: self.verbose,
        }
    }
}

fn read_anf(path: &Path) -> anyhow::Result<Anf> {
    let file =
        fs::File::open(path).with_context(|| format!("Unable to open file: {}", path.display()))?;
    Anf::parse(io::BufReader::new(file))
        .with_context(|| format!("Unable to parse ANF from {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();
    let level = match opt.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    TermLogger::init(
        level,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .context("Unable to initialize logging")?;
    let config = opt.config();

    match &opt.cmd {
        Cmd::Karnaugh { instance } => {
            let system = read_anf(instance)?;
            let mut converter = KarnaughConverter::new(config.karnaugh_capacity)
                .context("Invalid --karnaugh-capacity")?;
            for poly in system.equations() {
                println!("{}", converter.debug_conversion(poly));
            }
        }
        Cmd::Cnf {
            instance,
            cnf_outfile,
        } => {
            let system = read_anf(instance)?;
            let encoding = CnfEncoding::encode(&system, &config)?;
            info!(
                "Encoded {} equations into {} variables and {} clauses",
                system.equations().len(),
                encoding.num_vars(),
                encoding.num_clauses()
            );
            let out = fs::File::create(cnf_outfile)
                .with_context(|| format!("Unable to create file: {}", cnf_outfile.display()))?;
            let mut cnf = encoding.to_cnf();
            for &lit in encoding.assumptions() {
                cnf.push(std::iter::once(lit).collect());
            }
            cnf.write_dimacs(encoding.num_vars(), out)?;
        }
        Cmd::Simplify { instance } => {
            let orig = read_anf(instance)?;
            let mut system = orig.clone();
            let outcome = SatSimplifier::new(&mut system, &orig, &config, VarisatSolver::new())
                .simplify()?;
            match outcome {
                SimplifyOutcome::Unsat => println!("UNSAT"),
                SimplifyOutcome::Learnt { learnt, solution } => {
                    println!("c learnt {} facts", learnt);
                    print!("{}", system);
                    if let Some(solution) = solution {
                        let values: Vec<_> = (solution.iter().enumerate())
                            .map(|(i, &value)| format!("x{}={}", i, value as u8))
                            .collect();
                        println!("c solution {}", values.join(" "));
                    }
                }
            }
        }
    }
    Ok(())
}
