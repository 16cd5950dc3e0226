//! Command line interface

use std::fs::File;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};

use faultline::atpg::{run_atpg, AtpgConfig, ScopeMode};
use faultline::dtpg::JustKind;
use faultline::fault::{FaultDb, FaultStatus, FaultType};
use faultline::io::{parse_netlist_file, read_patterns, write_patterns};
use faultline::network::{build, Network};
use faultline::packed::PV_BITLEN;
use faultline::sim::Fsim;

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Show statistics about a logic network
    ///
    /// Prints input, output, gate, level, FFR and MFFC counts, plus the
    /// size of the collapsed fault list.
    #[clap()]
    Show(ShowArgs),

    /// Generate test patterns for a netlist
    ///
    /// Runs random-pattern fault dropping followed by SAT-based generation
    /// per fanout-free region (or per cone with --scope mffc), and writes
    /// the resulting vectors to a pattern file.
    #[clap()]
    Atpg(AtpgArgs),

    /// Fault-simulate a pattern file and report its coverage
    #[clap(alias = "sim")]
    Simulate(SimulateArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FaultTypeArg {
    /// Single stuck-at faults
    StuckAt,
    /// Two-frame transition-delay faults
    Transition,
}

impl From<FaultTypeArg> for FaultType {
    fn from(arg: FaultTypeArg) -> FaultType {
        match arg {
            FaultTypeArg::StuckAt => FaultType::StuckAt,
            FaultTypeArg::Transition => FaultType::TransitionDelay,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ScopeArg {
    /// One SAT scope per fanout-free region
    Ffr,
    /// One SAT scope per maximum fanout-free cone
    Mffc,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum JustifierArg {
    /// Record every input from the model
    All,
    /// Minimal support, first controlling input
    Just1,
    /// Minimal support, cheapest controlling input
    Just2,
}

impl From<JustifierArg> for JustKind {
    fn from(arg: JustifierArg) -> JustKind {
        match arg {
            JustifierArg::All => JustKind::All,
            JustifierArg::Just1 => JustKind::Just1,
            JustifierArg::Just2 => JustKind::Just2,
        }
    }
}

/// Command arguments for network statistics
#[derive(Args)]
pub struct ShowArgs {
    /// Network to show
    file: PathBuf,

    /// Fault model used for the fault counts
    #[arg(long, value_enum, default_value_t = FaultTypeArg::StuckAt)]
    fault_type: FaultTypeArg,

    /// Also dump the collapsed fault list
    #[arg(long)]
    faults: bool,
}

impl ShowArgs {
    pub fn run(&self) -> anyhow::Result<()> {
        let network = load_network(&self.file)?;
        println!("{}", network.stats());
        let db = FaultDb::enumerate(&network, self.fault_type.into());
        println!(
            "Faults: {} ({} representative)",
            db.fault_num(),
            db.rep_num()
        );
        if self.faults {
            print!("{}", db.dump(&network));
        }
        Ok(())
    }
}

/// Command arguments for test pattern generation
#[derive(Args)]
pub struct AtpgArgs {
    /// Network to generate test patterns for
    network: PathBuf,

    /// Output file for the patterns
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Fault model
    #[arg(long, value_enum, default_value_t = FaultTypeArg::StuckAt)]
    fault_type: FaultTypeArg,

    /// SAT scope granularity
    #[arg(long, value_enum, default_value_t = ScopeArg::Ffr)]
    scope: ScopeArg,

    /// Back-trace strategy
    #[arg(long, value_enum, default_value_t = JustifierArg::Just1)]
    justifier: JustifierArg,

    /// Alternative vectors to collect per fault
    #[arg(short = 'k', long, default_value_t = 1)]
    k_patterns: usize,

    /// Per-call SAT conflict budget
    #[arg(long)]
    conflict_limit: Option<u32>,

    /// Per-call SAT wall-clock budget in milliseconds
    #[arg(long)]
    sat_timeout_ms: Option<u64>,

    /// Barren random rounds before the random phase stops (0 disables it)
    #[arg(short = 'r', long, default_value_t = 4)]
    random_rounds: usize,

    /// Random seed
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Leave unassigned positions as X instead of random-filling them
    #[arg(long)]
    keep_x: bool,
}

impl AtpgArgs {
    pub fn run(&self) -> anyhow::Result<()> {
        let network = load_network(&self.network)?;
        let config = AtpgConfig {
            fault_type: self.fault_type.into(),
            scope: match self.scope {
                ScopeArg::Ffr => ScopeMode::Ffr,
                ScopeArg::Mffc => ScopeMode::Mffc,
            },
            justifier: self.justifier.into(),
            k_patterns: self.k_patterns.max(1),
            conflict_limit: self.conflict_limit,
            sat_timeout: self.sat_timeout_ms.map(Duration::from_millis),
            random_rounds: self.random_rounds,
            fix_x: !self.keep_x,
            seed: self.seed,
            progress: true,
            ..AtpgConfig::default()
        };
        let start = Instant::now();
        let result = run_atpg(&network, &config);
        let mut out = File::create(&self.output)
            .with_context(|| format!("creating {}", self.output.display()))?;
        write_patterns(&mut out, &result.patterns)?;
        println!("{}", result);
        println!("Total: {:.3?}", start.elapsed());
        Ok(())
    }
}

/// Command arguments for fault simulation
#[derive(Args)]
pub struct SimulateArgs {
    /// Network to simulate
    network: PathBuf,

    /// Input pattern file
    #[arg(short = 'i', long)]
    input: PathBuf,

    /// Fault model
    #[arg(long, value_enum, default_value_t = FaultTypeArg::StuckAt)]
    fault_type: FaultTypeArg,
}

impl SimulateArgs {
    pub fn run(&self) -> anyhow::Result<()> {
        let network = load_network(&self.network)?;
        let fault_type: FaultType = self.fault_type.into();
        let mut db = FaultDb::enumerate(&network, fault_type);
        let mut sim = Fsim::new(&network, &db);
        let file = File::open(&self.input)
            .with_context(|| format!("opening {}", self.input.display()))?;
        let patterns = read_patterns(file, network.input_num(), network.dff_num(), fault_type)?;

        for batch in patterns.chunks(PV_BITLEN) {
            sim.clear_patterns();
            for (slot, tv) in batch.iter().enumerate() {
                sim.set_pattern(slot, tv.clone());
            }
            for d in sim.ppsfp() {
                db.set_status(d.fault, FaultStatus::Detected);
                sim.set_skip(d.fault);
            }
        }
        let (detected, _, _, undetected) = db.status_counts();
        let total = db.rep_num();
        println!("Patterns: {}", patterns.len());
        println!(
            "Detected {} faults out of {} ({:.2}%)",
            detected,
            total,
            if total == 0 {
                100.0
            } else {
                100.0 * detected as f64 / total as f64
            }
        );
        println!("Undetected: {}", undetected);
        Ok(())
    }
}

fn load_network(path: &PathBuf) -> anyhow::Result<Network> {
    let parsed = parse_netlist_file(path)
        .with_context(|| format!("parsing {}", path.display()))?;
    let network = build(&parsed).with_context(|| format!("building {}", path.display()))?;
    Ok(network)
}
