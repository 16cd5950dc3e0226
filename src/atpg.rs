//! Full ATPG runs
//!
//! The driver owns the loop: enumerate faults, burn off the easy ones with
//! random patterns, then sweep the remaining ones scope by scope through
//! the SAT generator, dropping every fault a new vector happens to catch.
//! Detections flow through an ordered list of sinks, so recording, fault
//! dropping, pattern collection and verification stay decoupled.

use std::fmt;
use std::time::{Duration, Instant};

use kdam::tqdm;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::dtpg::{DtpgConfig, DtpgFfr, DtpgMffc, DtpgStats, JustKind, Outcome, SatOptions};
use crate::fault::{FaultDb, FaultId, FaultStatus, FaultType};
use crate::network::Network;
use crate::packed::PV_BITLEN;
use crate::pattern::TestVector;
use crate::sim::Fsim;

/// Which formula scope the generator uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeMode {
    /// One formula per fanout-free region
    #[default]
    Ffr,
    /// One formula per maximum fanout-free cone
    Mffc,
}

/// What to do with a fresh detection, applied in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectSink {
    /// Mark the fault detected in the fault database
    RecordStatus,
    /// Re-simulate the vector and drop every fault it also detects
    DropWithSimulator,
    /// Keep the vector in the result list
    AppendToVectorList,
    /// Re-run single-fault simulation as a cross-check
    Verify,
}

/// Configuration of a full run
#[derive(Debug, Clone)]
pub struct AtpgConfig {
    /// Fault model
    pub fault_type: FaultType,
    /// Formula scope
    pub scope: ScopeMode,
    /// Back-trace strategy
    pub justifier: JustKind,
    /// Vectors to collect per fault (1 = just the witness)
    pub k_patterns: usize,
    /// Per-call SAT conflict budget
    pub conflict_limit: Option<u32>,
    /// Per-call SAT wall-clock budget
    pub sat_timeout: Option<Duration>,
    /// Barren 64-pattern rounds before the random phase stops (0 skips it)
    pub random_rounds: usize,
    /// Random-fill the X positions of generated vectors before dropping
    pub fix_x: bool,
    /// Seed for every randomized step
    pub seed: u64,
    /// Detection sinks, applied in order
    pub sinks: Vec<DetectSink>,
    /// Show a progress bar during the DTPG sweep
    pub progress: bool,
}

impl Default for AtpgConfig {
    fn default() -> AtpgConfig {
        AtpgConfig {
            fault_type: FaultType::StuckAt,
            scope: ScopeMode::Ffr,
            justifier: JustKind::Just1,
            k_patterns: 1,
            conflict_limit: None,
            sat_timeout: None,
            random_rounds: 4,
            fix_x: true,
            seed: 1,
            sinks: vec![
                DetectSink::RecordStatus,
                DetectSink::DropWithSimulator,
                DetectSink::AppendToVectorList,
                DetectSink::Verify,
            ],
            progress: false,
        }
    }
}

/// Everything a run produces
pub struct AtpgResult {
    /// The collected test vectors
    pub patterns: Vec<TestVector>,
    /// The fault database with final statuses
    pub faults: FaultDb,
    /// Generator statistics
    pub stats: DtpgStats,
    /// Representative faults proven detected
    pub detected: usize,
    /// Representative faults proven untestable
    pub untestable: usize,
    /// Representative faults aborted within the budget
    pub aborted: usize,
    /// Representative faults never classified
    pub undetected: usize,
    /// Time spent enumerating faults
    pub fault_enum_time: Duration,
    /// Time spent in the random phase
    pub random_time: Duration,
    /// Time spent in the deterministic sweep (includes SAT)
    pub dtpg_time: Duration,
}

impl AtpgResult {
    /// Fault coverage over representative faults, in percent
    pub fn coverage(&self) -> f64 {
        let total = self.detected + self.untestable + self.aborted + self.undetected;
        if total == 0 {
            100.0
        } else {
            100.0 * self.detected as f64 / total as f64
        }
    }
}

impl fmt::Display for AtpgResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Patterns: {}", self.patterns.len())?;
        writeln!(f, "Detected: {}", self.detected)?;
        writeln!(f, "Untestable: {}", self.untestable)?;
        writeln!(f, "Aborted: {}", self.aborted)?;
        writeln!(f, "Undetected: {}", self.undetected)?;
        writeln!(f, "Coverage: {:.2}%", self.coverage())?;
        writeln!(f, "Fault enumeration: {:.3?}", self.fault_enum_time)?;
        writeln!(f, "Random simulation: {:.3?}", self.random_time)?;
        writeln!(f, "Deterministic generation: {:.3?}", self.dtpg_time)?;
        writeln!(f, "  SAT: {:.3?}", self.stats.sat_time())?;
        writeln!(f, "  Back-trace: {:.3?}", self.stats.backtrace_time)?;
        write!(f, "{}", self.stats)
    }
}

struct Driver<'a> {
    network: &'a Network,
    config: &'a AtpgConfig,
    db: FaultDb,
    sim: Fsim,
    rng: SmallRng,
    patterns: Vec<TestVector>,
    stats: DtpgStats,
}

/// Run the whole flow on a network
pub fn run_atpg(network: &Network, config: &AtpgConfig) -> AtpgResult {
    let enum_start = Instant::now();
    let db = FaultDb::enumerate(network, config.fault_type);
    let fault_enum_time = enum_start.elapsed();
    info!(
        faults = db.fault_num(),
        reps = db.rep_num(),
        "faults enumerated"
    );

    let sim = Fsim::new(network, &db);
    let mut driver = Driver {
        network,
        config,
        db,
        sim,
        rng: SmallRng::seed_from_u64(config.seed),
        patterns: Vec::new(),
        stats: DtpgStats::default(),
    };

    let random_start = Instant::now();
    if config.random_rounds > 0 {
        driver.random_phase();
    }
    let random_time = random_start.elapsed();

    let dtpg_start = Instant::now();
    driver.deterministic_phase();
    let dtpg_time = dtpg_start.elapsed();

    let (detected, untestable, aborted, undetected) = driver.db.status_counts();
    info!(detected, untestable, aborted, undetected, "run finished");
    AtpgResult {
        patterns: driver.patterns,
        faults: driver.db,
        stats: driver.stats,
        detected,
        untestable,
        aborted,
        undetected,
        fault_enum_time,
        random_time,
        dtpg_time,
    }
}

impl<'a> Driver<'a> {
    /// Batches of 64 random vectors, stopping after enough barren rounds
    fn random_phase(&mut self) {
        let mut barren = 0;
        let mut rounds = 0;
        while barren < self.config.random_rounds {
            rounds += 1;
            self.sim.clear_patterns();
            for slot in 0..PV_BITLEN {
                let mut tv = TestVector::new(
                    self.network.input_num(),
                    self.network.dff_num(),
                    self.config.fault_type,
                );
                tv.set_random(&mut self.rng);
                self.sim.set_pattern(slot, tv);
            }
            let det = self.sim.ppsfp();
            let mut kept_slots = 0u64;
            let mut new_faults = 0;
            for d in &det {
                if self.db.status(d.fault) != FaultStatus::Undetected {
                    continue;
                }
                new_faults += 1;
                self.db.set_status(d.fault, FaultStatus::Detected);
                self.sim.set_skip(d.fault);
                let slot = d.pat.trailing_zeros() as usize;
                if kept_slots & (1 << slot) == 0 {
                    kept_slots |= 1 << slot;
                    let tv = self
                        .sim
                        .get_pattern(slot)
                        .expect("filled slot")
                        .clone();
                    self.patterns.push(tv);
                }
            }
            if new_faults == 0 {
                barren += 1;
            } else {
                barren = 0;
            }
        }
        info!(
            rounds,
            patterns = self.patterns.len(),
            "random phase done"
        );
    }

    /// Sweep the remaining faults scope by scope
    fn deterministic_phase(&mut self) {
        let dtpg_config = DtpgConfig {
            justifier: self.config.justifier,
            sat: SatOptions {
                conflict_limit: self.config.conflict_limit,
                timeout: self.config.sat_timeout,
            },
        };
        match self.config.scope {
            ScopeMode::Ffr => {
                let ffrs: Vec<usize> = (0..self.network.ffrs().len()).collect();
                for ffr_id in tqdm!(
                    ffrs.into_iter(),
                    desc = "dtpg",
                    disable = !self.config.progress
                ) {
                    let pending = self.pending_faults(&[ffr_id]);
                    if pending.is_empty() {
                        continue;
                    }
                    let mut scope = DtpgFfr::new(
                        self.network,
                        self.config.fault_type,
                        self.network.ffr(ffr_id),
                        &dtpg_config,
                        &mut self.stats,
                    );
                    for fid in pending {
                        if self.db.status(fid) != FaultStatus::Undetected {
                            continue;
                        }
                        let fault = self.db.fault(fid).clone();
                        let (outcome, extras) = if self.config.k_patterns > 1 {
                            scope.gen_k_patterns(&fault, self.config.k_patterns, &mut self.stats)
                        } else {
                            (scope.gen_pattern(&fault, &mut self.stats), Vec::new())
                        };
                        self.handle_outcome(fid, outcome, extras);
                    }
                }
            }
            ScopeMode::Mffc => {
                let mffcs: Vec<usize> = (0..self.network.mffcs().len()).collect();
                for mffc_id in tqdm!(
                    mffcs.into_iter(),
                    desc = "dtpg",
                    disable = !self.config.progress
                ) {
                    let ffr_ids = self.network.mffc(mffc_id).ffrs.clone();
                    let pending = self.pending_faults(&ffr_ids);
                    if pending.is_empty() {
                        continue;
                    }
                    let mut scope = DtpgMffc::new(
                        self.network,
                        self.config.fault_type,
                        self.network.mffc(mffc_id),
                        &dtpg_config,
                        &mut self.stats,
                    );
                    for fid in pending {
                        if self.db.status(fid) != FaultStatus::Undetected {
                            continue;
                        }
                        let fault = self.db.fault(fid).clone();
                        let (outcome, extras) = if self.config.k_patterns > 1 {
                            scope.gen_k_patterns(&fault, self.config.k_patterns, &mut self.stats)
                        } else {
                            (scope.gen_pattern(&fault, &mut self.stats), Vec::new())
                        };
                        self.handle_outcome(fid, outcome, extras);
                    }
                }
            }
        }
    }

    fn pending_faults(&self, ffr_ids: &[usize]) -> Vec<FaultId> {
        ffr_ids
            .iter()
            .flat_map(|id| self.db.ffr_faults(*id).iter().copied())
            .filter(|fid| self.db.status(*fid) == FaultStatus::Undetected)
            .collect()
    }

    fn handle_outcome(&mut self, fid: FaultId, outcome: Outcome, extras: Vec<TestVector>) {
        match outcome {
            Outcome::Detected(mut tv) => {
                if self.config.fix_x {
                    tv.fix_x_random(&mut self.rng);
                }
                self.apply_sinks(fid, &tv);
                for mut extra in extras.into_iter().skip(1) {
                    if self.config.fix_x {
                        extra.fix_x_random(&mut self.rng);
                    }
                    if self.config.sinks.contains(&DetectSink::AppendToVectorList) {
                        self.patterns.push(extra);
                    }
                }
            }
            Outcome::Untestable => {
                self.db.set_status(fid, FaultStatus::Untestable);
                self.sim.set_skip(fid);
            }
            Outcome::Aborted => {
                self.db.set_status(fid, FaultStatus::Aborted);
            }
        }
    }

    fn apply_sinks(&mut self, fid: FaultId, tv: &TestVector) {
        for sink in &self.config.sinks {
            match sink {
                DetectSink::RecordStatus => {
                    self.db.set_status(fid, FaultStatus::Detected);
                }
                DetectSink::DropWithSimulator => {
                    self.sim.set_skip(fid);
                    let dropped = self.sim.sppfp(tv);
                    for other in dropped {
                        if self.db.status(other) == FaultStatus::Undetected {
                            self.db.set_status(other, FaultStatus::Detected);
                        }
                        self.sim.set_skip(other);
                    }
                }
                DetectSink::AppendToVectorList => {
                    self.patterns.push(tv.clone());
                }
                DetectSink::Verify => {
                    if !self.sim.spsfp(tv, fid) {
                        warn!(fault = fid, "generated vector failed verification");
                    }
                }
            }
        }
    }
}
