//! Thin interface to the SAT backend
//!
//! Everything solver-specific lives here. A [`SatScope`] owns the clause
//! store for one encoding scope and allocates its variables. Kissat is a
//! one-shot solver, so each `solve` replays the store onto a fresh instance
//! with the assumptions as unit clauses; the store itself persists for the
//! life of the scope.

use std::time::{Duration, Instant};

use anyhow::Result;
use rustsat::solvers::{ControlSignal, LimitConflicts, Solve, SolverResult, Terminate};
use rustsat::types::{Clause, Lit, TernaryVal, Var};
use rustsat_kissat::Kissat;

/// A boolean variable of the scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SatVar(u32);

impl SatVar {
    /// The positive literal
    pub fn pos(self) -> SatLit {
        SatLit {
            var: self.0,
            neg: false,
        }
    }

    /// The negative literal
    pub fn neg(self) -> SatLit {
        SatLit {
            var: self.0,
            neg: true,
        }
    }

    /// A literal with the given polarity
    pub fn lit(self, value: bool) -> SatLit {
        if value {
            self.pos()
        } else {
            self.neg()
        }
    }
}

/// A literal of the scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SatLit {
    var: u32,
    neg: bool,
}

impl std::ops::Not for SatLit {
    type Output = SatLit;
    fn not(self) -> SatLit {
        SatLit {
            var: self.var,
            neg: !self.neg,
        }
    }
}

impl SatLit {
    fn to_rustsat(self) -> Lit {
        let var = Var::new(self.var);
        if self.neg {
            var.neg_lit()
        } else {
            var.pos_lit()
        }
    }
}

/// A full satisfying assignment over the scope's variables
#[derive(Debug, Clone)]
pub struct SatModel {
    vals: Vec<Option<bool>>,
}

impl SatModel {
    /// Value of a variable; `None` when the solver left it free
    pub fn value(&self, var: SatVar) -> Option<bool> {
        self.vals[var.0 as usize]
    }

    /// Value of a literal
    pub fn lit_value(&self, lit: SatLit) -> Option<bool> {
        self.vals[lit.var as usize].map(|b| b ^ lit.neg)
    }
}

/// Result of one solver call
#[derive(Debug, Clone)]
pub enum SatOutcome {
    /// Satisfiable, with the model
    Sat(SatModel),
    /// Proven unsatisfiable
    Unsat,
    /// Stopped by the conflict or time budget
    Aborted,
}

/// Per-scope resource budgets handed to the solver
#[derive(Debug, Clone, Copy, Default)]
pub struct SatOptions {
    /// Give up after this many conflicts
    pub conflict_limit: Option<u32>,
    /// Give up after this much wall time per call
    pub timeout: Option<Duration>,
}

/// One encoding scope's solver state
pub struct SatScope {
    clauses: Vec<Clause>,
    var_num: u32,
    options: SatOptions,
    solve_count: usize,
    solve_time: Duration,
}

impl SatScope {
    /// Create an empty scope
    pub fn new(options: SatOptions) -> SatScope {
        SatScope {
            clauses: Vec::new(),
            var_num: 0,
            options,
            solve_count: 0,
            solve_time: Duration::ZERO,
        }
    }

    /// Allocate a fresh variable
    pub fn new_var(&mut self) -> SatVar {
        let var = SatVar(self.var_num);
        self.var_num += 1;
        var
    }

    /// Add a clause over the scope's literals
    pub fn add_clause(&mut self, lits: &[SatLit]) {
        self.clauses.push(lits.iter().map(|l| l.to_rustsat()).collect());
    }

    /// Number of variables allocated so far
    pub fn var_num(&self) -> usize {
        self.var_num as usize
    }

    /// Number of clauses in the store
    pub fn clause_num(&self) -> usize {
        self.clauses.len()
    }

    /// Number of solver calls made
    pub fn solve_count(&self) -> usize {
        self.solve_count
    }

    /// Total wall time spent inside the solver
    pub fn solve_time(&self) -> Duration {
        self.solve_time
    }

    /// Solve the stored formula under the given assumptions
    pub fn solve(&mut self, assumptions: &[SatLit]) -> Result<SatOutcome> {
        let start = Instant::now();
        let mut solver = Kissat::default();
        if let Some(limit) = self.options.conflict_limit {
            let _ = solver.limit_conflicts(Some(limit));
        }
        if let Some(timeout) = self.options.timeout {
            let deadline = start + timeout;
            solver.attach_terminator(move || {
                if Instant::now() >= deadline {
                    ControlSignal::Terminate
                } else {
                    ControlSignal::Continue
                }
            });
        }
        for clause in &self.clauses {
            solver.add_clause(clause.clone())?;
        }
        for lit in assumptions {
            solver.add_clause(std::iter::once(lit.to_rustsat()).collect())?;
        }
        let result = solver.solve()?;
        let outcome = match result {
            SolverResult::Sat => {
                let mut vals = Vec::with_capacity(self.var_num as usize);
                for idx in 0..self.var_num {
                    let val = solver.lit_val(Var::new(idx).pos_lit())?;
                    vals.push(match val {
                        TernaryVal::True => Some(true),
                        TernaryVal::False => Some(false),
                        TernaryVal::DontCare => None,
                    });
                }
                SatOutcome::Sat(SatModel { vals })
            }
            SolverResult::Unsat => SatOutcome::Unsat,
            SolverResult::Interrupted => SatOutcome::Aborted,
        };
        self.solve_count += 1;
        self.solve_time += start.elapsed();
        Ok(outcome)
    }
}
