//! Statistics for the test generator

use std::fmt;
use std::time::Duration;

/// Accumulated counts and times over DTPG attempts, partitioned by outcome
///
/// Every solver call is recorded exactly once, whatever its outcome.
#[derive(Debug, Clone, Default)]
pub struct DtpgStats {
    /// Number of CNF formulas generated (one per scope)
    pub cnf_gen_count: usize,
    /// Time spent generating CNF
    pub cnf_gen_time: Duration,
    /// Variables over all generated formulas
    pub cnf_var_num: usize,
    /// Clauses over all generated formulas
    pub cnf_clause_num: usize,
    /// Faults proven testable
    pub det_count: usize,
    /// SAT time spent on successful attempts
    pub det_time: Duration,
    /// Faults proven untestable
    pub untest_count: usize,
    /// SAT time spent on untestable proofs
    pub untest_time: Duration,
    /// Attempts stopped by the resource budget
    pub abort_count: usize,
    /// SAT time spent on aborted attempts
    pub abort_time: Duration,
    /// Time spent back-tracing models into test vectors
    pub backtrace_time: Duration,
}

impl DtpgStats {
    /// Record a generated formula
    pub fn update_cnf(&mut self, vars: usize, clauses: usize, time: Duration) {
        self.cnf_gen_count += 1;
        self.cnf_var_num += vars;
        self.cnf_clause_num += clauses;
        self.cnf_gen_time += time;
    }

    /// Record a successful attempt
    pub fn update_det(&mut self, sat_time: Duration, backtrace_time: Duration) {
        self.det_count += 1;
        self.det_time += sat_time;
        self.backtrace_time += backtrace_time;
    }

    /// Record an untestable verdict
    pub fn update_untest(&mut self, sat_time: Duration) {
        self.untest_count += 1;
        self.untest_time += sat_time;
    }

    /// Record an aborted attempt
    pub fn update_abort(&mut self, sat_time: Duration) {
        self.abort_count += 1;
        self.abort_time += sat_time;
    }

    /// Fold another accumulator into this one
    pub fn merge(&mut self, other: &DtpgStats) {
        self.cnf_gen_count += other.cnf_gen_count;
        self.cnf_gen_time += other.cnf_gen_time;
        self.cnf_var_num += other.cnf_var_num;
        self.cnf_clause_num += other.cnf_clause_num;
        self.det_count += other.det_count;
        self.det_time += other.det_time;
        self.untest_count += other.untest_count;
        self.untest_time += other.untest_time;
        self.abort_count += other.abort_count;
        self.abort_time += other.abort_time;
        self.backtrace_time += other.backtrace_time;
    }

    /// Total attempts recorded
    pub fn attempt_count(&self) -> usize {
        self.det_count + self.untest_count + self.abort_count
    }

    /// Total SAT time recorded
    pub fn sat_time(&self) -> Duration {
        self.det_time + self.untest_time + self.abort_time
    }
}

// Average with a guarded denominator; empty counters print as "-"
fn avg(time: Duration, count: usize) -> String {
    if count == 0 {
        "-".to_string()
    } else {
        format!("{:.3?}", time / count as u32)
    }
}

impl fmt::Display for DtpgStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "CNF: {} formulas, {} vars, {} clauses, {:.3?}",
            self.cnf_gen_count, self.cnf_var_num, self.cnf_clause_num, self.cnf_gen_time
        )?;
        writeln!(
            f,
            "Detected: {} (sat {:.3?}, avg {})",
            self.det_count,
            self.det_time,
            avg(self.det_time, self.det_count)
        )?;
        writeln!(
            f,
            "Untestable: {} (sat {:.3?}, avg {})",
            self.untest_count,
            self.untest_time,
            avg(self.untest_time, self.untest_count)
        )?;
        writeln!(
            f,
            "Aborted: {} (sat {:.3?}, avg {})",
            self.abort_count,
            self.abort_time,
            avg(self.abort_time, self.abort_count)
        )?;
        writeln!(f, "Back-trace: {:.3?}", self.backtrace_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_averages_guarded() {
        let stats = DtpgStats::default();
        // must not divide by zero anywhere
        let text = stats.to_string();
        assert!(text.contains("Detected: 0"));
        assert!(text.contains('-'));
    }

    #[test]
    fn test_merge() {
        let mut a = DtpgStats::default();
        a.update_det(Duration::from_millis(5), Duration::from_millis(1));
        let mut b = DtpgStats::default();
        b.update_abort(Duration::from_millis(2));
        b.update_untest(Duration::from_millis(3));
        a.merge(&b);
        assert_eq!(a.attempt_count(), 3);
        assert_eq!(a.sat_time(), Duration::from_millis(10));
    }
}
