// SPDX-License-Identifier: AGPL-3.0-only

//! Pass/fail harness for the validation binary.
//!
//! Checks accumulate against named tolerances from [`crate::tolerances`];
//! [`ValidationHarness::finish`] prints the table and exits 0 when every
//! check passed, 1 otherwise.

use std::fmt::Write;
use std::process;

/// One recorded check.
#[derive(Debug, Clone)]
pub struct Check {
    pub label: String,
    pub passed: bool,
    pub observed: f64,
    pub expected: f64,
    pub tolerance: f64,
    pub mode: ToleranceMode,
}

/// How a tolerance threshold is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToleranceMode {
    /// |observed − expected| < tolerance
    Absolute,
    /// |observed − expected| / |expected| < tolerance
    Relative,
    /// observed < threshold
    UpperBound,
    /// observed > threshold
    LowerBound,
    /// pass/fail flag
    Flag,
}

impl std::fmt::Display for ToleranceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absolute => write!(f, "abs"),
            Self::Relative => write!(f, "rel"),
            Self::UpperBound => write!(f, "<"),
            Self::LowerBound => write!(f, ">"),
            Self::Flag => write!(f, "flag"),
        }
    }
}

/// Accumulates checks for one binary.
#[derive(Debug, Default)]
#[must_use]
pub struct ValidationHarness {
    pub name: String,
    pub checks: Vec<Check>,
}

impl ValidationHarness {
    #[must_use = "validation harness must be used to run checks"]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            checks: Vec::new(),
        }
    }

    fn push(
        &mut self,
        label: &str,
        passed: bool,
        observed: f64,
        expected: f64,
        tolerance: f64,
        mode: ToleranceMode,
    ) {
        self.checks.push(Check {
            label: label.to_string(),
            passed,
            observed,
            expected,
            tolerance,
            mode,
        });
    }

    pub fn check_abs(&mut self, label: &str, observed: f64, expected: f64, tolerance: f64) {
        let passed = (observed - expected).abs() < tolerance;
        self.push(label, passed, observed, expected, tolerance, ToleranceMode::Absolute);
    }

    /// Relative check; falls back to |observed| < tolerance when the
    /// expected value is within [`crate::tolerances::DIVISION_GUARD`] of 0.
    pub fn check_rel(&mut self, label: &str, observed: f64, expected: f64, tolerance: f64) {
        let passed = if expected.abs() > crate::tolerances::DIVISION_GUARD {
            ((observed - expected) / expected).abs() < tolerance
        } else {
            observed.abs() < tolerance
        };
        self.push(label, passed, observed, expected, tolerance, ToleranceMode::Relative);
    }

    pub fn check_upper(&mut self, label: &str, observed: f64, threshold: f64) {
        let passed = observed < threshold;
        self.push(label, passed, observed, threshold, threshold, ToleranceMode::UpperBound);
    }

    pub fn check_lower(&mut self, label: &str, observed: f64, threshold: f64) {
        let passed = observed > threshold;
        self.push(label, passed, observed, threshold, threshold, ToleranceMode::LowerBound);
    }

    pub fn check_bool(&mut self, label: &str, passed: bool) {
        let observed = f64::from(u8::from(passed));
        self.push(label, passed, observed, 1.0, 0.0, ToleranceMode::Flag);
    }

    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    #[must_use]
    pub const fn total_count(&self) -> usize {
        self.checks.len()
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Summary table as printed by [`Self::finish`].
    #[must_use]
    pub fn summary(&self) -> String {
        let mut s = String::new();
        let _ = writeln!(
            s,
            "═══ {} validation: {}/{} checks passed ═══",
            self.name,
            self.passed_count(),
            self.total_count()
        );
        for check in &self.checks {
            let icon = if check.passed { "✓" } else { "✗" };
            let _ = writeln!(
                s,
                "  {icon} {}: observed={:.6e}, expected={:.6e}, tol={:.2e} ({})",
                check.label, check.observed, check.expected, check.tolerance, check.mode
            );
        }
        s
    }

    /// Print the summary and exit: 0 if every check passed, 1 otherwise.
    pub fn finish(&self) -> ! {
        println!();
        print!("{}", self.summary());
        if self.all_passed() {
            println!("ALL CHECKS PASSED");
            process::exit(0);
        }
        let failed: Vec<&str> = self
            .checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.label.as_str())
            .collect();
        println!("FAILED CHECKS: {}", failed.join(", "));
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harness_tracks_pass_fail() {
        let mut h = ValidationHarness::new("test");
        h.check_abs("exact", 1.0, 1.0, 1e-10);
        h.check_abs("close", 1.0001, 1.0, 1e-3);
        h.check_abs("far", 2.0, 1.0, 1e-3);
        assert_eq!(h.passed_count(), 2);
        assert_eq!(h.total_count(), 3);
        assert!(!h.all_passed());
    }

    #[test]
    fn relative_check_near_zero_expected_is_absolute() {
        let mut h = ValidationHarness::new("test");
        h.check_rel("tiny", 1e-16, 0.0, 1e-10);
        h.check_rel("large", 1.0, 0.0, 1e-10);
        assert!(h.checks[0].passed);
        assert!(!h.checks[1].passed);
    }

    #[test]
    fn relative_check_respects_sign() {
        let mut h = ValidationHarness::new("test");
        h.check_rel("close", -15.97, -16.0, 0.02);
        h.check_rel("flipped", 16.0, -16.0, 0.1);
        assert!(h.checks[0].passed);
        assert!(!h.checks[1].passed);
    }

    #[test]
    fn bounds_are_strict() {
        let mut h = ValidationHarness::new("test");
        h.check_upper("below", 0.5, 1.0);
        h.check_upper("at", 1.0, 1.0);
        h.check_lower("above", 2.0, 1.0);
        h.check_lower("at", 1.0, 1.0);
        let passed: Vec<bool> = h.checks.iter().map(|c| c.passed).collect();
        assert_eq!(passed, vec![true, false, true, false]);
    }

    #[test]
    fn summary_lists_every_check() {
        let mut h = ValidationHarness::new("rigid");
        h.check_abs("norm", 1.0, 1.0, 1e-10);
        h.check_bool("wrap", false);
        let s = h.summary();
        assert!(s.contains("rigid validation: 1/2"));
        assert!(s.contains("✓ norm"));
        assert!(s.contains("✗ wrap"));
        assert!(s.contains("(flag)"));
    }

    #[test]
    fn empty_harness_passes_vacuously() {
        let h = ValidationHarness::new("empty");
        assert_eq!(h.total_count(), 0);
        assert!(h.all_passed());
    }
}
